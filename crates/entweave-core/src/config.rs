//! Configuration
//!
//! [`WeaverSetup`] is the immutable configuration of one run. It is owned by
//! the front-end and passed into the engine by reference.
//!
//! # Configuration Files
//!
//! - `entweave.yaml` - Project configuration providing defaults for every run

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Host property bounding the number of errors before weaving stops
pub const MAX_ERRORS: &str = "MaxErrors";

/// Host property holding a help-link template
pub const HELP_LINK_TEMPLATE: &str = "HelpLinkTemplate";

/// Default storage slot budget per class hierarchy
pub const DEFAULT_SLOT_BUDGET: usize = 64;

/// Artifact produced by a weave
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    /// Woven module in the declaration language
    #[default]
    Yaml,
    /// Rust source rendered from the woven module
    Rust,
}

impl ArtifactFormat {
    /// File extension of artifacts in this format
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Yaml => "woven.yaml",
            ArtifactFormat::Rust => "woven.rs",
        }
    }
}

/// Configuration of one weaving run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaverSetup {
    /// Module file to weave
    pub input: PathBuf,

    /// Cache root
    pub cache_dir: PathBuf,

    /// Install directory for artifacts
    pub output_dir: PathBuf,

    /// Host property bag; unknown keys are ignored
    #[serde(default)]
    pub properties: BTreeMap<String, String>,

    /// Produce cached artifacts without installing them
    #[serde(default)]
    pub cache_only: bool,

    /// Artifact format
    #[serde(default)]
    pub format: ArtifactFormat,

    /// Storage slot budget per class hierarchy
    #[serde(default = "default_slot_budget")]
    pub slot_budget: usize,
}

fn default_slot_budget() -> usize {
    DEFAULT_SLOT_BUDGET
}

/// The parts of a [`WeaverSetup`] that affect the produced artifact
///
/// Locations (input path, cache and output directories) and the install mode
/// are not inputs to weaving and are left out.
#[derive(Debug, Serialize)]
pub struct EffectiveConfig<'a> {
    /// Artifact format
    pub format: ArtifactFormat,
    /// Slot budget
    pub slot_budget: usize,
    /// Host properties, sorted by key
    pub properties: &'a BTreeMap<String, String>,
}

impl WeaverSetup {
    /// Setup for `input` with default directories
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            cache_dir: PathBuf::from(".entweave/cache"),
            output_dir: PathBuf::from(".entweave/output"),
            properties: BTreeMap::new(),
            cache_only: false,
            format: ArtifactFormat::default(),
            slot_budget: DEFAULT_SLOT_BUDGET,
        }
    }

    /// Set the cache root
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Set the install directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Add a host property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Select cache-only mode
    pub fn with_cache_only(mut self, cache_only: bool) -> Self {
        self.cache_only = cache_only;
        self
    }

    /// Set the artifact format
    pub fn with_format(mut self, format: ArtifactFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the slot budget
    pub fn with_slot_budget(mut self, budget: usize) -> Self {
        self.slot_budget = budget;
        self
    }

    /// Host property by key
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// The `MaxErrors` property
    ///
    /// `Err` carries the malformed value; zero is treated as malformed.
    pub fn max_errors(&self) -> std::result::Result<Option<usize>, String> {
        match self.property(MAX_ERRORS) {
            None => Ok(None),
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => Ok(Some(n)),
                _ => Err(raw.to_string()),
            },
        }
    }

    /// Configuration that feeds the cache key
    pub fn effective_config(&self) -> EffectiveConfig<'_> {
        EffectiveConfig {
            format: self.format,
            slot_budget: self.slot_budget,
            properties: &self.properties,
        }
    }

    /// Install path of the artifact for this input
    pub fn install_path(&self) -> PathBuf {
        let stem = self
            .input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module");
        self.output_dir
            .join(format!("{}.{}", stem, self.format.extension()))
    }
}

/// Project configuration from `entweave.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Cache root, relative to the project directory
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Install directory, relative to the project directory
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Artifact format
    #[serde(default)]
    pub format: ArtifactFormat,

    /// Storage slot budget
    #[serde(default = "default_slot_budget")]
    pub slot_budget: usize,

    /// Host properties
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

fn default_cache_dir() -> String {
    ".entweave/cache".to_string()
}

fn default_output_dir() -> String {
    ".entweave/output".to_string()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            output_dir: default_output_dir(),
            format: ArtifactFormat::default(),
            slot_budget: DEFAULT_SLOT_BUDGET,
            properties: BTreeMap::new(),
        }
    }
}

/// Main configuration container
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Base path of the project
    pub base_path: PathBuf,
}

impl Config {
    /// Load configuration from a directory or an `entweave.yaml` file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let (config_path, base_path) = if path.is_dir() {
            (path.join("entweave.yaml"), path.to_path_buf())
        } else {
            (
                path.to_path_buf(),
                path.parent().unwrap_or(Path::new(".")).to_path_buf(),
            )
        };

        if !config_path.exists() {
            return Err(Error::ConfigNotFound {
                path: config_path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|source| Error::Read {
            path: config_path.clone(),
            source,
        })?;
        let project: ProjectConfig = serde_yaml::from_str(&contents)?;

        Ok(Self { project, base_path })
    }

    /// Load configuration if present, otherwise defaults rooted at the
    /// directory `path` points into
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        match Self::load(path.as_ref()) {
            Err(Error::ConfigNotFound { .. }) => {
                let path = path.as_ref();
                let base_path = if path.is_dir() {
                    path.to_path_buf()
                } else {
                    path.parent().unwrap_or(Path::new(".")).to_path_buf()
                };
                Ok(Self {
                    project: ProjectConfig::default(),
                    base_path,
                })
            }
            other => other,
        }
    }

    /// Setup for weaving `input` with this project's defaults
    pub fn setup_for(&self, input: impl Into<PathBuf>) -> WeaverSetup {
        WeaverSetup {
            input: input.into(),
            cache_dir: self.base_path.join(&self.project.cache_dir),
            output_dir: self.base_path.join(&self.project.output_dir),
            properties: self.project.properties.clone(),
            cache_only: false,
            format: self.project.format,
            slot_budget: self.project.slot_budget,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_setup_defaults() {
        let setup = WeaverSetup::new("models/fleet.yaml");
        assert_eq!(setup.slot_budget, DEFAULT_SLOT_BUDGET);
        assert_eq!(setup.format, ArtifactFormat::Yaml);
        assert!(!setup.cache_only);
        assert_eq!(
            setup.install_path(),
            PathBuf::from(".entweave/output/fleet.woven.yaml")
        );
    }

    #[rstest]
    #[case(None, Ok(None))]
    #[case(Some("3"), Ok(Some(3)))]
    #[case(Some(" 7 "), Ok(Some(7)))]
    #[case(Some("0"), Err("0".to_string()))]
    #[case(Some("many"), Err("many".to_string()))]
    fn test_max_errors_property(
        #[case] raw: Option<&str>,
        #[case] expected: std::result::Result<Option<usize>, String>,
    ) {
        let mut setup = WeaverSetup::new("m.yaml");
        if let Some(raw) = raw {
            setup = setup.with_property(MAX_ERRORS, raw);
        }
        assert_eq!(setup.max_errors(), expected);
    }

    #[test]
    fn test_effective_config_ignores_locations() {
        let a = WeaverSetup::new("a/m.yaml").with_cache_dir("/tmp/one");
        let b = WeaverSetup::new("b/m.yaml")
            .with_cache_dir("/tmp/two")
            .with_output_dir("/tmp/out")
            .with_cache_only(true);
        let a_json = serde_json::to_string(&a.effective_config()).unwrap();
        let b_json = serde_json::to_string(&b.effective_config()).unwrap();
        assert_eq!(a_json, b_json);

        let c = WeaverSetup::new("a/m.yaml").with_format(ArtifactFormat::Rust);
        let c_json = serde_json::to_string(&c.effective_config()).unwrap();
        assert_ne!(a_json, c_json);
    }

    #[test]
    fn test_parse_project_config() {
        let yaml = r#"
cache_dir: build/cache
format: rust
slot_budget: 16
properties:
  MaxErrors: "5"
"#;
        let config: ProjectConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.cache_dir, "build/cache");
        assert_eq!(config.output_dir, ".entweave/output");
        assert_eq!(config.format, ArtifactFormat::Rust);
        assert_eq!(config.slot_budget, 16);
        assert_eq!(config.properties.get(MAX_ERRORS).map(String::as_str), Some("5"));
    }

    #[test]
    fn test_load_config_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("entweave.yaml"), "output_dir: out\n").unwrap();

        let config = Config::load(dir.path()).unwrap();
        let setup = config.setup_for(dir.path().join("m.yaml"));
        assert_eq!(setup.output_dir, dir.path().join("out"));
        assert_eq!(setup.cache_dir, dir.path().join(".entweave/cache"));
    }

    #[test]
    fn test_missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(Error::ConfigNotFound { .. })
        ));
        let config = Config::load_or_default(dir.path()).unwrap();
        assert_eq!(config.project, ProjectConfig::default());
        assert_eq!(config.base_path, dir.path());
    }
}
