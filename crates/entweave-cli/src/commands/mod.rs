//! CLI command implementations

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::ValueEnum;
use entweave_core::config::MAX_ERRORS;
use entweave_core::{ArtifactFormat, Code, Config, WeaverSetup};
use walkdir::WalkDir;

pub mod check;
pub mod clean;
pub mod weave;

/// Artifact format flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// Woven module YAML
    Yaml,
    /// Rust source
    Rust,
}

impl From<FormatArg> for ArtifactFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Yaml => ArtifactFormat::Yaml,
            FormatArg::Rust => ArtifactFormat::Rust,
        }
    }
}

/// Command-line settings that override `entweave.yaml`
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub cache: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub cache_only: bool,
    pub format: Option<FormatArg>,
    pub max_errors: Option<usize>,
}

impl Overrides {
    fn setup_for(&self, config: &Config, input: &Path) -> WeaverSetup {
        let mut setup = config.setup_for(input).with_cache_only(self.cache_only);
        if let Some(cache) = &self.cache {
            setup = setup.with_cache_dir(cache);
        }
        if let Some(output) = &self.output {
            setup = setup.with_output_dir(output);
        }
        if let Some(format) = self.format {
            setup = setup.with_format(format.into());
        }
        if let Some(max) = self.max_errors {
            setup = setup.with_property(MAX_ERRORS, max.to_string());
        }
        setup
    }
}

fn load_config(config_path: &str) -> Result<Config> {
    tracing::debug!("Loading configuration from {}", config_path);
    Config::load_or_default(config_path).context("Failed to load configuration")
}

// Module files named by `paths`; directories are searched recursively.
// Finding none is an error.
fn module_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry
                    .with_context(|| format!("Failed to read directory {}", path.display()))?;
                if entry.file_type().is_file() && is_module_file(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else if path.exists() {
            files.push(path.clone());
        } else {
            anyhow::bail!("Module not found: {}", path.display());
        }
    }
    if files.is_empty() {
        anyhow::bail!("No module files found");
    }
    Ok(files)
}

fn is_module_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    (name.ends_with(".yaml") || name.ends_with(".yml"))
        && !name.ends_with(".woven.yaml")
        && name != "entweave.yaml"
}

fn exit_code(first_error: Option<Code>) -> ExitCode {
    match first_error {
        None => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(code.value().max(1)),
    }
}
