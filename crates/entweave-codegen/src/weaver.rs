//! Weaving engine
//!
//! Drives one module through the cache and the pipeline:
//!
//! ```text
//! read input ─▶ parse ─▶ key (input + references) ─▶ cache hit? ── yes ─▶ install
//!                                                        │
//!                                                        no
//!                                                        ▼
//!            load references ─▶ weave ─▶ emit ─▶ store ─▶ install (unless cache-only)
//! ```
//!
//! Failed weaves never reach the cache.

use std::path::{Path, PathBuf};

use entweave_core::parser::Parser;
use entweave_core::pipeline::weave_module;
use entweave_core::{Code, Diagnostic, Module, Session, Summary, WeaverSetup, WeavingHost};

use crate::cache::{CacheController, CacheKey};
use crate::emit::emitter_for;
use crate::error::{Error, Result};
use crate::references::{load_references, reference_bytes};

/// Result of a weave
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeaveOutcome {
    /// Value passed to the host's `on_done`
    pub success: bool,
    /// The artifact came from the cache
    pub cache_hit: bool,
    /// Cache key of the input
    pub key: CacheKey,
    /// Cached artifact
    pub artifact: Option<PathBuf>,
    /// Installed copy of the artifact
    pub installed: Option<PathBuf>,
    /// Errors reported
    pub errors: usize,
    /// Warnings reported
    pub warnings: usize,
    /// Code of the first error reported
    pub first_error: Option<Code>,
}

impl WeaveOutcome {
    fn new(
        summary: Summary,
        key: CacheKey,
        cache_hit: bool,
        artifact: Option<PathBuf>,
        installed: Option<PathBuf>,
    ) -> Self {
        Self {
            success: summary.success,
            cache_hit,
            key,
            artifact,
            installed,
            errors: summary.errors,
            warnings: summary.warnings,
            first_error: summary.first_error,
        }
    }
}

/// Weaving engine for one setup
#[derive(Debug, Clone)]
pub struct Weaver {
    setup: WeaverSetup,
    cache: CacheController,
}

impl Weaver {
    /// Create an engine
    pub fn new(setup: WeaverSetup) -> Self {
        Self {
            cache: CacheController::new(&setup.cache_dir),
            setup,
        }
    }

    /// Configuration of this engine
    pub fn setup(&self) -> &WeaverSetup {
        &self.setup
    }

    /// Cache used by this engine
    pub fn cache(&self) -> &CacheController {
        &self.cache
    }

    /// Weave the input, reusing a cached artifact when possible
    ///
    /// Schema and transform problems produce an unsuccessful outcome.
    /// Environment faults are reported to the host and returned as `Err`.
    pub fn weave(&self, host: &mut dyn WeavingHost) -> Result<WeaveOutcome> {
        let mut session = Session::begin(host, &self.setup);
        tracing::info!("Weaving module: {}", self.setup.input.display());

        let bytes = match self.read_input() {
            Ok(bytes) => bytes,
            Err(err) => return Err(abort(session, err)),
        };
        let parsed = Parser::new().parse_bytes(&bytes);
        // Unparsable input has no references; the pipeline reports it.
        let references = match &parsed {
            Ok(module) => reference_bytes(module, self.base_dir()),
            Err(_) => Ok(Vec::new()),
        };
        let key = match references
            .and_then(|references| self.cache.key_with_references(&bytes, &references, &self.setup))
        {
            Ok(key) => key,
            Err(err) => return Err(abort(session, err)),
        };

        match self.cache.try_get(&key) {
            Ok(Some(entry)) => {
                tracing::debug!("Using cached artifact: {}", entry.path.display());
                session.write(Diagnostic::info(format!("cache hit for key {key}")));
                let installed = match self.install(&entry) {
                    Ok(installed) => installed,
                    Err(err) => return Err(abort(session, err)),
                };
                let summary = session.finish(true);
                return Ok(WeaveOutcome::new(
                    summary,
                    key,
                    true,
                    Some(entry.path),
                    installed,
                ));
            }
            Ok(None) => tracing::debug!("cache miss for key {}", key),
            Err(err) => return Err(abort(session, err)),
        }

        let module = match self.run_pipeline(&bytes, parsed, &mut session) {
            Ok(Some(module)) => module,
            Ok(None) => {
                let summary = session.finish(false);
                return Ok(WeaveOutcome::new(summary, key, false, None, None));
            }
            Err(err) => return Err(abort(session, err)),
        };

        let artifact = match emitter_for(self.setup.format).emit(&module) {
            Ok(artifact) => artifact,
            Err(err) if !err.is_environment() => {
                session.write(Diagnostic::error(err.code(), err.to_string()));
                let summary = session.finish(false);
                return Ok(WeaveOutcome::new(summary, key, false, None, None));
            }
            Err(err) => return Err(abort(session, err)),
        };

        let stored = self
            .cache
            .store(&key, &artifact)
            .and_then(|entry| Ok((self.install(&entry)?, entry)));
        let (installed, entry) = match stored {
            Ok(stored) => stored,
            Err(err) => return Err(abort(session, err)),
        };

        let summary = session.finish(true);
        Ok(WeaveOutcome::new(
            summary,
            key,
            false,
            Some(entry.path),
            installed,
        ))
    }

    /// Run the pipeline without touching the cache or the output directory
    pub fn check(&self, host: &mut dyn WeavingHost) -> Result<bool> {
        let mut session = Session::begin(host, &self.setup);

        let bytes = match self.read_input() {
            Ok(bytes) => bytes,
            Err(err) => return Err(abort(session, err)),
        };
        match self.run_pipeline(&bytes, Parser::new().parse_bytes(&bytes), &mut session) {
            Ok(woven) => Ok(session.finish(woven.is_some()).success),
            Err(err) => Err(abort(session, err)),
        }
    }

    fn read_input(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.setup.input).map_err(|source| Error::InputRead {
            path: self.setup.input.clone(),
            source,
        })
    }

    fn install(&self, entry: &crate::cache::CacheEntry) -> Result<Option<PathBuf>> {
        if self.setup.cache_only {
            return Ok(None);
        }
        self.cache
            .install(entry, &self.setup.install_path())
            .map(Some)
    }

    fn base_dir(&self) -> &Path {
        self.setup.input.parent().unwrap_or(Path::new("."))
    }

    // Ok(None): the weave failed and the diagnostics have been written.
    fn run_pipeline(
        &self,
        bytes: &[u8],
        parsed: entweave_core::Result<Module>,
        session: &mut Session<'_>,
    ) -> Result<Option<Module>> {
        let mut module = match parsed {
            Ok(module) => module,
            Err(err) => {
                session.write(Diagnostic::error(
                    Code::InvalidInput,
                    format!("{}: {}", self.setup.input.display(), err),
                ));
                return Ok(None);
            }
        };

        let references = match load_references(&module, self.base_dir()) {
            Ok(references) => references,
            Err(err) if err.is_environment() => return Err(err),
            Err(err) => {
                session.write(Diagnostic::error(err.code(), err.to_string()));
                return Ok(None);
            }
        };
        for warning in references.warnings {
            session.write(warning);
        }

        let fingerprint = CacheController::fingerprint(bytes);
        let result = weave_module(
            &mut module,
            &fingerprint,
            &references.index,
            &self.setup,
            session,
        );

        if result.is_ok() && module.woven.is_some() && session.error_count() == 0 {
            Ok(Some(module))
        } else {
            Ok(None)
        }
    }
}

// Report an environment fault and end the run.
fn abort(mut session: Session<'_>, err: Error) -> Error {
    session.write(Diagnostic::error(err.code(), err.to_string()));
    session.finish(false);
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use entweave_core::CollectingHost;
    use tempfile::TempDir;

    #[test]
    fn test_missing_input_is_environment_error() {
        let dir = TempDir::new().unwrap();
        let setup = WeaverSetup::new(dir.path().join("missing.yaml"))
            .with_cache_dir(dir.path().join("cache"));
        let mut host = CollectingHost::new();

        let err = Weaver::new(setup).weave(&mut host).unwrap_err();
        assert_eq!(err.code(), Code::InputRead);
        assert_eq!(host.errors()[0].code, Code::InputRead);
        assert_eq!(host.outcome(), Some(false));
    }

    #[test]
    fn test_invalid_yaml_fails_without_error() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("bad.yaml");
        std::fs::write(&input, "module: [").unwrap();
        let setup = WeaverSetup::new(&input).with_cache_dir(dir.path().join("cache"));
        let mut host = CollectingHost::new();

        let outcome = Weaver::new(setup).weave(&mut host).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.first_error, Some(Code::InvalidInput));
        assert!(outcome.artifact.is_none());
    }
}
