//! Check module files without producing artifacts

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use entweave_codegen::Weaver;
use entweave_core::Code;

use super::{Overrides, exit_code, load_config, module_files};
use crate::hosts::{BuildTaskHost, ConsoleHost, FileHost};

/// Run the check command
pub async fn run(
    config_path: &str,
    paths: &[PathBuf],
    overrides: &Overrides,
    msbuild: bool,
    verbose: bool,
) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let files = module_files(paths)?;

    let mut first_failure = None;
    for file in &files {
        let weaver = Weaver::new(overrides.setup_for(&config, file));
        let failure = if msbuild {
            check_file(&weaver, BuildTaskHost::for_file(file, verbose))
        } else {
            check_file(&weaver, ConsoleHost::for_file(file, verbose))
        };
        if let Some(code) = failure {
            first_failure.get_or_insert(code);
        }
    }

    if first_failure.is_none() {
        tracing::info!("✓ {} modules are valid", files.len());
    }
    Ok(exit_code(first_failure))
}

fn check_file<H: FileHost>(weaver: &Weaver, mut host: H) -> Option<Code> {
    match weaver.check(&mut host) {
        Ok(true) => None,
        Ok(false) => Some(host.first_error().unwrap_or(Code::UnspecifiedFailure)),
        Err(err) => Some(err.code()),
    }
}
