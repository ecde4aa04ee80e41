//! Weave module files

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use entweave_codegen::Weaver;
use entweave_core::{Code, WeaverSetup};

use super::{Overrides, exit_code, load_config, module_files};
use crate::hosts::{BuildTaskHost, ConsoleHost, FileHost};

/// Run the weave command
pub async fn run(
    config_path: &str,
    paths: &[PathBuf],
    overrides: &Overrides,
    msbuild: bool,
    verbose: bool,
) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let files = module_files(paths)?;

    tracing::info!("Weaving {} modules", files.len());

    let mut tasks = Vec::with_capacity(files.len());
    for file in files {
        let setup = overrides.setup_for(&config, &file);
        tasks.push(tokio::task::spawn_blocking(move || {
            if msbuild {
                weave_file::<BuildTaskHost>(setup, verbose)
            } else {
                weave_file::<ConsoleHost>(setup, verbose)
            }
        }));
    }

    let mut first_failure = None;
    let mut woven = 0;
    for task in tasks {
        match task.await.context("Weaving task panicked")? {
            None => woven += 1,
            Some(code) => {
                first_failure.get_or_insert(code);
            }
        }
    }

    tracing::info!("Wove {} modules", woven);
    Ok(exit_code(first_failure))
}

// Weave one file; returns the code of its first error if it failed.
fn weave_file<H: FileHost>(setup: WeaverSetup, verbose: bool) -> Option<Code> {
    let mut host = H::for_file(&setup.input, verbose);
    match Weaver::new(setup).weave(&mut host) {
        Ok(outcome) if outcome.success => None,
        Ok(outcome) => Some(outcome.first_error.unwrap_or(Code::UnspecifiedFailure)),
        Err(err) => Some(err.code()),
    }
}
