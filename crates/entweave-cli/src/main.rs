//! entweave CLI
//!
//! Thin front-end over the weaving engine.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod hosts;

use commands::{FormatArg, Overrides};

/// entweave - persistence weaver for entity classes
#[derive(Parser)]
#[command(name = "entweave")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file or project directory
    #[arg(short, long, default_value = "entweave.yaml", global = true)]
    config: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct WeaveArgs {
    /// Module files or directories containing them
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Cache directory
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Install directory for artifacts
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Artifact format
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Stop after this many errors
    #[arg(long)]
    max_errors: Option<usize>,

    /// Print MSBuild-style diagnostic lines
    #[arg(long)]
    msbuild: bool,
}

impl WeaveArgs {
    fn overrides(&self, cache_only: bool) -> Overrides {
        Overrides {
            cache: self.cache.clone(),
            output: self.output.clone(),
            cache_only,
            format: self.format,
            max_errors: self.max_errors,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Weave modules and install their artifacts
    Weave {
        #[command(flatten)]
        args: WeaveArgs,

        /// Populate the cache without installing artifacts
        #[arg(long)]
        cache_only: bool,
    },

    /// Run the pipeline without writing the cache or artifacts
    Check {
        #[command(flatten)]
        args: WeaveArgs,
    },

    /// Remove cache entries left by other weaver versions
    Clean {
        /// Cache directory
        #[arg(long)]
        cache: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Weave { args, cache_only } => {
            commands::weave::run(
                &cli.config,
                &args.paths,
                &args.overrides(cache_only),
                args.msbuild,
                cli.verbose,
            )
            .await
        }
        Commands::Check { args } => {
            commands::check::run(
                &cli.config,
                &args.paths,
                &args.overrides(false),
                args.msbuild,
                cli.verbose,
            )
            .await
        }
        Commands::Clean { cache } => {
            commands::clean::run(&cli.config, cache).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
