//! entweave Core Library
//!
//! This crate provides the weaving pipeline for persistent entity classes:
//! - Module declarations and their parser
//! - Schema extraction and implicit (reserved) column derivation
//! - Type tower validation
//! - Per-class transforms (storage rerouting, identity-based equality)
//! - The host protocol through which front-ends observe a run
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌───────────┐   ┌───────────┐
//! │  Module  │──▶│  Extract  │──▶│  Derive  │──▶│   Tower   │──▶│ Transform │
//! │  (YAML)  │   │ (Schema)  │   │ (Columns)│   │ (Kind)    │   │ (Members) │
//! └──────────┘   └───────────┘   └──────────┘   └───────────┘   └───────────┘
//!                         │ diagnostics ▼
//!                    ┌──────────────────────┐
//!                    │   Session / Host     │
//!                    └──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use entweave_core::{parser::Parser, pipeline, resolve::NoReferences, WeaverSetup};
//!
//! let mut module = Parser::new().parse_file("models/fleet.yaml")?;
//! let mut diagnostics = Vec::new();
//! pipeline::weave_module(&mut module, "fingerprint", &NoReferences, &setup, &mut diagnostics)?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod decl;
pub mod diagnostic;
pub mod error;
pub mod extract;
pub mod host;
pub mod implicit;
pub mod interpreter;
pub mod parser;
pub mod pipeline;
pub mod resolve;
pub mod schema;
pub mod tower;
pub mod transform;

pub use config::{ArtifactFormat, Config, ProjectConfig, WeaverSetup};
pub use decl::Module;
pub use diagnostic::{Code, Diagnostic, DiagnosticSink, Halted, Severity};
pub use error::{Error, Result};
pub use host::{CollectingHost, Session, Summary, TracingHost, WeavingHost};
pub use schema::{Role, SchemaModel};

/// Version stamp written into woven modules and mixed into cache keys.
pub const WEAVER_VERSION: &str = env!("CARGO_PKG_VERSION");
