//! entweave Code Generation
//!
//! This crate turns a declaration module into a cached, installed artifact.
//!
//! # Pipeline Overview
//!
//! ```text
//! ┌─────────┐     ┌─────────┐     ┌─────────┐     ┌─────────┐
//! │  YAML   │────▶│  Cache  │────▶│  Weave  │────▶│  Emit   │
//! │ Module  │     │  (Key)  │     │ (Core)  │     │(Install)│
//! └─────────┘     └─────────┘     └─────────┘     └─────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use entweave_codegen::Weaver;
//! use entweave_core::{TracingHost, WeaverSetup};
//!
//! let weaver = Weaver::new(WeaverSetup::new("models/fleet.yaml"));
//! let outcome = weaver.weave(&mut TracingHost)?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod emit;
pub mod error;
pub mod references;
pub mod weaver;

pub use cache::{CacheController, CacheEntry, CacheKey};
pub use emit::{Emitter, emitter_for};
pub use error::{Error, Result};
pub use weaver::{WeaveOutcome, Weaver};
