//! Diagnostics
//!
//! Every schema or transform problem is a [`Diagnostic`] delivered to a
//! [`DiagnosticSink`]. Codes share one space with the CLI exit status, so they
//! all fit in a byte.

use std::fmt;

use serde::Serialize;

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Engine internals
    Debug,
    /// Progress
    Information,
    /// Suspicious but not fatal
    Warning,
    /// The run will fail
    Error,
}

/// Stable numeric diagnostic code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Code {
    /// Debug and information messages
    Note,
    /// A failure was reached without a specific error being reported
    UnspecifiedFailure,
    /// The module file could not be parsed or validated
    InvalidInput,
    /// A base class could not be found anywhere
    UnresolvedBase,
    /// Two members claim the same reserved role
    AmbiguousRole,
    /// A user member uses a reserved column name
    ReservedNameCollision,
    /// Two classes share a qualified name
    DuplicateClass,
    /// A class inherits from itself
    InheritanceCycle,
    /// Type-tower edges form a cycle that avoids every fixpoint
    TypeTowerCycle,
    /// Type-tower chain does not reach a fixpoint
    TypeTowerUnterminated,
    /// A derived class claims a reserved role
    RoleOverrideOnDerived,
    /// A referenced module has not been woven
    UnwovenReference,
    /// The input module has already been woven
    AlreadyWoven,
    /// A class redeclares an attribute it already has or inherits
    DuplicateAttribute,
    /// A class needs more storage slots than the budget allows
    SlotBudgetExceeded,
    /// A property names a backing field that does not exist
    MissingBackingField,
    /// Cache entry could not be read
    CacheRead,
    /// Cache entry could not be written
    CacheWrite,
    /// Input could not be read
    InputRead,
    /// Output could not be written
    OutputWrite,
}

impl Code {
    /// Numeric value, also used as process exit status
    pub fn value(self) -> u8 {
        match self {
            Code::Note => 0,
            Code::UnspecifiedFailure => 1,
            Code::InvalidInput => 2,
            Code::UnresolvedBase => 10,
            Code::AmbiguousRole => 11,
            Code::ReservedNameCollision => 12,
            Code::DuplicateClass => 13,
            Code::InheritanceCycle => 14,
            Code::TypeTowerCycle => 15,
            Code::TypeTowerUnterminated => 16,
            Code::RoleOverrideOnDerived => 17,
            Code::UnwovenReference => 18,
            Code::AlreadyWoven => 19,
            Code::DuplicateAttribute => 20,
            Code::SlotBudgetExceeded => 40,
            Code::MissingBackingField => 41,
            Code::CacheRead => 60,
            Code::CacheWrite => 61,
            Code::InputRead => 62,
            Code::OutputWrite => 63,
        }
    }

    /// Whether the code signals an environment fault rather than a defect in
    /// the declarations
    pub fn is_environment(self) -> bool {
        (60..80).contains(&self.value())
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EW{:04}", self.value())
    }
}

/// One message produced during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Stable code
    pub code: Code,
    /// Severity
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    /// Class the message is about
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// Member the message is about
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    fn new(code: Code, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            class: None,
            attribute: None,
        }
    }

    /// Error diagnostic
    pub fn error(code: Code, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Error, message)
    }

    /// Warning diagnostic
    pub fn warning(code: Code, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warning, message)
    }

    /// Information diagnostic
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Code::Note, Severity::Information, message)
    }

    /// Debug diagnostic
    pub fn debug(message: impl Into<String>) -> Self {
        Self::new(Code::Note, Severity::Debug, message)
    }

    /// Attach the class this is about
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Attach the member this is about
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this is an error
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.code != Code::Note {
            write!(f, "{}: ", self.code)?;
        }
        f.write_str(&self.message)?;
        match (&self.class, &self.attribute) {
            (Some(class), Some(attribute)) => write!(f, " ({class}::{attribute})"),
            (Some(class), None) => write!(f, " ({class})"),
            _ => Ok(()),
        }
    }
}

/// Weaving stopped early: the error limit was reached or a fatal schema error
/// aborted the module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Halted;

/// Receiver of diagnostics during a run
pub trait DiagnosticSink {
    /// Deliver a diagnostic. `Err(Halted)` tells the caller to stop processing.
    fn emit(&mut self, diagnostic: Diagnostic) -> Result<(), Halted>;
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn emit(&mut self, diagnostic: Diagnostic) -> Result<(), Halted> {
        self.push(diagnostic);
        Ok(())
    }
}

/// Render a help link for a diagnostic from a template such as
/// `https://docs.example.com/errors/{{ code }}`
///
/// Returns `None` for notes and for templates that fail to render.
pub fn help_link(template: &str, diagnostic: &Diagnostic) -> Option<String> {
    if diagnostic.code == Code::Note {
        return None;
    }
    let env = minijinja::Environment::new();
    let ctx = minijinja::context! {
        code => diagnostic.code.to_string(),
        number => diagnostic.code.value(),
        name => format!("{:?}", diagnostic.code),
    };
    match env.render_str(template, ctx) {
        Ok(link) => Some(link),
        Err(err) => {
            tracing::debug!("help link template failed to render: {}", err);
            None
        }
    }
}
