//! Weaving host protocol
//!
//! A host observes one run through a strictly ordered lifecycle:
//!
//! ```text
//! on_setup -> on_start -> { write_debug | write_information | write_warning | write_error }* -> on_done
//! ```
//!
//! The engine emits every level unconditionally; filtering is up to the host.
//! [`Session`] sits between the engine and the host and enforces the protocol:
//! it counts errors, stops the run once the error limit is reached and makes
//! sure a failed run always reports at least one error.

use crate::config::WeaverSetup;
use crate::diagnostic::{Code, Diagnostic, DiagnosticSink, Halted, Severity};

/// Observer and controller of a weaving run
pub trait WeavingHost {
    /// Receives the run's configuration
    fn on_setup(&mut self, _setup: &WeaverSetup) {}

    /// The run starts
    fn on_start(&mut self) {}

    /// Engine internals
    fn write_debug(&mut self, diagnostic: &Diagnostic);

    /// Progress
    fn write_information(&mut self, diagnostic: &Diagnostic);

    /// Non-fatal problem
    fn write_warning(&mut self, diagnostic: &Diagnostic);

    /// Error; the run will fail
    fn write_error(&mut self, diagnostic: &Diagnostic);

    /// The run finished
    fn on_done(&mut self, success: bool);

    /// Error limit set by the host itself. Overrides the `MaxErrors` property.
    fn max_errors(&self) -> Option<usize> {
        None
    }
}

/// Final state of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// Value passed to `on_done`
    pub success: bool,
    /// Errors written
    pub errors: usize,
    /// Warnings written
    pub warnings: usize,
    /// Code of the first error written
    pub first_error: Option<Code>,
}

/// One run's view of its host
pub struct Session<'h> {
    host: &'h mut dyn WeavingHost,
    max_errors: Option<usize>,
    errors: usize,
    warnings: usize,
    first_error: Option<Code>,
    halted: bool,
}

impl<'h> Session<'h> {
    /// Announce the run to the host and start it
    pub fn begin(host: &'h mut dyn WeavingHost, setup: &WeaverSetup) -> Self {
        host.on_setup(setup);
        host.on_start();

        let (configured, malformed) = match setup.max_errors() {
            Ok(max) => (max, None),
            Err(raw) => (None, Some(raw)),
        };
        let max_errors = host.max_errors().or(configured);

        let mut session = Self {
            host,
            max_errors,
            errors: 0,
            warnings: 0,
            first_error: None,
            halted: false,
        };
        if let Some(raw) = malformed {
            session.write(Diagnostic::warning(
                Code::InvalidInput,
                format!("ignoring MaxErrors = '{raw}': expected a positive integer"),
            ));
        }
        session
    }

    /// Write a diagnostic regardless of the error limit
    ///
    /// For notes about the run itself and for environment failures, which
    /// must reach the host even after the limit stopped processing.
    pub fn write(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Debug => self.host.write_debug(&diagnostic),
            Severity::Information => self.host.write_information(&diagnostic),
            Severity::Warning => {
                self.warnings += 1;
                self.host.write_warning(&diagnostic);
            }
            Severity::Error => {
                self.errors += 1;
                self.first_error.get_or_insert(diagnostic.code);
                self.host.write_error(&diagnostic);
            }
        }
    }

    /// Number of errors written so far
    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// Number of warnings written so far
    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    /// Code of the first error written
    pub fn first_error(&self) -> Option<Code> {
        self.first_error
    }

    /// Whether the error limit stopped the run
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Finish the run
    ///
    /// A run that wrote errors is never successful. A failed run that wrote no
    /// error gets an [`Code::UnspecifiedFailure`] before `on_done`.
    pub fn finish(mut self, success: bool) -> Summary {
        let success = success && self.errors == 0;
        if !success && self.errors == 0 {
            self.write(Diagnostic::error(
                Code::UnspecifiedFailure,
                "weaving failed without reporting a specific error",
            ));
        }
        self.host.on_done(success);
        Summary {
            success,
            errors: self.errors,
            warnings: self.warnings,
            first_error: self.first_error,
        }
    }
}

impl DiagnosticSink for Session<'_> {
    fn emit(&mut self, diagnostic: Diagnostic) -> Result<(), Halted> {
        if self.halted {
            return Err(Halted);
        }

        let is_error = diagnostic.is_error();
        self.write(diagnostic);

        if is_error && self.max_errors.is_some_and(|max| self.errors >= max) {
            tracing::debug!("error limit of {} reached", self.errors);
            self.halted = true;
            return Err(Halted);
        }
        Ok(())
    }
}

/// Lifecycle event recorded by [`CollectingHost`]
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// `on_setup`
    Setup,
    /// `on_start`
    Start,
    /// `write_debug`
    Debug(Diagnostic),
    /// `write_information`
    Information(Diagnostic),
    /// `write_warning`
    Warning(Diagnostic),
    /// `write_error`
    Error(Diagnostic),
    /// `on_done`
    Done(bool),
}

/// Host that records every call, for test harnesses
#[derive(Debug, Default)]
pub struct CollectingHost {
    /// Calls in order
    pub events: Vec<HostEvent>,
    max_errors: Option<usize>,
}

impl CollectingHost {
    /// Create an empty host
    pub fn new() -> Self {
        Self::default()
    }

    /// Host that stops runs after `max` errors
    pub fn with_max_errors(max: usize) -> Self {
        Self {
            events: Vec::new(),
            max_errors: Some(max),
        }
    }

    /// Errors written, in order
    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.events
            .iter()
            .filter_map(|event| match event {
                HostEvent::Error(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    /// Warnings written, in order
    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.events
            .iter()
            .filter_map(|event| match event {
                HostEvent::Warning(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    /// Outcome passed to `on_done`, if the run finished
    pub fn outcome(&self) -> Option<bool> {
        self.events.iter().rev().find_map(|event| match event {
            HostEvent::Done(success) => Some(*success),
            _ => None,
        })
    }
}

impl WeavingHost for CollectingHost {
    fn on_setup(&mut self, _setup: &WeaverSetup) {
        self.events.push(HostEvent::Setup);
    }

    fn on_start(&mut self) {
        self.events.push(HostEvent::Start);
    }

    fn write_debug(&mut self, diagnostic: &Diagnostic) {
        self.events.push(HostEvent::Debug(diagnostic.clone()));
    }

    fn write_information(&mut self, diagnostic: &Diagnostic) {
        self.events.push(HostEvent::Information(diagnostic.clone()));
    }

    fn write_warning(&mut self, diagnostic: &Diagnostic) {
        self.events.push(HostEvent::Warning(diagnostic.clone()));
    }

    fn write_error(&mut self, diagnostic: &Diagnostic) {
        self.events.push(HostEvent::Error(diagnostic.clone()));
    }

    fn on_done(&mut self, success: bool) {
        self.events.push(HostEvent::Done(success));
    }

    fn max_errors(&self) -> Option<usize> {
        self.max_errors
    }
}

/// Host that forwards diagnostics to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHost;

impl WeavingHost for TracingHost {
    fn on_setup(&mut self, setup: &WeaverSetup) {
        tracing::info!("weaving {}", setup.input.display());
    }

    fn write_debug(&mut self, diagnostic: &Diagnostic) {
        tracing::debug!("{}", diagnostic);
    }

    fn write_information(&mut self, diagnostic: &Diagnostic) {
        tracing::info!("{}", diagnostic);
    }

    fn write_warning(&mut self, diagnostic: &Diagnostic) {
        tracing::warn!("{}", diagnostic);
    }

    fn write_error(&mut self, diagnostic: &Diagnostic) {
        tracing::error!("{}", diagnostic);
    }

    fn on_done(&mut self, success: bool) {
        tracing::info!(success, "weaving finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_ERRORS;

    fn setup() -> WeaverSetup {
        WeaverSetup::new("m.yaml")
    }

    fn error() -> Diagnostic {
        Diagnostic::error(Code::AmbiguousRole, "ambiguous")
    }

    #[test]
    fn test_lifecycle_order() {
        let mut host = CollectingHost::new();
        let mut session = Session::begin(&mut host, &setup());
        session.emit(Diagnostic::debug("parsing")).unwrap();
        session.emit(Diagnostic::info("woven")).unwrap();
        assert!(session.finish(true).success);

        assert_eq!(
            host.events,
            [
                HostEvent::Setup,
                HostEvent::Start,
                HostEvent::Debug(Diagnostic::debug("parsing")),
                HostEvent::Information(Diagnostic::info("woven")),
                HostEvent::Done(true),
            ]
        );
    }

    #[test]
    fn test_failure_without_error_is_explained() {
        let mut host = CollectingHost::new();
        let session = Session::begin(&mut host, &setup());
        let summary = session.finish(false);
        assert!(!summary.success);
        assert_eq!(summary.first_error, Some(Code::UnspecifiedFailure));

        let errors = host.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, Code::UnspecifiedFailure);
        assert_eq!(host.outcome(), Some(false));
    }

    #[test]
    fn test_errors_fail_the_run() {
        let mut host = CollectingHost::new();
        let mut session = Session::begin(&mut host, &setup());
        session.emit(error()).unwrap();
        assert_eq!(session.first_error(), Some(Code::AmbiguousRole));
        assert!(!session.finish(true).success);
        assert_eq!(host.errors().len(), 1);
    }

    #[test]
    fn test_max_errors_from_property() {
        let setup = setup().with_property(MAX_ERRORS, "2");
        let mut host = CollectingHost::new();
        let mut session = Session::begin(&mut host, &setup);

        assert!(session.emit(error()).is_ok());
        assert_eq!(session.emit(error()), Err(Halted));
        assert_eq!(session.emit(error()), Err(Halted));
        assert!(session.is_halted());
        session.write(Diagnostic::error(Code::CacheWrite, "disk full"));
        assert_eq!(session.finish(false).errors, 3);

        assert_eq!(host.errors().len(), 3);
        assert_eq!(host.errors()[2].code, Code::CacheWrite);
    }

    #[test]
    fn test_host_limit_overrides_property() {
        let setup = setup().with_property(MAX_ERRORS, "10");
        let mut host = CollectingHost::with_max_errors(1);
        let mut session = Session::begin(&mut host, &setup);
        assert_eq!(session.emit(error()), Err(Halted));
    }

    #[test]
    fn test_malformed_max_errors_is_a_warning() {
        let setup = setup().with_property(MAX_ERRORS, "lots");
        let mut host = CollectingHost::new();
        let mut session = Session::begin(&mut host, &setup);
        for _ in 0..5 {
            assert!(session.emit(error()).is_ok());
        }
        assert_eq!(session.warning_count(), 1);
        session.finish(false);
        assert!(host.warnings()[0].message.contains("lots"));
    }
}
