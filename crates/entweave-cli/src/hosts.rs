//! Hosts used by the CLI
//!
//! Each module file gets its own host. Output is buffered until `on_done` so
//! that modules woven concurrently never interleave their diagnostics.

use std::io::Write;
use std::path::{Path, PathBuf};

use colored::Colorize;
use entweave_core::config::HELP_LINK_TEMPLATE;
use entweave_core::diagnostic::help_link;
use entweave_core::{Code, Diagnostic, WeaverSetup, WeavingHost};

/// A host that reports on one module file
pub trait FileHost: WeavingHost + Send + 'static {
    /// Host for `file`
    fn for_file(file: &Path, verbose: bool) -> Self;

    /// Code of the first error written
    fn first_error(&self) -> Option<Code>;
}

/// Colored, human-oriented output
pub struct ConsoleHost {
    file: PathBuf,
    verbose: bool,
    help_template: Option<String>,
    lines: Vec<String>,
    errors: usize,
    warnings: usize,
    first_error: Option<Code>,
}

impl ConsoleHost {
    fn push(&mut self, label: colored::ColoredString, diagnostic: &Diagnostic) {
        let head = if diagnostic.code == Code::Note {
            format!("{}: {}", label, diagnostic.message)
        } else {
            format!("{}[{}]: {}", label, diagnostic.code, diagnostic.message)
        };
        self.lines.push(head.bold().to_string());

        let location = match (&diagnostic.class, &diagnostic.attribute) {
            (Some(class), Some(attribute)) => format!(" ({class}::{attribute})"),
            (Some(class), None) => format!(" ({class})"),
            _ => String::new(),
        };
        self.lines.push(format!(
            "  {} {}{}",
            "-->".blue(),
            self.file.display(),
            location
        ));

        if let Some(link) = self
            .help_template
            .as_deref()
            .and_then(|template| help_link(template, diagnostic))
        {
            self.lines.push(format!("  {} help: {}", "=".blue(), link));
        }
    }
}

impl FileHost for ConsoleHost {
    fn for_file(file: &Path, verbose: bool) -> Self {
        Self {
            file: file.to_path_buf(),
            verbose,
            help_template: None,
            lines: Vec::new(),
            errors: 0,
            warnings: 0,
            first_error: None,
        }
    }

    fn first_error(&self) -> Option<Code> {
        self.first_error
    }
}

impl WeavingHost for ConsoleHost {
    fn on_setup(&mut self, setup: &WeaverSetup) {
        self.help_template = setup.property(HELP_LINK_TEMPLATE).map(str::to_string);
    }

    fn write_debug(&mut self, diagnostic: &Diagnostic) {
        if self.verbose {
            self.lines
                .push(format!("{}: {}", "debug".dimmed(), diagnostic.message));
        }
    }

    fn write_information(&mut self, diagnostic: &Diagnostic) {
        if self.verbose {
            self.lines
                .push(format!("{}: {}", "info".cyan(), diagnostic.message));
        }
    }

    fn write_warning(&mut self, diagnostic: &Diagnostic) {
        self.warnings += 1;
        self.push("warning".yellow(), diagnostic);
    }

    fn write_error(&mut self, diagnostic: &Diagnostic) {
        self.errors += 1;
        self.first_error.get_or_insert(diagnostic.code);
        self.push("error".red(), diagnostic);
    }

    fn on_done(&mut self, success: bool) {
        let mut stderr = std::io::stderr().lock();
        for line in self.lines.drain(..) {
            let _ = writeln!(stderr, "{line}");
        }
        drop(stderr);

        if success {
            println!("{} {}", "✓".green(), self.file.display());
        } else {
            println!(
                "{} {} ({} errors, {} warnings)",
                "✗".red(),
                self.file.display(),
                self.errors,
                self.warnings
            );
        }
    }
}

/// MSBuild-style canonical error lines for build integrations
///
/// `file: error EW0012: message [help]`
pub struct BuildTaskHost {
    file: PathBuf,
    verbose: bool,
    help_template: Option<String>,
    lines: Vec<String>,
    first_error: Option<Code>,
}

impl BuildTaskHost {
    fn push(&mut self, category: &str, diagnostic: &Diagnostic) {
        let mut line = format!(
            "{}: {} {}: {}",
            self.file.display(),
            category,
            diagnostic.code,
            diagnostic.message
        );
        if let Some(class) = &diagnostic.class {
            line.push_str(&format!(" ({class})"));
        }
        if let Some(link) = self
            .help_template
            .as_deref()
            .and_then(|template| help_link(template, diagnostic))
        {
            line.push_str(&format!(" [{link}]"));
        }
        self.lines.push(line);
    }
}

impl FileHost for BuildTaskHost {
    fn for_file(file: &Path, verbose: bool) -> Self {
        Self {
            file: file.to_path_buf(),
            verbose,
            help_template: None,
            lines: Vec::new(),
            first_error: None,
        }
    }

    fn first_error(&self) -> Option<Code> {
        self.first_error
    }
}

impl WeavingHost for BuildTaskHost {
    fn on_setup(&mut self, setup: &WeaverSetup) {
        self.help_template = setup.property(HELP_LINK_TEMPLATE).map(str::to_string);
    }

    fn write_debug(&mut self, _diagnostic: &Diagnostic) {}

    fn write_information(&mut self, diagnostic: &Diagnostic) {
        if self.verbose {
            self.lines
                .push(format!("{}: {}", self.file.display(), diagnostic.message));
        }
    }

    fn write_warning(&mut self, diagnostic: &Diagnostic) {
        self.push("warning", diagnostic);
    }

    fn write_error(&mut self, diagnostic: &Diagnostic) {
        self.first_error.get_or_insert(diagnostic.code);
        self.push("error", diagnostic);
    }

    fn on_done(&mut self, _success: bool) {
        let mut stdout = std::io::stdout().lock();
        for line in self.lines.drain(..) {
            let _ = writeln!(stdout, "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_task_line_format() {
        let setup = WeaverSetup::new("fleet.yaml")
            .with_property(HELP_LINK_TEMPLATE, "https://docs.example.com/{{ code }}");
        let mut host = BuildTaskHost::for_file(Path::new("models/fleet.yaml"), false);
        host.on_setup(&setup);
        host.write_error(
            &Diagnostic::error(Code::ReservedNameCollision, "reserved name").with_class("fleet.Car"),
        );

        assert_eq!(
            host.lines,
            [
                "models/fleet.yaml: error EW0012: reserved name (fleet.Car) [https://docs.example.com/EW0012]"
            ]
        );
        assert_eq!(host.first_error(), Some(Code::ReservedNameCollision));
    }

    #[test]
    fn test_console_hides_debug_unless_verbose() {
        let mut quiet = ConsoleHost::for_file(Path::new("m.yaml"), false);
        quiet.write_debug(&Diagnostic::debug("extracting"));
        assert!(quiet.lines.is_empty());

        let mut verbose = ConsoleHost::for_file(Path::new("m.yaml"), true);
        verbose.write_debug(&Diagnostic::debug("extracting"));
        assert_eq!(verbose.lines.len(), 1);
    }

    #[test]
    fn test_console_records_first_error() {
        let mut host = ConsoleHost::for_file(Path::new("m.yaml"), false);
        host.write_warning(&Diagnostic::warning(Code::UnwovenReference, "unwoven"));
        host.write_error(&Diagnostic::error(Code::AmbiguousRole, "ambiguous"));
        host.write_error(&Diagnostic::error(Code::DuplicateClass, "duplicate"));

        assert_eq!(host.first_error(), Some(Code::AmbiguousRole));
        assert_eq!(host.errors, 2);
        assert_eq!(host.warnings, 1);
    }
}
