//! User-facing terminal output.
//!
//! Logs go to stderr through `env_logger`; this writes the human summary to
//! stdout and warnings to stderr. Styling is dropped automatically when the
//! stream is not a terminal or `NO_COLOR`/`CLICOLOR=0` is set.

use console::{Term, style};
use std::io;

const RULE_WIDTH: usize = 45;

/// Output manager honouring `--verbose` and `--quiet`.
#[derive(Debug, Clone, Copy)]
pub struct OutputManager {
    verbose: bool,
    quiet: bool,
}

impl OutputManager {
    /// Create an output manager
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    fn line(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        Term::stdout().write_line(message)
    }

    /// Section header
    pub fn section(&self, title: &str) -> io::Result<()> {
        self.line("")?;
        self.line(&section_line(title))
    }

    /// Progress line
    pub fn progress(&self, message: &str) -> io::Result<()> {
        self.line(&format!("{} {message}", style("==>").cyan().bold()))
    }

    /// Success line
    pub fn success(&self, message: &str) -> io::Result<()> {
        self.line(&success_line(message))
    }

    /// Indented detail line
    pub fn indent(&self, message: &str) -> io::Result<()> {
        self.line(&format!("    {message}"))
    }

    /// Only printed with `--verbose`
    pub fn verbose(&self, message: &str) -> io::Result<()> {
        if self.verbose {
            self.line(&format!("    {}", style(message).dim()))
        } else {
            Ok(())
        }
    }

    /// Warnings are printed even in quiet mode.
    pub fn warn(&self, message: &str) -> io::Result<()> {
        Term::stderr().write_line(&warning_line(message))
    }
}

fn section_line(title: &str) -> String {
    let rule = "━".repeat(RULE_WIDTH.saturating_sub(title.chars().count()).max(3));
    format!("{} {}", style(title).bold(), style(rule).dim())
}

fn success_line(message: &str) -> String {
    format!("{} {message}", style("✔").green())
}

fn warning_line(message: &str) -> String {
    format!(
        "{} {}",
        style("warning:").yellow().bold().for_stderr(),
        message
    )
}
