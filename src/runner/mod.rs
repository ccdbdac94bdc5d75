//! External command execution.
//!
//! Every tool the pipeline drives (build scripts, bundlers, deploy tools,
//! configure/make) goes through the [`Runner`] capability so stage logic can
//! be exercised with a recording fake instead of spawning processes.

mod process;
mod tool_detection;

pub use process::ProcessRunner;
pub use tool_detection::locate_tool;

use std::fmt;
use std::path::{Path, PathBuf};

/// A command to run: program, arguments, working directory and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Working directory; inherits the caller's when `None`
    pub cwd: Option<PathBuf>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Creates a command with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    /// Build from an argument vector (`argv[0]` is the program).
    ///
    /// Returns `None` for an empty vector.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone()).args(args.iter().cloned()))
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Outcome of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitResult {
    /// Exit code; `None` when killed by a signal
    pub code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ExitResult {
    /// A successful result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed result with the given code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Zero exit status
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Human-readable status, e.g. `exited with code 2`
    pub fn status_description(&self) -> String {
        match self.code {
            Some(code) => format!("exited with code {code}"),
            None => "was terminated by a signal".to_string(),
        }
    }

    /// Stdout followed by stderr, trimmed, for diagnostics.
    pub fn combined_output(&self) -> String {
        let stdout = self.stdout.trim_end();
        let stderr = self.stderr.trim_end();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, true) => String::new(),
            (false, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }
}

/// Capability to run external commands.
///
/// Implementations return `Err` only when the command could not be run at all
/// (spawn failure, timeout). A command that ran and exited non-zero is an
/// `Ok` result whose [`ExitResult::success`] is false.
#[allow(async_fn_in_trait)]
pub trait Runner {
    /// Run `command` to completion.
    async fn run(&self, command: &CommandSpec) -> crate::Result<ExitResult>;
}

impl<R: Runner + ?Sized> Runner for &R {
    async fn run(&self, command: &CommandSpec) -> crate::Result<ExitResult> {
        (**self).run(command).await
    }
}
