//! Process-spawning runner backed by `tokio::process`.

use super::{CommandSpec, ExitResult, Runner, locate_tool};
use crate::error::{PipelineError, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

/// Default limit for a single external command (1 hour).
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(3600);

/// Runs commands as child processes, streaming their output to the log.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
    echo: bool,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl ProcessRunner {
    /// Creates a runner that kills commands running longer than `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            echo: true,
        }
    }

    /// Echo child stdout lines at info level (default) or debug level.
    pub fn echo_output(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

impl Runner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ExitResult> {
        let display = spec.to_string();
        log::info!("==> {}", display);

        let search_path = spec
            .env
            .iter()
            .rev()
            .find(|(key, _)| key == "PATH")
            .map(|(_, value)| value.as_str());
        let program = locate_tool(&spec.program, spec.cwd.as_deref(), search_path).ok_or_else(|| {
            PipelineError::Process {
                command: display.clone(),
                reason: format!("`{}` not found", spec.program),
            }
        })?;

        let mut command = Command::new(&program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|e| PipelineError::Process {
            command: display.clone(),
            reason: e.to_string(),
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let echo = self.echo;

        // Both pipes must drain before wait() or a chatty child can block on a full pipe.
        let collect = async {
            tokio::join!(
                read_stream(stdout, echo),
                read_stream(stderr, false),
                child.wait()
            )
        };
        let outcome = tokio::time::timeout(self.timeout, collect).await;

        let (stdout, stderr, status) = match outcome {
            Ok(result) => result,
            Err(_elapsed) => {
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill `{}` after timeout: {}", display, e);
                }
                return Err(PipelineError::Process {
                    command: display,
                    reason: format!("timed out after {} seconds", self.timeout.as_secs()),
                });
            }
        };

        let status = status.map_err(|e| PipelineError::Process {
            command: display.clone(),
            reason: e.to_string(),
        })?;

        let result = ExitResult {
            code: status.code(),
            stdout,
            stderr,
        };
        if !result.success() {
            log::debug!("`{}` {}", display, result.status_description());
        }
        Ok(result)
    }
}

async fn read_stream<R>(stream: Option<R>, echo: bool) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return String::new();
    };

    let mut captured = String::new();
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if echo {
            log::info!("    {}", line);
        } else {
            log::debug!("    {}", line);
        }
        captured.push_str(&line);
        captured.push('\n');
    }
    captured
}
