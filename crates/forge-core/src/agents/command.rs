//! Process-backed agent and review oracle
//!
//! Both adapters run a configured command line, write their payload to the
//! child's stdin and read its stdout. The child is killed when the call times
//! out or its output exceeds the cap.

use std::collections::HashMap;
use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

use super::traits::{ReviewKind, ReviewOracle, TaskAgent};
use crate::domain::blueprint::Blueprint;
use crate::error::{Error, Result};

/// Default review timeout (3 minutes)
pub const DEFAULT_REVIEW_TIMEOUT: Duration = Duration::from_secs(180);

/// Default output cap (10 MiB)
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Failure to run an external command
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("output exceeded {0} bytes")]
    OutputTooLarge(usize),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// A parsed command line with its limits
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    max_output_bytes: usize,
}

impl CommandRunner {
    /// Parse a command line with shell quoting rules
    pub fn parse(command_line: &str) -> Result<Self> {
        let mut words = shell_words::split(command_line).map_err(|e| {
            Error::InvalidInput(format!("failed to parse command '{}': {}", command_line, e))
        })?;
        if words.is_empty() {
            return Err(Error::InvalidInput("command is empty".to_string()));
        }
        let program = words.remove(0);
        Ok(Self {
            program,
            args: words,
            timeout: DEFAULT_REVIEW_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run the command with `input` on stdin
    pub async fn run(
        &self,
        input: &str,
        env: &HashMap<&str, String>,
    ) -> std::result::Result<CommandOutput, CommandError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(env.iter().map(|(k, v)| (*k, v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let limit = self.max_output_bytes;
        let run = async {
            let mut child = command.spawn().map_err(|source| CommandError::Spawn {
                program: self.program.clone(),
                source,
            })?;

            let stdin = child.stdin.take();
            let write = async move {
                if let Some(mut stdin) = stdin {
                    stdin.write_all(input.as_bytes()).await?;
                    stdin.shutdown().await?;
                }
                Ok::<(), io::Error>(())
            };

            let (written, stdout, stderr) = tokio::join!(
                write,
                read_capped(child.stdout.take(), limit),
                read_capped(child.stderr.take(), limit),
            );

            let (stdout, too_large) = stdout?;
            if too_large {
                return Err(CommandError::OutputTooLarge(limit));
            }
            let (stderr, _) = stderr?;
            // A child that never reads stdin closes the pipe early; that is fine.
            if let Err(e) = written {
                if e.kind() != io::ErrorKind::BrokenPipe {
                    return Err(CommandError::Io(e));
                }
            }

            let status = child.wait().await?;
            Ok(CommandOutput {
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                exit_code: status.code(),
            })
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(CommandError::Timeout(self.timeout)),
        }
    }
}

async fn read_capped<R: AsyncRead + Unpin>(
    reader: Option<R>,
    limit: usize,
) -> io::Result<(Vec<u8>, bool)> {
    let Some(reader) = reader else {
        return Ok((Vec::new(), false));
    };
    let mut buf = Vec::new();
    reader.take(limit as u64 + 1).read_to_end(&mut buf).await?;
    let too_large = buf.len() > limit;
    Ok((buf, too_large))
}

/// Review oracle backed by an external command
///
/// The content goes to stdin and `FORGE_REVIEW_KIND` names the review. A
/// non-zero exit that still printed a verdict is returned as that verdict.
#[derive(Debug, Clone)]
pub struct CommandReviewOracle {
    runner: CommandRunner,
}

impl CommandReviewOracle {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ReviewOracle for CommandReviewOracle {
    async fn review(&self, kind: ReviewKind, content: &str) -> Result<String> {
        let env = HashMap::from([("FORGE_REVIEW_KIND", kind.as_str().to_string())]);
        let output = self
            .runner
            .run(content, &env)
            .await
            .map_err(|e| Error::ReviewOracleFailure(format!("{}: {}", self.runner.program(), e)))?;

        if output.stdout.trim().is_empty() {
            return Err(Error::ReviewOracleFailure(format!(
                "{} produced no verdict (exit {:?}): {}",
                self.runner.program(),
                output.exit_code,
                output.stderr.trim()
            )));
        }
        if !output.success() {
            warn!(
                kind = %kind,
                exit_code = ?output.exit_code,
                "Review oracle exited non-zero, using its output as the verdict"
            );
        }
        debug!(kind = %kind, bytes = output.stdout.len(), "Review oracle answered");
        Ok(output.stdout)
    }
}

/// Task agent backed by an external command
///
/// The blueprint goes to stdin as JSON; `FORGE_TASK_ID` and
/// `FORGE_SESSION_ID` are set in the environment. Stdout is the summary.
#[derive(Debug, Clone)]
pub struct CommandAgent {
    runner: CommandRunner,
    session_id: String,
}

impl CommandAgent {
    pub fn new(runner: CommandRunner, session_id: impl Into<String>) -> Self {
        Self {
            runner,
            session_id: session_id.into(),
        }
    }
}

#[async_trait]
impl TaskAgent for CommandAgent {
    async fn invoke(&self, blueprint: &Blueprint) -> Result<String> {
        let payload = serde_json::to_string(blueprint)?;
        let env = HashMap::from([
            ("FORGE_TASK_ID", blueprint.id.clone()),
            ("FORGE_SESSION_ID", self.session_id.clone()),
        ]);

        let output = self
            .runner
            .run(&payload, &env)
            .await
            .map_err(|e| Error::AgentFailure {
                task_id: blueprint.id.clone(),
                reason: e.to_string(),
            })?;

        if !output.success() && output.stdout.trim().is_empty() {
            return Err(Error::AgentFailure {
                task_id: blueprint.id.clone(),
                reason: format!("exit {:?}: {}", output.exit_code, output.stderr.trim()),
            });
        }
        Ok(output.stdout)
    }
}
