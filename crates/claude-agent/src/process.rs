use std::path::{Path, PathBuf};
use std::process::Stdio;

use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};

use crate::types::{decode_line, DropCounter, Event, ExecutorConfig, LineSink};
use crate::{ClaudeAgentError, Result};

// ─── ClaudeProcess ────────────────────────────────────────────────────────

/// A running `claude -p <prompt> --output-format stream-json` subprocess.
///
/// Stdout is split into lines by a length-bounded codec and decoded one line
/// at a time. Stderr is drained by its own task so that a full stderr pipe
/// can never stall stdout, and vice versa.
pub(crate) struct ClaudeProcess {
    child: Child,
    lines: FramedRead<ChildStdout, AnyDelimiterCodec>,
    max_line_bytes: usize,
    stderr_task: Option<JoinHandle<()>>,
}

impl ClaudeProcess {
    /// Spawn the assistant binary with the fixed non-interactive flags.
    ///
    /// `CLAUDECODE` is removed from the environment so this works both from a
    /// terminal and from inside a running Claude session.
    pub(crate) fn spawn(prompt: &str, config: &ExecutorConfig) -> Result<Self> {
        let binary = resolve_binary(&config.binary_path)?;
        let mut cmd = build_command(&binary, prompt, config);
        cmd.env_remove("CLAUDECODE");
        tracing::debug!(binary = %binary.display(), "spawning assistant process");
        Self::from_command(cmd, config).map_err(|e| match e {
            ClaudeAgentError::Io(io) => ClaudeAgentError::Startup {
                binary: config.binary_path.clone(),
                reason: io.to_string(),
            },
            other => other,
        })
    }

    /// Spawn an arbitrary command as a stand-in assistant.
    /// Used in unit tests to inject a command that emits fixed JSON lines.
    #[cfg(test)]
    pub(crate) fn spawn_command(cmd: Command, config: &ExecutorConfig) -> Result<Self> {
        Self::from_command(cmd, config)
    }

    fn from_command(mut cmd: Command, config: &ExecutorConfig) -> Result<Self> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClaudeAgentError::Process("stdout not captured".into()))?;

        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| {
                tokio::spawn(drain_stderr(
                    stderr,
                    config.stderr_sink.clone(),
                    config.max_line_bytes,
                ))
            });

        let codec = AnyDelimiterCodec::new_with_max_length(
            b"\n".to_vec(),
            b"\n".to_vec(),
            config.max_line_bytes,
        );

        Ok(Self {
            child,
            lines: FramedRead::new(stdout, codec),
            max_line_bytes: config.max_line_bytes,
            stderr_task,
        })
    }

    /// Read stdout until the next decodable event.
    ///
    /// Blank lines are skipped. Lines that are not JSON are skipped and
    /// counted in `drops`. Returns `Ok(None)` once stdout is closed.
    pub(crate) async fn next_event(&mut self, drops: &DropCounter) -> Result<Option<Event>> {
        loop {
            let chunk = match self.lines.next().await {
                None => return Ok(None),
                Some(Err(AnyDelimiterCodecError::MaxChunkLengthExceeded)) => {
                    return Err(ClaudeAgentError::LineTooLong {
                        limit: self.max_line_bytes,
                    })
                }
                Some(Err(AnyDelimiterCodecError::Io(e))) => return Err(ClaudeAgentError::Io(e)),
                Some(Ok(chunk)) => chunk,
            };

            let line = String::from_utf8_lossy(&chunk);
            if line.trim().is_empty() {
                continue;
            }
            match decode_line(&line) {
                Some(event) => return Ok(Some(event)),
                None => {
                    drops.record();
                    tracing::debug!(
                        bytes = chunk.len(),
                        dropped = drops.count(),
                        "skipping non-JSON stream line"
                    );
                }
            }
        }
    }

    /// Wait for the child to exit, then for the stderr drain to finish.
    ///
    /// A process killed by a signal reports `-1`.
    pub(crate) async fn wait(&mut self) -> Result<i32> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| ClaudeAgentError::Process(format!("failed to wait for assistant: {e}")))?;
        if let Some(task) = self.stderr_task.take() {
            let _ = task.await;
        }
        Ok(status.code().unwrap_or(-1))
    }

    /// Ask the OS to kill the subprocess (best-effort; errors are ignored).
    pub(crate) fn kill(&mut self) {
        let _ = self.child.start_kill();
    }
}

/// Forward stderr to the sink line by line until EOF.
///
/// Lines are read as raw bytes and decoded lossily, so invalid UTF-8 never
/// stops the drain. A line longer than `max_line_bytes` is delivered in pieces.
async fn drain_stderr(
    stderr: tokio::process::ChildStderr,
    sink: Option<LineSink>,
    max_line_bytes: usize,
) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    let limit = max_line_bytes.max(1) as u64;
    loop {
        buf.clear();
        match (&mut reader).take(limit).read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                if let Some(sink) = &sink {
                    sink(line);
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "stderr drain stopped");
                break;
            }
        }
    }
}

fn resolve_binary(binary: &str) -> Result<PathBuf> {
    which::which(binary).map_err(|e| ClaudeAgentError::Startup {
        binary: binary.to_string(),
        reason: e.to_string(),
    })
}

// ─── Command builder ──────────────────────────────────────────────────────

fn build_command(binary: &Path, prompt: &str, config: &ExecutorConfig) -> Command {
    let mut cmd = Command::new(binary);
    cmd.arg("--dangerously-skip-permissions")
        .arg("--verbose")
        .arg("-p")
        .arg(prompt)
        .arg("--output-format")
        .arg(&config.output_format);

    if let Some(cwd) = &config.cwd {
        cmd.current_dir(cwd);
    }

    cmd
}

// ─── Tests ────────────────────────────────────────────────────────────────
