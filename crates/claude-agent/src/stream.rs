use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::process::ClaudeProcess;
use crate::types::{DropCounter, Event, ExecutorConfig};
use crate::{ClaudeAgentError, Result};

/// Exit code reported when the token cancels a process.
pub const CANCELLED_EXIT_CODE: i32 = -1;

// ─── EventStream ──────────────────────────────────────────────────────────

/// An async stream of [`Event`]s from one assistant process.
///
/// A background task owns the [`ClaudeProcess`] and forwards events in the
/// order their lines appear on stdout. The task always runs the process to
/// completion: if the `EventStream` is dropped it keeps draining stdout
/// without forwarding, then reaps the child. The exit code is available via
/// [`EventStream::finish`].
///
/// Cancelling the token kills the process. Events already buffered in the
/// channel are still delivered; nothing new is read.
///
/// ```rust,ignore
/// use futures::StreamExt;
///
/// let mut stream = EventStream::spawn("say hello", &config, cancel)?;
/// while let Some(event) = stream.next().await {
///     if let Some(text) = event?.text() {
///         println!("{text}");
///     }
/// }
/// let exit_code = stream.finish().await?;
/// ```
pub struct EventStream {
    rx: mpsc::Receiver<Result<Event>>,
    exit: oneshot::Receiver<Result<i32>>,
    drops: DropCounter,
}

impl EventStream {
    /// Spawn the assistant and start streaming its events.
    ///
    /// Returns `Err(Startup)` synchronously if the process cannot be started.
    pub fn spawn(prompt: &str, config: &ExecutorConfig, cancel: CancellationToken) -> Result<Self> {
        let process = ClaudeProcess::spawn(prompt, config)?;
        Ok(Self::from_process(process, cancel))
    }

    pub(crate) fn from_process(mut process: ClaudeProcess, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(32);
        let (exit_tx, exit) = oneshot::channel();
        let drops = DropCounter::default();
        let task_drops = drops.clone();

        tokio::spawn(async move {
            let mut forwarding = true;
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::info!("cancellation requested; killing assistant process");
                        process.kill();
                        break;
                    }
                    next = process.next_event(&task_drops) => match next {
                        Ok(Some(event)) => {
                            // Receiver dropped: keep draining so the child never blocks.
                            if forwarding && tx.send(Ok(event)).await.is_err() {
                                forwarding = false;
                            }
                        }
                        Ok(None) => break, // EOF: stdout closed
                        Err(e) => {
                            tracing::warn!(error = %e, "assistant stream failed");
                            if forwarding {
                                let _ = tx.send(Err(e)).await;
                            }
                            process.kill();
                            break;
                        }
                    }
                }
            }
            drop(tx);

            // Stdout may close while the child keeps running; cancellation
            // still has to reach it.
            let waited = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                code = process.wait() => Some(code),
            };
            let exit_code = match waited {
                Some(code) => code,
                None => {
                    process.kill();
                    process.wait().await.map(|_| CANCELLED_EXIT_CODE)
                }
            };
            if let Ok(code) = &exit_code {
                tracing::debug!(exit_code = code, dropped = task_drops.count(), "assistant process exited");
            }
            let _ = exit_tx.send(exit_code);
        });

        EventStream { rx, exit, drops }
    }

    /// A stream that replays `events` and then reports `exit_code`.
    ///
    /// Used for canned executors in tests and dry runs.
    pub fn from_events(events: Vec<Event>, exit_code: i32) -> Self {
        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            // Capacity matches the event count, so this never fails.
            let _ = tx.try_send(Ok(event));
        }
        let (exit_tx, exit) = oneshot::channel();
        let _ = exit_tx.send(Ok(exit_code));
        EventStream {
            rx,
            exit,
            drops: DropCounter::default(),
        }
    }

    /// Number of stdout lines skipped so far because they were not JSON.
    pub fn dropped_lines(&self) -> u64 {
        self.drops.count()
    }

    /// Stop consuming events and wait for the process exit code.
    ///
    /// Any events not yet read are discarded.
    pub async fn finish(self) -> Result<i32> {
        let EventStream { rx, exit, .. } = self;
        drop(rx);
        exit.await.map_err(|_| {
            ClaudeAgentError::Process("event stream ended without an exit status".into())
        })?
    }
}

impl Stream for EventStream {
    type Item = Result<Event>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
