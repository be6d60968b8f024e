use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::stream::{EventStream, CANCELLED_EXIT_CODE};
use crate::types::{Event, ExecutorConfig};
use crate::{ClaudeAgentError, Result};

// ─── AgentExecutor ────────────────────────────────────────────────────────

/// Runs the assistant for one prompt.
///
/// `execute` is the fire-and-forget mode: the caller gets the events and the
/// process is reaped in the background whether or not they are consumed.
/// `execute_with_result` is the production mode: it drives every event
/// through `handler` and returns the exit code.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(&self, prompt: &str, cancel: CancellationToken) -> Result<EventStream>;

    async fn execute_with_result(
        &self,
        prompt: &str,
        cancel: CancellationToken,
        handler: &mut (dyn FnMut(Event) + Send),
    ) -> Result<i32> {
        let stream = self.execute(prompt, cancel).await?;
        drive(stream, handler).await
    }
}

/// Feed every event of `stream` to `handler`, then return the exit code.
///
/// A fatal stream error (e.g. an oversized line) is returned as `Err` after
/// the events that preceded it have been handled.
pub async fn drive(mut stream: EventStream, handler: &mut (dyn FnMut(Event) + Send)) -> Result<i32> {
    while let Some(event) = stream.next().await {
        handler(event?);
    }
    stream.finish().await
}

// ─── ClaudeExecutor ───────────────────────────────────────────────────────

/// [`AgentExecutor`] that spawns the real `claude` binary.
#[derive(Debug, Clone, Default)]
pub struct ClaudeExecutor {
    config: ExecutorConfig,
}

impl ClaudeExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }
}

#[async_trait]
impl AgentExecutor for ClaudeExecutor {
    async fn execute(&self, prompt: &str, cancel: CancellationToken) -> Result<EventStream> {
        EventStream::spawn(prompt, &self.config, cancel)
    }
}

// ─── MockExecutor ─────────────────────────────────────────────────────────

/// [`AgentExecutor`] that replays canned events without spawning anything.
///
/// Every call records its prompt. Exit codes are taken from the front of
/// `exit_codes` while it lasts, then `exit_code`; this makes "fail on the Nth
/// call" a one-liner:
///
/// ```rust,ignore
/// let mock = MockExecutor::new(events).with_exit_codes([0, 1]);
/// ```
#[derive(Debug, Default)]
pub struct MockExecutor {
    pub events: Vec<Event>,
    pub exit_code: i32,
    /// When set, every call fails with `Startup` carrying this reason.
    pub startup_error: Option<String>,
    exit_codes: Mutex<VecDeque<i32>>,
    prompts: Mutex<Vec<String>>,
}

impl MockExecutor {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }

    pub fn with_exit_codes(self, codes: impl IntoIterator<Item = i32>) -> Self {
        if let Ok(mut queue) = self.exit_codes.lock() {
            queue.extend(codes);
        }
        self
    }

    pub fn failing_startup(reason: impl Into<String>) -> Self {
        Self {
            startup_error: Some(reason.into()),
            ..Default::default()
        }
    }

    /// Prompts passed to `execute`, in call order.
    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn next_exit_code(&self) -> i32 {
        self.exit_codes
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or(self.exit_code)
    }
}

#[async_trait]
impl AgentExecutor for MockExecutor {
    async fn execute(&self, prompt: &str, cancel: CancellationToken) -> Result<EventStream> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some(reason) = &self.startup_error {
            return Err(ClaudeAgentError::Startup {
                binary: "mock".into(),
                reason: reason.clone(),
            });
        }
        if cancel.is_cancelled() {
            return Ok(EventStream::from_events(Vec::new(), CANCELLED_EXIT_CODE));
        }
        Ok(EventStream::from_events(self.events.clone(), self.next_exit_code()))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssistantOutput;

    fn text(t: &str) -> Event {
        Event::Assistant(AssistantOutput {
            text: Some(t.into()),
            tool_use: None,
        })
    }

    #[tokio::test]
    async fn drive_calls_handler_in_order_and_returns_exit_code() {
        let stream = EventStream::from_events(
            vec![Event::SessionStarted, text("hi"), Event::SessionComplete],
            0,
        );
        let mut seen = Vec::new();
        let code = drive(stream, &mut |e| seen.push(e)).await.unwrap();
        assert_eq!(code, 0);
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1].text(), Some("hi"));
    }

    #[tokio::test]
    async fn execute_with_result_surfaces_nonzero_exit() {
        let mock = MockExecutor::new(vec![Event::SessionStarted]).with_exit_codes([2]);
        let mut count = 0;
        let code = mock
            .execute_with_result("p", CancellationToken::new(), &mut |_| count += 1)
            .await
            .unwrap();
        assert_eq!(code, 2);
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn mock_records_prompts_and_falls_back_to_default_exit() {
        let mock = MockExecutor::new(vec![]).with_exit_codes([1]);
        let first = mock.execute("a", CancellationToken::new()).await.unwrap();
        let second = mock.execute("b", CancellationToken::new()).await.unwrap();
        assert_eq!(first.finish().await.unwrap(), 1);
        assert_eq!(second.finish().await.unwrap(), 0);
        assert_eq!(mock.recorded_prompts(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn mock_startup_error() {
        let mock = MockExecutor::failing_startup("no binary");
        let err = mock
            .execute_with_result("p", CancellationToken::new(), &mut |_| {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no binary"));
    }

    #[tokio::test]
    async fn real_executor_reports_missing_binary() {
        let exec = ClaudeExecutor::new(ExecutorConfig {
            binary_path: "no-such-claude-binary-on-path".into(),
            ..Default::default()
        });
        let err = exec
            .execute("p", CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ClaudeAgentError::Startup { .. }));
    }
}
