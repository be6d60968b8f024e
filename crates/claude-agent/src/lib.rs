//! `claude-agent`: native Rust driver for the Claude CLI subprocess.
//!
//! Spawns `claude -p <prompt> --output-format stream-json`, reads its stdout
//! one JSON line at a time, and turns each line into a typed [`Event`].
//!
//! # Architecture
//!
//! ```text
//! ExecutorConfig
//!     │
//!     ▼
//! ClaudeProcess   ← spawns `claude --dangerously-skip-permissions -p …`
//!     │              bounded line codec on stdout, stderr drained to a sink
//!     ▼
//! EventStream     ← implements futures::Stream<Item = Result<Event>>
//!     │              background task + mpsc channel, exit code via oneshot
//!     ▼
//! drive()         ← handler adapter: push every event, return exit code
//! ```
//!
//! Malformed lines are skipped, never surfaced as errors; the number skipped
//! is available from [`EventStream::dropped_lines`]. A line longer than
//! [`ExecutorConfig::max_line_bytes`] ends the stream with
//! [`ClaudeAgentError::LineTooLong`].
//!
//! # Quick start
//!
//! ```rust,ignore
//! use claude_agent::{AgentExecutor, ClaudeExecutor, ExecutorConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let exec = ClaudeExecutor::new(ExecutorConfig::default());
//! let code = exec
//!     .execute_with_result("Write a hello-world Rust function.", CancellationToken::new(), &mut |ev| {
//!         if let Some(text) = ev.text() {
//!             println!("{text}");
//!         }
//!     })
//!     .await?;
//! ```

pub mod error;
pub mod runner;
pub mod types;

pub(crate) mod process;
pub mod stream;


pub use error::ClaudeAgentError;
pub use runner::{drive, AgentExecutor, ClaudeExecutor, MockExecutor};
pub use stream::{EventStream, CANCELLED_EXIT_CODE};
pub use types::{
    decode_line, AssistantOutput, DropCounter, Event, ExecutorConfig, LineSink, StreamRecord,
    ToolOutput, ToolUse, DEFAULT_BINARY, DEFAULT_MAX_LINE_BYTES, DEFAULT_OUTPUT_FORMAT,
};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ClaudeAgentError>;
