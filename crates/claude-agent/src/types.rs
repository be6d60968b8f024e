use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ─── Raw protocol records ─────────────────────────────────────────────────

/// One line of `claude --output-format stream-json`, decoded leniently.
///
/// Only the fields the orchestrator reacts to are modelled. Everything else
/// in the record (usage, session ids, model info) is ignored, and missing
/// fields fall back to their defaults so that protocol additions never turn
/// a valid line into a dropped one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamRecord {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub message: Option<MessageContent>,
    /// Shape varies by tool (object for Bash, string for some errors).
    #[serde(default)]
    pub tool_use_result: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessageContent {
    #[serde(default, deserialize_with = "lenient_blocks")]
    pub content: Vec<ContentBlock>,
}

/// A content block inside an assistant (or user) message.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Tool input; its shape depends on the tool.
    #[serde(default)]
    pub input: Option<Value>,
}

/// User messages carry `content` as a plain string; assistant messages as an
/// array of blocks. Anything that is not an array decodes to no blocks, and
/// individual blocks that fail to decode are dropped.
fn lenient_blocks<'de, D>(deserializer: D) -> Result<Vec<ContentBlock>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

// ─── Events ───────────────────────────────────────────────────────────────

/// A decoded unit of the assistant's streamed output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `system` record with subtype `init`.
    SessionStarted,
    /// `assistant` record. One record may carry both a text block and a tool
    /// call; when several blocks of the same kind appear, the last one wins.
    Assistant(AssistantOutput),
    /// `user` record with an attached `tool_use_result` object.
    ToolResult(ToolOutput),
    /// `result` record; the final line of a session.
    SessionComplete,
    /// Any other record type. Carries no payload and is safe to ignore.
    Other { record_type: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssistantOutput {
    pub text: Option<String>,
    pub tool_use: Option<ToolUse>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolUse {
    pub name: String,
    pub description: Option<String>,
    pub command: Option<String>,
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub interrupted: bool,
}

impl Event {
    /// Map a raw record to its event. Never fails: unknown shapes become
    /// [`Event::Other`].
    pub fn from_record(record: &StreamRecord) -> Self {
        match record.kind.as_str() {
            "system" if record.subtype.as_deref() == Some("init") => Event::SessionStarted,
            "assistant" => Event::Assistant(assistant_output(record)),
            "user" => match record.tool_use_result.as_ref().and_then(tool_output) {
                Some(output) => Event::ToolResult(output),
                None => Event::Other {
                    record_type: record.kind.clone(),
                },
            },
            "result" => Event::SessionComplete,
            other => Event::Other {
                record_type: other.to_string(),
            },
        }
    }

    /// Assistant event with non-empty text.
    pub fn is_text(&self) -> bool {
        self.text().is_some()
    }

    /// Assistant event naming a tool.
    pub fn is_tool_use(&self) -> bool {
        self.tool_use().is_some()
    }

    /// Tool result with something on stdout or stderr.
    pub fn is_tool_result(&self) -> bool {
        matches!(self, Event::ToolResult(o) if !o.stdout.is_empty() || !o.stderr.is_empty())
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Event::Assistant(a) => a.text.as_deref().filter(|t| !t.is_empty()),
            _ => None,
        }
    }

    pub fn tool_use(&self) -> Option<&ToolUse> {
        match self {
            Event::Assistant(a) => a.tool_use.as_ref().filter(|t| !t.name.is_empty()),
            _ => None,
        }
    }
}

fn assistant_output(record: &StreamRecord) -> AssistantOutput {
    let mut out = AssistantOutput::default();
    let Some(message) = &record.message else {
        return out;
    };
    for block in &message.content {
        match block.kind.as_str() {
            "text" => out.text = block.text.clone(),
            "tool_use" => {
                let input = block.input.as_ref();
                out.tool_use = Some(ToolUse {
                    name: block.name.clone().unwrap_or_default(),
                    description: input_str(input, "description"),
                    command: input_str(input, "command"),
                    file_path: input_str(input, "file_path"),
                });
            }
            _ => {}
        }
    }
    out
}

fn input_str(input: Option<&Value>, key: &str) -> Option<String> {
    input?
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn tool_output(value: &Value) -> Option<ToolOutput> {
    let obj = value.as_object()?;
    let text = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Some(ToolOutput {
        stdout: text("stdout"),
        stderr: text("stderr"),
        interrupted: obj
            .get("interrupted")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

/// Decode one stdout line. Blank and non-JSON lines yield `None`.
pub fn decode_line(line: &str) -> Option<Event> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str::<StreamRecord>(trimmed)
        .ok()
        .map(|record| Event::from_record(&record))
}

// ─── DropCounter ──────────────────────────────────────────────────────────

/// Counts stdout lines that were skipped because they were not valid JSON.
///
/// Skipping keeps the stream alive across garbled lines; the counter lets a
/// caller notice when the protocol drifts.
#[derive(Debug, Clone, Default)]
pub struct DropCounter(Arc<AtomicU64>);

impl DropCounter {
    pub fn record(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

// ─── ExecutorConfig ───────────────────────────────────────────────────────

/// Receives each stderr line of the assistant process.
pub type LineSink = Arc<dyn Fn(&str) + Send + Sync>;

pub const DEFAULT_BINARY: &str = "claude";
pub const DEFAULT_OUTPUT_FORMAT: &str = "stream-json";
/// Tool output is embedded inline, so single lines can be large.
pub const DEFAULT_MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

/// How to spawn the assistant process.
#[derive(Clone)]
pub struct ExecutorConfig {
    /// Bare name (looked up on `PATH`) or path to the binary.
    pub binary_path: String,
    pub output_format: String,
    pub max_line_bytes: usize,
    pub cwd: Option<PathBuf>,
    /// `None` discards stderr (it is still drained).
    pub stderr_sink: Option<LineSink>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            binary_path: DEFAULT_BINARY.to_string(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            cwd: None,
            stderr_sink: None,
        }
    }
}

impl fmt::Debug for ExecutorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorConfig")
            .field("binary_path", &self.binary_path)
            .field("output_format", &self.output_format)
            .field("max_line_bytes", &self.max_line_bytes)
            .field("cwd", &self.cwd)
            .field("stderr_sink", &self.stderr_sink.is_some())
            .finish()
    }
}
