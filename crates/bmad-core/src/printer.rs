//! Presentation seam.
//!
//! Everything user-facing goes through [`Printer`]; the runners never write
//! to stdout themselves. Every method has a no-op default so test printers
//! only implement what they assert on.

use claude_agent::{ToolOutput, ToolUse};
use std::time::Duration;

/// Timing of one stage in a full cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub name: String,
    pub duration: Duration,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryOutcome {
    Completed,
    /// Already `done`; nothing was run.
    Skipped,
    /// Stopped at `stage`. Lookup and routing failures use the pseudo-stages
    /// `status` and `routing`.
    Failed { stage: String, exit_code: i32 },
    /// Not reached because an earlier story failed.
    NotAttempted,
}

/// One story's entry in a queue report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryResult {
    pub key: String,
    pub outcome: StoryOutcome,
    pub duration: Duration,
}

impl StoryResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, StoryOutcome::Completed | StoryOutcome::Skipped)
    }
}

pub trait Printer: Send + Sync {
    // Session
    fn session_start(&self) {}
    fn session_end(&self) {}

    // Step progress; `index` is 1-based.
    fn step_start(&self, _index: usize, _total: usize, _stage: &str) {}

    // Assistant output
    fn tool_use(&self, _tool: &ToolUse) {}
    fn tool_result(&self, _output: &ToolOutput, _truncate_lines: usize) {}
    fn text(&self, _message: &str) {}

    // Full cycle
    fn cycle_header(&self, _story_key: &str, _stages: &[String]) {}
    fn cycle_summary(&self, _story_key: &str, _steps: &[StepResult], _total: Duration) {}
    fn cycle_failed(&self, _story_key: &str, _stage: &str, _elapsed: Duration) {}

    // Queue
    fn queue_header(&self, _story_keys: &[String]) {}
    fn queue_story_start(&self, _index: usize, _total: usize, _story_key: &str) {}
    fn queue_story_skipped(&self, _story_key: &str) {}
    fn queue_summary(&self, _results: &[StoryResult], _total: Duration) {}

    // One assistant invocation
    fn command_header(&self, _label: &str, _prompt: &str, _truncate_length: usize) {}
    fn command_footer(&self, _elapsed: Duration, _exit_code: i32) {}

    fn error(&self, _message: &str) {}
}

/// Prints nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPrinter;

impl Printer for NullPrinter {}

// ---------------------------------------------------------------------------
// Truncation helpers
// ---------------------------------------------------------------------------

/// Cut `s` to at most `max_chars` characters, ending in `...` when cut.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Keep the first and last `max_lines / 2` lines of `output`, replacing the
/// middle with an omission marker. `0` disables truncation.
pub fn truncate_output(output: &str, max_lines: usize) -> String {
    if max_lines == 0 {
        return output.to_string();
    }
    let lines: Vec<&str> = output.split('\n').collect();
    if lines.len() <= max_lines {
        return output.to_string();
    }
    let half = max_lines / 2;
    let omitted = lines.len() - 2 * half;
    format!(
        "{}\n  ... ({} lines omitted) ...\n{}",
        lines[..half].join("\n"),
        omitted,
        lines[lines.len() - half..].join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_strings_untouched() {
        assert_eq!(truncate_str("hello", 60), "hello");
        assert_eq!(truncate_str("", 5), "");
    }

    #[test]
    fn long_strings_get_ellipsis() {
        assert_eq!(truncate_str("abcdefghij", 8), "abcde...");
        assert_eq!(truncate_str("abcdefghij", 8).chars().count(), 8);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_str("→→→→→→", 5), "→→...");
    }

    #[test]
    fn output_under_limit_untouched() {
        let out = "a\nb\nc";
        assert_eq!(truncate_output(out, 20), out);
        assert_eq!(truncate_output(out, 0), out);
    }

    #[test]
    fn output_over_limit_keeps_head_and_tail() {
        let out = (1..=10).map(|n| n.to_string()).collect::<Vec<_>>().join("\n");
        assert_eq!(
            truncate_output(&out, 4),
            "1\n2\n  ... (6 lines omitted) ...\n9\n10"
        );
    }

    #[test]
    fn outcome_success() {
        let result = |outcome| StoryResult {
            key: "k".into(),
            outcome,
            duration: Duration::ZERO,
        };
        assert!(result(StoryOutcome::Completed).is_success());
        assert!(result(StoryOutcome::Skipped).is_success());
        assert!(!result(StoryOutcome::NotAttempted).is_success());
        assert!(!result(StoryOutcome::Failed {
            stage: "dev-story".into(),
            exit_code: 1
        })
        .is_success());
    }
}
