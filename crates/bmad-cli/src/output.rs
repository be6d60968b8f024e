use bmad_core::printer::{truncate_output, truncate_str, Printer, StepResult, StoryOutcome, StoryResult};
use claude_agent::{ToolOutput, ToolUse};
use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let render = |cells: Vec<String>| {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:width$}", cell, width = widths.get(i).copied().unwrap_or(0)))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", render(headers.iter().map(|h| h.to_string()).collect()));
    println!("{}", render(widths.iter().map(|&w| "-".repeat(w)).collect()));
    for row in rows {
        println!("{}", render(row));
    }
}

// ---------------------------------------------------------------------------
// TerminalPrinter
// ---------------------------------------------------------------------------

const ICON_SUCCESS: &str = "✓";
const ICON_ERROR: &str = "✗";
const ICON_PENDING: &str = "○";
const ICON_ACTIVE: &str = "●";
const ICON_SKIPPED: &str = "↷";
const TOOL_OPEN: &str = "┌─";
const TOOL_LINE: &str = "│";
const TOOL_CLOSE: &str = "└─";

/// Plain-text [`Printer`] over any writer.
///
/// Write errors are ignored: losing a progress line must never fail a stage.
pub struct TerminalPrinter<W> {
    out: Mutex<W>,
}

impl TerminalPrinter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, text: &str) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{text}");
            let _ = out.flush();
        }
    }

    fn divider(&self) {
        self.emit(&"═".repeat(65));
    }
}

fn rule() -> String {
    "─".repeat(50)
}

fn millis(d: Duration) -> String {
    format!("{:.3}s", d.as_secs_f64())
}

fn secs(d: Duration) -> String {
    format!("{}s", d.as_secs())
}

impl<W: Write + Send> Printer for TerminalPrinter<W> {
    fn session_start(&self) {
        self.emit(&format!("{ICON_ACTIVE} Session started\n"));
    }

    fn session_end(&self) {
        self.emit(&format!("{ICON_ACTIVE} Session complete"));
    }

    fn step_start(&self, index: usize, total: usize, stage: &str) {
        self.emit(&format!("[{index}/{total}] {stage}"));
    }

    fn tool_use(&self, tool: &ToolUse) {
        let mut lines = vec![format!("{TOOL_OPEN} Tool: {}", tool.name)];
        if let Some(description) = &tool.description {
            lines.push(format!("{TOOL_LINE}  {description}"));
        }
        if let Some(command) = &tool.command {
            lines.push(format!("{TOOL_LINE}  $ {command}"));
        }
        if let Some(path) = &tool.file_path {
            lines.push(format!("{TOOL_LINE}  File: {path}"));
        }
        lines.push(TOOL_CLOSE.to_string());
        self.emit(&lines.join("\n"));
    }

    fn tool_result(&self, output: &ToolOutput, truncate_lines: usize) {
        if !output.stdout.is_empty() {
            let body = truncate_output(&output.stdout, truncate_lines);
            self.emit(&format!("   {}\n", body.replace('\n', "\n   ")));
        }
        if !output.stderr.is_empty() {
            self.emit(&format!("   [stderr] {}\n", output.stderr));
        }
    }

    fn text(&self, message: &str) {
        self.emit(&format!("Claude: {message}\n"));
    }

    fn cycle_header(&self, story_key: &str, stages: &[String]) {
        self.emit(&format!(
            "\nBMAD Full Cycle: {story_key}\nSteps: {}\n",
            stages.join(" → ")
        ));
    }

    fn cycle_summary(&self, story_key: &str, steps: &[StepResult], total: Duration) {
        let mut lines = vec![
            format!("{ICON_SUCCESS} CYCLE COMPLETE"),
            format!("Story: {story_key}"),
            rule(),
        ];
        for (i, step) in steps.iter().enumerate() {
            lines.push(format!("[{}] {:<15} {}", i + 1, step.name, millis(step.duration)));
        }
        lines.push(rule());
        lines.push(format!("Total: {}", millis(total)));
        self.emit(&lines.join("\n"));
    }

    fn cycle_failed(&self, story_key: &str, stage: &str, elapsed: Duration) {
        self.emit(&format!(
            "{ICON_ERROR} CYCLE FAILED\nStory: {story_key}\nFailed at: {stage}\nDuration: {}",
            millis(elapsed)
        ));
    }

    fn queue_header(&self, story_keys: &[String]) {
        self.emit(&format!(
            "\nBMAD Queue: {} stories\nStories: {}\n",
            story_keys.len(),
            truncate_str(&story_keys.join(", "), 50)
        ));
    }

    fn queue_story_start(&self, index: usize, total: usize, story_key: &str) {
        self.emit(&format!("QUEUE [{index}/{total}]: {story_key}"));
    }

    fn queue_story_skipped(&self, _story_key: &str) {
        self.emit(&format!("  {ICON_SKIPPED} Skipped (already done)\n"));
    }

    fn queue_summary(&self, results: &[StoryResult], total: Duration) {
        let completed = results.iter().filter(|r| r.is_success()).count();
        let failed = results
            .iter()
            .filter(|r| matches!(r.outcome, StoryOutcome::Failed { .. }))
            .count();
        let remaining = results
            .iter()
            .filter(|r| r.outcome == StoryOutcome::NotAttempted)
            .count();

        let headline = if failed == 0 && remaining == 0 {
            format!("{ICON_SUCCESS} QUEUE COMPLETE")
        } else {
            format!("{ICON_ERROR} QUEUE STOPPED")
        };
        let mut lines = vec![
            headline,
            rule(),
            format!("Completed: {completed} | Failed: {failed} | Remaining: {remaining}"),
            rule(),
        ];
        for r in results {
            let line = match &r.outcome {
                StoryOutcome::Completed => format!("{ICON_SUCCESS} {:<30} {}", r.key, secs(r.duration)),
                StoryOutcome::Skipped => format!("{ICON_SUCCESS} {:<30} (already done)", r.key),
                StoryOutcome::Failed { stage, exit_code } => format!(
                    "{ICON_ERROR} {:<30} {} (failed at {stage}, exit code {exit_code})",
                    r.key,
                    secs(r.duration)
                ),
                StoryOutcome::NotAttempted => format!("{ICON_PENDING} {:<30} (skipped)", r.key),
            };
            lines.push(line);
        }
        lines.push(rule());
        lines.push(format!("Total: {}", secs(total)));
        self.emit(&lines.join("\n"));
    }

    fn command_header(&self, label: &str, prompt: &str, truncate_length: usize) {
        self.divider();
        self.emit(&format!("  Command: {label}"));
        self.emit(&format!("  Prompt:  {}", truncate_str(prompt, truncate_length)));
        self.divider();
        self.emit("");
    }

    fn command_footer(&self, elapsed: Duration, exit_code: i32) {
        self.emit("");
        self.divider();
        if exit_code == 0 {
            self.emit(&format!("  {ICON_SUCCESS} SUCCESS | Duration: {}", millis(elapsed)));
        } else {
            self.emit(&format!(
                "  {ICON_ERROR} FAILED | Duration: {} | Exit code: {exit_code}",
                millis(elapsed)
            ));
        }
        self.divider();
    }

    fn error(&self, message: &str) {
        self.emit(&format!("  Error: {message}"));
    }
}
