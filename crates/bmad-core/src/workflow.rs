use crate::config::Config;
use crate::lifecycle::StageRunner;
use crate::printer::{Printer, StepResult};
use async_trait::async_trait;
use claude_agent::{AgentExecutor, Event};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// WorkflowRunner
// ---------------------------------------------------------------------------

/// Runs prompts through an [`AgentExecutor`] and renders the event stream
/// with a [`Printer`].
///
/// All `run_*` methods return a process-style exit code; errors are reported
/// through the printer and mapped to `1`.
pub struct WorkflowRunner<E> {
    executor: E,
    config: Config,
    printer: Arc<dyn Printer>,
}

impl<E: AgentExecutor> WorkflowRunner<E> {
    pub fn new(executor: E, config: Config, printer: Arc<dyn Printer>) -> Self {
        Self {
            executor,
            config,
            printer,
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run one named stage for `story_key`.
    pub async fn run_single(&self, stage: &str, story_key: &str, cancel: CancellationToken) -> i32 {
        let prompt = match self.config.prompt_for(stage, story_key) {
            Ok(prompt) => prompt,
            Err(e) => {
                self.printer.error(&e.to_string());
                return 1;
            }
        };
        self.run_prompt(&prompt, &format!("{stage}: {story_key}"), cancel)
            .await
    }

    /// Run an arbitrary prompt.
    pub async fn run_raw(&self, prompt: &str, cancel: CancellationToken) -> i32 {
        self.run_prompt(prompt, "raw", cancel).await
    }

    /// Run every configured full-cycle stage in order, regardless of the
    /// story's recorded status. Stops at the first failure.
    pub async fn run_full_cycle(&self, story_key: &str, cancel: CancellationToken) -> i32 {
        let started = Instant::now();
        let stages = &self.config.full_cycle.steps;

        let mut prompts = Vec::with_capacity(stages.len());
        for stage in stages {
            match self.config.prompt_for(stage, story_key) {
                Ok(prompt) => prompts.push(prompt),
                Err(e) => {
                    self.printer
                        .error(&format!("error building step {stage}: {e}"));
                    return 1;
                }
            }
        }

        self.printer.cycle_header(story_key, stages);
        let mut results = Vec::with_capacity(stages.len());

        for (i, (stage, prompt)) in stages.iter().zip(&prompts).enumerate() {
            self.printer.step_start(i + 1, stages.len(), stage);
            let step_started = Instant::now();
            let exit_code = self
                .run_prompt(prompt, &format!("{stage}: {story_key}"), cancel.clone())
                .await;
            results.push(StepResult {
                name: stage.clone(),
                duration: step_started.elapsed(),
                success: exit_code == 0,
            });
            if exit_code != 0 {
                self.printer.cycle_failed(story_key, stage, started.elapsed());
                return exit_code;
            }
        }

        self.printer
            .cycle_summary(story_key, &results, started.elapsed());
        0
    }

    async fn run_prompt(&self, prompt: &str, label: &str, cancel: CancellationToken) -> i32 {
        self.printer
            .command_header(label, prompt, self.config.output.truncate_length);
        let started = Instant::now();
        tracing::info!(label, "running assistant");

        let printer = Arc::clone(&self.printer);
        let truncate_lines = self.config.output.truncate_lines;
        let mut handler = move |event: Event| render_event(printer.as_ref(), &event, truncate_lines);

        let exit_code = match self
            .executor
            .execute_with_result(prompt, cancel, &mut handler)
            .await
        {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(label, error = %e, "assistant run failed");
                self.printer.error(&format!("error executing claude: {e}"));
                1
            }
        };

        tracing::info!(label, exit_code, "assistant finished");
        self.printer.command_footer(started.elapsed(), exit_code);
        exit_code
    }
}

#[async_trait]
impl<E: AgentExecutor> StageRunner for WorkflowRunner<E> {
    async fn run_stage(&self, stage: &str, story_key: &str, cancel: CancellationToken) -> i32 {
        self.run_single(stage, story_key, cancel).await
    }
}

fn render_event(printer: &dyn Printer, event: &Event, truncate_lines: usize) {
    match event {
        Event::SessionStarted => printer.session_start(),
        Event::SessionComplete => printer.session_end(),
        Event::ToolResult(output) if event.is_tool_result() => {
            printer.tool_result(output, truncate_lines)
        }
        Event::Assistant(_) => {
            if let Some(text) = event.text() {
                printer.text(text);
            }
            if let Some(tool) = event.tool_use() {
                printer.tool_use(tool);
            }
        }
        _ => {}
    }
}
