use crate::error::{BmadError, Result};
use crate::router::{self, LifecycleStep};
use crate::state::{ExecutionState, StateManager};
use crate::status::{StatusReader, StatusWriter};
use async_trait::async_trait;
use claude_agent::CANCELLED_EXIT_CODE;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// StageRunner
// ---------------------------------------------------------------------------

/// Runs one named stage for a story and reports its exit code.
#[async_trait]
pub trait StageRunner: Send + Sync {
    async fn run_stage(&self, stage: &str, story_key: &str, cancel: CancellationToken) -> i32;
}

/// Called before each stage with `(index, total, stage)`; `index` is 1-based.
pub type ProgressFn = Box<dyn Fn(usize, usize, &str) + Send + Sync>;

// ---------------------------------------------------------------------------
// LifecycleExecutor
// ---------------------------------------------------------------------------

/// Drives a story from its recorded status to `done`.
///
/// Status only advances after a stage exits `0`. The first failure stops
/// the run; nothing is retried or rolled back.
pub struct LifecycleExecutor {
    runner: Arc<dyn StageRunner>,
    reader: Arc<dyn StatusReader>,
    writer: Arc<dyn StatusWriter>,
    state: Option<StateManager>,
    progress: Option<ProgressFn>,
}

impl LifecycleExecutor {
    pub fn new(
        runner: Arc<dyn StageRunner>,
        reader: Arc<dyn StatusReader>,
        writer: Arc<dyn StatusWriter>,
    ) -> Self {
        Self {
            runner,
            reader,
            writer,
            state: None,
            progress: None,
        }
    }

    /// Checkpoint before every stage and clear on success.
    pub fn with_state(mut self, state: StateManager) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// The stages that would run for `story_key`, without running anything.
    pub fn get_steps(&self, story_key: &str) -> Result<Vec<LifecycleStep>> {
        let status = self.reader.get_status(story_key)?;
        router::plan(status).map_err(|e| for_story(e, story_key))
    }

    pub async fn execute(&self, story_key: &str, cancel: CancellationToken) -> Result<()> {
        let start_status = self.reader.get_status(story_key)?;
        let steps = router::plan(start_status).map_err(|e| for_story(e, story_key))?;
        let total = steps.len();
        tracing::info!(story = story_key, status = %start_status, steps = total, "starting lifecycle");

        for (i, step) in steps.iter().enumerate() {
            if let Some(progress) = &self.progress {
                progress(i + 1, total, step.stage);
            }
            if let Some(state) = &self.state {
                state.save(&ExecutionState {
                    story_key: story_key.to_string(),
                    step_index: i,
                    total_steps: total,
                    start_status,
                })?;
            }

            let exit_code = if cancel.is_cancelled() {
                CANCELLED_EXIT_CODE
            } else {
                let code = self
                    .runner
                    .run_stage(step.stage, story_key, cancel.clone())
                    .await;
                // A stage interrupted mid-run never advances the status.
                if cancel.is_cancelled() && code == 0 {
                    CANCELLED_EXIT_CODE
                } else {
                    code
                }
            };
            if exit_code != 0 {
                tracing::warn!(story = story_key, stage = step.stage, exit_code, "stage failed");
                return Err(BmadError::StageFailed {
                    story: story_key.to_string(),
                    stage: step.stage.to_string(),
                    exit_code,
                });
            }

            self.writer.update_status(story_key, step.next_status)?;
        }

        if let Some(state) = &self.state {
            state.clear()?;
        }
        tracing::info!(story = story_key, "lifecycle complete");
        Ok(())
    }
}

fn for_story(err: BmadError, story_key: &str) -> BmadError {
    match err {
        BmadError::AlreadyComplete(_) => BmadError::AlreadyComplete(story_key.to_string()),
        other => other,
    }
}
