use crate::error::BmadError;
use crate::lifecycle::{LifecycleExecutor, StageRunner};
use crate::printer::{Printer, StoryOutcome, StoryResult};
use crate::router;
use crate::state::StateManager;
use crate::status::{Status, StatusReader, StatusWriter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// Run only the next stage for each story.
    Single,
    /// Run each story through to `done`.
    Lifecycle,
}

/// Outcome of a whole queue run: one entry per input key, in input order.
#[derive(Debug, Clone)]
pub struct QueueReport {
    pub results: Vec<StoryResult>,
    pub duration: Duration,
}

impl QueueReport {
    pub fn failure(&self) -> Option<&StoryResult> {
        self.results
            .iter()
            .find(|r| matches!(r.outcome, StoryOutcome::Failed { .. }))
    }

    /// `0` when nothing failed, else the failing stage's code (`1` for
    /// non-positive codes).
    pub fn exit_code(&self) -> i32 {
        match self.failure().map(|r| &r.outcome) {
            Some(StoryOutcome::Failed { exit_code, .. }) if *exit_code > 0 => *exit_code,
            Some(_) => 1,
            None => 0,
        }
    }

    pub fn count(&self, pred: impl Fn(&StoryOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Applies routing and execution to a list of stories, strictly in order.
pub struct QueueRunner {
    stages: Arc<dyn StageRunner>,
    reader: Arc<dyn StatusReader>,
    writer: Arc<dyn StatusWriter>,
    printer: Arc<dyn Printer>,
    mode: QueueMode,
    state: Option<StateManager>,
}

impl QueueRunner {
    pub fn new(
        stages: Arc<dyn StageRunner>,
        reader: Arc<dyn StatusReader>,
        writer: Arc<dyn StatusWriter>,
        printer: Arc<dyn Printer>,
        mode: QueueMode,
    ) -> Self {
        Self {
            stages,
            reader,
            writer,
            printer,
            mode,
            state: None,
        }
    }

    /// Checkpoint lifecycle runs (ignored in `Single` mode).
    pub fn with_state(mut self, state: StateManager) -> Self {
        self.state = Some(state);
        self
    }

    pub async fn run(&self, story_keys: &[String], cancel: CancellationToken) -> QueueReport {
        let started = Instant::now();
        let total = story_keys.len();
        let mut results = Vec::with_capacity(total);

        self.printer.queue_header(story_keys);

        for (i, key) in story_keys.iter().enumerate() {
            self.printer.queue_story_start(i + 1, total, key);
            let story_started = Instant::now();
            let outcome = self.run_story(key, cancel.clone()).await;
            let stop = matches!(outcome, StoryOutcome::Failed { .. });
            if outcome == StoryOutcome::Skipped {
                self.printer.queue_story_skipped(key);
            }
            results.push(StoryResult {
                key: key.clone(),
                outcome,
                duration: story_started.elapsed(),
            });
            if stop {
                break;
            }
        }

        for key in &story_keys[results.len()..] {
            results.push(StoryResult {
                key: key.clone(),
                outcome: StoryOutcome::NotAttempted,
                duration: Duration::ZERO,
            });
        }

        let report = QueueReport {
            results,
            duration: started.elapsed(),
        };
        self.printer.queue_summary(&report.results, report.duration);
        report
    }

    async fn run_story(&self, key: &str, cancel: CancellationToken) -> StoryOutcome {
        let status = match self.reader.get_status(key) {
            Ok(status) => status,
            Err(e @ BmadError::UnknownStatus(_)) => return self.fail(key, "routing", 1, &e),
            Err(e) => return self.fail(key, "status", 1, &e),
        };
        if status == Status::Done {
            tracing::info!(story = key, "already done; skipping");
            return StoryOutcome::Skipped;
        }

        match self.mode {
            QueueMode::Single => self.run_single(key, status, cancel).await,
            QueueMode::Lifecycle => self.run_lifecycle(key, cancel).await,
        }
    }

    async fn run_single(&self, key: &str, status: Status, cancel: CancellationToken) -> StoryOutcome {
        let stage = match router::workflow_for(status) {
            Ok(stage) => stage,
            Err(BmadError::AlreadyComplete(_)) => return StoryOutcome::Skipped,
            Err(e) => return self.fail(key, "routing", 1, &e),
        };
        let exit_code = self.stages.run_stage(stage, key, cancel).await;
        if exit_code == 0 {
            StoryOutcome::Completed
        } else {
            StoryOutcome::Failed {
                stage: stage.to_string(),
                exit_code,
            }
        }
    }

    async fn run_lifecycle(&self, key: &str, cancel: CancellationToken) -> StoryOutcome {
        let printer = Arc::clone(&self.printer);
        let mut executor = LifecycleExecutor::new(
            Arc::clone(&self.stages),
            Arc::clone(&self.reader),
            Arc::clone(&self.writer),
        )
        .with_progress(Box::new(move |i, n, stage| printer.step_start(i, n, stage)));
        if let Some(state) = &self.state {
            executor = executor.with_state(state.clone());
        }

        match executor.execute(key, cancel).await {
            Ok(()) => StoryOutcome::Completed,
            Err(BmadError::AlreadyComplete(_)) => StoryOutcome::Skipped,
            Err(BmadError::StageFailed {
                stage, exit_code, ..
            }) => StoryOutcome::Failed { stage, exit_code },
            Err(e @ (BmadError::UnknownStatus(_) | BmadError::InvalidStatus(_))) => {
                self.fail(key, "routing", 1, &e)
            }
            Err(e @ (BmadError::StoryNotFound(_) | BmadError::StoreUnavailable { .. })) => {
                self.fail(key, "status", 1, &e)
            }
            Err(e) => self.fail(key, "lifecycle", 1, &e),
        }
    }

    fn fail(&self, key: &str, stage: &str, exit_code: i32, err: &BmadError) -> StoryOutcome {
        tracing::warn!(story = key, stage, error = %err, "story failed");
        self.printer.error(&err.to_string());
        StoryOutcome::Failed {
            stage: stage.to_string(),
            exit_code,
        }
    }
}
