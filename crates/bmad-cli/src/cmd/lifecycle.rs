use super::{block_on, App};
use anyhow::Context;
use bmad_core::{BmadError, LifecycleExecutor, LifecycleStep, Printer};
use std::path::Path;
use std::sync::Arc;

pub fn run(root: &Path, story: &str, dry_run: bool) -> anyhow::Result<()> {
    let app = App::load(root)?;
    run_story(&app, story, dry_run)
}

pub fn run_story(app: &App, story: &str, dry_run: bool) -> anyhow::Result<()> {
    let executor = executor(app);

    if dry_run {
        return match executor.get_steps(story) {
            Ok(steps) => {
                println!("Dry run for story {story}:");
                print_steps(&steps);
                Ok(())
            }
            Err(BmadError::AlreadyComplete(_)) => {
                println!("Story {story} is already complete");
                Ok(())
            }
            Err(e) => Err(e).context(format!("cannot plan story {story}")),
        };
    }

    match block_on(|cancel| async move { Ok(executor.execute(story, cancel).await) })? {
        Ok(()) => {
            println!("Story {story} completed successfully");
            Ok(())
        }
        Err(BmadError::AlreadyComplete(_)) => {
            println!("Story {story} is already complete");
            Ok(())
        }
        Err(e) => Err(e).context(format!("lifecycle failed for story {story}")),
    }
}

/// Lifecycle executor with terminal progress and a resume checkpoint.
pub fn executor(app: &App) -> LifecycleExecutor {
    let printer: Arc<dyn Printer> = app.printer.clone();
    LifecycleExecutor::new(app.runner.clone(), app.store.clone(), app.store.clone())
        .with_state(app.state())
        .with_progress(Box::new(move |i, n, stage| printer.step_start(i, n, stage)))
}

pub fn print_steps(steps: &[LifecycleStep]) {
    for (i, step) in steps.iter().enumerate() {
        println!("  {}. {} → {}", i + 1, step.stage, step.next_status);
    }
}
