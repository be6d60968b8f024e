use super::{block_on, exit_with, lifecycle, App};
use anyhow::Context;
use bmad_core::{BmadError, QueueMode, QueueRunner};
use std::path::Path;

/// Run every story of `epic` to completion, in story-number order.
pub fn run(root: &Path, epic: &str, dry_run: bool) -> anyhow::Result<()> {
    let app = App::load(root)?;
    let stories = app
        .store
        .get_epic_stories(epic)
        .with_context(|| format!("cannot list stories for epic {epic}"))?;

    if dry_run {
        return dry_run_report(&app, epic, &stories);
    }

    let queue = QueueRunner::new(
        app.runner.clone(),
        app.store.clone(),
        app.store.clone(),
        app.printer.clone(),
        QueueMode::Lifecycle,
    )
    .with_state(app.state());
    let report = block_on(|cancel| async move { Ok(queue.run(&stories, cancel).await) })?;
    exit_with(report.exit_code())
}

fn dry_run_report(app: &App, epic: &str, stories: &[String]) -> anyhow::Result<()> {
    let executor = lifecycle::executor(app);
    println!("Dry run for epic {epic}:");

    let mut workflows = 0;
    let mut with_work = 0;
    let mut complete = 0;

    for story in stories {
        println!();
        println!("Story {story}:");
        match executor.get_steps(story) {
            Ok(steps) => {
                lifecycle::print_steps(&steps);
                workflows += steps.len();
                with_work += 1;
            }
            Err(BmadError::AlreadyComplete(_)) => {
                println!("  (already complete)");
                complete += 1;
            }
            Err(e) => return Err(e).with_context(|| format!("cannot plan story {story}")),
        }
    }

    println!();
    if complete > 0 {
        println!(
            "Total: {workflows} workflows across {with_work} stories ({complete} already complete)"
        );
    } else {
        println!("Total: {workflows} workflows across {with_work} stories");
    }
    Ok(())
}
