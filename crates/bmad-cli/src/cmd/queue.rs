use super::{block_on, exit_with, App};
use bmad_core::{QueueMode, QueueRunner};
use std::path::Path;

/// Run the next stage of each story, in order, stopping at the first failure.
pub fn run(root: &Path, stories: &[String]) -> anyhow::Result<()> {
    let app = App::load(root)?;
    let queue = QueueRunner::new(
        app.runner.clone(),
        app.store.clone(),
        app.store.clone(),
        app.printer.clone(),
        QueueMode::Single,
    );
    let report = block_on(|cancel| async move { Ok(queue.run(stories, cancel).await) })?;
    exit_with(report.exit_code())
}
