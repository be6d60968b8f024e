use super::{lifecycle, App};
use anyhow::Context;
use bmad_core::BmadError;
use std::path::Path;

/// Re-run the lifecycle of the story recorded in the checkpoint.
///
/// The status store, not the checkpoint, decides which stages remain.
pub fn run(root: &Path) -> anyhow::Result<()> {
    let app = App::load(root)?;
    let state = match app.state().load() {
        Ok(state) => state,
        Err(BmadError::NoState) => {
            println!("Nothing to resume");
            return Ok(());
        }
        Err(e) => return Err(e).context("failed to read resume state"),
    };

    println!(
        "Resuming {} (was at step {}/{}, started from {})",
        state.story_key,
        state.step_index + 1,
        state.total_steps,
        state.start_status
    );
    lifecycle::run_story(&app, &state.story_key, false)
}
