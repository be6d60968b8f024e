use super::{block_on, exit_with, App};
use std::path::Path;

/// Run one named stage for `story`.
pub fn run(root: &Path, stage: &str, story: &str) -> anyhow::Result<()> {
    let app = App::load(root)?;
    let code = block_on(|cancel| async move { Ok(app.runner.run_single(stage, story, cancel).await) })?;
    exit_with(code)
}
