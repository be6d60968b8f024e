use super::{block_on, exit_with, App};
use std::path::Path;

pub fn run(root: &Path, prompt: &str) -> anyhow::Result<()> {
    let app = App::load(root)?;
    let code = block_on(|cancel| async move { Ok(app.runner.run_raw(prompt, cancel).await) })?;
    exit_with(code)
}
