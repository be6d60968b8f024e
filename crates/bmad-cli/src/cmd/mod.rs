pub mod epic;
pub mod lifecycle;
pub mod queue;
pub mod raw;
pub mod resume;
pub mod run;
pub mod stage;
pub mod status;

use crate::output::TerminalPrinter;
use anyhow::Context;
use bmad_core::{BmadError, Config, Printer, StateManager, StatusStore, WorkflowRunner};
use claude_agent::ClaudeExecutor;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// CommandExit: a non-zero exit whose cause has already been printed
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct CommandExit(pub i32);

impl std::fmt::Display for CommandExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exited with code {}", self.0)
    }
}

impl std::error::Error for CommandExit {}

/// Turn a non-zero exit code into `Err(CommandExit)`.
pub fn exit_with(code: i32) -> anyhow::Result<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(CommandExit(code).into())
    }
}

/// Print `err` (unless already reported) and pick the process exit code.
pub fn report_error(err: &anyhow::Error) -> i32 {
    if let Some(CommandExit(code)) = err.downcast_ref::<CommandExit>() {
        return if *code > 0 { *code } else { 1 };
    }
    eprintln!("error: {err:#}");
    err.chain()
        .find_map(|cause| cause.downcast_ref::<BmadError>())
        .map(BmadError::exit_code)
        .unwrap_or(1)
}

// ---------------------------------------------------------------------------
// App: wired dependencies for one invocation
// ---------------------------------------------------------------------------

pub struct App {
    pub root: PathBuf,
    pub printer: Arc<dyn Printer>,
    pub runner: Arc<WorkflowRunner<ClaudeExecutor>>,
    pub store: Arc<StatusStore>,
}

impl App {
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let config = Config::load(root).context("failed to load config")?;
        let mut exec_config = config.executor_config(Some(root.to_path_buf()));
        exec_config.stderr_sink = Some(Arc::new(|line: &str| eprintln!("[stderr] {line}")));

        let printer: Arc<dyn Printer> = Arc::new(TerminalPrinter::stdout());
        let runner = WorkflowRunner::new(
            ClaudeExecutor::new(exec_config),
            config,
            Arc::clone(&printer),
        );

        Ok(Self {
            root: root.to_path_buf(),
            printer,
            runner: Arc::new(runner),
            store: Arc::new(StatusStore::new(root)),
        })
    }

    pub fn state(&self) -> StateManager {
        StateManager::new(&self.root)
    }
}

/// Run `f` on a fresh runtime. Ctrl-C cancels the token handed to `f`.
pub fn block_on<F, Fut, T>(f: F) -> anyhow::Result<T>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    rt.block_on(async move {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted; cancelling the running stage");
                on_interrupt.cancel();
            }
        });
        f(cancel).await
    })
}
