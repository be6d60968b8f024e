//! `bmad-core`: status-driven story lifecycle for `bmad-automate`.
//!
//! ```text
//! StatusStore ──get_status──▶ router::plan ──▶ LifecycleExecutor
//!      ▲                                          │ per stage
//!      └──────────── update_status ◀── exit 0 ◀── StageRunner (WorkflowRunner)
//!                                                 │
//!                                           StateManager checkpoint
//! ```
//!
//! [`QueueRunner`] applies the same machinery to a list of stories.

pub mod config;
pub mod error;
pub mod io;
pub mod lifecycle;
pub mod paths;
pub mod printer;
pub mod queue;
pub mod router;
pub mod state;
pub mod status;
pub mod workflow;

pub use config::Config;
pub use error::{BmadError, Result};
pub use lifecycle::{LifecycleExecutor, ProgressFn, StageRunner};
pub use printer::{NullPrinter, Printer, StepResult, StoryOutcome, StoryResult};
pub use queue::{QueueMode, QueueReport, QueueRunner};
pub use router::LifecycleStep;
pub use state::{ExecutionState, StateManager};
pub use status::{Status, StatusMap, StatusReader, StatusStore, StatusWriter};
pub use workflow::WorkflowRunner;
