mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "bmad-automate",
    about = "Drive claude through the BMAD story lifecycle: create-story, dev-story, code-review, git-commit",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from _bmad-output/ or .git/)
    #[arg(long, global = true, env = "BMAD_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON (status commands)
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Debug logging
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the story definition
    CreateStory { story: String },

    /// Implement the story
    DevStory { story: String },

    /// Review the story and auto-fix issues
    CodeReview { story: String },

    /// Commit and push the story's changes
    GitCommit { story: String },

    /// Run every full-cycle step for a story, regardless of its status
    Run { story: String },

    /// Run the next stage for each story in order, stopping at the first failure
    Queue {
        #[arg(required = true)]
        stories: Vec<String>,
    },

    /// Run a story from its current status through to done
    Lifecycle {
        story: String,

        /// List the stages without running them
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the lifecycle for every story of an epic ({epic}-{N}-*), in story order
    Epic {
        epic: String,

        /// List each story's stages without running them
        #[arg(long)]
        dry_run: bool,
    },

    /// Continue an interrupted lifecycle run
    Resume,

    /// Show a story's status (omit the story to list all)
    Status { story: Option<String> },

    /// Set a story's status in sprint-status.yaml
    SetStatus { story: String, status: String },

    /// Run an arbitrary prompt
    Raw {
        #[arg(required = true, trailing_var_arg = true)]
        prompt: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::CreateStory { story } => cmd::stage::run(&root, "create-story", &story),
        Commands::DevStory { story } => cmd::stage::run(&root, "dev-story", &story),
        Commands::CodeReview { story } => cmd::stage::run(&root, "code-review", &story),
        Commands::GitCommit { story } => cmd::stage::run(&root, "git-commit", &story),
        Commands::Run { story } => cmd::run::run(&root, &story),
        Commands::Queue { stories } => cmd::queue::run(&root, &stories),
        Commands::Lifecycle { story, dry_run } => cmd::lifecycle::run(&root, &story, dry_run),
        Commands::Epic { epic, dry_run } => cmd::epic::run(&root, &epic, dry_run),
        Commands::Resume => cmd::resume::run(&root),
        Commands::Status { story } => cmd::status::show(&root, story.as_deref(), cli.json),
        Commands::SetStatus { story, status } => cmd::status::set(&root, &story, &status, cli.json),
        Commands::Raw { prompt } => cmd::raw::run(&root, &prompt.join(" ")),
    };

    if let Err(e) = result {
        std::process::exit(cmd::report_error(&e));
    }
}
