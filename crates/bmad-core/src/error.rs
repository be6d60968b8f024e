use thiserror::Error;

#[derive(Debug, Error)]
pub enum BmadError {
    #[error("story not found: {0}")]
    StoryNotFound(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("unknown status value: {0}")]
    UnknownStatus(String),

    /// Sentinel: callers running batches treat this as a skip.
    #[error("story is complete, no workflow needed: {0}")]
    AlreadyComplete(String),

    #[error("failed to read sprint status at {path}: {source}")]
    StoreUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no stories found for epic: {0}")]
    NoStoriesForEpic(String),

    /// Sentinel: resume callers treat this as "start fresh".
    #[error("no state file exists")]
    NoState,

    #[error("unknown workflow: {0}")]
    UnknownStage(String),

    #[error("invalid prompt template for '{stage}': {reason}")]
    InvalidTemplate { stage: String, reason: String },

    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: String, value: String },

    #[error("workflow failed: {stage} returned exit code {exit_code} for story {story}")]
    StageFailed {
        story: String,
        stage: String,
        exit_code: i32,
    },

    #[error(transparent)]
    Agent(#[from] claude_agent::ClaudeAgentError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BmadError {
    /// Process exit code for this failure: a failed stage keeps its own code,
    /// everything else (including signal deaths, reported as -1) is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            BmadError::StageFailed { exit_code, .. } if *exit_code > 0 => *exit_code,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, BmadError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn stage_failed(exit_code: i32) -> BmadError {
        BmadError::StageFailed {
            story: "1-1-a".into(),
            stage: "dev-story".into(),
            exit_code,
        }
    }

    #[test]
    fn exit_codes() {
        assert_eq!(stage_failed(3).exit_code(), 3);
        assert_eq!(stage_failed(-1).exit_code(), 1);
        assert_eq!(BmadError::StoryNotFound("x".into()).exit_code(), 1);
    }

    #[test]
    fn stage_failure_names_story_stage_and_code() {
        let msg = stage_failed(2).to_string();
        assert!(msg.contains("1-1-a"));
        assert!(msg.contains("dev-story"));
        assert!(msg.contains('2'));
    }
}
