//! Status → stage plan routing.
//!
//! Pure functions only; nothing here touches the filesystem.

use crate::error::{BmadError, Result};
use crate::status::Status;

pub const CREATE_STORY: &str = "create-story";
pub const DEV_STORY: &str = "dev-story";
pub const CODE_REVIEW: &str = "code-review";
pub const GIT_COMMIT: &str = "git-commit";

/// Every stage name in lifecycle order.
pub const STAGES: [&str; 4] = [CREATE_STORY, DEV_STORY, CODE_REVIEW, GIT_COMMIT];

/// One stage of a plan and the status to record once it succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleStep {
    pub stage: &'static str,
    pub next_status: Status,
}

const fn step(stage: &'static str, next_status: Status) -> LifecycleStep {
    LifecycleStep { stage, next_status }
}

const FROM_BACKLOG: [LifecycleStep; 4] = [
    step(CREATE_STORY, Status::ReadyForDev),
    step(DEV_STORY, Status::Review),
    step(CODE_REVIEW, Status::Done),
    step(GIT_COMMIT, Status::Done),
];

/// The remaining stages for a story at `status`.
///
/// `done` has nothing left to run and yields `AlreadyComplete`. Every plan
/// ends with a step whose next status is `done`.
pub fn plan(status: Status) -> Result<Vec<LifecycleStep>> {
    let skip = match status {
        Status::Backlog => 0,
        Status::ReadyForDev | Status::InProgress => 1,
        Status::Review => 2,
        Status::Done => return Err(BmadError::AlreadyComplete(status.to_string())),
    };
    Ok(FROM_BACKLOG[skip..].to_vec())
}

/// [`plan`] for a status value that has not been parsed yet.
pub fn plan_for_raw(raw: &str) -> Result<Vec<LifecycleStep>> {
    plan(Status::from_stored(raw)?)
}

/// The single stage that moves a story at `status` forward.
pub fn workflow_for(status: Status) -> Result<&'static str> {
    plan(status).map(|steps| steps[0].stage)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stages(status: Status) -> Vec<(&'static str, Status)> {
        plan(status)
            .unwrap()
            .into_iter()
            .map(|s| (s.stage, s.next_status))
            .collect()
    }

    #[test]
    fn backlog_runs_everything() {
        assert_eq!(
            stages(Status::Backlog),
            vec![
                (CREATE_STORY, Status::ReadyForDev),
                (DEV_STORY, Status::Review),
                (CODE_REVIEW, Status::Done),
                (GIT_COMMIT, Status::Done),
            ]
        );
    }

    #[test]
    fn ready_and_in_progress_share_a_plan() {
        let expected = vec![
            (DEV_STORY, Status::Review),
            (CODE_REVIEW, Status::Done),
            (GIT_COMMIT, Status::Done),
        ];
        assert_eq!(stages(Status::ReadyForDev), expected);
        assert_eq!(stages(Status::InProgress), expected);
    }

    #[test]
    fn review_plan() {
        assert_eq!(
            stages(Status::Review),
            vec![(CODE_REVIEW, Status::Done), (GIT_COMMIT, Status::Done)]
        );
    }

    #[test]
    fn done_is_already_complete() {
        assert!(matches!(
            plan(Status::Done),
            Err(BmadError::AlreadyComplete(_))
        ));
        assert!(matches!(
            workflow_for(Status::Done),
            Err(BmadError::AlreadyComplete(_))
        ));
    }

    #[test]
    fn every_plan_ends_at_done() {
        for status in Status::ALL.into_iter().filter(|s| !s.is_terminal()) {
            let steps = plan(status).unwrap();
            assert_eq!(steps.last().unwrap().next_status, Status::Done);
        }
    }

    #[test]
    fn single_stage_routing() {
        assert_eq!(workflow_for(Status::Backlog).unwrap(), CREATE_STORY);
        assert_eq!(workflow_for(Status::ReadyForDev).unwrap(), DEV_STORY);
        assert_eq!(workflow_for(Status::InProgress).unwrap(), DEV_STORY);
        assert_eq!(workflow_for(Status::Review).unwrap(), CODE_REVIEW);
    }

    #[test]
    fn raw_values() {
        assert_eq!(plan_for_raw("review").unwrap().len(), 2);
        assert!(matches!(
            plan_for_raw("blocked"),
            Err(BmadError::UnknownStatus(v)) if v == "blocked"
        ));
    }
}
