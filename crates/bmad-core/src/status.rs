use crate::error::{BmadError, Result};
use crate::{io, paths};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const STATUS_FIELD: &str = "development_status";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Development status of a story. The lifecycle only ever moves forward:
/// `backlog → ready-for-dev → in-progress → review → done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Backlog,
    ReadyForDev,
    InProgress,
    Review,
    Done,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Backlog,
        Status::ReadyForDev,
        Status::InProgress,
        Status::Review,
        Status::Done,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Backlog => "backlog",
            Status::ReadyForDev => "ready-for-dev",
            Status::InProgress => "in-progress",
            Status::Review => "review",
            Status::Done => "done",
        }
    }

    /// The single successor on the forward path; `None` for `done`.
    pub fn next(self) -> Option<Status> {
        match self {
            Status::Backlog => Some(Status::ReadyForDev),
            Status::ReadyForDev => Some(Status::InProgress),
            Status::InProgress => Some(Status::Review),
            Status::Review => Some(Status::Done),
            Status::Done => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Status::Done
    }

    /// Interpret a value read back from the store. Unlike `FromStr`, an
    /// unrecognised value here is data corruption, not bad user input.
    pub fn from_stored(raw: &str) -> Result<Status> {
        raw.parse()
            .map_err(|_| BmadError::UnknownStatus(raw.to_string()))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = BmadError;

    fn from_str(s: &str) -> Result<Self> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| BmadError::InvalidStatus(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

pub trait StatusReader: Send + Sync {
    fn get_status(&self, story_key: &str) -> Result<Status>;
}

pub trait StatusWriter: Send + Sync {
    fn update_status(&self, story_key: &str, status: Status) -> Result<()>;
}

// ---------------------------------------------------------------------------
// StatusStore
// ---------------------------------------------------------------------------

/// Raw story-key → status text, as stored.
pub type StatusMap = BTreeMap<String, String>;

/// The sprint status file under a project root.
///
/// Values are kept as text on read so a single bad entry only fails the
/// lookups that touch it.
#[derive(Debug, Clone)]
pub struct StatusStore {
    path: PathBuf,
}

impl StatusStore {
    pub fn new(root: &Path) -> Self {
        Self {
            path: paths::status_path(root),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full story map.
    pub fn read(&self) -> Result<StatusMap> {
        let doc = self.load_document()?;
        let mut map = StatusMap::new();
        if let Some(entries) = doc.get(STATUS_FIELD).and_then(Value::as_mapping) {
            for (key, value) in entries {
                if let Some(key) = scalar_text(key) {
                    map.insert(key, scalar_text(value).unwrap_or_default());
                }
            }
        }
        Ok(map)
    }

    pub fn get_status(&self, story_key: &str) -> Result<Status> {
        let map = self.read()?;
        let raw = map
            .get(story_key)
            .ok_or_else(|| BmadError::StoryNotFound(story_key.to_string()))?;
        Status::from_stored(raw)
    }

    /// Story keys of the form `{epic}-{N}-…`, ordered by `N`.
    pub fn get_epic_stories(&self, epic_id: &str) -> Result<Vec<String>> {
        let pattern = Regex::new(&format!(r"^{}-(\d+)-", regex::escape(epic_id)))
            .map_err(|_| BmadError::NoStoriesForEpic(epic_id.to_string()))?;

        let mut matched: Vec<(u64, String)> = self
            .read()?
            .into_keys()
            .filter_map(|key| {
                let n = pattern
                    .captures(&key)
                    .and_then(|c| c.get(1))
                    .and_then(|m| m.as_str().parse::<u64>().ok())?;
                Some((n, key))
            })
            .collect();

        if matched.is_empty() {
            return Err(BmadError::NoStoriesForEpic(epic_id.to_string()));
        }
        matched.sort();
        Ok(matched.into_iter().map(|(_, key)| key).collect())
    }

    /// Rewrite one story's status, leaving the rest of the document intact.
    pub fn update_status(&self, story_key: &str, status: Status) -> Result<()> {
        let mut doc = self.load_document()?;
        let entries = doc
            .get_mut(STATUS_FIELD)
            .and_then(Value::as_mapping_mut)
            .ok_or_else(|| BmadError::StoryNotFound(story_key.to_string()))?;

        // Keys match the way `read` renders them; the last duplicate wins.
        let slot = entries
            .iter_mut()
            .filter(|(key, _)| scalar_text(key).as_deref() == Some(story_key))
            .map(|(_, value)| value)
            .last()
            .ok_or_else(|| BmadError::StoryNotFound(story_key.to_string()))?;
        *slot = Value::String(status.as_str().to_string());

        let data = serde_yaml::to_string(&doc)?;
        io::atomic_write(&self.path, data.as_bytes())?;
        tracing::info!(story = story_key, status = %status, "status updated");
        Ok(())
    }

    fn load_document(&self) -> Result<Value> {
        let data =
            std::fs::read_to_string(&self.path).map_err(|source| BmadError::StoreUnavailable {
                path: self.path.display().to_string(),
                source,
            })?;
        let doc: Value = serde_yaml::from_str(&data)?;
        Ok(match doc {
            Value::Null => Value::Mapping(Mapping::new()),
            other => other,
        })
    }
}

impl StatusReader for StatusStore {
    fn get_status(&self, story_key: &str) -> Result<Status> {
        StatusStore::get_status(self, story_key)
    }
}

impl StatusWriter for StatusStore {
    fn update_status(&self, story_key: &str, status: Status) -> Result<()> {
        StatusStore::update_status(self, story_key, status)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
