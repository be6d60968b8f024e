use crate::error::{BmadError, Result};
use crate::paths;
use crate::router;
use claude_agent::{ExecutorConfig, DEFAULT_BINARY, DEFAULT_MAX_LINE_BYTES, DEFAULT_OUTPUT_FORMAT};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const ENV_PREFIX: &str = "BMAD_";
pub const CONFIG_PATH_ENV: &str = "BMAD_CONFIG_PATH";
pub const CLAUDE_PATH_ENV: &str = "BMAD_CLAUDE_PATH";

/// `BMAD_`-prefixed environment variables, by name.
pub type EnvVars = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub prompt_template: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullCycleConfig {
    #[serde(default = "default_cycle_steps")]
    pub steps: Vec<String>,
}

fn default_cycle_steps() -> Vec<String> {
    router::STAGES.iter().map(|s| s.to_string()).collect()
}

impl Default for FullCycleConfig {
    fn default() -> Self {
        Self {
            steps: default_cycle_steps(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaudeConfig {
    #[serde(default = "default_binary_path")]
    pub binary_path: String,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

fn default_binary_path() -> String {
    DEFAULT_BINARY.to_string()
}

fn default_output_format() -> String {
    DEFAULT_OUTPUT_FORMAT.to_string()
}

fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            binary_path: default_binary_path(),
            output_format: default_output_format(),
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_truncate_lines")]
    pub truncate_lines: usize,
    #[serde(default = "default_truncate_length")]
    pub truncate_length: usize,
}

fn default_truncate_lines() -> usize {
    20
}

fn default_truncate_length() -> usize {
    60
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            truncate_lines: default_truncate_lines(),
            truncate_length: default_truncate_length(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_workflows")]
    pub workflows: BTreeMap<String, WorkflowConfig>,
    #[serde(default)]
    pub full_cycle: FullCycleConfig,
    #[serde(default)]
    pub claude: ClaudeConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_workflows() -> BTreeMap<String, WorkflowConfig> {
    [
        (
            router::CREATE_STORY,
            "/bmad:bmm:workflows:create-story - Create story: {{.StoryKey}}. Do not ask questions.",
        ),
        (
            router::DEV_STORY,
            "/bmad:bmm:workflows:dev-story - Work on story: {{.StoryKey}}. Complete all tasks. \
             Run tests after each implementation. Do not ask clarifying questions - use best \
             judgment based on existing patterns.",
        ),
        (
            router::CODE_REVIEW,
            "/bmad:bmm:workflows:code-review - Review story: {{.StoryKey}}. When presenting fix \
             options, always choose to auto-fix all issues immediately. Do not wait for user input.",
        ),
        (
            router::GIT_COMMIT,
            "Commit all changes for story {{.StoryKey}} with a descriptive commit message \
             following conventional commits format. Then push to the current branch. \
             Do not ask questions.",
        ),
    ]
    .into_iter()
    .map(|(name, template)| {
        (
            name.to_string(),
            WorkflowConfig {
                prompt_template: template.to_string(),
            },
        )
    })
    .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workflows: default_workflows(),
            full_cycle: FullCycleConfig::default(),
            claude: ClaudeConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load config for `root`, honouring `BMAD_CONFIG_PATH` and the
    /// `BMAD_`-prefixed overrides in the process environment.
    pub fn load(root: &Path) -> Result<Self> {
        let env: EnvVars = std::env::vars()
            .filter(|(name, _)| name.starts_with(ENV_PREFIX))
            .collect();
        let explicit = env
            .get(CONFIG_PATH_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::load_with(root, explicit.as_deref(), &env)
    }

    /// Load with the environment passed in explicitly.
    ///
    /// An explicit path must exist. Otherwise the first existing candidate
    /// under `root` is used, and no file at all means defaults. `env` is
    /// applied on top of whichever was loaded.
    pub fn load_with(root: &Path, explicit: Option<&Path>, env: &EnvVars) -> Result<Self> {
        let source = match explicit {
            Some(path) if path.exists() => Some(path.to_path_buf()),
            Some(path) => return Err(BmadError::ConfigNotFound(path.display().to_string())),
            None => paths::config_candidates(root)
                .into_iter()
                .find(|p| p.exists()),
        };

        let mut config = match source {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                let data = std::fs::read_to_string(&path)?;
                Self::from_yaml(&data)?
            }
            None => Self::default(),
        };

        config.apply_env(env)?;
        Ok(config)
    }

    /// Apply environment overrides. Nested keys are joined with `_` under the
    /// `BMAD_` prefix, so `output.truncate_lines` is `BMAD_OUTPUT_TRUNCATE_LINES`
    /// and the `dev-story` template is `BMAD_WORKFLOWS_DEV_STORY_PROMPT_TEMPLATE`.
    /// Empty values are ignored. `BMAD_CLAUDE_PATH` beats
    /// `BMAD_CLAUDE_BINARY_PATH`.
    pub fn apply_env(&mut self, env: &EnvVars) -> Result<()> {
        for (var, value) in env.iter().filter(|(_, v)| !v.is_empty()) {
            match var.as_str() {
                "BMAD_CLAUDE_BINARY_PATH" => self.claude.binary_path = value.clone(),
                "BMAD_CLAUDE_OUTPUT_FORMAT" => self.claude.output_format = value.clone(),
                "BMAD_CLAUDE_MAX_LINE_BYTES" => self.claude.max_line_bytes = parse_env(var, value)?,
                "BMAD_OUTPUT_TRUNCATE_LINES" => self.output.truncate_lines = parse_env(var, value)?,
                "BMAD_OUTPUT_TRUNCATE_LENGTH" => {
                    self.output.truncate_length = parse_env(var, value)?
                }
                "BMAD_FULL_CYCLE_STEPS" => {
                    self.full_cycle.steps = value
                        .split(|c: char| c == ',' || c.is_whitespace())
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                other => {
                    if let Some(stage) = other
                        .strip_prefix("BMAD_WORKFLOWS_")
                        .and_then(|rest| rest.strip_suffix("_PROMPT_TEMPLATE"))
                        .filter(|stage| !stage.is_empty())
                    {
                        let stage = stage.to_ascii_lowercase().replace('_', "-");
                        self.workflows.insert(
                            stage,
                            WorkflowConfig {
                                prompt_template: value.clone(),
                            },
                        );
                    }
                }
            }
        }

        if let Some(binary) = env.get(CLAUDE_PATH_ENV).filter(|v| !v.is_empty()) {
            self.claude.binary_path = binary.clone();
        }
        Ok(())
    }

    /// Parse YAML, overlaying it on the defaults. Workflows named in the file
    /// replace the built-in ones; the rest are kept.
    pub fn from_yaml(data: &str) -> Result<Self> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: Config = serde_yaml::from_str(data)?;
        for (name, workflow) in default_workflows() {
            config.workflows.entry(name).or_insert(workflow);
        }
        Ok(config)
    }

    /// The expanded prompt for `stage` on `story_key`.
    pub fn prompt_for(&self, stage: &str, story_key: &str) -> Result<String> {
        let workflow = self
            .workflows
            .get(stage)
            .ok_or_else(|| BmadError::UnknownStage(stage.to_string()))?;
        expand_template(stage, &workflow.prompt_template, story_key)
    }

    pub fn executor_config(&self, cwd: Option<PathBuf>) -> ExecutorConfig {
        ExecutorConfig {
            binary_path: self.claude.binary_path.clone(),
            output_format: self.claude.output_format.clone(),
            max_line_bytes: self.claude.max_line_bytes,
            cwd,
            stderr_sink: None,
        }
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| BmadError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\{\{\s*\.?([A-Za-z_]+)\s*\}\}").unwrap())
}

/// Substitute `{{.StoryKey}}` in `template`. Any other placeholder is an
/// error rather than being left in the prompt verbatim.
fn expand_template(stage: &str, template: &str, story_key: &str) -> Result<String> {
    if let Some(unknown) = placeholder()
        .captures_iter(template)
        .filter_map(|c| c.get(1))
        .find(|m| m.as_str() != "StoryKey")
    {
        return Err(BmadError::InvalidTemplate {
            stage: stage.to_string(),
            reason: format!("unknown placeholder '{}'", unknown.as_str()),
        });
    }
    Ok(placeholder()
        .replace_all(template, regex::NoExpand(story_key))
        .into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> EnvVars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.workflows.len(), 4);
        assert_eq!(
            config.full_cycle.steps,
            ["create-story", "dev-story", "code-review", "git-commit"]
        );
        assert_eq!(config.claude.binary_path, "claude");
        assert_eq!(config.claude.output_format, "stream-json");
        assert_eq!(config.output.truncate_lines, 20);
        assert_eq!(config.output.truncate_length, 60);
    }

    #[test]
    fn prompt_substitutes_story_key() {
        let config = Config::default();
        let prompt = config.prompt_for("create-story", "3-1-auth").unwrap();
        assert_eq!(
            prompt,
            "/bmad:bmm:workflows:create-story - Create story: 3-1-auth. Do not ask questions."
        );
    }

    #[test]
    fn placeholder_tolerates_whitespace() {
        let out = expand_template("x", "story={{ .StoryKey }}!", "1-1-a").unwrap();
        assert_eq!(out, "story=1-1-a!");
    }

    #[test]
    fn story_key_is_inserted_literally() {
        let out = expand_template("x", "{{.StoryKey}}", "$1-weird").unwrap();
        assert_eq!(out, "$1-weird");
    }

    #[test]
    fn unknown_placeholder_is_rejected() {
        let err = expand_template("dev-story", "{{.Epic}} {{.StoryKey}}", "1-1-a").unwrap_err();
        assert!(matches!(err, BmadError::InvalidTemplate { .. }));
    }

    #[test]
    fn unknown_stage() {
        let err = Config::default().prompt_for("deploy", "1-1-a").unwrap_err();
        assert!(matches!(err, BmadError::UnknownStage(s) if s == "deploy"));
    }

    #[test]
    fn partial_yaml_overlays_defaults() {
        let yaml = r#"
workflows:
  dev-story:
    prompt_template: "Build {{.StoryKey}}"
output:
  truncate_lines: 5
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.prompt_for("dev-story", "2-1-x").unwrap(), "Build 2-1-x");
        assert!(config.workflows.contains_key("git-commit"));
        assert_eq!(config.output.truncate_lines, 5);
        assert_eq!(config.output.truncate_length, 60);
        assert_eq!(config.claude.binary_path, "claude");
    }

    #[test]
    fn load_uses_candidate_file_and_binary_override() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        std::fs::write(
            dir.path().join("config/workflows.yaml"),
            "claude:\n  output_format: json\n",
        )
        .unwrap();
        let env = env(&[(CLAUDE_PATH_ENV, "/opt/claude")]);
        let config = Config::load_with(dir.path(), None, &env).unwrap();
        assert_eq!(config.claude.output_format, "json");
        assert_eq!(config.claude.binary_path, "/opt/claude");
    }

    #[test]
    fn load_without_file_is_default() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Config::load_with(dir.path(), None, &EnvVars::new()).unwrap(), Config::default());
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.yaml");
        let err = Config::load_with(dir.path(), Some(&missing), &EnvVars::new()).unwrap_err();
        assert!(matches!(err, BmadError::ConfigNotFound(_)));
    }

    #[test]
    fn executor_config_mirrors_claude_section() {
        let mut config = Config::default();
        config.claude.max_line_bytes = 1024;
        let exec = config.executor_config(Some(PathBuf::from("/work")));
        assert_eq!(exec.binary_path, "claude");
        assert_eq!(exec.max_line_bytes, 1024);
        assert_eq!(exec.cwd, Some(PathBuf::from("/work")));
    }

    #[test]
    fn prefixed_env_overrides_nested_keys() {
        let mut config = Config::from_yaml("output:\n  truncate_lines: 5\n").unwrap();
        config
            .apply_env(&env(&[
                ("BMAD_OUTPUT_TRUNCATE_LINES", "8"),
                ("BMAD_OUTPUT_TRUNCATE_LENGTH", " 90 "),
                ("BMAD_CLAUDE_OUTPUT_FORMAT", "json"),
                ("BMAD_CLAUDE_MAX_LINE_BYTES", "4096"),
                ("BMAD_FULL_CYCLE_STEPS", "dev-story, code-review"),
                ("BMAD_WORKFLOWS_DEV_STORY_PROMPT_TEMPLATE", "Ship {{.StoryKey}}"),
                ("BMAD_ROOT", "/elsewhere"),
            ]))
            .unwrap();

        assert_eq!(config.output.truncate_lines, 8);
        assert_eq!(config.output.truncate_length, 90);
        assert_eq!(config.claude.output_format, "json");
        assert_eq!(config.claude.max_line_bytes, 4096);
        assert_eq!(config.full_cycle.steps, ["dev-story", "code-review"]);
        assert_eq!(config.prompt_for("dev-story", "1-2-x").unwrap(), "Ship 1-2-x");
        assert_eq!(config.workflows.len(), 4);
    }

    #[test]
    fn claude_path_beats_binary_path_and_empty_values_are_ignored() {
        let mut config = Config::default();
        config
            .apply_env(&env(&[
                ("BMAD_CLAUDE_BINARY_PATH", "/usr/local/bin/claude"),
                (CLAUDE_PATH_ENV, "/opt/claude"),
                ("BMAD_OUTPUT_TRUNCATE_LINES", ""),
            ]))
            .unwrap();
        assert_eq!(config.claude.binary_path, "/opt/claude");
        assert_eq!(config.output.truncate_lines, 20);
    }

    #[test]
    fn unparsable_env_number_is_an_error() {
        let err = Config::default()
            .apply_env(&env(&[("BMAD_OUTPUT_TRUNCATE_LINES", "lots")]))
            .unwrap_err();
        assert!(matches!(
            err,
            BmadError::InvalidEnv { var, value } if var == "BMAD_OUTPUT_TRUNCATE_LINES" && value == "lots"
        ));
    }
}
