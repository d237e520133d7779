use crate::Cli;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPLATE: &str = "default";
pub const DEFAULT_MAX_DIFF_CHARS: usize = 60_000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 90;
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Final resolved configuration for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub model: String,
    pub template: String,
    pub api_base: Option<String>,
    pub commit: bool,
    pub interactive: bool,
    pub max_diff_chars: usize,
    /// `None` when `timeout_secs = 0`.
    pub timeout: Option<Duration>,
    pub max_retries: u32,
}

impl Config {
    /// Build the final config from CLI flags, environment, TOML file, and defaults.
    ///
    /// Precedence:
    ///   1. CLI flags (`--model`, `--prompt`, `--apibase`, `--no-input`)
    ///   2. Env var `AI_COMMIT_MODEL`
    ///   3. TOML `~/.config/ai-commit-gen.toml`
    ///   4. Hardcoded defaults
    pub fn from_sources(cli: &Cli) -> Result<Self> {
        let file_cfg = match config_path() {
            Some(path) => load_file_config(&path)?,
            None => FileConfig::default(),
        };
        let model_env = env::var("AI_COMMIT_MODEL").ok().filter(|m| !m.trim().is_empty());

        Ok(Self::merge(cli, model_env, file_cfg))
    }

    fn merge(cli: &Cli, model_env: Option<String>, file_cfg: FileConfig) -> Self {
        let model = cli
            .model
            .clone()
            .or(model_env)
            .or(file_cfg.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let template = cli
            .prompt
            .clone()
            .or(file_cfg.prompt)
            .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string());

        Config {
            model,
            template,
            api_base: cli.api_base.clone().or(file_cfg.api_base),
            commit: cli.commit,
            interactive: !cli.no_input && file_cfg.interactive.unwrap_or(true),
            max_diff_chars: file_cfg.max_diff_chars.unwrap_or(DEFAULT_MAX_DIFF_CHARS),
            timeout: match file_cfg.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS) {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            max_retries: file_cfg.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
        }
    }

    /// CLI flags over defaults, ignoring env and the config file.
    #[cfg(test)]
    pub(crate) fn merge_for_tests(cli: &Cli) -> Self {
        Self::merge(cli, None, FileConfig::default())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    /// Default model to use when not provided via CLI or env.
    model: Option<String>,
    /// Default template name.
    prompt: Option<String>,
    api_base: Option<String>,
    /// Set to false to never prompt for API keys.
    interactive: Option<bool>,
    /// Diff length cap in characters; 0 disables truncation.
    max_diff_chars: Option<usize>,
    /// Per-request timeout in seconds; 0 disables it.
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

/// Return `~/.config/ai-commit-gen.toml`
fn config_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(home.join(".config").join("ai-commit-gen.toml"))
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str::<FileConfig>(&data)
        .with_context(|| format!("invalid config file {}", path.display()))
}
