//! Configuration management
//!
//! Loads and saves the TOML config under the platform config directory.
//! Model selection is explicit configuration here, never derived from
//! prompt text at call time.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Text-generation provider settings
    #[serde(default)]
    pub provider: ProviderSection,
    /// Pipeline behavior settings
    #[serde(default)]
    pub pipeline: PipelineSection,
    /// Code-example lookup settings
    #[serde(default)]
    pub examples: ExamplesSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSection {
    /// OpenAI-compatible endpoint base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model used for research and code generation
    #[serde(default = "default_model")]
    pub model: String,
    /// Token budget per generation request
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_model() -> String {
    "z-ai/glm-5".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Hard timeout for one sandbox execution, in seconds
    #[serde(default = "default_sandbox_timeout")]
    pub sandbox_timeout_secs: u64,
    /// Language the generated examples are written in
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_sandbox_timeout() -> u64 {
    30
}

fn default_language() -> String {
    "python".to_string()
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            sandbox_timeout_secs: default_sandbox_timeout(),
            language: default_language(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamplesSection {
    /// Whether research augments descriptions with external examples
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Maximum examples fetched per technology
    #[serde(default = "default_example_limit")]
    pub limit: usize,
    /// Optional GitHub token for higher search rate limits
    #[serde(default)]
    pub github_token: Option<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_example_limit() -> usize {
    3
}

impl Default for ExamplesSection {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            limit: default_example_limit(),
            github_token: None,
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults if absent
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Save to the default location
    pub fn save(&self) -> Result<()> {
        let path = config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "autodidact", "autodidact")
        .context("Failed to get project directories")
}

/// Path of the TOML config file
pub fn config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

/// Base directory for persistent data (knowledge store)
pub fn data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}
