use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::cli::Cli;

pub const CONFIG_ENV_VAR: &str = "ASYNC_CLASSIFIER_CONFIG";

const DEFAULT_MAX_DEPTH: usize = 10;

const DEFAULT_SKIP_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    ".hg",
    ".svn",
    "dist",
    "build",
    "out",
    "coverage",
    ".next",
    ".nuxt",
    ".cache",
    ".turbo",
    ".yarn",
    "bower_components",
    "target",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub runtime_roots: Vec<String>,
    pub async_wrappers: Vec<String>,
    pub max_depth: usize,
    pub skip_dirs: Vec<String>,
    pub manifest_marker: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            runtime_roots: vec!["rt".to_string(), "RtAlt".to_string()],
            async_wrappers: vec!["Promise".to_string(), "PromiseLike".to_string()],
            max_depth: DEFAULT_MAX_DEPTH,
            skip_dirs: DEFAULT_SKIP_DIRS.iter().map(|s| s.to_string()).collect(),
            manifest_marker: "package.json".to_string(),
        }
    }
}

impl AnalyzerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// True when `path` is a runtime root itself or starts with `<root>.`.
    pub fn is_runtime_path(&self, path: &str) -> bool {
        let head = path.split('.').next().unwrap_or(path);
        self.is_runtime_root(head)
    }

    pub fn is_runtime_root(&self, name: &str) -> bool {
        self.runtime_roots.iter().any(|r| r == name)
    }

    pub fn is_async_wrapper(&self, name: &str) -> bool {
        self.async_wrappers.iter().any(|w| w == name)
    }

    pub fn is_skipped_dir(&self, name: &str) -> bool {
        self.skip_dirs.iter().any(|d| d == name)
    }
}

pub fn resolve_config(cli: &Cli) -> Result<AnalyzerConfig> {
    if let Some(p) = cli.config.clone() {
        return AnalyzerConfig::load(&p);
    }

    if let Ok(p) = env::var(CONFIG_ENV_VAR) {
        return AnalyzerConfig::load(Path::new(&p));
    }

    if let Some(p) = user_config_path()
        && p.exists()
    {
        return AnalyzerConfig::load(&p);
    }

    Ok(AnalyzerConfig::default())
}

pub fn resolve_root_hint(cli: &Cli) -> Result<PathBuf> {
    if let Some(p) = cli.root.clone() {
        return Ok(p);
    }
    env::current_dir().context("Failed to resolve current directory")
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("async-classifier").join("config.json"))
}
