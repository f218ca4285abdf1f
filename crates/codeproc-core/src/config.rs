//! Configuration loading for the processor
//!
//! Reads `codeproc.toml` from the project root (or any ancestor directory).
//! Every key is optional; a missing file means defaults.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "codeproc.toml";

const KNOWN_TOP_LEVEL_KEYS: &[&str] = &["processor", "project"];
const KNOWN_PROCESSOR_KEYS: &[&str] = &["follow_includes", "follow_requires"];
const KNOWN_PROJECT_KEYS: &[&str] = &["resources_dir", "default_entry_point"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid TOML in '{path}': {message}")]
    ParseError { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default)]
pub struct ConfigResult {
    pub config: Config,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub processor: ProcessorOptions,
    pub project: ProjectOptions,
}

/// Which cross-file constructs the walker follows.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProcessorOptions {
    pub follow_includes: bool,
    pub follow_requires: bool,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            follow_includes: true,
            follow_requires: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProjectOptions {
    pub resources_dir: String,
    pub default_entry_point: String,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            resources_dir: "Resources".to_string(),
            default_entry_point: "app.js".to_string(),
        }
    }
}

pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }
        if !current.pop() {
            return None;
        }
    }
}

fn read_config(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })?;

    Ok((config, content))
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    read_config(path).map(|(config, _)| config)
}

pub fn load_config_with_warnings(path: &Path) -> Result<ConfigResult, ConfigError> {
    let (config, content) = read_config(path)?;
    let warnings = detect_unknown_keys(&content);
    Ok(ConfigResult { config, warnings })
}

fn detect_unknown_keys(content: &str) -> Vec<String> {
    let mut warnings = Vec::new();

    let table: toml::Table = match content.parse() {
        Ok(t) => t,
        Err(_) => return warnings,
    };

    let known_top: HashSet<&str> = KNOWN_TOP_LEVEL_KEYS.iter().copied().collect();
    for key in table.keys() {
        if !known_top.contains(key.as_str()) {
            warnings.push(format!("Unknown config option: '{}'", key));
        }
    }

    for (section, known) in [
        ("processor", KNOWN_PROCESSOR_KEYS),
        ("project", KNOWN_PROJECT_KEYS),
    ] {
        if let Some(toml::Value::Table(entries)) = table.get(section) {
            for key in entries.keys() {
                if !known.contains(&key.as_str()) {
                    warnings.push(format!(
                        "Unknown config option in [{}]: '{}'",
                        section, key
                    ));
                }
            }
        }
    }

    warnings
}

/// Looks for a config file from `start_dir` upward.
///
/// A file that exists but cannot be loaded is an error rather than a silent
/// fallback to defaults.
pub fn load_config_or_default_with_warnings(start_dir: &Path) -> Result<ConfigResult, ConfigError> {
    match find_config_file(start_dir) {
        Some(path) => load_config_with_warnings(&path),
        None => Ok(ConfigResult::default()),
    }
}

pub fn load_config_or_default(start_dir: &Path) -> Result<Config, ConfigError> {
    load_config_or_default_with_warnings(start_dir).map(|result| result.config)
}
