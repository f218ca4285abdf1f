//! Project layout: locating the manifest and the entry point

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::ProcessError;

pub const MANIFEST_FILENAME: &str = "tiapp.xml";

/// A validated project root with its resolved entry point.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub root: PathBuf,
    pub resources_dir: PathBuf,
    pub entry_file: PathBuf,
}

impl Project {
    /// Resolves the entry point of the project at `root`.
    ///
    /// The manifest must exist. A `<mobileweb><main>` element overrides the
    /// configured default entry point.
    pub fn resolve(root: &Path, config: &Config) -> Result<Self, ProcessError> {
        if !root.is_dir() {
            return Err(ProcessError::InvalidArgument(format!(
                "project root '{}' is not a directory",
                root.display()
            )));
        }

        let manifest_path = root.join(MANIFEST_FILENAME);
        if !manifest_path.is_file() {
            return Err(ProcessError::InvalidArgument(format!(
                "no {MANIFEST_FILENAME} found in '{}'",
                root.display()
            )));
        }

        let manifest = std::fs::read_to_string(&manifest_path)
            .map_err(|e| manifest_error(&manifest_path, &e.to_string()))?;
        let entry_point = main_override(&manifest)
            .map_err(|reason| manifest_error(&manifest_path, &reason))?
            .unwrap_or_else(|| config.project.default_entry_point.clone());

        let resources_dir = root.join(&config.project.resources_dir);
        let entry_file = resources_dir.join(entry_point.trim_start_matches('/'));
        if !entry_file.is_file() {
            return Err(ProcessError::InvalidArgument(format!(
                "entry point '{}' does not exist",
                entry_file.display()
            )));
        }

        tracing::debug!(entry = %entry_file.display(), "resolved project entry point");

        Ok(Self {
            root: root.to_path_buf(),
            resources_dir,
            entry_file,
        })
    }
}

fn manifest_error(path: &Path, reason: &str) -> ProcessError {
    ProcessError::InvalidArgument(format!(
        "manifest '{}' could not be read: {reason}",
        path.display()
    ))
}

fn main_override(manifest: &str) -> Result<Option<String>, String> {
    let document = roxmltree::Document::parse(manifest).map_err(|e| e.to_string())?;

    let main = document
        .descendants()
        .filter(|node| node.has_tag_name("mobileweb"))
        .flat_map(|node| node.children())
        .find(|node| node.has_tag_name("main"))
        .and_then(|node| node.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);

    Ok(main)
}
