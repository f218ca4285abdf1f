//! File and module walking
//!
//! Loads a file, parses it, and dispatches its tree inside either the shared
//! global scope (entry point and includes) or a fresh module scope
//! (`require`). Each path is processed at most once per pass.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::error::InternalError;
use crate::events::EventData;
use crate::parser::ParseFailure;
use crate::semantic::{Context, ScopeKind};

use super::pass::Pass;
use super::{FileLoadError, FileParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Runs in the shared global scope.
    Script,
    /// Runs in its own module scope.
    Module,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedFile {
    pub path: PathBuf,
    pub kind: FileKind,
}

#[derive(Debug, Default)]
pub(crate) struct ModuleCache {
    seen: HashSet<PathBuf>,
    files: Vec<ProcessedFile>,
}

impl ModuleCache {
    /// Records `path`; false when it was already recorded.
    pub(crate) fn insert(&mut self, path: &Path, kind: FileKind) -> bool {
        if !self.seen.insert(path.to_path_buf()) {
            return false;
        }
        self.files.push(ProcessedFile {
            path: path.to_path_buf(),
            kind,
        });
        true
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &ProcessedFile> {
        self.files.iter()
    }
}

/// Lexically resolves `.` and `..` components.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Target of `Ti.include(file)` issued from `including_file`.
pub(crate) fn resolve_include(resources_dir: &Path, including_file: &Path, file: &str) -> PathBuf {
    let base = match file.strip_prefix('/') {
        Some(absolute) => resources_dir.join(absolute),
        None => including_file
            .parent()
            .unwrap_or(resources_dir)
            .join(file),
    };
    normalize(&base)
}

/// Target of `require(id)` issued from `requiring_file`.
pub(crate) fn resolve_require(resources_dir: &Path, requiring_file: &Path, id: &str) -> PathBuf {
    let base = if id.starts_with("./") || id.starts_with("../") {
        requiring_file.parent().unwrap_or(resources_dir).join(id)
    } else {
        resources_dir.join(id.trim_start_matches('/'))
    };
    let mut path = normalize(&base).into_os_string();
    if !id.ends_with(".js") {
        path.push(".js");
    }
    PathBuf::from(path)
}

impl Pass<'_> {
    pub(crate) fn process_file(&mut self, path: &Path, kind: FileKind) -> Result<(), InternalError> {
        let path = normalize(path);
        let span = tracing::debug_span!("file", path = %path.display());
        let _guard = span.enter();

        if !path.is_file() {
            self.load_error(&path, "File Not Found".to_string());
            return Ok(());
        }
        if !self.ctx.record_file(&path, kind) {
            tracing::trace!("already processed in this pass");
            return Ok(());
        }

        self.fire(EventData::FileProcessingBegin { file: path.clone() });

        let scope = match kind {
            FileKind::Script => self.ctx.master_global(),
            FileKind::Module => {
                let name = path
                    .strip_prefix(self.resources_dir())
                    .unwrap_or(&path)
                    .display()
                    .to_string();
                let global = self.ctx.master_global();
                self.ctx.scopes_mut().create_scope(
                    ScopeKind::Module,
                    Some(global),
                    Context::new(name, &path, 1, 0),
                )
            }
        };

        self.ctx.push_file(&path);
        self.enter_scope(scope);
        let completed = self.walk_file(&path)?;
        self.exit_scope()?;
        self.ctx.pop_file();

        if completed {
            self.fire(EventData::FileProcessingEnd { file: path });
        }
        Ok(())
    }

    /// Parses and dispatches one file; false when the file was abandoned.
    fn walk_file(&mut self, path: &Path) -> Result<bool, InternalError> {
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                self.load_error(path, e.to_string());
                return Ok(false);
            }
        };

        let parser = self.ctx.parser();
        let mut root = match parser.parse(path, &source) {
            Ok(root) => root,
            Err(ParseFailure::Syntax(error)) => {
                tracing::debug!(%error, "parse error");
                self.fire(EventData::ParseError {
                    file: path.to_path_buf(),
                    message: error.message.clone(),
                    line: error.line,
                    column: error.column,
                });
                self.summary.parse_errors.push(FileParseError {
                    file: path.to_path_buf(),
                    error,
                });
                return Ok(false);
            }
            Err(ParseFailure::Contract(error)) => return Err(error),
        };

        self.dispatch(&mut root)?;
        Ok(true)
    }

    fn load_error(&mut self, path: &Path, error: String) {
        tracing::debug!(%error, "file could not be loaded");
        self.fire(EventData::FileLoadError {
            file: path.to_path_buf(),
            error: error.clone(),
        });
        self.summary.load_errors.push(FileLoadError {
            file: path.to_path_buf(),
            error,
        });
    }

    pub(crate) fn include_file(&mut self, file: &str) -> Result<(), InternalError> {
        let Some(including_file) = self.ctx.current_file().map(Path::to_path_buf) else {
            return Ok(());
        };
        let target = resolve_include(self.resources_dir(), &including_file, file);

        self.fire(EventData::FileInclude {
            including_file,
            file: target.clone(),
        });
        if self.config().processor.follow_includes {
            self.process_file(&target, FileKind::Script)?;
        }
        Ok(())
    }

    pub(crate) fn require_module(&mut self, id: &str) -> Result<(), InternalError> {
        let Some(requiring_file) = self.ctx.current_file().map(Path::to_path_buf) else {
            return Ok(());
        };
        let target = resolve_require(self.resources_dir(), &requiring_file, id);

        self.fire(EventData::FileRequire {
            requiring_file,
            module: id.to_string(),
        });
        if self.config().processor.follow_requires {
            self.process_file(&target, FileKind::Module)?;
        }
        Ok(())
    }
}
