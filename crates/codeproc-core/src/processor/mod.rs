//! Project processing
//!
//! [`Processor`] owns the registered listeners and runs one pass per listener
//! set: tagged sets first, in registration order, then the default set.

mod context;
mod pass;
mod walker;

use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Serialize;

use crate::config::{self, Config};
use crate::error::ProcessError;
use crate::events::{ListenerRegistry, RuleEvent, StateEvent};
use crate::parser::{ParseError, SourceParser, SwcParser};
use crate::project::Project;

pub use context::PassContext;
pub(crate) use pass::Pass;
pub use walker::{FileKind, ProcessedFile};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileParseError {
    pub file: PathBuf,
    pub error: ParseError,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileLoadError {
    pub file: PathBuf,
    pub error: String,
}

/// What one pass saw.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassSummary {
    pub tag: Option<String>,
    pub files: Vec<ProcessedFile>,
    pub parse_errors: Vec<FileParseError>,
    pub load_errors: Vec<FileLoadError>,
    pub scope_count: usize,
    pub unknown_effects: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessReport {
    pub entry_file: PathBuf,
    pub passes: Vec<PassSummary>,
}

impl ProcessReport {
    pub fn pass(&self, tag: Option<&str>) -> Option<&PassSummary> {
        self.passes.iter().find(|pass| pass.tag.as_deref() == tag)
    }
}

pub struct Processor {
    config: Option<Config>,
    listeners: ListenerRegistry,
    parser: Rc<dyn SourceParser>,
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor {
    pub fn new() -> Self {
        Self {
            config: None,
            listeners: ListenerRegistry::new(),
            parser: Rc::new(SwcParser::new()),
        }
    }

    /// Uses `config` instead of looking for `codeproc.toml` in the project.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_parser(mut self, parser: impl SourceParser + 'static) -> Self {
        self.parser = Rc::new(parser);
        self
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// Listens for a process-state event such as `fileProcessingBegin`.
    pub fn on_state(
        &mut self,
        event: &str,
        tag: Option<&str>,
        callback: impl FnMut(&mut PassContext, &StateEvent) + 'static,
    ) {
        self.listeners.on_state(event, tag, Box::new(callback));
    }

    /// Listens for nodes of `rule` (or every node with `allrules`).
    pub fn on_rule(
        &mut self,
        rule: &str,
        preorder: bool,
        tag: Option<&str>,
        callback: impl FnMut(&mut PassContext, &RuleEvent<'_>) + 'static,
    ) {
        self.listeners
            .on_rule(rule, preorder, tag, Box::new(callback));
    }

    /// Processes the project rooted at `root`.
    ///
    /// The manifest and entry point are checked before any event fires. A
    /// fatal error aborts the run; events already delivered stay delivered.
    pub fn process(&mut self, root: &Path) -> Result<ProcessReport, ProcessError> {
        let config = match &self.config {
            Some(config) => config.clone(),
            None => {
                let result = config::load_config_or_default_with_warnings(root)?;
                for warning in &result.warnings {
                    tracing::warn!("{}", warning);
                }
                result.config
            }
        };
        let project = Project::resolve(root, &config)?;

        let mut passes = Vec::with_capacity(self.listeners.pass_count());
        for listeners in self.listeners.passes_mut() {
            let tag = listeners.tag().map(str::to_string);
            let span = tracing::debug_span!("pass", tag = tag.as_deref().unwrap_or("default"));
            let _guard = span.enter();

            let pass = Pass::new(listeners, &config, &project, Rc::clone(&self.parser));
            let summary = pass.run().map_err(|source| ProcessError::Internal {
                pass: tag.unwrap_or_else(|| "default".to_string()),
                source,
            })?;
            passes.push(summary);
        }

        Ok(ProcessReport {
            entry_file: project.entry_file,
            passes,
        })
    }
}
