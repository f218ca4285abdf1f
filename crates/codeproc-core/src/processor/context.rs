//! Per-pass state and the surface exposed to listener callbacks

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::ast::{Node, NodeKind, Position, Rule};
use crate::error::PluginError;
use crate::parser::SourceParser;
use crate::semantic::{Context, Reference, ScopeArena, ScopeId, ScopeKind, get_value};
use crate::value::JsValue;

use super::walker::{FileKind, ModuleCache, ProcessedFile};

struct FileFrame {
    path: PathBuf,
    location: Option<Position>,
}

/// Everything a single pass knows.
///
/// A fresh context is built for each pass, so tagged passes never observe
/// each other's scopes or module caches.
pub struct PassContext {
    tag: Option<String>,
    scopes: ScopeArena,
    stack: Vec<ScopeId>,
    master_global: ScopeId,
    files: Vec<FileFrame>,
    modules: ModuleCache,
    rule_depth: usize,
    replacement: Option<Node>,
    unknown_effects: usize,
    parser: Rc<dyn SourceParser>,
}

impl PassContext {
    pub(crate) fn new(tag: Option<String>, entry_file: &Path, parser: Rc<dyn SourceParser>) -> Self {
        let mut scopes = ScopeArena::new();
        let master_global = scopes.create_scope(
            ScopeKind::Global,
            None,
            Context::new("global", entry_file, 1, 0),
        );
        for (name, value) in [
            ("undefined", JsValue::undefined()),
            ("NaN", JsValue::number(f64::NAN)),
            ("Infinity", JsValue::number(f64::INFINITY)),
        ] {
            scopes.declare(master_global, name, value);
        }

        Self {
            tag,
            scopes,
            stack: Vec::new(),
            master_global,
            files: Vec::new(),
            modules: ModuleCache::default(),
            rule_depth: 0,
            replacement: None,
            unknown_effects: 0,
            parser,
        }
    }

    /// Tag of the listener set driving this pass; `None` for the default set.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn scopes(&self) -> &ScopeArena {
        &self.scopes
    }

    pub fn master_global(&self) -> ScopeId {
        self.master_global
    }

    pub fn current_scope(&self) -> Option<ScopeId> {
        self.stack.last().copied()
    }

    /// Entered scopes, outermost first.
    pub fn scope_stack(&self) -> &[ScopeId] {
        &self.stack
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.files.last().map(|frame| frame.path.as_path())
    }

    /// Context of the current scope, positioned at the node being processed.
    pub fn current_context(&self) -> Option<Context> {
        let scope = self.scopes.get(self.current_scope()?);
        let mut context = scope.context.clone();
        if let Some(frame) = self.files.last() {
            context.file = frame.path.clone();
            if let Some(location) = frame.location {
                context.line = location.line;
                context.col = location.col;
            }
        }
        Some(context)
    }

    /// Files processed so far in this pass, in first-visit order.
    pub fn processed_files(&self) -> impl Iterator<Item = &ProcessedFile> {
        self.modules.iter()
    }

    /// Writes whose target could not be determined statically.
    pub fn unknown_effects(&self) -> usize {
        self.unknown_effects
    }

    pub fn in_rule_callback(&self) -> bool {
        self.rule_depth > 0
    }

    /// Value bound to `name` in the nearest scope of the current chain.
    pub fn lookup_variable(&self, name: &str) -> Result<JsValue, PluginError> {
        if !self.in_rule_callback() {
            return Err(PluginError::InvalidContext("lookup_variable"));
        }
        let value = self
            .resolve(name)
            .map(|scope| get_value(&self.scopes, &Reference::binding(scope, name)))
            .unwrap_or_else(JsValue::unknown);
        Ok(value)
    }

    /// Replaces the node whose rule callbacks are running.
    ///
    /// The swap happens once the node's post-order listeners have run; the
    /// replacement is then processed in its place.
    pub fn replace_branch(&mut self, replacement: Node) -> Result<(), PluginError> {
        if !self.in_rule_callback() {
            return Err(PluginError::InvalidContext("replace_branch"));
        }
        if replacement.rule() == Rule::Toplevel {
            return Err(PluginError::InvalidArgument(
                "a replacement must be a single statement or expression".to_string(),
            ));
        }
        replacement
            .validate_tree()
            .map_err(|e| PluginError::InvalidArgument(e.to_string()))?;

        if self.replacement.is_some() {
            tracing::debug!("replacing an already pending replacement");
        }
        self.replacement = Some(replacement);
        Ok(())
    }

    /// Parses `source` and replaces the current node with its single statement.
    pub fn replace_branch_with_source(&mut self, source: &str) -> Result<(), PluginError> {
        if !self.in_rule_callback() {
            return Err(PluginError::InvalidContext("replace_branch_with_source"));
        }
        let file = self.current_file().map(Path::to_path_buf).unwrap_or_default();
        let root = self
            .parser
            .parse(&file, source)
            .map_err(|e| PluginError::InvalidArgument(e.to_string()))?;

        let NodeKind::Toplevel(body) = root.kind else {
            return Err(PluginError::InvalidArgument(
                "parser did not produce a toplevel node".to_string(),
            ));
        };
        let [statement] = <[Node; 1]>::try_from(body).map_err(|body| {
            PluginError::InvalidArgument(format!(
                "replacement source must contain exactly one statement, found {}",
                body.len()
            ))
        })?;
        self.replace_branch(statement)
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<ScopeId> {
        self.scopes.resolve(name, self.current_scope()?)
    }

    pub(crate) fn scopes_mut(&mut self) -> &mut ScopeArena {
        &mut self.scopes
    }

    pub(crate) fn push_scope(&mut self, scope: ScopeId) {
        self.stack.push(scope);
    }

    pub(crate) fn pop_scope(&mut self) -> Option<ScopeId> {
        self.stack.pop()
    }

    pub(crate) fn push_file(&mut self, path: &Path) {
        self.files.push(FileFrame {
            path: path.to_path_buf(),
            location: None,
        });
    }

    pub(crate) fn pop_file(&mut self) {
        self.files.pop();
    }

    pub(crate) fn set_location(&mut self, position: Position) {
        if let Some(frame) = self.files.last_mut() {
            frame.location = Some(position);
        }
    }

    pub(crate) fn record_file(&mut self, path: &Path, kind: FileKind) -> bool {
        self.modules.insert(path, kind)
    }

    pub(crate) fn record_unknown_effect(&mut self) {
        self.unknown_effects += 1;
    }

    pub(crate) fn enter_rule_callback(&mut self) {
        self.rule_depth += 1;
    }

    pub(crate) fn leave_rule_callback(&mut self) {
        self.rule_depth = self.rule_depth.saturating_sub(1);
    }

    pub(crate) fn take_replacement(&mut self) -> Option<Node> {
        self.replacement.take()
    }

    pub(crate) fn parser(&self) -> Rc<dyn SourceParser> {
        Rc::clone(&self.parser)
    }
}
