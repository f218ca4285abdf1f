//! One traversal of the project for one listener set

use std::path::Path;
use std::rc::Rc;

use crate::ast::Node;
use crate::config::Config;
use crate::error::InternalError;
use crate::events::{EventData, ListenerSet, RuleEvent, StateEvent};
use crate::parser::SourceParser;
use crate::project::Project;
use crate::rules::RuleValue;
use crate::semantic::ScopeId;

use super::context::PassContext;
use super::walker::FileKind;
use super::PassSummary;

pub(crate) struct Pass<'p> {
    pub(crate) ctx: PassContext,
    listeners: &'p mut ListenerSet,
    config: &'p Config,
    project: &'p Project,
    pub(crate) summary: PassSummary,
    /// Nesting depth of regions that may run zero, one or many times.
    pub(crate) ambiguous_depth: usize,
    /// Nesting depth of regions that never run.
    pub(crate) dead_depth: usize,
    pub(crate) replacement_chain: usize,
}

impl<'p> Pass<'p> {
    pub(crate) fn new(
        listeners: &'p mut ListenerSet,
        config: &'p Config,
        project: &'p Project,
        parser: Rc<dyn SourceParser>,
    ) -> Self {
        let tag = listeners.tag().map(str::to_string);
        let ctx = PassContext::new(tag.clone(), &project.entry_file, parser);
        Self {
            ctx,
            listeners,
            config,
            project,
            summary: PassSummary {
                tag,
                ..PassSummary::default()
            },
            ambiguous_depth: 0,
            dead_depth: 0,
            replacement_chain: 0,
        }
    }

    pub(crate) fn run(mut self) -> Result<PassSummary, InternalError> {
        let entry = self.project.entry_file.clone();
        self.process_file(&entry, FileKind::Script)?;
        self.fire(EventData::ProcessingComplete {});

        let mut summary = self.summary;
        summary.files = self.ctx.processed_files().cloned().collect();
        summary.scope_count = self.ctx.scopes().len();
        summary.unknown_effects = self.ctx.unknown_effects();
        tracing::debug!(
            files = summary.files.len(),
            scopes = summary.scope_count,
            unknown_effects = summary.unknown_effects,
            "pass complete"
        );
        Ok(summary)
    }

    pub(crate) fn config(&self) -> &Config {
        self.config
    }

    pub(crate) fn resources_dir(&self) -> &Path {
        &self.project.resources_dir
    }

    pub(crate) fn fire(&mut self, data: EventData) {
        let event = StateEvent {
            name: data.name(),
            current_context: self.ctx.current_context(),
            data,
        };
        tracing::trace!(event = event.name, "process state event");
        self.listeners.fire_state(&mut self.ctx, &event);
    }

    pub(crate) fn fire_rule(&mut self, node: &Node, value: &RuleValue, preorder: bool) {
        let event = RuleEvent {
            current_context: self.ctx.current_context(),
            rule: node.rule(),
            node,
            value,
            preorder,
        };
        self.listeners.fire_rule(&mut self.ctx, &event);
    }

    /// Pushes `scope` and announces the change with the context being left.
    pub(crate) fn enter_scope(&mut self, scope: ScopeId) {
        let previous_context = self
            .ctx
            .current_scope()
            .map(|current| self.ctx.scopes().get(current).context.clone());
        self.ctx.push_scope(scope);
        self.fire(EventData::ContextChange { previous_context });
    }

    /// Pops the current scope and announces the change with the popped context.
    pub(crate) fn exit_scope(&mut self) -> Result<ScopeId, InternalError> {
        let scope = self
            .ctx
            .pop_scope()
            .ok_or(InternalError::ScopeStackUnderflow)?;
        let popped = self.ctx.scopes().get(scope).context.clone();
        self.fire(EventData::ContextChange {
            previous_context: Some(popped),
        });
        Ok(scope)
    }

    /// Runs `f` with writes treated as possibly happening.
    pub(crate) fn ambiguous<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, InternalError>,
    ) -> Result<T, InternalError> {
        self.ambiguous_depth += 1;
        let result = f(self);
        self.ambiguous_depth -= 1;
        result
    }

    /// Runs `f` over code that is walked but known never to execute.
    pub(crate) fn dead<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, InternalError>,
    ) -> Result<T, InternalError> {
        self.dead_depth += 1;
        let result = f(self);
        self.dead_depth -= 1;
        result
    }
}
