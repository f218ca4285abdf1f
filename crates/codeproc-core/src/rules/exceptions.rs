use crate::ast::{CatchClause, Node, Position};
use crate::error::InternalError;
use crate::processor::Pass;
use crate::semantic::{Context, ScopeKind};
use crate::value::JsValue;

use super::Completion;

impl Pass<'_> {
    /// Any statement of the block may throw, so the block, the handler and
    /// the finalizer are all walked as possibly executing.
    pub(super) fn try_statement(
        &mut self,
        block: &mut [Node],
        handler: Option<&mut CatchClause>,
        finalizer: Option<&mut Vec<Node>>,
        start: Position,
    ) -> Result<Completion, InternalError> {
        let mut completion = self.ambiguous(|pass| pass.statements(block))?;

        if let Some(handler) = handler {
            self.catch_clause(handler, start)?;
            completion = Completion::normal(None);
        }

        if let Some(finalizer) = finalizer {
            let finally = self.ambiguous(|pass| pass.statements(finalizer))?;
            if finally.is_abrupt() {
                completion = finally;
            }
        }

        Ok(completion)
    }

    fn catch_clause(&mut self, handler: &mut CatchClause, start: Position) -> Result<(), InternalError> {
        let parent = self.ctx.current_scope().unwrap_or_else(|| self.ctx.master_global());
        let file = self
            .ctx
            .current_file()
            .map(|path| path.to_path_buf())
            .unwrap_or_default();
        let scopes = self.ctx.scopes_mut();
        let scope = scopes.create_scope(
            ScopeKind::Catch,
            Some(parent),
            Context::new("catch", file, start.line, start.col),
        );
        if let Some(param) = &handler.param {
            scopes.declare(scope, param, JsValue::unknown().with_name(param.as_str()));
        }

        self.enter_scope(scope);
        let walked = self.ambiguous(|pass| pass.statements(&mut handler.body));
        self.exit_scope()?;
        walked.map(drop)
    }

    /// The thrown value is evaluated for its effects; control is assumed to
    /// continue since handlers are never matched to throw sites.
    pub(super) fn throw(&mut self, arg: &mut Node) -> Result<Completion, InternalError> {
        let thrown = self.eval(arg)?;
        Ok(Completion::normal(Some(thrown)))
    }
}
