//! Rule handlers
//!
//! [`Pass::dispatch`] validates a node, runs the handler for its kind once,
//! and hands that single result to the node's pre-order and post-order
//! listeners. Handlers live in submodules grouped by the kind of construct
//! they evaluate.

mod blocks;
mod calls;
mod control_flow;
mod exceptions;
mod literals;
mod operators;

use serde::Serialize;

use crate::ast::{Node, NodeInfo, NodeKind, Rule};
use crate::error::InternalError;
use crate::processor::Pass;
use crate::semantic::{PutOutcome, Reference, ScopeId, ScopeKind, put_value};
use crate::value::JsValue;

/// Replacements of replacements are followed at most this deep.
const MAX_REPLACEMENT_CHAIN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionKind {
    Normal,
    Break,
    Continue,
    Return,
}

/// Outcome of a statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    pub kind: CompletionKind,
    pub value: Option<JsValue>,
    pub target: Option<String>,
}

impl Completion {
    pub fn normal(value: Option<JsValue>) -> Self {
        Self {
            kind: CompletionKind::Normal,
            value,
            target: None,
        }
    }

    pub fn abrupt(kind: CompletionKind, value: Option<JsValue>, target: Option<String>) -> Self {
        Self {
            kind,
            value,
            target,
        }
    }

    pub fn is_abrupt(&self) -> bool {
        self.kind != CompletionKind::Normal
    }

    /// Completion of a construct that took one of two unknown paths.
    pub(crate) fn merge(self, other: Completion) -> Completion {
        if !self.is_abrupt() || self.kind != other.kind || self.target != other.target {
            return Completion::normal(None);
        }
        let agree = match (&self.value, &other.value) {
            (Some(a), Some(b)) => a.same_value(b),
            (None, None) => true,
            _ => false,
        };
        let value = if agree {
            self.value
        } else {
            Some(JsValue::unknown())
        };
        Completion { value, ..self }
    }
}

/// What a handler computed for a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RuleValue {
    Value(JsValue),
    Completion(Completion),
}

impl RuleValue {
    pub fn as_value(&self) -> Option<&JsValue> {
        match self {
            RuleValue::Value(value) => Some(value),
            RuleValue::Completion(_) => None,
        }
    }

    pub fn as_completion(&self) -> Option<&Completion> {
        match self {
            RuleValue::Completion(completion) => Some(completion),
            RuleValue::Value(_) => None,
        }
    }

    fn into_value(self) -> JsValue {
        match self {
            RuleValue::Value(value) => value,
            RuleValue::Completion(completion) => completion.value.unwrap_or_else(JsValue::unknown),
        }
    }

    fn into_completion(self) -> Completion {
        match self {
            RuleValue::Completion(completion) => completion,
            RuleValue::Value(value) => Completion::normal(Some(value)),
        }
    }
}

impl Pass<'_> {
    pub(crate) fn dispatch(&mut self, node: &mut Node) -> Result<RuleValue, InternalError> {
        let rule = node.rule();
        node.info.validate(rule)?;
        let start = node.start();
        self.ctx.set_location(start);

        let result = match &mut node.kind {
            NodeKind::Atom(atom) => RuleValue::Value(self.atom(*atom)),
            NodeKind::Num(n) => RuleValue::Value(JsValue::number(*n)),
            NodeKind::String(s) => RuleValue::Value(JsValue::string(s.as_str())),
            NodeKind::Name(name) => RuleValue::Value(self.name(name)),
            NodeKind::Array(items) => RuleValue::Value(self.array(items)?),
            NodeKind::Object(props) => RuleValue::Value(self.object(props)?),
            NodeKind::RegExp { pattern, flags } => {
                RuleValue::Value(JsValue::regexp(pattern.as_str(), flags.as_str()))
            }
            NodeKind::Assign { op, target, value } => {
                RuleValue::Value(self.assign(*op, target, value)?)
            }
            NodeKind::Binary { op, left, right } => RuleValue::Value(self.binary(*op, left, right)?),
            NodeKind::UnaryPostfix { op, operand } => {
                RuleValue::Value(self.unary_postfix(*op, operand)?)
            }
            NodeKind::UnaryPrefix { op, operand } => {
                RuleValue::Value(self.unary_prefix(*op, operand)?)
            }
            NodeKind::Call { callee, args } => RuleValue::Value(self.call(callee, args)?),
            NodeKind::Dot { object, property } => RuleValue::Value(self.dot(object, property)?),
            NodeKind::Sub { object, property } => RuleValue::Value(self.sub(object, property)?),
            NodeKind::Seq { first, second } => RuleValue::Value(self.seq(first, second)?),
            NodeKind::Conditional {
                test,
                consequent,
                alternate,
            } => RuleValue::Value(self.conditional(test, consequent, alternate)?),
            NodeKind::Function(func) => RuleValue::Value(self.analyze_function(func, start, true)?),
            NodeKind::New { callee, args } => RuleValue::Value(self.new_expression(callee, args)?),
            NodeKind::Toplevel(body) => RuleValue::Completion(self.toplevel(body)?),
            NodeKind::Block(body) => RuleValue::Completion(self.statements(body)?),
            NodeKind::Stat(expr) => {
                RuleValue::Completion(Completion::normal(Some(self.eval(expr)?)))
            }
            NodeKind::Label { label, body } => RuleValue::Completion(self.label(label, body)?),
            NodeKind::If {
                test,
                consequent,
                alternate,
            } => RuleValue::Completion(self.if_statement(
                test,
                consequent,
                alternate.as_deref_mut(),
            )?),
            NodeKind::With { object, body } => RuleValue::Completion(self.with(object, body)?),
            NodeKind::Var(decls) => RuleValue::Completion(self.var(decls)?),
            NodeKind::Defun(func) => RuleValue::Completion(self.defun(func, start)?),
            NodeKind::Return(arg) => {
                RuleValue::Completion(self.return_statement(arg.as_deref_mut())?)
            }
            NodeKind::Debugger => RuleValue::Completion(Completion::normal(None)),
            NodeKind::Try {
                block,
                handler,
                finalizer,
            } => RuleValue::Completion(self.try_statement(
                block,
                handler.as_mut(),
                finalizer.as_mut(),
                start,
            )?),
            NodeKind::Throw(arg) => RuleValue::Completion(self.throw(arg)?),
            NodeKind::Break(label) => RuleValue::Completion(Completion::abrupt(
                CompletionKind::Break,
                None,
                label.clone(),
            )),
            NodeKind::Continue(label) => RuleValue::Completion(Completion::abrupt(
                CompletionKind::Continue,
                None,
                label.clone(),
            )),
            NodeKind::While { test, body } => RuleValue::Completion(self.while_loop(test, body)?),
            NodeKind::Do { test, body } => RuleValue::Completion(self.do_loop(test, body)?),
            NodeKind::For {
                init,
                test,
                update,
                body,
            } => RuleValue::Completion(self.for_loop(
                init.as_deref_mut(),
                test.as_deref_mut(),
                update.as_deref_mut(),
                body,
            )?),
            NodeKind::ForIn { left, right, body } => {
                RuleValue::Completion(self.for_in(left, right, body)?)
            }
            NodeKind::Switch {
                discriminant,
                cases,
            } => RuleValue::Completion(self.switch(discriminant, cases)?),
        };

        self.ctx.set_location(start);
        self.fire_rule(node, &result, true);
        self.fire_rule(node, &result, false);

        match self.ctx.take_replacement() {
            Some(replacement) => self.apply_replacement(node, replacement, result),
            None => Ok(result),
        }
    }

    fn apply_replacement(
        &mut self,
        node: &mut Node,
        replacement: Node,
        result: RuleValue,
    ) -> Result<RuleValue, InternalError> {
        if self.replacement_chain >= MAX_REPLACEMENT_CHAIN {
            tracing::warn!(rule = %node.rule(), "replacement chain too deep, keeping current node");
            return Ok(result);
        }

        let replacement = fit_replacement(node.rule().is_expression(), replacement);
        tracing::debug!(from = %node.rule(), to = %replacement.rule(), "replacing branch");
        *node = replacement;

        self.replacement_chain += 1;
        let replaced = self.dispatch(node);
        self.replacement_chain -= 1;
        replaced
    }

    pub(crate) fn eval(&mut self, node: &mut Node) -> Result<JsValue, InternalError> {
        Ok(self.dispatch(node)?.into_value())
    }

    pub(crate) fn execute(&mut self, node: &mut Node) -> Result<Completion, InternalError> {
        Ok(self.dispatch(node)?.into_completion())
    }

    /// Reference for `name` as seen from the current scope.
    ///
    /// Undeclared names resolve to the master global scope, where a write
    /// creates them.
    pub(crate) fn binding_reference(&self, name: &str) -> Reference {
        let scope = self
            .ctx
            .resolve(name)
            .unwrap_or_else(|| self.ctx.master_global());
        Reference::binding(scope, name)
    }

    /// Evaluates an assignment target, returning its current value and the
    /// reference that writes go through.
    pub(crate) fn target(&mut self, node: &mut Node) -> Result<(JsValue, Reference), InternalError> {
        let current = self.eval(node)?;
        let reference = match &node.kind {
            NodeKind::Name(name) => self.binding_reference(name),
            _ => Reference::unresolvable(
                current
                    .name
                    .clone()
                    .unwrap_or_else(|| node.rule().name().to_string()),
            ),
        };
        Ok((current, reference))
    }

    /// Writes `value` through `reference`, degrading it to unknown when the
    /// write may not happen or happens from inside a function body.
    pub(crate) fn store(&mut self, reference: &Reference, value: JsValue) {
        if self.dead_depth > 0 {
            tracing::trace!(target_name = reference.name(), "write in unreachable code skipped");
            return;
        }
        let value = if self.is_uncertain_write(reference) {
            JsValue::unknown().with_name(reference.name())
        } else {
            value
        };
        if put_value(self.ctx.scopes_mut(), reference, value) == PutOutcome::UnknownEffect {
            self.ctx.record_unknown_effect();
        }
    }

    fn is_uncertain_write(&self, reference: &Reference) -> bool {
        let Reference::Binding { scope, .. } = reference else {
            return false;
        };
        if self.ambiguous_depth > 0 {
            return true;
        }
        match self.enclosing_function() {
            Some(function) => !self
                .ctx
                .scopes()
                .ancestors(*scope)
                .any(|ancestor| ancestor.id == function),
            None => false,
        }
    }

    /// Function scope whose body is being walked, if the innermost
    /// non-catch scope is one.
    fn enclosing_function(&self) -> Option<ScopeId> {
        let scopes = self.ctx.scopes();
        self.ctx
            .scope_stack()
            .iter()
            .rev()
            .map(|id| scopes.get(*id))
            .find(|scope| scope.kind != ScopeKind::Catch)
            .filter(|scope| scope.kind == ScopeKind::Function)
            .map(|scope| scope.id)
    }

    /// Scope that receives `var` declarations made here.
    pub(crate) fn var_scope(&self) -> ScopeId {
        let scopes = self.ctx.scopes();
        self.ctx
            .scope_stack()
            .iter()
            .rev()
            .map(|id| scopes.get(*id))
            .find(|scope| scope.kind != ScopeKind::Catch)
            .map(|scope| scope.id)
            .unwrap_or_else(|| self.ctx.master_global())
    }
}

/// Adapts a replacement to the slot it lands in: an expression statement
/// replacing an expression is unwrapped, a bare expression replacing a
/// statement is wrapped.
fn fit_replacement(expression_slot: bool, replacement: Node) -> Node {
    let Node { info, kind } = replacement;
    match kind {
        NodeKind::Stat(inner) if expression_slot => *inner,
        kind if !expression_slot && kind.rule().is_expression() => Node {
            info: NodeInfo::new(Rule::Stat, info.start, info.end),
            kind: NodeKind::Stat(Box::new(Node { info, kind })),
        },
        kind => Node { info, kind },
    }
}
