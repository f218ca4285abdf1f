use crate::ast::{FunctionNode, Node, NodeKind, Position, VarDeclarator};
use crate::error::InternalError;
use crate::processor::Pass;
use crate::semantic::ScopeId;
use crate::value::{JsValue, ValueType};

use super::{Completion, CompletionKind};

/// A name introduced into the enclosing function or global scope.
#[derive(Debug, PartialEq)]
enum Declaration<'a> {
    Var(&'a str),
    Function(&'a str),
}

/// Collects `var` and function declarations reachable from `body` without
/// crossing into nested functions.
fn collect_declarations<'a>(body: &'a [Node], out: &mut Vec<Declaration<'a>>) {
    for node in body {
        collect_from(node, out);
    }
}

fn collect_from<'a>(node: &'a Node, out: &mut Vec<Declaration<'a>>) {
    match &node.kind {
        NodeKind::Var(decls) => {
            out.extend(decls.iter().map(|decl| Declaration::Var(decl.name.as_str())));
        }
        NodeKind::Defun(FunctionNode { name: Some(name), .. }) => {
            out.push(Declaration::Function(name.as_str()));
        }
        NodeKind::Block(body) => collect_declarations(body, out),
        NodeKind::If {
            consequent,
            alternate,
            ..
        } => {
            collect_from(consequent, out);
            if let Some(alternate) = alternate {
                collect_from(alternate, out);
            }
        }
        NodeKind::Label { body, .. } | NodeKind::With { body, .. } => collect_from(body, out),
        NodeKind::Try {
            block,
            handler,
            finalizer,
        } => {
            collect_declarations(block, out);
            if let Some(handler) = handler {
                collect_declarations(&handler.body, out);
            }
            if let Some(finalizer) = finalizer {
                collect_declarations(finalizer, out);
            }
        }
        NodeKind::While { body, .. } | NodeKind::Do { body, .. } => collect_from(body, out),
        NodeKind::For { init, body, .. } => {
            if let Some(init) = init {
                collect_from(init, out);
            }
            collect_from(body, out);
        }
        NodeKind::ForIn { left, body, .. } => {
            collect_from(left, out);
            collect_from(body, out);
        }
        NodeKind::Switch { cases, .. } => {
            for case in cases {
                collect_declarations(&case.body, out);
            }
        }
        _ => {}
    }
}

impl Pass<'_> {
    /// Declares everything `body` hoists into `scope` before it runs.
    pub(super) fn hoist(&mut self, scope: ScopeId, body: &[Node]) {
        let mut declarations = Vec::new();
        collect_declarations(body, &mut declarations);

        let scopes = self.ctx.scopes_mut();
        for declaration in declarations {
            match declaration {
                Declaration::Var(name) => scopes.declare(scope, name, JsValue::undefined()),
                Declaration::Function(name) => scopes.set_binding(
                    scope,
                    name,
                    JsValue::of_type(ValueType::Function).with_name(name),
                ),
            }
        }
    }

    pub(super) fn toplevel(&mut self, body: &mut [Node]) -> Result<Completion, InternalError> {
        let scope = self.var_scope();
        self.hoist(scope, body);
        self.statements(body)
    }

    /// Runs a statement list; everything after the first abrupt completion
    /// is walked as unreachable.
    pub(super) fn statements(&mut self, body: &mut [Node]) -> Result<Completion, InternalError> {
        let mut result = Completion::normal(None);
        let mut abrupt: Option<Completion> = None;

        for statement in body {
            if abrupt.is_some() {
                self.dead(|pass| pass.execute(statement))?;
                continue;
            }
            let completion = self.execute(statement)?;
            if completion.is_abrupt() {
                abrupt = Some(completion);
            } else if completion.value.is_some() {
                result = completion;
            }
        }

        Ok(abrupt.unwrap_or(result))
    }

    pub(super) fn var(&mut self, decls: &mut [VarDeclarator]) -> Result<Completion, InternalError> {
        let scope = self.var_scope();
        for decl in decls {
            self.ctx
                .scopes_mut()
                .declare(scope, &decl.name, JsValue::undefined());
            if let Some(init) = decl.init.as_mut() {
                let value = self.eval(init)?;
                let reference = self.binding_reference(&decl.name);
                self.store(&reference, value);
            }
        }
        Ok(Completion::normal(None))
    }

    pub(super) fn defun(&mut self, func: &mut FunctionNode, start: Position) -> Result<Completion, InternalError> {
        let value = self.analyze_function(func, start, false)?;
        if let Some(name) = &func.name {
            let scope = self.var_scope();
            self.ctx.scopes_mut().set_binding(scope, name, value);
        }
        Ok(Completion::normal(None))
    }

    pub(super) fn label(&mut self, label: &str, body: &mut Node) -> Result<Completion, InternalError> {
        let completion = self.execute(body)?;
        let targets_label = matches!(
            completion.kind,
            CompletionKind::Break | CompletionKind::Continue
        ) && completion.target.as_deref() == Some(label);

        Ok(if targets_label {
            Completion::normal(None)
        } else {
            completion
        })
    }

    pub(super) fn with(&mut self, object: &mut Node, body: &mut Node) -> Result<Completion, InternalError> {
        self.eval(object)?;
        self.ambiguous(|pass| pass.execute(body))
    }

    pub(super) fn return_statement(&mut self, arg: Option<&mut Node>) -> Result<Completion, InternalError> {
        let value = match arg {
            Some(arg) => self.eval(arg)?,
            None => JsValue::undefined(),
        };
        Ok(Completion::abrupt(CompletionKind::Return, Some(value), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CatchClause, SwitchCase};

    fn var(name: &str) -> Node {
        Node::synthetic(NodeKind::Var(vec![VarDeclarator {
            name: name.to_string(),
            init: None,
        }]))
    }

    fn defun(name: &str, body: Vec<Node>) -> Node {
        Node::synthetic(NodeKind::Defun(FunctionNode {
            name: Some(name.to_string()),
            params: Vec::new(),
            body,
        }))
    }

    #[test]
    fn collects_declarations_from_nested_statements() {
        let body = vec![
            var("a"),
            Node::synthetic(NodeKind::Block(vec![var("b")])),
            Node::synthetic(NodeKind::Try {
                block: vec![var("c")],
                handler: Some(CatchClause {
                    param: Some("e".to_string()),
                    body: vec![var("d")],
                }),
                finalizer: None,
            }),
            Node::synthetic(NodeKind::Switch {
                discriminant: Box::new(Node::synthetic(NodeKind::Num(1.0))),
                cases: vec![SwitchCase {
                    test: None,
                    body: vec![defun("f", Vec::new())],
                }],
            }),
        ];
        let mut out = Vec::new();

        collect_declarations(&body, &mut out);

        assert_eq!(
            out,
            vec![
                Declaration::Var("a"),
                Declaration::Var("b"),
                Declaration::Var("c"),
                Declaration::Var("d"),
                Declaration::Function("f"),
            ]
        );
    }

    #[test]
    fn does_not_descend_into_functions() {
        let body = vec![defun("outer", vec![var("inner")])];
        let mut out = Vec::new();

        collect_declarations(&body, &mut out);

        assert_eq!(out, vec![Declaration::Function("outer")]);
    }
}
