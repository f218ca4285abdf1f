//! Source parsers that produce the AST consumed by the dispatcher
//!
//! [`SwcParser`] parses JavaScript with swc and lowers the result into
//! [`Node`] trees. [`JsonAstParser`] reads trees that an external parser has
//! already serialized in the `[nodeInfo, child...]` form.

use std::path::Path;

use serde::Serialize;
use swc_common::sync::Lrc;
use swc_common::{BytePos, FileName, SourceMap, Span, Spanned};
use swc_ecma_ast as js;
use swc_ecma_parser::{EsSyntax, Parser, StringInput, Syntax, lexer::Lexer};

use crate::ast::json::node_from_json;
use crate::ast::{
    Atom, BinaryOp, CatchClause, FunctionNode, Node, NodeKind, Position, Property, Rule,
    SwitchCase, UnaryOp, UpdateOp, VarDeclarator,
};
use crate::error::InternalError;

/// A source text the parser rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message} ({line}:{column})")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseFailure {
    /// The file is not valid input; only that file is skipped.
    #[error(transparent)]
    Syntax(#[from] ParseError),
    /// The parser produced a tree that breaks the node contract.
    #[error(transparent)]
    Contract(#[from] InternalError),
}

pub trait SourceParser {
    /// Parses `source` (read from `file`) into a `Toplevel` node.
    fn parse(&self, file: &Path, source: &str) -> Result<Node, ParseFailure>;
}

/// JavaScript parser backed by swc.
#[derive(Debug, Clone, Default)]
pub struct SwcParser;

impl SwcParser {
    pub fn new() -> Self {
        Self
    }
}

impl SourceParser for SwcParser {
    fn parse(&self, file: &Path, source: &str) -> Result<Node, ParseFailure> {
        let source_map: Lrc<SourceMap> = Default::default();
        let fm = source_map.new_source_file(
            FileName::Real(file.to_path_buf()).into(),
            source.to_string(),
        );

        let lexer = Lexer::new(
            Syntax::Es(EsSyntax::default()),
            Default::default(),
            StringInput::from(&*fm),
            None,
        );
        let mut parser = Parser::new_from(lexer);

        let lowering = Lowering { source_map };
        let script = parser
            .parse_script()
            .map_err(|e| lowering.error(e.span(), e.kind().msg().to_string()))?;
        if let Some(e) = parser.take_errors().into_iter().next() {
            return Err(lowering.error(e.span(), e.kind().msg().to_string()).into());
        }

        let body = lowering.stmts(&script.body)?;
        Ok(lowering.node(NodeKind::Toplevel(body), script.span))
    }
}

/// Reads a JSON-serialized AST.
///
/// Text that is not JSON is a syntax error; JSON that does not describe a
/// well-formed tree breaks the parser contract.
#[derive(Debug, Clone, Default)]
pub struct JsonAstParser;

impl SourceParser for JsonAstParser {
    fn parse(&self, _file: &Path, source: &str) -> Result<Node, ParseFailure> {
        let value: serde_json::Value = serde_json::from_str(source).map_err(|e| ParseError {
            message: e.to_string(),
            line: e.line(),
            column: e.column(),
        })?;

        let root = node_from_json(&value)?;
        if root.rule() != Rule::Toplevel {
            return Err(InternalError::MalformedNode {
                what: "root".to_string(),
                reason: format!("expected a toplevel node, found '{}'", root.rule()),
            }
            .into());
        }
        Ok(root)
    }
}

struct Lowering {
    source_map: Lrc<SourceMap>,
}

type Lowered<T> = Result<T, ParseError>;

impl Lowering {
    fn position(&self, pos: BytePos) -> Position {
        let loc = self.source_map.lookup_char_pos(pos);
        Position::new(loc.line, loc.col_display)
    }

    fn node(&self, kind: NodeKind, span: Span) -> Node {
        Node::new(kind, self.position(span.lo), self.position(span.hi))
    }

    fn error(&self, span: Span, message: String) -> ParseError {
        let start = self.position(span.lo);
        ParseError {
            message,
            line: start.line,
            column: start.col,
        }
    }

    fn unsupported(&self, span: Span, what: &str) -> ParseError {
        self.error(span, format!("unsupported syntax: {what}"))
    }

    fn stmts(&self, stmts: &[js::Stmt]) -> Lowered<Vec<Node>> {
        stmts.iter().map(|stmt| self.stmt(stmt)).collect()
    }

    fn boxed(&self, expr: &js::Expr) -> Lowered<Box<Node>> {
        self.expr(expr).map(Box::new)
    }

    fn boxed_stmt(&self, stmt: &js::Stmt) -> Lowered<Box<Node>> {
        self.stmt(stmt).map(Box::new)
    }

    fn optional(&self, expr: Option<&js::Expr>) -> Lowered<Option<Box<Node>>> {
        expr.map(|e| self.boxed(e)).transpose()
    }

    fn stmt(&self, stmt: &js::Stmt) -> Lowered<Node> {
        let span = stmt.span();
        let kind = match stmt {
            js::Stmt::Block(block) => NodeKind::Block(self.stmts(&block.stmts)?),
            js::Stmt::Empty(_) => NodeKind::Block(Vec::new()),
            js::Stmt::Debugger(_) => NodeKind::Debugger,
            js::Stmt::With(with) => NodeKind::With {
                object: self.boxed(&with.obj)?,
                body: self.boxed_stmt(&with.body)?,
            },
            js::Stmt::Return(ret) => NodeKind::Return(self.optional(ret.arg.as_deref())?),
            js::Stmt::Labeled(labeled) => NodeKind::Label {
                label: labeled.label.sym.to_string(),
                body: self.boxed_stmt(&labeled.body)?,
            },
            js::Stmt::Break(brk) => NodeKind::Break(brk.label.as_ref().map(|l| l.sym.to_string())),
            js::Stmt::Continue(cont) => {
                NodeKind::Continue(cont.label.as_ref().map(|l| l.sym.to_string()))
            }
            js::Stmt::If(if_stmt) => NodeKind::If {
                test: self.boxed(&if_stmt.test)?,
                consequent: self.boxed_stmt(&if_stmt.cons)?,
                alternate: if_stmt
                    .alt
                    .as_deref()
                    .map(|alt| self.boxed_stmt(alt))
                    .transpose()?,
            },
            js::Stmt::Switch(switch) => NodeKind::Switch {
                discriminant: self.boxed(&switch.discriminant)?,
                cases: switch
                    .cases
                    .iter()
                    .map(|case| {
                        Ok(SwitchCase {
                            test: case.test.as_deref().map(|t| self.expr(t)).transpose()?,
                            body: self.stmts(&case.cons)?,
                        })
                    })
                    .collect::<Lowered<Vec<_>>>()?,
            },
            js::Stmt::Throw(throw) => NodeKind::Throw(self.boxed(&throw.arg)?),
            js::Stmt::Try(try_stmt) => NodeKind::Try {
                block: self.stmts(&try_stmt.block.stmts)?,
                handler: try_stmt
                    .handler
                    .as_ref()
                    .map(|handler| -> Lowered<CatchClause> {
                        Ok(CatchClause {
                            param: handler
                                .param
                                .as_ref()
                                .map(|pat| self.binding_name(pat))
                                .transpose()?,
                            body: self.stmts(&handler.body.stmts)?,
                        })
                    })
                    .transpose()?,
                finalizer: try_stmt
                    .finalizer
                    .as_ref()
                    .map(|block| self.stmts(&block.stmts))
                    .transpose()?,
            },
            js::Stmt::While(while_stmt) => NodeKind::While {
                test: self.boxed(&while_stmt.test)?,
                body: self.boxed_stmt(&while_stmt.body)?,
            },
            js::Stmt::DoWhile(do_while) => NodeKind::Do {
                test: self.boxed(&do_while.test)?,
                body: self.boxed_stmt(&do_while.body)?,
            },
            js::Stmt::For(for_stmt) => NodeKind::For {
                init: for_stmt
                    .init
                    .as_ref()
                    .map(|init| match init {
                        js::VarDeclOrExpr::VarDecl(decl) => self.var_decl(decl).map(Box::new),
                        js::VarDeclOrExpr::Expr(expr) => self.boxed(expr),
                    })
                    .transpose()?,
                test: self.optional(for_stmt.test.as_deref())?,
                update: self.optional(for_stmt.update.as_deref())?,
                body: self.boxed_stmt(&for_stmt.body)?,
            },
            js::Stmt::ForIn(for_in) => NodeKind::ForIn {
                left: Box::new(self.for_head(&for_in.left, span)?),
                right: self.boxed(&for_in.right)?,
                body: self.boxed_stmt(&for_in.body)?,
            },
            js::Stmt::ForOf(_) => return Err(self.unsupported(span, "for-of loop")),
            js::Stmt::Decl(decl) => return self.decl(decl, span),
            js::Stmt::Expr(expr) => NodeKind::Stat(self.boxed(&expr.expr)?),
            #[allow(unreachable_patterns)]
            _ => return Err(self.unsupported(span, "statement")),
        };
        Ok(self.node(kind, span))
    }

    fn decl(&self, decl: &js::Decl, span: Span) -> Lowered<Node> {
        match decl {
            js::Decl::Var(var) => self.var_decl(var),
            js::Decl::Fn(fn_decl) => {
                let func = self.function(Some(fn_decl.ident.sym.to_string()), &fn_decl.function)?;
                Ok(self.node(NodeKind::Defun(func), span))
            }
            js::Decl::Class(_) => Err(self.unsupported(span, "class declaration")),
            _ => Err(self.unsupported(span, "declaration")),
        }
    }

    fn var_decl(&self, decl: &js::VarDecl) -> Lowered<Node> {
        let decls = decl
            .decls
            .iter()
            .map(|declarator| {
                Ok(VarDeclarator {
                    name: self.binding_name(&declarator.name)?,
                    init: declarator
                        .init
                        .as_deref()
                        .map(|init| self.expr(init))
                        .transpose()?,
                })
            })
            .collect::<Lowered<Vec<_>>>()?;
        Ok(self.node(NodeKind::Var(decls), decl.span))
    }

    fn for_head(&self, head: &js::ForHead, span: Span) -> Lowered<Node> {
        match head {
            js::ForHead::VarDecl(decl) => self.var_decl(decl),
            js::ForHead::Pat(pat) => match pat.as_ref() {
                js::Pat::Ident(binding) => Ok(self.node(
                    NodeKind::Name(binding.id.sym.to_string()),
                    binding.span(),
                )),
                js::Pat::Expr(expr) => self.expr(expr),
                _ => Err(self.unsupported(span, "destructuring loop variable")),
            },
            _ => Err(self.unsupported(span, "using declaration")),
        }
    }

    fn binding_name(&self, pat: &js::Pat) -> Lowered<String> {
        match pat {
            js::Pat::Ident(binding) => Ok(binding.id.sym.to_string()),
            other => Err(self.unsupported(other.span(), "destructuring pattern")),
        }
    }

    fn function(&self, name: Option<String>, func: &js::Function) -> Lowered<FunctionNode> {
        if func.is_async || func.is_generator {
            return Err(self.unsupported(func.span, "async or generator function"));
        }
        let params = func
            .params
            .iter()
            .map(|param| self.binding_name(&param.pat))
            .collect::<Lowered<Vec<_>>>()?;
        let body = match &func.body {
            Some(block) => self.stmts(&block.stmts)?,
            None => return Err(self.unsupported(func.span, "function without a body")),
        };
        Ok(FunctionNode { name, params, body })
    }

    fn arrow(&self, arrow: &js::ArrowExpr) -> Lowered<FunctionNode> {
        if arrow.is_async || arrow.is_generator {
            return Err(self.unsupported(arrow.span, "async arrow function"));
        }
        let params = arrow
            .params
            .iter()
            .map(|pat| self.binding_name(pat))
            .collect::<Lowered<Vec<_>>>()?;
        let body = match arrow.body.as_ref() {
            js::BlockStmtOrExpr::BlockStmt(block) => self.stmts(&block.stmts)?,
            js::BlockStmtOrExpr::Expr(expr) => {
                let value = self.boxed(expr)?;
                vec![self.node(NodeKind::Return(Some(value)), expr.span())]
            }
            #[allow(unreachable_patterns)]
            _ => return Err(self.unsupported(arrow.span, "arrow function body")),
        };
        Ok(FunctionNode {
            name: None,
            params,
            body,
        })
    }

    fn args(&self, args: &[js::ExprOrSpread]) -> Lowered<Vec<Node>> {
        args.iter()
            .map(|arg| match arg.spread {
                Some(spread) => Err(self.unsupported(spread, "spread argument")),
                None => self.expr(&arg.expr),
            })
            .collect()
    }

    fn expr(&self, expr: &js::Expr) -> Lowered<Node> {
        let span = expr.span();
        let kind = match expr {
            js::Expr::This(_) => NodeKind::Atom(Atom::This),
            js::Expr::Ident(ident) => NodeKind::Name(ident.sym.to_string()),
            js::Expr::Lit(lit) => self.literal(lit, span)?,
            js::Expr::Tpl(tpl) if tpl.exprs.is_empty() => NodeKind::String(
                tpl.quasis
                    .iter()
                    .map(|quasi| match &quasi.cooked {
                        Some(cooked) => cooked.to_string(),
                        None => quasi.raw.to_string(),
                    })
                    .collect(),
            ),
            js::Expr::Array(array) => NodeKind::Array(
                array
                    .elems
                    .iter()
                    .map(|elem| match elem {
                        Some(js::ExprOrSpread { spread: None, expr }) => self.expr(expr),
                        Some(_) => Err(self.unsupported(span, "spread element")),
                        None => Ok(self.node(NodeKind::Atom(Atom::Undefined), span)),
                    })
                    .collect::<Lowered<Vec<_>>>()?,
            ),
            js::Expr::Object(object) => NodeKind::Object(
                object
                    .props
                    .iter()
                    .map(|prop| self.property(prop, span))
                    .collect::<Lowered<Vec<_>>>()?,
            ),
            js::Expr::Fn(fn_expr) => NodeKind::Function(self.function(
                fn_expr.ident.as_ref().map(|ident| ident.sym.to_string()),
                &fn_expr.function,
            )?),
            js::Expr::Arrow(arrow) => NodeKind::Function(self.arrow(arrow)?),
            js::Expr::Unary(unary) => NodeKind::UnaryPrefix {
                op: match unary.op {
                    js::UnaryOp::Minus => UnaryOp::Minus,
                    js::UnaryOp::Plus => UnaryOp::Plus,
                    js::UnaryOp::Bang => UnaryOp::Not,
                    js::UnaryOp::Tilde => UnaryOp::Tilde,
                    js::UnaryOp::TypeOf => UnaryOp::TypeOf,
                    js::UnaryOp::Void => UnaryOp::Void,
                    js::UnaryOp::Delete => UnaryOp::Delete,
                },
                operand: self.boxed(&unary.arg)?,
            },
            js::Expr::Update(update) => {
                let operand = self.boxed(&update.arg)?;
                match (update.prefix, update.op) {
                    (true, js::UpdateOp::PlusPlus) => NodeKind::UnaryPrefix {
                        op: UnaryOp::Increment,
                        operand,
                    },
                    (true, js::UpdateOp::MinusMinus) => NodeKind::UnaryPrefix {
                        op: UnaryOp::Decrement,
                        operand,
                    },
                    (false, js::UpdateOp::PlusPlus) => NodeKind::UnaryPostfix {
                        op: UpdateOp::Increment,
                        operand,
                    },
                    (false, js::UpdateOp::MinusMinus) => NodeKind::UnaryPostfix {
                        op: UpdateOp::Decrement,
                        operand,
                    },
                }
            }
            js::Expr::Bin(bin) => NodeKind::Binary {
                op: self.binary_op(bin.op, span)?,
                left: self.boxed(&bin.left)?,
                right: self.boxed(&bin.right)?,
            },
            js::Expr::Assign(assign) => NodeKind::Assign {
                op: self.assign_op(assign.op, span)?,
                target: Box::new(self.assign_target(&assign.left, span)?),
                value: self.boxed(&assign.right)?,
            },
            js::Expr::Member(member) => self.member(member)?,
            js::Expr::Cond(cond) => NodeKind::Conditional {
                test: self.boxed(&cond.test)?,
                consequent: self.boxed(&cond.cons)?,
                alternate: self.boxed(&cond.alt)?,
            },
            js::Expr::Call(call) => match &call.callee {
                js::Callee::Expr(callee) => NodeKind::Call {
                    callee: self.boxed(callee)?,
                    args: self.args(&call.args)?,
                },
                _ => return Err(self.unsupported(span, "super or import call")),
            },
            js::Expr::New(new) => NodeKind::New {
                callee: self.boxed(&new.callee)?,
                args: match &new.args {
                    Some(args) => self.args(args)?,
                    None => Vec::new(),
                },
            },
            js::Expr::Seq(seq) => {
                let mut exprs = seq.exprs.iter();
                let first = match exprs.next() {
                    Some(first) => self.expr(first)?,
                    None => return Err(self.unsupported(span, "empty sequence")),
                };
                return exprs.try_fold(first, |acc, next| {
                    let second = self.expr(next)?;
                    Ok(self.node(
                        NodeKind::Seq {
                            first: Box::new(acc),
                            second: Box::new(second),
                        },
                        span,
                    ))
                });
            }
            js::Expr::Paren(paren) => return self.expr(&paren.expr),
            _ => return Err(self.unsupported(span, "expression")),
        };
        Ok(self.node(kind, span))
    }

    fn literal(&self, lit: &js::Lit, span: Span) -> Lowered<NodeKind> {
        Ok(match lit {
            js::Lit::Str(s) => NodeKind::String(s.value.to_string()),
            js::Lit::Bool(b) => NodeKind::Atom(if b.value { Atom::True } else { Atom::False }),
            js::Lit::Null(_) => NodeKind::Atom(Atom::Null),
            js::Lit::Num(n) => NodeKind::Num(n.value),
            js::Lit::Regex(re) => NodeKind::RegExp {
                pattern: re.exp.to_string(),
                flags: re.flags.to_string(),
            },
            _ => return Err(self.unsupported(span, "literal")),
        })
    }

    fn property(&self, prop: &js::PropOrSpread, span: Span) -> Lowered<Property> {
        let prop = match prop {
            js::PropOrSpread::Prop(prop) => prop,
            js::PropOrSpread::Spread(_) => return Err(self.unsupported(span, "object spread")),
        };
        match prop.as_ref() {
            js::Prop::KeyValue(kv) => Ok(Property {
                key: self.prop_name(&kv.key, span)?,
                value: self.expr(&kv.value)?,
            }),
            js::Prop::Shorthand(ident) => Ok(Property {
                key: ident.sym.to_string(),
                value: self.node(NodeKind::Name(ident.sym.to_string()), ident.span),
            }),
            js::Prop::Method(method) => Ok(Property {
                key: self.prop_name(&method.key, span)?,
                value: self.node(
                    NodeKind::Function(self.function(None, &method.function)?),
                    method.function.span,
                ),
            }),
            _ => Err(self.unsupported(span, "accessor property")),
        }
    }

    fn prop_name(&self, name: &js::PropName, span: Span) -> Lowered<String> {
        match name {
            js::PropName::Ident(ident) => Ok(ident.sym.to_string()),
            js::PropName::Str(s) => Ok(s.value.to_string()),
            js::PropName::Num(n) => Ok(n.value.to_string()),
            _ => Err(self.unsupported(span, "computed property name")),
        }
    }

    fn member(&self, member: &js::MemberExpr) -> Lowered<NodeKind> {
        let object = self.boxed(&member.obj)?;
        match &member.prop {
            js::MemberProp::Ident(ident) => Ok(NodeKind::Dot {
                object,
                property: ident.sym.to_string(),
            }),
            js::MemberProp::Computed(computed) => Ok(NodeKind::Sub {
                object,
                property: self.boxed(&computed.expr)?,
            }),
            _ => Err(self.unsupported(member.span, "private member")),
        }
    }

    fn assign_target(&self, target: &js::AssignTarget, span: Span) -> Lowered<Node> {
        match target {
            js::AssignTarget::Simple(js::SimpleAssignTarget::Ident(binding)) => Ok(self.node(
                NodeKind::Name(binding.id.sym.to_string()),
                binding.span(),
            )),
            js::AssignTarget::Simple(js::SimpleAssignTarget::Member(member)) => {
                let kind = self.member(member)?;
                Ok(self.node(kind, member.span))
            }
            js::AssignTarget::Simple(js::SimpleAssignTarget::Paren(paren)) => self.expr(&paren.expr),
            _ => Err(self.unsupported(span, "destructuring assignment")),
        }
    }

    fn binary_op(&self, op: js::BinaryOp, span: Span) -> Lowered<BinaryOp> {
        Ok(match op {
            js::BinaryOp::Add => BinaryOp::Add,
            js::BinaryOp::Sub => BinaryOp::Sub,
            js::BinaryOp::Mul => BinaryOp::Mul,
            js::BinaryOp::Div => BinaryOp::Div,
            js::BinaryOp::Mod => BinaryOp::Mod,
            js::BinaryOp::Lt => BinaryOp::Lt,
            js::BinaryOp::Gt => BinaryOp::Gt,
            js::BinaryOp::LtEq => BinaryOp::LtEq,
            js::BinaryOp::GtEq => BinaryOp::GtEq,
            js::BinaryOp::EqEq => BinaryOp::EqEq,
            js::BinaryOp::NotEq => BinaryOp::NotEq,
            js::BinaryOp::EqEqEq => BinaryOp::EqEqEq,
            js::BinaryOp::NotEqEq => BinaryOp::NotEqEq,
            js::BinaryOp::LogicalAnd => BinaryOp::LogicalAnd,
            js::BinaryOp::LogicalOr => BinaryOp::LogicalOr,
            js::BinaryOp::BitAnd => BinaryOp::BitAnd,
            js::BinaryOp::BitOr => BinaryOp::BitOr,
            js::BinaryOp::BitXor => BinaryOp::BitXor,
            js::BinaryOp::LShift => BinaryOp::LShift,
            js::BinaryOp::RShift => BinaryOp::RShift,
            js::BinaryOp::ZeroFillRShift => BinaryOp::ZeroFillRShift,
            js::BinaryOp::InstanceOf => BinaryOp::InstanceOf,
            js::BinaryOp::In => BinaryOp::In,
            _ => return Err(self.unsupported(span, "operator")),
        })
    }

    fn assign_op(&self, op: js::AssignOp, span: Span) -> Lowered<Option<BinaryOp>> {
        Ok(Some(match op {
            js::AssignOp::Assign => return Ok(None),
            js::AssignOp::AddAssign => BinaryOp::Add,
            js::AssignOp::SubAssign => BinaryOp::Sub,
            js::AssignOp::MulAssign => BinaryOp::Mul,
            js::AssignOp::DivAssign => BinaryOp::Div,
            js::AssignOp::ModAssign => BinaryOp::Mod,
            js::AssignOp::LShiftAssign => BinaryOp::LShift,
            js::AssignOp::RShiftAssign => BinaryOp::RShift,
            js::AssignOp::ZeroFillRShiftAssign => BinaryOp::ZeroFillRShift,
            js::AssignOp::BitOrAssign => BinaryOp::BitOr,
            js::AssignOp::BitXorAssign => BinaryOp::BitXor,
            js::AssignOp::BitAndAssign => BinaryOp::BitAnd,
            _ => return Err(self.unsupported(span, "assignment operator")),
        }))
    }
}
