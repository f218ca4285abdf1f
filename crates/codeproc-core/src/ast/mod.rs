//! AST model consumed by the rule dispatcher
//!
//! Every node carries a [`NodeInfo`] header describing its rule name and
//! source span, followed by the kind-specific children held in [`NodeKind`].

pub mod json;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::InternalError;

/// Rule name that matches every node kind.
pub const ALL_RULES: &str = "allrules";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

/// Node header: `{name, start, end}` and nothing else.
///
/// Keys a parser collaborator emits beyond the recognized three are kept in
/// `extra` so the dispatcher can reject the node when it reaches it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeInfo {
    pub name: String,
    pub start: Position,
    pub end: Position,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl NodeInfo {
    pub fn new(rule: Rule, start: Position, end: Position) -> Self {
        Self {
            name: rule.name().to_string(),
            start,
            end,
            extra: BTreeMap::new(),
        }
    }

    pub fn validate(&self, rule: Rule) -> Result<(), InternalError> {
        if let Some(key) = self.extra.keys().next() {
            return Err(InternalError::MalformedNodeInfo {
                rule: rule.name(),
                line: self.start.line,
                reason: format!("unrecognized key '{key}'"),
            });
        }
        if self.name != rule.name() {
            return Err(InternalError::MalformedNodeInfo {
                rule: rule.name(),
                line: self.start.line,
                reason: format!("name '{}' does not match the node kind", self.name),
            });
        }
        Ok(())
    }
}

macro_rules! rules {
    ($($variant:ident => $name:literal,)*) => {
        /// Closed set of node kinds the dispatcher knows how to process.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum Rule {
            $($variant,)*
        }

        impl Rule {
            pub const ALL: &'static [Rule] = &[$(Rule::$variant,)*];

            pub fn name(self) -> &'static str {
                match self {
                    $(Rule::$variant => $name,)*
                }
            }

            pub fn from_name(name: &str) -> Option<Rule> {
                match name {
                    $($name => Some(Rule::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

rules! {
    Atom => "Atom",
    Num => "Num",
    String => "String",
    Name => "Name",
    Array => "Array",
    Object => "Object",
    RegExp => "RegExp",
    Assign => "Assign",
    Binary => "Binary",
    UnaryPostfix => "UnaryPostfix",
    UnaryPrefix => "UnaryPrefix",
    Call => "Call",
    Dot => "Dot",
    Sub => "Sub",
    Seq => "Seq",
    Conditional => "Conditional",
    Function => "Function",
    New => "New",
    Toplevel => "Toplevel",
    Block => "Block",
    Stat => "Stat",
    Label => "Label",
    If => "If",
    With => "With",
    Var => "Var",
    Defun => "Defun",
    Return => "Return",
    Debugger => "Debugger",
    Try => "Try",
    Throw => "Throw",
    Break => "Break",
    Continue => "Continue",
    While => "While",
    Do => "Do",
    For => "For",
    ForIn => "ForIn",
    Switch => "Switch",
}

impl Rule {
    /// Rules that produce a value rather than a completion.
    pub fn is_expression(self) -> bool {
        matches!(
            self,
            Rule::Atom
                | Rule::Num
                | Rule::String
                | Rule::Name
                | Rule::Array
                | Rule::Object
                | Rule::RegExp
                | Rule::Assign
                | Rule::Binary
                | Rule::UnaryPostfix
                | Rule::UnaryPrefix
                | Rule::Call
                | Rule::Dot
                | Rule::Sub
                | Rule::Seq
                | Rule::Conditional
                | Rule::Function
                | Rule::New
        )
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Atom {
    True,
    False,
    Null,
    Undefined,
    This,
}

impl Atom {
    pub fn as_str(self) -> &'static str {
        match self {
            Atom::True => "true",
            Atom::False => "false",
            Atom::Null => "null",
            Atom::Undefined => "undefined",
            Atom::This => "this",
        }
    }

    pub fn parse(s: &str) -> Option<Atom> {
        Some(match s {
            "true" => Atom::True,
            "false" => Atom::False,
            "null" => Atom::Null,
            "undefined" => Atom::Undefined,
            "this" => Atom::This,
            _ => return None,
        })
    }
}

macro_rules! operators {
    ($(#[$meta:meta])* $ty:ident { $($variant:ident => $text:literal,)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum $ty {
            $($variant,)*
        }

        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)*
                }
            }

            pub fn parse(s: &str) -> Option<$ty> {
                match s {
                    $($text => Some($ty::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

operators!(BinaryOp {
    Add => "+",
    Sub => "-",
    Mul => "*",
    Div => "/",
    Mod => "%",
    Lt => "<",
    Gt => ">",
    LtEq => "<=",
    GtEq => ">=",
    EqEq => "==",
    NotEq => "!=",
    EqEqEq => "===",
    NotEqEq => "!==",
    LogicalAnd => "&&",
    LogicalOr => "||",
    BitAnd => "&",
    BitOr => "|",
    BitXor => "^",
    LShift => "<<",
    RShift => ">>",
    ZeroFillRShift => ">>>",
    InstanceOf => "instanceof",
    In => "in",
});

operators!(
    /// Prefix operators, including the prefix forms of `++` and `--`.
    UnaryOp {
        Not => "!",
        Minus => "-",
        Plus => "+",
        Tilde => "~",
        TypeOf => "typeof",
        Void => "void",
        Delete => "delete",
        Increment => "++",
        Decrement => "--",
    }
);

operators!(UpdateOp {
    Increment => "++",
    Decrement => "--",
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub key: String,
    pub value: Node,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionNode {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarDeclarator {
    pub name: String,
    pub init: Option<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatchClause {
    pub param: Option<String>,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchCase {
    pub test: Option<Node>,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NodeKind {
    // literals
    Atom(Atom),
    Num(f64),
    String(String),
    Name(String),
    Array(Vec<Node>),
    Object(Vec<Property>),
    RegExp {
        pattern: String,
        flags: String,
    },

    // operators
    Assign {
        op: Option<BinaryOp>,
        target: Box<Node>,
        value: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    UnaryPostfix {
        op: UpdateOp,
        operand: Box<Node>,
    },
    UnaryPrefix {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Call {
        callee: Box<Node>,
        args: Vec<Node>,
    },
    Dot {
        object: Box<Node>,
        property: String,
    },
    Sub {
        object: Box<Node>,
        property: Box<Node>,
    },
    Seq {
        first: Box<Node>,
        second: Box<Node>,
    },
    Conditional {
        test: Box<Node>,
        consequent: Box<Node>,
        alternate: Box<Node>,
    },
    Function(FunctionNode),
    New {
        callee: Box<Node>,
        args: Vec<Node>,
    },

    // blocks
    Toplevel(Vec<Node>),
    Block(Vec<Node>),
    Stat(Box<Node>),
    Label {
        label: String,
        body: Box<Node>,
    },
    If {
        test: Box<Node>,
        consequent: Box<Node>,
        alternate: Option<Box<Node>>,
    },
    With {
        object: Box<Node>,
        body: Box<Node>,
    },
    Var(Vec<VarDeclarator>),
    Defun(FunctionNode),
    Return(Option<Box<Node>>),
    Debugger,

    // exceptions
    Try {
        block: Vec<Node>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Node>>,
    },
    Throw(Box<Node>),

    // control flow
    Break(Option<String>),
    Continue(Option<String>),
    While {
        test: Box<Node>,
        body: Box<Node>,
    },
    Do {
        test: Box<Node>,
        body: Box<Node>,
    },
    For {
        init: Option<Box<Node>>,
        test: Option<Box<Node>>,
        update: Option<Box<Node>>,
        body: Box<Node>,
    },
    ForIn {
        left: Box<Node>,
        right: Box<Node>,
        body: Box<Node>,
    },
    Switch {
        discriminant: Box<Node>,
        cases: Vec<SwitchCase>,
    },
}

impl NodeKind {
    pub fn rule(&self) -> Rule {
        match self {
            NodeKind::Atom(_) => Rule::Atom,
            NodeKind::Num(_) => Rule::Num,
            NodeKind::String(_) => Rule::String,
            NodeKind::Name(_) => Rule::Name,
            NodeKind::Array(_) => Rule::Array,
            NodeKind::Object(_) => Rule::Object,
            NodeKind::RegExp { .. } => Rule::RegExp,
            NodeKind::Assign { .. } => Rule::Assign,
            NodeKind::Binary { .. } => Rule::Binary,
            NodeKind::UnaryPostfix { .. } => Rule::UnaryPostfix,
            NodeKind::UnaryPrefix { .. } => Rule::UnaryPrefix,
            NodeKind::Call { .. } => Rule::Call,
            NodeKind::Dot { .. } => Rule::Dot,
            NodeKind::Sub { .. } => Rule::Sub,
            NodeKind::Seq { .. } => Rule::Seq,
            NodeKind::Conditional { .. } => Rule::Conditional,
            NodeKind::Function(_) => Rule::Function,
            NodeKind::New { .. } => Rule::New,
            NodeKind::Toplevel(_) => Rule::Toplevel,
            NodeKind::Block(_) => Rule::Block,
            NodeKind::Stat(_) => Rule::Stat,
            NodeKind::Label { .. } => Rule::Label,
            NodeKind::If { .. } => Rule::If,
            NodeKind::With { .. } => Rule::With,
            NodeKind::Var(_) => Rule::Var,
            NodeKind::Defun(_) => Rule::Defun,
            NodeKind::Return(_) => Rule::Return,
            NodeKind::Debugger => Rule::Debugger,
            NodeKind::Try { .. } => Rule::Try,
            NodeKind::Throw(_) => Rule::Throw,
            NodeKind::Break(_) => Rule::Break,
            NodeKind::Continue(_) => Rule::Continue,
            NodeKind::While { .. } => Rule::While,
            NodeKind::Do { .. } => Rule::Do,
            NodeKind::For { .. } => Rule::For,
            NodeKind::ForIn { .. } => Rule::ForIn,
            NodeKind::Switch { .. } => Rule::Switch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub info: NodeInfo,
    pub kind: NodeKind,
}

impl Node {
    /// Builds a node whose header agrees with its kind.
    pub fn new(kind: NodeKind, start: Position, end: Position) -> Self {
        Self {
            info: NodeInfo::new(kind.rule(), start, end),
            kind,
        }
    }

    /// Node without meaningful position, for synthesized trees.
    pub fn synthetic(kind: NodeKind) -> Self {
        Self::new(kind, Position::default(), Position::default())
    }

    pub fn rule(&self) -> Rule {
        self.kind.rule()
    }

    pub fn start(&self) -> Position {
        self.info.start
    }

    /// Validates this node's header and every descendant's.
    pub fn validate_tree(&self) -> Result<(), InternalError> {
        self.info.validate(self.rule())?;
        let mut result = Ok(());
        self.for_each_child(|child| {
            if result.is_ok() {
                result = child.validate_tree();
            }
        });
        result
    }

    /// Visits direct children in source order.
    pub fn for_each_child(&self, mut f: impl FnMut(&Node)) {
        match &self.kind {
            NodeKind::Atom(_)
            | NodeKind::Num(_)
            | NodeKind::String(_)
            | NodeKind::Name(_)
            | NodeKind::RegExp { .. }
            | NodeKind::Debugger
            | NodeKind::Break(_)
            | NodeKind::Continue(_) => {}
            NodeKind::Array(items) | NodeKind::Toplevel(items) | NodeKind::Block(items) => {
                items.iter().for_each(f)
            }
            NodeKind::Object(props) => props.iter().for_each(|p| f(&p.value)),
            NodeKind::Assign { target, value, .. } => {
                f(target);
                f(value);
            }
            NodeKind::Binary { left, right, .. } => {
                f(left);
                f(right);
            }
            NodeKind::UnaryPostfix { operand, .. } | NodeKind::UnaryPrefix { operand, .. } => {
                f(operand)
            }
            NodeKind::Call { callee, args } | NodeKind::New { callee, args } => {
                f(callee);
                args.iter().for_each(f);
            }
            NodeKind::Dot { object, .. } => f(object),
            NodeKind::Sub { object, property } => {
                f(object);
                f(property);
            }
            NodeKind::Seq { first, second } => {
                f(first);
                f(second);
            }
            NodeKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                f(test);
                f(consequent);
                f(alternate);
            }
            NodeKind::Function(func) | NodeKind::Defun(func) => func.body.iter().for_each(f),
            NodeKind::Stat(inner) | NodeKind::Throw(inner) => f(inner),
            NodeKind::Label { body, .. } => f(body),
            NodeKind::If {
                test,
                consequent,
                alternate,
            } => {
                f(test);
                f(consequent);
                if let Some(alternate) = alternate {
                    f(alternate);
                }
            }
            NodeKind::With { object, body } => {
                f(object);
                f(body);
            }
            NodeKind::Var(decls) => decls.iter().filter_map(|d| d.init.as_ref()).for_each(f),
            NodeKind::Return(arg) => {
                if let Some(arg) = arg {
                    f(arg);
                }
            }
            NodeKind::Try {
                block,
                handler,
                finalizer,
            } => {
                block.iter().for_each(&mut f);
                if let Some(handler) = handler {
                    handler.body.iter().for_each(&mut f);
                }
                if let Some(finalizer) = finalizer {
                    finalizer.iter().for_each(&mut f);
                }
            }
            NodeKind::While { test, body } | NodeKind::Do { test, body } => {
                f(test);
                f(body);
            }
            NodeKind::For {
                init,
                test,
                update,
                body,
            } => {
                for part in [init, test, update].into_iter().flatten() {
                    f(part);
                }
                f(body);
            }
            NodeKind::ForIn { left, right, body } => {
                f(left);
                f(right);
                f(body);
            }
            NodeKind::Switch {
                discriminant,
                cases,
            } => {
                f(discriminant);
                for case in cases {
                    if let Some(test) = &case.test {
                        f(test);
                    }
                    case.body.iter().for_each(&mut f);
                }
            }
        }
    }

    /// Number of nodes in this subtree, including itself.
    pub fn count(&self) -> usize {
        let mut total = 1;
        self.for_each_child(|child| total += child.count());
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Node {
        Node::synthetic(NodeKind::Num(n))
    }

    #[test]
    fn rule_names_round_trip() {
        for rule in Rule::ALL {
            assert_eq!(Rule::from_name(rule.name()), Some(*rule));
        }
        assert_eq!(Rule::from_name(ALL_RULES), None);
        assert_eq!(Rule::from_name("call"), None);
    }

    #[test]
    fn new_node_header_matches_kind() {
        let node = Node::new(NodeKind::Debugger, Position::new(3, 4), Position::new(3, 13));

        assert_eq!(node.info.name, "Debugger");
        assert_eq!(node.start(), Position::new(3, 4));
        assert!(node.info.validate(node.rule()).is_ok());
    }

    #[test]
    fn extra_info_key_is_rejected() {
        let mut node = num(1.0);
        node.info
            .extra
            .insert("comments".to_string(), serde_json::Value::Null);

        let err = node.info.validate(node.rule()).unwrap_err();

        assert!(matches!(err, InternalError::MalformedNodeInfo { .. }));
        assert!(err.to_string().contains("comments"));
    }

    #[test]
    fn mismatched_name_is_rejected() {
        let mut node = num(1.0);
        node.info.name = "String".to_string();

        assert!(node.info.validate(node.rule()).is_err());
    }

    #[test]
    fn validate_tree_reaches_nested_nodes() {
        let mut inner = num(2.0);
        inner.info.extra.insert("x".into(), serde_json::json!(1));
        let tree = Node::synthetic(NodeKind::Binary {
            op: BinaryOp::Add,
            left: Box::new(num(1.0)),
            right: Box::new(inner),
        });

        assert!(tree.validate_tree().is_err());
    }

    #[test]
    fn count_includes_all_descendants() {
        let tree = Node::synthetic(NodeKind::Stat(Box::new(Node::synthetic(
            NodeKind::Binary {
                op: BinaryOp::Mul,
                left: Box::new(num(1.0)),
                right: Box::new(num(2.0)),
            },
        ))));

        assert_eq!(tree.count(), 4);
    }

    #[test]
    fn operators_parse_from_text() {
        assert_eq!(BinaryOp::parse(">>>"), Some(BinaryOp::ZeroFillRShift));
        assert_eq!(UnaryOp::parse("typeof"), Some(UnaryOp::TypeOf));
        assert_eq!(UpdateOp::parse("--"), Some(UpdateOp::Decrement));
        assert_eq!(BinaryOp::parse("**"), None);
        assert_eq!(Atom::parse("this"), Some(Atom::This));
    }
}
