//! Decoding of the `[nodeInfo, child...]` JSON form produced by external
//! parser collaborators.
//!
//! Unknown node kinds are rejected here. Unrecognized header keys are kept on
//! the node so the dispatcher rejects them when it reaches that node.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{
    Atom, BinaryOp, CatchClause, FunctionNode, Node, NodeInfo, NodeKind, Position, Property,
    Rule, SwitchCase, UnaryOp, UpdateOp, VarDeclarator,
};
use crate::error::InternalError;

pub fn node_from_json(value: &Value) -> Result<Node, InternalError> {
    let items = value
        .as_array()
        .ok_or_else(|| malformed("node", "expected an array"))?;
    let (header, children) = items
        .split_first()
        .ok_or_else(|| malformed("node", "empty node array"))?;

    let info = decode_info(header)?;
    let rule = Rule::from_name(&info.name).ok_or_else(|| InternalError::UnknownRule {
        name: info.name.clone(),
        line: info.start.line,
    })?;
    let kind = decode_kind(rule, children)?;

    Ok(Node { info, kind })
}

/// Decodes a JSON array of statements, e.g. a function body.
pub fn nodes_from_json(value: &Value) -> Result<Vec<Node>, InternalError> {
    value
        .as_array()
        .ok_or_else(|| malformed("node list", "expected an array"))?
        .iter()
        .map(node_from_json)
        .collect()
}

fn decode_info(header: &Value) -> Result<NodeInfo, InternalError> {
    let object = header
        .as_object()
        .ok_or_else(|| malformed("node info", "expected an object"))?;

    let name = object
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("node info", "missing 'name'"))?
        .to_string();
    let mut extra: BTreeMap<String, Value> = object
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "name" | "start" | "end"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let start = decode_position(object.get("start"), "start", &mut extra)?;
    let end = decode_position(object.get("end"), "end", &mut extra)?;

    Ok(NodeInfo {
        name,
        start,
        end,
        extra,
    })
}

/// Reads `{line, col}`. Any other key lands in `extra` as `field.key`.
fn decode_position(
    value: Option<&Value>,
    field: &str,
    extra: &mut BTreeMap<String, Value>,
) -> Result<Position, InternalError> {
    let object = value
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("node info", &format!("missing '{field}'")))?;
    for (key, value) in object {
        if !matches!(key.as_str(), "line" | "col") {
            extra.insert(format!("{field}.{key}"), value.clone());
        }
    }
    let coord = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .ok_or_else(|| malformed("node info", &format!("'{field}.{key}' is not a number")))
    };
    Ok(Position::new(coord("line")?, coord("col")?))
}

fn decode_kind(rule: Rule, children: &[Value]) -> Result<NodeKind, InternalError> {
    let c = Children {
        rule,
        items: children,
    };

    let kind = match rule {
        Rule::Atom => {
            let text = c.string(0)?;
            NodeKind::Atom(Atom::parse(&text).ok_or_else(|| c.error("unknown atom"))?)
        }
        Rule::Num => NodeKind::Num(c.get(0)?.as_f64().ok_or_else(|| c.error("not a number"))?),
        Rule::String => NodeKind::String(c.string(0)?),
        Rule::Name => NodeKind::Name(c.string(0)?),
        Rule::Array => NodeKind::Array(nodes_from_json(c.get(0)?)?),
        Rule::Object => {
            let entries = c
                .get(0)?
                .as_array()
                .ok_or_else(|| c.error("properties must be an array"))?;
            let props = entries
                .iter()
                .map(|entry| {
                    let pair = entry
                        .as_array()
                        .filter(|pair| pair.len() == 2)
                        .ok_or_else(|| c.error("property must be a [key, value] pair"))?;
                    let key = pair[0]
                        .as_str()
                        .ok_or_else(|| c.error("property key must be a string"))?;
                    Ok(Property {
                        key: key.to_string(),
                        value: node_from_json(&pair[1])?,
                    })
                })
                .collect::<Result<Vec<_>, InternalError>>()?;
            NodeKind::Object(props)
        }
        Rule::RegExp => NodeKind::RegExp {
            pattern: c.string(0)?,
            flags: c.string(1)?,
        },
        Rule::Assign => {
            let op = match c.get(0)? {
                Value::Null | Value::Bool(true) => None,
                Value::String(op) if op == "=" => None,
                Value::String(op) => {
                    Some(BinaryOp::parse(op).ok_or_else(|| c.error("unknown operator"))?)
                }
                _ => return Err(c.error("operator must be a string or null")),
            };
            NodeKind::Assign {
                op,
                target: c.boxed(1)?,
                value: c.boxed(2)?,
            }
        }
        Rule::Binary => NodeKind::Binary {
            op: BinaryOp::parse(&c.string(0)?).ok_or_else(|| c.error("unknown operator"))?,
            left: c.boxed(1)?,
            right: c.boxed(2)?,
        },
        Rule::UnaryPostfix => NodeKind::UnaryPostfix {
            op: UpdateOp::parse(&c.string(0)?).ok_or_else(|| c.error("unknown operator"))?,
            operand: c.boxed(1)?,
        },
        Rule::UnaryPrefix => NodeKind::UnaryPrefix {
            op: UnaryOp::parse(&c.string(0)?).ok_or_else(|| c.error("unknown operator"))?,
            operand: c.boxed(1)?,
        },
        Rule::Call => NodeKind::Call {
            callee: c.boxed(0)?,
            args: nodes_from_json(c.get(1)?)?,
        },
        Rule::New => NodeKind::New {
            callee: c.boxed(0)?,
            args: nodes_from_json(c.get(1)?)?,
        },
        Rule::Dot => NodeKind::Dot {
            object: c.boxed(0)?,
            property: c.string(1)?,
        },
        Rule::Sub => NodeKind::Sub {
            object: c.boxed(0)?,
            property: c.boxed(1)?,
        },
        Rule::Seq => NodeKind::Seq {
            first: c.boxed(0)?,
            second: c.boxed(1)?,
        },
        Rule::Conditional => NodeKind::Conditional {
            test: c.boxed(0)?,
            consequent: c.boxed(1)?,
            alternate: c.boxed(2)?,
        },
        Rule::Function => NodeKind::Function(c.function()?),
        Rule::Defun => {
            let func = c.function()?;
            if func.name.is_none() {
                return Err(c.error("function declaration without a name"));
            }
            NodeKind::Defun(func)
        }
        Rule::Toplevel => NodeKind::Toplevel(nodes_from_json(c.get(0)?)?),
        Rule::Block => NodeKind::Block(match c.items.first() {
            None | Some(Value::Null) => Vec::new(),
            Some(list) => nodes_from_json(list)?,
        }),
        Rule::Stat => NodeKind::Stat(c.boxed(0)?),
        Rule::Label => NodeKind::Label {
            label: c.string(0)?,
            body: c.boxed(1)?,
        },
        Rule::If => NodeKind::If {
            test: c.boxed(0)?,
            consequent: c.boxed(1)?,
            alternate: c.optional_boxed(2)?,
        },
        Rule::With => NodeKind::With {
            object: c.boxed(0)?,
            body: c.boxed(1)?,
        },
        Rule::Var => {
            let entries = c
                .get(0)?
                .as_array()
                .ok_or_else(|| c.error("declarations must be an array"))?;
            let decls = entries
                .iter()
                .map(|entry| {
                    let pair = entry
                        .as_array()
                        .filter(|pair| !pair.is_empty() && pair.len() <= 2)
                        .ok_or_else(|| c.error("declaration must be [name, init?]"))?;
                    let name = pair[0]
                        .as_str()
                        .ok_or_else(|| c.error("declared name must be a string"))?;
                    let init = match pair.get(1) {
                        None | Some(Value::Null) => None,
                        Some(init) => Some(node_from_json(init)?),
                    };
                    Ok(VarDeclarator {
                        name: name.to_string(),
                        init,
                    })
                })
                .collect::<Result<Vec<_>, InternalError>>()?;
            NodeKind::Var(decls)
        }
        Rule::Return => NodeKind::Return(c.optional_boxed(0)?),
        Rule::Debugger => NodeKind::Debugger,
        Rule::Try => {
            let handler = match c.items.get(1) {
                None | Some(Value::Null) => None,
                Some(Value::Array(pair)) if pair.len() == 2 => {
                    let param = match &pair[0] {
                        Value::Null => None,
                        Value::String(name) => Some(name.clone()),
                        _ => return Err(c.error("catch parameter must be a string or null")),
                    };
                    Some(CatchClause {
                        param,
                        body: nodes_from_json(&pair[1])?,
                    })
                }
                Some(_) => return Err(c.error("catch clause must be [name, body]")),
            };
            let finalizer = match c.items.get(2) {
                None | Some(Value::Null) => None,
                Some(list) => Some(nodes_from_json(list)?),
            };
            NodeKind::Try {
                block: nodes_from_json(c.get(0)?)?,
                handler,
                finalizer,
            }
        }
        Rule::Throw => NodeKind::Throw(c.boxed(0)?),
        Rule::Break => NodeKind::Break(c.optional_string(0)?),
        Rule::Continue => NodeKind::Continue(c.optional_string(0)?),
        Rule::While => NodeKind::While {
            test: c.boxed(0)?,
            body: c.boxed(1)?,
        },
        Rule::Do => NodeKind::Do {
            test: c.boxed(0)?,
            body: c.boxed(1)?,
        },
        Rule::For => NodeKind::For {
            init: c.optional_boxed(0)?,
            test: c.optional_boxed(1)?,
            update: c.optional_boxed(2)?,
            body: c.boxed(3)?,
        },
        Rule::ForIn => NodeKind::ForIn {
            left: c.boxed(0)?,
            right: c.boxed(1)?,
            body: c.boxed(2)?,
        },
        Rule::Switch => {
            let entries = c
                .get(1)?
                .as_array()
                .ok_or_else(|| c.error("cases must be an array"))?;
            let cases = entries
                .iter()
                .map(|entry| {
                    let pair = entry
                        .as_array()
                        .filter(|pair| pair.len() == 2)
                        .ok_or_else(|| c.error("case must be [test, body]"))?;
                    let test = match &pair[0] {
                        Value::Null => None,
                        test => Some(node_from_json(test)?),
                    };
                    Ok(SwitchCase {
                        test,
                        body: nodes_from_json(&pair[1])?,
                    })
                })
                .collect::<Result<Vec<_>, InternalError>>()?;
            NodeKind::Switch {
                discriminant: c.boxed(0)?,
                cases,
            }
        }
    };

    Ok(kind)
}

struct Children<'a> {
    rule: Rule,
    items: &'a [Value],
}

impl Children<'_> {
    fn error(&self, reason: &str) -> InternalError {
        malformed(self.rule.name(), reason)
    }

    fn get(&self, index: usize) -> Result<&Value, InternalError> {
        self.items
            .get(index)
            .ok_or_else(|| self.error(&format!("missing child {index}")))
    }

    fn string(&self, index: usize) -> Result<String, InternalError> {
        self.get(index)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.error(&format!("child {index} must be a string")))
    }

    fn optional_string(&self, index: usize) -> Result<Option<String>, InternalError> {
        match self.items.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.string(index).map(Some),
        }
    }

    fn boxed(&self, index: usize) -> Result<Box<Node>, InternalError> {
        node_from_json(self.get(index)?).map(Box::new)
    }

    fn optional_boxed(&self, index: usize) -> Result<Option<Box<Node>>, InternalError> {
        match self.items.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => node_from_json(value).map(|node| Some(Box::new(node))),
        }
    }

    fn function(&self) -> Result<FunctionNode, InternalError> {
        let params = self
            .get(1)?
            .as_array()
            .ok_or_else(|| self.error("parameters must be an array"))?
            .iter()
            .map(|param| {
                param
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.error("parameter must be a string"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FunctionNode {
            name: self.optional_string(0)?,
            params,
            body: nodes_from_json(self.get(2)?)?,
        })
    }
}

fn malformed(what: &str, reason: &str) -> InternalError {
    InternalError::MalformedNode {
        what: what.to_string(),
        reason: reason.to_string(),
    }
}
