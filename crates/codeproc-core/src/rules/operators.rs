use crate::ast::{BinaryOp, Node, UnaryOp, UpdateOp};
use crate::error::InternalError;
use crate::processor::Pass;
use crate::value::{self, JsValue, ValueType};

fn step(current: &JsValue, increment: bool) -> JsValue {
    let number = value::unary(UnaryOp::Plus, current);
    let op = if increment { BinaryOp::Add } else { BinaryOp::Sub };
    value::binary(op, &number, &JsValue::number(1.0))
}

impl Pass<'_> {
    pub(super) fn assign(
        &mut self,
        op: Option<BinaryOp>,
        target: &mut Node,
        rhs: &mut Node,
    ) -> Result<JsValue, InternalError> {
        let (current, reference) = self.target(target)?;
        let assigned = self.eval(rhs)?;
        let result = match op {
            Some(op) => value::binary(op, &current, &assigned),
            None => assigned,
        };
        self.store(&reference, result.clone());
        Ok(result)
    }

    pub(super) fn binary(
        &mut self,
        op: BinaryOp,
        left: &mut Node,
        right: &mut Node,
    ) -> Result<JsValue, InternalError> {
        let lhs = self.eval(left)?;
        let rhs = match op {
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
                let short_circuits = lhs
                    .truthiness()
                    .map(|truthy| truthy == (op == BinaryOp::LogicalOr));
                match short_circuits {
                    Some(false) => self.eval(right)?,
                    Some(true) => self.dead(|pass| pass.eval(right))?,
                    None => self.ambiguous(|pass| pass.eval(right))?,
                }
            }
            _ => self.eval(right)?,
        };
        Ok(value::binary(op, &lhs, &rhs))
    }

    pub(super) fn unary_prefix(
        &mut self,
        op: UnaryOp,
        operand: &mut Node,
    ) -> Result<JsValue, InternalError> {
        match op {
            UnaryOp::Increment | UnaryOp::Decrement => {
                let (current, reference) = self.target(operand)?;
                let updated = step(&current, op == UnaryOp::Increment);
                self.store(&reference, updated.clone());
                Ok(updated)
            }
            UnaryOp::Delete => {
                let (_, reference) = self.target(operand)?;
                if !reference.is_resolvable() && self.dead_depth == 0 {
                    self.ctx.record_unknown_effect();
                }
                Ok(JsValue::of_type(ValueType::Boolean))
            }
            _ => {
                let operand = self.eval(operand)?;
                Ok(value::unary(op, &operand))
            }
        }
    }

    pub(super) fn unary_postfix(
        &mut self,
        op: UpdateOp,
        operand: &mut Node,
    ) -> Result<JsValue, InternalError> {
        let (current, reference) = self.target(operand)?;
        let old = value::unary(UnaryOp::Plus, &current);
        self.store(&reference, step(&current, op == UpdateOp::Increment));
        Ok(old)
    }

    pub(super) fn dot(&mut self, object: &mut Node, property: &str) -> Result<JsValue, InternalError> {
        let base = self.eval(object)?;
        if property == "length" {
            if let Some(text) = base.as_str() {
                return Ok(JsValue::number(text.encode_utf16().count() as f64));
            }
        }
        Ok(match base.name {
            Some(name) => JsValue::unknown().with_name(format!("{name}.{property}")),
            None => JsValue::unknown(),
        })
    }

    pub(super) fn sub(&mut self, object: &mut Node, property: &mut Node) -> Result<JsValue, InternalError> {
        let base = self.eval(object)?;
        let key = self.eval(property)?;
        let name = match (base.name, key.as_str(), key.as_number()) {
            (Some(name), Some(key), _) => Some(format!("{name}.{key}")),
            (Some(name), None, Some(index)) => Some(format!("{name}[{index}]")),
            _ => None,
        };
        Ok(match name {
            Some(name) => JsValue::unknown().with_name(name),
            None => JsValue::unknown(),
        })
    }

    pub(super) fn seq(&mut self, first: &mut Node, second: &mut Node) -> Result<JsValue, InternalError> {
        self.eval(first)?;
        self.eval(second)
    }

    pub(super) fn conditional(
        &mut self,
        test: &mut Node,
        consequent: &mut Node,
        alternate: &mut Node,
    ) -> Result<JsValue, InternalError> {
        let test = self.eval(test)?;
        match test.truthiness() {
            Some(true) => {
                let taken = self.eval(consequent)?;
                self.dead(|pass| pass.eval(alternate))?;
                Ok(taken)
            }
            Some(false) => {
                self.dead(|pass| pass.eval(consequent))?;
                self.eval(alternate)
            }
            None => {
                let a = self.ambiguous(|pass| pass.eval(consequent))?;
                let b = self.ambiguous(|pass| pass.eval(alternate))?;
                Ok(if a.same_value(&b) { a } else { JsValue::unknown() })
            }
        }
    }
}
