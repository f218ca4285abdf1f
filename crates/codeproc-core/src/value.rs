//! Abstract values tracked by the analysis
//!
//! A [`JsValue`] either carries a concrete primitive or only its runtime type
//! tag. The `Unknown` type stands for "not statically determinable" and is
//! never the same thing as a concrete `undefined`.

use std::fmt;

use serde::Serialize;

use crate::ast::{BinaryOp, UnaryOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueType {
    Undefined,
    Null,
    Boolean,
    Number,
    String,
    Object,
    Array,
    Function,
    RegExp,
    Unknown,
}

impl ValueType {
    /// Result of `typeof` for values of this type.
    pub fn type_of(self) -> Option<&'static str> {
        Some(match self {
            ValueType::Undefined => "undefined",
            ValueType::Null
            | ValueType::Object
            | ValueType::Array
            | ValueType::RegExp => "object",
            ValueType::Boolean => "boolean",
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Function => "function",
            ValueType::Unknown => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Primitive {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    RegExp { pattern: String, flags: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsValue {
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Primitive>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl JsValue {
    pub fn unknown() -> Self {
        Self::of_type(ValueType::Unknown)
    }

    /// Value whose type is known but whose contents are not.
    pub fn of_type(value_type: ValueType) -> Self {
        Self {
            value_type,
            value: None,
            name: None,
        }
    }

    pub fn undefined() -> Self {
        Self::primitive(Primitive::Undefined)
    }

    pub fn null() -> Self {
        Self::primitive(Primitive::Null)
    }

    pub fn boolean(b: bool) -> Self {
        Self::primitive(Primitive::Boolean(b))
    }

    pub fn number(n: f64) -> Self {
        Self::primitive(Primitive::Number(n))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::primitive(Primitive::String(s.into()))
    }

    pub fn regexp(pattern: impl Into<String>, flags: impl Into<String>) -> Self {
        Self::primitive(Primitive::RegExp {
            pattern: pattern.into(),
            flags: flags.into(),
        })
    }

    pub fn primitive(value: Primitive) -> Self {
        let value_type = match &value {
            Primitive::Undefined => ValueType::Undefined,
            Primitive::Null => ValueType::Null,
            Primitive::Boolean(_) => ValueType::Boolean,
            Primitive::Number(_) => ValueType::Number,
            Primitive::String(_) => ValueType::String,
            Primitive::RegExp { .. } => ValueType::RegExp,
        };
        Self {
            value_type,
            value: Some(value),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_unknown(&self) -> bool {
        self.value_type == ValueType::Unknown
    }

    /// True when the concrete value is statically known.
    pub fn is_known(&self) -> bool {
        self.value.is_some()
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Some(Primitive::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match &self.value {
            Some(Primitive::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// `Some(b)` when the value's truthiness is statically known.
    pub fn truthiness(&self) -> Option<bool> {
        match &self.value {
            Some(Primitive::Undefined | Primitive::Null) => Some(false),
            Some(Primitive::Boolean(b)) => Some(*b),
            Some(Primitive::Number(n)) => Some(*n != 0.0 && !n.is_nan()),
            Some(Primitive::String(s)) => Some(!s.is_empty()),
            Some(Primitive::RegExp { .. }) => Some(true),
            None => match self.value_type {
                ValueType::Object | ValueType::Array | ValueType::Function => Some(true),
                ValueType::Undefined | ValueType::Null => Some(false),
                _ => None,
            },
        }
    }

    /// Same value and type, ignoring the originating binding name.
    pub fn same_value(&self, other: &JsValue) -> bool {
        self.value_type == other.value_type && self.value == other.value && self.is_known()
    }

    fn to_number(&self) -> Option<f64> {
        Some(match self.value.as_ref()? {
            Primitive::Undefined => f64::NAN,
            Primitive::Null => 0.0,
            Primitive::Boolean(b) => f64::from(u8::from(*b)),
            Primitive::Number(n) => *n,
            Primitive::String(s) => string_to_number(s),
            Primitive::RegExp { .. } => f64::NAN,
        })
    }

    fn to_js_string(&self) -> Option<String> {
        Some(match self.value.as_ref()? {
            Primitive::Undefined => "undefined".to_string(),
            Primitive::Null => "null".to_string(),
            Primitive::Boolean(b) => b.to_string(),
            Primitive::Number(n) => number_to_string(*n),
            Primitive::String(s) => s.clone(),
            Primitive::RegExp { pattern, flags } => format!("/{pattern}/{flags}"),
        })
    }
}

impl fmt::Display for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.value, self.to_js_string()) {
            (Some(Primitive::String(s)), _) => write!(f, "{s:?}"),
            (Some(_), Some(text)) => f.write_str(&text),
            _ => write!(f, "<{:?}>", self.value_type),
        }
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    for (prefixes, radix) in [(["0x", "0X"], 16), (["0o", "0O"], 8), (["0b", "0B"], 2)] {
        if let Some(digits) = prefixes.iter().find_map(|p| trimmed.strip_prefix(p)) {
            return radix_to_number(digits, radix);
        }
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // `str::parse` also takes "inf" and "nan"
        _ if !trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')) =>
        {
            f64::NAN
        }
        _ => trimmed.parse().unwrap_or(f64::NAN),
    }
}

fn radix_to_number(digits: &str, radix: u32) -> f64 {
    if digits.is_empty() {
        return f64::NAN;
    }
    digits
        .chars()
        .try_fold(0.0, |acc, c| {
            c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
        })
        .unwrap_or(f64::NAN)
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    // Shortest round-trip digits, then laid out the way JS prints them.
    let scientific = format!("{:e}", n.abs());
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return n.to_string();
    };
    let digits = mantissa.replace('.', "");
    let k = digits.len() as i32;
    let point = exponent.parse::<i32>().unwrap_or(0) + 1;

    let body = if k <= point && point <= 21 {
        format!("{digits}{}", "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{int}.{frac}")
    } else if -6 < point && point <= 0 {
        format!("0.{}{digits}", "0".repeat(point.unsigned_abs() as usize))
    } else {
        let exp = point - 1;
        let exp_sign = if exp < 0 { '-' } else { '+' };
        let (head, tail) = digits.split_at(1);
        if tail.is_empty() {
            format!("{head}e{exp_sign}{}", exp.unsigned_abs())
        } else {
            format!("{head}.{tail}e{exp_sign}{}", exp.unsigned_abs())
        }
    };
    if n < 0.0 { format!("-{body}") } else { body }
}

fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32 as i32
}

fn to_uint32(n: f64) -> u32 {
    to_int32(n) as u32
}

fn loose_equals(a: &JsValue, b: &JsValue) -> Option<bool> {
    let (x, y) = (a.value.as_ref()?, b.value.as_ref()?);
    Some(match (x, y) {
        (Primitive::Undefined | Primitive::Null, Primitive::Undefined | Primitive::Null) => true,
        (Primitive::Undefined | Primitive::Null, _) | (_, Primitive::Undefined | Primitive::Null) => {
            false
        }
        (Primitive::RegExp { .. }, _) | (_, Primitive::RegExp { .. }) => return None,
        (Primitive::String(l), Primitive::String(r)) => l == r,
        _ => a.to_number()? == b.to_number()?,
    })
}

fn strict_equals(a: &JsValue, b: &JsValue) -> Option<bool> {
    if a.is_unknown() || b.is_unknown() {
        return None;
    }
    if a.value_type != b.value_type {
        return Some(false);
    }
    match (a.value.as_ref()?, b.value.as_ref()?) {
        (Primitive::RegExp { .. }, _) => None,
        (Primitive::Number(l), Primitive::Number(r)) => Some(l == r),
        (l, r) => Some(l == r),
    }
}

fn compare(a: &JsValue, b: &JsValue, op: BinaryOp) -> Option<bool> {
    if let (Some(Primitive::String(l)), Some(Primitive::String(r))) = (&a.value, &b.value) {
        return Some(match op {
            BinaryOp::Lt => l < r,
            BinaryOp::Gt => l > r,
            BinaryOp::LtEq => l <= r,
            _ => l >= r,
        });
    }
    let (l, r) = (a.to_number()?, b.to_number()?);
    if l.is_nan() || r.is_nan() {
        return Some(false);
    }
    Some(match op {
        BinaryOp::Lt => l < r,
        BinaryOp::Gt => l > r,
        BinaryOp::LtEq => l <= r,
        _ => l >= r,
    })
}

/// Folds a binary operator over two abstract operands.
///
/// Logical operators short-circuit on a known left operand; everything else
/// needs both operands known.
pub fn binary(op: BinaryOp, left: &JsValue, right: &JsValue) -> JsValue {
    match op {
        BinaryOp::LogicalAnd => {
            return match left.truthiness() {
                Some(false) => left.clone(),
                Some(true) => right.clone(),
                None => JsValue::unknown(),
            };
        }
        BinaryOp::LogicalOr => {
            return match left.truthiness() {
                Some(true) => left.clone(),
                Some(false) => right.clone(),
                None => JsValue::unknown(),
            };
        }
        _ => {}
    }

    fold_binary(op, left, right).unwrap_or_else(|| match op {
        BinaryOp::Sub
        | BinaryOp::Mul
        | BinaryOp::Div
        | BinaryOp::Mod
        | BinaryOp::BitAnd
        | BinaryOp::BitOr
        | BinaryOp::BitXor
        | BinaryOp::LShift
        | BinaryOp::RShift
        | BinaryOp::ZeroFillRShift => JsValue::of_type(ValueType::Number),
        BinaryOp::Lt
        | BinaryOp::Gt
        | BinaryOp::LtEq
        | BinaryOp::GtEq
        | BinaryOp::EqEq
        | BinaryOp::NotEq
        | BinaryOp::EqEqEq
        | BinaryOp::NotEqEq
        | BinaryOp::InstanceOf
        | BinaryOp::In => JsValue::of_type(ValueType::Boolean),
        _ => JsValue::unknown(),
    })
}

fn fold_binary(op: BinaryOp, left: &JsValue, right: &JsValue) -> Option<JsValue> {
    let numeric = |f: fn(f64, f64) -> f64| Some(JsValue::number(f(left.to_number()?, right.to_number()?)));
    let int32 = |f: fn(i32, i32) -> i32| {
        Some(JsValue::number(f64::from(f(
            to_int32(left.to_number()?),
            to_int32(right.to_number()?),
        ))))
    };

    match op {
        BinaryOp::Add => {
            let (l, r) = (left.value.as_ref()?, right.value.as_ref()?);
            if matches!(l, Primitive::String(_) | Primitive::RegExp { .. })
                || matches!(r, Primitive::String(_) | Primitive::RegExp { .. })
            {
                Some(JsValue::string(format!(
                    "{}{}",
                    left.to_js_string()?,
                    right.to_js_string()?
                )))
            } else {
                numeric(|a, b| a + b)
            }
        }
        BinaryOp::Sub => numeric(|a, b| a - b),
        BinaryOp::Mul => numeric(|a, b| a * b),
        BinaryOp::Div => numeric(|a, b| a / b),
        BinaryOp::Mod => numeric(|a, b| a % b),
        BinaryOp::BitAnd => int32(|a, b| a & b),
        BinaryOp::BitOr => int32(|a, b| a | b),
        BinaryOp::BitXor => int32(|a, b| a ^ b),
        BinaryOp::LShift => int32(|a, b| a.wrapping_shl(b as u32 & 31)),
        BinaryOp::RShift => int32(|a, b| a.wrapping_shr(b as u32 & 31)),
        BinaryOp::ZeroFillRShift => {
            let l = to_uint32(left.to_number()?);
            let r = to_uint32(right.to_number()?) & 31;
            Some(JsValue::number(f64::from(l >> r)))
        }
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq => {
            compare(left, right, op).map(JsValue::boolean)
        }
        BinaryOp::EqEq => loose_equals(left, right).map(JsValue::boolean),
        BinaryOp::NotEq => loose_equals(left, right).map(|b| JsValue::boolean(!b)),
        BinaryOp::EqEqEq => strict_equals(left, right).map(JsValue::boolean),
        BinaryOp::NotEqEq => strict_equals(left, right).map(|b| JsValue::boolean(!b)),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr | BinaryOp::InstanceOf | BinaryOp::In => None,
    }
}

/// Folds a non-mutating prefix operator. `++`, `--` and `delete` are handled
/// by the dispatcher since they touch references.
pub fn unary(op: UnaryOp, operand: &JsValue) -> JsValue {
    let folded = match op {
        UnaryOp::Not => operand.truthiness().map(|b| JsValue::boolean(!b)),
        UnaryOp::Minus => operand.to_number().map(|n| JsValue::number(-n)),
        UnaryOp::Plus | UnaryOp::Increment | UnaryOp::Decrement => {
            operand.to_number().map(JsValue::number)
        }
        UnaryOp::Tilde => operand
            .to_number()
            .map(|n| JsValue::number(f64::from(!to_int32(n)))),
        UnaryOp::TypeOf => operand.value_type.type_of().map(JsValue::string),
        UnaryOp::Void => Some(JsValue::undefined()),
        UnaryOp::Delete => None,
    };

    folded.unwrap_or_else(|| match op {
        UnaryOp::Not | UnaryOp::Delete => JsValue::of_type(ValueType::Boolean),
        UnaryOp::TypeOf => JsValue::of_type(ValueType::String),
        _ => JsValue::of_type(ValueType::Number),
    })
}
