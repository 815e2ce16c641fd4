//! `field OP literal` predicates over JSON records.
//!
//! `field` is a dotted path or `.` for the record itself. `OP` is one of
//! `== != < <= > >=`. The literal is read as JSON when it parses as JSON
//! (`42`, `true`, `null`, `"quoted"`), as the inner text when single-quoted,
//! and as a bare string otherwise (`name == Alice`).

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use lazyflow_core::field::FieldPath;

use crate::error::{DslError, Result};
use crate::value::compare;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Predicate {
    field: FieldPath,
    op: CmpOp,
    literal: Value,
}

/// Leftmost operator; two-character operators win at the same position.
fn find_operator(expr: &str) -> Option<(usize, CmpOp, usize)> {
    let bytes = expr.as_bytes();
    for i in 0..bytes.len() {
        let next = bytes.get(i + 1).copied();
        let found = match (bytes[i], next) {
            (b'=', Some(b'=')) => Some((CmpOp::Eq, 2)),
            (b'!', Some(b'=')) => Some((CmpOp::Ne, 2)),
            (b'<', Some(b'=')) => Some((CmpOp::Le, 2)),
            (b'>', Some(b'=')) => Some((CmpOp::Ge, 2)),
            (b'<', _) => Some((CmpOp::Lt, 1)),
            (b'>', _) => Some((CmpOp::Gt, 1)),
            _ => None,
        };
        if let Some((op, len)) = found {
            return Some((i, op, len));
        }
    }
    None
}

fn parse_literal(raw: &str) -> Value {
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return Value::String(raw[1..raw.len() - 1].to_string());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

impl Predicate {
    pub fn parse(expr: &str) -> Result<Self> {
        let fail = |reason: &str| DslError::Predicate {
            expr: expr.to_string(),
            reason: reason.to_string(),
        };

        let (pos, op, len) = find_operator(expr).ok_or_else(|| fail("no comparison operator"))?;
        let field = expr[..pos].trim();
        let literal = expr[pos + len..].trim();
        if field.is_empty() {
            return Err(fail("missing field"));
        }
        if literal.is_empty() {
            return Err(fail("missing literal"));
        }
        let field = FieldPath::parse(field).map_err(|e| fail(&e.to_string()))?;

        Ok(Self {
            field,
            op,
            literal: parse_literal(literal),
        })
    }

    /// Fails with `FieldNotFound` when the field is missing. Ordering
    /// comparisons between values of different kinds (or with `null`) are
    /// false.
    pub fn eval(&self, record: &Value) -> lazyflow_core::Result<bool> {
        let value = self.field.require(record)?;
        let lit = &self.literal;
        Ok(match self.op {
            CmpOp::Eq => equals(value, lit),
            CmpOp::Ne => !equals(value, lit),
            CmpOp::Lt => ordered(value, lit) == Some(Ordering::Less),
            CmpOp::Le => matches!(ordered(value, lit), Some(Ordering::Less | Ordering::Equal)),
            CmpOp::Gt => ordered(value, lit) == Some(Ordering::Greater),
            CmpOp::Ge => matches!(
                ordered(value, lit),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        })
    }
}

fn equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare(a, b) == Ordering::Equal,
        _ => a == b,
    }
}

fn ordered(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_)) => {
            Some(compare(a, b))
        }
        _ => None,
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.op.symbol(), self.literal)
    }
}
