//! Ordering and keying for JSON records.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use lazyflow_core::field::FieldPath;

static NULL: Value = Value::Null;

fn rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: null < bool < number < string < array <
/// object. Numbers compare numerically; NaN cannot occur in `serde_json`.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                match compare(l, r) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

/// Integers compare exactly against each other and against floats, so the
/// order stays total past 2^53.
fn compare_numbers(x: &Number, y: &Number) -> Ordering {
    match (integer(x), integer(y)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(a), None) => int_vs_float(a, y.as_f64().unwrap_or(0.0)),
        (None, Some(b)) => int_vs_float(b, x.as_f64().unwrap_or(0.0)).reverse(),
        (None, None) => {
            let a = x.as_f64().unwrap_or(0.0);
            let b = y.as_f64().unwrap_or(0.0);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
    }
}

fn int_vs_float(i: i128, f: f64) -> Ordering {
    // i128::MIN as f64 is exactly -2^127; i128::MAX as f64 rounds up to 2^127.
    if f >= i128::MAX as f64 {
        return Ordering::Less;
    }
    if f < i128::MIN as f64 {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    match i.cmp(&(whole as i128)) {
        Ordering::Equal => whole.partial_cmp(&f).unwrap_or(Ordering::Equal),
        other => other,
    }
}

/// Value at `path`; missing fields read as `null` for keying and sorting.
pub fn key_of<'v>(path: &FieldPath, record: &'v Value) -> &'v Value {
    path.resolve(record).unwrap_or(&NULL)
}

/// Hashable identity of a JSON value. Object keys are sorted by `serde_json`,
/// so equal values render equally.
pub fn identity(v: &Value) -> String {
    v.to_string()
}
