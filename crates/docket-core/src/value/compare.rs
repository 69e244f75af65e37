use crate::value::Value;
use std::cmp::Ordering;

// Integers in this range convert to f64 exactly.
const F64_SAFE_I64: i64 = 1i64 << 53;

///
/// Canonical cross-type rank.
///
/// Follows the document store's comparison order: null, numbers, text, maps,
/// arrays, binary, object ids, booleans, timestamps. `Int` and `Float` share
/// a rank and compare numerically.
///

const fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Int(_) | Value::Float(_) => 1,
        Value::Text(_) => 2,
        Value::Map(_) => 3,
        Value::Array(_) => 4,
        Value::Binary(_) => 5,
        Value::ObjectId(_) => 6,
        Value::Bool(_) => 7,
        Value::Timestamp(_) => 8,
    }
}

/// Total order over values, used for sorting and range predicates.
#[must_use]
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Float(a), Value::Float(b)) => compare_floats(*a, *b),
        (Value::Int(a), Value::Float(b)) => compare_int_float(*a, *b),
        (Value::Float(a), Value::Int(b)) => compare_int_float(*b, *a).reverse(),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Map(a), Value::Map(b)) => {
            for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                let ord = ka.cmp(kb).then_with(|| compare_values(va, vb));
                if ord.is_ne() {
                    return ord;
                }
            }
            a.len().cmp(&b.len())
        }
        (Value::Array(a), Value::Array(b)) => {
            for (va, vb) in a.iter().zip(b.iter()) {
                let ord = compare_values(va, vb);
                if ord.is_ne() {
                    return ord;
                }
            }
            a.len().cmp(&b.len())
        }
        (Value::Binary(a), Value::Binary(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
        (Value::ObjectId(a), Value::ObjectId(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
        _ => rank(left).cmp(&rank(right)),
    }
}

// NaN sorts below every other number and equals itself.
fn compare_floats(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn compare_int_float(int: i64, float: f64) -> Ordering {
    if float.is_nan() {
        return Ordering::Greater;
    }

    if (-F64_SAFE_I64..=F64_SAFE_I64).contains(&int) {
        return compare_floats(int as f64, float);
    }

    // Beyond 2^53 the float is integral (or infinite); compare in i128 space.
    if float.is_infinite() {
        return if float > 0.0 {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }

    i128::from(int).cmp(&(float as i128))
}
