//! Recursive conversion of raw tokens into [`Value`]s, driven by [`TypeShape`].

use crate::error::{Error, Result};
use crate::shape::TypeShape;
use crate::value::Value;

const TRUE_WORDS: &[&str] = &["true", "1", "yes"];
const FALSE_WORDS: &[&str] = &["false", "0", "no"];

/// Parse the fixed boolean vocabulary (case-insensitive).
pub fn parse_bool(token: &str) -> Option<bool> {
    let lower = token.to_ascii_lowercase();
    if TRUE_WORDS.contains(&lower.as_str()) {
        Some(true)
    } else if FALSE_WORDS.contains(&lower.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Convert `tokens` into a value of type `shape`.
///
/// The number of tokens must match what the shape consumes: one for scalars,
/// exactly [`TypeShape::token_count`] for tuples and a multiple of the
/// element count for lists.
pub fn coerce(shape: &TypeShape, tokens: &[String]) -> Result<Value> {
    match shape {
        TypeShape::Optional(inner) => coerce(inner, tokens),
        TypeShape::Union(members) => coerce_union(members, tokens),
        TypeShape::List(inner) => {
            let per = inner.token_count().max(1);
            if tokens.len() % per != 0 {
                return Err(Error::Arity {
                    parameter: None,
                    expected: (tokens.len() / per + 1) * per,
                    received: tokens.len(),
                });
            }
            let items = tokens
                .chunks(per)
                .map(|chunk| coerce(inner, chunk))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::List(items))
        }
        TypeShape::Tuple(elements) => {
            let expected = shape.token_count();
            if tokens.len() != expected {
                return Err(Error::Arity {
                    parameter: None,
                    expected,
                    received: tokens.len(),
                });
            }
            let mut items = Vec::with_capacity(elements.len());
            let mut rest = tokens;
            for element in elements {
                let (head, tail) = rest.split_at(element.token_count());
                items.push(coerce(element, head)?);
                rest = tail;
            }
            Ok(Value::Tuple(items))
        }
        scalar => {
            let [token] = tokens else {
                return Err(Error::Arity {
                    parameter: None,
                    expected: 1,
                    received: tokens.len(),
                });
            };
            coerce_scalar(scalar, token)
        }
    }
}

fn coerce_union(members: &[TypeShape], tokens: &[String]) -> Result<Value> {
    for member in members {
        match coerce(member, tokens) {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::trace!(member = %member, error = %err, "union member rejected token");
            }
        }
    }
    Err(Error::Coercion {
        parameter: None,
        value: tokens.join(" "),
        attempted: members.iter().map(ToString::to_string).collect(),
        choices: Vec::new(),
        reason: None,
    })
}

fn coerce_scalar(shape: &TypeShape, token: &str) -> Result<Value> {
    let mismatch = |choices: Vec<String>| Error::Coercion {
        parameter: None,
        value: token.to_string(),
        attempted: vec![shape.to_string()],
        choices,
        reason: None,
    };

    match shape {
        TypeShape::Bool => parse_bool(token)
            .map(Value::Bool)
            .ok_or_else(|| mismatch(Vec::new())),
        TypeShape::Int => parse_int(token)
            .map(Value::Int)
            .ok_or_else(|| mismatch(Vec::new())),
        TypeShape::Float => token
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| mismatch(Vec::new())),
        TypeShape::Str => Ok(Value::Str(token.to_string())),
        TypeShape::Literal(values) => {
            if values.iter().any(|v| v == token) {
                Ok(Value::Str(token.to_string()))
            } else {
                Err(mismatch(values.clone()))
            }
        }
        TypeShape::Enum { members, .. } => {
            let wanted = normalize_member(token);
            members
                .iter()
                .find(|m| normalize_member(m) == wanted)
                .map(|m| Value::Enum(m.clone()))
                .ok_or_else(|| mismatch(members.clone()))
        }
        // Composite shapes are handled by `coerce` before reaching here.
        TypeShape::Optional(_) | TypeShape::Union(_) | TypeShape::List(_) | TypeShape::Tuple(_) => {
            coerce(shape, &[token.to_string()])
        }
    }
}

/// Decimal, `0x`, `0b` or `0o` integers with at most one leading sign.
fn parse_int(token: &str) -> Option<i64> {
    let (negative, body) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token.strip_prefix('+').unwrap_or(token)),
    };
    let (radix, digits) = if let Some(hex) = body.strip_prefix("0x") {
        (16, hex)
    } else if let Some(bin) = body.strip_prefix("0b") {
        (2, bin)
    } else if let Some(oct) = body.strip_prefix("0o") {
        (8, oct)
    } else {
        (10, body)
    };
    if !digits.starts_with(|c: char| c.is_ascii_hexdigit()) {
        return None;
    }
    let magnitude = u64::from_str_radix(digits, radix).ok()?;
    if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    }
}

/// Enum members match case-insensitively with `-` and `_` treated alike.
fn normalize_member(name: &str) -> String {
    name.to_ascii_lowercase().replace('_', "-")
}
