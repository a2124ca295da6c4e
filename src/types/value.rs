use serde_json::Value as JsonValue;

use super::expr::Check;
use super::rule::Literal;

/// A runtime value as seen by the evaluator: a borrowed JSON node, nothing at
/// all, or a value derived from one (a slice, a length, a lowered string).
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Resolved<'v> {
    /// Absent: a missing field, an out-of-range index, or no input.
    Missing,
    Json(&'v JsonValue),
    Items(&'v [JsonValue]),
    Number(f64),
    Text(String),
}

impl<'v> Resolved<'v> {
    pub(crate) fn from_option(value: Option<&'v JsonValue>) -> Self {
        value.map_or(Resolved::Missing, Resolved::Json)
    }

    /// The underlying JSON node, when there is one.
    pub(crate) fn json(&self) -> Option<&'v JsonValue> {
        match self {
            Resolved::Json(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn as_number(&self) -> Option<f64> {
        match self {
            Resolved::Json(JsonValue::Number(n)) => n.as_f64(),
            Resolved::Number(n) => Some(*n),
            _ => None,
        }
        .filter(|n| n.is_finite())
    }

    pub(crate) fn as_str(&self) -> Option<&str> {
        match self {
            Resolved::Json(JsonValue::String(s)) => Some(s.as_str()),
            Resolved::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub(crate) fn as_items(&self) -> Option<&'v [JsonValue]> {
        match self {
            Resolved::Json(JsonValue::Array(items)) => Some(items.as_slice()),
            Resolved::Items(items) => Some(items),
            _ => None,
        }
    }

    /// Length in elements for arrays, in Unicode scalar values for strings.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn length(&self) -> Option<f64> {
        if let Some(items) = self.as_items() {
            return Some(items.len() as f64);
        }
        self.as_str().map(|s| s.chars().count() as f64)
    }

    /// The numeric value of a plain decimal string such as `"-12.5"`.
    pub(crate) fn to_number(&self) -> Option<f64> {
        let text = self.as_str()?;
        let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
        let valid = !digits.is_empty()
            && digits.chars().any(|c| c.is_ascii_digit())
            && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
            && digits.matches('.').count() <= 1;
        if !valid {
            return None;
        }
        text.parse::<f64>().ok().filter(|n| n.is_finite())
    }

    pub(crate) fn check(&self, check: Check) -> bool {
        match check {
            Check::Null => matches!(self, Resolved::Json(JsonValue::Null)),
            Check::Undefined => matches!(self, Resolved::Missing),
            Check::String => self.as_str().is_some(),
            Check::Struct => matches!(self, Resolved::Json(JsonValue::Object(_))),
            Check::Integer => self.as_number().is_some_and(|n| n.fract() == 0.0),
            Check::Boolean => matches!(self, Resolved::Json(JsonValue::Bool(_))),
            Check::Number => self.as_number().is_some(),
            Check::Array => self.as_items().is_some(),
            Check::Truthy => self.is_truthy(),
        }
    }

    fn is_truthy(&self) -> bool {
        match self {
            Resolved::Missing | Resolved::Json(JsonValue::Null) => false,
            Resolved::Json(JsonValue::Bool(b)) => *b,
            Resolved::Json(JsonValue::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Resolved::Number(n) => *n != 0.0 && !n.is_nan(),
            Resolved::Json(JsonValue::String(s)) => !s.is_empty(),
            Resolved::Text(s) => !s.is_empty(),
            Resolved::Json(JsonValue::Array(_) | JsonValue::Object(_)) | Resolved::Items(_) => {
                true
            }
        }
    }

    /// Strict equality against a literal.
    pub(crate) fn equals(&self, literal: &Literal) -> bool {
        match self {
            Resolved::Json(v) => literal.matches(v),
            Resolved::Number(n) => matches!(literal, Literal::Number(m) if m == n),
            Resolved::Text(s) => matches!(literal, Literal::String(t) if t == s),
            Resolved::Missing | Resolved::Items(_) => false,
        }
    }
}
