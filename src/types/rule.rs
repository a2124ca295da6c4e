use std::fmt;

use serde_json::Value as JsonValue;

use super::expr::CompareOp;

/// A scalar that a rule matches by strict equality.
///
/// Only the JSON scalar kinds are representable; arrays and objects are
/// never literals.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "binary-cache",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl Literal {
    /// Convert a JSON scalar into a literal. Returns `None` for arrays and objects.
    #[must_use]
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Null => Some(Literal::Null),
            JsonValue::Bool(b) => Some(Literal::Bool(*b)),
            JsonValue::Number(n) => n.as_f64().map(Literal::Number),
            JsonValue::String(s) => Some(Literal::String(s.clone())),
            JsonValue::Array(_) | JsonValue::Object(_) => None,
        }
    }

    /// Strict equality against a runtime value. Numbers compare by value,
    /// so `1` and `1.0` are equal.
    #[must_use]
    pub fn matches(&self, value: &JsonValue) -> bool {
        match (self, value) {
            (Literal::Null, JsonValue::Null) => true,
            (Literal::Bool(a), JsonValue::Bool(b)) => a == b,
            (Literal::Number(a), JsonValue::Number(b)) => b.as_f64() == Some(*a),
            (Literal::String(a), JsonValue::String(b)) => a == b,
            _ => false,
        }
    }

    /// The textual form accepted in place of this literal under `$.string`.
    /// String literals have no alternative form.
    #[must_use]
    pub fn string_form(&self) -> Option<String> {
        match self {
            Literal::Null => Some("null".to_owned()),
            Literal::Bool(b) => Some(b.to_string()),
            Literal::Number(n) => Some(format_number(*n)),
            Literal::String(_) => None,
        }
    }
}

/// Format a number the way it is written in rule text: integral values have
/// no fractional part.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Number(n) => write!(f, "{}", format_number(*n)),
            Literal::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// Numeric parameters attached to a built-in type (`int(1,9)`), an
/// array-size suffix (`[2,]`) or a sized-array modifier.
///
/// A single argument is a minimum for number types (`int(5)` accepts 6) and
/// an exact length for lengths (`string(5)`, `[5]`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bounds {
    None,
    /// `(n)` or `[n]`.
    Exact(f64),
    /// `(n,)` or `[n,]`.
    AtLeast(f64),
    /// `(,n)` or `[,n]`.
    AtMost(f64),
    /// `(a,b)` or `[a,b]`, both inclusive.
    Between(f64, f64),
}

impl Bounds {
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Bounds::None)
    }
}

/// The five string assertion operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOp {
    Equal,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
}

/// A string assertion such as `==abc`, `:include-i:Foo` or `!~=^\d+$`.
#[derive(Debug, Clone, PartialEq)]
pub struct StringAssertion {
    pub op: StringOp,
    pub negated: bool,
    pub case_insensitive: bool,
    pub operand: String,
}

/// What a filter expression measures.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterTarget {
    Value,
    Length,
    ArrayLength,
    StringLength,
    Builtin(String),
}

/// The test a filter expression applies to its target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterOp {
    Between(f64, f64),
    Compare(CompareOp, f64),
    TimesOf(f64),
}

/// A parsed `|target operator args...` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub target: FilterTarget,
    pub op: FilterOp,
}

/// How many positions a tuple slot consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Once,
    /// `...N`: exactly N further elements of the preceding type.
    Exactly(usize),
    /// `...`: zero or more further elements; only valid as the last slot.
    Unlimited,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TupleSlot {
    pub rule: Rule,
    pub repeat: Repeat,
}

/// A declared key of a structure rule, with its sigils already decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub rule: Rule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub fields: Vec<Field>,
    /// Rule applied to every key not declared in `fields` (the `$.map` key).
    pub rest: Option<Box<Rule>>,
}

/// A parsed rule. Produced by [`parse`](crate::parse::parse) from its JSON
/// form; one variant per grammar construct and per `$.` modifier.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Literal(Literal),
    Builtin { name: String, bounds: Bounds },
    Assert(StringAssertion),
    Filter(Filter),
    /// `@name`
    Reference(String),
    Not(Box<Rule>),
    Or(Vec<Rule>),
    And(Vec<Rule>),
    List(Box<Rule>),
    Array { length: Bounds, element: Box<Rule> },
    Tuple(Vec<TupleSlot>),
    Map(Box<Rule>),
    Dict { keys: Vec<String>, value: Box<Rule> },
    Strict(Option<Box<Rule>>),
    Equal(Option<Box<Rule>>),
    FromString(Option<Box<Rule>>),
    Type { name: String, rule: Box<Rule> },
    Enum(Vec<Literal>),
    Struct(Structure),
}

impl Rule {
    pub(crate) fn builtin(name: &str) -> Self {
        Rule::Builtin {
            name: name.to_owned(),
            bounds: Bounds::None,
        }
    }

    /// Whether this rule accepts every value, so element loops can be skipped.
    #[must_use]
    pub fn is_any(&self) -> bool {
        matches!(self, Rule::Builtin { name, bounds: Bounds::None } if name == "any")
    }

    /// A short description of the rule's kind, used in log events.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Rule::Literal(_) => "literal",
            Rule::Builtin { .. } => "builtin",
            Rule::Assert(_) => "assertion",
            Rule::Filter(_) => "filter",
            Rule::Reference(_) => "reference",
            Rule::Not(_) => "not",
            Rule::Or(_) => "or",
            Rule::And(_) => "and",
            Rule::List(_) => "list",
            Rule::Array { .. } => "array",
            Rule::Tuple(_) => "tuple",
            Rule::Map(_) => "map",
            Rule::Dict { .. } => "dict",
            Rule::Strict(_) => "strict",
            Rule::Equal(_) => "equal",
            Rule::FromString(_) => "string",
            Rule::Type { .. } => "type",
            Rule::Enum(_) => "enum",
            Rule::Struct(_) => "struct",
        }
    }
}
