use std::fmt;

use regex::{Regex, RegexBuilder};

use super::rule::{format_number, Literal};
use super::trace::{quote_key, TracePath};

/// Comparison operators supported in numeric checks and filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "binary-cache",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    #[must_use]
    pub fn test(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Neq => lhs != rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Gte => lhs >= rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Lte => lhs <= rhs,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "==="),
            CompareOp::Neq => write!(f, "!=="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
        }
    }
}

/// A reference to a runtime value, relative to the entry argument or a
/// loop-bound variable.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "binary-cache",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum Operand {
    Entry,
    Var(usize),
    Field(Box<Operand>, String),
    Index(Box<Operand>, usize),
    Slice {
        of: Box<Operand>,
        from: usize,
        to: Option<usize>,
    },
    Length(Box<Operand>),
    LowerCase(Box<Operand>),
    /// The numeric value of a decimal string; absent for anything else.
    ToNumber(Box<Operand>),
}

/// Value-kind tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "binary-cache",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum Check {
    Null,
    Undefined,
    String,
    Struct,
    Integer,
    Boolean,
    Number,
    Array,
    Truthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "binary-cache",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum TextOp {
    Equal,
    Contains,
    StartsWith,
    EndsWith,
}

/// A compiled regular expression that remembers its source.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "binary-cache",
    derive(serde::Serialize, serde::Deserialize),
    serde(into = "RawPattern", try_from = "RawPattern")
)]
pub struct Pattern {
    regex: Regex,
    case_insensitive: bool,
}

impl Pattern {
    /// # Errors
    ///
    /// Returns [`regex::Error`] if `source` is not a valid regular expression.
    pub fn new(source: &str, case_insensitive: bool) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(source)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(Self {
            regex,
            case_insensitive,
        })
    }

    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str() && self.case_insensitive == other.case_insensitive
    }
}

#[cfg(feature = "binary-cache")]
#[derive(serde::Serialize, serde::Deserialize)]
struct RawPattern {
    source: String,
    case_insensitive: bool,
}

#[cfg(feature = "binary-cache")]
impl From<Pattern> for RawPattern {
    fn from(p: Pattern) -> Self {
        RawPattern {
            source: p.as_str().to_owned(),
            case_insensitive: p.case_insensitive,
        }
    }
}

#[cfg(feature = "binary-cache")]
impl TryFrom<RawPattern> for Pattern {
    type Error = regex::Error;

    fn try_from(raw: RawPattern) -> Result<Self, Self::Error> {
        Pattern::new(&raw.source, raw.case_insensitive)
    }
}

/// The executable form of a compiled rule: a tree of boolean combinators and
/// leaf predicates over [`Operand`]s.
///
/// Produced by the [`TreeBackend`](crate::TreeBackend) and walked by the
/// evaluator. `Display` is not implemented directly; use
/// [`CompiledUnit::source_text()`](crate::CompiledUnit::source_text) to print
/// it with the unit's argument names.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "binary-cache",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum Expr {
    Const(bool),
    Is(Check, Operand),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Equals(Operand, Literal),
    Compare(Operand, CompareOp, f64),
    MultipleOf(Operand, f64),
    Text(Operand, TextOp, String),
    Matches(Operand, Pattern),
    /// The structure has no keys outside the given set.
    OnlyKeys(Operand, Vec<String>),
    /// Invoke a predefined type through the type table.
    Call {
        name: String,
        subject: Operand,
        path: Option<TracePath>,
    },
    /// Every element of the array (or slice) satisfies `body`.
    ForEach {
        subject: Operand,
        slot: usize,
        body: Box<Expr>,
    },
    /// Every value of the structure satisfies `body`.
    ForIn {
        subject: Operand,
        slot: usize,
        body: Box<Expr>,
    },
    /// Branch on the current key of the key loop bound to `slot`.
    Switch {
        slot: usize,
        cases: Vec<(String, Expr)>,
        default: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// Record `path` when `cond` fails. Without a condition, always records
    /// and fails.
    Trace {
        cond: Option<Box<Expr>>,
        path: TracePath,
    },
}

/// Names of the arguments a compiled unit's source refers to.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SourceNames<'a> {
    pub(crate) entry: &'a str,
    pub(crate) types: &'a str,
    pub(crate) trace: &'a str,
    pub(crate) prefix: &'a str,
}

/// Printer for an [`Expr`] in a JavaScript-like target syntax.
pub(crate) struct Source<'a> {
    pub(crate) expr: &'a Expr,
    pub(crate) names: SourceNames<'a>,
}

impl Source<'_> {
    fn operand(&self, op: &Operand) -> String {
        match op {
            Operand::Entry => self.names.entry.to_owned(),
            Operand::Var(slot) => format!("e{slot}"),
            Operand::Field(of, key) => format!("{}[{}]", self.operand(of), quote_key(key)),
            Operand::Index(of, i) => format!("{}[{i}]", self.operand(of)),
            Operand::Slice { of, from, to } => match to {
                Some(to) => format!("{}.slice({from}, {to})", self.operand(of)),
                None => format!("{}.slice({from})", self.operand(of)),
            },
            Operand::Length(of) => format!("{}.length", self.operand(of)),
            Operand::LowerCase(of) => format!("{}.toLowerCase()", self.operand(of)),
            Operand::ToNumber(of) => format!("toNumber({})", self.operand(of)),
        }
    }

    fn path(&self, path: &TracePath) -> String {
        format!("`${{{}}}{path}`", self.names.prefix)
    }

    fn join(&self, items: &[Expr], sep: &str, empty: &str) -> String {
        if items.is_empty() {
            return empty.to_owned();
        }
        let parts: Vec<String> = items.iter().map(|e| self.expr(e)).collect();
        format!("({})", parts.join(sep))
    }

    fn expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Const(b) => b.to_string(),
            Expr::Is(check, op) => {
                let v = self.operand(op);
                match check {
                    Check::Null => format!("{v} === null"),
                    Check::Undefined => format!("{v} === undefined"),
                    Check::String => format!("typeof {v} === \"string\""),
                    Check::Struct => format!("isStruct({v})"),
                    Check::Integer => format!("Number.isInteger({v})"),
                    Check::Boolean => format!("typeof {v} === \"boolean\""),
                    Check::Number => format!("Number.isFinite({v})"),
                    Check::Array => format!("Array.isArray({v})"),
                    Check::Truthy => format!("!!{v}"),
                }
            }
            Expr::Not(inner) => format!("!({})", self.expr(inner)),
            Expr::And(items) => self.join(items, " && ", "true"),
            Expr::Or(items) => self.join(items, " || ", "false"),
            Expr::Equals(op, lit) => format!("{} === {lit}", self.operand(op)),
            Expr::Compare(op, cmp, rhs) => {
                format!("{} {cmp} {}", self.operand(op), format_number(*rhs))
            }
            Expr::MultipleOf(op, n) => {
                format!("{} % {} === 0", self.operand(op), format_number(*n))
            }
            Expr::Text(op, text_op, text) => {
                let v = self.operand(op);
                let lit = quote_key(text);
                match text_op {
                    TextOp::Equal => format!("{v} === {lit}"),
                    TextOp::Contains => format!("{v}.includes({lit})"),
                    TextOp::StartsWith => format!("{v}.startsWith({lit})"),
                    TextOp::EndsWith => format!("{v}.endsWith({lit})"),
                }
            }
            Expr::Matches(op, pattern) => {
                let flags = if pattern.case_insensitive { "i" } else { "" };
                format!("/{}/{flags}.test({})", pattern.as_str(), self.operand(op))
            }
            Expr::OnlyKeys(op, keys) => {
                let keys: Vec<String> = keys.iter().map(|k| quote_key(k)).collect();
                format!("onlyKeys({}, [{}])", self.operand(op), keys.join(", "))
            }
            Expr::Call {
                name,
                subject,
                path,
            } => {
                let callee = format!("{}[{}]", self.names.types, quote_key(name));
                match path {
                    Some(path) => format!(
                        "{callee}({}, {}, {})",
                        self.operand(subject),
                        self.names.trace,
                        self.path(path)
                    ),
                    None => format!("{callee}({})", self.operand(subject)),
                }
            }
            Expr::ForEach {
                subject,
                slot,
                body,
            } => format!(
                "{}.every((e{slot}, i{slot}) => {})",
                self.operand(subject),
                self.expr(body)
            ),
            Expr::ForIn {
                subject,
                slot,
                body,
            } => format!(
                "Object.entries({}).every(([k{slot}, e{slot}]) => {})",
                self.operand(subject),
                self.expr(body)
            ),
            Expr::Switch {
                slot,
                cases,
                default,
            } => {
                let mut out = format!("(() => {{ switch (k{slot}) {{ ");
                for (key, body) in cases {
                    out.push_str(&format!(
                        "case {}: return {}; ",
                        quote_key(key),
                        self.expr(body)
                    ));
                }
                out.push_str(&format!("default: return {}; }} }})()", self.expr(default)));
                out
            }
            Expr::If {
                cond,
                then,
                otherwise,
            } => format!(
                "({} ? {} : {})",
                self.expr(cond),
                self.expr(then),
                self.expr(otherwise)
            ),
            Expr::Trace { cond, path } => {
                let push = format!("({}.push({}), false)", self.names.trace, self.path(path));
                match cond {
                    Some(cond) => format!("({} || {push})", self.expr(cond)),
                    None => push,
                }
            }
        }
    }
}

impl fmt::Display for Source<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr(self.expr))
    }
}
