use winnow::combinator::{alt, delimited, opt, preceded, repeat};
use winnow::error::ModalResult;
use winnow::prelude::*;
use winnow::token::{one_of, take_till, take_while};

use crate::types::{BuiltinType, CompareOp, CompileError, Filter, FilterOp, FilterTarget};
use crate::types::{Bounds, StringAssertion, StringOp};

// -- Whitespace -------------------------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_ascii_whitespace())
        .void()
        .parse_next(input)
}

// -- Identifiers & numbers --------------------------------------------------

fn ident<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        take_while(1.., |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

fn number(input: &mut &str) -> ModalResult<f64> {
    (
        opt(one_of(['-', '+'])),
        take_while(1.., |c: char| c.is_ascii_digit() || c == '.'),
    )
        .take()
        .try_map(|s: &str| s.parse::<f64>())
        .parse_next(input)
}

/// `""`, `n`, `a,`, `,b` or `a,b`, with optional surrounding whitespace.
fn bounds(input: &mut &str) -> ModalResult<Bounds> {
    delimited(
        ws,
        (opt(number), opt(preceded((ws, ',', ws), opt(number)))),
        ws,
    )
    .verify_map(|parsed| match parsed {
        (None, None) => Some(Bounds::None),
        (Some(a), None) => Some(Bounds::Exact(a)),
        (Some(a), Some(None)) => Some(Bounds::AtLeast(a)),
        (None, Some(Some(b))) => Some(Bounds::AtMost(b)),
        (Some(a), Some(Some(b))) => Some(Bounds::Between(a, b)),
        (None, Some(None)) => None,
    })
    .parse_next(input)
}

fn type_call<'i>(input: &mut &'i str) -> ModalResult<(&'i str, Bounds)> {
    (ident, opt(delimited('(', bounds, ')')))
        .map(|(name, args)| (name, args.unwrap_or(Bounds::None)))
        .parse_next(input)
}

/// Parse `name` or `name(args)`.
pub(crate) fn builtin_call(text: &str) -> Option<(&str, Bounds)> {
    type_call.parse(text).ok()
}

/// Parse the inside of an array-size suffix such as `[2,5]`.
pub(crate) fn size_suffix(text: &str) -> Option<Bounds> {
    bounds.parse(text).ok()
}

/// Predefined type names: letters, digits, `_`, `-`, `:` and `.`.
pub(crate) fn is_type_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'))
}

// -- String assertions ------------------------------------------------------

/// Symbol, keyword, operator, negated.
const ASSERTIONS: &[(&str, &str, StringOp, bool)] = &[
    ("==", "equal", StringOp::Equal, false),
    ("!=", "not-equal", StringOp::Equal, true),
    ("%=", "include", StringOp::Contains, false),
    ("!%=", "not-include", StringOp::Contains, true),
    ("^=", "start-with", StringOp::StartsWith, false),
    ("!^=", "not-start-with", StringOp::StartsWith, true),
    ("$=", "end-with", StringOp::EndsWith, false),
    ("!$=", "not-end-with", StringOp::EndsWith, true),
    ("~=", "match", StringOp::Matches, false),
    ("!~=", "not-match", StringOp::Matches, true),
];

fn keyword_operator(name: &str) -> Option<(StringOp, bool, bool)> {
    let (name, case_insensitive) = match name.strip_suffix("-i") {
        Some(base) => (base, true),
        None => (name, false),
    };
    ASSERTIONS
        .iter()
        .find(|(symbol, keyword, _, _)| *symbol == name || *keyword == name)
        .map(|&(_, _, op, negated)| (op, negated, case_insensitive))
}

fn symbol_operator(input: &mut &str) -> ModalResult<(StringOp, bool, bool)> {
    alt((
        "!%=".value((StringOp::Contains, true, false)),
        "!^=".value((StringOp::StartsWith, true, false)),
        "!$=".value((StringOp::EndsWith, true, false)),
        "!~=".value((StringOp::Matches, true, false)),
        "!=".value((StringOp::Equal, true, false)),
        "%=".value((StringOp::Contains, false, false)),
        "^=".value((StringOp::StartsWith, false, false)),
        "$=".value((StringOp::EndsWith, false, false)),
        "~=".value((StringOp::Matches, false, false)),
        "==".value((StringOp::Equal, false, false)),
        "=".value((StringOp::Equal, false, false)),
        "~".value((StringOp::Matches, false, false)),
    ))
    .parse_next(input)
}

fn assertion_operator(input: &mut &str) -> ModalResult<(StringOp, bool, bool)> {
    alt((
        delimited(':', take_till(1.., ':'), ':').verify_map(keyword_operator),
        symbol_operator,
    ))
    .parse_next(input)
}

/// Recognize a string assertion. Everything after the operator is the
/// literal operand, verbatim.
pub(crate) fn string_assertion(text: &str) -> Option<StringAssertion> {
    let mut input = text;
    let (op, negated, case_insensitive) = assertion_operator.parse_next(&mut input).ok()?;
    Some(StringAssertion {
        op,
        negated,
        case_insensitive,
        operand: input.to_owned(),
    })
}

// -- Filters ----------------------------------------------------------------

fn token<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    preceded(ws, take_till(1.., |c: char| c.is_ascii_whitespace())).parse_next(input)
}

fn filter_tokens<'i>(input: &mut &'i str) -> ModalResult<Vec<&'i str>> {
    delimited('|', repeat(1.., token), ws).parse_next(input)
}

fn is_unsigned_decimal(token: &str) -> bool {
    let mut parts = token.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();
    !whole.is_empty()
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.map_or(true, |f| !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()))
}

fn filter_target(token: &str) -> Option<FilterTarget> {
    match token {
        "value" => Some(FilterTarget::Value),
        "length" => Some(FilterTarget::Length),
        "array.length" => Some(FilterTarget::ArrayLength),
        "string.length" => Some(FilterTarget::StringLength),
        name => BuiltinType::lookup(name)
            .filter(|b| b.numeric)
            .map(|b| FilterTarget::Builtin(b.name.to_owned())),
    }
}

fn compare_operator(token: &str) -> Option<CompareOp> {
    match token {
        "gt" | ">" => Some(CompareOp::Gt),
        "ge" | ">=" => Some(CompareOp::Gte),
        "lt" | "<" => Some(CompareOp::Lt),
        "le" | "<=" => Some(CompareOp::Lte),
        "eq" | "==" => Some(CompareOp::Eq),
        "ne" | "!=" => Some(CompareOp::Neq),
        _ => None,
    }
}

fn expect_args(operator: &str, args: &[f64], expected: usize) -> Result<(), CompileError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(CompileError::FilterArgumentCount {
            operator: operator.to_owned(),
            expected,
            found: args.len(),
        })
    }
}

/// Parse a `|target operator args...` expression.
pub(crate) fn filter(text: &str) -> Result<Filter, CompileError> {
    let invalid = |reason: &str| CompileError::InvalidFilter {
        filter: text.to_owned(),
        reason: reason.to_owned(),
    };
    let tokens = filter_tokens
        .parse(text)
        .map_err(|_| invalid("expected '|target operator args'"))?;
    let (target, rest) = tokens
        .split_first()
        .ok_or_else(|| invalid("missing target"))?;
    let target = filter_target(target).ok_or_else(|| invalid("unknown target"))?;
    let (operator, raw_args) = rest
        .split_first()
        .ok_or_else(|| invalid("missing operator"))?;

    let mut args = Vec::with_capacity(raw_args.len());
    for arg in raw_args {
        if !is_unsigned_decimal(arg) {
            return Err(invalid("arguments must be unsigned numbers"));
        }
        args.push(arg.parse::<f64>().map_err(|_| invalid("bad number"))?);
    }

    let op = match *operator {
        "between" => {
            expect_args(operator, &args, 2)?;
            FilterOp::Between(args[0], args[1])
        }
        "timesof" => {
            expect_args(operator, &args, 1)?;
            FilterOp::TimesOf(args[0])
        }
        other => {
            let cmp = compare_operator(other).ok_or_else(|| invalid("unknown operator"))?;
            expect_args(operator, &args, 1)?;
            FilterOp::Compare(cmp, args[0])
        }
    };
    Ok(Filter { target, op })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_without_arguments() {
        assert_eq!(builtin_call("uint8"), Some(("uint8", Bounds::None)));
    }

    #[test]
    fn builtin_with_arguments() {
        assert_eq!(
            builtin_call("string(2,6)"),
            Some(("string", Bounds::Between(2.0, 6.0)))
        );
        assert_eq!(builtin_call("array(3)"), Some(("array", Bounds::Exact(3.0))));
        assert_eq!(builtin_call("int(-5, )"), Some(("int", Bounds::AtLeast(-5.0))));
        assert_eq!(builtin_call("float()"), Some(("float", Bounds::None)));
        assert_eq!(builtin_call("int(, 10)"), Some(("int", Bounds::AtMost(10.0))));
        assert_eq!(builtin_call("int(,)"), None);
    }

    #[test]
    fn builtin_rejects_trailing_garbage() {
        assert_eq!(builtin_call("int(1,2"), None);
        assert_eq!(builtin_call("int x"), None);
        assert_eq!(builtin_call("9lives"), None);
    }

    #[test]
    fn size_suffixes() {
        assert_eq!(size_suffix(""), Some(Bounds::None));
        assert_eq!(size_suffix("4"), Some(Bounds::Exact(4.0)));
        assert_eq!(size_suffix("1,"), Some(Bounds::AtLeast(1.0)));
        assert_eq!(size_suffix("1, 3"), Some(Bounds::Between(1.0, 3.0)));
        assert_eq!(size_suffix(",3"), Some(Bounds::AtMost(3.0)));
        assert_eq!(size_suffix("x"), None);
    }

    #[test]
    fn type_names() {
        assert!(is_type_name("user.profile:v1-beta_2"));
        assert!(!is_type_name(""));
        assert!(!is_type_name("a b"));
        assert!(!is_type_name("#dict1"));
    }

    #[test]
    fn symbolic_assertions() {
        let a = string_assertion("==hello").unwrap();
        assert_eq!((a.op, a.negated, a.operand.as_str()), (StringOp::Equal, false, "hello"));

        let a = string_assertion("!%=bad").unwrap();
        assert_eq!((a.op, a.negated), (StringOp::Contains, true));

        let a = string_assertion("=x").unwrap();
        assert_eq!((a.op, a.operand.as_str()), (StringOp::Equal, "x"));

        let a = string_assertion("~^\\d+$").unwrap();
        assert_eq!((a.op, a.operand.as_str()), (StringOp::Matches, "^\\d+$"));
    }

    #[test]
    fn keyword_assertions() {
        let a = string_assertion(":start-with-i:Abc").unwrap();
        assert_eq!(a.op, StringOp::StartsWith);
        assert!(a.case_insensitive);
        assert_eq!(a.operand, "Abc");

        let a = string_assertion(":==:==x").unwrap();
        assert_eq!((a.op, a.operand.as_str()), (StringOp::Equal, "==x"));

        let a = string_assertion(":not-match:a+").unwrap();
        assert_eq!((a.op, a.negated), (StringOp::Matches, true));
    }

    #[test]
    fn non_assertions() {
        assert!(string_assertion("string").is_none());
        assert!(string_assertion("!string").is_none());
        assert!(string_assertion(":bogus:x").is_none());
    }

    #[test]
    fn filter_between() {
        let f = filter("|value between 1 10").unwrap();
        assert_eq!(f.target, FilterTarget::Value);
        assert_eq!(f.op, FilterOp::Between(1.0, 10.0));
    }

    #[test]
    fn filter_symbolic_compare() {
        let f = filter("|array.length >= 2").unwrap();
        assert_eq!(f.target, FilterTarget::ArrayLength);
        assert_eq!(f.op, FilterOp::Compare(CompareOp::Gte, 2.0));
    }

    #[test]
    fn filter_builtin_target() {
        let f = filter("|uint timesof 3").unwrap();
        assert_eq!(f.target, FilterTarget::Builtin("uint".into()));
        assert_eq!(f.op, FilterOp::TimesOf(3.0));
    }

    #[test]
    fn filter_errors() {
        assert!(matches!(
            filter("|value between 1"),
            Err(CompileError::FilterArgumentCount { expected: 2, found: 1, .. })
        ));
        assert!(matches!(filter("|value gt -1"), Err(CompileError::InvalidFilter { .. })));
        assert!(matches!(filter("|weight gt 1"), Err(CompileError::InvalidFilter { .. })));
        assert!(matches!(filter("|value approx 1"), Err(CompileError::InvalidFilter { .. })));
        assert!(matches!(filter("|string gt 1"), Err(CompileError::InvalidFilter { .. })));
        assert!(matches!(filter("|"), Err(CompileError::InvalidFilter { .. })));
    }
}
