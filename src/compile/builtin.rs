use super::context::Scope;
use crate::backend::Backend;
use crate::parse::length_bounds;
use crate::types::{
    format_number, BuiltinType, Bounds, CompareOp, CompileError, Flag, Literal, Pattern, Strength,
};

/// Largest integer a double represents exactly: 2^53 - 1.
const SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

const NUMERIC_PATTERN: &str = r"^[-+]?(?:\d+(?:\.\d*)?|\.\d+)$";

/// Fixed range and kind of a numeric built-in.
struct NumberKind {
    integer: bool,
    min: Option<f64>,
    max: Option<f64>,
}

fn number_kind(name: &str) -> Option<NumberKind> {
    let (integer, min, max) = match name {
        "int" => (true, None, None),
        "int8" => (true, Some(-128.0), Some(127.0)),
        "int16" => (true, Some(-32_768.0), Some(32_767.0)),
        "int32" => (true, Some(-2_147_483_648.0), Some(2_147_483_647.0)),
        "int64" | "safe_int" => (true, Some(-SAFE_INTEGER), Some(SAFE_INTEGER)),
        "uint" => (true, Some(0.0), None),
        "uint8" => (true, Some(0.0), Some(255.0)),
        "uint16" => (true, Some(0.0), Some(65_535.0)),
        "uint32" => (true, Some(0.0), Some(4_294_967_295.0)),
        "uint64" | "safe_uint" => (true, Some(0.0), Some(SAFE_INTEGER)),
        "number" | "float" => (false, None, None),
        "ufloat" => (false, Some(0.0), None),
        _ => return None,
    };
    Some(NumberKind { integer, min, max })
}

/// Compile built-in type `name` against the scope's subject.
pub(super) fn compile<B: Backend>(
    b: &B,
    name: &str,
    bounds: Bounds,
    scope: &mut Scope<B::Value>,
) -> Result<B::Expr, CompileError> {
    let unknown = || CompileError::UnknownType {
        rule: name.to_owned(),
    };
    let builtin = BuiltinType::lookup(name).ok_or_else(unknown)?;
    let v = scope.subject.clone();
    // Under `$.string`, coercible types also accept their string spelling.
    let coerce = builtin.string_coercible && scope.flags.is_set(Flag::FromString);
    if builtin.numeric {
        let kind = number_kind(name).ok_or_else(unknown)?;
        return number(b, name, &kind, bounds, &v, coerce);
    }
    let expr = match name {
        "any" => b.literal(true),
        "void" | "optional" | "undefined" => return presence(b, scope, Flag::Optional),
        "required" => return presence(b, scope, Flag::Required),
        "null" => spelled(b, &v, coerce, b.is_null(&v), &["null"]),
        "boolean" => spelled(b, &v, coerce, b.is_boolean(&v), &["true", "false"]),
        "true" => spelled(b, &v, coerce, b.equals(&v, &Literal::Bool(true)), &["true"]),
        "false" => spelled(b, &v, coerce, b.equals(&v, &Literal::Bool(false)), &["false"]),
        "true_value" => b.is_truthy(&v),
        "false_value" => b.is_falsy(&v),
        "struct" => b.is_struct(&v),
        "numeric" => b.or(vec![
            b.is_number(&v),
            b.and(vec![b.is_string(&v), b.matches(&v, pattern(NUMERIC_PATTERN)?)]),
        ]),
        "array" => {
            let length = length_bounds(bounds, name)?;
            let mut checks = Vec::new();
            if !scope.flags.is_set(Flag::Array) {
                checks.push(b.is_array(&v));
                scope.flags.set(Flag::Array, Strength::Yes);
            }
            checks.extend(length_checks(b, &b.length(&v), length));
            b.and(checks)
        }
        "string" => {
            let length = length_bounds(bounds, name)?;
            let mut checks = vec![b.is_string(&v)];
            checks.extend(length_checks(b, &b.length(&v), length));
            b.and(checks)
        }
        "ascii_string" => restricted_string(b, &v, name, r"[\x00-\x7F]", bounds)?,
        "latin_string" => restricted_string(b, &v, name, r"[\x00-\xFF]", bounds)?,
        "hex_string" => restricted_string(b, &v, name, "[0-9a-fA-F]", bounds)?,
        "decimal" => decimal(b, &v, true, bounds)?,
        "udecimal" => decimal(b, &v, false, bounds)?,
        _ => return Err(unknown()),
    };
    Ok(expr)
}

fn pattern(source: &str) -> Result<Pattern, CompileError> {
    Pattern::new(source, false).map_err(|source_error| CompileError::InvalidRegex {
        pattern: source.to_owned(),
        source: source_error,
    })
}

/// Length constraints on `len` for already-validated bounds.
pub(super) fn length_checks<B: Backend>(b: &B, len: &B::Value, bounds: Bounds) -> Vec<B::Expr> {
    match bounds {
        Bounds::None => Vec::new(),
        Bounds::Exact(n) => vec![b.compare(len, CompareOp::Eq, n)],
        Bounds::AtLeast(n) => vec![b.compare(len, CompareOp::Gte, n)],
        Bounds::AtMost(n) => vec![b.compare(len, CompareOp::Lte, n)],
        Bounds::Between(lo, hi) => vec![
            b.compare(len, CompareOp::Gte, lo),
            b.compare(len, CompareOp::Lte, hi),
        ],
    }
}

/// `void` and `required`. Repeating one in the same scope is a no-op; mixing
/// them is an error.
fn presence<B: Backend>(
    b: &B,
    scope: &mut Scope<B::Value>,
    flag: Flag,
) -> Result<B::Expr, CompileError> {
    let (own, other, name, other_name) = match flag {
        Flag::Optional => (Flag::Optional, Flag::Required, "optional", "required"),
        _ => (Flag::Required, Flag::Optional, "required", "optional"),
    };
    if scope.flags.is_set(other) {
        return Err(CompileError::FlagConflict {
            flag: name,
            conflict: other_name,
        });
    }
    if scope.flags.is_set(own) {
        return Ok(b.literal(true));
    }
    scope.flags.set(own, Strength::Yes);
    Ok(match own {
        Flag::Optional => b.is_undefined(&scope.subject),
        _ => b.is_not_undefined(&scope.subject),
    })
}

/// `check`, or with `coerce` also one of the listed string spellings.
fn spelled<B: Backend>(
    b: &B,
    v: &B::Value,
    coerce: bool,
    check: B::Expr,
    spellings: &[&str],
) -> B::Expr {
    if !coerce {
        return check;
    }
    let mut alternatives = vec![check];
    alternatives.extend(
        spellings
            .iter()
            .map(|s| b.equals(v, &Literal::String((*s).to_owned()))),
    );
    b.or(alternatives)
}

fn number<B: Backend>(
    b: &B,
    name: &str,
    kind: &NumberKind,
    bounds: Bounds,
    v: &B::Value,
    coerce: bool,
) -> Result<B::Expr, CompileError> {
    let (user_min, user_max) = match bounds {
        Bounds::None => (None, None),
        Bounds::Exact(min) | Bounds::AtLeast(min) => (Some(min), None),
        Bounds::AtMost(max) => (None, Some(max)),
        Bounds::Between(min, max) => {
            if min > max {
                return Err(CompileError::range(
                    format!("{name}({}, {})", format_number(min), format_number(max)),
                    "minimum is greater than maximum",
                ));
            }
            (Some(min), Some(max))
        }
    };
    let test = |x: &B::Value| {
        let mut checks = vec![if kind.integer {
            b.is_integer(x)
        } else {
            b.is_number(x)
        }];
        for min in [kind.min, user_min].into_iter().flatten() {
            checks.push(b.compare(x, CompareOp::Gte, min));
        }
        for max in [kind.max, user_max].into_iter().flatten() {
            checks.push(b.compare(x, CompareOp::Lte, max));
        }
        b.and(checks)
    };
    if coerce {
        Ok(b.or(vec![test(v), test(&b.string_to_number(v))]))
    } else {
        Ok(test(v))
    }
}

fn restricted_string<B: Backend>(
    b: &B,
    v: &B::Value,
    name: &str,
    class: &str,
    bounds: Bounds,
) -> Result<B::Expr, CompileError> {
    let repeat = match length_bounds(bounds, name)? {
        Bounds::None => "*".to_owned(),
        Bounds::Exact(n) => format!("{{{}}}", format_number(n)),
        Bounds::AtLeast(n) => format!("{{{},}}", format_number(n)),
        Bounds::AtMost(n) => format!("{{0,{}}}", format_number(n)),
        Bounds::Between(lo, hi) => format!("{{{},{}}}", format_number(lo), format_number(hi)),
    };
    let source = format!("^{class}{repeat}$");
    Ok(b.and(vec![b.is_string(v), b.matches(v, pattern(&source)?)]))
}

fn digit_count(n: f64, context: &str) -> Result<usize, CompileError> {
    if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= 1_000.0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(n as usize)
    } else {
        Err(CompileError::range(
            context,
            "digit counts must be non-negative integers",
        ))
    }
}

/// The anchored pattern for `decimal` / `udecimal` with the given digit
/// counts: total significant digits, then fractional digits.
pub(super) fn decimal_pattern(signed: bool, bounds: Bounds) -> Result<String, CompileError> {
    let name = if signed { "decimal" } else { "udecimal" };
    let sign = if signed { "[-+]?" } else { "" };
    let body = match bounds {
        Bounds::None => r"\d+(?:\.\d+)?".to_owned(),
        Bounds::Exact(total) => {
            let context = format!("{name}({})", format_number(total));
            let total = digit_count(total, &context)?;
            if total == 0 {
                return Err(CompileError::range(
                    context,
                    "total digits must be greater than zero",
                ));
            }
            let mut alternatives = vec![format!(r"\d{{1,{total}}}")];
            for whole in 1..total {
                alternatives.push(format!(r"\d{{{whole}}}\.\d{{1,{}}}", total - whole));
            }
            alternatives.join("|")
        }
        Bounds::Between(total, fraction) => {
            let context = format!(
                "{name}({}, {})",
                format_number(total),
                format_number(fraction)
            );
            let total = digit_count(total, &context)?;
            let fraction = digit_count(fraction, &context)?;
            if total == 0 {
                return Err(CompileError::range(
                    context,
                    "total digits must be greater than zero",
                ));
            }
            if fraction > total {
                return Err(CompileError::range(
                    context,
                    "fractional digits exceed total digits",
                ));
            }
            if fraction == 0 {
                format!(r"\d{{1,{total}}}")
            } else if fraction == total {
                format!(r"0?\.\d{{1,{fraction}}}")
            } else {
                format!(r"\d{{1,{}}}(?:\.\d{{1,{fraction}}})?", total - fraction)
            }
        }
        Bounds::AtLeast(total) => {
            return Err(CompileError::range(
                format!("{name}({},)", format_number(total)),
                "expected digit counts, not an open range",
            ))
        }
        Bounds::AtMost(total) => {
            return Err(CompileError::range(
                format!("{name}(,{})", format_number(total)),
                "expected digit counts, not an open range",
            ))
        }
    };
    Ok(format!("^{sign}(?:{body})$"))
}

fn decimal<B: Backend>(
    b: &B,
    v: &B::Value,
    signed: bool,
    bounds: Bounds,
) -> Result<B::Expr, CompileError> {
    let source = decimal_pattern(signed, bounds)?;
    Ok(b.and(vec![b.is_string(v), b.matches(v, pattern(&source)?)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TreeBackend;
    use crate::types::{ErrorKind, Expr, Operand};

    fn compiled(name: &str, from_string: bool) -> Expr {
        let mut scope = Scope::root(Operand::Entry);
        if from_string {
            scope.raise(Flag::FromString, Strength::ElementInherit);
        }
        compile(&TreeBackend, name, Bounds::None, &mut scope).unwrap()
    }

    fn matches(bounds: Bounds, text: &str) -> bool {
        let source = decimal_pattern(true, bounds).unwrap();
        regex::Regex::new(&source).unwrap().is_match(text)
    }

    #[test]
    fn decimal_without_arguments() {
        assert!(matches(Bounds::None, "-12.5"));
        assert!(matches(Bounds::None, "7"));
        assert!(!matches(Bounds::None, "1."));
        assert!(!matches(Bounds::None, "abc"));
    }

    #[test]
    fn decimal_total_digits() {
        let b = Bounds::Exact(3.0);
        assert!(matches(b, "123"));
        assert!(matches(b, "1.23"));
        assert!(matches(b, "+12.3"));
        assert!(!matches(b, "1234"));
        assert!(!matches(b, "12.34"));
    }

    #[test]
    fn decimal_integer_only() {
        let b = Bounds::Between(4.0, 0.0);
        assert!(matches(b, "1234"));
        assert!(!matches(b, "1.2"));
        assert!(!matches(b, "12345"));
    }

    #[test]
    fn decimal_all_fractional() {
        let b = Bounds::Between(2.0, 2.0);
        assert!(matches(b, "0.12"));
        assert!(matches(b, ".5"));
        assert!(!matches(b, "1.2"));
        assert!(!matches(b, "0.123"));
    }

    #[test]
    fn decimal_mixed() {
        let b = Bounds::Between(5.0, 2.0);
        assert!(matches(b, "123.45"));
        assert!(matches(b, "-123"));
        assert!(!matches(b, "1234.5"));
        assert!(!matches(b, "12.345"));
    }

    #[test]
    fn unsigned_decimal_rejects_sign() {
        let source = decimal_pattern(false, Bounds::None).unwrap();
        let re = regex::Regex::new(&source).unwrap();
        assert!(re.is_match("3.14"));
        assert!(!re.is_match("-3.14"));
    }

    #[test]
    fn decimal_range_errors() {
        for bounds in [
            Bounds::Exact(0.0),
            Bounds::Between(2.0, 3.0),
            Bounds::Between(0.0, 0.0),
            Bounds::Exact(1.5),
            Bounds::AtLeast(2.0),
            Bounds::AtMost(2.0),
        ] {
            let err = decimal_pattern(true, bounds).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Range, "{bounds:?}");
        }
    }

    #[test]
    fn number_kinds() {
        let int8 = number_kind("int8").unwrap();
        assert!(int8.integer);
        assert_eq!((int8.min, int8.max), (Some(-128.0), Some(127.0)));
        let uint64 = number_kind("uint64").unwrap();
        assert_eq!(uint64.max, Some(SAFE_INTEGER));
        assert!(!number_kind("float").unwrap().integer);
        assert!(number_kind("string").is_none());
    }

    #[test]
    fn numeric_builtins_have_a_kind() {
        for name in [
            "int", "int8", "int16", "int32", "int64", "safe_int", "uint", "uint8", "uint16",
            "uint32", "uint64", "safe_uint", "number", "float", "ufloat",
        ] {
            assert!(BuiltinType::lookup(name).is_some_and(|b| b.numeric), "{name}");
            assert!(number_kind(name).is_some(), "{name}");
        }
    }

    #[test]
    fn string_coercion_follows_the_builtin_table() {
        for name in ["null", "boolean", "true", "false", "int", "uint8", "ufloat"] {
            assert!(BuiltinType::lookup(name).is_some_and(|b| b.string_coercible));
            assert_ne!(compiled(name, true), compiled(name, false), "{name}");
        }
        for name in ["string", "true_value", "struct", "numeric", "decimal", "any"] {
            assert!(BuiltinType::lookup(name).is_some_and(|b| !b.string_coercible));
            assert_eq!(compiled(name, true), compiled(name, false), "{name}");
        }
    }
}
