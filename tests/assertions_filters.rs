use ruleguard::{CompileError, CompileOptions, Engine, ErrorKind, Validator};
use serde_json::{json, Value};

fn validator(rule: Value) -> Validator {
    Engine::new().compile(CompileOptions::new(rule)).unwrap()
}

fn compile_error(rule: Value) -> CompileError {
    Engine::new().compile(CompileOptions::new(rule)).unwrap_err()
}

// -- String assertions --

#[test]
fn equality_assertions() {
    let v = validator(json!("==hello"));
    assert!(v.check(&json!("hello")));
    assert!(!v.check(&json!("Hello")));
    assert!(!v.check(&json!(5)));

    let v = validator(json!("!=hello"));
    assert!(v.check(&json!("world")));
    assert!(!v.check(&json!("hello")));
    assert!(!v.check(&json!(5)), "negation still requires a string");
}

#[test]
fn substring_assertions() {
    assert!(validator(json!("%=ell")).check(&json!("hello")));
    assert!(!validator(json!("!%=ell")).check(&json!("hello")));
    assert!(validator(json!("^=he")).check(&json!("hello")));
    assert!(!validator(json!("^=lo")).check(&json!("hello")));
    assert!(validator(json!("$=lo")).check(&json!("hello")));
    assert!(validator(json!("!$=he")).check(&json!("hello")));
}

#[test]
fn regex_assertions() {
    let v = validator(json!("~=^\\d{3}-\\d{4}$"));
    assert!(v.check(&json!("555-1234")));
    assert!(!v.check(&json!("5551234")));

    let v = validator(json!("!~=\\s"));
    assert!(v.check(&json!("nospace")));
    assert!(!v.check(&json!("has space")));
}

#[test]
fn keyword_and_case_insensitive_assertions() {
    let v = validator(json!(":equal-i:Hello"));
    assert!(v.check(&json!("HELLO")));
    assert!(v.check(&json!("hello")));
    assert!(!v.check(&json!("help")));

    let v = validator(json!(":start-with:ab"));
    assert!(v.check(&json!("abc")));
    assert!(!v.check(&json!("ABC")));

    let v = validator(json!(":match-i:^abc$"));
    assert!(v.check(&json!("AbC")));
}

#[test]
fn operand_is_taken_verbatim() {
    let v = validator(json!("==?string"));
    assert!(v.check(&json!("?string")));
    assert!(!v.check(&json!("string")));
}

#[test]
fn invalid_regex_is_a_grammar_error() {
    let err = compile_error(json!("~=(unclosed"));
    assert!(matches!(err, CompileError::InvalidRegex { .. }));
    assert_eq!(err.kind(), ErrorKind::Grammar);
}

#[test]
fn assertions_in_structures() {
    let v = validator(json!({"email": "~=^[^@]+@[^@]+$", "role": ["==admin", "==user"]}));
    assert!(v.check(&json!({"email": "a@b", "role": "user"})));
    assert!(!v.check(&json!({"email": "a@b", "role": "root"})));
    assert!(!v.check(&json!({"email": "ab", "role": "user"})));
}

// -- Filters --

#[test]
fn value_filters() {
    let v = validator(json!("|value between 1 10"));
    assert!(v.check(&json!(1)));
    assert!(v.check(&json!(10)));
    assert!(v.check(&json!(5.5)));
    assert!(!v.check(&json!(0)));
    assert!(!v.check(&json!("5")));

    assert!(validator(json!("|value gt 3")).check(&json!(4)));
    assert!(!validator(json!("|value > 3")).check(&json!(3)));
    assert!(validator(json!("|value <= 3")).check(&json!(3)));
    assert!(validator(json!("|value ne 3")).check(&json!(2)));
}

#[test]
fn length_filters() {
    let v = validator(json!("|length le 3"));
    assert!(v.check(&json!("abc")));
    assert!(v.check(&json!([1, 2])));
    assert!(!v.check(&json!([1, 2, 3, 4])));
    assert!(!v.check(&json!(3)));

    let v = validator(json!("|array.length ge 2"));
    assert!(v.check(&json!([1, 2])));
    assert!(!v.check(&json!("ab")));

    let v = validator(json!("|string.length eq 2"));
    assert!(v.check(&json!("日本")));
    assert!(!v.check(&json!([1, 2])));
}

#[test]
fn builtin_target_filters() {
    let v = validator(json!("|uint timesof 3"));
    assert!(v.check(&json!(0)));
    assert!(v.check(&json!(9)));
    assert!(!v.check(&json!(4)));
    assert!(!v.check(&json!(-3)));
    assert!(!v.check(&json!(3.0_f64 + 0.5)));

    let v = validator(json!("|value timesof 0.5"));
    assert!(v.check(&json!(1.5)));
    assert!(!v.check(&json!(1.2)));
}

#[test]
fn filters_combine_with_types() {
    let v = validator(json!({"port": ["$.and", "uint16", "|value ge 1024"]}));
    assert!(v.check(&json!({"port": 8080})));
    assert!(!v.check(&json!({"port": 80})));
    assert!(!v.check(&json!({"port": 70000})));
}

#[test]
fn filter_errors() {
    assert_eq!(compile_error(json!("|value between 10 1")).kind(), ErrorKind::Range);
    assert_eq!(compile_error(json!("|value timesof 0")).kind(), ErrorKind::Range);
    assert!(matches!(
        compile_error(json!("|value between 1")),
        CompileError::FilterArgumentCount {
            expected: 2,
            found: 1,
            ..
        }
    ));
    assert!(matches!(
        compile_error(json!("|value gt -1")),
        CompileError::InvalidFilter { .. }
    ));
    assert!(matches!(
        compile_error(json!("|height gt 1")),
        CompileError::InvalidFilter { .. }
    ));
}
