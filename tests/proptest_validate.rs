
use proptest::prelude::*;
use ruleguard::{CompileOptions, Engine, Validator};
use serde_json::{json, Value};
use strategies::{arb_json, arb_rule};

fn compile(rule: Value, trace: bool) -> Validator {
    Engine::new()
        .compile(CompileOptions::new(rule).trace_errors(trace))
        .unwrap()
}

// ---------------------------------------------------------------------------
// Invariant 1: Determinism
//
// Checking the same value twice gives the same verdict and the same trace.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn determinism(rule in arb_rule(), value in arb_json()) {
        let v = compile(rule, true);
        let mut first = Vec::new();
        let verdict = v.check_traced(&value, &mut first);
        for _ in 0..3 {
            let mut again = Vec::new();
            prop_assert_eq!(verdict, v.check_traced(&value, &mut again));
            prop_assert_eq!(&first, &again);
        }
    }
}

// ---------------------------------------------------------------------------
// Invariant 2: Tracing does not change verdicts
//
// A traced validator agrees with an untraced one. Passing values leave no
// trace; failing values always end with the root path.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn tracing_is_transparent(rule in arb_rule(), value in arb_json()) {
        let plain = compile(rule.clone(), false);
        let traced = compile(rule, true);
        let mut trace = Vec::new();
        let verdict = traced.check_traced(&value, &mut trace);
        prop_assert_eq!(verdict, plain.check(&value));
        if verdict {
            prop_assert!(trace.is_empty(), "passing value left {:?}", trace);
        } else {
            prop_assert_eq!(trace.last().map(String::as_str), Some("data"));
        }
    }
}

// ---------------------------------------------------------------------------
// Invariant 3: Boolean modifiers compose like boolean operators
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn not_inverts(rule in arb_rule(), value in arb_json()) {
        let inner = compile(rule.clone(), false).check(&value);
        let negated = compile(json!(["$.not", rule]), false).check(&value);
        prop_assert_eq!(negated, !inner);
    }

    #[test]
    fn or_is_disjunction(a in arb_rule(), b in arb_rule(), value in arb_json()) {
        let expected = compile(a.clone(), false).check(&value)
            || compile(b.clone(), false).check(&value);
        prop_assert_eq!(compile(json!(["$.or", a, b]), false).check(&value), expected);
    }

    #[test]
    fn and_is_conjunction(a in arb_rule(), b in arb_rule(), value in arb_json()) {
        let expected = compile(a.clone(), false).check(&value)
            && compile(b.clone(), false).check(&value);
        prop_assert_eq!(compile(json!(["$.and", a, b]), false).check(&value), expected);
    }

    #[test]
    fn list_is_all_elements(rule in arb_rule(), items in prop::collection::vec(arb_json(), 0..5)) {
        let element = compile(rule.clone(), false);
        let expected = items.iter().all(|item| element.check(item));
        let list = compile(json!(["$.list", rule]), false);
        prop_assert_eq!(list.check(&Value::Array(items)), expected);
    }
}

// ---------------------------------------------------------------------------
// Invariant 4: Builtin bounds match their arithmetic definition
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn integer_bounds(low in -50_i64..50, span in 0_i64..50, n in -120_i64..120) {
        let high = low + span;
        let v = compile(json!(format!("int({low},{high})")), false);
        prop_assert_eq!(v.check(&json!(n)), (low..=high).contains(&n));
    }

    #[test]
    fn string_lengths(min in 0_usize..5, span in 0_usize..5, s in "[a-zé]{0,12}") {
        let max = min + span;
        let v = compile(json!(format!("string({min},{max})")), false);
        let len = s.chars().count();
        prop_assert_eq!(v.check(&json!(s)), (min..=max).contains(&len));
    }

    #[test]
    fn from_string_accepts_decimal_spellings(n in any::<i32>()) {
        let v = compile(json!(["$.string", "int"]), false);
        prop_assert!(v.check(&json!(n)));
        prop_assert!(v.check(&json!(n.to_string())));
        let fraction = format!("{n}.5");
        prop_assert!(!v.check(&json!(fraction)));
    }
}
