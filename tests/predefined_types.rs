use ruleguard::{CompileError, CompileOptions, Compiler, Engine, Validator};
use serde_json::{json, Value};

fn compile(engine: &mut Engine, rule: Value) -> Validator {
    engine.compile(CompileOptions::new(rule)).unwrap()
}

fn define(engine: &mut Engine, name: &str, rule: Value) {
    engine
        .compile(CompileOptions::new(rule).name(name))
        .unwrap();
}

fn linked_list(len: usize) -> Value {
    let mut node = json!({"value": len});
    for value in (0..len).rev() {
        node = json!({"value": value, "next": node});
    }
    node
}

// -- Definition --

#[test]
fn references_behave_like_inlined_rules() {
    let mut engine = Engine::new();
    define(&mut engine, "point", json!({"x": "int", "y": "int"}));
    let by_reference = compile(&mut engine, json!({"from": "@point", "to?": "@point"}));
    let inlined = compile(
        &mut engine,
        json!({"from": {"x": "int", "y": "int"}, "to?": {"x": "int", "y": "int"}}),
    );

    for value in [
        json!({"from": {"x": 1, "y": 2}}),
        json!({"from": {"x": 1, "y": 2}, "to": {"x": 0, "y": 0}}),
        json!({"from": {"x": 1}}),
        json!({"from": {"x": 1, "y": 2}, "to": null}),
        json!({"from": {"x": "1", "y": 2}}),
        json!({}),
    ] {
        assert_eq!(by_reference.check(&value), inlined.check(&value), "{value}");
    }
}

#[test]
fn type_modifier_defines_and_uses() {
    let mut engine = Engine::new();
    let v = compile(&mut engine, json!(["$.type", "id", "uint(1,)"]));
    assert!(engine.has_predefined_type("id"));
    assert!(v.check(&json!(3)));
    assert!(!v.check(&json!(0)));

    let list = compile(&mut engine, json!("@id[]"));
    assert!(list.check(&json!([1, 2])));
    assert!(!list.check(&json!([1, 0])));
}

#[test]
fn recursive_types() {
    let mut engine = Engine::new();
    let v = compile(
        &mut engine,
        json!(["$.type", "node", {"value": "int", "next?": "@node"}]),
    );
    assert!(v.check(&json!({"value": 1})));
    assert!(v.check(&linked_list(20)));
    assert!(!v.check(&json!({"value": 1, "next": {"value": "two"}})));
    assert!(!v.check(&json!({"value": 1, "next": null})));
}

#[test]
fn runaway_recursion_fails_instead_of_overflowing() {
    let mut engine = Engine::new();
    let v = compile(
        &mut engine,
        json!(["$.type", "node", {"value": "int", "next?": "@node"}]),
    );
    assert!(!v.check(&linked_list(500)));
}

#[test]
fn self_reference_on_the_same_value_fails() {
    let mut engine = Engine::new();
    for layers in [1, 4, 16, 64] {
        let name = format!("loop{layers}");
        let rule = format!("{}@{name}", "!?".repeat(layers));
        let v = compile(&mut engine, json!(["$.type", name, rule]));
        assert!(!v.check(&json!(1)), "{layers} layers");
        assert!(!v.check(&json!({"a": [1]})), "{layers} layers");
    }
}

#[test]
fn eval_depth_is_configurable() {
    let rule = json!(["$.type", "node", {"value": "int", "next?": "@node"}]);

    let mut shallow = Engine::with_compiler(Compiler::builder().max_eval_depth(32).build());
    let v = compile(&mut shallow, rule.clone());
    assert!(v.check(&linked_list(2)));
    assert!(!v.check(&linked_list(20)));

    let passed = std::thread::Builder::new()
        .stack_size(256 << 20)
        .spawn(move || {
            let mut deep =
                Engine::with_compiler(Compiler::builder().max_eval_depth(8192).build());
            let v = compile(&mut deep, rule);
            v.check(&linked_list(500)) && !v.check(&json!({"value": 1, "next": {"value": "x"}}))
        })
        .unwrap()
        .join()
        .unwrap();
    assert!(passed);
}

#[test]
fn mutually_recursive_types() {
    let mut engine = Engine::new();
    define(&mut engine, "tree", json!({"label": "string", "children": "@forest"}));
    define(&mut engine, "forest", json!("@tree[]"));
    assert!(engine.detect_undefined_types().is_empty());

    let v = compile(&mut engine, json!("@tree"));
    assert!(v.check(&json!({"label": "root", "children": [
        {"label": "a", "children": []},
        {"label": "b", "children": [{"label": "c", "children": []}]},
    ]})));
    assert!(!v.check(&json!({"label": "root", "children": [{"label": 1, "children": []}]})));
}

#[test]
fn redefinition_is_an_error() {
    let mut engine = Engine::new();
    define(&mut engine, "id", json!("uint"));
    assert!(matches!(
        engine.compile(CompileOptions::new(json!("string")).name("id")),
        Err(CompileError::DuplicateType { .. })
    ));
    assert!(matches!(
        engine.compile(CompileOptions::new(json!(["$.type", "id", "int"]))),
        Err(CompileError::DuplicateType { .. })
    ));
}

#[test]
fn type_names_are_validated() {
    let mut engine = Engine::new();
    for rule in [
        json!(["$.type", "bad name", "int"]),
        json!(["$.type", 3, "int"]),
        json!("@bad name"),
        json!("@"),
    ] {
        assert!(
            matches!(
                engine.compile(CompileOptions::new(rule.clone())),
                Err(CompileError::InvalidTypeName { .. })
            ),
            "{rule}"
        );
    }
    assert!(matches!(
        engine.compile(CompileOptions::new(json!("int")).name("#dict0")),
        Err(CompileError::InvalidTypeName { .. })
    ));
    define(&mut engine, "user.profile:v1-beta_2", json!("any"));
}

// -- Undefined types --

#[test]
fn earlier_validators_see_later_definitions() {
    let mut engine = Engine::new();
    let early = compile(&mut engine, json!("@point"));
    assert!(!early.check(&json!({"x": 1})));

    define(&mut engine, "point", json!({"x": "int"}));
    assert!(early.check(&json!({"x": 1})));
    assert!(!early.check(&json!({"x": "1"})));

    let nested = compile(&mut engine, json!({"at": "@place"}));
    compile(&mut engine, json!(["$.type", "place", {"p": "@point"}]));
    assert!(nested.check(&json!({"at": {"p": {"x": 2}}})));
}

#[test]
fn undefined_types_fail_and_are_reported() {
    let mut engine = Engine::new();
    let v = compile(&mut engine, json!({"owner": "@user", "items": "@item[]"}));
    define(&mut engine, "order", json!({"lines": "@line[]"}));
    assert_eq!(
        engine.detect_undefined_types(),
        vec!["item", "line", "user"]
    );
    assert!(!v.check(&json!({"owner": {}, "items": []})));

    define(&mut engine, "user", json!("struct"));
    assert_eq!(engine.detect_undefined_types(), vec!["item", "line"]);
}

#[test]
fn lists_of_undefined_types_pass_when_empty() {
    let mut engine = Engine::new();
    let v = compile(&mut engine, json!("@ghost[]"));
    assert!(v.check(&json!([])));
    assert!(!v.check(&json!([1])));
}

// -- Native types --

#[test]
fn native_types() {
    let mut engine = Engine::new();
    engine
        .add_predefined_type("even", |v| {
            v.and_then(Value::as_i64).is_some_and(|n| n % 2 == 0)
        })
        .unwrap();
    engine
        .add_predefined_type("absent", |v| v.is_none())
        .unwrap();

    let v = compile(&mut engine, json!({"n": "@even", "gone": "@absent"}));
    assert!(v.check(&json!({"n": 4})));
    assert!(!v.check(&json!({"n": 3})));
    assert!(!v.check(&json!({"n": 4, "gone": null})));
    assert!(engine.detect_undefined_types().is_empty());
}

#[test]
fn native_types_inside_compiled_types() {
    let mut engine = Engine::new();
    engine
        .add_predefined_type("positive", |v| {
            v.and_then(Value::as_f64).is_some_and(|n| n > 0.0)
        })
        .unwrap();
    define(&mut engine, "price", json!({"amount": "@positive", "currency": "==EUR"}));

    let v = compile(&mut engine, json!("@price[1,]"));
    assert!(v.check(&json!([{"amount": 1.5, "currency": "EUR"}])));
    assert!(!v.check(&json!([{"amount": 0, "currency": "EUR"}])));
    assert!(!v.check(&json!([])));
}

#[test]
fn native_names_are_reserved() {
    let mut engine = Engine::new();
    define(&mut engine, "taken", json!("int"));
    assert!(matches!(
        engine.add_predefined_type("taken", |_| true),
        Err(CompileError::DuplicateType { .. })
    ));

    engine.add_predefined_type("native", |_| true).unwrap();
    assert!(matches!(
        engine.compile(CompileOptions::new(json!(["$.type", "native", "int"]))),
        Err(CompileError::DuplicateType { .. })
    ));
}
