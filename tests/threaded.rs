use std::sync::Arc;
use std::thread;

use ruleguard::{CompileOptions, Engine};
use serde_json::json;

#[test]
fn validate_across_threads() {
    let mut engine = Engine::new();
    engine
        .compile(CompileOptions::new(json!({"street": "string", "zip": "~=^\\d{5}$"})).name("address"))
        .unwrap();
    let validator = Arc::new(
        engine
            .compile(CompileOptions::new(json!({
                "name": "string(1,)",
                "age": "uint8",
                "home": "@address",
                "banned?": "boolean",
            })))
            .unwrap(),
    );

    let mut handles = vec![];

    // Thread 1: complete record
    let v = Arc::clone(&validator);
    handles.push(thread::spawn(move || {
        v.check(&json!({
            "name": "Ada",
            "age": 36,
            "home": {"street": "Main", "zip": "12345"},
        }))
    }));

    // Thread 2: bad zip inside the predefined type
    let v = Arc::clone(&validator);
    handles.push(thread::spawn(move || {
        v.check(&json!({
            "name": "Ada",
            "age": 36,
            "home": {"street": "Main", "zip": "1234"},
        }))
    }));

    // Thread 3: optional field present
    let v = Arc::clone(&validator);
    handles.push(thread::spawn(move || {
        v.check(&json!({
            "name": "Bob",
            "age": 20,
            "home": {"street": "Elm", "zip": "54321"},
            "banned": false,
        }))
    }));

    // Thread 4: age out of range
    let v = Arc::clone(&validator);
    handles.push(thread::spawn(move || {
        v.check(&json!({
            "name": "Eve",
            "age": 256,
            "home": {"street": "Oak", "zip": "00000"},
        }))
    }));

    let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results, vec![true, false, true, false]);
}

#[test]
fn traced_checks_do_not_share_output() {
    let validator = Arc::new(
        Engine::new()
            .compile(CompileOptions::new(json!("uint[]")).trace_errors(true))
            .unwrap(),
    );

    let handles: Vec<_> = (0..8_usize)
        .map(|i| {
            let v = Arc::clone(&validator);
            thread::spawn(move || {
                let mut items = vec![json!(1); 8];
                items[i] = json!(-1);
                let mut trace = Vec::new();
                let passed = v.check_traced(&json!(items), &mut trace);
                (passed, trace)
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let (passed, trace) = handle.join().unwrap();
        assert!(!passed);
        assert_eq!(trace, vec![format!("data[{i}]"), "data".to_owned()]);
    }
}

#[test]
fn validators_see_types_defined_later() {
    let mut engine = Engine::new();
    let validator = engine
        .compile(CompileOptions::new(json!("@late")))
        .unwrap();
    assert!(!validator.check(&json!(1)));

    engine.add_predefined_type("late", |v| v.is_some()).unwrap();
    let shared = Arc::new(validator);
    let v = Arc::clone(&shared);
    let passed = thread::spawn(move || v.check(&json!(1))).join().unwrap();
    assert!(passed);
}
