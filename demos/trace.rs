use ruleguard::{CompileOptions, Engine};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let mut engine = Engine::new();
    engine
        .add_predefined_type("even", |v| {
            v.and_then(|v| v.as_i64()).is_some_and(|n| n % 2 == 0)
        })
        .expect("failed to register native type");

    let unit = engine
        .compile_unit(
            CompileOptions::new(json!({
                "points->[]": {"x": "@even", "y": "int"},
                "row": ["$.tuple", "string", "int", "..."],
            }))
            .trace_errors(true),
        )
        .expect("failed to compile rule");
    println!("{}", unit.source_text());
    println!();

    let validator = engine.assemble(&unit);
    let value = json!({
        "points": [{"x": 2, "y": 0}, {"x": 3, "y": 1}],
        "row": ["total", 1, 2, "three"],
    });

    let report = validator.validate_detailed(&value);
    println!("{report}");
    println!();

    let mut trace = Vec::new();
    validator.check_traced_with_prefix(&value, &mut trace, "request");
    for path in &trace {
        println!("failed at {path}");
    }
}
