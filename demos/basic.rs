use ruleguard::{CompileOptions, Engine};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn main() {
    // RUST_LOG=ruleguard=debug shows compilation and type resolution.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let mut engine = Engine::new();

    // A predefined type, referred to below as @address
    engine
        .compile(
            CompileOptions::new(json!({
                "street": "string(1,)",
                "zip": "~=^\\d{5}$",
            }))
            .name("address"),
        )
        .expect("failed to compile address");

    let validator = engine
        .compile(CompileOptions::new(json!({
            "name": "string(1,64)",
            "age": "uint8",
            "email?": "%=@",
            "home": "@address",
            "tags->[]": "string",
            "role": ["$.enum", "admin", "user"],
        })))
        .expect("failed to compile rule");

    let ok = json!({
        "name": "Ada",
        "age": 36,
        "home": {"street": "Main St", "zip": "12345"},
        "tags": ["math"],
        "role": "admin",
    });
    let bad = json!({
        "name": "Ada",
        "age": 360,
        "home": {"street": "Main St", "zip": "1234"},
        "tags": [],
        "role": "root",
    });

    println!("valid record: {}", validator.check(&ok));
    println!("invalid record: {}", validator.check(&bad));
    println!("undefined types: {:?}", engine.detect_undefined_types());
}
