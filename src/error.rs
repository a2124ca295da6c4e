use thiserror::Error;

use crate::CompileError;

/// Unified error type covering rule text, compilation, and I/O.
///
/// Returned by convenience methods like
/// [`Engine::compile_json()`](crate::Engine::compile_json) and
/// [`Engine::compile_file()`](crate::Engine::compile_file).
#[derive(Debug, Error)]
pub enum RuleguardError {
    #[error("rule is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "binary-cache")]
    #[error(transparent)]
    Serialize(#[from] crate::serial::SerializeError),

    #[cfg(feature = "binary-cache")]
    #[error(transparent)]
    Deserialize(#[from] crate::serial::DeserializeError),
}
