use serde_json::Value as JsonValue;

use super::expr::{Expr, Source, SourceNames};

/// Default value of the trace-path prefix argument.
pub const DEFAULT_TRACE_PREFIX: &str = "data";

/// Names of the two extra arguments a traced unit takes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "binary-cache",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct TraceArguments {
    /// The output array failure paths are appended to. Starts empty.
    pub output: String,
    /// The path prefix string every recorded path starts with.
    pub prefix: String,
    /// Initial value of `prefix`.
    pub default_prefix: String,
}

/// The result of compiling one rule.
///
/// `E` is the expression type of the backend that produced it; the default
/// is the tree IR run by [`Validator`](crate::Validator).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "binary-cache",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct CompiledUnit<E = Expr> {
    pub(crate) source: E,
    pub(crate) entry_argument: String,
    pub(crate) type_table_argument: String,
    pub(crate) trace: Option<TraceArguments>,
    pub(crate) referred_types: Vec<String>,
}

impl<E> CompiledUnit<E> {
    /// The emitted predicate body.
    #[must_use]
    pub fn source(&self) -> &E {
        &self.source
    }

    #[must_use]
    pub fn entry_argument(&self) -> &str {
        &self.entry_argument
    }

    #[must_use]
    pub fn type_table_argument(&self) -> &str {
        &self.type_table_argument
    }

    /// Present when the unit was compiled with trace collection.
    #[must_use]
    pub fn trace(&self) -> Option<&TraceArguments> {
        self.trace.as_ref()
    }

    /// Names of predefined types this unit calls, sorted.
    #[must_use]
    pub fn referred_types(&self) -> &[String] {
        &self.referred_types
    }
}

impl CompiledUnit<Expr> {
    /// Render the unit's body as readable source, using its argument names.
    #[must_use]
    pub fn source_text(&self) -> String {
        let (trace, prefix) = match &self.trace {
            Some(t) => (t.output.as_str(), t.prefix.as_str()),
            None => ("trace", "path"),
        };
        Source {
            expr: &self.source,
            names: SourceNames {
                entry: &self.entry_argument,
                types: &self.type_table_argument,
                trace,
                prefix,
            },
        }
        .to_string()
    }
}

/// Input to [`Compiler::compile`](crate::Compiler::compile).
///
/// ```
/// use ruleguard::CompileOptions;
/// use serde_json::json;
///
/// let options = CompileOptions::new(json!({"id": "uint"}))
///     .name("record")
///     .trace_errors(true);
/// ```
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub(crate) rule: JsonValue,
    pub(crate) name: Option<String>,
    pub(crate) trace_errors: bool,
}

impl CompileOptions {
    #[must_use]
    pub fn new(rule: JsonValue) -> Self {
        Self {
            rule,
            name: None,
            trace_errors: false,
        }
    }

    /// Register the rule as a predefined type under `name`, as `$.type` does.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Emit failure-path collection into the compiled unit.
    #[must_use]
    pub fn trace_errors(mut self, enabled: bool) -> Self {
        self.trace_errors = enabled;
        self
    }
}
