mod builtin;
mod context;
mod dispatch;
mod filter;

use std::collections::HashSet;

use tracing::debug;

use crate::backend::{Backend, TreeBackend};
use crate::parse::{self, Parser};
use crate::types::{CompileError, CompileOptions, CompiledUnit, TypeRegistry};

use context::Session;

/// Names and limits fixed when a compiler is built.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) max_depth: usize,
    pub(crate) max_eval_depth: usize,
    pub(crate) entry_argument: String,
    pub(crate) type_table_argument: String,
    pub(crate) trace_argument: String,
    pub(crate) trace_prefix_argument: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_depth: parse::DEFAULT_MAX_DEPTH,
            max_eval_depth: crate::evaluate::DEFAULT_MAX_EVAL_DEPTH,
            entry_argument: "v".to_owned(),
            type_table_argument: "types".to_owned(),
            trace_argument: "trace".to_owned(),
            trace_prefix_argument: "path".to_owned(),
        }
    }
}

/// Builder for a [`Compiler`].
///
/// ```
/// use ruleguard::Compiler;
///
/// let compiler = Compiler::builder()
///     .max_depth(32)
///     .entry_argument("input")
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct CompilerBuilder {
    settings: Settings,
}

impl CompilerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum rule nesting depth. Deeper rules fail with
    /// [`CompileError::DepthLimitExceeded`].
    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.settings.max_depth = depth;
        self
    }

    /// Evaluation nesting budget of the validators assembled from this
    /// compiler's units (default 256). Every step of a check counts,
    /// including each predefined-type call, so it bounds recursion through
    /// types like linked lists. A check that runs out fails and, when
    /// traced, records an "evaluation depth limit" entry. Deep budgets need
    /// a correspondingly large thread stack.
    #[must_use]
    pub fn max_eval_depth(mut self, depth: usize) -> Self {
        self.settings.max_eval_depth = depth;
        self
    }

    #[must_use]
    pub fn entry_argument(mut self, name: impl Into<String>) -> Self {
        self.settings.entry_argument = name.into();
        self
    }

    #[must_use]
    pub fn type_table_argument(mut self, name: impl Into<String>) -> Self {
        self.settings.type_table_argument = name.into();
        self
    }

    #[must_use]
    pub fn trace_argument(mut self, name: impl Into<String>) -> Self {
        self.settings.trace_argument = name.into();
        self
    }

    #[must_use]
    pub fn trace_prefix_argument(mut self, name: impl Into<String>) -> Self {
        self.settings.trace_prefix_argument = name.into();
        self
    }

    /// Build a compiler emitting the tree IR.
    #[must_use]
    pub fn build(self) -> Compiler {
        self.build_with(TreeBackend)
    }

    /// Build a compiler emitting through a custom backend.
    #[must_use]
    pub fn build_with<B: Backend>(self, backend: B) -> Compiler<B> {
        Compiler {
            backend,
            settings: self.settings,
            registry: TypeRegistry::new(),
            reserved: HashSet::new(),
            private_types: 0,
        }
    }
}

/// Compiles rules into [`CompiledUnit`]s and owns the predefined-type
/// registry they share.
///
/// A compiler is not meant to be shared between threads while compiling;
/// the units it produces are immutable.
///
/// ```
/// use ruleguard::{CompileOptions, Compiler};
/// use serde_json::json;
///
/// let mut compiler = Compiler::new();
/// let unit = compiler
///     .compile(CompileOptions::new(json!({"name": "string", "age": "uint8"})))
///     .unwrap();
/// assert!(unit.referred_types().is_empty());
/// ```
#[derive(Debug)]
pub struct Compiler<B: Backend = TreeBackend> {
    backend: B,
    settings: Settings,
    registry: TypeRegistry<B::Expr>,
    reserved: HashSet<String>,
    private_types: usize,
}

impl Compiler {
    #[must_use]
    pub fn new() -> Self {
        CompilerBuilder::new().build()
    }

    #[must_use]
    pub fn builder() -> CompilerBuilder {
        CompilerBuilder::new()
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Compiler<B> {
    /// Compile a rule.
    ///
    /// With a name, the rule is registered as a predefined type (as `$.type`
    /// does) and the registered unit is returned.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] if the rule is malformed, has out-of-range
    /// arguments, or conflicts with itself or the registry. Nothing is
    /// registered by a failed compile except types it finished defining
    /// before the failure.
    pub fn compile(
        &mut self,
        options: CompileOptions,
    ) -> Result<CompiledUnit<B::Expr>, CompileError> {
        let rule = Parser::new(self.settings.max_depth).rule(&options.rule, 0)?;
        debug!(
            kind = rule.kind(),
            name = ?options.name,
            trace = options.trace_errors,
            "compiling rule"
        );

        let mut session = Session::new(
            &self.backend,
            &self.settings,
            &mut self.registry,
            &self.reserved,
            &mut self.private_types,
            options.trace_errors,
        );
        let unit = match &options.name {
            Some(name) => {
                if !parse::is_type_name(name) {
                    return Err(CompileError::InvalidTypeName { name: name.clone() });
                }
                session.define(name, &rule)?
            }
            None => session.unit(&rule, true)?,
        };

        debug!(
            referred_types = unit.referred_types().len(),
            registry = self.registry.len(),
            "compiled rule"
        );
        Ok(unit)
    }

    /// Look up a predefined type compiled by this instance.
    #[must_use]
    pub fn predefined_type(&self, name: &str) -> Option<&CompiledUnit<B::Expr>> {
        self.registry.get(name)
    }

    /// Claim `name` for a type defined outside this compiler, so `$.type`
    /// can not redefine it. Returns `false` if the name is already taken.
    pub(crate) fn reserve(&mut self, name: &str) -> bool {
        if self.registry.contains(name) || self.reserved.contains(name) {
            return false;
        }
        self.reserved.insert(name.to_owned())
    }

    /// Register a unit compiled elsewhere. Returns `false` if the name is
    /// already taken.
    #[cfg(feature = "binary-cache")]
    pub(crate) fn adopt(&mut self, name: &str, unit: CompiledUnit<B::Expr>) -> bool {
        !self.reserved.contains(name) && self.registry.insert(name, unit).is_ok()
    }

    /// A fresh name for a private type loaded from elsewhere.
    #[cfg(feature = "binary-cache")]
    pub(crate) fn private_type_name(&mut self) -> String {
        let n = self.private_types;
        self.private_types += 1;
        format!("#dict{n}")
    }

    /// Whether `name` is registered or reserved.
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.registry.contains(name) || self.reserved.contains(name)
    }

    /// The evaluation nesting budget set with
    /// [`CompilerBuilder::max_eval_depth`].
    #[must_use]
    pub fn max_eval_depth(&self) -> usize {
        self.settings.max_eval_depth
    }

    #[must_use]
    pub fn registry(&self) -> &TypeRegistry<B::Expr> {
        &self.registry
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }
}
