use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::compile::Compiler;
use crate::error::RuleguardError;
use crate::evaluate::{self, NativeType, TraceSink, TypeEntry, TypeTable};
use crate::parse;
use crate::types::{
    CompileError, CompileOptions, CompiledUnit, Expr, ValidationReport, DEFAULT_TRACE_PREFIX,
};

/// Compiles rules and assembles them into callable [`Validator`]s.
///
/// The engine owns a [`Compiler`] and the runtime type table every validator
/// it produces shares. Each predefined type is published to the table as
/// soon as it is registered, so a type may be defined after the rules that
/// refer to it and validators assembled earlier pick it up.
///
/// ```
/// use ruleguard::{CompileOptions, Engine};
/// use serde_json::json;
///
/// let mut engine = Engine::new();
/// let validator = engine
///     .compile(CompileOptions::new(json!({"name": "string", "age": "uint8"})))
///     .unwrap();
///
/// assert!(validator.check(&json!({"name": "Ada", "age": 36})));
/// assert!(!validator.check(&json!({"name": "Ada", "age": 360})));
/// ```
#[derive(Debug, Default)]
pub struct Engine {
    compiler: Compiler,
    types: Arc<RwLock<TypeTable>>,
    referred: BTreeSet<String>,
}

impl Engine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a compiler configured through [`Compiler::builder`].
    #[must_use]
    pub fn with_compiler(compiler: Compiler) -> Self {
        Self {
            compiler,
            types: Arc::default(),
            referred: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    /// Compile a rule and assemble it.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] if the rule does not compile.
    pub fn compile(&mut self, options: CompileOptions) -> Result<Validator, CompileError> {
        let unit = self.compile_unit(options)?;
        Ok(self.assemble(&unit))
    }

    /// Compile a rule without assembling it, for callers that keep the unit
    /// around (to inspect its source, or to serialize it).
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] if the rule does not compile.
    pub fn compile_unit(&mut self, options: CompileOptions) -> Result<CompiledUnit, CompileError> {
        // A failed compile keeps the types it finished defining.
        let result = self.compiler.compile(options);
        self.publish();
        let unit = result?;
        self.referred.extend(unit.referred_types().iter().cloned());
        Ok(unit)
    }

    /// Parse `text` as a JSON rule, then compile it.
    ///
    /// # Errors
    ///
    /// Returns [`RuleguardError::Json`] for malformed JSON and
    /// [`RuleguardError::Compile`] for an invalid rule.
    pub fn compile_json(&mut self, text: &str, trace: bool) -> Result<Validator, RuleguardError> {
        let rule: JsonValue = serde_json::from_str(text)?;
        Ok(self.compile(CompileOptions::new(rule).trace_errors(trace))?)
    }

    /// Read a JSON rule from a file, then compile it.
    ///
    /// # Errors
    ///
    /// Returns [`RuleguardError::Io`] if the file can not be read, otherwise
    /// as [`compile_json`](Self::compile_json).
    pub fn compile_file(
        &mut self,
        path: impl AsRef<Path>,
        trace: bool,
    ) -> Result<Validator, RuleguardError> {
        let text = std::fs::read_to_string(path)?;
        self.compile_json(&text, trace)
    }

    /// Register a Rust predicate as predefined type `name`, callable from
    /// rules as `@name`.
    ///
    /// ```
    /// use ruleguard::{CompileOptions, Engine};
    /// use serde_json::json;
    ///
    /// let mut engine = Engine::new();
    /// engine
    ///     .add_predefined_type("even", |v| {
    ///         v.and_then(|v| v.as_i64()).is_some_and(|n| n % 2 == 0)
    ///     })
    ///     .unwrap();
    /// let validator = engine.compile(CompileOptions::new(json!("@even"))).unwrap();
    /// assert!(validator.check(&json!(4)));
    /// assert!(!validator.check(&json!(3)));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::InvalidTypeName`] for a malformed name and
    /// [`CompileError::DuplicateType`] if the name is already defined.
    pub fn add_predefined_type<F>(&mut self, name: &str, predicate: F) -> Result<(), CompileError>
    where
        F: Fn(Option<&JsonValue>) -> bool + Send + Sync + 'static,
    {
        if !parse::is_type_name(name) {
            return Err(CompileError::InvalidTypeName {
                name: name.to_owned(),
            });
        }
        if !self.compiler.reserve(name) {
            return Err(CompileError::DuplicateType {
                name: name.to_owned(),
            });
        }
        let native: NativeType = Arc::new(predicate);
        self.write_types().insert(name, TypeEntry::Native(native));
        debug!(name, "registered native type");
        Ok(())
    }

    #[must_use]
    pub fn has_predefined_type(&self, name: &str) -> bool {
        self.compiler.is_defined(name)
    }

    /// Names referred to by any compiled rule or predefined type that are
    /// still not defined, sorted.
    #[must_use]
    pub fn detect_undefined_types(&self) -> Vec<String> {
        let mut referred = self.referred.clone();
        for (_, unit) in self.compiler.registry().iter() {
            referred.extend(unit.referred_types().iter().cloned());
        }
        referred
            .into_iter()
            .filter(|name| !self.compiler.is_defined(name))
            .collect()
    }

    /// Turn a compiled unit into a validator. Predefined types it reaches
    /// that are not defined yet are logged; calls to them fail until they
    /// are defined.
    #[must_use]
    pub fn assemble(&self, unit: &CompiledUnit) -> Validator {
        let unresolved = self.unresolved(unit);
        if !unresolved.is_empty() {
            warn!(
                unresolved = ?unresolved,
                "predefined types are not defined; calls to them fail"
            );
        }
        Validator {
            expr: Arc::new(unit.source().clone()),
            types: Arc::clone(&self.types),
            traced: unit.trace().is_some(),
            default_prefix: unit
                .trace()
                .map_or_else(|| DEFAULT_TRACE_PREFIX.to_owned(), |t| t.default_prefix.clone()),
            max_depth: self.compiler.max_eval_depth(),
        }
    }

    /// Copy every registered type the runtime table does not hold yet.
    fn publish(&self) {
        let mut table = self.write_types();
        for (name, unit) in self.compiler.registry().iter() {
            if !table.contains(name) {
                table.insert(name, TypeEntry::Compiled(Arc::new(unit.source().clone())));
                debug!(name, "published predefined type");
            }
        }
    }

    /// Names reachable from `unit` that neither the compiler nor the table
    /// define.
    fn unresolved(&self, unit: &CompiledUnit) -> BTreeSet<String> {
        let table = self.read_types();
        let mut pending: Vec<String> = unit.referred_types().to_vec();
        let mut seen = BTreeSet::new();
        let mut unresolved = BTreeSet::new();
        while let Some(name) = pending.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            match self.compiler.predefined_type(&name) {
                Some(callee) => pending.extend(callee.referred_types().iter().cloned()),
                None if table.contains(&name) => {}
                None => {
                    unresolved.insert(name);
                }
            }
        }
        unresolved
    }

    /// Serialize `unit` together with the predefined types it reaches.
    /// `source_text`, when given, is stored as a digest for cache keying.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError`](crate::SerializeError) if encoding fails.
    #[cfg(feature = "binary-cache")]
    pub fn to_bytes(
        &self,
        unit: &CompiledUnit,
        source_text: Option<&str>,
    ) -> Result<Vec<u8>, crate::SerializeError> {
        let mut pending: Vec<String> = unit.referred_types().to_vec();
        let mut seen = BTreeSet::new();
        let mut types = Vec::new();
        while let Some(name) = pending.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(callee) = self.compiler.predefined_type(&name) {
                pending.extend(callee.referred_types().iter().cloned());
                types.push((name, callee.clone()));
            }
        }
        debug!(types = types.len(), "serializing compiled unit");
        crate::serial::encode(&crate::serial::Bundle::new(
            unit.clone(),
            types,
            source_text,
        ))
    }

    /// Load a unit written by [`to_bytes`](Self::to_bytes) and assemble it.
    /// Bundled predefined types this engine does not define yet are
    /// registered; names it already defines keep their current definition.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializeError`](crate::DeserializeError) if the blob is
    /// corrupt, from another format version, or structurally invalid.
    #[cfg(feature = "binary-cache")]
    pub fn from_bytes(&mut self, bytes: &[u8]) -> Result<Validator, crate::DeserializeError> {
        let mut bundle = crate::serial::decode(bytes)?;
        bundle.rename_private_types(|| self.compiler.private_type_name());
        for (name, unit) in bundle.types {
            if !self.compiler.adopt(&name, unit) {
                debug!(name, "kept existing definition of bundled type");
            }
        }
        self.publish();
        self.referred
            .extend(bundle.unit.referred_types().iter().cloned());
        Ok(self.assemble(&bundle.unit))
    }

    fn read_types(&self) -> RwLockReadGuard<'_, TypeTable> {
        self.types.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_types(&self) -> RwLockWriteGuard<'_, TypeTable> {
        self.types.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An assembled, callable rule.
///
/// Cheap to clone and safe to share between threads; checking a value never
/// mutates anything.
#[derive(Debug, Clone)]
pub struct Validator {
    expr: Arc<Expr>,
    types: Arc<RwLock<TypeTable>>,
    traced: bool,
    default_prefix: String,
    max_depth: usize,
}

impl Validator {
    /// Whether `value` satisfies the rule.
    #[must_use]
    pub fn check(&self, value: &JsonValue) -> bool {
        self.check_opt(Some(value))
    }

    /// As [`check`](Self::check); `None` stands for an absent value.
    #[must_use]
    pub fn check_opt(&self, value: Option<&JsonValue>) -> bool {
        evaluate::evaluate(&self.expr, &self.read_types(), value, None, self.max_depth)
    }

    /// Check `value`, appending the path of every failing node to `trace`.
    /// Paths start with the default prefix `data`.
    ///
    /// Only rules compiled with
    /// [`trace_errors`](crate::CompileOptions::trace_errors) record paths.
    /// A check that runs out of evaluation depth records an entry ending in
    /// "evaluation depth limit of N exceeded".
    pub fn check_traced(&self, value: &JsonValue, trace: &mut Vec<String>) -> bool {
        let prefix = self.default_prefix.clone();
        self.check_traced_with_prefix(value, trace, &prefix)
    }

    pub fn check_traced_with_prefix(
        &self,
        value: &JsonValue,
        trace: &mut Vec<String>,
        prefix: &str,
    ) -> bool {
        let sink = self.traced.then(|| TraceSink {
            output: trace,
            prefix: prefix.to_owned(),
        });
        evaluate::evaluate(
            &self.expr,
            &self.read_types(),
            Some(value),
            sink,
            self.max_depth,
        )
    }

    /// Check `value` and report the outcome, failure paths and timing.
    #[must_use]
    pub fn validate_detailed(&self, value: &JsonValue) -> ValidationReport {
        let start = Instant::now();
        let mut trace = Vec::new();
        let valid = self.check_traced(value, &mut trace);
        ValidationReport::new(valid, trace, start.elapsed())
    }

    /// Whether the rule was compiled with trace collection.
    #[must_use]
    pub fn is_traced(&self) -> bool {
        self.traced
    }

    fn read_types(&self) -> RwLockReadGuard<'_, TypeTable> {
        self.types.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn forward_references_reach_earlier_validators() {
        let mut engine = Engine::new();
        let early = engine
            .compile(CompileOptions::new(json!("@point[]")))
            .unwrap();
        assert_eq!(engine.detect_undefined_types(), vec!["point"]);
        assert!(!early.check(&json!([{"x": 1, "y": 2}])));

        engine
            .compile(CompileOptions::new(json!({"x": "int", "y": "int"})).name("point"))
            .unwrap();
        assert!(engine.detect_undefined_types().is_empty());
        assert!(early.check(&json!([{"x": 1, "y": 2}])));
        assert!(!early.check(&json!([{"x": 1}])));
    }

    #[test]
    fn failed_compiles_publish_finished_types() {
        let mut engine = Engine::new();
        let early = engine.compile(CompileOptions::new(json!("@id"))).unwrap();
        assert!(engine
            .compile(CompileOptions::new(json!([
                "$.and",
                ["$.type", "id", "uint"],
                "void",
                "required"
            ])))
            .is_err());
        assert!(engine.has_predefined_type("id"));
        assert!(early.check(&json!(3)));
    }

    #[test]
    fn native_names_are_reserved() {
        let mut engine = Engine::new();
        engine.add_predefined_type("odd", |_| true).unwrap();
        assert!(engine.has_predefined_type("odd"));
        assert!(matches!(
            engine.add_predefined_type("odd", |_| false),
            Err(CompileError::DuplicateType { .. })
        ));
        assert!(matches!(
            engine.compile(CompileOptions::new(json!("int")).name("odd")),
            Err(CompileError::DuplicateType { .. })
        ));
        assert!(matches!(
            engine.add_predefined_type("bad name", |_| true),
            Err(CompileError::InvalidTypeName { .. })
        ));
    }

    #[test]
    fn detailed_report_carries_trace() {
        let mut engine = Engine::new();
        let validator = engine
            .compile(CompileOptions::new(json!({"age": "uint"})).trace_errors(true))
            .unwrap();
        assert!(validator.is_traced());
        let report = validator.validate_detailed(&json!({"age": -1}));
        assert!(!report.is_valid());
        assert!(report.trace().contains(&r#"data["age"]"#.to_owned()));
    }

    #[test]
    fn compile_json_reports_bad_json() {
        let mut engine = Engine::new();
        assert!(matches!(
            engine.compile_json("{not json", false),
            Err(RuleguardError::Json(_))
        ));
        assert!(matches!(
            engine.compile_json(r#""strng""#, false),
            Err(RuleguardError::Compile(CompileError::UnknownType { .. }))
        ));
    }
}
