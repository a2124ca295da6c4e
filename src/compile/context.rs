use std::collections::{BTreeSet, HashSet};

use super::Settings;
use crate::backend::Backend;
use crate::types::{
    CompiledUnit, Flag, Flags, Strength, TraceArguments, TracePath, TraceSegment, TypeRegistry,
    DEFAULT_TRACE_PREFIX,
};

/// The compile-time view of one node: which value is being checked, where it
/// lives, and which flags are active.
///
/// Scopes are values. Entering a nested construct derives a child scope;
/// leaving it simply drops the child, so the parent is restored on every exit
/// path, errors included.
#[derive(Debug, Clone)]
pub(crate) struct Scope<V> {
    pub(crate) flags: Flags,
    pub(crate) subject: V,
    pub(crate) path: TracePath,
}

impl<V: Clone> Scope<V> {
    pub(crate) fn root(subject: V) -> Self {
        Self {
            flags: Flags::default(),
            subject,
            path: TracePath::new(),
        }
    }

    /// A child scope over the same value.
    pub(crate) fn trap(&self) -> Self {
        Self {
            flags: self.flags.inherited(false),
            subject: self.subject.clone(),
            path: self.path.clone(),
        }
    }

    /// A child scope over a sub-value reached through `segment`.
    pub(crate) fn descend(&self, subject: V, segment: TraceSegment) -> Self {
        Self {
            flags: self.flags.inherited(true),
            subject,
            path: self.path.child(segment),
        }
    }

    /// Set `flag` without weakening an element-wide setting.
    pub(crate) fn raise(&mut self, flag: Flag, strength: Strength) {
        if self.flags.get(flag) != Strength::ElementInherit {
            self.flags.set(flag, strength);
        }
    }
}

/// State of one compilation unit. Nested units (`$.type`, `$.dict`) get their
/// own session sharing the compiler's registry.
pub(crate) struct Session<'c, B: Backend> {
    pub(crate) backend: &'c B,
    settings: &'c Settings,
    registry: &'c mut TypeRegistry<B::Expr>,
    reserved: &'c HashSet<String>,
    private_types: &'c mut usize,
    trace: bool,
    slots: usize,
    referred: BTreeSet<String>,
}

impl<'c, B: Backend> Session<'c, B> {
    pub(crate) fn new(
        backend: &'c B,
        settings: &'c Settings,
        registry: &'c mut TypeRegistry<B::Expr>,
        reserved: &'c HashSet<String>,
        private_types: &'c mut usize,
        trace: bool,
    ) -> Self {
        Self {
            backend,
            settings,
            registry,
            reserved,
            private_types,
            trace,
            slots: 0,
            referred: BTreeSet::new(),
        }
    }

    /// A fresh session for a standalone unit compiled in the middle of this one.
    pub(crate) fn nested(&mut self, trace: bool) -> Session<'_, B> {
        Session::new(
            self.backend,
            self.settings,
            &mut *self.registry,
            self.reserved,
            &mut *self.private_types,
            trace,
        )
    }

    pub(crate) fn registry(&mut self) -> &mut TypeRegistry<B::Expr> {
        &mut *self.registry
    }

    /// Whether `name` is already a registered or externally reserved type.
    pub(crate) fn is_taken(&self, name: &str) -> bool {
        self.registry.contains(name) || self.reserved.contains(name)
    }

    pub(crate) fn tracing(&self) -> bool {
        self.trace
    }

    /// A loop variable slot unique within this unit.
    pub(crate) fn next_slot(&mut self) -> usize {
        let slot = self.slots;
        self.slots += 1;
        slot
    }

    /// A registry name no user-defined type can take.
    pub(crate) fn private_type_name(&mut self) -> String {
        let n = *self.private_types;
        *self.private_types += 1;
        format!("#dict{n}")
    }

    pub(crate) fn refer(&mut self, name: &str) {
        self.referred.insert(name.to_owned());
    }

    /// Wrap `expr` in a trace point for `scope` when tracing.
    pub(crate) fn traced(&self, expr: B::Expr, scope: &Scope<B::Value>) -> B::Expr {
        if self.trace {
            self.backend.or_add_trace(expr, &scope.path)
        } else {
            expr
        }
    }

    /// Package a compiled body as a unit, consuming the referred-type set.
    pub(crate) fn finish(&mut self, source: B::Expr) -> CompiledUnit<B::Expr> {
        let settings = self.settings;
        CompiledUnit {
            source,
            entry_argument: settings.entry_argument.clone(),
            type_table_argument: settings.type_table_argument.clone(),
            trace: self.trace.then(|| TraceArguments {
                output: settings.trace_argument.clone(),
                prefix: settings.trace_prefix_argument.clone(),
                default_prefix: DEFAULT_TRACE_PREFIX.to_owned(),
            }),
            referred_types: std::mem::take(&mut self.referred).into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Operand;

    #[test]
    fn trap_keeps_subject_and_inherit_flags() {
        let mut scope = Scope::root(Operand::Entry);
        scope.flags.set(Flag::Strict, Strength::Inherit);
        scope.flags.set(Flag::Optional, Strength::Yes);
        let child = scope.trap();
        assert_eq!(child.subject, Operand::Entry);
        assert!(child.flags.is_set(Flag::Strict));
        assert!(!child.flags.is_set(Flag::Optional));
    }

    #[test]
    fn descend_extends_path_and_drops_inherit() {
        let mut scope = Scope::root(Operand::Entry);
        scope.flags.set(Flag::Strict, Strength::Inherit);
        scope.flags.set(Flag::FromString, Strength::ElementInherit);
        let child = scope.descend(Operand::Var(0), TraceSegment::Index(1));
        assert_eq!(child.path.to_string(), "[1]");
        assert!(!child.flags.is_set(Flag::Strict));
        assert!(child.flags.is_set(Flag::FromString));
        assert!(scope.path.is_empty());
    }

    #[test]
    fn raise_never_weakens_element_inherit() {
        let mut scope = Scope::root(Operand::Entry);
        scope.raise(Flag::Strict, Strength::ElementInherit);
        scope.raise(Flag::Strict, Strength::Inherit);
        assert_eq!(scope.flags.get(Flag::Strict), Strength::ElementInherit);
    }
}
