use tracing::debug;

use super::builtin::{self, length_checks};
use super::context::{Scope, Session};
use super::filter;
use crate::backend::Backend;
use crate::types::{
    Bounds, CompareOp, CompileError, CompiledUnit, Field, Flag, Literal, Pattern, Repeat, Rule,
    Strength, StringAssertion, StringOp, Structure, TextOp, TraceSegment, TupleSlot,
};

impl<B: Backend> Session<'_, B> {
    /// Compile a whole rule as this session's unit. `root_trace` adds a trace
    /// point for the entry value itself.
    pub(crate) fn unit(
        &mut self,
        rule: &Rule,
        root_trace: bool,
    ) -> Result<CompiledUnit<B::Expr>, CompileError> {
        let b = self.backend;
        let mut scope = Scope::root(b.entry());
        let body = self.rule(rule, &mut scope)?;
        let body = if root_trace {
            self.traced(body, &scope)
        } else {
            body
        };
        Ok(self.finish(body))
    }

    /// Register `rule` as predefined type `name` and return its unit.
    pub(crate) fn define(
        &mut self,
        name: &str,
        rule: &Rule,
    ) -> Result<CompiledUnit<B::Expr>, CompileError> {
        let duplicate = || CompileError::DuplicateType {
            name: name.to_owned(),
        };
        if self.is_taken(name) {
            return Err(duplicate());
        }
        let unit = self.nested(true).unit(rule, false)?;
        self.registry()
            .insert(name, unit.clone())
            .map_err(|_| duplicate())?;
        debug!(
            name,
            referred_types = unit.referred_types().len(),
            "registered predefined type"
        );
        Ok(unit)
    }

    pub(crate) fn rule(
        &mut self,
        rule: &Rule,
        scope: &mut Scope<B::Value>,
    ) -> Result<B::Expr, CompileError> {
        let b = self.backend;
        match rule {
            Rule::Literal(literal) => Ok(self.literal(literal, scope)),
            Rule::Builtin { name, bounds } => builtin::compile(b, name, *bounds, scope),
            Rule::Assert(assertion) => self.assertion(assertion, scope),
            Rule::Filter(f) => filter::compile(b, f, scope),
            Rule::Reference(name) => Ok(self.reference(name, scope)),
            Rule::Not(inner) => {
                let mut child = scope.trap();
                let expr = self.rule(inner, &mut child)?;
                Ok(b.not(expr))
            }
            Rule::Or(branches) => {
                let mut exprs = Vec::with_capacity(branches.len());
                for branch in branches {
                    let mut child = scope.trap();
                    exprs.push(self.rule(branch, &mut child)?);
                }
                Ok(b.or(exprs))
            }
            Rule::And(parts) => {
                let mut exprs = Vec::with_capacity(parts.len());
                for part in parts {
                    exprs.push(self.rule(part, scope)?);
                }
                Ok(b.and(exprs))
            }
            Rule::List(element) => self.array(element, Bounds::None, scope),
            Rule::Array { length, element } => self.array(element, *length, scope),
            Rule::Tuple(slots) => self.tuple(slots, scope),
            Rule::Map(value) => self.map(value, scope),
            Rule::Dict { keys, value } => self.dict(keys, value, scope),
            Rule::Strict(operand) => {
                self.flagged(Flag::Strict, Strength::Inherit, operand.as_deref(), scope)
            }
            Rule::Equal(operand) => self.flagged(
                Flag::Strict,
                Strength::ElementInherit,
                operand.as_deref(),
                scope,
            ),
            Rule::FromString(operand) => self.flagged(
                Flag::FromString,
                Strength::ElementInherit,
                operand.as_deref(),
                scope,
            ),
            Rule::Type { name, rule } => {
                self.define(name, rule)?;
                Ok(self.reference(name, scope))
            }
            Rule::Enum(candidates) => {
                let checks = candidates
                    .iter()
                    .map(|c| self.literal(c, scope))
                    .collect();
                Ok(b.or(checks))
            }
            Rule::Struct(structure) => self.structure(structure, scope),
        }
    }

    // -- Leaves ---------------------------------------------------------------

    fn literal(&self, literal: &Literal, scope: &Scope<B::Value>) -> B::Expr {
        let b = self.backend;
        let exact = b.equals(&scope.subject, literal);
        match literal.string_form() {
            Some(form) if scope.flags.is_set(Flag::FromString) => b.or(vec![
                exact,
                b.equals(&scope.subject, &Literal::String(form)),
            ]),
            _ => exact,
        }
    }

    fn assertion(
        &self,
        assertion: &StringAssertion,
        scope: &Scope<B::Value>,
    ) -> Result<B::Expr, CompileError> {
        let b = self.backend;
        let v = &scope.subject;
        let (subject, operand) = if assertion.case_insensitive {
            (b.lower_case(v), assertion.operand.to_lowercase())
        } else {
            (v.clone(), assertion.operand.clone())
        };
        let test = match assertion.op {
            StringOp::Equal => b.text(&subject, TextOp::Equal, &operand),
            StringOp::Contains => b.text(&subject, TextOp::Contains, &operand),
            StringOp::StartsWith => b.text(&subject, TextOp::StartsWith, &operand),
            StringOp::EndsWith => b.text(&subject, TextOp::EndsWith, &operand),
            StringOp::Matches => {
                let pattern = Pattern::new(&assertion.operand, assertion.case_insensitive)
                    .map_err(|source| CompileError::InvalidRegex {
                        pattern: assertion.operand.clone(),
                        source,
                    })?;
                b.matches(v, pattern)
            }
        };
        let test = if assertion.negated { b.not(test) } else { test };
        Ok(b.and(vec![b.is_string(v), test]))
    }

    fn reference(&mut self, name: &str, scope: &Scope<B::Value>) -> B::Expr {
        self.refer(name);
        let path = self.tracing().then_some(&scope.path);
        self.backend.call_type(name, &scope.subject, path)
    }

    /// Set `flag` for `operand`, or for the rest of the current scope when
    /// there is no operand.
    fn flagged(
        &mut self,
        flag: Flag,
        strength: Strength,
        operand: Option<&Rule>,
        scope: &mut Scope<B::Value>,
    ) -> Result<B::Expr, CompileError> {
        match operand {
            None => {
                scope.raise(flag, strength);
                Ok(self.backend.literal(true))
            }
            Some(rule) => {
                let mut child = scope.trap();
                child.raise(flag, strength);
                self.rule(rule, &mut child)
            }
        }
    }

    // -- Arrays ---------------------------------------------------------------

    /// Emit "is array" once per value.
    fn array_check(&self, scope: &mut Scope<B::Value>, checks: &mut Vec<B::Expr>) {
        if !scope.flags.is_set(Flag::Array) {
            checks.push(self.backend.is_array(&scope.subject));
            scope.flags.set(Flag::Array, Strength::Yes);
        }
    }

    fn array(
        &mut self,
        element: &Rule,
        length: Bounds,
        scope: &mut Scope<B::Value>,
    ) -> Result<B::Expr, CompileError> {
        let b = self.backend;
        let v = scope.subject.clone();
        let mut checks = Vec::new();
        self.array_check(scope, &mut checks);
        checks.extend(length_checks(b, &b.length(&v), length));
        checks.push(self.elements(element, &v, 0, None, scope)?);
        Ok(b.and(checks))
    }

    /// Every element of `v[from..to]` matches `element`.
    fn elements(
        &mut self,
        element: &Rule,
        v: &B::Value,
        from: usize,
        to: Option<usize>,
        scope: &Scope<B::Value>,
    ) -> Result<B::Expr, CompileError> {
        let b = self.backend;
        if element.is_any() {
            return Ok(b.literal(true));
        }
        let slot = self.next_slot();
        let items = if from == 0 && to.is_none() {
            v.clone()
        } else {
            b.slice(v, from, to)
        };
        let mut child = scope.descend(
            b.variable(slot),
            TraceSegment::Element { slot, offset: from },
        );
        let body = self.rule(element, &mut child)?;
        let body = self.traced(body, &child);
        Ok(b.for_each(&items, slot, body))
    }

    #[allow(clippy::cast_precision_loss)]
    fn tuple(
        &mut self,
        slots: &[TupleSlot],
        scope: &mut Scope<B::Value>,
    ) -> Result<B::Expr, CompileError> {
        let b = self.backend;
        let v = scope.subject.clone();
        let mut checks = Vec::new();
        self.array_check(scope, &mut checks);

        let mut positions = Vec::with_capacity(slots.len());
        let mut next = 0usize;
        let mut unlimited = false;
        for slot in slots {
            match slot.repeat {
                Repeat::Once => {
                    let mut child = scope.descend(b.index(&v, next), TraceSegment::Index(next));
                    let expr = self.rule(&slot.rule, &mut child)?;
                    positions.push(self.traced(expr, &child));
                    next += 1;
                }
                Repeat::Exactly(n) => {
                    let end = next + n + 1;
                    positions.push(self.elements(&slot.rule, &v, next, Some(end), scope)?);
                    next = end;
                }
                Repeat::Unlimited => {
                    positions.push(self.elements(&slot.rule, &v, next, None, scope)?);
                    next += 1;
                    unlimited = true;
                }
            }
        }

        let op = if unlimited { CompareOp::Gte } else { CompareOp::Eq };
        checks.push(b.compare(&b.length(&v), op, next as f64));
        checks.extend(positions);
        Ok(b.and(checks))
    }

    // -- Structures -----------------------------------------------------------

    fn map(&mut self, value: &Rule, scope: &Scope<B::Value>) -> Result<B::Expr, CompileError> {
        let b = self.backend;
        let v = scope.subject.clone();
        let mut checks = vec![b.is_struct(&v)];
        if !value.is_any() {
            checks.push(self.values(value, &v, Vec::new(), scope)?);
        }
        Ok(b.and(checks))
    }

    /// Every value of `v` whose key is not in `skip` matches `value`.
    fn values(
        &mut self,
        value: &Rule,
        v: &B::Value,
        skip: Vec<String>,
        scope: &Scope<B::Value>,
    ) -> Result<B::Expr, CompileError> {
        let b = self.backend;
        let slot = self.next_slot();
        let mut child = scope.descend(b.variable(slot), TraceSegment::Key { slot });
        let body = self.rule(value, &mut child)?;
        let body = self.traced(body, &child);
        let body = if skip.is_empty() {
            body
        } else {
            let cases = skip.into_iter().map(|k| (k, b.literal(true))).collect();
            b.switch_key(slot, cases, body)
        };
        Ok(b.for_in(v, slot, body))
    }

    fn structure(
        &mut self,
        structure: &Structure,
        scope: &Scope<B::Value>,
    ) -> Result<B::Expr, CompileError> {
        let b = self.backend;
        let v = scope.subject.clone();
        let mut checks = vec![b.is_struct(&v)];
        for Field { key, rule } in &structure.fields {
            let mut child = scope.descend(b.field(&v, key), TraceSegment::Field(key.clone()));
            let expr = self.rule(rule, &mut child)?;
            checks.push(self.traced(expr, &child));
        }

        let declared: Vec<String> = structure.fields.iter().map(|f| f.key.clone()).collect();
        match &structure.rest {
            Some(rest) if rest.is_any() => {}
            Some(rest) => checks.push(self.values(rest, &v, declared, scope)?),
            None if scope.flags.is_set(Flag::Strict) => checks.push(b.only_keys(&v, declared)),
            None => {}
        }
        Ok(b.and(checks))
    }

    /// `$.dict`: a structure whose listed keys all hold a private type.
    fn dict(
        &mut self,
        keys: &[String],
        value: &Rule,
        scope: &Scope<B::Value>,
    ) -> Result<B::Expr, CompileError> {
        let name = self.private_type_name();
        self.define(&name, value)?;
        let structure = Structure {
            fields: keys
                .iter()
                .map(|key| Field {
                    key: key.clone(),
                    rule: Rule::Reference(name.clone()),
                })
                .collect(),
            rest: None,
        };
        self.structure(&structure, scope)
    }
}
