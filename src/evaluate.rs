use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::types::{quote_key, Expr, Operand, Resolved, TextOp, TracePath, TraceSegment};

/// Default evaluation nesting budget. Every step of the walk counts, so a
/// check stops with `false` here instead of exhausting the thread's stack.
pub(crate) const DEFAULT_MAX_EVAL_DEPTH: usize = 256;

/// A predicate implemented in Rust and registered as a predefined type.
pub type NativeType = Arc<dyn Fn(Option<&JsonValue>) -> bool + Send + Sync>;

#[derive(Clone)]
pub(crate) enum TypeEntry {
    Compiled(Arc<Expr>),
    Native(NativeType),
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeEntry::Compiled(expr) => f.debug_tuple("Compiled").field(expr).finish(),
            TypeEntry::Native(_) => f.write_str("Native(..)"),
        }
    }
}

/// The runtime type table: every predefined type a validator may call.
#[derive(Debug, Clone, Default)]
pub(crate) struct TypeTable {
    entries: HashMap<String, TypeEntry>,
}

impl TypeTable {
    pub(crate) fn get(&self, name: &str) -> Option<&TypeEntry> {
        self.entries.get(name)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Insert unless present. Returns whether the entry was added.
    pub(crate) fn insert(&mut self, name: &str, entry: TypeEntry) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        self.entries.insert(name.to_owned(), entry);
        true
    }
}

/// The loop variable bound to one slot.
#[derive(Debug, Clone)]
struct Binding<'v> {
    value: Resolved<'v>,
    index: usize,
    key: Option<&'v str>,
}

/// Where failure paths go while evaluating.
pub(crate) struct TraceSink<'a> {
    pub(crate) output: &'a mut Vec<String>,
    pub(crate) prefix: String,
}

struct Evaluator<'a, 'v> {
    types: &'a TypeTable,
    entry: Resolved<'v>,
    bindings: Vec<Option<Binding<'v>>>,
    sink: Option<TraceSink<'a>>,
    muted: bool,
    depth: usize,
    max_depth: usize,
    exhausted: bool,
}

/// Run `expr` against `value`, nesting at most `max_depth` steps deep.
/// Failure paths are appended to `sink` when given.
pub(crate) fn evaluate(
    expr: &Expr,
    types: &TypeTable,
    value: Option<&JsonValue>,
    sink: Option<TraceSink<'_>>,
    max_depth: usize,
) -> bool {
    let mut evaluator = Evaluator {
        types,
        entry: Resolved::from_option(value),
        bindings: Vec::new(),
        sink,
        muted: false,
        depth: 0,
        max_depth,
        exhausted: false,
    };
    let passed = evaluator.eval(expr);
    passed && !evaluator.exhausted
}

/// The trace entry recorded when evaluation runs out of depth at `path`.
pub(crate) fn depth_limit_entry(path: &str, limit: usize) -> String {
    format!("{path}: evaluation depth limit of {limit} exceeded")
}

impl<'a, 'v> Evaluator<'a, 'v> {
    fn eval(&mut self, expr: &Expr) -> bool {
        if self.exhausted {
            return false;
        }
        if self.depth >= self.max_depth {
            self.exhaust();
            return false;
        }
        self.depth += 1;
        let passed = self.step(expr);
        self.depth -= 1;
        passed
    }

    /// Stop the walk. Every later step fails and nothing is rolled back, so
    /// the verdict is `false` whatever encloses this point.
    fn exhaust(&mut self) {
        self.exhausted = true;
        let limit = self.max_depth;
        if let Some(sink) = self.sink.as_mut() {
            sink.output.push(depth_limit_entry(&sink.prefix, limit));
        }
    }

    fn step(&mut self, expr: &Expr) -> bool {
        match expr {
            Expr::Const(b) => *b,
            Expr::Is(check, v) => self.resolve(v).check(*check),
            Expr::Not(inner) => {
                let mark = self.mark();
                let result = !self.eval(inner);
                self.rollback(mark);
                result
            }
            Expr::And(items) => {
                for item in items {
                    if !self.eval(item) {
                        return false;
                    }
                }
                true
            }
            Expr::Or(items) => {
                let mark = self.mark();
                for item in items {
                    if self.eval(item) {
                        self.rollback(mark);
                        return true;
                    }
                }
                false
            }
            Expr::Equals(v, literal) => self.resolve(v).equals(literal),
            Expr::Compare(v, op, rhs) => self
                .resolve(v)
                .as_number()
                .is_some_and(|n| op.test(n, *rhs)),
            Expr::MultipleOf(v, divisor) => self
                .resolve(v)
                .as_number()
                .is_some_and(|n| n % divisor == 0.0),
            Expr::Text(v, op, operand) => {
                let value = self.resolve(v);
                value.as_str().is_some_and(|s| match op {
                    TextOp::Equal => s == operand,
                    TextOp::Contains => s.contains(operand.as_str()),
                    TextOp::StartsWith => s.starts_with(operand.as_str()),
                    TextOp::EndsWith => s.ends_with(operand.as_str()),
                })
            }
            Expr::Matches(v, pattern) => {
                let value = self.resolve(v);
                value.as_str().is_some_and(|s| pattern.is_match(s))
            }
            Expr::OnlyKeys(v, keys) => match self.resolve(v).json() {
                Some(JsonValue::Object(map)) => map.keys().all(|k| keys.contains(k)),
                _ => false,
            },
            Expr::Call {
                name,
                subject,
                path,
            } => self.call(name, subject, path.as_ref()),
            Expr::ForEach {
                subject,
                slot,
                body,
            } => self.each_item(subject, *slot, body),
            Expr::ForIn {
                subject,
                slot,
                body,
            } => self.each_entry(subject, *slot, body),
            Expr::Switch {
                slot,
                cases,
                default,
            } => {
                let key = self
                    .bindings
                    .get(*slot)
                    .and_then(|b| b.as_ref())
                    .and_then(|b| b.key);
                match key.and_then(|k| cases.iter().find(|(case, _)| case == k)) {
                    Some((_, body)) => self.eval(body),
                    None => self.eval(default),
                }
            }
            Expr::If {
                cond,
                then,
                otherwise,
            } => {
                let mark = self.mark();
                let holds = self.eval(cond);
                self.rollback(mark);
                if holds {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Trace { cond, path } => {
                let holds = cond.as_deref().is_some_and(|c| self.eval(c));
                if !holds {
                    self.record(path);
                }
                holds
            }
        }
    }

    fn resolve(&self, operand: &Operand) -> Resolved<'v> {
        match operand {
            Operand::Entry => self.entry.clone(),
            Operand::Var(slot) => self
                .bindings
                .get(*slot)
                .and_then(|b| b.as_ref())
                .map_or(Resolved::Missing, |b| b.value.clone()),
            Operand::Field(of, key) => match self.resolve(of).json() {
                Some(JsonValue::Object(map)) => Resolved::from_option(map.get(key)),
                _ => Resolved::Missing,
            },
            Operand::Index(of, index) => self
                .resolve(of)
                .as_items()
                .and_then(|items| items.get(*index))
                .map_or(Resolved::Missing, Resolved::Json),
            Operand::Slice { of, from, to } => match self.resolve(of).as_items() {
                Some(items) => {
                    let end = to.map_or(items.len(), |to| to.min(items.len()));
                    let start = (*from).min(end);
                    Resolved::Items(&items[start..end])
                }
                None => Resolved::Missing,
            },
            Operand::Length(of) => self
                .resolve(of)
                .length()
                .map_or(Resolved::Missing, Resolved::Number),
            Operand::LowerCase(of) => self
                .resolve(of)
                .as_str()
                .map_or(Resolved::Missing, |s| Resolved::Text(s.to_lowercase())),
            Operand::ToNumber(of) => self
                .resolve(of)
                .to_number()
                .map_or(Resolved::Missing, Resolved::Number),
        }
    }

    fn each_item(&mut self, subject: &Operand, slot: usize, body: &Expr) -> bool {
        let Some(items) = self.resolve(subject).as_items() else {
            return false;
        };
        let saved = self.binding(slot);
        let mut passed = true;
        for (index, item) in items.iter().enumerate() {
            self.bind(
                slot,
                Binding {
                    value: Resolved::Json(item),
                    index,
                    key: None,
                },
            );
            if !self.eval(body) {
                passed = false;
                break;
            }
        }
        self.restore(slot, saved);
        passed
    }

    fn each_entry(&mut self, subject: &Operand, slot: usize, body: &Expr) -> bool {
        let Some(JsonValue::Object(map)) = self.resolve(subject).json() else {
            return false;
        };
        let saved = self.binding(slot);
        let mut passed = true;
        for (index, (key, value)) in map.iter().enumerate() {
            self.bind(
                slot,
                Binding {
                    value: Resolved::Json(value),
                    index,
                    key: Some(key.as_str()),
                },
            );
            if !self.eval(body) {
                passed = false;
                break;
            }
        }
        self.restore(slot, saved);
        passed
    }

    fn call(&mut self, name: &str, subject: &Operand, path: Option<&TracePath>) -> bool {
        let types = self.types;
        let Some(entry) = types.get(name) else {
            return false;
        };
        let value = self.resolve(subject);
        match entry {
            TypeEntry::Native(predicate) => predicate(value.json()),
            TypeEntry::Compiled(expr) => {
                // Render before the caller's bindings are swapped out.
                let rendered = path.map(|path| self.render(path));
                let entry = std::mem::replace(&mut self.entry, value);
                let bindings = std::mem::take(&mut self.bindings);
                let muted = self.muted;
                let prefix = match rendered {
                    Some(rendered) => {
                        self.sink.as_mut().map(|sink| {
                            let extended = format!("{}{rendered}", sink.prefix);
                            std::mem::replace(&mut sink.prefix, extended)
                        })
                    }
                    None => {
                        self.muted = true;
                        None
                    }
                };
                let passed = self.eval(expr);

                if let (Some(sink), Some(prefix)) = (self.sink.as_mut(), prefix) {
                    sink.prefix = prefix;
                }
                self.muted = muted;
                self.bindings = bindings;
                self.entry = entry;
                passed
            }
        }
    }

    // -- Bindings -------------------------------------------------------------

    fn binding(&self, slot: usize) -> Option<Binding<'v>> {
        self.bindings.get(slot).cloned().flatten()
    }

    fn bind(&mut self, slot: usize, binding: Binding<'v>) {
        if self.bindings.len() <= slot {
            self.bindings.resize(slot + 1, None);
        }
        self.bindings[slot] = Some(binding);
    }

    fn restore(&mut self, slot: usize, saved: Option<Binding<'v>>) {
        if let Some(entry) = self.bindings.get_mut(slot) {
            *entry = saved;
        }
    }

    // -- Traces ---------------------------------------------------------------

    fn mark(&self) -> usize {
        self.sink.as_ref().map_or(0, |sink| sink.output.len())
    }

    fn rollback(&mut self, mark: usize) {
        if self.exhausted {
            return;
        }
        if let Some(sink) = self.sink.as_mut() {
            sink.output.truncate(mark);
        }
    }

    fn record(&mut self, path: &TracePath) {
        if self.muted || self.sink.is_none() {
            return;
        }
        let rendered = self.render(path);
        if let Some(sink) = self.sink.as_mut() {
            sink.output.push(format!("{}{rendered}", sink.prefix));
        }
    }

    /// Fill in a path's loop segments from the live bindings.
    fn render(&self, path: &TracePath) -> String {
        let mut out = String::new();
        for segment in path.segments() {
            match segment {
                TraceSegment::Field(key) => out.push_str(&format!("[{}]", quote_key(key))),
                TraceSegment::Index(i) => out.push_str(&format!("[{i}]")),
                TraceSegment::Element { slot, offset } => {
                    let index = self.binding(*slot).map_or(0, |b| b.index);
                    out.push_str(&format!("[{}]", index + offset));
                }
                TraceSegment::Key { slot } => {
                    let key = self.binding(*slot).and_then(|b| b.key).unwrap_or_default();
                    out.push_str(&format!("[{}]", quote_key(key)));
                }
            }
        }
        out
    }
}
