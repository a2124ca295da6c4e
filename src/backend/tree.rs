use super::Backend;
use crate::types::{Check, CompareOp, Expr, Literal, Operand, Pattern, TextOp, TracePath};

/// Builds the [`Expr`] tree run by the evaluator.
///
/// Combinators are flattened as they are built: nested `And`/`Or` of the same
/// kind merge, identity constants drop out, and double negation cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeBackend;

fn boxed(v: &Operand) -> Box<Operand> {
    Box::new(v.clone())
}

impl Backend for TreeBackend {
    type Expr = Expr;
    type Value = Operand;

    fn entry(&self) -> Operand {
        Operand::Entry
    }

    fn variable(&self, slot: usize) -> Operand {
        Operand::Var(slot)
    }

    fn field(&self, of: &Operand, key: &str) -> Operand {
        Operand::Field(boxed(of), key.to_owned())
    }

    fn index(&self, of: &Operand, index: usize) -> Operand {
        Operand::Index(boxed(of), index)
    }

    fn slice(&self, of: &Operand, from: usize, to: Option<usize>) -> Operand {
        Operand::Slice {
            of: boxed(of),
            from,
            to,
        }
    }

    fn length(&self, of: &Operand) -> Operand {
        Operand::Length(boxed(of))
    }

    fn lower_case(&self, of: &Operand) -> Operand {
        Operand::LowerCase(boxed(of))
    }

    fn string_to_number(&self, of: &Operand) -> Operand {
        Operand::ToNumber(boxed(of))
    }

    fn literal(&self, value: bool) -> Expr {
        Expr::Const(value)
    }

    fn and(&self, items: Vec<Expr>) -> Expr {
        let mut flat = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Expr::Const(true) => {}
                Expr::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Expr::Const(true),
            1 => flat.remove(0),
            _ => Expr::And(flat),
        }
    }

    fn or(&self, items: Vec<Expr>) -> Expr {
        let mut flat = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Expr::Const(false) => {}
                Expr::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Expr::Const(false),
            1 => flat.remove(0),
            _ => Expr::Or(flat),
        }
    }

    fn not(&self, expr: Expr) -> Expr {
        match expr {
            Expr::Const(b) => Expr::Const(!b),
            Expr::Not(inner) => *inner,
            other => Expr::Not(Box::new(other)),
        }
    }

    fn kind_test(&self, kind: Check, value: &Operand) -> Expr {
        Expr::Is(kind, value.clone())
    }

    fn equals(&self, v: &Operand, literal: &Literal) -> Expr {
        Expr::Equals(v.clone(), literal.clone())
    }

    fn compare(&self, v: &Operand, op: CompareOp, rhs: f64) -> Expr {
        Expr::Compare(v.clone(), op, rhs)
    }

    fn multiple_of(&self, v: &Operand, divisor: f64) -> Expr {
        Expr::MultipleOf(v.clone(), divisor)
    }

    fn text(&self, v: &Operand, op: TextOp, operand: &str) -> Expr {
        Expr::Text(v.clone(), op, operand.to_owned())
    }

    fn matches(&self, v: &Operand, pattern: Pattern) -> Expr {
        Expr::Matches(v.clone(), pattern)
    }

    fn only_keys(&self, v: &Operand, keys: Vec<String>) -> Expr {
        Expr::OnlyKeys(v.clone(), keys)
    }

    fn call_type(&self, name: &str, v: &Operand, trace: Option<&TracePath>) -> Expr {
        Expr::Call {
            name: name.to_owned(),
            subject: v.clone(),
            path: trace.cloned(),
        }
    }

    fn for_each(&self, subject: &Operand, slot: usize, body: Expr) -> Expr {
        if body == Expr::Const(true) {
            return body;
        }
        Expr::ForEach {
            subject: subject.clone(),
            slot,
            body: Box::new(body),
        }
    }

    fn for_in(&self, subject: &Operand, slot: usize, body: Expr) -> Expr {
        if body == Expr::Const(true) {
            return body;
        }
        Expr::ForIn {
            subject: subject.clone(),
            slot,
            body: Box::new(body),
        }
    }

    fn switch_key(&self, slot: usize, cases: Vec<(String, Expr)>, default: Expr) -> Expr {
        Expr::Switch {
            slot,
            cases,
            default: Box::new(default),
        }
    }

    fn if_then_else(&self, cond: Expr, then: Expr, otherwise: Expr) -> Expr {
        match cond {
            Expr::Const(true) => then,
            Expr::Const(false) => otherwise,
            cond => Expr::If {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
        }
    }

    fn add_trace(&self, path: &TracePath) -> Expr {
        Expr::Trace {
            cond: None,
            path: path.clone(),
        }
    }

    fn or_add_trace(&self, cond: Expr, path: &TracePath) -> Expr {
        match cond {
            Expr::Const(true) => cond,
            Expr::Const(false) => self.add_trace(path),
            cond => Expr::Trace {
                cond: Some(Box::new(cond)),
                path: path.clone(),
            },
        }
    }
}
