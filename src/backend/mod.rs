//! Code-emission backends.
//!
//! The compiler decides *what* to check; a [`Backend`] decides how each check
//! is represented. Every leaf predicate, combinator, loop and trace point the
//! compiler emits goes through one method of this trait, so the compiler never
//! builds target syntax itself.

mod tree;

pub use tree::TreeBackend;

use std::fmt;

use crate::types::{Check, CompareOp, Literal, Pattern, TextOp, TracePath};

/// Builds target expressions for the compiler.
pub trait Backend {
    /// A boolean-valued expression.
    type Expr: Clone + fmt::Debug;
    /// A reference to a runtime value.
    type Value: Clone + fmt::Debug;

    // -- Value references ---------------------------------------------------

    /// The value passed to the predicate.
    fn entry(&self) -> Self::Value;
    /// The element bound by the loop using `slot`.
    fn variable(&self, slot: usize) -> Self::Value;
    fn field(&self, of: &Self::Value, key: &str) -> Self::Value;
    fn index(&self, of: &Self::Value, index: usize) -> Self::Value;
    /// Elements `from..to` of an array; `to = None` runs to the end.
    fn slice(&self, of: &Self::Value, from: usize, to: Option<usize>) -> Self::Value;
    fn length(&self, of: &Self::Value) -> Self::Value;
    fn lower_case(&self, of: &Self::Value) -> Self::Value;
    /// The number a decimal string spells; absent for anything else.
    fn string_to_number(&self, of: &Self::Value) -> Self::Value;

    // -- Combinators --------------------------------------------------------

    fn literal(&self, value: bool) -> Self::Expr;
    fn and(&self, items: Vec<Self::Expr>) -> Self::Expr;
    fn or(&self, items: Vec<Self::Expr>) -> Self::Expr;
    fn not(&self, expr: Self::Expr) -> Self::Expr;

    // -- Kind tests ---------------------------------------------------------

    fn kind_test(&self, kind: Check, value: &Self::Value) -> Self::Expr;

    fn is_null(&self, v: &Self::Value) -> Self::Expr {
        self.kind_test(Check::Null, v)
    }

    fn is_not_null(&self, v: &Self::Value) -> Self::Expr {
        self.not(self.is_null(v))
    }

    fn is_undefined(&self, v: &Self::Value) -> Self::Expr {
        self.kind_test(Check::Undefined, v)
    }

    fn is_not_undefined(&self, v: &Self::Value) -> Self::Expr {
        self.not(self.is_undefined(v))
    }

    fn is_string(&self, v: &Self::Value) -> Self::Expr {
        self.kind_test(Check::String, v)
    }

    fn is_not_string(&self, v: &Self::Value) -> Self::Expr {
        self.not(self.is_string(v))
    }

    fn is_struct(&self, v: &Self::Value) -> Self::Expr {
        self.kind_test(Check::Struct, v)
    }

    fn is_not_struct(&self, v: &Self::Value) -> Self::Expr {
        self.not(self.is_struct(v))
    }

    fn is_integer(&self, v: &Self::Value) -> Self::Expr {
        self.kind_test(Check::Integer, v)
    }

    fn is_not_integer(&self, v: &Self::Value) -> Self::Expr {
        self.not(self.is_integer(v))
    }

    fn is_boolean(&self, v: &Self::Value) -> Self::Expr {
        self.kind_test(Check::Boolean, v)
    }

    fn is_not_boolean(&self, v: &Self::Value) -> Self::Expr {
        self.not(self.is_boolean(v))
    }

    fn is_number(&self, v: &Self::Value) -> Self::Expr {
        self.kind_test(Check::Number, v)
    }

    fn is_not_number(&self, v: &Self::Value) -> Self::Expr {
        self.not(self.is_number(v))
    }

    fn is_array(&self, v: &Self::Value) -> Self::Expr {
        self.kind_test(Check::Array, v)
    }

    fn is_not_array(&self, v: &Self::Value) -> Self::Expr {
        self.not(self.is_array(v))
    }

    fn is_truthy(&self, v: &Self::Value) -> Self::Expr {
        self.kind_test(Check::Truthy, v)
    }

    fn is_falsy(&self, v: &Self::Value) -> Self::Expr {
        self.not(self.is_truthy(v))
    }

    // -- Comparisons --------------------------------------------------------

    fn equals(&self, v: &Self::Value, literal: &Literal) -> Self::Expr;

    fn not_equals(&self, v: &Self::Value, literal: &Literal) -> Self::Expr {
        self.not(self.equals(v, literal))
    }

    fn compare(&self, v: &Self::Value, op: CompareOp, rhs: f64) -> Self::Expr;
    fn multiple_of(&self, v: &Self::Value, divisor: f64) -> Self::Expr;

    // -- Strings ------------------------------------------------------------

    fn text(&self, v: &Self::Value, op: TextOp, operand: &str) -> Self::Expr;
    fn matches(&self, v: &Self::Value, pattern: Pattern) -> Self::Expr;

    // -- Structures & types -------------------------------------------------

    /// The structure has no keys besides `keys`.
    fn only_keys(&self, v: &Self::Value, keys: Vec<String>) -> Self::Expr;
    /// Call predefined type `name` through the type table. With a trace
    /// path, the callee records failures below that path.
    fn call_type(&self, name: &str, v: &Self::Value, trace: Option<&TracePath>) -> Self::Expr;

    // -- Statements ---------------------------------------------------------

    /// `body` holds for every element of array `subject`, bound to `slot`.
    fn for_each(&self, subject: &Self::Value, slot: usize, body: Self::Expr) -> Self::Expr;
    /// `body` holds for every value of structure `subject`, bound to `slot`.
    fn for_in(&self, subject: &Self::Value, slot: usize, body: Self::Expr) -> Self::Expr;
    /// Dispatch on the current key of the key loop bound to `slot`.
    fn switch_key(
        &self,
        slot: usize,
        cases: Vec<(String, Self::Expr)>,
        default: Self::Expr,
    ) -> Self::Expr;
    fn if_then_else(&self, cond: Self::Expr, then: Self::Expr, otherwise: Self::Expr)
        -> Self::Expr;

    fn if_then(&self, cond: Self::Expr, then: Self::Expr) -> Self::Expr {
        self.if_then_else(cond, then, self.literal(true))
    }

    // -- Trace emission -----------------------------------------------------

    /// Record `path` and fail.
    fn add_trace(&self, path: &TracePath) -> Self::Expr;
    /// Evaluate `cond`; on failure record `path`.
    fn or_add_trace(&self, cond: Self::Expr, path: &TracePath) -> Self::Expr;
}
