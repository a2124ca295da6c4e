mod builtin;
mod error;
mod expr;
mod flags;
mod registry;
mod rule;
mod trace;
mod unit;
mod validation_report;
mod value;

pub use builtin::{BuiltinType, Shape};
pub use error::{CompileError, ErrorKind};
pub use expr::{Check, CompareOp, Expr, Operand, Pattern, TextOp};
pub use flags::{Flag, Flags, Strength};
pub use registry::TypeRegistry;
pub use rule::{
    Bounds, Field, Filter, FilterOp, FilterTarget, Literal, Repeat, Rule, StringAssertion,
    StringOp, Structure, TupleSlot,
};
pub use trace::{TracePath, TraceSegment};
pub use unit::{CompileOptions, CompiledUnit, TraceArguments, DEFAULT_TRACE_PREFIX};
pub use validation_report::ValidationReport;

pub(crate) use rule::format_number;
pub(crate) use trace::quote_key;
pub(crate) use value::Resolved;
