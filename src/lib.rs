//! Compile JSON schema rules into validators.
//!
//! A rule is a JSON value: a type name string (`"uint8"`, `"?string"`,
//! `"int[1,]"`), an object describing a structure, or a `$.`-tagged array
//! modifier (`["$.tuple", "string", "int", "..."]`). The [`Compiler`] turns a
//! rule into a [`CompiledUnit`]; the [`Engine`] assembles units into
//! [`Validator`]s that check `serde_json::Value`s.
//!
//! Arguments in parentheses and array-size suffixes take `n`, `a,`, `,b` or
//! `a,b`. A single argument means a minimum for number types but an exact
//! length for strings and arrays:
//!
//! | rule          | accepts                         |
//! |---------------|---------------------------------|
//! | `int(5)`      | integers ≥ 5                    |
//! | `int(,10)`    | integers ≤ 10                   |
//! | `string(5)`   | strings of exactly 5 characters |
//! | `string(,8)`  | strings of at most 8 characters |
//! | `int[2,]`     | integer arrays of length ≥ 2    |

mod backend;
mod compile;
mod engine;
mod error;
mod evaluate;
pub mod parse;
#[cfg(feature = "binary-cache")]
mod serial;
mod types;

pub use backend::{Backend, TreeBackend};
pub use compile::{Compiler, CompilerBuilder};
pub use engine::{Engine, Validator};
pub use error::RuleguardError;
pub use evaluate::NativeType;
#[cfg(feature = "binary-cache")]
pub use serial::{DeserializeError, SerializeError};
pub use types::{
    Bounds, BuiltinType, Check, CompareOp, CompileError, CompileOptions, CompiledUnit, ErrorKind,
    Expr, Field, Filter, FilterOp, FilterTarget, Flag, Flags, Literal, Operand, Pattern, Repeat,
    Rule, Shape, Strength, StringAssertion, StringOp, Structure, TextOp, TraceArguments,
    TracePath, TraceSegment, TupleSlot, TypeRegistry, ValidationReport, DEFAULT_TRACE_PREFIX,
};
