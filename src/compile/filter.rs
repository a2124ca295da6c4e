use super::builtin;
use super::context::Scope;
use crate::backend::Backend;
use crate::types::{format_number, Bounds, CompareOp, CompileError, Filter, FilterOp, FilterTarget};

/// Compile a `|target operator args` filter: a precondition on the kind of
/// value, then the operator applied to the measured quantity.
pub(super) fn compile<B: Backend>(
    b: &B,
    filter: &Filter,
    scope: &mut Scope<B::Value>,
) -> Result<B::Expr, CompileError> {
    let v = scope.subject.clone();
    let (precondition, measured) = match &filter.target {
        FilterTarget::Value => (b.is_number(&v), v.clone()),
        FilterTarget::Length => (b.or(vec![b.is_string(&v), b.is_array(&v)]), b.length(&v)),
        FilterTarget::ArrayLength => (b.is_array(&v), b.length(&v)),
        FilterTarget::StringLength => (b.is_string(&v), b.length(&v)),
        FilterTarget::Builtin(name) => {
            let mut child = scope.trap();
            (builtin::compile(b, name, Bounds::None, &mut child)?, v.clone())
        }
    };

    let test = match filter.op {
        FilterOp::Between(low, high) => {
            if low > high {
                return Err(CompileError::range(
                    format!("between {} {}", format_number(low), format_number(high)),
                    "lower bound is greater than upper bound",
                ));
            }
            b.and(vec![
                b.compare(&measured, CompareOp::Gte, low),
                b.compare(&measured, CompareOp::Lte, high),
            ])
        }
        FilterOp::Compare(op, rhs) => b.compare(&measured, op, rhs),
        FilterOp::TimesOf(divisor) => {
            if divisor == 0.0 {
                return Err(CompileError::range(
                    format!("timesof {}", format_number(divisor)),
                    "divisor must not be zero",
                ));
            }
            b.multiple_of(&measured, divisor)
        }
    };
    Ok(b.and(vec![precondition, test]))
}
