mod grammar;
mod parser;
mod structure;

pub(crate) use grammar::is_type_name;
pub(crate) use parser::{length_bounds, Parser};

use serde_json::Value as JsonValue;

use crate::types::{CompileError, Rule};

/// Default nesting limit for [`parse`].
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Parse a JSON rule into a [`Rule`] tree.
///
/// # Errors
///
/// Returns [`CompileError`] if the rule is not valid schema syntax.
pub fn parse(rule: &JsonValue) -> Result<Rule, CompileError> {
    Parser::new(DEFAULT_MAX_DEPTH).rule(rule, 0)
}
