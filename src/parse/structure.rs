use serde_json::{Map, Value as JsonValue};

use super::grammar;
use super::parser::{length_bounds, split_size_suffix, Parser};
use crate::types::{Bounds, CompileError, Field, Rule, Structure};

/// The key that carries a structure's rest pattern.
pub(crate) const REST_KEY: &str = "$.map";

/// Parse an object rule into a [`Structure`], decoding key sigils.
pub(crate) fn parse(
    parser: &Parser,
    map: &Map<String, JsonValue>,
    depth: usize,
) -> Result<Structure, CompileError> {
    let mut fields = Vec::with_capacity(map.len());
    let mut rest = None;
    for (raw_key, value) in map {
        let value = parser.rule(value, depth + 1)?;
        let (key, rule) = decode_key(raw_key, value)?;
        if key == REST_KEY {
            if rest.is_some() {
                return Err(CompileError::MultipleRestKeys);
            }
            rest = Some(Box::new(rule));
        } else {
            fields.push(Field { key, rule });
        }
    }
    Ok(Structure { fields, rest })
}

/// Strip the sigils off `raw_key` and wrap `rule` accordingly.
///
/// The optional marker is read first, then at most one of `->[]`, `->{}`,
/// `->()`, `->(=)` or a sized `->[a,b]`. So `a->[2]?` is an optional sized
/// array while the `?` in `a?->[2]` stays part of the key.
pub(crate) fn decode_key(raw_key: &str, rule: Rule) -> Result<(String, Rule), CompileError> {
    let (key, optional) = match raw_key.strip_suffix('?') {
        Some(key) => (key, true),
        None => (raw_key, false),
    };
    let (key, rule) = if let Some(key) = key.strip_suffix("->[]") {
        (key, Rule::List(Box::new(rule)))
    } else if let Some(key) = key.strip_suffix("->{}") {
        (key, Rule::Map(Box::new(rule)))
    } else if let Some(key) = key.strip_suffix("->()") {
        (key, Rule::Strict(Some(Box::new(rule))))
    } else if let Some(key) = key.strip_suffix("->(=)") {
        (key, Rule::Equal(Some(Box::new(rule))))
    } else if let Some((key, bounds)) = sized_suffix(key) {
        let length = length_bounds(bounds, raw_key)?;
        (key, sized(length, rule))
    } else {
        (key, rule)
    };
    let rule = if optional {
        Rule::Or(vec![Rule::builtin("void"), rule])
    } else {
        rule
    };
    Ok((key.to_owned(), rule))
}

fn sized_suffix(key: &str) -> Option<(&str, Bounds)> {
    let (prefix, inside) = split_size_suffix(key)?;
    let key = prefix.strip_suffix("->")?;
    grammar::size_suffix(inside)
        .filter(|b| !b.is_none())
        .map(|b| (key, b))
}

fn sized(length: Bounds, rule: Rule) -> Rule {
    match length {
        Bounds::None => Rule::List(Box::new(rule)),
        length => Rule::Array {
            length,
            element: Box::new(rule),
        },
    }
}
