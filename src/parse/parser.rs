use serde_json::Value as JsonValue;

use super::grammar;
use super::structure;
use crate::types::{
    Bounds, BuiltinType, CompileError, Literal, Repeat, Rule, TupleSlot,
};

/// Walks a JSON rule into a [`Rule`] tree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Parser {
    max_depth: usize,
}

impl Parser {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub(crate) fn rule(&self, rule: &JsonValue, depth: usize) -> Result<Rule, CompileError> {
        if depth > self.max_depth {
            return Err(CompileError::DepthLimitExceeded {
                limit: self.max_depth,
            });
        }
        match rule {
            JsonValue::String(text) => self.string(text, depth),
            JsonValue::Array(items) => self.array(items, depth),
            JsonValue::Object(map) => structure::parse(self, map, depth).map(Rule::Struct),
            scalar => Literal::from_json(scalar)
                .map(Rule::Literal)
                .ok_or_else(|| CompileError::UnsupportedRule {
                    value: scalar.to_string(),
                }),
        }
    }

    // -- String rules -------------------------------------------------------

    fn string(&self, text: &str, depth: usize) -> Result<Rule, CompileError> {
        if depth > self.max_depth {
            return Err(CompileError::DepthLimitExceeded {
                limit: self.max_depth,
            });
        }
        if let Some(assertion) = grammar::string_assertion(text) {
            return Ok(Rule::Assert(assertion));
        }
        if let Some(rest) = text.strip_prefix('?') {
            let inner = self.string(rest, depth + 1)?;
            return Ok(Rule::Or(vec![Rule::builtin("void"), inner]));
        }
        if let Some(rest) = text.strip_prefix('!') {
            let inner = self.string(rest, depth + 1)?;
            return Ok(Rule::Not(Box::new(inner)));
        }
        if let Some((prefix, inside)) = split_size_suffix(text) {
            let bounds = grammar::size_suffix(inside).ok_or_else(|| CompileError::UnknownType {
                rule: text.to_owned(),
            })?;
            let element = Box::new(self.string(prefix, depth + 1)?);
            return Ok(match length_bounds(bounds, text)? {
                Bounds::None => Rule::List(element),
                length => Rule::Array { length, element },
            });
        }
        if let Some(prefix) = text.strip_suffix("{}") {
            let value = self.string(prefix, depth + 1)?;
            return Ok(Rule::Map(Box::new(value)));
        }
        if let Some(name) = text.strip_prefix('@') {
            if !grammar::is_type_name(name) {
                return Err(CompileError::InvalidTypeName {
                    name: name.to_owned(),
                });
            }
            return Ok(Rule::Reference(name.to_owned()));
        }
        if let Some((name, bounds)) = grammar::builtin_call(text) {
            let builtin = BuiltinType::lookup(name).ok_or_else(|| CompileError::UnknownType {
                rule: text.to_owned(),
            })?;
            if !bounds.is_none() && !builtin.takes_arguments() {
                return Err(CompileError::UnexpectedArguments {
                    name: name.to_owned(),
                });
            }
            return Ok(Rule::Builtin {
                name: builtin.name.to_owned(),
                bounds,
            });
        }
        if text.starts_with('|') {
            return grammar::filter(text).map(Rule::Filter);
        }
        Err(CompileError::UnknownType {
            rule: text.to_owned(),
        })
    }

    // -- Array rules --------------------------------------------------------

    /// An array rule: a modifier invocation, a single wrapped rule, or an
    /// implicit union.
    pub(crate) fn array(&self, items: &[JsonValue], depth: usize) -> Result<Rule, CompileError> {
        if depth > self.max_depth {
            return Err(CompileError::DepthLimitExceeded {
                limit: self.max_depth,
            });
        }
        match items {
            [] => Err(CompileError::EmptyCandidates { modifier: "$.or" }),
            [JsonValue::String(tag), operands @ ..] if tag.starts_with("$.") => {
                self.modifier(tag, operands, depth)
            }
            [single] => self.rule(single, depth + 1),
            candidates => self.each(candidates, depth).map(Rule::Or),
        }
    }

    fn each(&self, items: &[JsonValue], depth: usize) -> Result<Vec<Rule>, CompileError> {
        items
            .iter()
            .map(|item| self.rule(item, depth + 1))
            .collect()
    }

    /// The operands after a tag, read as one rule.
    fn operand(
        &self,
        modifier: &'static str,
        operands: &[JsonValue],
        depth: usize,
    ) -> Result<Rule, CompileError> {
        if operands.is_empty() {
            return Err(CompileError::operands(modifier, "requires an operand"));
        }
        self.array(operands, depth + 1)
    }

    fn optional_operand(
        &self,
        operands: &[JsonValue],
        depth: usize,
    ) -> Result<Option<Box<Rule>>, CompileError> {
        if operands.is_empty() {
            return Ok(None);
        }
        self.array(operands, depth + 1).map(|r| Some(Box::new(r)))
    }

    fn modifier(
        &self,
        tag: &str,
        operands: &[JsonValue],
        depth: usize,
    ) -> Result<Rule, CompileError> {
        match tag {
            "$.not" => Ok(Rule::Not(Box::new(self.operand("$.not", operands, depth)?))),
            "$.or" => {
                if operands.is_empty() {
                    return Err(CompileError::EmptyCandidates { modifier: "$.or" });
                }
                self.each(operands, depth).map(Rule::Or)
            }
            "$.and" => {
                if operands.is_empty() {
                    return Err(CompileError::EmptyCandidates { modifier: "$.and" });
                }
                self.each(operands, depth).map(Rule::And)
            }
            "$.string" => self.optional_operand(operands, depth).map(Rule::FromString),
            "$.strict" => self.optional_operand(operands, depth).map(Rule::Strict),
            "$.equal" => self.optional_operand(operands, depth).map(Rule::Equal),
            "$.list" => {
                let element = self.operand("$.list", operands, depth)?;
                Ok(Rule::List(Box::new(element)))
            }
            "$.map" => {
                let value = self.operand("$.map", operands, depth)?;
                Ok(Rule::Map(Box::new(value)))
            }
            "$.array" => self.sized_array(operands, depth),
            "$.tuple" => self.tuple(operands, depth),
            "$.dict" => self.dict(operands, depth),
            "$.type" => self.named_type(operands, depth),
            "$.enum" => enumeration(operands),
            other => Err(CompileError::UnknownModifier {
                tag: other.to_owned(),
            }),
        }
    }

    fn sized_array(&self, operands: &[JsonValue], depth: usize) -> Result<Rule, CompileError> {
        let Some((length, rest)) = operands.split_first() else {
            return Err(CompileError::operands("$.array", "requires a length"));
        };
        let bounds = match length {
            JsonValue::Number(n) => Bounds::Exact(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::Array(range) => match range.as_slice() {
                [min] => Bounds::AtLeast(json_number("$.array", min)?),
                [min, max] => Bounds::Between(
                    json_number("$.array", min)?,
                    json_number("$.array", max)?,
                ),
                _ => {
                    return Err(CompileError::operands(
                        "$.array",
                        "length range must be [min] or [min, max]",
                    ))
                }
            },
            _ => {
                return Err(CompileError::operands(
                    "$.array",
                    "length must be a number or a [min, max] range",
                ))
            }
        };
        let length = length_bounds(bounds, "$.array")?;
        let element = self.operand("$.array", rest, depth)?;
        Ok(Rule::Array {
            length,
            element: Box::new(element),
        })
    }

    fn tuple(&self, operands: &[JsonValue], depth: usize) -> Result<Rule, CompileError> {
        let mut slots: Vec<TupleSlot> = Vec::with_capacity(operands.len());
        for operand in operands {
            if let Some(repeat) = ellipsis(operand)? {
                let Some(last) = slots.last_mut() else {
                    return Err(CompileError::tuple("ellipsis can not be the first element"));
                };
                if last.repeat != Repeat::Once {
                    return Err(CompileError::tuple("ellipsis must follow a type"));
                }
                last.repeat = repeat;
                continue;
            }
            if slots.last().is_some_and(|s| s.repeat == Repeat::Unlimited) {
                return Err(CompileError::tuple(
                    "unlimited ellipsis must be the last element",
                ));
            }
            slots.push(TupleSlot {
                rule: self.rule(operand, depth + 1)?,
                repeat: Repeat::Once,
            });
        }
        Ok(Rule::Tuple(slots))
    }

    fn dict(&self, operands: &[JsonValue], depth: usize) -> Result<Rule, CompileError> {
        let Some((keys, rest)) = operands.split_first() else {
            return Err(CompileError::operands("$.dict", "requires a key list"));
        };
        let JsonValue::Array(keys) = keys else {
            return Err(CompileError::operands("$.dict", "key list must be an array"));
        };
        if keys.is_empty() {
            return Err(CompileError::EmptyCandidates { modifier: "$.dict" });
        }
        let keys = keys
            .iter()
            .map(|k| match k {
                JsonValue::String(s) => Ok(s.clone()),
                _ => Err(CompileError::operands("$.dict", "keys must be strings")),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let value = self.operand("$.dict", rest, depth)?;
        Ok(Rule::Dict {
            keys,
            value: Box::new(value),
        })
    }

    fn named_type(&self, operands: &[JsonValue], depth: usize) -> Result<Rule, CompileError> {
        let Some((name, rest)) = operands.split_first() else {
            return Err(CompileError::operands("$.type", "requires a name"));
        };
        let JsonValue::String(name) = name else {
            return Err(CompileError::InvalidTypeName {
                name: name.to_string(),
            });
        };
        if !grammar::is_type_name(name) {
            return Err(CompileError::InvalidTypeName { name: name.clone() });
        }
        let rule = self.operand("$.type", rest, depth)?;
        Ok(Rule::Type {
            name: name.clone(),
            rule: Box::new(rule),
        })
    }
}

fn enumeration(operands: &[JsonValue]) -> Result<Rule, CompileError> {
    if operands.is_empty() {
        return Err(CompileError::EmptyCandidates { modifier: "$.enum" });
    }
    operands
        .iter()
        .map(|v| {
            Literal::from_json(v).ok_or_else(|| CompileError::InvalidEnumValue {
                value: v.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Rule::Enum)
}

fn json_number(modifier: &'static str, value: &JsonValue) -> Result<f64, CompileError> {
    value
        .as_f64()
        .ok_or_else(|| CompileError::operands(modifier, "length bounds must be numbers"))
}

/// `...` or `...N` inside a tuple; `None` for any other operand.
fn ellipsis(operand: &JsonValue) -> Result<Option<Repeat>, CompileError> {
    let Some(count) = operand.as_str().and_then(|s| s.strip_prefix("...")) else {
        return Ok(None);
    };
    if count.is_empty() {
        return Ok(Some(Repeat::Unlimited));
    }
    match count.parse::<usize>() {
        Ok(0) => Err(CompileError::tuple("ellipsis count must be positive")),
        Ok(n) => Ok(Some(Repeat::Exactly(n))),
        Err(_) => Err(CompileError::tuple(format!(
            "'...{count}' is not a valid ellipsis"
        ))),
    }
}

/// Split `prefix[inside]` at the last opening bracket.
pub(crate) fn split_size_suffix(text: &str) -> Option<(&str, &str)> {
    let body = text.strip_suffix(']')?;
    let open = body.rfind('[')?;
    Some((&body[..open], &body[open + 1..]))
}

/// Validate array-length bounds: non-negative integers, ordered. Equal
/// bounds collapse to an exact length.
pub(crate) fn length_bounds(bounds: Bounds, context: &str) -> Result<Bounds, CompileError> {
    let check = |n: f64| {
        if n.is_finite() && n >= 0.0 && n.fract() == 0.0 {
            Ok(n)
        } else {
            Err(CompileError::range(
                context,
                "array length must be a non-negative integer",
            ))
        }
    };
    Ok(match bounds {
        Bounds::None => Bounds::None,
        Bounds::Exact(n) => Bounds::Exact(check(n)?),
        Bounds::AtLeast(n) => Bounds::AtLeast(check(n)?),
        Bounds::AtMost(n) => Bounds::AtMost(check(n)?),
        Bounds::Between(a, b) => {
            let (a, b) = (check(a)?, check(b)?);
            if a > b {
                return Err(CompileError::range(
                    context,
                    "minimum length is greater than maximum",
                ));
            }
            if a == b {
                Bounds::Exact(a)
            } else {
                Bounds::Between(a, b)
            }
        }
    })
}
