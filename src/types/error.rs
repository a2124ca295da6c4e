use thiserror::Error;

/// The three classes of compile-time failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed rule syntax.
    Grammar,
    /// Numeric arguments out of range or out of order.
    Range,
    /// A well-formed rule that contradicts itself or the registry.
    Semantic,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unknown type schema '{rule}'")]
    UnknownType { rule: String },

    #[error("unknown modifier '{tag}'")]
    UnknownModifier { tag: String },

    #[error("unsupported rule value: {value}")]
    UnsupportedRule { value: String },

    #[error("modifier '{modifier}' {reason}")]
    InvalidOperands {
        modifier: &'static str,
        reason: String,
    },

    #[error("invalid tuple: {reason}")]
    InvalidTuple { reason: String },

    #[error("invalid filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("filter operator '{operator}' expects {expected} argument(s), got {found}")]
    FilterArgumentCount {
        operator: String,
        expected: usize,
        found: usize,
    },

    #[error("type '{name}' does not take arguments")]
    UnexpectedArguments { name: String },

    #[error("invalid regular expression '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("structure may declare at most one rest pattern key")]
    MultipleRestKeys,

    #[error("{context}: {reason}")]
    Range {
        context: String,
        reason: &'static str,
    },

    #[error("can not use \"{flag}\" together with \"{conflict}\" on the same value")]
    FlagConflict {
        flag: &'static str,
        conflict: &'static str,
    },

    #[error("predefined type '{name}' is already defined")]
    DuplicateType { name: String },

    #[error("invalid predefined type name '{name}'")]
    InvalidTypeName { name: String },

    #[error("modifier '{modifier}' requires at least one candidate")]
    EmptyCandidates { modifier: &'static str },

    #[error("'{value}' is not a valid $.enum candidate")]
    InvalidEnumValue { value: String },

    #[error("rule nesting exceeds the depth limit of {limit}")]
    DepthLimitExceeded { limit: usize },
}

impl CompileError {
    /// Which class of failure this is.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::UnknownType { .. }
            | CompileError::UnknownModifier { .. }
            | CompileError::UnsupportedRule { .. }
            | CompileError::InvalidOperands { .. }
            | CompileError::InvalidTuple { .. }
            | CompileError::InvalidFilter { .. }
            | CompileError::FilterArgumentCount { .. }
            | CompileError::UnexpectedArguments { .. }
            | CompileError::InvalidRegex { .. }
            | CompileError::MultipleRestKeys => ErrorKind::Grammar,
            CompileError::Range { .. } => ErrorKind::Range,
            CompileError::FlagConflict { .. }
            | CompileError::DuplicateType { .. }
            | CompileError::InvalidTypeName { .. }
            | CompileError::EmptyCandidates { .. }
            | CompileError::InvalidEnumValue { .. }
            | CompileError::DepthLimitExceeded { .. } => ErrorKind::Semantic,
        }
    }

    pub(crate) fn range(context: impl Into<String>, reason: &'static str) -> Self {
        CompileError::Range {
            context: context.into(),
            reason,
        }
    }

    pub(crate) fn operands(modifier: &'static str, reason: impl Into<String>) -> Self {
        CompileError::InvalidOperands {
            modifier,
            reason: reason.into(),
        }
    }

    pub(crate) fn tuple(reason: impl Into<String>) -> Self {
        CompileError::InvalidTuple {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_message() {
        let err = CompileError::UnknownType {
            rule: "strng".into(),
        };
        assert_eq!(err.to_string(), "unknown type schema 'strng'");
        assert_eq!(err.kind(), ErrorKind::Grammar);
    }

    #[test]
    fn duplicate_type_message() {
        let err = CompileError::DuplicateType {
            name: "node".into(),
        };
        assert_eq!(err.to_string(), "predefined type 'node' is already defined");
        assert_eq!(err.kind(), ErrorKind::Semantic);
    }

    #[test]
    fn range_message() {
        let err = CompileError::range("decimal(2,3)", "fractional digits exceed total digits");
        assert_eq!(
            err.to_string(),
            "decimal(2,3): fractional digits exceed total digits"
        );
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn filter_argument_count_message() {
        let err = CompileError::FilterArgumentCount {
            operator: "between".into(),
            expected: 2,
            found: 1,
        };
        assert_eq!(
            err.to_string(),
            "filter operator 'between' expects 2 argument(s), got 1"
        );
    }

    #[test]
    fn flag_conflict_message() {
        let err = CompileError::FlagConflict {
            flag: "optional",
            conflict: "required",
        };
        assert_eq!(
            err.to_string(),
            "can not use \"optional\" together with \"required\" on the same value"
        );
    }

    #[test]
    fn depth_limit_is_semantic() {
        let err = CompileError::DepthLimitExceeded { limit: 8 };
        assert_eq!(err.kind(), ErrorKind::Semantic);
        assert_eq!(err.to_string(), "rule nesting exceeds the depth limit of 8");
    }
}
