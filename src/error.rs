use thiserror::Error;

/// All fallible operations in flagtree return this error.
///
/// The variants fall into four groups, raised at different times:
///
/// - **Construction** (`Construction`, `DuplicateFlag`) — malformed trees,
///   invalid names, empty enum sets. Raised at definition time, never
///   deferred to parse time.
/// - **Validation** (`IllegalValue` and the parser variants it wraps) —
///   malformed input for a flag. Raised at parse time.
/// - **Schema** (`MissingAnnotation`, `UnsupportedType`) — raised while
///   deriving a tree from a signature. In non-strict mode these are
///   downgraded to warnings and the offending parameter is skipped.
/// - **Override denial** (`OverrideDenied`) — an attempt to set an aggregate
///   flag directly. Never suppressible, except for the reserved empty
///   sentinel used in serialize/parse round trips.
#[derive(Debug, Error)]
pub enum FlagError {
    #[error("Invalid definition: {reason}")]
    Construction { reason: String },

    #[error("Duplicate flag '{0}'")]
    DuplicateFlag(String),

    #[error("Unknown flag '{0}'")]
    UnknownFlag(String),

    #[error("Illegal value for flag '{flag}': {reason}")]
    IllegalValue { flag: String, reason: String },

    #[error("Cannot parse '{raw}' as {kind}")]
    ParseValue { kind: &'static str, raw: String },

    #[error("Value '{value}' should be one of <{allowed}>")]
    NotInEnum { value: String, allowed: String },

    #[error(
        "Empty sequences should be given explicitly as [] or () and not as an empty string"
    )]
    EmptySequenceString,

    #[error("Input should represent a list or tuple, however it evaluated as a {0}")]
    NotASequence(String),

    #[error(
        "Sequence contains unsupported type {found}; each element must be a bool, int, float or str"
    )]
    BadElementType { found: String },

    #[error("Nested sequences are not supported; sequences must be flat")]
    NestedSequence,

    #[error("{what} exceeds the maximum of {max}")]
    BoundExceeded { what: &'static str, max: usize },

    #[error("Input contains disallowed construct '{0}'")]
    SuspiciousContent(&'static str),

    #[error(
        "datetime value '{value}' uses '{separator}' as separator between date and time \
         (excluded to avoid confusion between time and offset); use another character \
         instead, e.g. '{suggestion}'"
    )]
    AmbiguousDateTimeSeparator {
        value: String,
        separator: char,
        suggestion: String,
    },

    #[error("Invalid datetime value '{value}': {reason}")]
    BadDateTime { value: String, reason: String },

    #[error("Invalid duration '{value}': {reason}")]
    BadDuration { value: String, reason: String },

    #[error("Duration '{value}' exceeds the maximum supported magnitude (~1000 years)")]
    DurationOutOfRange { value: String },

    #[error("Missing type annotation for parameter '{0}'")]
    MissingAnnotation(String),

    #[error("No matching flag type for parameter '{name}' with type annotation: {annotation}")]
    UnsupportedType { name: String, annotation: String },

    #[error(
        "Can't override flag '{name}' directly. Did you mean to override one of its \
         leaves instead? Overridable leaves: {leaves}"
    )]
    OverrideDenied { name: String, leaves: String },

    #[error("Required flags not set: {0}")]
    RequiredUnset(String),

    #[error("Failed to build value from current flags: {0}")]
    Factory(String),
}

impl FlagError {
    /// Wrap a parse-time failure in the registry's illegal-value error,
    /// preserving the original message.
    pub(crate) fn illegal_value(flag: &str, source: FlagError) -> FlagError {
        FlagError::IllegalValue {
            flag: flag.to_string(),
            reason: source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_denied_lists_leaves() {
        let err = FlagError::OverrideDenied {
            name: "cfg".into(),
            leaves: "cfg.a, cfg.b.c".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("cfg.a"));
        assert!(msg.contains("cfg.b.c"));
    }

    #[test]
    fn illegal_value_wraps_original_message() {
        let inner = FlagError::NotInEnum {
            value: "maroon".into(),
            allowed: "red|green".into(),
        };
        let err = FlagError::illegal_value("cfg.color", inner);
        let msg = err.to_string();
        assert!(msg.contains("cfg.color"));
        assert!(msg.contains("red|green"));
    }

    #[test]
    fn ambiguous_separator_suggests_alternative() {
        let err = FlagError::AmbiguousDateTimeSeparator {
            value: "1970-01-01-08:00".into(),
            separator: '-',
            suggestion: "1970-01-01T08:00".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("separator"));
        assert!(msg.contains("1970-01-01T08:00"));
    }
}
