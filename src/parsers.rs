//! Value parsers: the single validation gate for every flag value.
//!
//! A parser accepts a raw [`Value`] — a string when the value arrives from
//! the command line, or an already-typed value when supplied by calling
//! code — and returns the validated internal value. Item construction,
//! programmatic assignment, and command-line parsing all funnel through the
//! same `parse` call, so there is exactly one place where a given kind of
//! value can be malformed.

use std::rc::Rc;

use crate::error::FlagError;
use crate::literal;
use crate::value::Value;

/// Converts a raw external representation into a validated internal value.
pub trait ArgParser {
    fn parse(&self, raw: &Value) -> Result<Value, FlagError>;

    /// The kind name shown in help and error messages.
    fn flag_type(&self) -> &'static str;
}

/// Maps a typed value back to its raw string form.
pub trait ArgSerializer {
    fn serialize(&self, value: &Value) -> String;
}

/// Renders values through their canonical `Display` form.
pub struct DefaultSerializer;

impl ArgSerializer for DefaultSerializer {
    fn serialize(&self, value: &Value) -> String {
        value.to_string()
    }
}

/// Renders a sequence as comma-separated plain strings (`a,b,c`), the
/// round-trip form of CSV string-list flags.
pub struct CsvSerializer;

impl ArgSerializer for CsvSerializer {
    fn serialize(&self, value: &Value) -> String {
        match value {
            Value::Seq(items) => items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
            other => other.to_string(),
        }
    }
}

pub struct BoolParser;

impl ArgParser for BoolParser {
    fn parse(&self, raw: &Value) -> Result<Value, FlagError> {
        match raw {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::Int(0) => Ok(Value::Bool(false)),
            Value::Int(1) => Ok(Value::Bool(true)),
            Value::Str(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Value::Bool(true)),
                "false" | "f" | "0" => Ok(Value::Bool(false)),
                _ => Err(FlagError::ParseValue {
                    kind: "bool",
                    raw: s.clone(),
                }),
            },
            other => Err(FlagError::ParseValue {
                kind: "bool",
                raw: other.to_string(),
            }),
        }
    }

    fn flag_type(&self) -> &'static str {
        "bool"
    }
}

pub struct IntParser;

impl ArgParser for IntParser {
    fn parse(&self, raw: &Value) -> Result<Value, FlagError> {
        match raw {
            Value::Int(i) => Ok(Value::Int(*i)),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(Value::Int(*f as i64)),
            Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
                FlagError::ParseValue {
                    kind: "int",
                    raw: s.clone(),
                }
            }),
            other => Err(FlagError::ParseValue {
                kind: "int",
                raw: other.to_string(),
            }),
        }
    }

    fn flag_type(&self) -> &'static str {
        "int"
    }
}

pub struct FloatParser;

impl ArgParser for FloatParser {
    fn parse(&self, raw: &Value) -> Result<Value, FlagError> {
        match raw {
            Value::Float(f) => Ok(Value::Float(*f)),
            Value::Int(i) => Ok(Value::Float(*i as f64)),
            Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                FlagError::ParseValue {
                    kind: "float",
                    raw: s.clone(),
                }
            }),
            other => Err(FlagError::ParseValue {
                kind: "float",
                raw: other.to_string(),
            }),
        }
    }

    fn flag_type(&self) -> &'static str {
        "float"
    }
}

pub struct StringParser;

impl ArgParser for StringParser {
    fn parse(&self, raw: &Value) -> Result<Value, FlagError> {
        match raw {
            Value::Str(s) => Ok(Value::Str(s.clone())),
            Value::Bool(_) | Value::Int(_) | Value::Float(_) => Ok(Value::Str(raw.to_string())),
            other => Err(FlagError::ParseValue {
                kind: "string",
                raw: other.to_string(),
            }),
        }
    }

    fn flag_type(&self) -> &'static str {
        "string"
    }
}

/// Membership in a fixed set of allowed strings.
///
/// Case-insensitive matches canonicalize to the configured spelling, so the
/// stored value is always one of `values` exactly.
pub struct EnumParser {
    values: Vec<String>,
    case_sensitive: bool,
}

impl EnumParser {
    pub fn new(values: &[&str], case_sensitive: bool) -> Result<Self, FlagError> {
        if values.is_empty() {
            return Err(FlagError::Construction {
                reason: "enum values cannot be empty".to_string(),
            });
        }
        if values.iter().any(|v| v.is_empty()) {
            return Err(FlagError::Construction {
                reason: "no element of enum values can be empty".to_string(),
            });
        }
        Ok(Self {
            values: values.iter().map(|v| v.to_string()).collect(),
            case_sensitive,
        })
    }

    fn allowed(&self) -> String {
        self.values.join("|")
    }
}

impl ArgParser for EnumParser {
    fn parse(&self, raw: &Value) -> Result<Value, FlagError> {
        let Value::Str(s) = raw else {
            return Err(FlagError::NotInEnum {
                value: raw.to_string(),
                allowed: self.allowed(),
            });
        };
        let found = if self.case_sensitive {
            self.values.iter().find(|v| *v == s)
        } else {
            self.values.iter().find(|v| v.eq_ignore_ascii_case(s))
        };
        match found {
            Some(canonical) => Ok(Value::Str(canonical.clone())),
            None => Err(FlagError::NotInEnum {
                value: s.clone(),
                allowed: self.allowed(),
            }),
        }
    }

    fn flag_type(&self) -> &'static str {
        "enum"
    }
}

/// A Rust enum usable as a flag value.
///
/// Implement this for a fieldless enum to get member-name parsing through
/// [`EnumClassParser`]. The stored `Value` is the canonical variant name.
pub trait FlagEnum {
    /// The canonical member names, in declaration order.
    const VARIANTS: &'static [&'static str];

    fn flag_name(&self) -> &'static str;

    fn from_flag_name(name: &str) -> Option<Self>
    where
        Self: Sized;
}

/// Parses the name of a member of a [`FlagEnum`]. Case-insensitive by
/// default, matching the behaviour of enum-class flags in the wild.
pub struct EnumClassParser {
    variants: &'static [&'static str],
    case_sensitive: bool,
}

impl EnumClassParser {
    pub fn new<E: FlagEnum>() -> Result<Self, FlagError> {
        Self::with_case_sensitivity::<E>(false)
    }

    pub fn with_case_sensitivity<E: FlagEnum>(case_sensitive: bool) -> Result<Self, FlagError> {
        if E::VARIANTS.is_empty() {
            return Err(FlagError::Construction {
                reason: "enum class has no variants".to_string(),
            });
        }
        Ok(Self {
            variants: E::VARIANTS,
            case_sensitive,
        })
    }
}

impl ArgParser for EnumClassParser {
    fn parse(&self, raw: &Value) -> Result<Value, FlagError> {
        let allowed = || self.variants.join("|");
        let Value::Str(s) = raw else {
            return Err(FlagError::NotInEnum {
                value: raw.to_string(),
                allowed: allowed(),
            });
        };
        let found = if self.case_sensitive {
            self.variants.iter().find(|v| *v == s)
        } else {
            self.variants.iter().find(|v| v.eq_ignore_ascii_case(s))
        };
        match found {
            Some(canonical) => Ok(Value::Str((*canonical).to_string())),
            None => Err(FlagError::NotInEnum {
                value: s.clone(),
                allowed: allowed(),
            }),
        }
    }

    fn flag_type(&self) -> &'static str {
        "enum class"
    }
}

fn check_flat_scalar(element: &Value) -> Result<(), FlagError> {
    match element {
        Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) => Ok(()),
        Value::Seq(_) => Err(FlagError::NestedSequence),
        other => Err(FlagError::BadElementType {
            found: other.type_name().to_string(),
        }),
    }
}

/// Flat sequences of simple scalars.
///
/// `None` parses to the empty sequence; an already-typed sequence is
/// validated in place; a string goes through [`literal::parse_sequence`].
pub struct SequenceParser;

impl ArgParser for SequenceParser {
    fn parse(&self, raw: &Value) -> Result<Value, FlagError> {
        let items = match raw {
            Value::None => Vec::new(),
            Value::Seq(items) => {
                for item in items {
                    check_flat_scalar(item)?;
                }
                items.clone()
            }
            Value::Str(s) => literal::parse_sequence(s)?,
            other => return Err(FlagError::NotASequence(other.type_name().to_string())),
        };
        Ok(Value::Seq(items))
    }

    fn flag_type(&self) -> &'static str {
        "sequence"
    }
}

/// Sequence parsing plus membership: every element must be one of a fixed
/// collection of allowed values of any scalar kind.
pub struct MultiEnumParser {
    allowed: Vec<Value>,
}

impl MultiEnumParser {
    pub fn new(allowed: Vec<Value>) -> Result<Self, FlagError> {
        if allowed.is_empty() {
            return Err(FlagError::Construction {
                reason: "enum values cannot be empty".to_string(),
            });
        }
        if allowed.iter().any(|v| matches!(v, Value::Str(s) if s.is_empty())) {
            return Err(FlagError::Construction {
                reason: "no element of enum values can be empty".to_string(),
            });
        }
        Ok(Self { allowed })
    }

    fn allowed_list(&self) -> String {
        self.allowed
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl ArgParser for MultiEnumParser {
    fn parse(&self, raw: &Value) -> Result<Value, FlagError> {
        let items = match raw {
            Value::None => Vec::new(),
            Value::Seq(items) => items.clone(),
            Value::Str(s) => literal::parse_sequence(s)?,
            other => return Err(FlagError::NotASequence(other.type_name().to_string())),
        };
        for item in &items {
            if !self.allowed.contains(item) {
                return Err(FlagError::NotInEnum {
                    value: item.to_string(),
                    allowed: self.allowed_list(),
                });
            }
        }
        Ok(Value::Seq(items))
    }

    fn flag_type(&self) -> &'static str {
        "multi enum"
    }
}

/// Membership of a single value in a fixed collection. This is the
/// per-occurrence parser behind multi-valued enumeration flags, where each
/// command-line occurrence supplies one element.
pub struct MemberParser {
    allowed: Vec<Value>,
}

impl MemberParser {
    pub fn new(allowed: Vec<Value>) -> Result<Self, FlagError> {
        if allowed.is_empty() {
            return Err(FlagError::Construction {
                reason: "enum values cannot be empty".to_string(),
            });
        }
        if allowed.iter().any(|v| matches!(v, Value::Str(s) if s.is_empty())) {
            return Err(FlagError::Construction {
                reason: "no element of enum values can be empty".to_string(),
            });
        }
        Ok(Self { allowed })
    }

    fn allowed_list(&self) -> String {
        self.allowed
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl ArgParser for MemberParser {
    fn parse(&self, raw: &Value) -> Result<Value, FlagError> {
        if self.allowed.contains(raw) {
            return Ok(raw.clone());
        }
        // String input from the command line matches against each allowed
        // value's canonical rendering.
        if let Value::Str(s) = raw
            && let Some(found) = self.allowed.iter().find(|v| v.to_string() == *s)
        {
            return Ok(found.clone());
        }
        Err(FlagError::NotInEnum {
            value: raw.to_string(),
            allowed: self.allowed_list(),
        })
    }

    fn flag_type(&self) -> &'static str {
        "multi enum element"
    }
}

/// Comma-separated string lists: `a,b,c` parses to three elements.
pub struct ListParser;

impl ArgParser for ListParser {
    fn parse(&self, raw: &Value) -> Result<Value, FlagError> {
        match raw {
            Value::Str(s) => {
                if s.is_empty() {
                    return Ok(Value::Seq(Vec::new()));
                }
                Ok(Value::Seq(
                    s.split(',')
                        .map(|part| Value::Str(part.trim().to_string()))
                        .collect(),
                ))
            }
            Value::Seq(items) => {
                for item in items {
                    if !matches!(item, Value::Str(_)) {
                        return Err(FlagError::BadElementType {
                            found: item.type_name().to_string(),
                        });
                    }
                }
                Ok(Value::Seq(items.clone()))
            }
            other => Err(FlagError::ParseValue {
                kind: "comma-separated list",
                raw: other.to_string(),
            }),
        }
    }

    fn flag_type(&self) -> &'static str {
        "comma separated list of strings"
    }
}

/// Shorthand for the boxed, shared parser handles stored on items.
pub fn shared<P: ArgParser + 'static>(parser: P) -> Rc<dyn ArgParser> {
    Rc::new(parser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Mode {
        Pad,
        Crop,
    }

    impl FlagEnum for Mode {
        const VARIANTS: &'static [&'static str] = &["pad", "crop"];

        fn flag_name(&self) -> &'static str {
            match self {
                Mode::Pad => "pad",
                Mode::Crop => "crop",
            }
        }

        fn from_flag_name(name: &str) -> Option<Self> {
            match name {
                "pad" => Some(Mode::Pad),
                "crop" => Some(Mode::Crop),
                _ => None,
            }
        }
    }

    #[test]
    fn bool_parser_accepts_strings_and_typed() {
        let p = BoolParser;
        assert_eq!(p.parse(&Value::Str("true".into())).unwrap(), Value::Bool(true));
        assert_eq!(p.parse(&Value::Str("F".into())).unwrap(), Value::Bool(false));
        assert_eq!(p.parse(&Value::Str("1".into())).unwrap(), Value::Bool(true));
        assert_eq!(p.parse(&Value::Bool(false)).unwrap(), Value::Bool(false));
        assert!(p.parse(&Value::Str("yes".into())).is_err());
    }

    #[test]
    fn int_parser_accepts_integral_floats_only() {
        let p = IntParser;
        assert_eq!(p.parse(&Value::Str("42".into())).unwrap(), Value::Int(42));
        assert_eq!(p.parse(&Value::Float(3.0)).unwrap(), Value::Int(3));
        assert!(p.parse(&Value::Float(3.5)).is_err());
        assert!(p.parse(&Value::Str("3.5".into())).is_err());
    }

    #[test]
    fn float_parser_widens_ints() {
        let p = FloatParser;
        assert_eq!(p.parse(&Value::Int(3)).unwrap(), Value::Float(3.0));
        assert_eq!(p.parse(&Value::Str("2.5".into())).unwrap(), Value::Float(2.5));
        assert!(p.parse(&Value::Str("abc".into())).is_err());
    }

    #[test]
    fn string_parser_stringifies_scalars() {
        let p = StringParser;
        assert_eq!(p.parse(&Value::Int(5)).unwrap(), Value::Str("5".into()));
        assert_eq!(
            p.parse(&Value::Str("x".into())).unwrap(),
            Value::Str("x".into())
        );
        assert!(p.parse(&Value::Seq(vec![])).is_err());
    }

    #[test]
    fn enum_parser_case_sensitivity() {
        let sensitive = EnumParser::new(&["pad", "crop"], true).unwrap();
        assert!(sensitive.parse(&Value::Str("PAD".into())).is_err());
        let insensitive = EnumParser::new(&["pad", "crop"], false).unwrap();
        assert_eq!(
            insensitive.parse(&Value::Str("PAD".into())).unwrap(),
            Value::Str("pad".into())
        );
    }

    #[test]
    fn enum_parser_rejects_empty_value_set() {
        assert!(matches!(
            EnumParser::new(&[], true),
            Err(FlagError::Construction { .. })
        ));
        assert!(matches!(
            EnumParser::new(&["a", ""], true),
            Err(FlagError::Construction { .. })
        ));
    }

    #[test]
    fn enum_parser_error_names_alternatives() {
        let p = EnumParser::new(&["red", "green"], true).unwrap();
        let err = p.parse(&Value::Str("blue".into())).unwrap_err();
        assert!(err.to_string().contains("red|green"));
    }

    #[test]
    fn enum_class_parser_canonicalizes() {
        let p = EnumClassParser::new::<Mode>().unwrap();
        assert_eq!(
            p.parse(&Value::Str("CROP".into())).unwrap(),
            Value::Str("crop".into())
        );
        assert!(p.parse(&Value::Str("stretch".into())).is_err());
        assert_eq!(Mode::from_flag_name("crop"), Some(Mode::Crop));
    }

    #[test]
    fn sequence_parser_none_is_empty() {
        let p = SequenceParser;
        assert_eq!(p.parse(&Value::None).unwrap(), Value::Seq(vec![]));
    }

    #[test]
    fn sequence_parser_validates_typed_input_in_place() {
        let p = SequenceParser;
        let ok = Value::Seq(vec![Value::Int(1), Value::Str("a".into())]);
        assert_eq!(p.parse(&ok).unwrap(), ok);

        let nested = Value::Seq(vec![Value::Seq(vec![Value::Int(1)])]);
        assert!(matches!(p.parse(&nested), Err(FlagError::NestedSequence)));

        let map_elem = Value::Seq(vec![Value::Map(Default::default())]);
        assert!(matches!(
            p.parse(&map_elem),
            Err(FlagError::BadElementType { .. })
        ));
    }

    #[test]
    fn sequence_parser_parses_literal_strings() {
        let p = SequenceParser;
        assert_eq!(
            p.parse(&Value::Str("(1, 2)".into())).unwrap(),
            Value::Seq(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn multi_enum_membership() {
        let p = MultiEnumParser::new(vec![Value::Int(1), Value::Str("a".into())]).unwrap();
        assert_eq!(
            p.parse(&Value::Str("[1, 'a']".into())).unwrap(),
            Value::Seq(vec![Value::Int(1), Value::Str("a".into())])
        );
        let err = p.parse(&Value::Str("[2]".into())).unwrap_err();
        match err {
            FlagError::NotInEnum { allowed, .. } => {
                assert!(allowed.contains('1'));
                assert!(allowed.contains('a'));
            }
            other => panic!("expected NotInEnum, got: {other:?}"),
        }
    }

    #[test]
    fn multi_enum_rejects_empty_allowed_set() {
        assert!(MultiEnumParser::new(vec![]).is_err());
        assert!(MultiEnumParser::new(vec![Value::Str(String::new())]).is_err());
    }

    #[test]
    fn member_parser_canonicalizes_string_input() {
        let p = MemberParser::new(vec![Value::Int(1), Value::Str("a".into())]).unwrap();
        assert_eq!(p.parse(&Value::Str("1".into())).unwrap(), Value::Int(1));
        assert_eq!(p.parse(&Value::Int(1)).unwrap(), Value::Int(1));
        assert_eq!(
            p.parse(&Value::Str("a".into())).unwrap(),
            Value::Str("a".into())
        );
        assert!(matches!(
            p.parse(&Value::Int(2)),
            Err(FlagError::NotInEnum { .. })
        ));
    }

    #[test]
    fn list_parser_splits_on_commas() {
        let p = ListParser;
        assert_eq!(
            p.parse(&Value::Str("a, b,c".into())).unwrap(),
            Value::Seq(vec![
                Value::Str("a".into()),
                Value::Str("b".into()),
                Value::Str("c".into()),
            ])
        );
    }

    #[test]
    fn csv_serializer_joins_elements() {
        let s = CsvSerializer;
        let seq = Value::Seq(vec![Value::Str("a".into()), Value::Str("b".into())]);
        assert_eq!(s.serialize(&seq), "a,b");
    }
}
