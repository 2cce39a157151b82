//! The dynamic value model shared by every flag in a tree.
//!
//! `Value` is a closed set of the kinds a leaf setting can hold, plus `Map`
//! for the nested aggregate view. The same type flows through parsers, the
//! registry, write-through synchronization, and the instance-derivation
//! bridge, so a value validated once is valid everywhere.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, TimeDelta};

/// A nested mapping of current values, structurally isomorphic to the tree
/// of `Item`s it was built from.
pub type Map = BTreeMap<String, Value>;

/// A single flag value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Unset. The default of a required item, and the serialized form of
    /// a `None` default.
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// An instant. Naive inputs are given a zero offset at parse time.
    DateTime(DateTime<FixedOffset>),
    Duration(TimeDelta),
    /// A flat homogeneous-ish sequence of scalars.
    Seq(Vec<Value>),
    /// A nested mapping (aggregate flags only — never a leaf value).
    Map(Map),
}

impl Value {
    /// The kind name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::DateTime(_) => "datetime",
            Value::Duration(_) => "duration",
            Value::Seq(_) => "sequence",
            Value::Map(_) => "map",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<TimeDelta> {
        match self {
            Value::Duration(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Convert into a `serde_json::Value` for the instance-derivation bridge.
    /// DateTime and Duration become their canonical string forms.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::None => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => {
                serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number)
            }
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::DateTime(dt) => serde_json::Value::String(dt.to_rfc3339()),
            Value::Duration(d) => serde_json::Value::String(format_duration(*d)),
            Value::Seq(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Build a `Value` from a `serde_json::Value`. Integral numbers become
    /// `Int`, everything else numeric becomes `Float`.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Seq(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(obj) => Value::Map(
                obj.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Render a sequence element. Unlike `Display`, strings are quoted so
    /// the rendered sequence re-parses as a literal.
    fn fmt_element(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => {
                write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
            }
            other => write!(f, "{other}"),
        }
    }
}

impl fmt::Display for Value {
    /// The canonical serialized form used by flag round-tripping.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => {
                // Keep a decimal point so the value round-trips as a float.
                if v.fract() == 0.0 && v.is_finite() {
                    write!(f, "{v:.1}")
                } else {
                    write!(f, "{v}")
                }
            }
            Value::Str(s) => write!(f, "{s}"),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Duration(d) => write!(f, "{}", format_duration(*d)),
            Value::Seq(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.fmt_element(f)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: ")?;
                    v.fmt_element(f)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::DateTime(v)
    }
}

impl From<TimeDelta> for Value {
    fn from(v: TimeDelta) -> Self {
        Value::Duration(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Seq(v.into_iter().map(Into::into).collect())
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Self {
        Value::Map(v)
    }
}

/// Render a duration in the compact unit-suffixed grammar the duration
/// parser accepts: `17w3d5h19m22s10ms42us`, greatest unit first, zero
/// components omitted. The zero duration renders as `0s`.
pub fn format_duration(d: TimeDelta) -> String {
    let mut micros = match d.num_microseconds() {
        Some(us) => us,
        // Out of microsecond range; fall back to whole seconds.
        None => return format!("{}s", d.num_seconds()),
    };
    let mut out = String::new();
    if micros < 0 {
        out.push('-');
        micros = -micros;
    }
    const UNITS: [(&str, i64); 7] = [
        ("w", 7 * 24 * 3_600_000_000),
        ("d", 24 * 3_600_000_000),
        ("h", 3_600_000_000),
        ("m", 60_000_000),
        ("s", 1_000_000),
        ("ms", 1_000),
        ("us", 1),
    ];
    for (suffix, unit) in UNITS {
        let count = micros / unit;
        if count > 0 {
            out.push_str(&format!("{count}{suffix}"));
            micros -= count * unit;
        }
    }
    if out.is_empty() || out == "-" {
        return "0s".to_string();
    }
    out
}

/// Look up a nested value by path. Returns `None` if any intermediate key
/// is missing or not a map.
pub fn get_path<'a>(map: &'a Map, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let value = map.get(first)?;
    if rest.is_empty() {
        Some(value)
    } else {
        match value {
            Value::Map(inner) => get_path(inner, rest),
            _ => None,
        }
    }
}

/// Write a value at a nested path, creating intermediate maps as needed.
/// This is the write-through primitive: every leaf flag calls it
/// synchronously whenever its own value changes.
pub fn set_path(map: &mut Map, path: &[String], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    if rest.is_empty() {
        map.insert(first.clone(), value);
        return;
    }
    let entry = map
        .entry(first.clone())
        .or_insert_with(|| Value::Map(Map::new()));
    if !matches!(entry, Value::Map(_)) {
        *entry = Value::Map(Map::new());
    }
    if let Value::Map(inner) = entry {
        set_path(inner, rest, value);
    }
}

/// Deep-merge `overlay` on top of `base`.
/// If both sides have a Map for the same key, recurse.
/// Otherwise, `overlay`'s value wins.
pub fn deep_merge(mut base: Map, overlay: Map) -> Map {
    for (key, overlay_val) in overlay {
        match (base.remove(&key), overlay_val) {
            (Some(Value::Map(base_map)), Value::Map(overlay_map)) => {
                base.insert(key, Value::Map(deep_merge(base_map, overlay_map)));
            }
            (_, overlay_val) => {
                base.insert(key, overlay_val);
            }
        }
    }
    base
}
