//! The flag registry: named settings, tokenization, and write-through.
//!
//! [`FlagValues`] is a cheaply-cloneable handle over a name → flag map. It
//! is injectable — every definition entry point takes one — and a
//! process-wide default instance is available per thread via
//! [`FlagValues::global()`]. That default is the only piece of ambient
//! state in the crate, scoped to process lifetime.
//!
//! Leaf flags registered from a tree carry a write-through sink: a shared
//! nested map plus the leaf's path inside it. Whenever the flag's value
//! changes — command-line parsing, programmatic [`set`](FlagValues::set),
//! or scoped-override restoration — the new value lands in the shared map
//! on the same call stack, so the map and the flag can never be observed
//! disagreeing.
//!
//! Everything here is single-threaded by design (`Rc`/`RefCell`); the
//! registry adds no locking of its own.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use crate::error::FlagError;
use crate::parsers::{ArgParser, ArgSerializer, StringParser};
use crate::value::{Map, Value, set_path};

/// The shared nested mapping kept in sync with every leaf flag of a tree.
/// Leaves hold non-owning references; the aggregate flag owns the lifecycle.
pub type SharedMap = Rc<RefCell<Map>>;

/// The reserved round-trip sentinel: the serialized form of an aggregate
/// flag, and the only value an aggregate silently accepts back.
pub(crate) const EMPTY_SENTINEL: &str = "";

/// Everything needed to register one leaf flag. Built by
/// `Item::define`/`MultiItem::define`.
pub(crate) struct LeafSpec {
    pub name: String,
    pub help: String,
    pub parser: Rc<dyn ArgParser>,
    pub serializer: Rc<dyn ArgSerializer>,
    pub default: Value,
    pub required: bool,
    pub boolean: bool,
    pub multi: bool,
    pub sink: Option<(SharedMap, Vec<String>)>,
}

enum FlagKind {
    Scalar {
        sink: Option<(SharedMap, Vec<String>)>,
    },
    Multi {
        sink: Option<(SharedMap, Vec<String>)>,
    },
    Aggregate {
        shared: SharedMap,
        leaves: Vec<String>,
    },
}

struct FlagEntry {
    help: String,
    flag_type: &'static str,
    parser: Rc<dyn ArgParser>,
    serializer: Rc<dyn ArgSerializer>,
    default: Value,
    value: Value,
    present: bool,
    required: bool,
    boolean: bool,
    kind: FlagKind,
}

/// A namespace of named flags. Clones share the same underlying state.
#[derive(Clone, Default)]
pub struct FlagValues {
    inner: Rc<RefCell<BTreeMap<String, FlagEntry>>>,
}

thread_local! {
    static GLOBAL: FlagValues = FlagValues::new();
}

enum Target {
    Scalar,
    Multi,
    Aggregate { leaves: String },
}

impl FlagValues {
    pub fn new() -> Self {
        // Not `Self::default()`: the inherent `default(&self, name)`
        // accessor shadows the trait method.
        Self {
            inner: Rc::default(),
        }
    }

    /// The process-wide default instance for the current thread.
    pub fn global() -> Self {
        GLOBAL.with(Self::clone)
    }

    /// The basic registration primitive: one standalone named flag with no
    /// write-through sink. Tree definition goes through the richer
    /// `define_leaf`/`define_aggregate` instead.
    pub fn define(
        &self,
        name: &str,
        default: Value,
        help: &str,
        parser: Rc<dyn ArgParser>,
        serializer: Option<Rc<dyn ArgSerializer>>,
    ) -> Result<FlagHolder, FlagError> {
        let default = if default.is_none() {
            default
        } else {
            parser
                .parse(&default)
                .map_err(|e| FlagError::illegal_value(name, e))?
        };
        let flag_type = parser.flag_type();
        self.insert(
            name,
            FlagEntry {
                help: help.to_string(),
                flag_type,
                parser,
                serializer: serializer
                    .unwrap_or_else(|| Rc::new(crate::parsers::DefaultSerializer)),
                value: default.clone(),
                default,
                present: false,
                required: false,
                boolean: false,
                kind: FlagKind::Scalar { sink: None },
            },
        )?;
        Ok(FlagHolder {
            name: name.to_string(),
            fv: self.clone(),
        })
    }

    pub(crate) fn define_leaf(&self, spec: LeafSpec) -> Result<FlagHolder, FlagError> {
        let flag_type = spec.parser.flag_type();
        let kind = if spec.multi {
            FlagKind::Multi { sink: spec.sink }
        } else {
            FlagKind::Scalar { sink: spec.sink }
        };
        let name = spec.name.clone();
        self.insert(
            &name,
            FlagEntry {
                help: spec.help,
                flag_type,
                parser: spec.parser,
                serializer: spec.serializer,
                value: spec.default.clone(),
                default: spec.default,
                present: false,
                required: spec.required,
                boolean: spec.boolean,
                kind,
            },
        )?;
        Ok(FlagHolder {
            name,
            fv: self.clone(),
        })
    }

    pub(crate) fn define_aggregate(
        &self,
        name: &str,
        help: &str,
        flag_type: &'static str,
        shared: SharedMap,
        leaves: Vec<String>,
    ) -> Result<(), FlagError> {
        self.insert(
            name,
            FlagEntry {
                help: help.to_string(),
                flag_type,
                // Never consulted: aggregates accept only the sentinel.
                parser: Rc::new(StringParser),
                serializer: Rc::new(crate::parsers::DefaultSerializer),
                default: Value::None,
                value: Value::None,
                present: false,
                required: false,
                boolean: false,
                kind: FlagKind::Aggregate { shared, leaves },
            },
        )
    }

    fn insert(&self, name: &str, entry: FlagEntry) -> Result<(), FlagError> {
        if name.is_empty() {
            return Err(FlagError::Construction {
                reason: "flag name cannot be empty".to_string(),
            });
        }
        let mut inner = self.inner.borrow_mut();
        if inner.contains_key(name) {
            return Err(FlagError::DuplicateFlag(name.to_string()));
        }
        inner.insert(name.to_string(), entry);
        Ok(())
    }

    fn classify(&self, name: &str) -> Result<(Rc<dyn ArgParser>, Target), FlagError> {
        let inner = self.inner.borrow();
        let entry = inner
            .get(name)
            .ok_or_else(|| FlagError::UnknownFlag(name.to_string()))?;
        let target = match &entry.kind {
            FlagKind::Scalar { .. } => Target::Scalar,
            FlagKind::Multi { .. } => Target::Multi,
            FlagKind::Aggregate { leaves, .. } => Target::Aggregate {
                leaves: leaves.join(", "),
            },
        };
        Ok((Rc::clone(&entry.parser), target))
    }

    /// Update a flag's value and synchronously write it through to the
    /// shared map, if this flag has one.
    fn commit(&self, name: &str, value: Value, present: bool) {
        let mut inner = self.inner.borrow_mut();
        let Some(entry) = inner.get_mut(name) else {
            return;
        };
        entry.value = value.clone();
        entry.present = present;
        if let FlagKind::Scalar { sink: Some((shared, path)) }
        | FlagKind::Multi { sink: Some((shared, path)) } = &entry.kind
        {
            set_path(&mut shared.borrow_mut(), path, value);
        }
    }

    /// Programmatic assignment. The value runs through the flag's parser
    /// (the same gate as command-line input), then write-through fires.
    ///
    /// Aggregate flags reject everything except the reserved empty
    /// sentinel, which is accepted silently as a round-trip no-op.
    pub fn set(&self, name: &str, value: Value) -> Result<(), FlagError> {
        let (parser, target) = self.classify(name)?;
        match target {
            Target::Aggregate { leaves } => {
                if matches!(&value, Value::Str(s) if s == EMPTY_SENTINEL) {
                    return Ok(());
                }
                Err(FlagError::OverrideDenied {
                    name: name.to_string(),
                    leaves,
                })
            }
            Target::Scalar => {
                let parsed = parser
                    .parse(&value)
                    .map_err(|e| FlagError::illegal_value(name, e))?;
                self.commit(name, parsed, true);
                Ok(())
            }
            Target::Multi => {
                let elements = match value {
                    Value::None => Vec::new(),
                    Value::Seq(items) => items,
                    single => vec![single],
                };
                let parsed = elements
                    .iter()
                    .map(|item| parser.parse(item))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| FlagError::illegal_value(name, e))?;
                self.commit(name, Value::Seq(parsed), true);
                Ok(())
            }
        }
    }

    /// Restore a previously-saved value verbatim, bypassing the parser but
    /// still firing write-through. Used by scoped-override teardown.
    pub(crate) fn restore(&self, name: &str, value: Value, present: bool) {
        self.commit(name, value, present);
    }

    /// Save a flag's current value and presence bit.
    pub(crate) fn snapshot(&self, name: &str) -> Result<(Value, bool), FlagError> {
        let inner = self.inner.borrow();
        let entry = inner
            .get(name)
            .ok_or_else(|| FlagError::UnknownFlag(name.to_string()))?;
        Ok((entry.value.clone(), entry.present))
    }

    /// Parse one raw command-line occurrence of a flag.
    fn parse_one(&self, name: &str, raw: &str, accumulate: bool) -> Result<(), FlagError> {
        let (parser, target) = self.classify(name)?;
        match target {
            Target::Aggregate { leaves } => {
                if raw == EMPTY_SENTINEL {
                    return Ok(());
                }
                Err(FlagError::OverrideDenied {
                    name: name.to_string(),
                    leaves,
                })
            }
            Target::Scalar => {
                let parsed = parser
                    .parse(&Value::Str(raw.to_string()))
                    .map_err(|e| FlagError::illegal_value(name, e))?;
                self.commit(name, parsed, true);
                Ok(())
            }
            Target::Multi => {
                let element = parser
                    .parse(&Value::Str(raw.to_string()))
                    .map_err(|e| FlagError::illegal_value(name, e))?;
                let items = if accumulate {
                    let mut items = self
                        .snapshot(name)?
                        .0
                        .as_seq()
                        .map(<[Value]>::to_vec)
                        .unwrap_or_default();
                    items.push(element);
                    items
                } else {
                    vec![element]
                };
                self.commit(name, Value::Seq(items), true);
                Ok(())
            }
        }
    }

    fn is_boolean(&self, name: &str) -> bool {
        self.inner
            .borrow()
            .get(name)
            .is_some_and(|entry| entry.boolean)
    }

    /// Tokenize and apply a command-line argument vector.
    ///
    /// Supports `--name=value`, `--name value`, `--name`/`--noname` for
    /// boolean flags, single-dash spellings, and `--` to end flag parsing.
    /// Repeated occurrences of a multi flag accumulate. Returns the
    /// positional (non-flag) arguments in order.
    ///
    /// After parsing, any required flag that was never set is an error.
    pub fn parse_args<I>(&self, args: I) -> Result<Vec<String>, FlagError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut positional = Vec::new();
        let mut seen_multi: HashSet<String> = HashSet::new();
        let mut iter = args.into_iter().map(Into::into);

        while let Some(arg) = iter.next() {
            if arg == "--" {
                positional.extend(iter);
                break;
            }
            let body = match arg.strip_prefix("--").or_else(|| arg.strip_prefix('-')) {
                Some(body) if !body.is_empty() => body.to_string(),
                _ => {
                    positional.push(arg);
                    continue;
                }
            };

            let (name, raw) = if let Some((name, value)) = body.split_once('=') {
                (name.to_string(), value.to_string())
            } else if self.is_boolean(&body) {
                (body, "true".to_string())
            } else if let Some(positive) = body.strip_prefix("no")
                && self.is_boolean(positive)
            {
                (positive.to_string(), "false".to_string())
            } else {
                let value = iter.next().ok_or_else(|| FlagError::IllegalValue {
                    flag: body.clone(),
                    reason: "missing value".to_string(),
                })?;
                (body, value)
            };

            let accumulate = seen_multi.contains(&name);
            self.parse_one(&name, &raw, accumulate)?;
            if matches!(self.classify(&name)?, (_, Target::Multi)) {
                seen_multi.insert(name);
            }
        }

        let unset: Vec<String> = {
            let inner = self.inner.borrow();
            inner
                .iter()
                .filter(|(_, entry)| entry.required && !entry.present)
                .map(|(name, _)| name.clone())
                .collect()
        };
        if !unset.is_empty() {
            return Err(FlagError::RequiredUnset(unset.join(", ")));
        }
        Ok(positional)
    }

    /// Dump the current flag state to `--name=value` tokens that re-parse
    /// cleanly. Aggregates always serialize to the empty sentinel; their
    /// real state flows through the leaves. Unset flags are skipped.
    pub fn serialize_args(&self) -> Vec<String> {
        let inner = self.inner.borrow();
        let mut out = Vec::new();
        for (name, entry) in inner.iter() {
            match &entry.kind {
                FlagKind::Aggregate { .. } => {
                    out.push(format!("--{name}={EMPTY_SENTINEL}"));
                }
                FlagKind::Multi { .. } => {
                    if let Value::Seq(items) = &entry.value {
                        for item in items {
                            out.push(format!("--{name}={}", entry.serializer.serialize(item)));
                        }
                    }
                }
                FlagKind::Scalar { .. } => {
                    if !entry.value.is_none() {
                        out.push(format!(
                            "--{name}={}",
                            entry.serializer.serialize(&entry.value)
                        ));
                    }
                }
            }
        }
        out
    }

    /// The current resolved value of a flag. For aggregates this is a
    /// snapshot of the live shared map.
    pub fn value(&self, name: &str) -> Result<Value, FlagError> {
        let inner = self.inner.borrow();
        let entry = inner
            .get(name)
            .ok_or_else(|| FlagError::UnknownFlag(name.to_string()))?;
        match &entry.kind {
            FlagKind::Aggregate { shared, .. } => Ok(Value::Map(shared.borrow().clone())),
            _ => Ok(entry.value.clone()),
        }
    }

    /// Whether the flag was explicitly set (parsed or assigned), as opposed
    /// to still holding its default.
    pub fn is_present(&self, name: &str) -> Result<bool, FlagError> {
        let inner = self.inner.borrow();
        inner
            .get(name)
            .map(|entry| entry.present)
            .ok_or_else(|| FlagError::UnknownFlag(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.borrow().contains_key(name)
    }

    pub fn flag_names(&self) -> Vec<String> {
        self.inner.borrow().keys().cloned().collect()
    }

    pub fn help(&self, name: &str) -> Result<String, FlagError> {
        let inner = self.inner.borrow();
        inner
            .get(name)
            .map(|entry| entry.help.clone())
            .ok_or_else(|| FlagError::UnknownFlag(name.to_string()))
    }

    pub fn flag_type(&self, name: &str) -> Result<&'static str, FlagError> {
        let inner = self.inner.borrow();
        inner
            .get(name)
            .map(|entry| entry.flag_type)
            .ok_or_else(|| FlagError::UnknownFlag(name.to_string()))
    }

    pub fn default(&self, name: &str) -> Result<Value, FlagError> {
        let inner = self.inner.borrow();
        inner
            .get(name)
            .map(|entry| entry.default.clone())
            .ok_or_else(|| FlagError::UnknownFlag(name.to_string()))
    }
}

/// An opaque handle to one registered flag.
#[derive(Clone)]
pub struct FlagHolder {
    name: String,
    fv: FlagValues,
}

impl FlagHolder {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Result<Value, FlagError> {
        self.fv.value(&self.name)
    }

    pub fn is_present(&self) -> Result<bool, FlagError> {
        self.fv.is_present(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::{BoolParser, IntParser};

    fn int_flag(fv: &FlagValues, name: &str, default: i64) -> FlagHolder {
        fv.define(name, Value::Int(default), "an int", Rc::new(IntParser), None)
            .unwrap()
    }

    #[test]
    fn fresh_registry_is_empty_and_keeps_defaults() {
        let fv = FlagValues::new();
        assert!(fv.flag_names().is_empty());
        int_flag(&fv, "count", 3);
        fv.set("count", Value::Int(9)).unwrap();
        // The stored default is reachable even after an override.
        assert_eq!(fv.default("count").unwrap(), Value::Int(3));
    }

    #[test]
    fn define_and_read_default() {
        let fv = FlagValues::new();
        let holder = int_flag(&fv, "count", 3);
        assert_eq!(holder.value().unwrap(), Value::Int(3));
        assert!(!holder.is_present().unwrap());
    }

    #[test]
    fn duplicate_name_rejected() {
        let fv = FlagValues::new();
        int_flag(&fv, "count", 3);
        assert!(matches!(
            fv.define("count", Value::Int(1), "again", Rc::new(IntParser), None),
            Err(FlagError::DuplicateFlag(_))
        ));
    }

    #[test]
    fn set_goes_through_parser() {
        let fv = FlagValues::new();
        int_flag(&fv, "count", 3);
        fv.set("count", Value::Str("7".into())).unwrap();
        assert_eq!(fv.value("count").unwrap(), Value::Int(7));
        assert!(fv.is_present("count").unwrap());

        let err = fv.set("count", Value::Str("x".into())).unwrap_err();
        assert!(matches!(err, FlagError::IllegalValue { .. }));
    }

    #[test]
    fn parse_args_equals_and_space_forms() {
        let fv = FlagValues::new();
        int_flag(&fv, "a", 1);
        int_flag(&fv, "b", 2);
        let rest = fv
            .parse_args(["--a=10", "--b", "20", "positional"])
            .unwrap();
        assert_eq!(fv.value("a").unwrap(), Value::Int(10));
        assert_eq!(fv.value("b").unwrap(), Value::Int(20));
        assert_eq!(rest, vec!["positional".to_string()]);
    }

    #[test]
    fn parse_args_boolean_shorthand() {
        let fv = FlagValues::new();
        fv.define_leaf(LeafSpec {
            name: "verbose".into(),
            help: "verbose".into(),
            parser: Rc::new(BoolParser),
            serializer: Rc::new(crate::parsers::DefaultSerializer),
            default: Value::Bool(false),
            required: false,
            boolean: true,
            multi: false,
            sink: None,
        })
        .unwrap();

        fv.parse_args(["--verbose"]).unwrap();
        assert_eq!(fv.value("verbose").unwrap(), Value::Bool(true));
        fv.parse_args(["--noverbose"]).unwrap();
        assert_eq!(fv.value("verbose").unwrap(), Value::Bool(false));
    }

    #[test]
    fn parse_args_double_dash_ends_flags() {
        let fv = FlagValues::new();
        int_flag(&fv, "a", 1);
        let rest = fv.parse_args(["--", "--a=9"]).unwrap();
        assert_eq!(fv.value("a").unwrap(), Value::Int(1));
        assert_eq!(rest, vec!["--a=9".to_string()]);
    }

    #[test]
    fn parse_args_unknown_flag() {
        let fv = FlagValues::new();
        assert!(matches!(
            fv.parse_args(["--nope=1"]),
            Err(FlagError::UnknownFlag(_))
        ));
    }

    #[test]
    fn parse_args_missing_value() {
        let fv = FlagValues::new();
        int_flag(&fv, "a", 1);
        assert!(matches!(
            fv.parse_args(["--a"]),
            Err(FlagError::IllegalValue { .. })
        ));
    }

    #[test]
    fn multi_flag_accumulates_within_one_parse() {
        let fv = FlagValues::new();
        fv.define_leaf(LeafSpec {
            name: "tag".into(),
            help: "tag".into(),
            parser: Rc::new(crate::parsers::StringParser),
            serializer: Rc::new(crate::parsers::DefaultSerializer),
            default: Value::Seq(vec![Value::Str("default".into())]),
            required: false,
            boolean: false,
            multi: true,
            sink: None,
        })
        .unwrap();

        fv.parse_args(["--tag=a", "--tag=b"]).unwrap();
        assert_eq!(
            fv.value("tag").unwrap(),
            Value::Seq(vec![Value::Str("a".into()), Value::Str("b".into())])
        );

        // A fresh parse replaces rather than extending the previous run.
        fv.parse_args(["--tag=c"]).unwrap();
        assert_eq!(
            fv.value("tag").unwrap(),
            Value::Seq(vec![Value::Str("c".into())])
        );
    }

    #[test]
    fn required_flag_must_be_set() {
        let fv = FlagValues::new();
        fv.define_leaf(LeafSpec {
            name: "must".into(),
            help: "must".into(),
            parser: Rc::new(IntParser),
            serializer: Rc::new(crate::parsers::DefaultSerializer),
            default: Value::None,
            required: true,
            boolean: false,
            multi: false,
            sink: None,
        })
        .unwrap();

        match fv.parse_args(Vec::<String>::new()) {
            Err(FlagError::RequiredUnset(names)) => assert!(names.contains("must")),
            other => panic!("expected RequiredUnset, got: {other:?}"),
        }
        fv.parse_args(["--must=5"]).unwrap();
        assert_eq!(fv.value("must").unwrap(), Value::Int(5));
    }

    #[test]
    fn write_through_fires_on_set_and_parse() {
        let fv = FlagValues::new();
        let shared: SharedMap = Rc::new(RefCell::new(Map::new()));
        shared
            .borrow_mut()
            .insert("count".to_string(), Value::Int(3));
        fv.define_leaf(LeafSpec {
            name: "cfg.count".into(),
            help: "count".into(),
            parser: Rc::new(IntParser),
            serializer: Rc::new(crate::parsers::DefaultSerializer),
            default: Value::Int(3),
            required: false,
            boolean: false,
            multi: false,
            sink: Some((Rc::clone(&shared), vec!["count".to_string()])),
        })
        .unwrap();

        fv.set("cfg.count", Value::Int(9)).unwrap();
        assert_eq!(shared.borrow()["count"], Value::Int(9));

        fv.parse_args(["--cfg.count=11"]).unwrap();
        assert_eq!(shared.borrow()["count"], Value::Int(11));
    }

    #[test]
    fn serialize_args_round_trip() {
        let fv = FlagValues::new();
        int_flag(&fv, "a", 1);
        fv.set("a", Value::Int(42)).unwrap();
        let tokens = fv.serialize_args();
        assert_eq!(tokens, vec!["--a=42".to_string()]);

        let fresh = FlagValues::new();
        int_flag(&fresh, "a", 1);
        fresh.parse_args(tokens).unwrap();
        assert_eq!(fresh.value("a").unwrap(), Value::Int(42));
    }

    #[test]
    fn global_is_shared_per_thread() {
        let a = FlagValues::global();
        let b = FlagValues::global();
        let name = "registry_global_test_flag";
        if !a.contains(name) {
            a.define(name, Value::Int(1), "shared", Rc::new(IntParser), None)
                .unwrap();
        }
        assert!(b.contains(name));
    }
}
