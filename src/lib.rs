//! Nested, command-line-overridable setting trees. Define the shape once,
//! override any leaf with a dotted flag.
//!
//! Flagtree turns a tree of defaults into a family of flags: one flag per
//! leaf, named by its dotted path, plus an aggregate flag for the whole
//! tree. Overrides arrive through the command line, programmatic
//! assignment, or scoped guards, and every one of them lands in a shared
//! mapping the moment it happens.
//!
//! ```ignore
//! let tree = Tree::new()
//!     .item("mode", Item::enumeration(Some("pad"), &["pad", "crop"], false)?)
//!     .branch(
//!         "limits",
//!         Tree::new().item("width", Item::integer(Some(5))),
//!     );
//! let settings = define_dict("cfg", tree, "processing settings", &fv)?;
//!
//! fv.parse_args(std::env::args().skip(1))?;
//! let width = settings.value()["limits"].as_map();
//! ```
//!
//! With that in place, `--cfg.mode=crop` and `--cfg.limits.width=9` both
//! work, each value passes through a typed parser, and `settings.value()`
//! reflects whatever was overridden.
//!
//! # Why a tree
//!
//! Structured code takes structured configuration: an experiment or server
//! is assembled from components, each with its own settings, and flat
//! flag lists lose that shape. The usual fallback is one flag per setting
//! wired by hand into each constructor, which grows linearly with the
//! system and drifts as components change.
//!
//! Flagtree keeps the shape. A [`Tree`] of [`Item`]s is the single
//! definition: it names the leaves, gives their defaults, and fixes their
//! types. Registration, parsing, help text, serialization, and the final
//! resolved mapping all derive from that one definition.
//!
//! # Design: write-through synchronization
//!
//! [`define_dict`] returns a handle over a shared mapping, and every leaf
//! flag keeps a reference into that mapping. When a flag changes, the new
//! value is written into the mapping on the same call stack. There is no
//! "resolve" step and no moment where the flags and the mapping disagree;
//! code that captured the mapping early sees overrides that happen later.
//!
//! The aggregate flag (the bare root name) is readable but not directly
//! writable. Overriding `--cfg={...}` is rejected with the list of leaf
//! flags to use instead; the one exception is the empty string, which is
//! what the aggregate serializes to and is accepted back as a no-op so
//! that serialized argument vectors round-trip.
//!
//! Everything is single-threaded: handles are `Rc`-based and the default
//! registry is per-thread. Parse flags before spawning workers and hand
//! them the resolved values.
//!
//! # Flag forms
//!
//! [`FlagValues::parse_args`] understands `--name=value`, `--name value`,
//! `--name`/`--noname` for boolean leaves, single-dash spellings, and `--`
//! to end flag parsing. Repeated occurrences of a [`MultiItem`] flag
//! accumulate within one parse. Positional arguments come back in order.
//!
//! # Typed leaves
//!
//! Items come in the usual scalar shapes — [`Item::boolean`],
//! [`Item::integer`], [`Item::float`], [`Item::string`] — plus:
//!
//! - **Enumerations** ([`Item::enumeration`], [`Item::enum_class`]):
//!   membership in a fixed set, case-insensitive by default, with the
//!   canonical spelling stored. `enum_class` ties the set to a Rust enum
//!   through the [`FlagEnum`] trait.
//! - **Sequences** ([`Item::sequence`], [`Item::multi_enum`]): flat lists
//!   of simple scalars, overridable with literal syntax
//!   (`--cfg.sizes=[1, 2, 3]`). The literal parser is deliberately small:
//!   flat lists only, bounded size, no expression evaluation.
//! - **Timestamps and durations** ([`Item::date_time`],
//!   [`Item::duration`]): ISO-8601-style datetimes and compact
//!   unit-suffixed durations (`1h30m`, `250ms`).
//! - **Comma-separated lists** ([`Item::string_list`]) for the
//!   `--flag=a,b,c` convention.
//!
//! Defaults are validated when the item is built, so a typo in a default
//! fails at definition time, not at first parse. Custom leaf types plug in
//! through the [`ArgParser`] trait.
//!
//! # Deriving trees
//!
//! Writing a tree that mirrors a constructor is mechanical, so two
//! shortcuts exist:
//!
//! - [`auto`] derives a tree from a [`Signature`]: a one-time description
//!   of a constructor's parameters, their types, and their defaults.
//!   [`define_auto`] additionally binds the tree to a factory closure so
//!   reading the holder builds the constructed value from the current
//!   settings. Strict mode fails on parameters it cannot map; relaxed mode
//!   logs and skips them.
//! - [`auto_from_instance`] derives a tree from any `Serialize` value,
//!   typing each field by its runtime shape. [`define_from_instance`]
//!   registers it and deserializes the current settings back into the
//!   source type on demand. Fields with no flag representation stay fixed
//!   at their serialized value.
//!
//! # Scoped overrides
//!
//! [`override_flags`] applies a batch of overrides and returns a guard
//! that restores the previous values — presence bits and write-through
//! included — when dropped. Application is transactional: a failure rolls
//! back the overrides already applied. [`with_overrides`] wraps a closure
//! in the same mechanism.
//!
//! # Error handling
//!
//! All fallible operations return [`FlagError`]. Errors are user-facing:
//! illegal values name the flag and the reason, enumeration mismatches
//! list the allowed values, denied aggregate overrides list the leaf flags
//! to use instead, and ambiguous datetimes suggest the unambiguous
//! spelling. See the [`error`] module for the full set.

pub mod error;

mod auto;
mod define;
mod instance;
mod items;
mod literal;
mod overrider;
mod parsers;
mod registry;
mod time;
mod value;

#[cfg(test)]
mod fixtures;

pub use auto::{
    AutoHolder, AutoOptions, ParamType, ScalarType, Signature, auto, auto_with, define_auto,
};
pub use define::{DictHolder, define_dict, define_flags, define_sequence, extract_defaults};
pub use error::FlagError;
pub use instance::{Derived, InstanceHolder, auto_from_instance, define_from_instance};
pub use items::{Item, MultiItem, Node, Tree};
pub use overrider::{OverrideGuard, override_flags, with_overrides};
pub use parsers::{
    ArgParser, ArgSerializer, BoolParser, CsvSerializer, DefaultSerializer, EnumClassParser,
    EnumParser, FlagEnum, FloatParser, IntParser, ListParser, MemberParser, MultiEnumParser,
    SequenceParser, StringParser, shared,
};
pub use registry::{FlagHolder, FlagValues, SharedMap};
pub use time::{DateTimeParser, DurationParser};
pub use value::{Map, Value, deep_merge, get_path, set_path};
