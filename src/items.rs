//! Leaf descriptors and the settings tree they assemble into.
//!
//! An [`Item`] pairs a default value with a parser and serializer; it is the
//! declarative description of one overridable leaf setting. Defaults are
//! validated eagerly — an invalid default fails when the item is built, not
//! when the tree is registered or first parsed.
//!
//! A [`Tree`] is a builder for the flat-or-nested shape handed to
//! [`define_dict`](crate::define_dict). The closed [`Node`] enum makes
//! ill-typed tree contents unrepresentable; the remaining shape errors
//! (empty tree, duplicate keys, bad root name) are caught at definition
//! time.

use std::rc::Rc;

use crate::error::FlagError;
use crate::parsers::{
    ArgParser, ArgSerializer, BoolParser, CsvSerializer, DefaultSerializer, EnumClassParser,
    EnumParser, FlagEnum, FloatParser, IntParser, ListParser, MemberParser, MultiEnumParser,
    SequenceParser, StringParser,
};
use crate::registry::{FlagHolder, FlagValues, LeafSpec, SharedMap};
use crate::time::{DateTimeParser, DurationParser};
use crate::value::Value;

/// An immutable descriptor for one leaf setting.
#[derive(Clone)]
pub struct Item {
    default: Value,
    help: Option<String>,
    parser: Rc<dyn ArgParser>,
    serializer: Rc<dyn ArgSerializer>,
    required: bool,
    boolean: bool,
}

impl Item {
    /// Build an item with an explicit parser. A non-`None` default is
    /// validated through the parser immediately.
    pub fn new(default: Value, parser: Rc<dyn ArgParser>) -> Result<Self, FlagError> {
        let default = if default.is_none() {
            default
        } else {
            parser.parse(&default)?
        };
        Ok(Self {
            default,
            help: None,
            parser,
            serializer: Rc::new(DefaultSerializer),
            required: false,
            boolean: false,
        })
    }

    pub fn boolean(default: Option<bool>) -> Self {
        Self {
            default: default.map_or(Value::None, Value::Bool),
            help: None,
            parser: Rc::new(BoolParser),
            serializer: Rc::new(DefaultSerializer),
            required: false,
            boolean: true,
        }
    }

    pub fn integer(default: Option<i64>) -> Self {
        Self {
            default: default.map_or(Value::None, Value::Int),
            help: None,
            parser: Rc::new(IntParser),
            serializer: Rc::new(DefaultSerializer),
            required: false,
            boolean: false,
        }
    }

    pub fn float(default: Option<f64>) -> Self {
        Self {
            default: default.map_or(Value::None, Value::Float),
            help: None,
            parser: Rc::new(FloatParser),
            serializer: Rc::new(DefaultSerializer),
            required: false,
            boolean: false,
        }
    }

    pub fn string(default: Option<&str>) -> Self {
        Self {
            default: default.map_or(Value::None, |s| Value::Str(s.to_string())),
            help: None,
            parser: Rc::new(StringParser),
            serializer: Rc::new(DefaultSerializer),
            required: false,
            boolean: false,
        }
    }

    /// A string constrained to a fixed allowed-value set. The default, if
    /// any, must itself be a member.
    pub fn enumeration(
        default: Option<&str>,
        values: &[&str],
        case_sensitive: bool,
    ) -> Result<Self, FlagError> {
        let parser = EnumParser::new(values, case_sensitive)?;
        Self::new(
            default.map_or(Value::None, |s| Value::Str(s.to_string())),
            Rc::new(parser),
        )
    }

    /// A member of a Rust enum implementing [`FlagEnum`], stored as the
    /// canonical variant name.
    pub fn enum_class<E: FlagEnum>(default: Option<E>) -> Result<Self, FlagError> {
        let parser = EnumClassParser::new::<E>()?;
        Self::new(
            default.map_or(Value::None, |e| Value::Str(e.flag_name().to_string())),
            Rc::new(parser),
        )
    }

    /// A flat sequence of simple scalars, overridable with literal syntax
    /// (`--settings.sizes=[1, 2, 3]`).
    pub fn sequence(default: Option<Vec<Value>>) -> Result<Self, FlagError> {
        Self::new(
            default.map_or(Value::None, Value::Seq),
            Rc::new(SequenceParser),
        )
    }

    /// Like [`sequence`](Self::sequence), but every element must belong to
    /// `allowed`.
    pub fn multi_enum(
        default: Option<Vec<Value>>,
        allowed: Vec<Value>,
    ) -> Result<Self, FlagError> {
        let parser = MultiEnumParser::new(allowed)?;
        Self::new(default.map_or(Value::None, Value::Seq), Rc::new(parser))
    }

    pub fn date_time(default: Option<&str>) -> Result<Self, FlagError> {
        Self::new(
            default.map_or(Value::None, |s| Value::Str(s.to_string())),
            Rc::new(DateTimeParser),
        )
    }

    pub fn duration(default: Option<&str>) -> Result<Self, FlagError> {
        Self::new(
            default.map_or(Value::None, |s| Value::Str(s.to_string())),
            Rc::new(DurationParser),
        )
    }

    /// A comma-separated string list (`--flag=a,b,c`).
    pub fn string_list(default: Option<&[&str]>) -> Self {
        Self {
            default: default.map_or(Value::None, |items| {
                Value::Seq(items.iter().map(|s| Value::Str(s.to_string())).collect())
            }),
            help: None,
            parser: Rc::new(ListParser),
            serializer: Rc::new(CsvSerializer),
            required: false,
            boolean: false,
        }
    }

    pub fn help(mut self, text: &str) -> Self {
        self.help = Some(text.to_string());
        self
    }

    /// Mark this item as required: overriding it is mandatory before the
    /// tree's value can be read. Requires a `None` default.
    pub fn required(mut self) -> Result<Self, FlagError> {
        if !self.default.is_none() {
            return Err(FlagError::Construction {
                reason: "if marking an item as required, the default must be None".to_string(),
            });
        }
        self.required = true;
        Ok(self)
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    /// Register one leaf flag under the dotted join of `namespace`, wired to
    /// write through into `shared` at the path below the root component.
    pub(crate) fn define(
        &self,
        namespace: &[String],
        shared: &SharedMap,
        fv: &FlagValues,
    ) -> Result<FlagHolder, FlagError> {
        let name = namespace.join(".");
        let path = namespace.get(1..).unwrap_or_default().to_vec();
        fv.define_leaf(LeafSpec {
            name: name.clone(),
            help: self.help.clone().unwrap_or(name),
            parser: Rc::clone(&self.parser),
            serializer: Rc::clone(&self.serializer),
            default: self.default.clone(),
            required: self.required,
            boolean: self.boolean,
            multi: false,
            sink: Some((Rc::clone(shared), path)),
        })
    }
}

/// Like [`Item`], but the value is always a sequence and the registered
/// flag accumulates repeated command-line occurrences.
#[derive(Clone)]
pub struct MultiItem {
    default: Value,
    help: Option<String>,
    parser: Rc<dyn ArgParser>,
    serializer: Rc<dyn ArgSerializer>,
}

impl MultiItem {
    /// Build a multi-item. A scalar default is normalized to a one-element
    /// sequence; each element is validated individually through `parser`.
    pub fn new(default: Value, parser: Rc<dyn ArgParser>) -> Result<Self, FlagError> {
        let default = match default {
            Value::None => Value::None,
            Value::Seq(items) => Value::Seq(
                items
                    .iter()
                    .map(|item| parser.parse(item))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            single => Value::Seq(vec![parser.parse(&single)?]),
        };
        Ok(Self {
            default,
            help: None,
            parser,
            serializer: Rc::new(DefaultSerializer),
        })
    }

    pub fn string(default: Option<&[&str]>) -> Result<Self, FlagError> {
        Self::new(
            default.map_or(Value::None, |items| {
                Value::Seq(items.iter().map(|s| Value::Str(s.to_string())).collect())
            }),
            Rc::new(StringParser),
        )
    }

    /// Repeated members of a fixed collection of allowed values; each
    /// command-line occurrence supplies one element.
    pub fn multi_enum(
        default: Option<Vec<Value>>,
        allowed: Vec<Value>,
    ) -> Result<Self, FlagError> {
        let parser = MemberParser::new(allowed)?;
        Self::new(default.map_or(Value::None, Value::Seq), Rc::new(parser))
    }

    /// Repeated members of a [`FlagEnum`], serialized as a CSV of names.
    pub fn enum_class<E: FlagEnum>(default: Option<Vec<E>>) -> Result<Self, FlagError> {
        let parser = EnumClassParser::new::<E>()?;
        let mut item = Self::new(
            default.map_or(Value::None, |members| {
                Value::Seq(
                    members
                        .iter()
                        .map(|e| Value::Str(e.flag_name().to_string()))
                        .collect(),
                )
            }),
            Rc::new(parser),
        )?;
        item.serializer = Rc::new(CsvSerializer);
        Ok(item)
    }

    pub fn help(mut self, text: &str) -> Self {
        self.help = Some(text.to_string());
        self
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub(crate) fn define(
        &self,
        namespace: &[String],
        shared: &SharedMap,
        fv: &FlagValues,
    ) -> Result<FlagHolder, FlagError> {
        let name = namespace.join(".");
        let path = namespace.get(1..).unwrap_or_default().to_vec();
        fv.define_leaf(LeafSpec {
            name: name.clone(),
            help: self.help.clone().unwrap_or(name),
            parser: Rc::clone(&self.parser),
            serializer: Rc::clone(&self.serializer),
            default: self.default.clone(),
            required: false,
            boolean: false,
            multi: true,
            sink: Some((Rc::clone(shared), path)),
        })
    }
}

/// One position in a settings tree.
pub enum Node {
    Leaf(Item),
    Multi(MultiItem),
    Branch(Tree),
}

/// A flat or nested settings tree, built by chaining.
///
/// ```ignore
/// let tree = Tree::new()
///     .item("mode", Item::string(Some("pad")))
///     .branch(
///         "sizes",
///         Tree::new()
///             .item("width", Item::integer(Some(5)))
///             .item("height", Item::integer(Some(7))),
///     );
/// ```
#[derive(Default)]
pub struct Tree {
    entries: Vec<(String, Node)>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item(mut self, key: &str, item: Item) -> Self {
        self.entries.push((key.to_string(), Node::Leaf(item)));
        self
    }

    pub fn multi(mut self, key: &str, item: MultiItem) -> Self {
        self.entries.push((key.to_string(), Node::Multi(item)));
        self
    }

    pub fn branch(mut self, key: &str, tree: Tree) -> Self {
        self.entries.push((key.to_string(), Node::Branch(tree)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> &[(String, Node)] {
        &self.entries
    }
}
