//! Deriving a settings tree from a constructor signature.
//!
//! Rust has no runtime parameter reflection, so the caller describes the
//! constructor once as a [`Signature`]: each parameter's name, declared
//! type, and default. [`auto`] turns that description into a [`Tree`] of
//! items, and [`define_auto`] goes one step further, registering the tree
//! and binding it to a factory closure so the fully-overridden settings
//! can be turned back into a value of the constructor's output type.
//!
//! Strict mode (the default) fails on parameters that are missing a type
//! or use an unsupported one; relaxed mode logs and skips them, leaving
//! those parameters at whatever the factory does without an entry.

use std::rc::Rc;

use crate::define::{DictHolder, define_dict};
use crate::error::FlagError;
use crate::items::{Item, Tree};
use crate::parsers::{ArgParser, BoolParser, EnumParser, FlagEnum, SequenceParser};
use crate::registry::FlagValues;
use crate::time::{DateTimeParser, DurationParser};
use crate::value::{Map, Value, deep_merge};

/// Element type of a homogeneous sequence parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarType {
    Bool,
    Int,
    Float,
    Str,
}

impl ScalarType {
    fn matches(self, value: &Value) -> bool {
        match self {
            ScalarType::Bool => matches!(value, Value::Bool(_)),
            ScalarType::Int => matches!(value, Value::Int(_)),
            // Ints widen, so an integer default element is fine.
            ScalarType::Float => matches!(value, Value::Float(_) | Value::Int(_)),
            ScalarType::Str => matches!(value, Value::Str(_)),
        }
    }
}

/// The declared type of one constructor parameter.
#[derive(Clone, Debug)]
pub enum ParamType {
    Bool,
    Int,
    Float,
    Str,
    DateTime,
    Duration,
    Enumeration {
        values: Vec<String>,
        case_sensitive: bool,
    },
    Sequence(ScalarType),
    /// An optional wrapper; classification looks through it.
    Optional(Box<ParamType>),
    /// Any type the derivation cannot map to an item. Carries the type's
    /// display name for the error or skip log.
    Other(String),
}

impl ParamType {
    pub fn enumeration(values: &[&str], case_sensitive: bool) -> Self {
        ParamType::Enumeration {
            values: values.iter().map(|s| (*s).to_string()).collect(),
            case_sensitive,
        }
    }

    /// An enumeration over a [`FlagEnum`]'s variant names, matched
    /// case-insensitively.
    pub fn enum_class<E: FlagEnum>() -> Self {
        ParamType::Enumeration {
            values: E::VARIANTS.iter().map(|s| (*s).to_string()).collect(),
            case_sensitive: false,
        }
    }

    pub fn optional(inner: ParamType) -> Self {
        ParamType::Optional(Box::new(inner))
    }

    fn display_name(&self) -> String {
        match self {
            ParamType::Bool => "bool".to_string(),
            ParamType::Int => "int".to_string(),
            ParamType::Float => "float".to_string(),
            ParamType::Str => "str".to_string(),
            ParamType::DateTime => "datetime".to_string(),
            ParamType::Duration => "duration".to_string(),
            ParamType::Enumeration { values, .. } => format!("enum[{}]", values.join("|")),
            ParamType::Sequence(_) => "sequence".to_string(),
            ParamType::Optional(inner) => format!("optional {}", inner.display_name()),
            ParamType::Other(name) => name.clone(),
        }
    }
}

struct Param {
    name: String,
    ty: Option<ParamType>,
    default: Option<Value>,
}

/// A description of a constructor: its name and parameters in order.
pub struct Signature {
    name: String,
    params: Vec<Param>,
}

impl Signature {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A typed parameter with a default.
    pub fn param(mut self, name: &str, ty: ParamType, default: Value) -> Self {
        self.params.push(Param {
            name: name.to_string(),
            ty: Some(ty),
            default: Some(default),
        });
        self
    }

    /// A typed parameter without a default; its item is marked required.
    pub fn required(mut self, name: &str, ty: ParamType) -> Self {
        self.params.push(Param {
            name: name.to_string(),
            ty: Some(ty),
            default: None,
        });
        self
    }

    /// A parameter with no declared type. Fails derivation in strict mode,
    /// skipped otherwise.
    pub fn untyped(mut self, name: &str, default: Value) -> Self {
        self.params.push(Param {
            name: name.to_string(),
            ty: None,
            default: Some(default),
        });
        self
    }
}

/// Options for [`auto_with`]. The default is strict with nothing skipped.
pub struct AutoOptions {
    /// Fail on untyped or unsupported parameters instead of skipping them.
    pub strict: bool,
    /// Parameter names to leave out of the derived tree entirely.
    pub skip_params: Vec<String>,
}

impl Default for AutoOptions {
    fn default() -> Self {
        Self {
            strict: true,
            skip_params: Vec::new(),
        }
    }
}

fn item_for(ty: &ParamType, default: Option<Value>) -> Result<Item, FlagError> {
    if let ParamType::Optional(inner) = ty {
        // Optional affects only classification; an absent default still
        // means the parameter is required.
        return item_for(inner, default);
    }

    let required = default.is_none();
    let default = default.unwrap_or(Value::None);

    let item = match ty {
        ParamType::Bool => {
            let b = match &default {
                Value::None => None,
                value => match BoolParser.parse(value)? {
                    Value::Bool(b) => Some(b),
                    _ => None,
                },
            };
            Item::boolean(b)
        }
        ParamType::Int => Item::new(default, Rc::new(crate::parsers::IntParser))?,
        ParamType::Float => Item::new(default, Rc::new(crate::parsers::FloatParser))?,
        ParamType::Str => Item::new(default, Rc::new(crate::parsers::StringParser))?,
        ParamType::DateTime => Item::new(default, Rc::new(DateTimeParser))?,
        ParamType::Duration => Item::new(default, Rc::new(DurationParser))?,
        ParamType::Enumeration {
            values,
            case_sensitive,
        } => {
            let refs: Vec<&str> = values.iter().map(String::as_str).collect();
            Item::new(default, Rc::new(EnumParser::new(&refs, *case_sensitive)?))?
        }
        ParamType::Sequence(element) => {
            if let Value::Seq(items) = &default {
                for item in items {
                    if !element.matches(item) {
                        return Err(FlagError::BadElementType {
                            found: item.type_name().to_string(),
                        });
                    }
                }
            }
            Item::new(default, Rc::new(SequenceParser))?
        }
        ParamType::Optional(_) | ParamType::Other(_) => {
            return Err(FlagError::Construction {
                reason: format!("cannot derive an item for type {}", ty.display_name()),
            });
        }
    };
    if required { item.required() } else { Ok(item) }
}

fn is_other(ty: &ParamType) -> Option<&str> {
    match ty {
        ParamType::Other(name) => Some(name),
        ParamType::Optional(inner) => is_other(inner),
        _ => None,
    }
}

/// Derive a settings tree from a signature with default options.
pub fn auto(signature: &Signature) -> Result<Tree, FlagError> {
    auto_with(signature, &AutoOptions::default())
}

/// Derive a settings tree from a signature: one item per parameter, typed
/// by the declared parameter type, defaulted from the declared default.
pub fn auto_with(signature: &Signature, options: &AutoOptions) -> Result<Tree, FlagError> {
    let mut tree = Tree::new();
    for param in &signature.params {
        if options.skip_params.iter().any(|s| s == &param.name) {
            continue;
        }
        let Some(ty) = &param.ty else {
            if options.strict {
                return Err(FlagError::MissingAnnotation(param.name.clone()));
            }
            tracing::warn!(
                constructor = signature.name,
                param = param.name,
                "skipping parameter with no declared type"
            );
            continue;
        };
        if let Some(annotation) = is_other(ty) {
            if options.strict {
                return Err(FlagError::UnsupportedType {
                    name: param.name.clone(),
                    annotation: annotation.to_string(),
                });
            }
            tracing::warn!(
                constructor = signature.name,
                param = param.name,
                annotation,
                "skipping parameter with unsupported type"
            );
            continue;
        }
        let item = item_for(ty, param.default.clone())
            .map_err(|e| FlagError::illegal_value(&param.name, e))?;
        tree = tree.item(&param.name, item.help(&format!("{} for {}", param.name, signature.name)));
    }
    if tree.is_empty() {
        return Err(FlagError::Construction {
            reason: format!(
                "no usable parameters derived from constructor {:?}",
                signature.name
            ),
        });
    }
    Ok(tree)
}

/// Derive, register, and bind a settings tree to a factory in one step.
/// Reading the holder's value runs the factory over the tree's current
/// resolved settings.
pub fn define_auto<T, F>(
    root: &str,
    signature: &Signature,
    factory: F,
    help: &str,
    fv: &FlagValues,
    options: &AutoOptions,
) -> Result<AutoHolder<T>, FlagError>
where
    F: Fn(&Map) -> Result<T, FlagError> + 'static,
{
    let tree = auto_with(signature, options)?;
    let dict = define_dict(root, tree, help, fv)?;
    Ok(AutoHolder {
        dict,
        factory: Box::new(factory),
    })
}

/// A registered, factory-bound derived tree.
pub struct AutoHolder<T> {
    dict: DictHolder,
    factory: Box<dyn Fn(&Map) -> Result<T, FlagError>>,
}

impl<T> AutoHolder<T> {
    pub fn name(&self) -> &str {
        self.dict.name()
    }

    /// The tree's current resolved settings, before the factory runs.
    pub fn settings(&self) -> Map {
        self.dict.value()
    }

    /// Run the factory over the current settings.
    pub fn value(&self) -> Result<T, FlagError> {
        (self.factory)(&self.dict.value())
    }

    /// Run the factory with explicit overrides layered on top of the
    /// current settings. The registered flags are not touched.
    pub fn call_with(&self, overrides: Map) -> Result<T, FlagError> {
        let merged = deep_merge(self.dict.value(), overrides);
        (self.factory)(&merged)
    }
}
