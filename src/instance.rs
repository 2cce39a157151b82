//! Deriving a settings tree from an existing value.
//!
//! Any `Serialize` type can seed a tree: the value is serialized once,
//! each field becomes an item typed by the field's runtime shape, nested
//! structs become branches, and fields with no flag representation (nulls,
//! nested or mixed sequences) are kept as fixed defaults that overrides
//! cannot reach. [`define_from_instance`] registers the result and hands
//! back a typed holder whose `value()` deserializes the current settings
//! back into the original type.
//!
//! Typing from the runtime shape is deliberately permissive: a field that
//! holds an integer is overridable with any integer, whatever narrower
//! type the struct declares. Deserialization in `value()` is the backstop.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

use crate::define::{DictHolder, define_dict};
use crate::error::FlagError;
use crate::items::{Item, Tree};
use crate::registry::FlagValues;
use crate::value::{Map, Value, deep_merge, set_path};

/// The output of [`auto_from_instance`]: the overridable tree plus the
/// fields that stay fixed at their serialized value.
pub struct Derived {
    tree: Tree,
    fixed: Vec<(Vec<String>, Value)>,
}

impl Derived {
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn fixed(&self) -> &[(Vec<String>, Value)] {
        &self.fixed
    }
}

fn scalar_item(json: &serde_json::Value) -> Option<Item> {
    match json {
        serde_json::Value::Bool(b) => Some(Item::boolean(Some(*b))),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Item::integer(Some(i)))
            } else {
                n.as_f64().map(|f| Item::float(Some(f)))
            }
        }
        serde_json::Value::String(s) => Some(Item::string(Some(s))),
        _ => None,
    }
}

fn is_flat_scalar(json: &serde_json::Value) -> bool {
    matches!(
        json,
        serde_json::Value::Bool(_) | serde_json::Value::Number(_) | serde_json::Value::String(_)
    )
}

fn derive_object(
    path: &mut Vec<String>,
    fields: &serde_json::Map<String, serde_json::Value>,
    fixed: &mut Vec<(Vec<String>, Value)>,
) -> Result<Tree, FlagError> {
    let mut tree = Tree::new();
    for (key, field) in fields {
        path.push(key.clone());
        match field {
            serde_json::Value::Object(inner) if !inner.is_empty() => {
                let subtree = derive_object(path, inner, fixed)?;
                if subtree.is_empty() {
                    // Every nested field was fixed; nothing to branch on.
                    fixed.push((path.clone(), Value::from_json(field)));
                } else {
                    tree = tree.branch(key, subtree);
                }
            }
            serde_json::Value::Array(elements) if elements.iter().all(is_flat_scalar) => {
                let defaults = elements.iter().map(Value::from_json).collect();
                tree = tree.item(key, Item::sequence(Some(defaults))?);
            }
            scalar if is_flat_scalar(scalar) => {
                if let Some(item) = scalar_item(scalar) {
                    tree = tree.item(key, item);
                }
            }
            other => {
                // Null, mixed or nested sequence, empty object: keep the
                // serialized value but expose no flag for it.
                fixed.push((path.clone(), Value::from_json(other)));
            }
        }
        path.pop();
    }
    Ok(tree)
}

/// Derive a tree from a serializable value. Each scalar field becomes an
/// item defaulting to the field's current value.
pub fn auto_from_instance<T: Serialize>(instance: &T) -> Result<Derived, FlagError> {
    let json = serde_json::to_value(instance).map_err(|e| FlagError::Factory(e.to_string()))?;
    let serde_json::Value::Object(fields) = json else {
        return Err(FlagError::Construction {
            reason: format!(
                "instance must serialize to a mapping, got {}",
                Value::from_json(&json).type_name()
            ),
        });
    };
    let mut fixed = Vec::new();
    let mut path = Vec::new();
    let tree = derive_object(&mut path, &fields, &mut fixed)?;
    if tree.is_empty() {
        return Err(FlagError::Construction {
            reason: "instance has no overridable fields".to_string(),
        });
    }
    Ok(Derived { tree, fixed })
}

/// Derive and register a tree from an instance. The holder deserializes
/// the current settings back into `T` on demand.
pub fn define_from_instance<T>(
    root: &str,
    instance: &T,
    help: &str,
    fv: &FlagValues,
) -> Result<InstanceHolder<T>, FlagError>
where
    T: Serialize + DeserializeOwned,
{
    let derived = auto_from_instance(instance)?;
    let dict = define_dict(root, derived.tree, help, fv)?;
    {
        let shared = dict.shared();
        let mut map = shared.borrow_mut();
        for (path, value) in derived.fixed {
            set_path(&mut map, &path, value);
        }
    }
    Ok(InstanceHolder {
        dict,
        _marker: PhantomData,
    })
}

/// A registered instance-derived tree, typed by the source instance.
pub struct InstanceHolder<T> {
    dict: DictHolder,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> InstanceHolder<T> {
    pub fn name(&self) -> &str {
        self.dict.name()
    }

    /// The raw resolved settings, fixed fields included.
    pub fn settings(&self) -> Map {
        self.dict.value()
    }

    fn build(&self, settings: Map) -> Result<T, FlagError> {
        serde_json::from_value(Value::Map(settings).to_json())
            .map_err(|e| FlagError::Factory(e.to_string()))
    }

    /// Deserialize the current settings into a fresh `T`.
    pub fn value(&self) -> Result<T, FlagError> {
        self.build(self.dict.value())
    }

    /// Deserialize with explicit overrides layered on top of the current
    /// settings. The registered flags are not touched.
    pub fn call_with(&self, overrides: Map) -> Result<T, FlagError> {
        self.build(deep_merge(self.dict.value(), overrides))
    }
}
