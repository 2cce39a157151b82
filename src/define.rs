//! Registering a settings tree: one dotted flag per leaf plus an
//! aggregate flag for the root.
//!
//! [`define_dict`] turns a [`Tree`] into flags named by dotted paths
//! (`cfg.b.c`) plus one aggregate flag under the root name. The aggregate
//! exposes the whole tree as a mapping but cannot be overridden directly;
//! overrides go through the leaves, and write-through keeps the shared
//! mapping current. Registration is all-or-nothing: every name is checked
//! against the registry before the first flag is created.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::FlagError;
use crate::items::{Node, Tree};
use crate::parsers::SequenceParser;
use crate::registry::{FlagHolder, FlagValues, SharedMap};
use crate::value::{Map, Value};

/// Pull the default nested mapping out of a tree without registering
/// anything. Validates the tree's shape: non-empty, dot-free keys, no
/// duplicates at any level.
pub fn extract_defaults(tree: &Tree) -> Result<Map, FlagError> {
    if tree.is_empty() {
        return Err(FlagError::Construction {
            reason: "a settings tree must contain at least one entry".to_string(),
        });
    }
    let mut defaults = Map::new();
    for (key, node) in tree.entries() {
        if key.is_empty() || key.contains('.') {
            return Err(FlagError::Construction {
                reason: format!("invalid tree key {key:?}: keys must be non-empty and dot-free"),
            });
        }
        if defaults.contains_key(key) {
            return Err(FlagError::Construction {
                reason: format!("duplicate tree key {key:?}"),
            });
        }
        let value = match node {
            Node::Leaf(item) => item.default_value().clone(),
            Node::Multi(item) => item.default_value().clone(),
            Node::Branch(subtree) => Value::Map(extract_defaults(subtree)?),
        };
        defaults.insert(key.clone(), value);
    }
    Ok(defaults)
}

fn collect_leaf_names(namespace: &mut Vec<String>, tree: &Tree, out: &mut Vec<String>) {
    for (key, node) in tree.entries() {
        namespace.push(key.clone());
        match node {
            Node::Leaf(_) | Node::Multi(_) => out.push(namespace.join(".")),
            Node::Branch(subtree) => collect_leaf_names(namespace, subtree, out),
        }
        namespace.pop();
    }
}

fn define_leaves(
    namespace: &mut Vec<String>,
    tree: &Tree,
    shared: &SharedMap,
    fv: &FlagValues,
) -> Result<(), FlagError> {
    for (key, node) in tree.entries() {
        namespace.push(key.clone());
        match node {
            Node::Leaf(item) => {
                item.define(namespace, shared, fv)?;
            }
            Node::Multi(item) => {
                item.define(namespace, shared, fv)?;
            }
            Node::Branch(subtree) => define_leaves(namespace, subtree, shared, fv)?,
        }
        namespace.pop();
    }
    Ok(())
}

/// Register every leaf of `tree` as a dotted flag under `root` and return
/// the shared mapping the leaves write through into. No aggregate flag is
/// created; use [`define_dict`] for that.
pub fn define_flags(
    root: &str,
    tree: &Tree,
    fv: &FlagValues,
) -> Result<SharedMap, FlagError> {
    if root.is_empty() || root.contains('.') {
        return Err(FlagError::Construction {
            reason: format!("invalid root name {root:?}: must be non-empty and dot-free"),
        });
    }
    let defaults = extract_defaults(tree)?;

    let mut namespace = vec![root.to_string()];
    let mut names = Vec::new();
    collect_leaf_names(&mut namespace, tree, &mut names);
    for name in names.iter().chain(std::iter::once(&root.to_string())) {
        if fv.contains(name) {
            return Err(FlagError::DuplicateFlag(name.clone()));
        }
    }

    let shared: SharedMap = Rc::new(RefCell::new(defaults));
    define_leaves(&mut namespace, tree, &shared, fv)?;
    tracing::debug!(root, leaves = names.len(), "registered settings tree");
    Ok(shared)
}

/// Register a tree plus an aggregate flag under `root`, returning a holder
/// for reading the tree's current resolved value.
pub fn define_dict(
    root: &str,
    tree: Tree,
    help: &str,
    fv: &FlagValues,
) -> Result<DictHolder, FlagError> {
    let shared = define_flags(root, &tree, fv)?;
    let mut namespace = vec![root.to_string()];
    let mut leaves = Vec::new();
    collect_leaf_names(&mut namespace, &tree, &mut leaves);
    fv.define_aggregate(root, help, "dict", Rc::clone(&shared), leaves)?;
    Ok(DictHolder {
        name: root.to_string(),
        shared,
        fv: fv.clone(),
    })
}

/// Register one standalone sequence flag, outside any tree. Accepts the
/// same literal override syntax as sequence items (`--sizes=[1, 2, 3]`).
pub fn define_sequence(
    name: &str,
    default: Option<Vec<Value>>,
    help: &str,
    fv: &FlagValues,
) -> Result<FlagHolder, FlagError> {
    fv.define(
        name,
        default.map_or(Value::None, Value::Seq),
        help,
        Rc::new(SequenceParser),
        None,
    )
}

/// A handle to a registered settings tree.
pub struct DictHolder {
    name: String,
    shared: SharedMap,
    fv: FlagValues,
}

impl DictHolder {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A snapshot of the tree's current resolved values. Mutating the
    /// returned map does not affect the registered flags.
    pub fn value(&self) -> Map {
        self.shared.borrow().clone()
    }

    /// The live shared mapping itself. Flag updates are visible through
    /// this handle as soon as they happen.
    pub fn shared(&self) -> SharedMap {
        Rc::clone(&self.shared)
    }

    /// Whether any leaf of the tree was explicitly overridden.
    pub fn any_overridden(&self) -> Result<bool, FlagError> {
        let prefix = format!("{}.", self.name);
        for name in self.fv.flag_names() {
            if name.starts_with(&prefix) && self.fv.is_present(&name)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::Item;
    use crate::value::get_path;

    fn sample_tree() -> Tree {
        Tree::new()
            .item("a", Item::integer(Some(1)))
            .branch("b", Tree::new().item("c", Item::string(Some("x"))))
    }

    #[test]
    fn extract_defaults_nested_shape() {
        let defaults = extract_defaults(&sample_tree()).unwrap();
        assert_eq!(defaults["a"], Value::Int(1));
        let path = ["b".to_string(), "c".to_string()];
        assert_eq!(get_path(&defaults, &path), Some(&Value::Str("x".into())));
    }

    #[test]
    fn empty_tree_rejected() {
        assert!(matches!(
            extract_defaults(&Tree::new()),
            Err(FlagError::Construction { .. })
        ));
    }

    #[test]
    fn dotted_key_rejected() {
        let tree = Tree::new().item("a.b", Item::integer(Some(1)));
        assert!(extract_defaults(&tree).is_err());
    }

    #[test]
    fn duplicate_key_rejected() {
        let tree = Tree::new()
            .item("a", Item::integer(Some(1)))
            .item("a", Item::integer(Some(2)));
        assert!(extract_defaults(&tree).is_err());
    }

    #[test]
    fn define_dict_registers_dotted_leaves() {
        let fv = FlagValues::new();
        let holder = define_dict("cfg", sample_tree(), "test tree", &fv).unwrap();
        assert!(fv.contains("cfg"));
        assert!(fv.contains("cfg.a"));
        assert!(fv.contains("cfg.b.c"));
        assert_eq!(holder.value()["a"], Value::Int(1));
    }

    #[test]
    fn leaf_override_lands_in_tree_value() {
        let fv = FlagValues::new();
        let holder = define_dict("cfg", sample_tree(), "test tree", &fv).unwrap();
        fv.parse_args(["--cfg.b.c=y", "--cfg.a=5"]).unwrap();
        let value = holder.value();
        assert_eq!(value["a"], Value::Int(5));
        let path = ["b".to_string(), "c".to_string()];
        assert_eq!(get_path(&value, &path), Some(&Value::Str("y".into())));
    }

    #[test]
    fn aggregate_rejects_direct_override() {
        let fv = FlagValues::new();
        define_dict("cfg", sample_tree(), "test tree", &fv).unwrap();
        let err = fv.parse_args(["--cfg={'a': 2}"]).unwrap_err();
        match err {
            FlagError::OverrideDenied { name, leaves } => {
                assert_eq!(name, "cfg");
                assert!(leaves.contains("cfg.b.c"));
            }
            other => panic!("expected OverrideDenied, got: {other:?}"),
        }
    }

    #[test]
    fn aggregate_accepts_empty_sentinel() {
        let fv = FlagValues::new();
        define_dict("cfg", sample_tree(), "test tree", &fv).unwrap();
        fv.parse_args(["--cfg="]).unwrap();
        fv.set("cfg", Value::Str(String::new())).unwrap();
    }

    #[test]
    fn serialized_args_re_parse_to_same_tree() {
        let fv = FlagValues::new();
        let holder = define_dict("cfg", sample_tree(), "test tree", &fv).unwrap();
        fv.parse_args(["--cfg.a=9"]).unwrap();
        let tokens = fv.serialize_args();

        let fresh = FlagValues::new();
        let fresh_holder = define_dict("cfg", sample_tree(), "test tree", &fresh).unwrap();
        fresh.parse_args(tokens).unwrap();
        assert_eq!(fresh_holder.value(), holder.value());
    }

    #[test]
    fn name_collision_registers_nothing() {
        let fv = FlagValues::new();
        define_dict("cfg", sample_tree(), "first", &fv).unwrap();
        let before = fv.flag_names().len();
        let tree = Tree::new()
            .item("fresh", Item::integer(Some(1)))
            .branch("b", Tree::new().item("c", Item::string(None)));
        // The nested leaf would collide with cfg.b.c.
        assert!(define_flags("cfg", &tree, &fv).is_err());
        assert_eq!(fv.flag_names().len(), before);
        assert!(!fv.contains("cfg.fresh"));
    }

    #[test]
    fn standalone_sequence_flag_parses_literals() {
        let fv = FlagValues::new();
        let holder =
            define_sequence("sizes", Some(vec![Value::Int(1)]), "some sizes", &fv).unwrap();
        assert_eq!(
            holder.value().unwrap(),
            Value::Seq(vec![Value::Int(1)])
        );
        fv.parse_args(["--sizes=[2, 3]"]).unwrap();
        assert_eq!(
            holder.value().unwrap(),
            Value::Seq(vec![Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn shared_map_is_live() {
        let fv = FlagValues::new();
        let holder = define_dict("cfg", sample_tree(), "test tree", &fv).unwrap();
        let shared = holder.shared();
        fv.set("cfg.a", Value::Int(77)).unwrap();
        assert_eq!(shared.borrow()["a"], Value::Int(77));
    }

    #[test]
    fn any_overridden_tracks_presence() {
        let fv = FlagValues::new();
        let holder = define_dict("cfg", sample_tree(), "test tree", &fv).unwrap();
        assert!(!holder.any_overridden().unwrap());
        fv.set("cfg.a", Value::Int(2)).unwrap();
        assert!(holder.any_overridden().unwrap());
    }
}
