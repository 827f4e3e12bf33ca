//! Variable store
//!
//! A hierarchy of scopes: globals at the bottom, one frame per active
//! function call above. Bindings hold scalars, indexed arrays, or
//! associative arrays, plus attributes. Readonly bindings cannot be
//! reassigned; exported bindings are copied into child environments;
//! unsetting a local reveals any shadowed outer binding.

pub mod special;

use std::collections::HashMap;

use indexmap::IndexMap;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum VarError {
    #[error("{0}: readonly variable")]
    Readonly(String),
    #[error("{0}: bad array subscript")]
    BadSubscript(String),
}

/// A binding's value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(String),
    /// Sparse indexed array.
    Indexed(Vec<Option<String>>),
    /// Associative array, insertion-ordered.
    Assoc(IndexMap<String, String>),
}

impl Value {
    /// The value seen by a plain `$name` reference: the scalar itself, or
    /// element zero of an array.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            Value::Indexed(v) => v.first().and_then(|e| e.as_deref()),
            Value::Assoc(m) => m.get("0").map(|s| s.as_str()),
        }
    }

    /// Number of set elements (1 for a scalar).
    pub fn element_count(&self) -> usize {
        match self {
            Value::Scalar(_) => 1,
            Value::Indexed(v) => v.iter().filter(|e| e.is_some()).count(),
            Value::Assoc(m) => m.len(),
        }
    }

    /// All set elements in order.
    pub fn elements(&self) -> Vec<String> {
        match self {
            Value::Scalar(s) => vec![s.clone()],
            Value::Indexed(v) => v.iter().flatten().cloned().collect(),
            Value::Assoc(m) => m.values().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attributes {
    pub exported: bool,
    pub readonly: bool,
    pub integer: bool,
    pub lowercase: bool,
    pub uppercase: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Variable {
    /// `None` for a binding that is declared but unset (`local x`).
    pub value: Option<Value>,
    pub attributes: Attributes,
}

/// Target of an element assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Subscript {
    Index(i64),
    Key(String),
}

/// The scope stack.
#[derive(Debug, Clone)]
pub struct VarStore {
    scopes: Vec<HashMap<String, Variable>>,
}

impl Default for VarStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VarStore {
    pub fn new() -> Self {
        VarStore {
            scopes: vec![HashMap::new()],
        }
    }

    /// Seed the global scope from the process environment; every
    /// inherited variable is exported.
    pub fn from_environment() -> Self {
        let mut store = Self::new();
        for (name, value) in std::env::vars() {
            store.scopes[0].insert(
                name,
                Variable {
                    value: Some(Value::Scalar(value)),
                    attributes: Attributes {
                        exported: true,
                        ..Attributes::default()
                    },
                },
            );
        }
        store
    }

    // --- scope management --------------------------------------------------

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn in_function(&self) -> bool {
        self.scopes.len() > 1
    }

    /// Create an unset binding in the innermost scope (`local x`).
    pub fn declare_local(&mut self, name: &str) {
        self.scopes
            .last_mut()
            .unwrap()
            .entry(name.to_string())
            .or_default();
    }

    // --- lookup ------------------------------------------------------------

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    pub fn get_scalar(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.value.as_ref()).and_then(Value::as_scalar)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).map_or(false, |v| v.value.is_some())
    }

    pub fn is_readonly(&self, name: &str) -> bool {
        self.get(name).map_or(false, |v| v.attributes.readonly)
    }

    // --- assignment --------------------------------------------------------

    /// Assign a scalar, honoring readonly and the case attributes. The
    /// binding is updated where it already exists; otherwise it is
    /// created in the global scope.
    pub fn set_scalar(
        &mut self,
        name: &str,
        value: impl Into<String>,
        append: bool,
    ) -> Result<(), VarError> {
        let value = value.into();
        let var = self.binding_mut(name);
        if var.attributes.readonly {
            return Err(VarError::Readonly(name.to_string()));
        }
        let value = apply_case_attrs(&var.attributes, value);
        match (&mut var.value, append) {
            (Some(Value::Scalar(old)), true) => old.push_str(&value),
            (Some(Value::Indexed(v)), _) => {
                // `a=x` on an array assigns element zero, like `a[0]=x`.
                if v.is_empty() {
                    v.push(Some(value));
                } else if append {
                    match &mut v[0] {
                        Some(old) => old.push_str(&value),
                        None => v[0] = Some(value),
                    }
                } else {
                    v[0] = Some(value);
                }
            }
            (slot, _) => *slot = Some(Value::Scalar(value)),
        }
        Ok(())
    }

    /// Assign one array element.
    pub fn set_element(
        &mut self,
        name: &str,
        subscript: Subscript,
        value: impl Into<String>,
        append: bool,
    ) -> Result<(), VarError> {
        let value = value.into();
        let var = self.binding_mut(name);
        if var.attributes.readonly {
            return Err(VarError::Readonly(name.to_string()));
        }
        let value = apply_case_attrs(&var.attributes, value);
        match subscript {
            Subscript::Index(i) => {
                if i < 0 {
                    return Err(VarError::BadSubscript(format!("{name}[{i}]")));
                }
                let i = i as usize;
                if let Some(Value::Assoc(m)) = &mut var.value {
                    let key = i.to_string();
                    if append {
                        m.entry(key).or_default().push_str(&value);
                    } else {
                        m.insert(key, value);
                    }
                    return Ok(());
                }
                // Promote a scalar to element zero; start empty otherwise.
                if let Some(Value::Scalar(_)) = &var.value {
                    if let Some(Value::Scalar(s)) = var.value.take() {
                        var.value = Some(Value::Indexed(vec![Some(s)]));
                    }
                } else if var.value.is_none() {
                    var.value = Some(Value::Indexed(Vec::new()));
                }
                let vec = match &mut var.value {
                    Some(Value::Indexed(v)) => v,
                    _ => unreachable!(),
                };
                if vec.len() <= i {
                    vec.resize(i + 1, None);
                }
                if append {
                    match &mut vec[i] {
                        Some(old) => old.push_str(&value),
                        slot => *slot = Some(value),
                    }
                } else {
                    vec[i] = Some(value);
                }
            }
            Subscript::Key(key) => {
                if !matches!(&var.value, Some(Value::Assoc(_))) {
                    var.value = Some(Value::Assoc(IndexMap::new()));
                }
                let map = match &mut var.value {
                    Some(Value::Assoc(m)) => m,
                    _ => unreachable!(),
                };
                if append {
                    map.entry(key).or_default().push_str(&value);
                } else {
                    map.insert(key, value);
                }
            }
        }
        Ok(())
    }

    /// Replace a binding with a whole indexed array.
    pub fn set_array(&mut self, name: &str, elements: Vec<String>) -> Result<(), VarError> {
        let var = self.binding_mut(name);
        if var.attributes.readonly {
            return Err(VarError::Readonly(name.to_string()));
        }
        var.value = Some(Value::Indexed(elements.into_iter().map(Some).collect()));
        Ok(())
    }

    /// Unset a name in the innermost scope holding it; an outer binding
    /// of the same name becomes visible again.
    pub fn unset(&mut self, name: &str) -> Result<(), VarError> {
        if self.is_readonly(name) {
            return Err(VarError::Readonly(name.to_string()));
        }
        for scope in self.scopes.iter_mut().rev() {
            if scope.remove(name).is_some() {
                return Ok(());
            }
        }
        Ok(())
    }

    // --- attributes --------------------------------------------------------

    pub fn set_exported(&mut self, name: &str, exported: bool) {
        self.binding_mut(name).attributes.exported = exported;
    }

    pub fn set_readonly(&mut self, name: &str) {
        self.binding_mut(name).attributes.readonly = true;
    }

    pub fn set_integer(&mut self, name: &str, on: bool) {
        self.binding_mut(name).attributes.integer = on;
    }

    // --- environment -------------------------------------------------------

    /// All exported name/value pairs visible from the current scope,
    /// innermost binding winning.
    pub fn environment(&self) -> Vec<(String, String)> {
        let mut seen: HashMap<&str, &Variable> = HashMap::new();
        for scope in &self.scopes {
            for (name, var) in scope {
                seen.insert(name, var);
            }
        }
        let mut env: Vec<(String, String)> = seen
            .into_iter()
            .filter(|(_, v)| v.attributes.exported)
            .filter_map(|(n, v)| {
                v.value
                    .as_ref()
                    .and_then(Value::as_scalar)
                    .map(|s| (n.to_string(), s.to_string()))
            })
            .collect();
        env.sort();
        env
    }

    /// Every visible binding, for `set` output.
    pub fn visible(&self) -> Vec<(String, &Variable)> {
        let mut seen: HashMap<&str, &Variable> = HashMap::new();
        for scope in &self.scopes {
            for (name, var) in scope {
                seen.insert(name, var);
            }
        }
        let mut all: Vec<(String, &Variable)> =
            seen.into_iter().map(|(n, v)| (n.to_string(), v)).collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Clone of the visible binding, for save/restore around per-command
    /// assignments.
    pub fn snapshot(&self, name: &str) -> Option<Variable> {
        self.get(name).cloned()
    }

    /// Put a snapshot back (or remove the binding if there was none).
    /// Bypasses the readonly check: this undoes a temporary assignment.
    pub fn restore_binding(&mut self, name: &str, snapshot: Option<Variable>) {
        match snapshot {
            Some(var) => *self.binding_mut(name) = var,
            None => {
                for scope in self.scopes.iter_mut().rev() {
                    if scope.remove(name).is_some() {
                        break;
                    }
                }
            }
        }
    }

    /// The binding to mutate for `name`: the innermost existing one, or a
    /// fresh global.
    fn binding_mut(&mut self, name: &str) -> &mut Variable {
        let idx = self
            .scopes
            .iter()
            .rposition(|s| s.contains_key(name))
            .unwrap_or(0);
        self.scopes[idx]
            .entry(name.to_string())
            .or_default()
    }
}

fn apply_case_attrs(attrs: &Attributes, value: String) -> String {
    if attrs.lowercase {
        value.to_lowercase()
    } else if attrs.uppercase {
        value.to_uppercase()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn scalar_roundtrip() {
        let mut store = VarStore::new();
        store.set_scalar("x", "hello", false).unwrap();
        assert_eq!(store.get_scalar("x"), Some("hello"));
        store.set_scalar("x", " world", true).unwrap();
        assert_eq!(store.get_scalar("x"), Some("hello world"));
    }

    #[test]
    fn readonly_rejects_assignment() {
        let mut store = VarStore::new();
        store.set_scalar("x", "1", false).unwrap();
        store.set_readonly("x");
        assert_matches!(
            store.set_scalar("x", "2", false),
            Err(VarError::Readonly(_))
        );
        assert_eq!(store.get_scalar("x"), Some("1"));
        assert_matches!(store.unset("x"), Err(VarError::Readonly(_)));
    }

    #[test]
    fn local_shadows_and_reveals() {
        let mut store = VarStore::new();
        store.set_scalar("x", "outer", false).unwrap();
        store.push_scope();
        store.declare_local("x");
        store.set_scalar("x", "inner", false).unwrap();
        assert_eq!(store.get_scalar("x"), Some("inner"));
        store.unset("x").unwrap();
        assert_eq!(store.get_scalar("x"), Some("outer"));
        store.pop_scope();
        assert_eq!(store.get_scalar("x"), Some("outer"));
    }

    #[test]
    fn function_scope_assignment_without_local_is_global() {
        let mut store = VarStore::new();
        store.push_scope();
        store.set_scalar("x", "1", false).unwrap();
        store.pop_scope();
        assert_eq!(store.get_scalar("x"), Some("1"));
    }

    #[test]
    fn indexed_array_elements() {
        let mut store = VarStore::new();
        store
            .set_array("a", vec!["one".into(), "two".into()])
            .unwrap();
        store
            .set_element("a", Subscript::Index(5), "six", false)
            .unwrap();
        let var = store.get("a").unwrap();
        match var.value.as_ref().unwrap() {
            Value::Indexed(v) => {
                assert_eq!(v.len(), 6);
                assert_eq!(v[5].as_deref(), Some("six"));
                assert_eq!(var.value.as_ref().unwrap().element_count(), 3);
            }
            other => panic!("expected indexed array, got {other:?}"),
        }
        // $a sees element zero.
        assert_eq!(store.get_scalar("a"), Some("one"));
    }

    #[test]
    fn scalar_promotes_to_array() {
        let mut store = VarStore::new();
        store.set_scalar("a", "zero", false).unwrap();
        store
            .set_element("a", Subscript::Index(1), "one", false)
            .unwrap();
        assert_eq!(
            store.get("a").unwrap().value.as_ref().unwrap().elements(),
            vec!["zero".to_string(), "one".to_string()]
        );
    }

    #[test]
    fn exported_bindings_reach_environment() {
        let mut store = VarStore::new();
        store.set_scalar("A", "1", false).unwrap();
        store.set_scalar("B", "2", false).unwrap();
        store.set_exported("B", true);
        let env = store.environment();
        assert!(env.iter().any(|(n, v)| n == "B" && v == "2"));
        assert!(!env.iter().any(|(n, _)| n == "A"));
    }
}
