// src/package/parameters.rs

//! Ordered name/value parameter sets
//!
//! Both the package configuration and each content entry carry their
//! attributes as an ordered list of unique-by-name string pairs.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// A single name/value pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// A parameter needs both a name and a value
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && !self.value.is_empty()
    }
}

/// Ordered set of parameters, unique by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
    params: Vec<Parameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing the value of an existing one in place.
    ///
    /// Invalid pairs (empty name or value) are logged and dropped. Returns
    /// whether the pair was stored.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        self.insert(Parameter::new(name, value))
    }

    /// Insert a parameter with the same replace-in-place contract as `set`
    pub fn insert(&mut self, param: Parameter) -> bool {
        if !param.is_valid() {
            warn!(
                "Ignoring invalid parameter (name={:?}, value={:?})",
                param.name, param.value
            );
            return false;
        }

        match self.params.iter_mut().find(|p| p.name == param.name) {
            Some(existing) => existing.value = param.value,
            None => self.params.push(param),
        }
        true
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }

    /// Parse a parameter as a boolean (`true`/`false`, case-insensitive)
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        })
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> bool {
        self.set(name, value.to_string())
    }

    pub fn remove(&mut self, name: &str) -> Option<Parameter> {
        let index = self.params.iter().position(|p| p.name == name)?;
        Some(self.params.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// All stored pairs are valid by construction; this also holds for sets
    /// deserialized from other sources.
    pub fn is_valid(&self) -> bool {
        self.params.iter().all(Parameter::is_valid)
    }
}

impl<'a> IntoIterator for &'a ParameterSet {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}
