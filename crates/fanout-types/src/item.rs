use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::path;

/// A typed value held in a [`ContentItem`]'s property map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PropertyValue {
    String(String),
    Strings(Vec<String>),
    Bool(bool),
    Long(i64),
    Date(DateTime<Utc>),
    Binary(Vec<u8>),
}

impl PropertyValue {
    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Strings(_) => "strings",
            Self::Bool(_) => "bool",
            Self::Long(_) => "long",
            Self::Date(_) => "date",
            Self::Binary(_) => "binary",
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        Self::Strings(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

/// An addressable node in the hierarchical store.
///
/// An item has a unique `/`-separated path, a stable opaque id and a typed
/// property map. Items are owned by the store; delivery code only ever holds
/// a snapshot for the duration of one delivery attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    path: String,
    id: String,
    properties: BTreeMap<String, PropertyValue>,
}

impl ContentItem {
    /// Create an item with an empty property map.
    pub fn new(path: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            id: id.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Create an item whose id is the last segment of its path.
    pub fn at(path: impl Into<String>) -> Self {
        let path = path.into();
        let id = path::name(&path).to_string();
        Self::new(path, id)
    }

    /// Builder-style property setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Path of the parent node, or `None` for the root.
    pub fn parent_path(&self) -> Option<&str> {
        path::parent(&self.path)
    }

    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        self.properties.remove(name)
    }

    /// Read a single-valued string property.
    ///
    /// A multi-valued property yields its first value.
    pub fn string(&self, name: &str) -> Option<&str> {
        match self.properties.get(name)? {
            PropertyValue::String(s) => Some(s.as_str()),
            PropertyValue::Strings(v) => v.first().map(String::as_str),
            _ => None,
        }
    }

    /// Read a possibly multi-valued string property.
    ///
    /// Single string values are split on commas, so `"a, b"` and
    /// `["a", "b"]` read the same. Blank entries are dropped.
    pub fn strings(&self, name: &str) -> Vec<String> {
        let raw: Vec<&str> = match self.properties.get(name) {
            Some(PropertyValue::String(s)) => s.split(',').collect(),
            Some(PropertyValue::Strings(v)) => v.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.properties.get(name)? {
            PropertyValue::Bool(b) => Some(*b),
            PropertyValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Read an integer property, failing if it exists with another type.
    pub fn long(&self, name: &str) -> Result<Option<i64>, TypeError> {
        match self.properties.get(name) {
            None => Ok(None),
            Some(PropertyValue::Long(n)) => Ok(Some(*n)),
            Some(other) => Err(TypeError::PropertyType {
                name: name.to_string(),
                expected: "long",
                actual: other.type_name(),
            }),
        }
    }

    /// Copy this item's properties to a new location with a new id.
    pub fn relocate(&self, path: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            id: id.into(),
            properties: self.properties.clone(),
        }
    }
}
