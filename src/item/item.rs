//! Normalized item representation

use super::query::LinkedItemQuery;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while building or validating an item
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("item of type {item_type} has empty unique attribute {attribute}")]
    EmptyUniqueAttribute { item_type: String, attribute: String },

    #[error("attributes must serialize to an object, got {0}")]
    NotAnObject(&'static str),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Health of the underlying resource, when the provider reports one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Health {
    Ok,
    Warning,
    Error,
    Pending,
    Unknown,
}

/// Ordered attribute map of an item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, Value>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a provider struct into attributes.
    ///
    /// Null fields are dropped and any top-level field named in `exclude`
    /// is left out.
    pub fn from_serialize<T: Serialize>(value: &T, exclude: &[&str]) -> Result<Self, ItemError> {
        let map = match serde_json::to_value(value)? {
            Value::Object(map) => map,
            Value::Null => return Err(ItemError::NotAnObject("null")),
            Value::Array(_) => return Err(ItemError::NotAnObject("array")),
            _ => return Err(ItemError::NotAnObject("scalar")),
        };

        let attrs = map
            .into_iter()
            .filter(|(k, v)| !v.is_null() && !exclude.contains(&k.as_str()))
            .collect();
        Ok(Self(attrs))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Render an attribute as a plain string. Missing and null values
    /// render as empty.
    pub fn get_string(&self, key: &str) -> String {
        match self.0.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// A normalized resource plus its outbound relationship pointers.
///
/// Items are constructed fresh on each upstream fetch and never mutated
/// after they leave the mapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "type")]
    pub item_type: String,
    /// Name of the attribute that identifies this item within its scope
    pub unique_attribute: String,
    pub attributes: Attributes,
    pub scope: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub linked_item_queries: Vec<LinkedItemQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<Health>,
}

impl Item {
    pub fn new(
        item_type: impl Into<String>,
        unique_attribute: impl Into<String>,
        attributes: Attributes,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            item_type: item_type.into(),
            unique_attribute: unique_attribute.into(),
            attributes,
            scope: scope.into(),
            tags: BTreeMap::new(),
            linked_item_queries: Vec::new(),
            health: None,
        }
    }

    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_link(mut self, link: LinkedItemQuery) -> Self {
        self.linked_item_queries.push(link);
        self
    }

    pub fn with_health(mut self, health: Health) -> Self {
        self.health = Some(health);
        self
    }

    /// Value of the unique attribute, rendered as a string
    pub fn unique_attribute_value(&self) -> String {
        self.attributes.get_string(&self.unique_attribute)
    }

    /// `{scope}.{type}.{unique attribute value}`
    pub fn globally_unique_name(&self) -> String {
        format!(
            "{}.{}.{}",
            self.scope,
            self.item_type,
            self.unique_attribute_value()
        )
    }

    /// Check the unique-attribute invariant.
    pub fn validate(&self) -> Result<(), ItemError> {
        if self.unique_attribute_value().is_empty() {
            return Err(ItemError::EmptyUniqueAttribute {
                item_type: self.item_type.clone(),
                attribute: self.unique_attribute.clone(),
            });
        }
        Ok(())
    }
}
