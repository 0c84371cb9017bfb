//! Definition entries and the seed interface.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::definition::merge::{merge, MergeError};

/// Default value and flags for a single configuration field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldDefinition {
    /// Value the field takes before the first fetch completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<Value>,

    /// Whether the field is expected to be refreshed on every load.
    ///
    /// Informational only: the cache never overrides a field on its own.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub on_load: bool,
}

impl FieldDefinition {
    /// Entry carrying a concrete initial value.
    pub fn with_value(value: impl Into<Value>) -> Self {
        Self {
            initial_value: Some(value.into()),
            on_load: false,
        }
    }

    /// Entry for an optional field with no initial value.
    pub fn without_value() -> Self {
        Self::default()
    }
}

/// Declarative default map for a configuration type `T`.
///
/// Every mandatory field of `T` needs an entry with an initial value;
/// optional fields may be left out entirely.
pub struct ConfigDefinition<T> {
    fields: BTreeMap<String, FieldDefinition>,
    _config: PhantomData<fn() -> T>,
}

impl<T> ConfigDefinition<T> {
    /// Create an empty definition.
    pub fn new() -> Self {
        Self::from_fields(BTreeMap::new())
    }

    fn from_fields(fields: BTreeMap<String, FieldDefinition>) -> Self {
        Self {
            fields,
            _config: PhantomData,
        }
    }

    /// Declare a field with its initial value.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let entry = self.fields.entry(name.into()).or_default();
        entry.initial_value = Some(value.into());
        self
    }

    /// Declare a field from any serializable value.
    pub fn field_serialized<V: Serialize>(
        self,
        name: impl Into<String>,
        value: &V,
    ) -> Result<Self, MergeError> {
        let name = name.into();
        let value = serde_json::to_value(value).map_err(|source| MergeError::Serialize {
            field: name.clone(),
            source,
        })?;
        Ok(self.field(name, value))
    }

    /// Declare an optional field without an initial value.
    pub fn optional(mut self, name: impl Into<String>) -> Self {
        self.fields.entry(name.into()).or_default();
        self
    }

    /// Flag a field as refreshed on every load.
    pub fn on_load(mut self, name: impl Into<String>) -> Self {
        self.fields.entry(name.into()).or_default().on_load = true;
        self
    }

    /// Insert a complete entry, replacing any previous one.
    pub fn insert(&mut self, name: impl Into<String>, definition: FieldDefinition) {
        self.fields.insert(name.into(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldDefinition)> {
        self.fields.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Names of the fields flagged with `on_load`.
    pub fn on_load_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, entry)| entry.on_load)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl<T> Default for ConfigDefinition<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ConfigDefinition<T> {
    fn clone(&self) -> Self {
        Self::from_fields(self.fields.clone())
    }
}

impl<T> fmt::Debug for ConfigDefinition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.fields.iter()).finish()
    }
}

impl<T> PartialEq for ConfigDefinition<T> {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl<T, K: Into<String>> FromIterator<(K, FieldDefinition)> for ConfigDefinition<T> {
    fn from_iter<I: IntoIterator<Item = (K, FieldDefinition)>>(iter: I) -> Self {
        Self::from_fields(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<T> Serialize for ConfigDefinition<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for ConfigDefinition<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        BTreeMap::deserialize(deserializer).map(Self::from_fields)
    }
}

/// Source of the seed configuration value.
///
/// Both modes produce the value shown before the first fetch completes.
#[derive(Debug, Clone)]
pub enum ConfigSeed<T> {
    /// Merge a declarative default map.
    Definition(ConfigDefinition<T>),
    /// Use an already-built value as is.
    Value(T),
}

impl<T> ConfigSeed<T> {
    pub fn value(value: T) -> Self {
        Self::Value(value)
    }
}

impl<T: DeserializeOwned + Clone> ConfigSeed<T> {
    /// Produce the seed configuration value.
    pub fn resolve(&self) -> Result<T, MergeError> {
        match self {
            Self::Definition(definition) => merge(definition),
            Self::Value(value) => Ok(value.clone()),
        }
    }
}

impl<T> From<ConfigDefinition<T>> for ConfigSeed<T> {
    fn from(definition: ConfigDefinition<T>) -> Self {
        Self::Definition(definition)
    }
}
