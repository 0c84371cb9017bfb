//! Merge a definition map into a seed value.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::definition::entry::ConfigDefinition;

/// Errors produced while building a seed value.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A mandatory field has no initial value.
    #[error("missing required default for field `{field}`")]
    MissingRequiredDefault { field: String },

    /// An initial value could not be turned into JSON.
    #[error("initial value for field `{field}` could not be serialized: {source}")]
    Serialize {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    /// The collected values do not fit the configuration type.
    #[error("definition does not match the configuration shape: {0}")]
    Shape(#[source] serde_json::Error),
}

/// Collect every initial value of the definition into a JSON object.
pub fn resolve_values<T>(definition: &ConfigDefinition<T>) -> Map<String, Value> {
    definition
        .iter()
        .filter_map(|(name, entry)| {
            entry
                .initial_value
                .as_ref()
                .map(|value| (name.to_string(), value.clone()))
        })
        .collect()
}

/// Produce the seed configuration value from a definition map.
pub fn merge<T: DeserializeOwned>(definition: &ConfigDefinition<T>) -> Result<T, MergeError> {
    let state = resolve_values(definition);
    serde_json::from_value(Value::Object(state)).map_err(classify)
}

fn classify(err: serde_json::Error) -> MergeError {
    match missing_field(&err) {
        Some(field) => MergeError::MissingRequiredDefault { field },
        None => MergeError::Shape(err),
    }
}

// serde reports absent non-optional fields as "missing field `name`".
fn missing_field(err: &serde_json::Error) -> Option<String> {
    const MARKER: &str = "missing field `";
    let message = err.to_string();
    let start = message.find(MARKER)? + MARKER.len();
    let rest = message.get(start..)?;
    let end = rest.find('`')?;
    rest.get(..end).map(str::to_string)
}
