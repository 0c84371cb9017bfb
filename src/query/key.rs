//! Query keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Key of the single configuration entry.
pub const CONFIG_QUERY_KEY: &str = "config";

/// Identifies one cache entry, e.g. `["config"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// The fixed key used for configuration entries.
    pub fn config() -> Self {
        Self::new([CONFIG_QUERY_KEY])
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// Stable hash used to index the cache: the JSON array form.
    pub fn query_hash(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query_hash())
    }
}
