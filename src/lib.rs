//! Remote configuration library: a seed config served immediately, kept in
//! sync with a remote updater and persisted across restarts.

pub mod config;
pub mod definition;
pub mod fetch;
pub mod lifecycle;
pub mod observability;
pub mod persist;
pub mod query;
pub mod setup;

pub use definition::{merge, ConfigDefinition, ConfigSeed, FieldDefinition, MergeError};
pub use fetch::{fetch_config, FetchError, FetchOptions};
pub use query::{QueryClient, QueryKey, QueryOptions, QueryResult};
pub use setup::{
    setup_config, ConfigProvider, ConfigQuery, ConfigResult, MountedConfig, SetupConfigOptions,
    SetupError, UseConfig,
};
