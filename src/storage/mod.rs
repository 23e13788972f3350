//! Storage for caches, paths, and refresh state.

pub mod cache;
pub mod paths;
pub mod state;

pub use cache::{CacheEnvelope, CacheStore, Namespace, DEFAULT_FORECAST_TTL_MINUTES};
pub use paths::AppPaths;
pub use state::{RunState, TargetRecord};
