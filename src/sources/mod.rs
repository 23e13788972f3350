//! Cache-backed clients for the external data sources.

pub mod alerts;
pub mod geocode;
pub mod impact;
pub mod weather;

pub use alerts::{AlertSource, AlertSummary};
pub use geocode::{GeocodeResult, GeocodeSource};
pub use impact::{ContextType, ImpactContext, ImpactRequest, ImpactSource};
pub use weather::{ForecastPayload, ForecastRequest, WeatherSource};

/// Optional data-source API keys, resolved once at startup.
#[derive(Debug, Clone, Default)]
pub struct SourceKeys {
    pub openweathermap: Option<String>,
    pub google: Option<String>,
}

impl SourceKeys {
    /// Read keys from the environment. Absent keys disable the features
    /// that need them rather than failing the run.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            openweathermap: non_empty_env("OPENWEATHERMAP_API_KEY"),
            google: non_empty_env("GOOGLE_API_KEY"),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
