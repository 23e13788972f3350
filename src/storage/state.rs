//! Persisted per-target run state consulted by the refresh gate.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What we remember about the last successful render of a target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetRecord {
    /// Digest of the resolved settings that produced the output.
    pub config_hash: String,
    /// When the output was rendered.
    pub rendered_at: DateTime<Utc>,
}

/// Per-target records keyed by slug, persisted as one JSON file.
///
/// A missing or unreadable state file starts empty; losing it only costs
/// unnecessary regeneration, never correctness.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default)]
    pub targets: BTreeMap<String, TargetRecord>,
}

impl RunState {
    /// Load state from `path`, treating any read/parse problem as empty.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable run state; starting fresh");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Persist state to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Look up the record for a target slug.
    #[must_use]
    pub fn record(&self, slug: &str) -> Option<&TargetRecord> {
        self.targets.get(slug)
    }

    /// Record a successful render for a target slug.
    pub fn mark_rendered(&mut self, slug: &str, config_hash: &str, rendered_at: DateTime<Utc>) {
        self.targets.insert(
            slug.to_string(),
            TargetRecord {
                config_hash: config_hash.to_string(),
                rendered_at,
            },
        );
    }
}
