//! Decides whether an already-produced output needs regeneration.
//!
//! The gate compares a digest of the fully resolved settings — not the
//! raw config text — against the last run's record, so cosmetic config
//! edits that resolve identically never trigger needless regeneration.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{SettingsBag, canonical_hash};
use crate::error::Result;
use crate::storage::{AppPaths, RunState};

/// Digest of the resolved settings relevant to one target.
#[must_use]
pub fn target_settings_hash(slug: &str, settings: &SettingsBag) -> String {
    #[derive(Serialize)]
    struct TargetDigest<'a> {
        slug: &'a str,
        settings: &'a SettingsBag,
    }
    canonical_hash(&TargetDigest { slug, settings })
}

/// Per-run refresh gate over the persisted target records.
#[derive(Debug)]
pub struct RefreshGate {
    state: RunState,
    state_path: std::path::PathBuf,
}

impl RefreshGate {
    /// Load the gate's state from the cache root.
    #[must_use]
    pub fn load(paths: &AppPaths) -> Self {
        let state_path = paths.run_state_file();
        Self {
            state: RunState::load(&state_path),
            state_path,
        }
    }

    /// True when the target must be regenerated.
    ///
    /// Regenerate when forced, when the stored config hash differs, when
    /// no previous record exists, or when the output's age has reached
    /// the target's minimum refresh interval. An interval of zero always
    /// regenerates.
    #[must_use]
    pub fn needs_regeneration(
        &self,
        slug: &str,
        config_hash: &str,
        refresh_interval_minutes: u64,
        force: bool,
        now: DateTime<Utc>,
    ) -> bool {
        if force {
            return true;
        }
        let Some(record) = self.state.record(slug) else {
            return true;
        };
        if record.config_hash != config_hash {
            tracing::debug!(slug, "Config hash changed; regenerating");
            return true;
        }
        if refresh_interval_minutes == 0 {
            return true;
        }
        let age_minutes = (now - record.rendered_at).num_minutes().max(0) as u64;
        age_minutes >= refresh_interval_minutes
    }

    /// Record a successful render.
    pub fn mark_rendered(&mut self, slug: &str, config_hash: &str, rendered_at: DateTime<Utc>) {
        self.state.mark_rendered(slug, config_hash, rendered_at);
    }

    /// Persist the state file.
    ///
    /// # Errors
    ///
    /// I/O errors writing the state file.
    pub fn save(&self) -> Result<()> {
        self.state.save(&self.state_path)
    }
}
