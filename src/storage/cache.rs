//! Namespaced file cache for fetched and derived data.
//!
//! One [`CacheStore`] is constructed per run with an injected root path;
//! there is no process-wide singleton, so tests run against isolated
//! temporary stores.
//!
//! # Features
//! - Atomic writes using temp file + rename (prevents corruption)
//! - Per-namespace freshness and hard-purge policies
//! - Graceful degradation on missing/corrupt entries
//! - Write-only plain-text prompt snapshots for debugging

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::Result;

/// Default freshness window for forecast payloads.
pub const DEFAULT_FORECAST_TTL_MINUTES: u64 = 60;

/// Forecast entries older than this are deleted on sweep.
pub const FORECAST_PURGE_HOURS: u64 = 48;

/// Impact entries older than this many local days are deleted on sweep.
pub const IMPACT_PURGE_DAYS: u64 = 3;

/// Cache namespaces, each with its own retention behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Raw weather payloads. Fresh while younger than the forecast TTL;
    /// hard-purged after 48 hours.
    Forecast,
    /// Processed datasets. No TTL; each write overwrites the previous
    /// entry for the same key.
    Processed,
    /// Geocoding results. No TTL, never purged automatically.
    Geocode,
    /// Reverse-geocoded country codes. No TTL, never purged automatically.
    Country,
    /// Impact context, keyed by local calendar date. Fresh only for the
    /// key's date; hard-purged after three local days.
    Impact,
}

impl Namespace {
    /// All namespaces, for whole-store sweeps.
    pub const ALL: &'static [Self] = &[
        Self::Forecast,
        Self::Processed,
        Self::Geocode,
        Self::Country,
        Self::Impact,
    ];

    /// Subdirectory name under the cache root.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Forecast => "forecasts",
            Self::Processed => "processed",
            Self::Geocode => "geocode",
            Self::Country => "country",
            Self::Impact => "impact",
        }
    }

    /// Age threshold past which sweep deletes entries, if any.
    #[must_use]
    pub const fn purge_after(self) -> Option<Duration> {
        match self {
            Self::Forecast => Some(Duration::from_secs(FORECAST_PURGE_HOURS * 3600)),
            Self::Impact => Some(Duration::from_secs(IMPACT_PURGE_DAYS * 24 * 3600)),
            Self::Processed | Self::Geocode | Self::Country => None,
        }
    }
}

/// On-disk envelope around every cached payload.
///
/// `params` records the originating request parameters so entries can be
/// audited by hand; `local_date` is set only for date-keyed namespaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEnvelope<T> {
    pub payload: T,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_date: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
}

impl<T> CacheEnvelope<T> {
    /// Age of the entry relative to now.
    #[must_use]
    pub fn age(&self) -> Duration {
        let age = Utc::now() - self.created_at;
        Duration::from_secs(age.num_seconds().max(0) as u64)
    }
}

/// Namespaced key→payload store backed by JSON files.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    forecast_ttl: Duration,
}

impl CacheStore {
    /// Create a store rooted at `root` with the default forecast TTL.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_forecast_ttl(
            root,
            Duration::from_secs(DEFAULT_FORECAST_TTL_MINUTES * 60),
        )
    }

    /// Create a store with a custom forecast freshness window.
    #[must_use]
    pub fn with_forecast_ttl(root: impl Into<PathBuf>, forecast_ttl: Duration) -> Self {
        Self {
            root: root.into(),
            forecast_ttl,
        }
    }

    /// Path for an entry.
    #[must_use]
    pub fn entry_path(&self, namespace: Namespace, key: &str) -> PathBuf {
        self.root
            .join(namespace.dir_name())
            .join(format!("{key}.json"))
    }

    /// Read an entry if present and fresh per the namespace policy.
    ///
    /// Missing, expired, and unreadable entries all report a miss.
    /// Corrupt files are logged but not deleted, so a concurrent writer
    /// mid-publish is never raced.
    #[must_use]
    pub fn get<T: DeserializeOwned>(
        &self,
        namespace: Namespace,
        key: &str,
    ) -> Option<CacheEnvelope<T>> {
        let envelope = self.read_envelope(namespace, key)?;
        match namespace {
            Namespace::Forecast => {
                if envelope.age() < self.forecast_ttl {
                    Some(envelope)
                } else {
                    None
                }
            }
            Namespace::Processed | Namespace::Geocode | Namespace::Country => Some(envelope),
            // Impact freshness is date-scoped; use `get_for_date`.
            Namespace::Impact => None,
        }
    }

    /// Read a date-keyed entry, fresh only when its recorded local date
    /// matches `local_date`.
    #[must_use]
    pub fn get_for_date<T: DeserializeOwned>(
        &self,
        namespace: Namespace,
        key: &str,
        local_date: &str,
    ) -> Option<CacheEnvelope<T>> {
        let envelope = self.read_envelope::<T>(namespace, key)?;
        if envelope.local_date.as_deref() == Some(local_date) {
            Some(envelope)
        } else {
            None
        }
    }

    /// Read an entry regardless of freshness. Used as the last-good
    /// fallback when a refetch has exhausted its retries.
    #[must_use]
    pub fn get_ignoring_freshness<T: DeserializeOwned>(
        &self,
        namespace: Namespace,
        key: &str,
    ) -> Option<CacheEnvelope<T>> {
        self.read_envelope(namespace, key)
    }

    /// Write an entry, overwriting any previous payload for the key.
    pub fn put<T: Serialize>(&self, namespace: Namespace, key: &str, payload: &T) -> Result<()> {
        self.put_with_params(namespace, key, payload, serde_json::Value::Null, None)
    }

    /// Write an entry with request parameters and an optional local date.
    pub fn put_with_params<T: Serialize>(
        &self,
        namespace: Namespace,
        key: &str,
        payload: &T,
        params: serde_json::Value,
        local_date: Option<String>,
    ) -> Result<()> {
        let envelope = CacheEnvelope {
            payload,
            created_at: Utc::now(),
            local_date,
            params,
        };
        self.write_envelope(namespace, key, &envelope)
    }

    /// Write a pre-built envelope (used by tests to simulate aged entries).
    pub fn write_envelope<T: Serialize>(
        &self,
        namespace: Namespace,
        key: &str,
        envelope: &CacheEnvelope<T>,
    ) -> Result<()> {
        let path = self.entry_path(namespace, key);
        let content = serde_json::to_string(envelope)?;
        write_atomic(&path, content.as_bytes())?;
        Ok(())
    }

    /// Apply the namespace's hard-purge policy, returning removed count.
    pub fn sweep(&self, namespace: Namespace) -> usize {
        let Some(max_age) = namespace.purge_after() else {
            return 0;
        };
        let dir = self.root.join(namespace.dir_name());
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return 0;
        };

        let mut removed = 0;
        for entry in entries.filter_map(std::result::Result::ok) {
            let path = entry.path();
            if path.extension() != Some("json".as_ref()) {
                continue;
            }
            if !self.entry_older_than(&path, max_age) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Sweep could not remove entry");
                }
            }
        }
        if removed > 0 {
            tracing::info!(
                namespace = namespace.dir_name(),
                removed,
                "Swept expired cache entries"
            );
        }
        removed
    }

    /// Persist an outbound LLM prompt for human debugging. Best-effort
    /// and write-only; failures are logged, never propagated.
    pub fn snapshot_prompt(&self, label: &str, prompt: &str) {
        let dir = self.root.join("prompts");
        let path = dir.join(format!("{label}.txt"));
        if let Err(e) = write_atomic(&path, prompt.as_bytes()) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write prompt snapshot");
        }
    }

    fn read_envelope<T: DeserializeOwned>(
        &self,
        namespace: Namespace,
        key: &str,
    ) -> Option<CacheEnvelope<T>> {
        let path = self.entry_path(namespace, key);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable cache entry; treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Corrupt cache entry; treating as miss");
                None
            }
        }
    }

    /// Decide entry age from the embedded timestamp, falling back to the
    /// file mtime when the envelope cannot be parsed.
    fn entry_older_than(&self, path: &Path, max_age: Duration) -> bool {
        if let Ok(content) = std::fs::read_to_string(path)
            && let Ok(envelope) = serde_json::from_str::<CacheEnvelope<serde_json::Value>>(&content)
        {
            return envelope.age() > max_age;
        }
        path.metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| std::time::SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > max_age)
    }
}

/// Write bytes atomically using temp file + rename.
///
/// A concurrent reader either sees the previous complete entry or the
/// new complete entry, never a partial write.
fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent)?;
    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("cache"),
        std::process::id()
    ));

    {
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }

    std::fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestPayload {
        value: String,
        count: i32,
    }

    fn payload() -> TestPayload {
        TestPayload {
            value: "hello".to_string(),
            count: 42,
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path());

        store.put(Namespace::Forecast, "k1", &payload()).unwrap();
        let entry: CacheEnvelope<TestPayload> = store.get(Namespace::Forecast, "k1").unwrap();
        assert_eq!(entry.payload, payload());
    }

    #[test]
    fn forecast_entry_expires_after_ttl() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path());

        let stale = CacheEnvelope {
            payload: payload(),
            created_at: Utc::now() - ChronoDuration::minutes(61),
            local_date: None,
            params: serde_json::Value::Null,
        };
        store
            .write_envelope(Namespace::Forecast, "old", &stale)
            .unwrap();

        assert!(store.get::<TestPayload>(Namespace::Forecast, "old").is_none());
        // Still reachable as a degraded fallback.
        assert!(
            store
                .get_ignoring_freshness::<TestPayload>(Namespace::Forecast, "old")
                .is_some()
        );
    }

    #[test]
    fn geocode_entries_never_expire() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path());

        let ancient = CacheEnvelope {
            payload: payload(),
            created_at: Utc::now() - ChronoDuration::days(400),
            local_date: None,
            params: serde_json::Value::Null,
        };
        store
            .write_envelope(Namespace::Geocode, "london", &ancient)
            .unwrap();

        assert!(store.get::<TestPayload>(Namespace::Geocode, "london").is_some());
        assert_eq!(store.sweep(Namespace::Geocode), 0);
    }

    #[test]
    fn processed_overwrites_on_same_key() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path());

        store.put(Namespace::Processed, "slug", &payload()).unwrap();
        let updated = TestPayload {
            value: "second".to_string(),
            count: 7,
        };
        store.put(Namespace::Processed, "slug", &updated).unwrap();

        let entry: CacheEnvelope<TestPayload> = store.get(Namespace::Processed, "slug").unwrap();
        assert_eq!(entry.payload, updated);
    }

    #[test]
    fn impact_fresh_only_for_matching_date() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path());

        store
            .put_with_params(
                Namespace::Impact,
                "20260310_location_wellington",
                &payload(),
                serde_json::Value::Null,
                Some("20260310".to_string()),
            )
            .unwrap();

        assert!(
            store
                .get_for_date::<TestPayload>(Namespace::Impact, "20260310_location_wellington", "20260310")
                .is_some()
        );
        assert!(
            store
                .get_for_date::<TestPayload>(Namespace::Impact, "20260310_location_wellington", "20260311")
                .is_none()
        );
    }

    #[test]
    fn sweep_removes_old_forecast_entries() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path());

        let fresh = CacheEnvelope {
            payload: payload(),
            created_at: Utc::now(),
            local_date: None,
            params: serde_json::Value::Null,
        };
        let expired = CacheEnvelope {
            payload: payload(),
            created_at: Utc::now() - ChronoDuration::hours(49),
            local_date: None,
            params: serde_json::Value::Null,
        };
        store
            .write_envelope(Namespace::Forecast, "fresh", &fresh)
            .unwrap();
        store
            .write_envelope(Namespace::Forecast, "expired", &expired)
            .unwrap();

        assert_eq!(store.sweep(Namespace::Forecast), 1);
        assert!(
            store
                .get_ignoring_freshness::<TestPayload>(Namespace::Forecast, "fresh")
                .is_some()
        );
        assert!(
            store
                .get_ignoring_freshness::<TestPayload>(Namespace::Forecast, "expired")
                .is_none()
        );
    }

    #[test]
    fn sweep_removes_impact_entries_older_than_three_days() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path());

        let old = CacheEnvelope {
            payload: payload(),
            created_at: Utc::now() - ChronoDuration::days(4),
            local_date: Some("20260306".to_string()),
            params: serde_json::Value::Null,
        };
        store
            .write_envelope(Namespace::Impact, "20260306_location_x", &old)
            .unwrap();

        assert_eq!(store.sweep(Namespace::Impact), 1);
        assert!(
            store
                .get_for_date::<TestPayload>(Namespace::Impact, "20260306_location_x", "20260306")
                .is_none()
        );
    }

    #[test]
    fn corrupt_entry_is_a_miss_and_not_deleted() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path());

        let path = store.entry_path(Namespace::Geocode, "broken");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        assert!(store.get::<TestPayload>(Namespace::Geocode, "broken").is_none());
        assert!(path.exists(), "corrupt entry must not be eagerly deleted");
    }

    #[test]
    fn atomic_write_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path());

        store.put(Namespace::Country, "key", &payload()).unwrap();

        let dir = tmp.path().join("country");
        let names: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["key.json".to_string()]);
    }

    #[test]
    fn prompt_snapshot_written() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path());

        store.snapshot_prompt("wellington_forecast", "System: ...\nUser: ...");
        let path = tmp.path().join("prompts/wellington_forecast.txt");
        assert!(path.exists());
        assert!(std::fs::read_to_string(path).unwrap().contains("User"));
    }
}
