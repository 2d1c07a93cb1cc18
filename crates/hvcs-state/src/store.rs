use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use hvcs_types::ObjectId;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use crate::error::{StateError, StateResult};
use crate::feedback::FeedbackRecord;
use crate::pool::{ConnectionPool, PoolConfig};
use crate::retry::RetryPolicy;
use crate::schema;
use crate::value::StateValue;

/// State store tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateConfig {
    /// Largest encoded value `save_state` accepts.
    pub max_state_size: u64,
    pub pool: PoolConfig,
    pub retry: RetryPolicy,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            max_state_size: 100 * 1024 * 1024,
            pool: PoolConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl StateConfig {
    /// Convenience for callers that configure the pool from plain numbers.
    pub fn with_pool(mut self, size: usize, acquire_timeout: Duration, busy_retries: u32) -> Self {
        self.pool.size = size;
        self.pool.acquire_timeout = acquire_timeout;
        self.retry.max_retries = busy_retries;
        self
    }
}

/// State keys are non-empty and limited to ASCII letters, digits and `_`.
pub fn validate_key(key: &str) -> StateResult<()> {
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StateError::InvalidInput(format!("invalid state key: {key:?}")));
    }
    Ok(())
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// SQLite-backed state and feedback store.
#[derive(Debug)]
pub struct StateStore {
    pool: ConnectionPool,
    retry: RetryPolicy,
    max_state_size: u64,
}

impl StateStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path, config: StateConfig) -> StateResult<Self> {
        let pool = ConnectionPool::open(path, &config.pool)?;
        {
            let conn = pool.acquire()?;
            config.retry.run("init schema", || schema::init(&conn))?;
        }
        info!(path = %path.display(), "state store opened");
        Ok(Self {
            pool,
            retry: config.retry,
            max_state_size: config.max_state_size,
        })
    }

    pub fn max_state_size(&self) -> u64 {
        self.max_state_size
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    // ---- state ----

    /// Insert or replace `key`.
    ///
    /// Oversized values are rejected before anything is written, so the
    /// previous value survives.
    pub fn save_state(&self, key: &str, value: &StateValue) -> StateResult<()> {
        validate_key(key)?;
        let bytes = value.to_bytes()?;
        if bytes.len() as u64 > self.max_state_size {
            return Err(StateError::SizeLimitExceeded {
                size: bytes.len() as u64,
                limit: self.max_state_size,
            });
        }
        let updated_at = now_rfc3339();
        self.retry.run("save_state", || {
            let conn = self.pool.acquire()?;
            conn.execute(
                "INSERT INTO state (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, bytes, updated_at],
            )?;
            Ok(())
        })?;
        debug!(key, bytes = bytes.len(), "state saved");
        Ok(())
    }

    pub fn load_state(&self, key: &str) -> StateResult<StateValue> {
        validate_key(key)?;
        let bytes: Option<Vec<u8>> = self.retry.run("load_state", || {
            let conn = self.pool.acquire()?;
            Ok(conn
                .query_row("SELECT value FROM state WHERE key = ?1", [key], |row| row.get(0))
                .optional()?)
        })?;
        let bytes = bytes.ok_or_else(|| StateError::NotFound(key.to_string()))?;
        StateValue::from_bytes(&bytes)
    }

    /// Keys starting with `prefix`, sorted.
    pub fn list_state_keys(&self, prefix: &str) -> StateResult<Vec<String>> {
        self.retry.run("list_state_keys", || {
            let conn = self.pool.acquire()?;
            let mut stmt = conn.prepare(
                "SELECT key FROM state WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
            )?;
            let keys = stmt
                .query_map([prefix], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(keys)
        })
    }

    /// Remove `key`. Returns whether it existed.
    pub fn delete_state(&self, key: &str) -> StateResult<bool> {
        validate_key(key)?;
        let removed = self.retry.run("delete_state", || {
            let conn = self.pool.acquire()?;
            Ok(conn.execute("DELETE FROM state WHERE key = ?1", [key])?)
        })?;
        Ok(removed > 0)
    }

    // ---- feedback ----

    /// Append a feedback record and return its row id.
    ///
    /// The caller is responsible for checking that the commit exists.
    pub fn record_feedback(&self, record: &FeedbackRecord) -> StateResult<i64> {
        record.validate()?;
        let params_bytes = record.params.to_bytes()?;
        let commit = record.commit_hash.to_hex();
        let timestamp = record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
        let id = self.retry.run("record_feedback", || {
            let conn = self.pool.acquire()?;
            conn.execute(
                "INSERT INTO feedback (commit_hash, category, severity, params, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![commit, record.category, record.severity, params_bytes, timestamp],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        info!(
            commit = %record.commit_hash.short_hex(),
            category = %record.category,
            severity = record.severity,
            "feedback recorded"
        );
        Ok(id)
    }

    /// Feedback linked to `commit_hash`, oldest first, optionally filtered by
    /// category.
    pub fn feedback_for_commit(
        &self,
        commit_hash: &ObjectId,
        category: Option<&str>,
    ) -> StateResult<Vec<FeedbackRecord>> {
        let commit = commit_hash.to_hex();
        let rows: Vec<(String, u8, Vec<u8>, String)> = self.retry.run("feedback_for_commit", || {
            let conn = self.pool.acquire()?;
            let mut stmt = conn.prepare(
                "SELECT category, severity, params, timestamp FROM feedback
                 WHERE commit_hash = ?1 AND (?2 IS NULL OR category = ?2)
                 ORDER BY id",
            )?;
            let rows = stmt
                .query_map(params![commit, category], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter()
            .map(|(category, severity, params, timestamp)| -> StateResult<FeedbackRecord> {
                let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                    .map_err(|e| StateError::Serialization(format!("bad feedback timestamp: {e}")))?
                    .with_timezone(&Utc);
                Ok(FeedbackRecord {
                    severity,
                    category,
                    params: StateValue::from_bytes(&params)?,
                    commit_hash: *commit_hash,
                    timestamp,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::thread;

    fn open_with(config: StateConfig) -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(&dir.path().join("state.db"), config).unwrap();
        (dir, store)
    }

    fn open() -> (tempfile::TempDir, StateStore) {
        open_with(StateConfig::default())
    }

    fn config_value() -> StateValue {
        let mut map = BTreeMap::new();
        map.insert("depth".to_string(), StateValue::Integer(3));
        map.insert("seeds".to_string(), StateValue::List(vec!["https://example.org".into()]));
        StateValue::Map(map)
    }

    #[test]
    fn save_then_load() {
        let (_dir, store) = open();
        store.save_state("crawler_config", &config_value()).unwrap();
        assert_eq!(store.load_state("crawler_config").unwrap(), config_value());
    }

    #[test]
    fn save_overwrites() {
        let (_dir, store) = open();
        store.save_state("k", &StateValue::Integer(1)).unwrap();
        store.save_state("k", &StateValue::Integer(2)).unwrap();
        assert_eq!(store.load_state("k").unwrap(), StateValue::Integer(2));
    }

    #[test]
    fn missing_key_not_found() {
        let (_dir, store) = open();
        assert!(matches!(store.load_state("absent"), Err(StateError::NotFound(k)) if k == "absent"));
    }

    #[test]
    fn invalid_keys_rejected() {
        let (_dir, store) = open();
        for key in ["", "has space", "dash-key", "dot.key", "ünïcode"] {
            assert!(
                matches!(store.save_state(key, &StateValue::Null), Err(StateError::InvalidInput(_))),
                "{key:?}"
            );
        }
        assert!(store.save_state("snake_case_123", &StateValue::Null).is_ok());
    }

    #[test]
    fn oversized_value_rejected_and_prior_value_kept() {
        let (_dir, store) = open_with(StateConfig {
            max_state_size: 32,
            ..StateConfig::default()
        });
        store.save_state("k", &StateValue::from("small")).unwrap();
        let big = StateValue::from("x".repeat(100));
        assert!(matches!(
            store.save_state("k", &big),
            Err(StateError::SizeLimitExceeded { limit: 32, .. })
        ));
        assert_eq!(store.load_state("k").unwrap(), StateValue::from("small"));
    }

    #[test]
    fn list_keys_by_prefix() {
        let (_dir, store) = open();
        for key in ["crawl_b", "crawl_a", "ui_theme", "crawl_"] {
            store.save_state(key, &StateValue::Bool(true)).unwrap();
        }
        assert_eq!(store.list_state_keys("crawl_").unwrap(), vec!["crawl_", "crawl_a", "crawl_b"]);
        assert_eq!(store.list_state_keys("").unwrap().len(), 4);
        assert!(store.list_state_keys("zzz").unwrap().is_empty());
    }

    #[test]
    fn list_keys_treats_wildcards_literally() {
        let (_dir, store) = open();
        store.save_state("a_b", &StateValue::Null).unwrap();
        store.save_state("axb", &StateValue::Null).unwrap();
        assert_eq!(store.list_state_keys("a_").unwrap(), vec!["a_b"]);
        assert!(store.list_state_keys("%").unwrap().is_empty());
    }

    #[test]
    fn delete_state() {
        let (_dir, store) = open();
        store.save_state("k", &StateValue::Null).unwrap();
        assert!(store.delete_state("k").unwrap());
        assert!(!store.delete_state("k").unwrap());
        assert!(store.load_state("k").is_err());
    }

    #[test]
    fn feedback_roundtrip_and_filter() {
        let (_dir, store) = open();
        let commit = ObjectId::from_bytes(b"commit-1");
        let other = ObjectId::from_bytes(b"commit-2");
        let mut params = BTreeMap::new();
        params.insert("loss".to_string(), StateValue::Float(0.25));

        store
            .record_feedback(&FeedbackRecord::new(8, "training", StateValue::Map(params.clone()), commit))
            .unwrap();
        store
            .record_feedback(&FeedbackRecord::new(2, "ui", StateValue::Null, commit))
            .unwrap();
        store
            .record_feedback(&FeedbackRecord::new(5, "training", StateValue::Null, other))
            .unwrap();

        let all = store.feedback_for_commit(&commit, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].category, "training");
        assert_eq!(all[0].severity, 8);
        assert_eq!(all[0].params, StateValue::Map(params));
        assert_eq!(all[1].category, "ui");

        let training = store.feedback_for_commit(&commit, Some("training")).unwrap();
        assert_eq!(training.len(), 1);
        assert!(store
            .feedback_for_commit(&ObjectId::from_bytes(b"none"), None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn invalid_feedback_rejected() {
        let (_dir, store) = open();
        let commit = ObjectId::from_bytes(b"c");
        assert!(matches!(
            store.record_feedback(&FeedbackRecord::new(11, "x", StateValue::Null, commit)),
            Err(StateError::InvalidInput(_))
        ));
        assert!(matches!(
            store.record_feedback(&FeedbackRecord::new(1, "c".repeat(65), StateValue::Null, commit)),
            Err(StateError::InvalidInput(_))
        ));
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        {
            let store = StateStore::open(&path, StateConfig::default()).unwrap();
            store.save_state("k", &config_value()).unwrap();
        }
        let store = StateStore::open(&path, StateConfig::default()).unwrap();
        assert_eq!(store.load_state("k").unwrap(), config_value());
    }

    #[test]
    fn concurrent_writers_through_small_pool() {
        let (_dir, store) = open_with(StateConfig::default().with_pool(2, Duration::from_secs(10), 10));
        let store = Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for j in 0..10 {
                        store
                            .save_state(&format!("worker_{i}_{j}"), &StateValue::Integer(j))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.list_state_keys("worker_").unwrap().len(), 80);
    }
}
