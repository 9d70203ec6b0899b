use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

/// Checkpoint-style entries that get recomputed all the time.
pub const DEFAULT_TTL_MINUTES: i64 = 60;
/// Season-locked historical data: one year.
pub const SEASON_LOCKED_TTL_MINUTES: i64 = 525_600;

const MERGE_RETRIES: u32 = 3;

/// The one generic cache table every job writes into. A row is either
/// present-and-unexpired (valid) or a miss; writes are whole-row upserts
/// keyed by `cache_key`, so no partial state is ever observable.
pub struct CacheStore {
    conn: Connection,
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub cache_key: String,
    pub cache_type: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open cache db {}", path.display()))?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory cache db")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Single-row upsert. A second write under the same key fully replaces
    /// the payload; `created_at` survives, `updated_at` and `expires_at`
    /// move forward.
    pub fn upsert(
        &self,
        cache_key: &str,
        cache_type: &str,
        data: &Value,
        ttl_minutes: i64,
    ) -> Result<()> {
        let now = Utc::now();
        let expires_at = now + ChronoDuration::minutes(ttl_minutes);
        self.conn
            .execute(
                r#"
                INSERT INTO api_cache (cache_key, cache_type, data, created_at, updated_at, expires_at)
                VALUES (?1, ?2, ?3, ?4, ?4, ?5)
                ON CONFLICT(cache_key) DO UPDATE SET
                    cache_type = excluded.cache_type,
                    data = excluded.data,
                    updated_at = excluded.updated_at,
                    expires_at = excluded.expires_at
                "#,
                params![
                    cache_key,
                    cache_type,
                    serde_json::to_string(data).context("serialize cache payload")?,
                    now.to_rfc3339(),
                    expires_at.to_rfc3339(),
                ],
            )
            .context("upsert cache row")?;
        Ok(())
    }

    /// Read-through with expiry: an expired row behaves exactly like a
    /// missing one.
    pub fn get(&self, cache_key: &str) -> Result<Option<CacheEntry>> {
        let row = self
            .conn
            .query_row(
                "SELECT cache_key, cache_type, data, created_at, updated_at, expires_at
                 FROM api_cache WHERE cache_key = ?1",
                params![cache_key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()
            .context("query cache row")?;

        let Some((cache_key, cache_type, data, created_at, updated_at, expires_at)) = row else {
            return Ok(None);
        };
        let expires_at = parse_ts(&expires_at)?;
        if expires_at <= Utc::now() {
            return Ok(None);
        }
        Ok(Some(CacheEntry {
            cache_key,
            cache_type,
            data: serde_json::from_str(&data).context("decode cache payload")?,
            created_at: parse_ts(&created_at)?,
            updated_at: parse_ts(&updated_at)?,
            expires_at,
        }))
    }

    /// Read-merge-write-verify for keys shared by parallel job shards.
    ///
    /// `merge` receives the current (unexpired) payload, if any, and returns
    /// the payload to store. After writing, the row is re-read; when another
    /// shard won the race the merge is re-run against the fresh payload, up
    /// to a small fixed retry count. Past the budget the last merge result
    /// is written anyway: saving partial data beats failing the whole job.
    /// Best-effort mitigation, not a transactional guarantee.
    pub fn upsert_merged(
        &self,
        cache_key: &str,
        cache_type: &str,
        ttl_minutes: i64,
        merge: impl Fn(Option<&Value>) -> Value,
    ) -> Result<Value> {
        let mut merged = merge(self.get(cache_key)?.as_ref().map(|e| &e.data));
        for _ in 0..MERGE_RETRIES {
            self.upsert(cache_key, cache_type, &merged, ttl_minutes)?;
            let after = self.get(cache_key)?;
            match after {
                Some(entry) if entry.data == merged => return Ok(merged),
                Some(entry) => merged = merge(Some(&entry.data)),
                None => {}
            }
        }
        self.upsert(cache_key, cache_type, &merged, ttl_minutes)?;
        Ok(merged)
    }

    /// Drops rows whose expiry has passed. Jobs call this opportunistically;
    /// `get` never depends on it.
    pub fn prune_expired(&self) -> Result<usize> {
        let dropped = self
            .conn
            .execute(
                "DELETE FROM api_cache WHERE expires_at <= ?1",
                params![Utc::now().to_rfc3339()],
            )
            .context("prune expired cache rows")?;
        Ok(dropped)
    }

    /// Keys of unexpired rows with the given type tag.
    pub fn keys_of_type(&self, cache_type: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT cache_key FROM api_cache
                 WHERE cache_type = ?1 AND expires_at > ?2
                 ORDER BY cache_key",
            )
            .context("prepare keys query")?;
        let rows = stmt
            .query_map(params![cache_type, Utc::now().to_rfc3339()], |row| {
                row.get::<_, String>(0)
            })
            .context("query cache keys")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode cache key")?);
        }
        Ok(out)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS api_cache (
            cache_key TEXT PRIMARY KEY,
            cache_type TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_api_cache_type ON api_cache(cache_type);
        CREATE INDEX IF NOT EXISTS idx_api_cache_expires ON api_cache(expires_at);
        "#,
    )
    .context("create cache schema")?;
    Ok(())
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("bad timestamp in cache row: {raw:?}"))
}
