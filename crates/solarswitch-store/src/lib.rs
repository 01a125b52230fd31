//! SQLite-backed settings store.
//!
//! Each key holds one JSON-encoded value tagged with its kind, a blake3
//! digest of the encoded value and the time of the last write. A digest
//! mismatch reads back as corruption instead of a wrong value.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use solarswitch_core::{SettingsStore, StorageError, ThresholdBounds};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS settings (
    key        TEXT PRIMARY KEY,
    kind       TEXT NOT NULL,
    value      TEXT NOT NULL,
    digest     TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("encoding: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("digest mismatch for {key}")]
    Corrupt { key: String },

    #[error("{key} holds a {found} value, expected {expected}")]
    KindMismatch {
        key: String,
        found: String,
        expected: &'static str,
    },
}

impl From<StoreError> for StorageError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Corrupt { key } | StoreError::KindMismatch { key, .. } => {
                StorageError::Corrupt { key }
            }
            other => StorageError::Backend(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bounds,
    Scalar,
}

impl ValueKind {
    fn as_str(self) -> &'static str {
        match self {
            ValueKind::Bounds => "bounds",
            ValueKind::Scalar => "scalar",
        }
    }
}

/// One row as stored, for inspection tools. Rows are listed even when they
/// fail verification; `intact` is false for those.
#[derive(Debug, Clone, Serialize)]
pub struct StoredEntry {
    pub key: String,
    pub kind: String,
    /// The raw text as a JSON string when it does not parse.
    pub value: serde_json::Value,
    pub digest: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub intact: bool,
}

fn digest(encoded: &str) -> String {
    hex::encode(blake3::hash(encoded.as_bytes()).as_bytes())
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn put<T: Serialize>(&self, key: &str, kind: ValueKind, value: &T) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO settings (key, kind, value, digest, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(key) DO UPDATE SET
                kind = excluded.kind,
                value = excluded.value,
                digest = excluded.digest,
                updated_at = excluded.updated_at",
            params![key, kind.as_str(), encoded, digest(&encoded), Utc::now().to_rfc3339()],
        )?;
        log::debug!("stored {} under {key}", kind.as_str());
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, key: &str, kind: ValueKind) -> Result<Option<T>, StoreError> {
        let row: Option<(String, String, String)> = self
            .conn
            .query_row(
                "SELECT kind, value, digest FROM settings WHERE key = ?1",
                params![key],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?;
        let Some((found, encoded, stored_digest)) = row else {
            return Ok(None);
        };
        if found != kind.as_str() {
            return Err(StoreError::KindMismatch {
                key: key.to_string(),
                found,
                expected: kind.as_str(),
            });
        }
        if digest(&encoded) != stored_digest {
            return Err(StoreError::Corrupt { key: key.to_string() });
        }
        Ok(Some(serde_json::from_str(&encoded)?))
    }

    pub fn entries(&self) -> Result<Vec<StoredEntry>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, kind, value, digest, updated_at FROM settings ORDER BY key")?;
        let rows = stmt.query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (key, kind, encoded, stored_digest, updated_at) = row?;
            let updated_at = DateTime::parse_from_rfc3339(&updated_at)
                .ok()
                .map(|t| t.with_timezone(&Utc));
            let parsed = serde_json::from_str(&encoded).ok();
            let intact = parsed.is_some() && updated_at.is_some() && digest(&encoded) == stored_digest;
            if !intact {
                log::warn!("settings entry {key} failed verification");
            }
            out.push(StoredEntry {
                value: parsed.unwrap_or(serde_json::Value::String(encoded)),
                key,
                kind,
                digest: stored_digest,
                updated_at,
                intact,
            });
        }
        Ok(out)
    }

    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.conn.execute("DELETE FROM settings WHERE key = ?1", params![key])? > 0)
    }
}

impl SettingsStore for SqliteStore {
    fn load_bounds(&mut self, key: &str) -> Result<Option<ThresholdBounds>, StorageError> {
        Ok(self.get(key, ValueKind::Bounds)?)
    }

    fn save_bounds(&mut self, key: &str, bounds: &ThresholdBounds) -> Result<(), StorageError> {
        Ok(self.put(key, ValueKind::Bounds, bounds)?)
    }

    fn load_scalar(&mut self, key: &str) -> Result<Option<f64>, StorageError> {
        Ok(self.get(key, ValueKind::Scalar)?)
    }

    fn save_scalar(&mut self, key: &str, value: f64) -> Result<(), StorageError> {
        Ok(self.put(key, ValueKind::Scalar, &value)?)
    }
}
