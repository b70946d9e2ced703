//! SQLite-backed corpus store

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::{decode_embedding, encode_embedding, CorpusStats, CorpusStore, UpsertOutcome};
use crate::error::{Result, ScoutError};
use crate::models::CandidateProfile;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS profiles (
  canonical_id    TEXT PRIMARY KEY NOT NULL,
  raw_identifier  TEXT NOT NULL,
  attributes      TEXT NOT NULL,
  embedding       BLOB,
  embedding_model TEXT,
  ingested_at     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_profiles_ingested_at ON profiles(ingested_at);
CREATE INDEX IF NOT EXISTS idx_profiles_embedding_model ON profiles(embedding_model);
";

const PROFILE_COLUMNS: &str = "canonical_id, raw_identifier, attributes, embedding, ingested_at";

/// Corpus stored in a single SQLite table with a unique `canonical_id`
///
/// Statements run on tokio's blocking pool, one at a time per connection.
pub struct SqliteCorpusStore {
  conn: Arc<Mutex<Connection>>,
}

impl SqliteCorpusStore {
  /// Open (or create) the corpus database at the given path
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| ScoutError::Storage(format!("Cannot create {}: {}", parent.display(), e)))?;
    }

    let conn = Connection::open(path)?;
    Self::configure_pragmas(&conn)?;
    conn.execute_batch(SCHEMA)?;
    debug!(path = %path.display(), "Opened corpus database");

    Ok(Self { conn: Arc::new(Mutex::new(conn)) })
  }

  /// Throwaway database, used by tests and dry runs
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SCHEMA)?;
    Ok(Self { conn: Arc::new(Mutex::new(conn)) })
  }

  fn configure_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
      "PRAGMA journal_mode = WAL;
       PRAGMA synchronous = NORMAL;
       PRAGMA busy_timeout = 5000;
       PRAGMA temp_store = MEMORY;",
    )?;
    Ok(())
  }

  async fn with_conn<T, F>(&self, work: F) -> Result<T>
  where
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    let conn = Arc::clone(&self.conn);
    tokio::task::spawn_blocking(move || {
      let guard = conn.lock().map_err(|_| ScoutError::Storage("Corpus connection lock poisoned".to_string()))?;
      work(&guard)
    })
    .await
    .map_err(|e| ScoutError::Storage(format!("Corpus task failed: {e}")))?
  }

  fn query_profiles(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
  ) -> Result<Vec<CandidateProfile>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, ProfileRow::read)?.collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(ProfileRow::into_profile).collect()
  }
}

/// Raw column values; conversion happens outside the rusqlite row closure
struct ProfileRow {
  canonical_id: String,
  raw_identifier: String,
  attributes: String,
  embedding: Option<Vec<u8>>,
  ingested_at: String,
}

impl ProfileRow {
  fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      canonical_id: row.get(0)?,
      raw_identifier: row.get(1)?,
      attributes: row.get(2)?,
      embedding: row.get(3)?,
      ingested_at: row.get(4)?,
    })
  }

  fn into_profile(self) -> Result<CandidateProfile> {
    let ingested_at = DateTime::parse_from_rfc3339(&self.ingested_at)
      .map_err(|e| ScoutError::Storage(format!("Bad ingested_at for {}: {}", self.canonical_id, e)))?
      .with_timezone(&Utc);
    let embedding = self.embedding.as_deref().map(decode_embedding).transpose()?;

    Ok(CandidateProfile {
      canonical_id: self.canonical_id,
      raw_identifier: self.raw_identifier,
      attributes: serde_json::from_str(&self.attributes)?,
      embedding,
      ingested_at,
    })
  }
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
  // fixed width so lexical order matches chronological order
  timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl CorpusStore for SqliteCorpusStore {
  async fn upsert(&self, profile: &CandidateProfile) -> Result<UpsertOutcome> {
    let attributes = serde_json::to_string(&profile.attributes)?;
    let canonical_id = profile.canonical_id.clone();
    let raw_identifier = profile.raw_identifier.clone();
    let ingested_at = format_timestamp(&profile.ingested_at);

    self
      .with_conn(move |conn| {
        let changed = conn.execute(
          "INSERT INTO profiles (canonical_id, raw_identifier, attributes, ingested_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(canonical_id) DO NOTHING",
          params![canonical_id, raw_identifier, attributes, ingested_at],
        )?;

        if changed == 0 {
          debug!(canonical_id = %canonical_id, "Duplicate write absorbed");
          Ok(UpsertOutcome::AlreadyPresent)
        } else {
          Ok(UpsertOutcome::Inserted)
        }
      })
      .await
  }

  async fn canonical_ids(&self) -> Result<Vec<String>> {
    self
      .with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT canonical_id FROM profiles ORDER BY canonical_id")?;
        let ids = stmt.query_map([], |row| row.get(0))?.collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
      })
      .await
  }

  async fn get(&self, canonical_id: &str) -> Result<Option<CandidateProfile>> {
    let canonical_id = canonical_id.to_string();
    self
      .with_conn(move |conn| {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE canonical_id = ?1");
        let row = conn.query_row(&sql, params![canonical_id], ProfileRow::read).optional()?;
        row.map(ProfileRow::into_profile).transpose()
      })
      .await
  }

  async fn set_embedding(&self, canonical_id: &str, embedding: &[f32], model: &str) -> Result<()> {
    let canonical_id = canonical_id.to_string();
    let blob = encode_embedding(embedding);
    let model = model.to_string();

    self
      .with_conn(move |conn| {
        let changed = conn.execute(
          "UPDATE profiles SET embedding = ?1, embedding_model = ?2 WHERE canonical_id = ?3",
          params![blob, model, canonical_id],
        )?;
        if changed == 0 {
          return Err(ScoutError::Storage(format!("No profile {canonical_id} to attach an embedding to")));
        }
        Ok(())
      })
      .await
  }

  async fn embedded_profiles(&self, model: &str) -> Result<Vec<CandidateProfile>> {
    let model = model.to_string();
    self
      .with_conn(move |conn| {
        let sql = format!(
          "SELECT {PROFILE_COLUMNS} FROM profiles
           WHERE embedding IS NOT NULL AND embedding_model = ?1
           ORDER BY ingested_at, canonical_id"
        );
        Self::query_profiles(conn, &sql, &[&model])
      })
      .await
  }

  async fn missing_embeddings(&self, model: &str, limit: usize) -> Result<Vec<CandidateProfile>> {
    let model = model.to_string();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let mut profiles = self
      .with_conn(move |conn| {
        let sql = format!(
          "SELECT {PROFILE_COLUMNS} FROM profiles
           WHERE embedding IS NULL OR embedding_model IS NULL OR embedding_model != ?1
           ORDER BY ingested_at, canonical_id
           LIMIT ?2"
        );
        Self::query_profiles(conn, &sql, &[&model, &limit])
      })
      .await?;
    // a vector from another model is not usable by the active index
    for profile in &mut profiles {
      profile.embedding = None;
    }
    Ok(profiles)
  }

  async fn stats(&self) -> Result<CorpusStats> {
    self
      .with_conn(|conn| {
        let (profiles, embedded): (i64, i64) = conn.query_row(
          "SELECT COUNT(*), COUNT(embedding) FROM profiles",
          [],
          |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stmt = conn.prepare(
          "SELECT embedding_model, COUNT(*) FROM profiles
           WHERE embedding IS NOT NULL AND embedding_model IS NOT NULL
           GROUP BY embedding_model",
        )?;
        let models: BTreeMap<String, usize> = stmt
          .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize)))?
          .collect::<rusqlite::Result<_>>()?;

        Ok(CorpusStats { profiles: profiles as usize, embedded: embedded as usize, models })
      })
      .await
  }
}
