//! Free-text notes per (apiary, hive) pair.
//!
//! Notes stay local to this service and are never sent to the document
//! store. Each write bumps a version; a writer that supplies the version it
//! last saw gets `Conflict` when someone else saved in between.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::error::{AppError, Result};
use crate::models::RecordId;

// ---

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Note {
    pub apiary_id: String,
    pub hive_id: String,
    pub body: String,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

type NoteKey = (RecordId, RecordId);

#[derive(Debug, Clone)]
pub enum NoteStore {
    Memory(Arc<Mutex<HashMap<NoteKey, Note>>>),
    Postgres(PgPool),
}

fn check_version(current: i64, expected: Option<i64>) -> Result<()> {
    // ---
    match expected {
        Some(expected) if expected != current => Err(AppError::Conflict(format!(
            "note was modified (expected version {expected}, found {current})"
        ))),
        _ => Ok(()),
    }
}

impl NoteStore {
    pub fn in_memory() -> Self {
        NoteStore::Memory(Arc::default())
    }

    pub async fn get(&self, apiary_id: &RecordId, hive_id: &RecordId) -> Result<Option<Note>> {
        // ---
        match self {
            NoteStore::Memory(map) => {
                let map = map.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                Ok(map.get(&(apiary_id.clone(), hive_id.clone())).cloned())
            }
            NoteStore::Postgres(pool) => {
                let note = sqlx::query_as::<_, Note>(
                    r#"
                    SELECT apiary_id, hive_id, body, version, updated_at
                    FROM hive_notes
                    WHERE apiary_id = $1 AND hive_id = $2
                    "#,
                )
                .bind(apiary_id.as_str())
                .bind(hive_id.as_str())
                .fetch_optional(pool)
                .await?;
                Ok(note)
            }
        }
    }

    /// Save a note. `expected_version` of `None` overwrites unconditionally;
    /// a never-saved note has version 0.
    pub async fn put(
        &self,
        apiary_id: &RecordId,
        hive_id: &RecordId,
        body: &str,
        expected_version: Option<i64>,
    ) -> Result<Note> {
        // ---
        match self {
            NoteStore::Memory(map) => {
                let mut map = map.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                let key = (apiary_id.clone(), hive_id.clone());
                let current = map.get(&key).map(|n| n.version).unwrap_or(0);
                check_version(current, expected_version)?;

                let note = Note {
                    apiary_id: apiary_id.to_string(),
                    hive_id: hive_id.to_string(),
                    body: body.to_string(),
                    version: current + 1,
                    updated_at: Utc::now(),
                };
                map.insert(key, note.clone());
                Ok(note)
            }
            NoteStore::Postgres(pool) => {
                let mut tx = pool.begin().await?;

                let current: Option<i64> = sqlx::query_scalar(
                    r#"
                    SELECT version FROM hive_notes
                    WHERE apiary_id = $1 AND hive_id = $2
                    FOR UPDATE
                    "#,
                )
                .bind(apiary_id.as_str())
                .bind(hive_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;
                check_version(current.unwrap_or(0), expected_version)?;

                let note = sqlx::query_as::<_, Note>(
                    r#"
                    INSERT INTO hive_notes (apiary_id, hive_id, body, version, updated_at)
                    VALUES ($1, $2, $3, 1, NOW())
                    ON CONFLICT (apiary_id, hive_id) DO UPDATE SET
                        body = EXCLUDED.body,
                        version = hive_notes.version + 1,
                        updated_at = EXCLUDED.updated_at
                    RETURNING apiary_id, hive_id, body, version, updated_at
                    "#,
                )
                .bind(apiary_id.as_str())
                .bind(hive_id.as_str())
                .bind(body)
                .fetch_one(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok(note)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_versions_increase_and_conflicts_are_detected() {
        // ---
        let store = NoteStore::in_memory();
        let (apiary, hive) = (RecordId::from(1), RecordId::from(3));

        tokio_test::block_on(async {
            assert_eq!(store.get(&apiary, &hive).await.unwrap(), None);

            let first = store.put(&apiary, &hive, "regina vista", Some(0)).await.unwrap();
            assert_eq!(first.version, 1);

            let second = store.put(&apiary, &hive, "melario aggiunto", Some(1)).await.unwrap();
            assert_eq!(second.version, 2);

            let stale = store.put(&apiary, &hive, "vecchia bozza", Some(1)).await;
            assert!(matches!(stale, Err(AppError::Conflict(_))));

            let stored = store.get(&apiary, &hive).await.unwrap().unwrap();
            assert_eq!(stored.body, "melario aggiunto");
        });
    }

    #[test]
    fn test_notes_are_scoped_per_hive() {
        // ---
        let store = NoteStore::in_memory();
        tokio_test::block_on(async {
            store
                .put(&RecordId::from(1), &RecordId::from(3), "a", None)
                .await
                .unwrap();
            let other = store.get(&RecordId::from(1), &RecordId::from(4)).await.unwrap();
            assert!(other.is_none());

            let overwrite = store
                .put(&RecordId::from(1), &RecordId::from(3), "b", None)
                .await
                .unwrap();
            assert_eq!(overwrite.version, 2);
        });
    }
}
