//! Database schema management for the hive notes table.
//!
//! Ensures required tables exist before serving requests. Applied once on
//! startup from `main.rs` when `DATABASE_URL` is set (EMBP: single gateway
//! call). Remote entities are never stored here.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `hive_notes` table, one row per (apiary, hive) pair with a
/// version counter for conflict detection. Safe to call on every startup.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hive_notes (
            apiary_id   TEXT        NOT NULL,
            hive_id     TEXT        NOT NULL,
            body        TEXT        NOT NULL,
            version     BIGINT      NOT NULL,
            updated_at  TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (apiary_id, hive_id)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
