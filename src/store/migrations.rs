//! Schema migrations.
//!
//! Each migration is recorded in `schema_version` after it applies; re-running
//! is a no-op because every statement uses `IF NOT EXISTS`/`ADD COLUMN` guards
//! and the runner skips any migration whose version is already recorded.

use libsql::Connection;
use tracing::info;

use crate::error::{Error, Result};

const CREATE_SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY NOT NULL
)
"#;

/// v1: learnings table plus its FTS5 shadow index and sync triggers.
const MIGRATION_V1: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS learnings (
        id TEXT PRIMARY KEY NOT NULL,
        condition TEXT NOT NULL,
        action TEXT NOT NULL,
        outcome TEXT NOT NULL,
        commit_hash TEXT,
        log_snippet_id TEXT,
        scope TEXT NOT NULL,
        ttl_secs INTEGER NOT NULL DEFAULT 0,
        last_triggered INTEGER,
        trigger_count INTEGER NOT NULL DEFAULT 0,
        outcome_type TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE VIRTUAL TABLE IF NOT EXISTS learnings_fts USING fts5(
        id UNINDEXED,
        condition,
        action,
        outcome,
        tokenize='porter unicode61'
    )
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS learnings_ai AFTER INSERT ON learnings BEGIN
        INSERT INTO learnings_fts(id, condition, action, outcome)
        VALUES (new.id, new.condition, new.action, new.outcome);
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS learnings_au AFTER UPDATE ON learnings BEGIN
        UPDATE learnings_fts
        SET condition = new.condition, action = new.action, outcome = new.outcome
        WHERE id = new.id;
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS learnings_ad AFTER DELETE ON learnings BEGIN
        DELETE FROM learnings_fts WHERE id = old.id;
    END
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_learnings_created_at ON learnings(created_at DESC)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_learnings_scope ON learnings(scope)
    "#,
];

/// v2: concepts and the learning-concept link table, with cascade deletes.
const MIGRATION_V2: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS concepts (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL UNIQUE,
        summary TEXT,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS learning_concept_links (
        learning_id TEXT NOT NULL REFERENCES learnings(id) ON DELETE CASCADE,
        concept_id TEXT NOT NULL REFERENCES concepts(id) ON DELETE CASCADE,
        PRIMARY KEY (learning_id, concept_id)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_links_concept ON learning_concept_links(concept_id)
    "#,
];

/// v3: effectiveness columns on learnings, plus the task_outcomes table.
const MIGRATION_V3: &[&str] = &[
    "ALTER TABLE learnings ADD COLUMN success_count INTEGER NOT NULL DEFAULT 0",
    "ALTER TABLE learnings ADD COLUMN failure_count INTEGER NOT NULL DEFAULT 0",
    "ALTER TABLE learnings ADD COLUMN effectiveness REAL NOT NULL DEFAULT 1.0",
    r#"
    CREATE TABLE IF NOT EXISTS task_outcomes (
        task_id TEXT PRIMARY KEY NOT NULL,
        session_id TEXT,
        outcome TEXT NOT NULL,
        verification_passed TEXT NOT NULL,
        learnings_used TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_task_outcomes_created_at ON task_outcomes(created_at DESC)
    "#,
];

const MIGRATIONS: &[(i64, &[&str])] = &[(1, MIGRATION_V1), (2, MIGRATION_V2), (3, MIGRATION_V3)];

/// Apply every migration newer than the database's recorded version, each in
/// its own transaction, recording the new version as it commits.
pub async fn run(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_SCHEMA_VERSION_TABLE, ())
        .await
        .map_err(|e| Error::MigrationFailure(format!("schema_version table: {e}")))?;

    let current = current_version(conn).await?;

    for (version, statements) in MIGRATIONS {
        if *version <= current {
            continue;
        }

        conn.execute("BEGIN", ())
            .await
            .map_err(|e| Error::MigrationFailure(format!("begin v{version}: {e}")))?;

        for stmt in *statements {
            if let Err(e) = conn.execute(stmt, ()).await {
                conn.execute("ROLLBACK", ()).await.ok();
                return Err(Error::MigrationFailure(format!(
                    "migration v{version} failed: {e}"
                )));
            }
        }

        if let Err(e) = conn
            .execute("INSERT INTO schema_version(version) VALUES (?)", libsql::params![*version])
            .await
        {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(Error::MigrationFailure(format!(
                "recording v{version} failed: {e}"
            )));
        }

        conn.execute("COMMIT", ())
            .await
            .map_err(|e| Error::MigrationFailure(format!("commit v{version}: {e}")))?;

        info!(version, "applied migration");
    }

    Ok(())
}

async fn current_version(conn: &Connection) -> Result<i64> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await
        .map_err(|e| Error::MigrationFailure(format!("reading schema_version: {e}")))?;

    match rows
        .next()
        .await
        .map_err(|e| Error::MigrationFailure(format!("reading schema_version row: {e}")))?
    {
        Some(row) => row
            .get::<i64>(0)
            .map_err(|e| Error::MigrationFailure(format!("parsing schema_version: {e}"))),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = libsql::Builder::new_local(":memory:").build().await.unwrap();
        let conn = db.connect().unwrap();
        run(&conn).await.unwrap();
        // Running twice must not error (IF NOT EXISTS / already-recorded version).
        run(&conn).await.unwrap();

        let version = current_version(&conn).await.unwrap();
        assert_eq!(version, 3);
    }
}
