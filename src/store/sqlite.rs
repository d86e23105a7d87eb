//! Embedded SQLite-compatible store (via `libsql`), with an FTS5 shadow
//! index kept consistent through the triggers installed in
//! [`super::migrations`].
//!
//! Reads take the shared side of a `tokio::sync::RwLock` guarding the single
//! connection; mutations take the exclusive side. This directly implements
//! the concurrency contract: readers never block each other, writers are
//! fully serialized, and callers on other tasks observe a consistent view
//! after any write completes.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use libsql::{params, params_from_iter, Connection, Database, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::migrations;
use super::Store;
use crate::error::{Error, Result};
use crate::types::{Concept, Learning, Scope, TaskOutcome, TaskOutcomeKind, VerificationStatus};

/// Embedded, single-connection store backing one `.alphie/learnings.db` (or
/// the global `alphie.db`).
pub struct SqliteStore {
    // Kept alive for the lifetime of the store; libsql::Connection borrows
    // from it transitively via Arc internally.
    _db: Database,
    conn: RwLock<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`, creating parent
    /// directories with mode `0755`, then apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o755))
                    .map_err(Error::Io)?;
            }
        }

        info!(path = %path.display(), "opening learning store");
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| Error::StorageFailure(format!("failed to open database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| Error::StorageFailure(format!("failed to connect: {e}")))?;

        migrations::run(&conn).await?;

        Ok(Self {
            _db: db,
            conn: RwLock::new(conn),
        })
    }

    /// Open a transient, private in-memory store. Used by tests and by
    /// callers that want a throwaway scratch database.
    pub async fn open_in_memory() -> Result<Self> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| Error::StorageFailure(format!("failed to open in-memory database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| Error::StorageFailure(format!("failed to connect: {e}")))?;
        migrations::run(&conn).await?;
        Ok(Self {
            _db: db,
            conn: RwLock::new(conn),
        })
    }
}

fn row_to_learning(row: &libsql::Row) -> Result<Learning> {
    let id: String = row.get(0).map_err(|e| Error::StorageFailure(e.to_string()))?;
    let condition: String = row.get(1).map_err(|e| Error::StorageFailure(e.to_string()))?;
    let action: String = row.get(2).map_err(|e| Error::StorageFailure(e.to_string()))?;
    let outcome: String = row.get(3).map_err(|e| Error::StorageFailure(e.to_string()))?;
    let commit_hash: Option<String> = row.get(4).ok();
    let log_snippet_id: Option<String> = row.get(5).ok();
    let scope_str: String = row.get(6).map_err(|e| Error::StorageFailure(e.to_string()))?;
    let ttl_secs: i64 = row.get(7).map_err(|e| Error::StorageFailure(e.to_string()))?;
    let last_triggered: Option<i64> = row.get(8).ok();
    let trigger_count: i64 = row.get(9).map_err(|e| Error::StorageFailure(e.to_string()))?;
    let outcome_type_str: String = row.get(10).map_err(|e| Error::StorageFailure(e.to_string()))?;
    let created_at: i64 = row.get(11).map_err(|e| Error::StorageFailure(e.to_string()))?;
    let success_count: i64 = row.get(12).map_err(|e| Error::StorageFailure(e.to_string()))?;
    let failure_count: i64 = row.get(13).map_err(|e| Error::StorageFailure(e.to_string()))?;
    let effectiveness: f64 = row.get(14).map_err(|e| Error::StorageFailure(e.to_string()))?;

    Ok(Learning {
        id,
        condition,
        action,
        outcome,
        commit_hash,
        log_snippet_id,
        scope: scope_str.parse().map_err(|_: Error| {
            Error::StorageFailure(format!("corrupt scope value: {scope_str}"))
        })?,
        ttl: std::time::Duration::from_secs(ttl_secs.max(0) as u64),
        last_triggered: last_triggered.map(unix_to_datetime),
        trigger_count: trigger_count.max(0) as u64,
        outcome_type: outcome_type_str.parse().map_err(|_: Error| {
            Error::StorageFailure(format!("corrupt outcome_type value: {outcome_type_str}"))
        })?,
        created_at: unix_to_datetime(created_at),
        success_count: success_count.max(0) as u64,
        failure_count: failure_count.max(0) as u64,
        effectiveness,
    })
}

fn unix_to_datetime(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

const LEARNING_COLUMNS: &str = "id, condition, action, outcome, commit_hash, log_snippet_id, \
     scope, ttl_secs, last_triggered, trigger_count, outcome_type, created_at, \
     success_count, failure_count, effectiveness";

/// Same columns as [`LEARNING_COLUMNS`], each qualified with the `l.` alias.
/// Needed wherever `learnings` is joined against `learnings_fts`, whose
/// virtual-table columns (`id`, `condition`, `action`, `outcome`) would
/// otherwise collide with the real table's and make the query ambiguous.
const LEARNING_COLUMNS_QUALIFIED: &str = "l.id, l.condition, l.action, l.outcome, l.commit_hash, \
     l.log_snippet_id, l.scope, l.ttl_secs, l.last_triggered, l.trigger_count, l.outcome_type, \
     l.created_at, l.success_count, l.failure_count, l.effectiveness";

/// Builds a disjunctive FTS5 MATCH expression from already-tokenized,
/// whitespace-separated terms. Each term is double-quoted so that FTS5 never
/// interprets user-supplied punctuation as query syntax.
fn fts_match_expr(query: &str) -> String {
    query
        .split_whitespace()
        .filter(|t| !t.eq_ignore_ascii_case("or"))
        .map(|t| format!("\"{}\"", t.replace('"', "")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[async_trait]
impl Store for SqliteStore {
    async fn create(&self, learning: &Learning) -> Result<()> {
        let conn = self.conn.write().await;
        if get_by_id(&conn, &learning.id).await?.is_some() {
            return Err(Error::DuplicateId(learning.id.clone()));
        }

        let sql = format!(
            "INSERT INTO learnings ({LEARNING_COLUMNS}) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)"
        );
        conn.execute(
            &sql,
            params![
                learning.id.clone(),
                learning.condition.clone(),
                learning.action.clone(),
                learning.outcome.clone(),
                learning.commit_hash.clone(),
                learning.log_snippet_id.clone(),
                learning.scope.to_string(),
                learning.ttl.as_secs() as i64,
                learning.last_triggered.map(|t| t.timestamp()),
                learning.trigger_count as i64,
                learning.outcome_type.to_string(),
                learning.created_at.timestamp(),
                learning.success_count as i64,
                learning.failure_count as i64,
                learning.effectiveness
            ],
        )
        .await
        .map_err(|e| Error::StorageFailure(format!("create learning: {e}")))?;
        debug!(id = %learning.id, "created learning");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Learning>> {
        let conn = self.conn.read().await;
        get_by_id(&conn, id).await
    }

    async fn update(&self, learning: &Learning) -> Result<()> {
        let conn = self.conn.write().await;
        if get_by_id(&conn, &learning.id).await?.is_none() {
            return Err(Error::NotFound(learning.id.clone()));
        }

        let sql = "UPDATE learnings SET condition=?,action=?,outcome=?,commit_hash=?,\
            log_snippet_id=?,scope=?,ttl_secs=?,last_triggered=?,trigger_count=?,\
            outcome_type=?,created_at=?,success_count=?,failure_count=?,effectiveness=? \
            WHERE id=?";

        conn.execute(
            sql,
            params![
                learning.condition.clone(),
                learning.action.clone(),
                learning.outcome.clone(),
                learning.commit_hash.clone(),
                learning.log_snippet_id.clone(),
                learning.scope.to_string(),
                learning.ttl.as_secs() as i64,
                learning.last_triggered.map(|t| t.timestamp()),
                learning.trigger_count as i64,
                learning.outcome_type.to_string(),
                learning.created_at.timestamp(),
                learning.success_count as i64,
                learning.failure_count as i64,
                learning.effectiveness,
                learning.id.clone()
            ],
        )
        .await
        .map_err(|e| Error::StorageFailure(format!("update learning: {e}")))?;
        debug!(id = %learning.id, "updated learning");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.write().await;
        if get_by_id(&conn, id).await?.is_none() {
            return Err(Error::NotFound(id.to_string()));
        }
        conn.execute("DELETE FROM learnings WHERE id = ?", params![id.to_string()])
            .await
            .map_err(|e| Error::StorageFailure(format!("delete learning: {e}")))?;
        debug!(id, "deleted learning");
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<Vec<Learning>> {
        let expr = fts_match_expr(query);
        if expr.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.read().await;
        let sql = format!(
            "SELECT {LEARNING_COLUMNS_QUALIFIED} FROM learnings_fts f JOIN learnings l ON l.id = f.id \
             WHERE learnings_fts MATCH ?1 ORDER BY rank"
        );
        query_learnings(&conn, &sql, params![expr]).await
    }

    async fn search_by_scope(&self, query: &str, scopes: &[Scope]) -> Result<Vec<Learning>> {
        if scopes.is_empty() {
            return Ok(Vec::new());
        }
        let expr = fts_match_expr(query);
        if expr.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.read().await;
        let placeholders = scopes.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT {LEARNING_COLUMNS_QUALIFIED} FROM learnings_fts f JOIN learnings l ON l.id = f.id \
             WHERE learnings_fts MATCH ?1 AND l.scope IN ({placeholders}) ORDER BY rank"
        );
        let mut values: Vec<Value> = vec![expr.into()];
        values.extend(scopes.iter().map(|s| s.to_string().into()));
        query_learnings(&conn, &sql, params_from_iter(values)).await
    }

    async fn list(&self, limit: usize) -> Result<Vec<Learning>> {
        let conn = self.conn.read().await;
        let sql = format!(
            "SELECT {LEARNING_COLUMNS} FROM learnings ORDER BY created_at DESC LIMIT ?1"
        );
        query_learnings(&conn, &sql, params![limit as i64]).await
    }

    async fn list_by_scope(&self, scopes: &[Scope], limit: usize) -> Result<Vec<Learning>> {
        if scopes.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.read().await;
        let placeholders = scopes.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT {LEARNING_COLUMNS} FROM learnings WHERE scope IN ({placeholders}) \
             ORDER BY created_at DESC LIMIT ?{}",
            scopes.len() + 1
        );
        let mut values: Vec<Value> = scopes.iter().map(|s| s.to_string().into()).collect();
        values.push((limit as i64).into());
        query_learnings(&conn, &sql, params_from_iter(values)).await
    }

    async fn search_by_condition(&self, pattern: &str) -> Result<Vec<Learning>> {
        let conn = self.conn.read().await;
        let sql = format!(
            "SELECT {LEARNING_COLUMNS} FROM learnings WHERE condition LIKE ?1 ESCAPE '\\' \
             COLLATE NOCASE ORDER BY created_at DESC"
        );
        query_learnings(&conn, &sql, params![like_contains(pattern)]).await
    }

    async fn search_by_path(&self, prefix: &str) -> Result<Vec<Learning>> {
        let conn = self.conn.read().await;
        let sql = format!(
            "SELECT {LEARNING_COLUMNS} FROM learnings WHERE condition LIKE ?1 ESCAPE '\\' \
             COLLATE NOCASE ORDER BY created_at DESC"
        );
        query_learnings(&conn, &sql, params![like_contains(prefix)]).await
    }

    async fn all(&self) -> Result<Vec<Learning>> {
        let conn = self.conn.read().await;
        let sql = format!("SELECT {LEARNING_COLUMNS} FROM learnings");
        query_learnings(&conn, &sql, ()).await
    }

    async fn increment_trigger_count(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.write().await;
        if get_by_id(&conn, id).await?.is_none() {
            return Err(Error::NotFound(id.to_string()));
        }
        conn.execute(
            "UPDATE learnings SET trigger_count = trigger_count + 1, last_triggered = ? WHERE id = ?",
            params![now.timestamp(), id.to_string()],
        )
        .await
        .map_err(|e| Error::StorageFailure(format!("increment_trigger_count: {e}")))?;
        Ok(())
    }

    async fn delete_many(&self, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.write().await;
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!("DELETE FROM learnings WHERE id IN ({placeholders})");
        let values: Vec<Value> = ids.iter().map(|i| i.clone().into()).collect();
        conn.execute(&sql, params_from_iter(values))
            .await
            .map_err(|e| Error::StorageFailure(format!("delete_many: {e}")))
    }

    async fn record_outcome(&self, outcome: &TaskOutcome) -> Result<()> {
        let conn = self.conn.write().await;
        let is_success = outcome.is_success();
        let learnings_json = serde_json::to_string(&outcome.learnings_used)?;

        conn.execute("BEGIN", ())
            .await
            .map_err(|e| Error::StorageFailure(format!("begin record_outcome: {e}")))?;

        if let Err(e) = conn
            .execute(
                "INSERT INTO task_outcomes (task_id, session_id, outcome, verification_passed, \
                 learnings_used, created_at) VALUES (?,?,?,?,?,?) \
                 ON CONFLICT(task_id) DO UPDATE SET session_id=excluded.session_id, \
                 outcome=excluded.outcome, verification_passed=excluded.verification_passed, \
                 learnings_used=excluded.learnings_used, created_at=excluded.created_at",
                params![
                    outcome.task_id.clone(),
                    outcome.session_id.clone(),
                    outcome.outcome.to_string(),
                    outcome.verification_passed.to_string(),
                    learnings_json,
                    outcome.created_at.timestamp()
                ],
            )
            .await
        {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(Error::StorageFailure(format!("record_outcome upsert: {e}")));
        }

        for learning_id in &outcome.learnings_used {
            let learning = match get_by_id(&conn, learning_id).await {
                Ok(Some(l)) => l,
                Ok(None) => {
                    debug!(learning_id, "skipped outcome update for missing learning");
                    continue;
                }
                Err(e) => {
                    conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e);
                }
            };

            let (success_count, failure_count) = if is_success {
                (learning.success_count + 1, learning.failure_count)
            } else {
                (learning.success_count, learning.failure_count + 1)
            };
            let effectiveness = success_count as f64 / (success_count + failure_count) as f64;

            if let Err(e) = conn
                .execute(
                    "UPDATE learnings SET success_count = ?, failure_count = ?, effectiveness = ? WHERE id = ?",
                    params![success_count as i64, failure_count as i64, effectiveness, learning_id.clone()],
                )
                .await
            {
                conn.execute("ROLLBACK", ()).await.ok();
                return Err(Error::StorageFailure(format!("record_outcome apply: {e}")));
            }
        }

        conn.execute("COMMIT", ())
            .await
            .map_err(|e| Error::StorageFailure(format!("commit record_outcome: {e}")))?;
        debug!(task_id = %outcome.task_id, "recorded task outcome");
        Ok(())
    }

    async fn get_task_outcome(&self, task_id: &str) -> Result<Option<TaskOutcome>> {
        let conn = self.conn.read().await;
        let mut rows = conn
            .query(
                "SELECT task_id, session_id, outcome, verification_passed, learnings_used, \
                 created_at FROM task_outcomes WHERE task_id = ?",
                params![task_id.to_string()],
            )
            .await
            .map_err(|e| Error::StorageFailure(format!("get_task_outcome: {e}")))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::StorageFailure(format!("get_task_outcome row: {e}")))?
        else {
            return Ok(None);
        };
        Ok(Some(row_to_task_outcome(&row)?))
    }

    async fn create_concept(&self, concept: &Concept) -> Result<()> {
        let conn = self.conn.write().await;
        let result = conn
            .execute(
                "INSERT INTO concepts (id, name, summary, created_at) VALUES (?,?,?,?)",
                params![
                    concept.id.clone(),
                    concept.name.clone(),
                    concept.summary.clone(),
                    concept.created_at.timestamp()
                ],
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().to_lowercase().contains("unique") => {
                Err(Error::UniqueConstraint(format!("concept name already exists: {}", concept.name)))
            }
            Err(e) => Err(Error::StorageFailure(format!("create_concept: {e}"))),
        }
    }

    async fn get_concept(&self, id: &str) -> Result<Option<Concept>> {
        let conn = self.conn.read().await;
        get_concept_by(&conn, "id", id).await
    }

    async fn get_concept_by_name(&self, name: &str) -> Result<Option<Concept>> {
        let conn = self.conn.read().await;
        get_concept_by(&conn, "name", name).await
    }

    async fn delete_concept(&self, id: &str) -> Result<()> {
        let conn = self.conn.write().await;
        if get_concept_by(&conn, "id", id).await?.is_none() {
            return Err(Error::NotFound(id.to_string()));
        }
        conn.execute("DELETE FROM concepts WHERE id = ?", params![id.to_string()])
            .await
            .map_err(|e| Error::StorageFailure(format!("delete_concept: {e}")))?;
        Ok(())
    }

    async fn list_concepts(&self) -> Result<Vec<Concept>> {
        let conn = self.conn.read().await;
        let mut rows = conn
            .query("SELECT id, name, summary, created_at FROM concepts ORDER BY name", ())
            .await
            .map_err(|e| Error::StorageFailure(format!("list_concepts: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| Error::StorageFailure(format!("list_concepts row: {e}")))?
        {
            out.push(row_to_concept(&row)?);
        }
        Ok(out)
    }

    async fn add_link(&self, learning_id: &str, concept_id: &str) -> Result<()> {
        let conn = self.conn.write().await;
        conn.execute(
            "INSERT OR IGNORE INTO learning_concept_links (learning_id, concept_id) VALUES (?,?)",
            params![learning_id.to_string(), concept_id.to_string()],
        )
        .await
        .map_err(|e| Error::StorageFailure(format!("add_link: {e}")))?;
        Ok(())
    }

    async fn remove_link(&self, learning_id: &str, concept_id: &str) -> Result<()> {
        let conn = self.conn.write().await;
        let changed = conn
            .execute(
                "DELETE FROM learning_concept_links WHERE learning_id = ? AND concept_id = ?",
                params![learning_id.to_string(), concept_id.to_string()],
            )
            .await
            .map_err(|e| Error::StorageFailure(format!("remove_link: {e}")))?;
        if changed == 0 {
            return Err(Error::NotFound(format!("link {learning_id}/{concept_id}")));
        }
        Ok(())
    }

    async fn concepts_for_learning(&self, learning_id: &str) -> Result<Vec<String>> {
        let conn = self.conn.read().await;
        let mut rows = conn
            .query(
                "SELECT concept_id FROM learning_concept_links WHERE learning_id = ?",
                params![learning_id.to_string()],
            )
            .await
            .map_err(|e| Error::StorageFailure(format!("concepts_for_learning: {e}")))?;
        collect_string_column(&mut rows).await
    }

    async fn learnings_for_concept(&self, concept_id: &str) -> Result<Vec<String>> {
        let conn = self.conn.read().await;
        let mut rows = conn
            .query(
                "SELECT learning_id FROM learning_concept_links WHERE concept_id = ?",
                params![concept_id.to_string()],
            )
            .await
            .map_err(|e| Error::StorageFailure(format!("learnings_for_concept: {e}")))?;
        collect_string_column(&mut rows).await
    }
}

async fn collect_string_column(rows: &mut libsql::Rows) -> Result<Vec<String>> {
    let mut out = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| Error::StorageFailure(format!("reading row: {e}")))?
    {
        let value: String = row.get(0).map_err(|e| Error::StorageFailure(e.to_string()))?;
        out.push(value);
    }
    Ok(out)
}

fn row_to_concept(row: &libsql::Row) -> Result<Concept> {
    let id: String = row.get(0).map_err(|e| Error::StorageFailure(e.to_string()))?;
    let name: String = row.get(1).map_err(|e| Error::StorageFailure(e.to_string()))?;
    let summary: Option<String> = row.get(2).ok();
    let created_at: i64 = row.get(3).map_err(|e| Error::StorageFailure(e.to_string()))?;
    Ok(Concept {
        id,
        name,
        summary,
        created_at: unix_to_datetime(created_at),
    })
}

fn row_to_task_outcome(row: &libsql::Row) -> Result<TaskOutcome> {
    let task_id: String = row.get(0).map_err(|e| Error::StorageFailure(e.to_string()))?;
    let session_id: Option<String> = row.get(1).ok();
    let outcome_str: String = row.get(2).map_err(|e| Error::StorageFailure(e.to_string()))?;
    let verification_str: String = row.get(3).map_err(|e| Error::StorageFailure(e.to_string()))?;
    let learnings_json: String = row.get(4).map_err(|e| Error::StorageFailure(e.to_string()))?;
    let created_at: i64 = row.get(5).map_err(|e| Error::StorageFailure(e.to_string()))?;

    let outcome: TaskOutcomeKind = outcome_str
        .parse()
        .map_err(|_: Error| Error::StorageFailure(format!("corrupt outcome: {outcome_str}")))?;
    let verification_passed: VerificationStatus = verification_str.parse().map_err(|_: Error| {
        Error::StorageFailure(format!("corrupt verification status: {verification_str}"))
    })?;
    let learnings_used: Vec<String> = serde_json::from_str(&learnings_json)?;

    Ok(TaskOutcome {
        task_id,
        session_id,
        outcome,
        verification_passed,
        learnings_used,
        created_at: unix_to_datetime(created_at),
    })
}

async fn get_by_id(conn: &Connection, id: &str) -> Result<Option<Learning>> {
    let sql = format!("SELECT {LEARNING_COLUMNS} FROM learnings WHERE id = ?1");
    let mut rows = conn
        .query(&sql, params![id.to_string()])
        .await
        .map_err(|e| Error::StorageFailure(format!("get: {e}")))?;

    match rows
        .next()
        .await
        .map_err(|e| Error::StorageFailure(format!("get row: {e}")))?
    {
        Some(row) => Ok(Some(row_to_learning(&row)?)),
        None => Ok(None),
    }
}

async fn get_concept_by(conn: &Connection, column: &str, value: &str) -> Result<Option<Concept>> {
    let sql = format!("SELECT id, name, summary, created_at FROM concepts WHERE {column} = ?1");
    let mut rows = conn
        .query(&sql, params![value.to_string()])
        .await
        .map_err(|e| Error::StorageFailure(format!("get_concept: {e}")))?;

    match rows
        .next()
        .await
        .map_err(|e| Error::StorageFailure(format!("get_concept row: {e}")))?
    {
        Some(row) => Ok(Some(row_to_concept(&row)?)),
        None => Ok(None),
    }
}

async fn query_learnings(
    conn: &Connection,
    sql: &str,
    params: impl libsql::params::IntoParams,
) -> Result<Vec<Learning>> {
    let mut rows = conn
        .query(sql, params)
        .await
        .map_err(|e| Error::StorageFailure(format!("query: {e}")))?;

    let mut out = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| Error::StorageFailure(format!("query row: {e}")))?
    {
        out.push(row_to_learning(&row)?);
    }
    Ok(out)
}

/// Builds a `LIKE` pattern for an unanchored, case-insensitive substring
/// match, escaping the caller's own `%`/`_`/`\` so they are matched literally
/// rather than interpreted as wildcards.
fn like_contains(pattern: &str) -> String {
    let escaped = pattern.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OutcomeType, Scope};

    fn sample(id: &str) -> Learning {
        Learning {
            id: id.to_string(),
            condition: "When tests fail with timeout errors".into(),
            action: "Increase timeout in test configuration".into(),
            outcome: "Tests pass consistently".into(),
            commit_hash: None,
            log_snippet_id: None,
            scope: Scope::Repo,
            ttl: std::time::Duration::from_secs(0),
            last_triggered: None,
            trigger_count: 0,
            outcome_type: OutcomeType::Success,
            created_at: Utc::now(),
            success_count: 0,
            failure_count: 0,
            effectiveness: 1.0,
        }
    }

    #[tokio::test]
    async fn round_trips_a_learning() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let learning = sample("learn-001");
        store.create(&learning).await.unwrap();

        let fetched = store.get("learn-001").await.unwrap().unwrap();
        assert_eq!(fetched.condition, learning.condition);
        assert_eq!(fetched.action, learning.action);
        assert_eq!(fetched.outcome, learning.outcome);
        assert_eq!(fetched.scope, learning.scope);
        assert_eq!(fetched.trigger_count, 0);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_id() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.create(&sample("dup")).await.unwrap();
        let err = store.create(&sample("dup")).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateId(_)));
    }

    #[tokio::test]
    async fn search_finds_by_keyword_and_respects_deletes() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.create(&sample("learn-001")).await.unwrap();

        let hits = store.search("timeout").await.unwrap();
        assert_eq!(hits.len(), 1);

        store.delete("learn-001").await.unwrap();
        let hits = store.search("timeout").await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn search_reflects_updates_not_stale_text() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let mut l = sample("learn-001");
        store.create(&l).await.unwrap();

        l.condition = "When builds fail with linker errors".into();
        store.update(&l).await.unwrap();

        assert!(store.search("timeout").await.unwrap().is_empty());
        assert_eq!(store.search("linker").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn search_by_path_matches_condition_substring() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let mut x = sample("x");
        x.condition = "Error seen under internal/agent/runner.go".into();
        let mut y = sample("y");
        y.condition = "Error seen under pkg/models/user.go".into();
        store.create(&x).await.unwrap();
        store.create(&y).await.unwrap();

        let hits = store.search_by_path("internal/agent").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "x");
    }

    #[tokio::test]
    async fn increment_trigger_count_is_atomic_and_monotonic() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.create(&sample("c")).await.unwrap();

        for _ in 0..3 {
            store.increment_trigger_count("c", Utc::now()).await.unwrap();
        }

        let l = store.get("c").await.unwrap().unwrap();
        assert_eq!(l.trigger_count, 3);
        assert!(l.last_triggered.is_some());
    }

    #[tokio::test]
    async fn scope_filters_exclude_other_scopes_and_empty_set_is_empty() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let mut g = sample("g");
        g.scope = Scope::Global;
        store.create(&sample("r")).await.unwrap();
        store.create(&g).await.unwrap();

        let repo_only = store.list_by_scope(&[Scope::Repo], 10).await.unwrap();
        assert_eq!(repo_only.len(), 1);
        assert_eq!(repo_only[0].id, "r");

        let none = store.list_by_scope(&[], 10).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn concept_crud_and_cascading_link_delete() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.create(&sample("learn-001")).await.unwrap();

        let concept = Concept {
            id: "concept-1".into(),
            name: "testing".into(),
            summary: None,
            created_at: Utc::now(),
        };
        store.create_concept(&concept).await.unwrap();
        store.add_link("learn-001", "concept-1").await.unwrap();
        // Idempotent re-add.
        store.add_link("learn-001", "concept-1").await.unwrap();

        assert_eq!(store.concepts_for_learning("learn-001").await.unwrap(), vec!["concept-1"]);

        store.delete_concept("concept-1").await.unwrap();
        assert!(store.concepts_for_learning("learn-001").await.unwrap().is_empty());
        // The learning itself survives concept deletion.
        assert!(store.get("learn-001").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn concept_name_collisions_surface_as_unique_constraint() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let concept = Concept {
            id: "c1".into(),
            name: "testing".into(),
            summary: None,
            created_at: Utc::now(),
        };
        store.create_concept(&concept).await.unwrap();

        let dup = Concept {
            id: "c2".into(),
            name: "testing".into(),
            summary: None,
            created_at: Utc::now(),
        };
        let err = store.create_concept(&dup).await.unwrap_err();
        assert!(matches!(err, Error::UniqueConstraint(_)));
    }

    fn outcome(task_id: &str, success: bool, learnings: &[&str]) -> TaskOutcome {
        TaskOutcome {
            task_id: task_id.to_string(),
            session_id: None,
            outcome: if success { TaskOutcomeKind::Success } else { TaskOutcomeKind::Failure },
            verification_passed: if success { VerificationStatus::Pass } else { VerificationStatus::Fail },
            learnings_used: learnings.iter().map(|s| s.to_string()).collect(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn record_outcome_updates_effectiveness_and_upserts_the_outcome_row() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.create(&sample("l")).await.unwrap();

        store.record_outcome(&outcome("t1", true, &["l"])).await.unwrap();
        let l = store.get("l").await.unwrap().unwrap();
        assert_eq!(l.effectiveness, 1.0);
        assert_eq!(l.success_count, 1);

        store.record_outcome(&outcome("t1", false, &["l"])).await.unwrap();
        let l = store.get("l").await.unwrap().unwrap();
        assert_eq!(l.effectiveness, 0.5);
        assert_eq!(l.failure_count, 1);

        let saved = store.get_task_outcome("t1").await.unwrap().unwrap();
        assert_eq!(saved.outcome, TaskOutcomeKind::Failure);
    }

    #[tokio::test]
    async fn record_outcome_skips_missing_learnings_without_erroring() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.record_outcome(&outcome("t1", true, &["ghost"])).await.unwrap();
        assert!(store.get_task_outcome("t1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_many_removes_only_the_listed_ids() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.create(&sample("keep")).await.unwrap();
        store.create(&sample("drop")).await.unwrap();

        let n = store.delete_many(&["drop".to_string(), "missing".to_string()]).await.unwrap();
        assert_eq!(n, 1);
        assert!(store.get("keep").await.unwrap().is_some());
        assert!(store.get("drop").await.unwrap().is_none());
    }
}
