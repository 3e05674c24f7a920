//! SQLite run history.
//!
//! Two tables in one database file:
//! - `runs`: one row per crew kickoff
//! - `agent_interactions`: one row per agent execution, keyed to its run
//!
//! Timestamps are stored as fixed-width RFC 3339 strings so that text
//! ordering matches chronological ordering.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use crewforge_core::crew::ProcessMode;
use crewforge_core::error::HistoryError;
use crewforge_core::history::{AgentInteraction, HistoryStore, RunRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// A durable SQLite history store.
pub struct SqliteHistory {
    pool: SqlitePool,
}

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn col<T>(row: &sqlx::sqlite::SqliteRow, name: &str) -> Result<T, HistoryError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| HistoryError::QueryFailed(format!("{name} column: {e}")))
}

impl SqliteHistory {
    /// Open (or create) the history database at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database.
    pub async fn new(path: &str) -> Result<Self, HistoryError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| HistoryError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| HistoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite history initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, HistoryError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), HistoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id               TEXT PRIMARY KEY,
                client_id        TEXT NOT NULL,
                crew_id          TEXT NOT NULL,
                crew_name        TEXT NOT NULL,
                crew_type        TEXT NOT NULL,
                process          TEXT NOT NULL,
                total_tasks      INTEGER NOT NULL,
                completed_tasks  INTEGER NOT NULL,
                failed_tasks     INTEGER NOT NULL,
                final_output     TEXT NOT NULL,
                total_tokens     INTEGER NOT NULL,
                total_time_ms    INTEGER NOT NULL,
                success          INTEGER NOT NULL,
                error            TEXT,
                initial_context  TEXT,
                params           TEXT NOT NULL DEFAULT 'null',
                created_at       TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::MigrationFailed(format!("runs table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agent_interactions (
                iid                   INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id                TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
                client_id             TEXT NOT NULL,
                agent_id              TEXT NOT NULL,
                agent_name            TEXT NOT NULL,
                output                TEXT NOT NULL,
                tokens_used           INTEGER NOT NULL,
                execution_time_ms     INTEGER NOT NULL,
                reflection_score      REAL,
                reflection_confidence REAL,
                was_corrected         INTEGER NOT NULL,
                fallback_used         INTEGER NOT NULL,
                tools_called          TEXT NOT NULL DEFAULT '[]',
                error                 TEXT,
                created_at            TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::MigrationFailed(format!("agent_interactions table: {e}")))?;

        for (name, sql) in [
            (
                "runs client index",
                "CREATE INDEX IF NOT EXISTS idx_runs_client ON runs(client_id, created_at DESC)",
            ),
            (
                "interactions client index",
                "CREATE INDEX IF NOT EXISTS idx_interactions_client ON agent_interactions(client_id, agent_id)",
            ),
        ] {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| HistoryError::MigrationFailed(format!("{name}: {e}")))?;
        }

        debug!("SQLite history migrations complete");
        Ok(())
    }

    fn row_to_run(row: &sqlx::sqlite::SqliteRow) -> Result<RunRecord, HistoryError> {
        let process: String = col(row, "process")?;
        let params: String = col(row, "params")?;
        let created_at: String = col(row, "created_at")?;
        Ok(RunRecord {
            id: col(row, "id")?,
            client_id: col(row, "client_id")?,
            crew_id: col(row, "crew_id")?,
            crew_name: col(row, "crew_name")?,
            crew_type: col(row, "crew_type")?,
            process: ProcessMode::from_str(&process).unwrap_or_default(),
            total_tasks: col::<i64>(row, "total_tasks")? as u32,
            completed_tasks: col::<i64>(row, "completed_tasks")? as u32,
            failed_tasks: col::<i64>(row, "failed_tasks")? as u32,
            final_output: col(row, "final_output")?,
            total_tokens: col::<i64>(row, "total_tokens")? as u64,
            total_time_ms: col::<i64>(row, "total_time_ms")? as u64,
            success: col(row, "success")?,
            error: col(row, "error")?,
            initial_context: col(row, "initial_context")?,
            params: serde_json::from_str(&params).unwrap_or_default(),
            created_at: parse_ts(&created_at),
        })
    }

    fn row_to_interaction(row: &sqlx::sqlite::SqliteRow) -> Result<AgentInteraction, HistoryError> {
        let tools: String = col(row, "tools_called")?;
        let created_at: String = col(row, "created_at")?;
        Ok(AgentInteraction {
            run_id: col(row, "run_id")?,
            client_id: col(row, "client_id")?,
            agent_id: col(row, "agent_id")?,
            agent_name: col(row, "agent_name")?,
            output: col(row, "output")?,
            tokens_used: col::<i64>(row, "tokens_used")? as u64,
            execution_time_ms: col::<i64>(row, "execution_time_ms")? as u64,
            reflection_score: col::<Option<f64>>(row, "reflection_score")?.map(|v| v as f32),
            reflection_confidence: col::<Option<f64>>(row, "reflection_confidence")?
                .map(|v| v as f32),
            was_corrected: col(row, "was_corrected")?,
            fallback_used: col(row, "fallback_used")?,
            tools_called: serde_json::from_str(&tools).unwrap_or_default(),
            error: col(row, "error")?,
            created_at: parse_ts(&created_at),
        })
    }

    async fn fetch_runs<'q>(
        &self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> Result<Vec<RunRecord>, HistoryError> {
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| HistoryError::QueryFailed(e.to_string()))?;
        rows.iter().map(Self::row_to_run).collect()
    }
}

#[async_trait]
impl HistoryStore for SqliteHistory {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append_run(&self, run: &RunRecord) -> Result<String, HistoryError> {
        let params = serde_json::to_string(&run.params)
            .map_err(|e| HistoryError::Storage(format!("params serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO runs (id, client_id, crew_id, crew_name, crew_type, process,
                              total_tasks, completed_tasks, failed_tasks, final_output,
                              total_tokens, total_time_ms, success, error,
                              initial_context, params, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&run.id)
        .bind(&run.client_id)
        .bind(&run.crew_id)
        .bind(&run.crew_name)
        .bind(&run.crew_type)
        .bind(run.process.to_string())
        .bind(run.total_tasks as i64)
        .bind(run.completed_tasks as i64)
        .bind(run.failed_tasks as i64)
        .bind(&run.final_output)
        .bind(run.total_tokens as i64)
        .bind(run.total_time_ms as i64)
        .bind(run.success)
        .bind(&run.error)
        .bind(&run.initial_context)
        .bind(&params)
        .bind(ts(&run.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Storage(format!("INSERT run failed: {e}")))?;

        debug!(run_id = %run.id, client = %run.client_id, "Recorded run");
        Ok(run.id.clone())
    }

    async fn list_runs(
        &self,
        client_id: &str,
        limit: usize,
    ) -> Result<Vec<RunRecord>, HistoryError> {
        self.fetch_runs(
            sqlx::query(
                "SELECT * FROM runs WHERE client_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            )
            .bind(client_id)
            .bind(limit as i64),
        )
        .await
    }

    async fn append_agent_interactions(
        &self,
        run_id: &str,
        interactions: &[AgentInteraction],
    ) -> Result<(), HistoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| HistoryError::Storage(e.to_string()))?;

        for i in interactions {
            let tools = serde_json::to_string(&i.tools_called)
                .map_err(|e| HistoryError::Storage(format!("tools serialization: {e}")))?;
            sqlx::query(
                r#"
                INSERT INTO agent_interactions (run_id, client_id, agent_id, agent_name, output,
                                                tokens_used, execution_time_ms, reflection_score,
                                                reflection_confidence, was_corrected, fallback_used,
                                                tools_called, error, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                "#,
            )
            .bind(run_id)
            .bind(&i.client_id)
            .bind(&i.agent_id)
            .bind(&i.agent_name)
            .bind(&i.output)
            .bind(i.tokens_used as i64)
            .bind(i.execution_time_ms as i64)
            .bind(i.reflection_score.map(f64::from))
            .bind(i.reflection_confidence.map(f64::from))
            .bind(i.was_corrected)
            .bind(i.fallback_used)
            .bind(&tools)
            .bind(&i.error)
            .bind(ts(&i.created_at))
            .execute(&mut *tx)
            .await
            .map_err(|e| HistoryError::Storage(format!("INSERT interaction failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| HistoryError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn successful_runs(
        &self,
        client_id: &str,
        crew_type: &str,
        limit: usize,
    ) -> Result<Vec<RunRecord>, HistoryError> {
        self.fetch_runs(
            sqlx::query(
                r#"
                SELECT * FROM runs
                WHERE client_id = ?1 AND crew_type = ?2 AND success = 1
                ORDER BY created_at DESC, rowid DESC
                LIMIT ?3
                "#,
            )
            .bind(client_id)
            .bind(crew_type)
            .bind(limit as i64),
        )
        .await
    }

    async fn search_runs(
        &self,
        client_id: &str,
        term: &str,
        limit: usize,
    ) -> Result<Vec<RunRecord>, HistoryError> {
        // LIKE is ASCII case-insensitive; lower() both sides for the rest.
        let pattern = format!("%{}%", term.to_lowercase());
        self.fetch_runs(
            sqlx::query(
                r#"
                SELECT * FROM runs
                WHERE client_id = ?1 AND (lower(final_output) LIKE ?2 OR lower(params) LIKE ?2)
                ORDER BY created_at DESC, rowid DESC
                LIMIT ?3
                "#,
            )
            .bind(client_id)
            .bind(pattern)
            .bind(limit as i64),
        )
        .await
    }

    async fn agent_interactions(
        &self,
        client_id: &str,
        agent_id: Option<&str>,
    ) -> Result<Vec<AgentInteraction>, HistoryError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM agent_interactions
            WHERE client_id = ?1 AND (?2 IS NULL OR agent_id = ?2)
            ORDER BY created_at DESC, iid DESC
            "#,
        )
        .bind(client_id)
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HistoryError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::row_to_interaction).collect()
    }

    async fn delete_older_than(&self, days: u32) -> Result<u64, HistoryError> {
        let cutoff = ts(&(Utc::now() - chrono::Duration::days(days as i64)));

        sqlx::query(
            "DELETE FROM agent_interactions \
             WHERE run_id IN (SELECT id FROM runs WHERE created_at < ?1)",
        )
        .bind(&cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| HistoryError::Storage(format!("DELETE interactions failed: {e}")))?;

        let result = sqlx::query("DELETE FROM runs WHERE created_at < ?1")
            .bind(&cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| HistoryError::Storage(format!("DELETE runs failed: {e}")))?;

        info!(days, removed = result.rows_affected(), "Pruned run history");
        Ok(result.rows_affected())
    }
}
