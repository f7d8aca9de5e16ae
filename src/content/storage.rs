/// SQLite persistence layer for content
///
/// Owns the process-lifetime connection pool and the row-level primitives the
/// upsert engine and projector are built from. Every primitive takes a
/// `&mut SqliteConnection`, so callers decide whether it runs inside a request
/// transaction or on a plain pooled connection.
///
/// List columns (`skills`, `depends_on`) are stored as JSON arrays in TEXT.

use crate::content::{
    error::ContentResult,
    types::{JobRole, ProcessStep},
};
use anyhow::Result;
use sqlx::{
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions},
    Sqlite, SqliteConnection, Transaction,
};
use std::{str::FromStr, time::Duration};

/// How long a writer waits for another upload's write lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite-backed content store
///
/// Cloning is cheap: clones share the same pool.
#[derive(Debug, Clone)]
pub struct ContentStorage {
    pool: SqlitePool,
}

impl ContentStorage {
    /// Wrap an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for the given connection string, creating the database file if missing
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| anyhow::anyhow!("Invalid database url '{}': {}", url, e))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    /// Initialize the content schema
    ///
    /// Safe to call multiple times (uses IF NOT EXISTS).
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_roles (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                department TEXT,
                skills_json TEXT NOT NULL DEFAULT '[]',
                level TEXT,
                updated_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS process_steps (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS process_flows (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                owner TEXT,
                updated_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Dependencies are scoped to the flow, so they live on the link, not the step
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS process_flow_steps (
                flow_id TEXT NOT NULL REFERENCES process_flows(id),
                step_id TEXT NOT NULL REFERENCES process_steps(id),
                depends_on_json TEXT NOT NULL DEFAULT '[]',
                PRIMARY KEY (flow_id, step_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_process_flow_steps_step ON process_flow_steps(step_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Open a request-scoped read transaction
    ///
    /// The transaction rolls back when dropped without an explicit commit.
    pub async fn begin(&self) -> ContentResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Open a request-scoped write transaction
    ///
    /// Takes the write lock up front (`BEGIN IMMEDIATE`), so overlapping uploads
    /// queue on the busy timeout instead of failing when a read lock cannot be
    /// upgraded. Rolls back when dropped without an explicit commit.
    pub async fn begin_write(&self) -> ContentResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Borrow a single pooled connection, returned to the pool on drop
    pub async fn acquire(&self) -> ContentResult<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }
}

/// Stored form of a job role
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct JobRoleRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub department: Option<String>,
    pub skills_json: String,
    pub level: Option<String>,
    pub updated_at: Option<String>,
}

impl JobRoleRow {
    pub fn from_role(role: &JobRole) -> ContentResult<Self> {
        Ok(Self {
            id: role.id.clone(),
            title: role.title.clone(),
            description: role.description.clone(),
            department: role.department.clone(),
            skills_json: serde_json::to_string(&role.skills)?,
            level: role.level.clone(),
            updated_at: role.updated_at.clone(),
        })
    }

    pub fn into_role(self) -> ContentResult<JobRole> {
        Ok(JobRole {
            skills: serde_json::from_str(&self.skills_json)?,
            id: self.id,
            title: self.title,
            description: self.description,
            department: self.department,
            level: self.level,
            updated_at: self.updated_at,
        })
    }
}

/// Stored form of a shared process step
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StepRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

impl From<&ProcessStep> for StepRow {
    fn from(step: &ProcessStep) -> Self {
        Self {
            id: step.id.clone(),
            name: step.name.clone(),
            description: step.description.clone(),
        }
    }
}

/// Stored flow metadata (steps live in `process_flow_steps`)
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FlowRow {
    pub id: String,
    pub name: String,
    pub owner: Option<String>,
    pub updated_at: Option<String>,
}

/// Per-flow link to a step, carrying that flow's dependency list for the step
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FlowStepLinkRow {
    pub flow_id: String,
    pub step_id: String,
    pub depends_on_json: String,
}

impl FlowStepLinkRow {
    pub fn new(flow_id: &str, step: &ProcessStep) -> ContentResult<Self> {
        Ok(Self {
            flow_id: flow_id.to_string(),
            step_id: step.id.clone(),
            depends_on_json: serde_json::to_string(&step.depends_on)?,
        })
    }

    pub fn depends_on(&self) -> ContentResult<Vec<String>> {
        Ok(serde_json::from_str(&self.depends_on_json)?)
    }
}

// ---- job roles ----

pub async fn fetch_job_role(conn: &mut SqliteConnection, id: &str) -> ContentResult<Option<JobRoleRow>> {
    let row = sqlx::query_as::<_, JobRoleRow>(
        "SELECT id, title, description, department, skills_json, level, updated_at FROM job_roles WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row)
}

pub async fn insert_job_role(conn: &mut SqliteConnection, row: &JobRoleRow) -> ContentResult<()> {
    sqlx::query(
        r#"
        INSERT INTO job_roles (id, title, description, department, skills_json, level, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.id)
    .bind(&row.title)
    .bind(&row.description)
    .bind(&row.department)
    .bind(&row.skills_json)
    .bind(&row.level)
    .bind(&row.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Overwrite every mutable column of an existing role
pub async fn update_job_role(conn: &mut SqliteConnection, row: &JobRoleRow) -> ContentResult<()> {
    sqlx::query(
        r#"
        UPDATE job_roles
        SET title = ?, description = ?, department = ?, skills_json = ?, level = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&row.title)
    .bind(&row.description)
    .bind(&row.department)
    .bind(&row.skills_json)
    .bind(&row.level)
    .bind(&row.updated_at)
    .bind(&row.id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// All roles in first-insertion order
pub async fn list_job_roles(conn: &mut SqliteConnection) -> ContentResult<Vec<JobRoleRow>> {
    let rows = sqlx::query_as::<_, JobRoleRow>(
        "SELECT id, title, description, department, skills_json, level, updated_at FROM job_roles ORDER BY rowid",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

// ---- process flows ----

pub async fn fetch_flow(conn: &mut SqliteConnection, id: &str) -> ContentResult<Option<FlowRow>> {
    let row = sqlx::query_as::<_, FlowRow>(
        "SELECT id, name, owner, updated_at FROM process_flows WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row)
}

pub async fn insert_flow(conn: &mut SqliteConnection, row: &FlowRow) -> ContentResult<()> {
    sqlx::query("INSERT INTO process_flows (id, name, owner, updated_at) VALUES (?, ?, ?, ?)")
        .bind(&row.id)
        .bind(&row.name)
        .bind(&row.owner)
        .bind(&row.updated_at)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn update_flow(conn: &mut SqliteConnection, row: &FlowRow) -> ContentResult<()> {
    sqlx::query("UPDATE process_flows SET name = ?, owner = ?, updated_at = ? WHERE id = ?")
        .bind(&row.name)
        .bind(&row.owner)
        .bind(&row.updated_at)
        .bind(&row.id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn list_flows(conn: &mut SqliteConnection) -> ContentResult<Vec<FlowRow>> {
    let rows = sqlx::query_as::<_, FlowRow>(
        "SELECT id, name, owner, updated_at FROM process_flows ORDER BY rowid",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

// ---- process steps ----

pub async fn fetch_step(conn: &mut SqliteConnection, id: &str) -> ContentResult<Option<StepRow>> {
    let row = sqlx::query_as::<_, StepRow>(
        "SELECT id, name, description FROM process_steps WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row)
}

pub async fn insert_step(conn: &mut SqliteConnection, row: &StepRow) -> ContentResult<()> {
    sqlx::query("INSERT INTO process_steps (id, name, description) VALUES (?, ?, ?)")
        .bind(&row.id)
        .bind(&row.name)
        .bind(&row.description)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn update_step(conn: &mut SqliteConnection, row: &StepRow) -> ContentResult<()> {
    sqlx::query("UPDATE process_steps SET name = ?, description = ? WHERE id = ?")
        .bind(&row.name)
        .bind(&row.description)
        .bind(&row.id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn list_steps(conn: &mut SqliteConnection) -> ContentResult<Vec<StepRow>> {
    let rows = sqlx::query_as::<_, StepRow>("SELECT id, name, description FROM process_steps ORDER BY rowid")
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows)
}

// ---- flow/step links ----

pub async fn fetch_link(
    conn: &mut SqliteConnection,
    flow_id: &str,
    step_id: &str,
) -> ContentResult<Option<FlowStepLinkRow>> {
    let row = sqlx::query_as::<_, FlowStepLinkRow>(
        "SELECT flow_id, step_id, depends_on_json FROM process_flow_steps WHERE flow_id = ? AND step_id = ?",
    )
    .bind(flow_id)
    .bind(step_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row)
}

pub async fn insert_link(conn: &mut SqliteConnection, row: &FlowStepLinkRow) -> ContentResult<()> {
    sqlx::query("INSERT INTO process_flow_steps (flow_id, step_id, depends_on_json) VALUES (?, ?, ?)")
        .bind(&row.flow_id)
        .bind(&row.step_id)
        .bind(&row.depends_on_json)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn update_link(conn: &mut SqliteConnection, row: &FlowStepLinkRow) -> ContentResult<()> {
    sqlx::query("UPDATE process_flow_steps SET depends_on_json = ? WHERE flow_id = ? AND step_id = ?")
        .bind(&row.depends_on_json)
        .bind(&row.flow_id)
        .bind(&row.step_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// All links in first-insertion order, so steps project in the order they were first uploaded
pub async fn list_links(conn: &mut SqliteConnection) -> ContentResult<Vec<FlowStepLinkRow>> {
    let rows = sqlx::query_as::<_, FlowStepLinkRow>(
        "SELECT flow_id, step_id, depends_on_json FROM process_flow_steps ORDER BY rowid",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

/// Fresh on-disk store inside a temp dir; keep the dir alive for the test's duration
#[cfg(test)]
pub(crate) async fn temp_storage() -> (tempfile::TempDir, ContentStorage) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("content.db").display());
    let storage = ContentStorage::connect(&url, 4).await.unwrap();
    storage.init_schema().await.unwrap();
    (dir, storage)
}
