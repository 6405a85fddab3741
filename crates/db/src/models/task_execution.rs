use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

/// Status values reported by browser-pod. Whichever system wrote last
/// wins; there is no conflict resolution beyond overwrite.
#[derive(
    Debug, Clone, Copy, sqlx::Type, Serialize, Deserialize, PartialEq, EnumString, Display, Default,
)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    Created,
    Running,
    Finished,
    Stopped,
    Paused,
    Failed,
}

/// One run of a task template. The primary key is the job id assigned
/// by browser-pod at submission time; `task_id` is a soft reference and
/// the record outlives its template. The media and step fields hold
/// serialized JSON exactly as browser-pod returned it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct TaskExecution {
    pub id: String,
    pub task_id: Uuid,
    pub user_id: String,
    pub status: ExecutionStatus,
    pub output: Option<String>,
    pub live_url: Option<String>,
    pub public_share_url: Option<String>,
    pub secrets: Option<String>,             // JSON object
    pub included_file_names: Option<String>, // JSON array
    pub save_browser_data: bool,
    pub output_files: Option<String>, // JSON array
    pub screenshots: Option<String>,  // JSON array
    pub recordings: Option<String>,   // JSON array
    pub steps: Option<String>,        // JSON array
    pub browser_data: Option<String>, // JSON object
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateTaskExecution {
    pub task_id: Uuid,
    pub secrets: Option<String>,
    pub included_file_names: Option<String>,
    pub save_browser_data: bool,
}

/// Everything a sync pull mirrors from browser-pod, applied in a single
/// row update.
#[derive(Debug, Clone, Default)]
pub struct ExecutionSyncUpdate {
    pub status: ExecutionStatus,
    pub output: Option<String>,
    pub live_url: Option<String>,
    pub public_share_url: Option<String>,
    pub output_files: Option<String>,
    pub screenshots: Option<String>,
    pub recordings: Option<String>,
    pub steps: Option<String>,
    pub browser_data: Option<String>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Execution joined with the name of its originating template, for list
/// views. The template columns are null when the template has been
/// deleted since the run.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ExecutionWithTemplate {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub execution: TaskExecution,
    pub task_name: Option<String>,
    pub task_description: Option<String>,
}

impl TaskExecution {
    pub async fn find_by_id_for_user(
        pool: &SqlitePool,
        id: &str,
        user_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskExecution>(
            r#"SELECT id, task_id, user_id, status, output, live_url, public_share_url,
                      secrets, included_file_names, save_browser_data, output_files,
                      screenshots, recordings, steps, browser_data, created_at, finished_at
               FROM task_executions
               WHERE id = $1 AND user_id = $2"#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_task_id(
        pool: &SqlitePool,
        task_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskExecution>(
            r#"SELECT id, task_id, user_id, status, output, live_url, public_share_url,
                      secrets, included_file_names, save_browser_data, output_files,
                      screenshots, recordings, steps, browser_data, created_at, finished_at
               FROM task_executions
               WHERE task_id = $1
               ORDER BY created_at DESC"#,
        )
        .bind(task_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_page_for_user(
        pool: &SqlitePool,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ExecutionWithTemplate>, sqlx::Error> {
        sqlx::query_as::<_, ExecutionWithTemplate>(
            r#"SELECT e.id, e.task_id, e.user_id, e.status, e.output, e.live_url,
                      e.public_share_url, e.secrets, e.included_file_names,
                      e.save_browser_data, e.output_files, e.screenshots, e.recordings,
                      e.steps, e.browser_data, e.created_at, e.finished_at,
                      t.name AS task_name, t.description AS task_description
               FROM task_executions e
               LEFT JOIN task_templates t ON t.id = e.task_id
               WHERE e.user_id = $1
               ORDER BY e.created_at DESC
               LIMIT $2 OFFSET $3"#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn find_with_template_by_id_for_user(
        pool: &SqlitePool,
        id: &str,
        user_id: &str,
    ) -> Result<Option<ExecutionWithTemplate>, sqlx::Error> {
        sqlx::query_as::<_, ExecutionWithTemplate>(
            r#"SELECT e.id, e.task_id, e.user_id, e.status, e.output, e.live_url,
                      e.public_share_url, e.secrets, e.included_file_names,
                      e.save_browser_data, e.output_files, e.screenshots, e.recordings,
                      e.steps, e.browser_data, e.created_at, e.finished_at,
                      t.name AS task_name, t.description AS task_description
               FROM task_executions e
               LEFT JOIN task_templates t ON t.id = e.task_id
               WHERE e.id = $1 AND e.user_id = $2"#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn count_for_user(pool: &SqlitePool, user_id: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM task_executions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateTaskExecution,
        execution_id: &str,
        user_id: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, TaskExecution>(
            r#"INSERT INTO task_executions (
                   id, task_id, user_id, status, secrets, included_file_names,
                   save_browser_data, created_at
               ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING id, task_id, user_id, status, output, live_url, public_share_url,
                         secrets, included_file_names, save_browser_data, output_files,
                         screenshots, recordings, steps, browser_data, created_at, finished_at"#,
        )
        .bind(execution_id)
        .bind(data.task_id)
        .bind(user_id)
        .bind(ExecutionStatus::Created)
        .bind(&data.secrets)
        .bind(&data.included_file_names)
        .bind(data.save_browser_data)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    /// Single-column status write used after a successful control command.
    pub async fn update_status(
        pool: &SqlitePool,
        id: &str,
        status: ExecutionStatus,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, TaskExecution>(
            r#"UPDATE task_executions
               SET status = $2
               WHERE id = $1
               RETURNING id, task_id, user_id, status, output, live_url, public_share_url,
                         secrets, included_file_names, save_browser_data, output_files,
                         screenshots, recordings, steps, browser_data, created_at, finished_at"#,
        )
        .bind(id)
        .bind(status)
        .fetch_one(pool)
        .await
    }

    /// Overwrite everything a sync pull mirrors in one row update. The
    /// row's native atomicity is the only consistency guarantee here.
    pub async fn apply_sync(
        pool: &SqlitePool,
        id: &str,
        update: &ExecutionSyncUpdate,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, TaskExecution>(
            r#"UPDATE task_executions
               SET status = $2, output = $3, live_url = $4, public_share_url = $5,
                   output_files = $6, screenshots = $7, recordings = $8, steps = $9,
                   browser_data = $10, finished_at = $11
               WHERE id = $1
               RETURNING id, task_id, user_id, status, output, live_url, public_share_url,
                         secrets, included_file_names, save_browser_data, output_files,
                         screenshots, recordings, steps, browser_data, created_at, finished_at"#,
        )
        .bind(id)
        .bind(update.status)
        .bind(&update.output)
        .bind(&update.live_url)
        .bind(&update.public_share_url)
        .bind(&update.output_files)
        .bind(&update.screenshots)
        .bind(&update.recordings)
        .bind(&update.steps)
        .bind(&update.browser_data)
        .bind(update.finished_at)
        .fetch_one(pool)
        .await
    }

    pub async fn delete_for_user<'e, E>(
        executor: E,
        id: &str,
        user_id: &str,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM task_executions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
