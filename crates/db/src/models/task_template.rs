use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::serde_helpers::deserialize_optional_nullable;

/// User-authored configuration describing a browser automation job.
/// The JSON-ish fields (`allowed_domains`) are stored as serialized text
/// and only parsed at the edges that read them.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct TaskTemplate {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub allowed_domains: Option<String>, // JSON array
    pub structured_output_json: Option<String>,
    pub llm_model: Option<String>,
    pub use_adblock: bool,
    pub use_proxy: bool,
    pub proxy_country_code: String,
    pub highlight_elements: bool,
    pub browser_viewport_width: i64,
    pub browser_viewport_height: i64,
    pub max_agent_steps: i64,
    pub enable_public_share: bool,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskTemplate {
    pub name: String,
    pub description: String,
    pub allowed_domains: Option<Vec<String>>,
    pub structured_output_json: Option<String>,
    pub llm_model: Option<String>,
    #[serde(default = "default_on")]
    pub use_adblock: bool,
    #[serde(default = "default_on")]
    pub use_proxy: bool,
    #[serde(default = "default_proxy_country")]
    pub proxy_country_code: String,
    #[serde(default = "default_on")]
    pub highlight_elements: bool,
    #[serde(default = "default_viewport_width")]
    pub browser_viewport_width: i64,
    #[serde(default = "default_viewport_height")]
    pub browser_viewport_height: i64,
    #[serde(default = "default_max_steps")]
    pub max_agent_steps: i64,
    #[serde(default)]
    pub enable_public_share: bool,
}

fn default_on() -> bool {
    true
}

fn default_proxy_country() -> String {
    "us".to_string()
}

fn default_viewport_width() -> i64 {
    1280
}

fn default_viewport_height() -> i64 {
    960
}

fn default_max_steps() -> i64 {
    75
}

/// PATCH payload. Omitted fields keep their stored values; the nullable
/// text fields distinguish "omitted" from "explicitly cleared".
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskTemplate {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_nullable")]
    pub allowed_domains: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "deserialize_optional_nullable")]
    pub structured_output_json: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_optional_nullable")]
    pub llm_model: Option<Option<String>>,
    pub use_adblock: Option<bool>,
    pub use_proxy: Option<bool>,
    pub proxy_country_code: Option<String>,
    pub highlight_elements: Option<bool>,
    pub browser_viewport_width: Option<i64>,
    pub browser_viewport_height: Option<i64>,
    pub max_agent_steps: Option<i64>,
    pub enable_public_share: Option<bool>,
}

impl TaskTemplate {
    pub async fn find_by_id_for_user(
        pool: &SqlitePool,
        id: Uuid,
        user_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskTemplate>(
            r#"SELECT id, name, description, allowed_domains, structured_output_json, llm_model,
                      use_adblock, use_proxy, proxy_country_code, highlight_elements,
                      browser_viewport_width, browser_viewport_height, max_agent_steps,
                      enable_public_share, user_id, created_at, updated_at
               FROM task_templates
               WHERE id = $1 AND user_id = $2"#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_page_for_user(
        pool: &SqlitePool,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskTemplate>(
            r#"SELECT id, name, description, allowed_domains, structured_output_json, llm_model,
                      use_adblock, use_proxy, proxy_country_code, highlight_elements,
                      browser_viewport_width, browser_viewport_height, max_agent_steps,
                      enable_public_share, user_id, created_at, updated_at
               FROM task_templates
               WHERE user_id = $1
               ORDER BY created_at DESC
               LIMIT $2 OFFSET $3"#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count_for_user(pool: &SqlitePool, user_id: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM task_templates WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateTaskTemplate,
        template_id: Uuid,
        user_id: &str,
    ) -> Result<Self, sqlx::Error> {
        let allowed_domains_json = data
            .allowed_domains
            .as_ref()
            .and_then(|domains| serde_json::to_string(domains).ok());
        let now = Utc::now();

        sqlx::query_as::<_, TaskTemplate>(
            r#"INSERT INTO task_templates (
                   id, name, description, allowed_domains, structured_output_json, llm_model,
                   use_adblock, use_proxy, proxy_country_code, highlight_elements,
                   browser_viewport_width, browser_viewport_height, max_agent_steps,
                   enable_public_share, user_id, created_at, updated_at
               ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
               RETURNING id, name, description, allowed_domains, structured_output_json, llm_model,
                         use_adblock, use_proxy, proxy_country_code, highlight_elements,
                         browser_viewport_width, browser_viewport_height, max_agent_steps,
                         enable_public_share, user_id, created_at, updated_at"#,
        )
        .bind(template_id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(allowed_domains_json)
        .bind(&data.structured_output_json)
        .bind(&data.llm_model)
        .bind(data.use_adblock)
        .bind(data.use_proxy)
        .bind(&data.proxy_country_code)
        .bind(data.highlight_elements)
        .bind(data.browser_viewport_width)
        .bind(data.browser_viewport_height)
        .bind(data.max_agent_steps)
        .bind(data.enable_public_share)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        existing: TaskTemplate,
        data: UpdateTaskTemplate,
    ) -> Result<Self, sqlx::Error> {
        let name = data.name.unwrap_or(existing.name);
        let description = data.description.unwrap_or(existing.description);
        let allowed_domains = match data.allowed_domains {
            Some(domains) => domains.and_then(|d| serde_json::to_string(&d).ok()),
            None => existing.allowed_domains,
        };
        let structured_output_json = match data.structured_output_json {
            Some(value) => value,
            None => existing.structured_output_json,
        };
        let llm_model = match data.llm_model {
            Some(value) => value,
            None => existing.llm_model,
        };
        let use_adblock = data.use_adblock.unwrap_or(existing.use_adblock);
        let use_proxy = data.use_proxy.unwrap_or(existing.use_proxy);
        let proxy_country_code = data
            .proxy_country_code
            .unwrap_or(existing.proxy_country_code);
        let highlight_elements = data.highlight_elements.unwrap_or(existing.highlight_elements);
        let browser_viewport_width = data
            .browser_viewport_width
            .unwrap_or(existing.browser_viewport_width);
        let browser_viewport_height = data
            .browser_viewport_height
            .unwrap_or(existing.browser_viewport_height);
        let max_agent_steps = data.max_agent_steps.unwrap_or(existing.max_agent_steps);
        let enable_public_share = data
            .enable_public_share
            .unwrap_or(existing.enable_public_share);

        sqlx::query_as::<_, TaskTemplate>(
            r#"UPDATE task_templates
               SET name = $3, description = $4, allowed_domains = $5, structured_output_json = $6,
                   llm_model = $7, use_adblock = $8, use_proxy = $9, proxy_country_code = $10,
                   highlight_elements = $11, browser_viewport_width = $12,
                   browser_viewport_height = $13, max_agent_steps = $14,
                   enable_public_share = $15, updated_at = $16
               WHERE id = $1 AND user_id = $2
               RETURNING id, name, description, allowed_domains, structured_output_json, llm_model,
                         use_adblock, use_proxy, proxy_country_code, highlight_elements,
                         browser_viewport_width, browser_viewport_height, max_agent_steps,
                         enable_public_share, user_id, created_at, updated_at"#,
        )
        .bind(existing.id)
        .bind(&existing.user_id)
        .bind(name)
        .bind(description)
        .bind(allowed_domains)
        .bind(structured_output_json)
        .bind(llm_model)
        .bind(use_adblock)
        .bind(use_proxy)
        .bind(proxy_country_code)
        .bind(highlight_elements)
        .bind(browser_viewport_width)
        .bind(browser_viewport_height)
        .bind(max_agent_steps)
        .bind(enable_public_share)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn delete_for_user<'e, E>(
        executor: E,
        id: Uuid,
        user_id: &str,
    ) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM task_templates WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
