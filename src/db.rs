use anyhow::Result;
use async_trait::async_trait;
use sqlx::Pool;
use sqlx::Postgres;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use teloxide::types::MessageId;
use teloxide::types::UserId;
use tracing::instrument;

use crate::models::NewQuestion;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Durable state the bot keeps between restarts.
#[async_trait]
pub trait Storage: Send + Sync {
  async fn add_question(&self, question: &NewQuestion) -> Result<i64>;

  async fn set_approval_message_id(&self, question_id: i64, message_id: MessageId) -> Result<()>;

  async fn grant_role(&self, user: UserId, role_id: &str) -> Result<bool>;

  async fn revoke_role(&self, user: UserId, role_id: &str) -> Result<bool>;

  async fn has_role(&self, user: UserId, role_id: &str) -> Result<bool>;
}

#[derive(Clone)]
pub struct Db {
  pool: Pool<Postgres>,
}

impl Db {
  pub async fn connect(database_url: &str) -> Result<Self> {
    let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
    MIGRATOR.run(&pool).await?;
    Ok(Self { pool })
  }
}

#[async_trait]
impl Storage for Db {
  #[instrument(skip(self, question), fields(author_id = question.author_id))]
  async fn add_question(&self, question: &NewQuestion) -> Result<i64> {
    let id = sqlx::query_scalar::<_, i64>(
      r#"
      INSERT INTO questions (question, author_id, author_name, message_id, channel_id)
      VALUES ($1, $2, $3, $4, $5)
      RETURNING id
      "#,
    )
    .bind(&question.question)
    .bind(question.author_id)
    .bind(&question.author_name)
    .bind(question.message_id)
    .bind(question.channel_id)
    .fetch_one(&self.pool)
    .await?;
    Ok(id)
  }

  #[instrument(skip(self))]
  async fn set_approval_message_id(&self, question_id: i64, message_id: MessageId) -> Result<()> {
    sqlx::query("UPDATE questions SET approval_message_id = $1 WHERE id = $2")
      .bind(message_id.0)
      .bind(question_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  #[instrument(skip(self))]
  async fn grant_role(&self, user: UserId, role_id: &str) -> Result<bool> {
    let result = sqlx::query(
      r#"
      INSERT INTO role_grants (user_id, role_id)
      VALUES ($1, $2)
      ON CONFLICT (user_id, role_id) DO NOTHING
      "#,
    )
    .bind(user.0 as i64)
    .bind(role_id)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() > 0)
  }

  #[instrument(skip(self))]
  async fn revoke_role(&self, user: UserId, role_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM role_grants WHERE user_id = $1 AND role_id = $2")
      .bind(user.0 as i64)
      .bind(role_id)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() > 0)
  }

  #[instrument(skip(self))]
  async fn has_role(&self, user: UserId, role_id: &str) -> Result<bool> {
    let exists =
      sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM role_grants WHERE user_id = $1 AND role_id = $2)")
        .bind(user.0 as i64)
        .bind(role_id)
        .fetch_one(&self.pool)
        .await?;
    Ok(exists)
  }
}
