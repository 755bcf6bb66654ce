use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{AccessToken, Goal, Motivation};
use crate::store::{ConsumeOutcome, GoalStore, TokenStore};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // -- Goal Operations --

    pub async fn create_goal(&self, name: &str, description: &str) -> anyhow::Result<Goal> {
        let goal = sqlx::query_as::<_, Goal>(
            r#"INSERT INTO goals (name, description)
               VALUES ($1, $2)
               RETURNING id, name, description, access_secret_hash, created_at, updated_at"#,
        )
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;
        Ok(goal)
    }

    pub async fn list_goals(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<Goal>> {
        let goals = sqlx::query_as::<_, Goal>(
            r#"SELECT id, name, description, access_secret_hash, created_at, updated_at
               FROM goals
               ORDER BY created_at DESC
               LIMIT $1 OFFSET $2"#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(goals)
    }

    pub async fn fetch_goal(&self, goal_id: i64) -> anyhow::Result<Option<Goal>> {
        let goal = sqlx::query_as::<_, Goal>(
            r#"SELECT id, name, description, access_secret_hash, created_at, updated_at
               FROM goals
               WHERE id = $1"#,
        )
        .bind(goal_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(goal)
    }

    pub async fn update_goal(
        &self,
        goal_id: i64,
        name: Option<&str>,
        description: Option<&str>,
    ) -> anyhow::Result<Option<Goal>> {
        let goal = sqlx::query_as::<_, Goal>(
            r#"UPDATE goals
               SET name = COALESCE($1, name),
                   description = COALESCE($2, description),
                   updated_at = NOW()
               WHERE id = $3
               RETURNING id, name, description, access_secret_hash, created_at, updated_at"#,
        )
        .bind(name)
        .bind(description)
        .bind(goal_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(goal)
    }

    /// Deletes the goal; motivations and access tokens go with it via
    /// ON DELETE CASCADE.
    pub async fn delete_goal(&self, goal_id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM goals WHERE id = $1")
            .bind(goal_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Stores the digest of a freshly rotated access secret.
    pub async fn set_goal_secret_hash(&self, goal_id: i64, hash: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE goals SET access_secret_hash = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(hash)
        .bind(goal_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn search_goals(
        &self,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Goal>> {
        let pattern = format!("%{}%", query);
        let goals = sqlx::query_as::<_, Goal>(
            r#"SELECT id, name, description, access_secret_hash, created_at, updated_at
               FROM goals
               WHERE name ILIKE $1 OR description ILIKE $1
               ORDER BY created_at DESC
               LIMIT $2 OFFSET $3"#,
        )
        .bind(pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(goals)
    }

    // -- Motivation Operations --

    pub async fn insert_motivation(
        &self,
        goal_id: i64,
        quote: Option<&str>,
        link: Option<&str>,
    ) -> anyhow::Result<Motivation> {
        let motivation = sqlx::query_as::<_, Motivation>(
            r#"INSERT INTO motivations (goal_id, quote, link)
               VALUES ($1, $2, $3)
               RETURNING id, goal_id, quote, link, created_at"#,
        )
        .bind(goal_id)
        .bind(quote)
        .bind(link)
        .fetch_one(&self.pool)
        .await?;
        Ok(motivation)
    }

    pub async fn list_motivations(&self, goal_id: i64) -> anyhow::Result<Vec<Motivation>> {
        let motivations = sqlx::query_as::<_, Motivation>(
            r#"SELECT id, goal_id, quote, link, created_at
               FROM motivations
               WHERE goal_id = $1
               ORDER BY created_at ASC"#,
        )
        .bind(goal_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(motivations)
    }

    pub async fn update_motivation(
        &self,
        motivation_id: i64,
        quote: Option<&str>,
        link: Option<&str>,
    ) -> anyhow::Result<Option<Motivation>> {
        let motivation = sqlx::query_as::<_, Motivation>(
            r#"UPDATE motivations
               SET quote = COALESCE($1, quote),
                   link = COALESCE($2, link)
               WHERE id = $3
               RETURNING id, goal_id, quote, link, created_at"#,
        )
        .bind(quote)
        .bind(link)
        .bind(motivation_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(motivation)
    }

    pub async fn delete_motivation(&self, motivation_id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM motivations WHERE id = $1")
            .bind(motivation_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// The conditional update matched nothing: figure out why. Consumed is
    /// reported ahead of expiry, matching the verify contract.
    async fn classify_rejection(
        &self,
        token_id: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ConsumeOutcome> {
        let row = sqlx::query_as::<_, (bool, Option<DateTime<Utc>>)>(
            "SELECT consumed, expires_at FROM access_tokens WHERE token_id = $1",
        )
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            None => ConsumeOutcome::NotFound,
            Some((true, _)) => ConsumeOutcome::AlreadyUsed,
            Some((false, Some(at))) if now > at => ConsumeOutcome::Expired,
            // Unconsumed and unexpired yet the update matched nothing: a
            // concurrent writer claimed it between the two statements.
            Some((false, _)) => ConsumeOutcome::AlreadyUsed,
        })
    }
}

#[async_trait]
impl GoalStore for PgStore {
    async fn goal_exists(&self, goal_id: i64) -> anyhow::Result<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM goals WHERE id = $1)")
                .bind(goal_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn get_goal(&self, goal_id: i64) -> anyhow::Result<Option<Goal>> {
        self.fetch_goal(goal_id).await
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert_token(&self, token: &AccessToken) -> anyhow::Result<()> {
        sqlx::query(
            r#"INSERT INTO access_tokens (token_id, goal_id, issued_at, expires_at, consumed, consumed_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(&token.token_id)
        .bind(token.goal_id)
        .bind(token.issued_at)
        .bind(token.expires_at)
        .bind(token.consumed)
        .bind(token.consumed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_token(&self, token_id: &str) -> anyhow::Result<Option<AccessToken>> {
        let token = sqlx::query_as::<_, AccessToken>(
            r#"SELECT token_id, goal_id, issued_at, expires_at, consumed, consumed_at
               FROM access_tokens
               WHERE token_id = $1"#,
        )
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }

    async fn consume_token(
        &self,
        token_id: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ConsumeOutcome> {
        // One conditional write decides the winner under concurrency; the
        // follow-up SELECT only classifies an attempt that already lost.
        let consumed = sqlx::query_scalar::<_, i64>(
            r#"UPDATE access_tokens
               SET consumed = TRUE, consumed_at = $2
               WHERE token_id = $1
                 AND consumed = FALSE
                 AND (expires_at IS NULL OR expires_at >= $2)
               RETURNING goal_id"#,
        )
        .bind(token_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(goal_id) = consumed {
            return Ok(ConsumeOutcome::Consumed { goal_id });
        }
        self.classify_rejection(token_id, now).await
    }

    async fn revoke_token(
        &self,
        token_id: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ConsumeOutcome> {
        let revoked = sqlx::query_scalar::<_, i64>(
            r#"UPDATE access_tokens
               SET consumed = TRUE, consumed_at = $2
               WHERE token_id = $1 AND consumed = FALSE
               RETURNING goal_id"#,
        )
        .bind(token_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(goal_id) = revoked {
            return Ok(ConsumeOutcome::Consumed { goal_id });
        }
        match self.get_token(token_id).await? {
            Some(_) => Ok(ConsumeOutcome::AlreadyUsed),
            None => Ok(ConsumeOutcome::NotFound),
        }
    }

    async fn list_tokens_for_goal(&self, goal_id: i64) -> anyhow::Result<Vec<AccessToken>> {
        let tokens = sqlx::query_as::<_, AccessToken>(
            r#"SELECT token_id, goal_id, issued_at, expires_at, consumed, consumed_at
               FROM access_tokens
               WHERE goal_id = $1
               ORDER BY issued_at ASC"#,
        )
        .bind(goal_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tokens)
    }
}
