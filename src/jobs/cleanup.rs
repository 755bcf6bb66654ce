//! Background job: prune dead access tokens.
//!
//! Runs hourly. Consumed and time-expired tokens are kept for a retention
//! window so administrative listings can still show recent activity, then
//! deleted outright.

use sqlx::PgPool;
use std::time::Duration;
use tokio::time;

/// Spawn the background cleanup task. Call this once at startup.
pub fn spawn(pool: PgPool, retention_hours: i64) {
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(3600)); // every hour
        loop {
            interval.tick().await;
            if let Err(e) = prune_dead_tokens(&pool, retention_hours).await {
                tracing::error!("token cleanup job failed: {}", e);
            }
        }
    });
}

/// Delete tokens that can never grant access again and are past retention.
async fn prune_dead_tokens(pool: &PgPool, retention_hours: i64) -> anyhow::Result<()> {
    let deleted = sqlx::query(
        r#"
        DELETE FROM access_tokens
        WHERE (consumed = TRUE AND consumed_at < NOW() - ($1 || ' hours')::interval)
           OR (expires_at IS NOT NULL AND expires_at < NOW() - ($1 || ' hours')::interval)
        "#,
    )
    .bind(retention_hours.to_string())
    .execute(pool)
    .await?;

    if deleted.rows_affected() > 0 {
        tracing::info!(rows = deleted.rows_affected(), "pruned dead access tokens");
    }

    Ok(())
}
