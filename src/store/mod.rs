use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{AccessToken, Goal};

pub mod memory;
pub mod postgres;

/// Result of the conditional write on a token's `consumed` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Consumed { goal_id: i64 },
    NotFound,
    AlreadyUsed,
    Expired,
}

/// Read-only view of goals, as seen by the access-token service.
#[async_trait]
pub trait GoalStore: Send + Sync {
    async fn goal_exists(&self, goal_id: i64) -> anyhow::Result<bool>;
    async fn get_goal(&self, goal_id: i64) -> anyhow::Result<Option<Goal>>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert_token(&self, token: &AccessToken) -> anyhow::Result<()>;

    async fn get_token(&self, token_id: &str) -> anyhow::Result<Option<AccessToken>>;

    /// Marks the token consumed iff it is currently unconsumed and not past
    /// `expires_at`, as a single atomic write. Concurrent calls on the same
    /// token_id see exactly one `Consumed` outcome.
    async fn consume_token(
        &self,
        token_id: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ConsumeOutcome>;

    /// Same conditional write without the expiry gate. Owner-initiated
    /// invalidation must work on stale tokens too; never returns `Expired`.
    async fn revoke_token(
        &self,
        token_id: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ConsumeOutcome>;

    /// Administrative lookup over the goal_id secondary index.
    async fn list_tokens_for_goal(&self, goal_id: i64) -> anyhow::Result<Vec<AccessToken>>;
}
