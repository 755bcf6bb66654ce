use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One-time goal-access credential. `consumed` transitions false → true
/// exactly once; there is no way back.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessToken {
    pub token_id: String,
    pub goal_id: i64,
    pub issued_at: DateTime<Utc>,
    /// Absent means the token never expires by time, only by use.
    pub expires_at: Option<DateTime<Utc>>,
    pub consumed: bool,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if now > at)
    }
}
