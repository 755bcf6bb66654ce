use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A quote or link attached to a goal for encouragement.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Motivation {
    pub id: i64,
    pub goal_id: i64,
    pub quote: Option<String>,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}
