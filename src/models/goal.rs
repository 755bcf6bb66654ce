use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Goal {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// SHA-256 hex digest of the access secret, never the secret itself.
    #[serde(skip_serializing)]
    pub access_secret_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
