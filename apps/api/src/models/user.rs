use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Listing row for the start-stage user table (no document text attached).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSummary {
    pub identity: String,
    pub last_modified: DateTime<Utc>,
}
