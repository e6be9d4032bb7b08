use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted insight row: one rule firing (or the R0 sentinel) tied to
/// the workout whose reflection produced it. Rule metadata is stored
/// verbatim as it was at evaluation time.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InsightRecord {
  pub id: i64,
  pub workout_log_id: String,
  pub rule_id: String,
  pub rule_name: String,
  pub message: String,
  pub rationale: String,
  pub priority: i64,
  pub created_at: Option<DateTime<Utc>>,
}
