use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored subjective reflection, one per Fitbit workout.
/// All eight ratings are on a 1-5 scale. Immutable after submission;
/// the only mutation is full deletion, which cascades to insights.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reflection {
  pub id: i64,
  pub workout_log_id: String,
  pub mood: i64,
  pub hydration: i64,
  pub effort: i64,
  pub satisfaction: i64,
  pub sleep: i64,
  pub fatigue: i64,
  pub motivation: i64,
  pub pain: i64,
  pub created_at: Option<DateTime<Utc>>,
}
