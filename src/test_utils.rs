//! Test utilities and helpers for integration and unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Mock data factories
//! - Helper assertions

use crate::fitbit::Workout;
use crate::rules::ReflectionScores;
use sqlx::SqlitePool;

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let options = sqlx::sqlite::SqliteConnectOptions::new()
    .in_memory(true)
    .foreign_keys(true);

  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect_with(options)
    .await
    .expect("Failed to create in-memory database");

  // Run migrations
  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// Seed a reflection row (all ratings at 3) for the given workout log id
pub async fn seed_test_reflection(pool: &SqlitePool, workout_log_id: &str) -> i64 {
  let result = sqlx::query(
    r#"
    INSERT INTO reflections (
      workout_log_id, mood, hydration, effort, satisfaction,
      sleep, fatigue, motivation, pain
    )
    VALUES (?1, 3, 3, 3, 3, 3, 3, 3, 3)
    "#,
  )
  .bind(workout_log_id)
  .execute(pool)
  .await
  .expect("Failed to insert test reflection");

  result.last_insert_rowid()
}

/// Seed insight rows for a workout. Each entry is (rule_id, rule_name, priority);
/// message and rationale are filler since the aggregation never reads them.
pub async fn seed_test_insights(
  pool: &SqlitePool,
  workout_log_id: &str,
  firings: &[(&str, &str, i64)],
) {
  for (rule_id, rule_name, priority) in firings {
    sqlx::query(
      r#"
      INSERT INTO insights (
        workout_log_id, rule_id, rule_name, message, rationale, priority
      )
      VALUES (?1, ?2, ?3, 'test message', 'test rationale', ?4)
      "#,
    )
    .bind(workout_log_id)
    .bind(rule_id)
    .bind(rule_name)
    .bind(priority)
    .execute(pool)
    .await
    .expect("Failed to insert test insight");
  }
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

/// Neutral reflection scores (everything at 3) - triggers no rules
pub fn mock_reflection_scores() -> ReflectionScores {
  ReflectionScores {
    mood: 3,
    hydration: 3,
    effort: 3,
    satisfaction: 3,
    sleep: 3,
    fatigue: 3,
    motivation: 3,
    pain: 3,
  }
}

/// A plausible Fitbit workout: 45 minute run, moderate heart rate
pub fn mock_workout() -> Workout {
  Workout {
    log_id: 51007158402,
    activity_name: "Run".to_string(),
    start_time: "2025-08-20T07:12:00.000+01:00".to_string(),
    duration: Some(2_700_000), // 45 minutes in ms
    average_heart_rate: Some(140),
    calories: Some(420),
    steps: Some(6200),
    source: None,
  }
}

/// ---------------------------------------------------------------------------
/// Test Macros
/// ---------------------------------------------------------------------------

/// Assert two floats are approximately equal within a tolerance
#[macro_export]
macro_rules! assert_approx_eq {
  ($left:expr, $right:expr, $tolerance:expr) => {
    let diff = ($left - $right).abs();
    assert!(
      diff < $tolerance,
      "Values not approximately equal: {} vs {} (diff: {}, tolerance: {})",
      $left,
      $right,
      diff,
      $tolerance
    );
  };
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    // Verify key tables exist
    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('reflections', 'insights', 'sync_state')"
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert!(tables.len() >= 3, "Expected at least 3 tables, got {}", tables.len());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_seed_reflection_and_insights() {
    let pool = setup_test_db().await;

    let id = seed_test_reflection(&pool, "wk-seed").await;
    assert!(id > 0);

    seed_test_insights(&pool, "wk-seed", &[("R01", "High Fatigue + High Effort", 1)]).await;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM insights")
      .fetch_one(&pool)
      .await
      .expect("Failed to count insights");
    assert_eq!(count, 1);

    teardown_test_db(pool).await;
  }

  #[test]
  fn test_mock_factories_create_valid_data() {
    let scores = mock_reflection_scores();
    assert_eq!(scores.mood, 3);
    assert_eq!(scores.pain, 3);

    let workout = mock_workout();
    assert_eq!(workout.activity_name, "Run");
    assert!(workout.duration.is_some());
    assert!(workout.average_heart_rate.is_some());
  }
}
