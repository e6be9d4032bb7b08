use crate::db::AppState;
use crate::models::InsightRecord;
use crate::trends::{aggregate, RuleFiring, TrendStat};
use serde::Serialize;
use std::sync::Arc;
use tauri::State;

/// ---------------------------------------------------------------------------
/// Insights per Workout
/// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct WorkoutInsights {
  pub workout_log_id: String,
  pub created_at: Option<String>,
  pub insights: Vec<InsightEntry>,
}

#[derive(Debug, Serialize)]
pub struct InsightEntry {
  pub rule_id: String,
  pub rule_name: String,
  pub message: String,
  pub rationale: String,
  pub priority: i64,
}

/// All stored insights grouped per workout, newest reflection first.
/// Within a group the rows keep their stored order (ascending priority,
/// as the evaluator emitted them).
#[tauri::command]
pub async fn get_insights(
  state: State<'_, Arc<AppState>>,
) -> Result<Vec<WorkoutInsights>, String> {
  let records = sqlx::query_as::<_, InsightRecord>(
    "SELECT * FROM insights ORDER BY created_at DESC, id ASC",
  )
  .fetch_all(&state.db)
  .await
  .map_err(|e| format!("Failed to fetch insights: {}", e))?;

  let mut grouped: Vec<WorkoutInsights> = Vec::new();

  for record in records {
    let entry = InsightEntry {
      rule_id: record.rule_id,
      rule_name: record.rule_name,
      message: record.message,
      rationale: record.rationale,
      priority: record.priority,
    };

    match grouped
      .iter()
      .position(|g| g.workout_log_id == record.workout_log_id)
    {
      Some(i) => grouped[i].insights.push(entry),
      None => grouped.push(WorkoutInsights {
        workout_log_id: record.workout_log_id,
        created_at: record.created_at.map(|dt| dt.to_rfc3339()),
        insights: vec![entry],
      }),
    }
  }

  Ok(grouped)
}

/// ---------------------------------------------------------------------------
/// Trend Statistics
/// ---------------------------------------------------------------------------

/// Per-rule firing frequencies across the whole insight history,
/// ready for direct rendering.
#[tauri::command]
pub async fn get_insight_trends(
  state: State<'_, Arc<AppState>>,
) -> Result<Vec<TrendStat>, String> {
  let firings: Vec<RuleFiring> = sqlx::query_as::<_, (String, String, i64)>(
    "SELECT rule_id, rule_name, priority FROM insights",
  )
  .fetch_all(&state.db)
  .await
  .map_err(|e| format!("Failed to fetch insight history: {}", e))?
  .into_iter()
  .map(|(rule_id, rule_name, priority)| RuleFiring {
    rule_id,
    rule_name,
    priority,
  })
  .collect();

  Ok(aggregate(&firings))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::assert_approx_eq;
  use crate::test_utils::*;
  use serial_test::serial;
  use tauri::Manager;

  #[tokio::test]
  #[serial]
  async fn test_get_insights_groups_by_workout() {
    let pool = setup_test_db().await;

    seed_test_reflection(&pool, "wk-1").await;
    seed_test_reflection(&pool, "wk-2").await;
    seed_test_insights(
      &pool,
      "wk-1",
      &[("R01", "High Fatigue + High Effort", 1), ("R02", "Poor Sleep + High Fatigue", 2)],
    )
    .await;
    seed_test_insights(&pool, "wk-2", &[("R0", "No Trigger", 99)]).await;

    let state = Arc::new(AppState { db: pool.clone() });
    let app = tauri::test::mock_app();
    app.manage(state);

    let grouped = get_insights(app.state()).await.unwrap();
    assert_eq!(grouped.len(), 2);

    let wk1 = grouped.iter().find(|g| g.workout_log_id == "wk-1").unwrap();
    assert_eq!(wk1.insights.len(), 2);
    assert_eq!(wk1.insights[0].rule_id, "R01");
    assert_eq!(wk1.insights[1].rule_id, "R02");

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_get_insights_empty_db() {
    let pool = setup_test_db().await;
    let state = Arc::new(AppState { db: pool.clone() });
    let app = tauri::test::mock_app();
    app.manage(state);

    let grouped = get_insights(app.state()).await.unwrap();
    assert!(grouped.is_empty());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_get_insight_trends_excludes_sentinel() {
    let pool = setup_test_db().await;

    // Three R01 firings across two workouts, one R02, one sentinel
    seed_test_reflection(&pool, "wk-1").await;
    seed_test_reflection(&pool, "wk-2").await;
    seed_test_reflection(&pool, "wk-3").await;
    seed_test_insights(
      &pool,
      "wk-1",
      &[
        ("R01", "High Fatigue + High Effort", 1),
        ("R01", "High Fatigue + High Effort", 1),
        ("R02", "Poor Sleep + High Fatigue", 2),
      ],
    )
    .await;
    seed_test_insights(&pool, "wk-2", &[("R01", "High Fatigue + High Effort", 1)]).await;
    seed_test_insights(&pool, "wk-3", &[("R0", "No Trigger", 99)]).await;

    let state = Arc::new(AppState { db: pool.clone() });
    let app = tauri::test::mock_app();
    app.manage(state);

    let stats = get_insight_trends(app.state()).await.unwrap();
    assert_eq!(stats.len(), 2);

    assert_eq!(stats[0].rule_id, "R01");
    assert_eq!(stats[0].count, 3);
    assert_approx_eq!(stats[0].percentage, 75.0, 0.01);

    assert_eq!(stats[1].rule_id, "R02");
    assert_eq!(stats[1].count, 1);
    assert_approx_eq!(stats[1].percentage, 25.0, 0.01);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_get_insight_trends_empty_db() {
    let pool = setup_test_db().await;
    let state = Arc::new(AppState { db: pool.clone() });
    let app = tauri::test::mock_app();
    app.manage(state);

    let stats = get_insight_trends(app.state()).await.unwrap();
    assert!(stats.is_empty());

    teardown_test_db(pool).await;
  }
}
