use crate::commands::fitbit::get_valid_access_token;
use crate::db::AppState;
use crate::fitbit::{FitbitClient, Workout};
use crate::models::Reflection;
use crate::rules::{evaluate, Insight, ReflectionScores};
use std::sync::Arc;
use tauri::State;

/// ---------------------------------------------------------------------------
/// Save Reflection (and generate insights)
/// ---------------------------------------------------------------------------

/// Store a reflection, look up its workout on Fitbit, run the rule engine,
/// and persist the resulting insights. Returns the insights so the frontend
/// can show them immediately.
///
/// A second reflection for the same workout is rejected by the UNIQUE
/// constraint rather than overwriting the first.
#[tauri::command]
#[allow(clippy::too_many_arguments)]
pub async fn save_reflection(
  state: State<'_, Arc<AppState>>,
  workout_log_id: String,
  mood: i64,
  hydration: i64,
  effort: i64,
  satisfaction: i64,
  sleep: i64,
  fatigue: i64,
  motivation: i64,
  pain: i64,
) -> Result<Vec<Insight>, String> {
  if workout_log_id.is_empty() {
    return Err("Missing workout log id".to_string());
  }

  let scores = ReflectionScores {
    mood,
    hydration,
    effort,
    satisfaction,
    sleep,
    fatigue,
    motivation,
    pain,
  };

  // Best effort: evaluation proceeds without objective data when the
  // workout lookup fails (not authenticated, workout aged out of the list)
  let workout = lookup_workout(&state.db, &workout_log_id).await;

  let insights = evaluate(&scores, workout.as_ref());

  // The reflection and its insights land atomically; a failed insight
  // write rolls the whole save back
  let mut tx = state
    .db
    .begin()
    .await
    .map_err(|e| format!("Failed to save reflection: {}", e))?;

  sqlx::query(
    r#"
    INSERT INTO reflections (
      workout_log_id, mood, hydration, effort, satisfaction,
      sleep, fatigue, motivation, pain
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    "#,
  )
  .bind(&workout_log_id)
  .bind(scores.mood)
  .bind(scores.hydration)
  .bind(scores.effort)
  .bind(scores.satisfaction)
  .bind(scores.sleep)
  .bind(scores.fatigue)
  .bind(scores.motivation)
  .bind(scores.pain)
  .execute(&mut *tx)
  .await
  .map_err(|e| {
    if e
      .as_database_error()
      .map_or(false, |db_err| db_err.is_unique_violation())
    {
      "A reflection already exists for this workout".to_string()
    } else {
      format!("Failed to save reflection: {}", e)
    }
  })?;

  for insight in &insights {
    sqlx::query(
      r#"
      INSERT INTO insights (
        workout_log_id, rule_id, rule_name, message, rationale, priority
      )
      VALUES (?1, ?2, ?3, ?4, ?5, ?6)
      "#,
    )
    .bind(&workout_log_id)
    .bind(&insight.rule_id)
    .bind(&insight.rule_name)
    .bind(&insight.message)
    .bind(&insight.rationale)
    .bind(insight.priority)
    .execute(&mut *tx)
    .await
    .map_err(|e| format!("Failed to save insight {}: {}", insight.rule_id, e))?;
  }

  tx.commit()
    .await
    .map_err(|e| format!("Failed to save reflection: {}", e))?;

  println!(
    "Saved reflection for workout {} ({} insights)",
    workout_log_id,
    insights.len()
  );

  Ok(insights)
}

async fn lookup_workout(db: &crate::db::DbPool, workout_log_id: &str) -> Option<Workout> {
  let access_token = match get_valid_access_token(db).await {
    Ok(token) => token,
    Err(e) => {
      eprintln!("Skipping workout lookup for {}: {}", workout_log_id, e);
      return None;
    }
  };

  match FitbitClient::new().workout_by_id(&access_token, workout_log_id).await {
    Ok(workout) => workout,
    Err(e) => {
      eprintln!("Workout lookup failed for {}: {}", workout_log_id, e);
      None
    }
  }
}

/// ---------------------------------------------------------------------------
/// Read Reflections
/// ---------------------------------------------------------------------------

/// List the workout log ids that already have a reflection, so the frontend
/// can mark those workouts as done.
#[tauri::command]
pub async fn get_reflections(state: State<'_, Arc<AppState>>) -> Result<Vec<String>, String> {
  sqlx::query_scalar("SELECT workout_log_id FROM reflections ORDER BY created_at DESC")
    .fetch_all(&state.db)
    .await
    .map_err(|e| format!("Failed to fetch reflections: {}", e))
}

#[tauri::command]
pub async fn get_reflection(
  state: State<'_, Arc<AppState>>,
  workout_log_id: String,
) -> Result<Option<Reflection>, String> {
  sqlx::query_as::<_, Reflection>("SELECT * FROM reflections WHERE workout_log_id = ?1")
    .bind(&workout_log_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| format!("Failed to fetch reflection: {}", e))
}

/// ---------------------------------------------------------------------------
/// Delete Reflection
/// ---------------------------------------------------------------------------

/// Remove a reflection; its insights go with it via the cascade.
#[tauri::command]
pub async fn delete_reflection(
  state: State<'_, Arc<AppState>>,
  workout_log_id: String,
) -> Result<(), String> {
  let result = sqlx::query("DELETE FROM reflections WHERE workout_log_id = ?1")
    .bind(&workout_log_id)
    .execute(&state.db)
    .await
    .map_err(|e| format!("Failed to delete reflection: {}", e))?;

  if result.rows_affected() == 0 {
    return Err(format!("No reflection found for workout {}", workout_log_id));
  }

  println!("Deleted reflection for workout {}", workout_log_id);
  Ok(())
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::*;
  use serial_test::serial;
  use tauri::Manager;

  #[tokio::test]
  #[serial]
  async fn test_save_reflection_generates_insights() {
    let pool = setup_test_db().await;
    let state = Arc::new(AppState { db: pool.clone() });
    let app = tauri::test::mock_app();
    app.manage(state);

    // Fatigue 5 + effort 5: R01 must fire even without a workout
    // (no Fitbit auth in tests, so the lookup is skipped)
    let insights = save_reflection(
      app.state(),
      "wk-100".to_string(),
      3, 3, 5, 3, 3, 5, 3, 2,
    )
    .await
    .unwrap();

    assert!(insights.iter().any(|i| i.rule_id == "R01"));

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM insights WHERE workout_log_id = 'wk-100'")
      .fetch_one(&pool)
      .await
      .unwrap();
    assert_eq!(stored, insights.len() as i64);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_save_reflection_sentinel_when_nothing_fires() {
    let pool = setup_test_db().await;
    let state = Arc::new(AppState { db: pool.clone() });
    let app = tauri::test::mock_app();
    app.manage(state);

    // All threes triggers nothing, so exactly one R0 row is stored
    let insights = save_reflection(
      app.state(),
      "wk-101".to_string(),
      3, 3, 3, 3, 3, 3, 3, 3,
    )
    .await
    .unwrap();

    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0].rule_id, "R0");

    let rule_ids: Vec<String> =
      sqlx::query_scalar("SELECT rule_id FROM insights WHERE workout_log_id = 'wk-101'")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(rule_ids, vec!["R0".to_string()]);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_save_reflection_rejects_duplicate() {
    let pool = setup_test_db().await;
    let state = Arc::new(AppState { db: pool.clone() });
    let app = tauri::test::mock_app();
    app.manage(state);

    save_reflection(app.state(), "wk-102".to_string(), 3, 3, 3, 3, 3, 3, 3, 3)
      .await
      .unwrap();

    let second = save_reflection(app.state(), "wk-102".to_string(), 1, 1, 1, 1, 1, 1, 1, 1).await;
    assert!(second.is_err());
    assert!(second.unwrap_err().contains("already exists"));

    // The original ratings survive
    let reflection = get_reflection(app.state(), "wk-102".to_string())
      .await
      .unwrap()
      .unwrap();
    assert_eq!(reflection.mood, 3);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_save_reflection_rolls_back_when_insight_write_fails() {
    let pool = setup_test_db().await;
    let state = Arc::new(AppState { db: pool.clone() });
    let app = tauri::test::mock_app();
    app.manage(state);

    // Break the insight inserts: the reflection insert succeeds but the
    // save as a whole must roll back
    sqlx::query("DROP TABLE insights").execute(&pool).await.unwrap();

    let result = save_reflection(app.state(), "wk-104".to_string(), 3, 3, 5, 3, 3, 5, 3, 2).await;
    assert!(result.is_err());

    let reflections: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reflections")
      .fetch_one(&pool)
      .await
      .unwrap();
    assert_eq!(reflections, 0);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_save_reflection_requires_workout_log_id() {
    let pool = setup_test_db().await;
    let state = Arc::new(AppState { db: pool.clone() });
    let app = tauri::test::mock_app();
    app.manage(state);

    let result = save_reflection(app.state(), String::new(), 3, 3, 3, 3, 3, 3, 3, 3).await;
    assert!(result.is_err());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_get_reflection_missing_returns_none() {
    let pool = setup_test_db().await;
    let state = Arc::new(AppState { db: pool.clone() });
    let app = tauri::test::mock_app();
    app.manage(state);

    let result = get_reflection(app.state(), "nope".to_string()).await.unwrap();
    assert!(result.is_none());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_delete_reflection_cascades_insights() {
    let pool = setup_test_db().await;
    let state = Arc::new(AppState { db: pool.clone() });
    let app = tauri::test::mock_app();
    app.manage(state);

    save_reflection(app.state(), "wk-103".to_string(), 3, 3, 5, 3, 1, 5, 3, 2)
      .await
      .unwrap();

    let before: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM insights WHERE workout_log_id = 'wk-103'")
      .fetch_one(&pool)
      .await
      .unwrap();
    assert!(before > 0);

    delete_reflection(app.state(), "wk-103".to_string()).await.unwrap();

    let after: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM insights WHERE workout_log_id = 'wk-103'")
      .fetch_one(&pool)
      .await
      .unwrap();
    assert_eq!(after, 0);

    let ids = get_reflections(app.state()).await.unwrap();
    assert!(!ids.contains(&"wk-103".to_string()));

    teardown_test_db(pool).await;
  }
}
