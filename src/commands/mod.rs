pub mod fitbit;
pub mod insights;
pub mod reflections;

use crate::db::AppState;
use crate::fitbit::{FitbitClient, FitbitError, Workout};
use crate::models::SyncState;
use std::sync::Arc;
use tauri::State;

/// Recent workouts, fetched live from Fitbit. Workouts are never stored;
/// reflections reference them by logId.
#[tauri::command]
pub async fn get_workouts(
  state: State<'_, Arc<AppState>>,
) -> Result<Vec<Workout>, FitbitError> {
  let access_token = fitbit::get_valid_access_token(&state.db).await?;
  FitbitClient::new().recent_workouts(&access_token, 50).await
}

/// One workout by logId, looked up in the recent list (string comparison,
/// matching how the frontend round-trips ids).
#[tauri::command]
pub async fn get_workout(
  state: State<'_, Arc<AppState>>,
  log_id: String,
) -> Result<Option<Workout>, FitbitError> {
  let access_token = fitbit::get_valid_access_token(&state.db).await?;
  FitbitClient::new().workout_by_id(&access_token, &log_id).await
}

#[tauri::command]
pub async fn get_sync_state(
  state: State<'_, Arc<AppState>>,
) -> Result<Vec<SyncState>, String> {
  sqlx::query_as::<_, SyncState>(
    "SELECT * FROM sync_state"
  )
  .fetch_all(&state.db)
  .await
  .map_err(|e| format!("Failed to fetch sync state: {}", e))
}
