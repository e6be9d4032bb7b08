mod commands;
mod db;
mod fitbit;
mod models;
mod rules;
mod trends;

#[cfg(test)]
mod test_utils;

use db::AppState;
use std::sync::Arc;
use tauri::Manager;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();

  tauri::Builder::default()
    .plugin(tauri_plugin_opener::init())
    .setup(|app| {
      // Initialize database
      let app_handle = app.handle().clone();
      tauri::async_runtime::block_on(async move {
        match db::initialize_db(&app_handle).await {
          Ok(pool) => {
            let state = Arc::new(AppState { db: pool });
            app_handle.manage(state);
            println!("Database ready");
          }
          Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
          }
        }
      });
      Ok(())
    })
    .invoke_handler(tauri::generate_handler![
      commands::get_workouts,
      commands::get_workout,
      commands::get_sync_state,
      // Fitbit commands
      commands::fitbit::fitbit_start_auth,
      commands::fitbit::fitbit_complete_auth,
      commands::fitbit::fitbit_get_auth_status,
      commands::fitbit::fitbit_refresh_tokens,
      commands::fitbit::fitbit_disconnect,
      // Reflection commands
      commands::reflections::save_reflection,
      commands::reflections::get_reflections,
      commands::reflections::get_reflection,
      commands::reflections::delete_reflection,
      // Insight commands
      commands::insights::get_insights,
      commands::insights::get_insight_trends,
    ])
    .run(tauri::generate_context!())
    .expect("error while running tauri application");
}
