use crate::db::AppState;
use crate::fitbit::{
  build_auth_url, exchange_code_for_tokens, refresh_tokens, wait_for_callback, FitbitConfig,
  FitbitError, FitbitTokens,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tauri::State;

/// ---------------------------------------------------------------------------
/// Start OAuth Flow
/// ---------------------------------------------------------------------------

/// Initiates Fitbit OAuth by returning the authorization URL.
/// Frontend should open this URL in the default browser.
#[tauri::command]
pub async fn fitbit_start_auth() -> Result<String, FitbitError> {
  let config = FitbitConfig::from_env()?;
  let auth_url = build_auth_url(&config)?;
  Ok(auth_url)
}

/// ---------------------------------------------------------------------------
/// Wait for Callback and Exchange Code
/// ---------------------------------------------------------------------------

/// Waits for the OAuth callback, exchanges the code for tokens, and stores
/// them. This should be called immediately after fitbit_start_auth.
#[tauri::command]
pub async fn fitbit_complete_auth(state: State<'_, Arc<AppState>>) -> Result<(), FitbitError> {
  let config = FitbitConfig::from_env()?;

  // Wait for callback (blocking - runs in Tauri's async runtime)
  let callback = tokio::task::spawn_blocking(|| wait_for_callback(120))
    .await
    .map_err(|e| FitbitError::Server(e.to_string()))??;

  // Exchange authorization code for tokens
  let tokens = exchange_code_for_tokens(&config, &callback.code).await?;

  // Store tokens in database
  save_tokens(&state.db, &tokens).await?;

  println!("Fitbit OAuth completed successfully");
  Ok(())
}

/// ---------------------------------------------------------------------------
/// Check Authentication Status
/// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct FitbitAuthStatus {
  pub is_authenticated: bool,
  pub expires_at: Option<String>,
  pub needs_refresh: bool,
}

#[tauri::command]
pub async fn fitbit_get_auth_status(
  state: State<'_, Arc<AppState>>,
) -> Result<FitbitAuthStatus, FitbitError> {
  match load_tokens(&state.db).await? {
    Some(tokens) => Ok(FitbitAuthStatus {
      is_authenticated: true,
      expires_at: Some(tokens.expires_at.to_rfc3339()),
      needs_refresh: tokens.needs_refresh(),
    }),
    None => Ok(FitbitAuthStatus {
      is_authenticated: false,
      expires_at: None,
      needs_refresh: false,
    }),
  }
}

/// ---------------------------------------------------------------------------
/// Refresh Tokens
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn fitbit_refresh_tokens(state: State<'_, Arc<AppState>>) -> Result<(), FitbitError> {
  let config = FitbitConfig::from_env()?;

  let existing = load_tokens(&state.db)
    .await?
    .ok_or(FitbitError::NotAuthenticated)?;

  let new_tokens = refresh_tokens(&config, &existing.refresh_token).await?;
  save_tokens(&state.db, &new_tokens).await?;

  println!("Fitbit tokens refreshed successfully");
  Ok(())
}

/// ---------------------------------------------------------------------------
/// Disconnect Fitbit
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn fitbit_disconnect(state: State<'_, Arc<AppState>>) -> Result<(), FitbitError> {
  sqlx::query(
    "UPDATE sync_state SET access_token = NULL, refresh_token = NULL,
         token_expires_at = NULL WHERE source = 'fitbit'",
  )
  .execute(&state.db)
  .await
  .map_err(|e| FitbitError::Database(e.to_string()))?;

  println!("Fitbit disconnected");
  Ok(())
}

/// ---------------------------------------------------------------------------
/// Get Valid Access Token (with auto-refresh)
/// ---------------------------------------------------------------------------

/// Internal helper: get a valid access token, refreshing if necessary.
/// Used by the workout-fetching and reflection commands.
pub async fn get_valid_access_token(db: &crate::db::DbPool) -> Result<String, FitbitError> {
  let mut tokens = load_tokens(db).await?.ok_or(FitbitError::NotAuthenticated)?;

  if tokens.needs_refresh() {
    let config = FitbitConfig::from_env()?;
    tokens = refresh_tokens(&config, &tokens.refresh_token).await?;
    save_tokens(db, &tokens).await?;
    println!("Fitbit tokens auto-refreshed");
  }

  Ok(tokens.access_token)
}

/// ---------------------------------------------------------------------------
/// Database Helpers
/// ---------------------------------------------------------------------------

async fn save_tokens(db: &crate::db::DbPool, tokens: &FitbitTokens) -> Result<(), FitbitError> {
  sqlx::query(
    r#"
        INSERT INTO sync_state (source, last_sync_at, access_token, refresh_token, token_expires_at)
        VALUES ('fitbit', ?1, ?2, ?3, ?4)
        ON CONFLICT(source) DO UPDATE SET
            last_sync_at = excluded.last_sync_at,
            access_token = excluded.access_token,
            refresh_token = excluded.refresh_token,
            token_expires_at = excluded.token_expires_at
        "#,
  )
  .bind(Utc::now())
  .bind(&tokens.access_token)
  .bind(&tokens.refresh_token)
  .bind(&tokens.expires_at)
  .execute(db)
  .await
  .map_err(|e| FitbitError::Database(e.to_string()))?;

  Ok(())
}

async fn load_tokens(db: &crate::db::DbPool) -> Result<Option<FitbitTokens>, FitbitError> {
  let row: Option<(Option<String>, Option<String>, Option<chrono::DateTime<Utc>>)> = sqlx::query_as(
    "SELECT access_token, refresh_token, token_expires_at
             FROM sync_state WHERE source = 'fitbit'",
  )
  .fetch_optional(db)
  .await
  .map_err(|e| FitbitError::Database(e.to_string()))?;

  match row {
    Some((Some(access), Some(refresh), Some(expires))) => Ok(Some(FitbitTokens {
      access_token: access,
      refresh_token: refresh,
      expires_at: expires,
    })),
    _ => Ok(None),
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
