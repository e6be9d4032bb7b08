//! Fitbit integration for workouts and OAuth
//!
//! Handles the Fitbit OAuth flow and fetches the recent activity list.
//! Workouts are read live from the Fitbit Web API and never persisted;
//! reflections reference them by logId only.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::time::Duration as StdDuration;
use url::Url;

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

const FITBIT_AUTH_URL: &str = "https://www.fitbit.com/oauth2/authorize";
const FITBIT_TOKEN_URL: &str = "https://api.fitbit.com/oauth2/token";
const FITBIT_API_BASE: &str = "https://api.fitbit.com";
const REDIRECT_PORT: u16 = 8767;
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;
const ACTIVITY_LOOKBACK_DAYS: i64 = 30;

/// ---------------------------------------------------------------------------
/// OAuth Data Structures
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FitbitConfig {
  pub client_id: String,
  pub client_secret: String,
  pub redirect_uri: String,
}

impl FitbitConfig {
  pub fn from_env() -> Result<Self, FitbitError> {
    Ok(Self {
      client_id: env::var("FITBIT_CLIENT_ID")
        .map_err(|_| FitbitError::MissingConfig("FITBIT_CLIENT_ID".into()))?,
      client_secret: env::var("FITBIT_CLIENT_SECRET")
        .map_err(|_| FitbitError::MissingConfig("FITBIT_CLIENT_SECRET".into()))?,
      redirect_uri: format!("http://localhost:{}/callback", REDIRECT_PORT),
    })
  }
}

/// Response from the Fitbit token endpoint
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_in: i64, // seconds
  pub token_type: String,
  pub scope: Option<String>,
  pub user_id: Option<String>,
}

/// Stored token state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitbitTokens {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_at: DateTime<Utc>,
}

impl FitbitTokens {
  pub fn from_response(resp: TokenResponse) -> Self {
    Self {
      access_token: resp.access_token,
      refresh_token: resp.refresh_token,
      expires_at: Utc::now() + Duration::seconds(resp.expires_in),
    }
  }

  pub fn needs_refresh(&self) -> bool {
    let buffer = Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES);
    Utc::now() + buffer >= self.expires_at
  }
}

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum FitbitError {
  #[error("Missing configuration: {0}")]
  MissingConfig(String),

  #[error("HTTP request failed: {0}")]
  Request(String),

  #[error("OAuth error: {0}")]
  OAuth(String),

  #[error("Callback server error: {0}")]
  Server(String),

  #[error("Database error: {0}")]
  Database(String),

  #[error("API error: {0}")]
  Api(String),

  #[error("Not authenticated with Fitbit")]
  NotAuthenticated,
}

impl From<reqwest::Error> for FitbitError {
  fn from(e: reqwest::Error) -> Self {
    FitbitError::Request(e.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// OAuth URL Generation
/// ---------------------------------------------------------------------------

pub fn build_auth_url(config: &FitbitConfig) -> Result<String, FitbitError> {
  let mut url = Url::parse(FITBIT_AUTH_URL).map_err(|e| FitbitError::OAuth(e.to_string()))?;

  url
    .query_pairs_mut()
    .append_pair("response_type", "code")
    .append_pair("client_id", &config.client_id)
    .append_pair("redirect_uri", &config.redirect_uri)
    .append_pair("scope", "activity heartrate sleep profile");

  Ok(url.to_string())
}

/// ---------------------------------------------------------------------------
/// Token Exchange (Authorization Code -> Tokens)
/// ---------------------------------------------------------------------------

/// Fitbit requires client credentials via HTTP Basic auth on the token
/// endpoint, in addition to the form body.
pub async fn exchange_code_for_tokens(
  config: &FitbitConfig,
  code: &str,
) -> Result<FitbitTokens, FitbitError> {
  let client = Client::new();

  let response = client
    .post(FITBIT_TOKEN_URL)
    .basic_auth(&config.client_id, Some(&config.client_secret))
    .form(&[
      ("client_id", config.client_id.as_str()),
      ("grant_type", "authorization_code"),
      ("redirect_uri", config.redirect_uri.as_str()),
      ("code", code),
    ])
    .send()
    .await?;

  if !response.status().is_success() {
    let error_text = response.text().await.unwrap_or_default();
    return Err(FitbitError::OAuth(format!(
      "Token exchange failed: {}",
      error_text
    )));
  }

  let token_response: TokenResponse = response.json().await?;
  Ok(FitbitTokens::from_response(token_response))
}

/// ---------------------------------------------------------------------------
/// Token Refresh
/// ---------------------------------------------------------------------------

pub async fn refresh_tokens(
  config: &FitbitConfig,
  refresh_token: &str,
) -> Result<FitbitTokens, FitbitError> {
  let client = Client::new();

  let response = client
    .post(FITBIT_TOKEN_URL)
    .basic_auth(&config.client_id, Some(&config.client_secret))
    .form(&[
      ("grant_type", "refresh_token"),
      ("refresh_token", refresh_token),
    ])
    .send()
    .await?;

  if !response.status().is_success() {
    let error_text = response.text().await.unwrap_or_default();
    return Err(FitbitError::OAuth(format!(
      "Token refresh failed: {}",
      error_text
    )));
  }

  let token_response: TokenResponse = response.json().await?;
  Ok(FitbitTokens::from_response(token_response))
}

/// ---------------------------------------------------------------------------
/// OAuth Callback Server
/// ---------------------------------------------------------------------------

pub struct CallbackResult {
  pub code: String,
}

/// Start a temporary HTTP server, wait for the callback, extract the code
pub fn wait_for_callback(timeout_seconds: u64) -> Result<CallbackResult, FitbitError> {
  let listener = TcpListener::bind(format!("127.0.0.1:{}", REDIRECT_PORT))
    .map_err(|e| FitbitError::Server(format!("Failed to bind port {}: {}", REDIRECT_PORT, e)))?;

  listener
    .set_nonblocking(true)
    .map_err(|e| FitbitError::Server(e.to_string()))?;

  let start = std::time::Instant::now();
  let timeout = StdDuration::from_secs(timeout_seconds);

  loop {
    if start.elapsed() > timeout {
      return Err(FitbitError::Server("Callback timeout - no response received".into()));
    }

    match listener.accept() {
      Ok((mut stream, _)) => {
        let mut buffer = [0; 2048];
        stream.read(&mut buffer).ok();

        let request = String::from_utf8_lossy(&buffer);

        if let Some(code) = extract_code_from_request(&request) {
          let response = build_success_response();
          stream.write_all(response.as_bytes()).ok();
          stream.flush().ok();

          return Ok(CallbackResult { code });
        } else if request.contains("error=") {
          let error =
            extract_error_from_request(&request).unwrap_or_else(|| "Unknown error".to_string());

          let response = build_error_response(&error);
          stream.write_all(response.as_bytes()).ok();
          stream.flush().ok();

          return Err(FitbitError::OAuth(error));
        }
      }
      Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
        std::thread::sleep(StdDuration::from_millis(100));
        continue;
      }
      Err(e) => {
        return Err(FitbitError::Server(e.to_string()));
      }
    }
  }
}

fn extract_code_from_request(request: &str) -> Option<String> {
  let first_line = request.lines().next()?;

  if !first_line.contains("/callback?") {
    return None;
  }

  let url_part = first_line.split_whitespace().nth(1)?;

  for param in url_part.split('?').nth(1)?.split('&') {
    let mut kv = param.split('=');
    if kv.next() == Some("code") {
      return kv.next().map(String::from);
    }
  }
  None
}

fn extract_error_from_request(request: &str) -> Option<String> {
  let first_line = request.lines().next()?;
  let url_part = first_line.split_whitespace().nth(1)?;

  for param in url_part.split('?').nth(1)?.split('&') {
    let mut kv = param.split('=');
    if kv.next() == Some("error") {
      return kv.next().map(|s| s.replace("%20", " "));
    }
  }
  None
}

fn build_success_response() -> String {
  let body = r#"<!DOCTYPE html>
<html>
<head><title>Reflect Log - Connected!</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
  <h1>Successfully Connected to Fitbit!</h1>
  <p>You can close this window and return to Reflect Log.</p>
</body>
</html>"#;
  format!(
    "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n{}",
    body.len(),
    body
  )
}

fn build_error_response(error: &str) -> String {
  let body = format!(
    r#"<!DOCTYPE html>
<html>
<head><title>Reflect Log - Error</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
  <h1>Connection Failed</h1>
  <p>Error: {}</p>
  <p>Please try again.</p>
</body>
</html>"#,
    error
  );
  format!(
    "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n{}",
    body.len(),
    body
  )
}

/// ---------------------------------------------------------------------------
/// Fitbit API - Activity Data Structures
/// ---------------------------------------------------------------------------

/// Activity summary from the Fitbit activity list endpoint.
/// startTime stays a string - we display it and compare logIds, nothing more.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workout {
  pub log_id: i64,
  #[serde(default)]
  pub activity_name: String,
  #[serde(default)]
  pub start_time: String,
  /// Milliseconds
  #[serde(default)]
  pub duration: Option<i64>,
  #[serde(default)]
  pub average_heart_rate: Option<i64>,
  #[serde(default)]
  pub calories: Option<i64>,
  #[serde(default)]
  pub steps: Option<i64>,
  #[serde(default)]
  pub source: Option<ActivitySource>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActivitySource {
  #[serde(default)]
  pub name: String,
}

#[derive(Debug, Deserialize)]
struct ActivityListResponse {
  activities: Vec<Workout>,
}

/// ---------------------------------------------------------------------------
/// Fitbit API - Activity Fetching
/// ---------------------------------------------------------------------------

/// Thin client over the Fitbit Web API. The base URL is swappable so tests
/// can point it at a local mock server.
pub struct FitbitClient {
  http: Client,
  api_base: String,
}

impl FitbitClient {
  pub fn new() -> Self {
    Self {
      http: Client::new(),
      api_base: FITBIT_API_BASE.to_string(),
    }
  }

  pub fn with_api_base(api_base: &str) -> Self {
    Self {
      http: Client::new(),
      api_base: api_base.to_string(),
    }
  }

  /// Fetch the recent activity list (last 30 days, newest first)
  pub async fn recent_workouts(
    &self,
    access_token: &str,
    limit: u32,
  ) -> Result<Vec<Workout>, FitbitError> {
    let after_date = (Utc::now() - Duration::days(ACTIVITY_LOOKBACK_DAYS))
      .format("%Y-%m-%d")
      .to_string();

    let url = format!(
      "{}/1/user/-/activities/list.json?afterDate={}&sort=desc&limit={}&offset=0",
      self.api_base, after_date, limit
    );

    let response = self
      .http
      .get(&url)
      .bearer_auth(access_token)
      .send()
      .await?;

    if response.status() == reqwest::StatusCode::UNAUTHORIZED {
      return Err(FitbitError::NotAuthenticated);
    }

    if !response.status().is_success() {
      let status = response.status();
      let error_text = response.text().await.unwrap_or_default();
      return Err(FitbitError::Api(format!(
        "Activity list error {}: {}",
        status, error_text
      )));
    }

    let response_text = response.text().await?;

    let list: ActivityListResponse = serde_json::from_str(&response_text).map_err(|e| {
      eprintln!("Failed to parse Fitbit activity list: {}", e);
      // chars, not bytes: slicing at byte 500 could split a multibyte char
      let preview: String = response_text.chars().take(500).collect();
      eprintln!("Raw response (first 500 chars): {}", preview);
      FitbitError::Api(format!("Failed to parse activities: {}", e))
    })?;

    Ok(list.activities)
  }

  /// Find one workout by its logId, searched in the recent list.
  /// Comparison is on the string form - the frontend round-trips logIds as
  /// text and Fitbit serves them as numbers.
  pub async fn workout_by_id(
    &self,
    access_token: &str,
    log_id: &str,
  ) -> Result<Option<Workout>, FitbitError> {
    let workouts = self.recent_workouts(access_token, 50).await?;
    Ok(workouts.into_iter().find(|w| w.log_id.to_string() == log_id))
  }
}

impl Default for FitbitClient {
  fn default() -> Self {
    Self::new()
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
