//! Thin REST client for the hosted backend-as-a-service (Supabase).
//!
//! Covers the three surfaces the gateway uses:
//!   - GoTrue auth (`/auth/v1`): sign-up, password sign-in, sign-out
//!   - PostgREST (`/rest/v1`): RPC calls, row inserts, filtered selects
//!   - Storage (`/storage/v1`): list, delete, upload under a bucket
//!
//! Every request carries the anon key; authenticated ones add the session's bearer token.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::config::BackendConfig;
use crate::session::Session;
use crate::util::trunc_for_log;

#[derive(Debug, Error)]
pub enum BackendError {
  #[error("not signed in")]
  NotSignedIn,
  #[error("transport error: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("backend returned {status}: {message}")]
  Status { status: u16, message: String },
  #[error("unexpected backend response: {0}")]
  Decode(String),
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct StorageObject {
  pub name: String,
}

#[derive(Deserialize)]
struct TokenResponse {
  access_token: String,
  #[serde(default)] refresh_token: Option<String>,
  user: AuthUser,
}
#[derive(Deserialize)]
struct AuthUser {
  id: String,
  #[serde(default)] email: Option<String>,
}

#[derive(Clone)]
pub struct SupabaseClient {
  client: reqwest::Client,
  pub base_url: String,
  anon_key: String,
}

impl SupabaseClient {
  pub fn from_config(cfg: &BackendConfig) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder()
      .connect_timeout(Duration::from_secs(10))
      .timeout(Duration::from_secs(30))
      .build()?;
    Ok(Self { client, base_url: cfg.url.clone(), anon_key: cfg.anon_key.clone() })
  }

  fn anon(&self, rb: RequestBuilder) -> RequestBuilder {
    rb.header("apikey", &self.anon_key)
      .header(USER_AGENT, "ecoquest-gateway/0.1")
  }

  fn authed(&self, rb: RequestBuilder, session: &Session) -> RequestBuilder {
    self.anon(rb).header(AUTHORIZATION, format!("Bearer {}", session.access_token))
  }

  // --- auth ---

  #[instrument(target = "backend", level = "info", skip(self, password))]
  pub async fn sign_up(&self, email: &str, password: &str) -> Result<(), BackendError> {
    let url = format!("{}/auth/v1/signup", self.base_url);
    let res = self.anon(self.client.post(&url))
      .json(&json!({ "email": email, "password": password }))
      .send().await?;
    check(res).await?;
    Ok(())
  }

  #[instrument(target = "backend", level = "info", skip(self, password))]
  pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
    let url = format!("{}/auth/v1/token", self.base_url);
    let res = self.anon(self.client.post(&url))
      .query(&[("grant_type", "password")])
      .json(&json!({ "email": email, "password": password }))
      .send().await?;
    let token: TokenResponse = decode(check(res).await?).await?;
    Ok(Session {
      access_token: token.access_token,
      refresh_token: token.refresh_token,
      user_id: token.user.id,
      email: token.user.email.unwrap_or_else(|| email.to_string()),
    })
  }

  /// Exchange the session's refresh token for a new access/refresh pair.
  #[instrument(target = "backend", level = "info", skip_all, fields(user_id = %session.user_id))]
  pub async fn refresh(&self, session: &Session) -> Result<Session, BackendError> {
    let refresh_token = session.refresh_token.as_deref().ok_or(BackendError::NotSignedIn)?;
    let url = format!("{}/auth/v1/token", self.base_url);
    let res = self.anon(self.client.post(&url))
      .query(&[("grant_type", "refresh_token")])
      .json(&json!({ "refresh_token": refresh_token }))
      .send().await?;
    let token: TokenResponse = decode(check(res).await?).await?;
    Ok(Session {
      access_token: token.access_token,
      refresh_token: token.refresh_token.or_else(|| session.refresh_token.clone()),
      user_id: token.user.id,
      email: token.user.email.unwrap_or_else(|| session.email.clone()),
    })
  }

  #[instrument(target = "backend", level = "info", skip_all, fields(user_id = %session.user_id))]
  pub async fn sign_out(&self, session: &Session) -> Result<(), BackendError> {
    let url = format!("{}/auth/v1/logout", self.base_url);
    let res = self.authed(self.client.post(&url), session).send().await?;
    check(res).await?;
    Ok(())
  }

  // --- PostgREST ---

  /// Call a Postgres function and decode its JSON result.
  #[instrument(target = "backend", level = "debug", skip(self, session, params))]
  pub async fn rpc<T: DeserializeOwned>(&self, session: &Session, name: &str, params: Value) -> Result<T, BackendError> {
    let res = self.send_rpc(session, name, params).await?;
    decode(res).await
  }

  /// Call a Postgres function whose result is irrelevant (void functions).
  #[instrument(target = "backend", level = "debug", skip(self, session, params))]
  pub async fn rpc_unit(&self, session: &Session, name: &str, params: Value) -> Result<(), BackendError> {
    self.send_rpc(session, name, params).await?;
    Ok(())
  }

  async fn send_rpc(&self, session: &Session, name: &str, params: Value) -> Result<Response, BackendError> {
    let url = format!("{}/rest/v1/rpc/{}", self.base_url, name);
    let res = self.authed(self.client.post(&url), session)
      .header(CONTENT_TYPE, "application/json")
      .json(&params)
      .send().await?;
    check(res).await
  }

  #[instrument(target = "backend", level = "debug", skip(self, session, row))]
  pub async fn insert<B: Serialize + ?Sized>(&self, session: &Session, table: &str, row: &B) -> Result<(), BackendError> {
    let url = format!("{}/rest/v1/{}", self.base_url, table);
    let res = self.authed(self.client.post(&url), session)
      .header("Prefer", "return=minimal")
      .json(row)
      .send().await?;
    check(res).await?;
    Ok(())
  }

  /// `GET /rest/v1/{table}?select=*&{column}=eq.{value}...`
  #[instrument(target = "backend", level = "debug", skip(self, session))]
  pub async fn select_eq<T: DeserializeOwned>(
    &self,
    session: &Session,
    table: &str,
    filters: &[(&str, &str)],
  ) -> Result<Vec<T>, BackendError> {
    let url = format!("{}/rest/v1/{}", self.base_url, table);
    let mut query: Vec<(String, String)> = vec![("select".into(), "*".into())];
    query.extend(filters.iter().map(|(col, v)| (col.to_string(), format!("eq.{v}"))));
    let res = self.authed(self.client.get(&url), session).query(&query).send().await?;
    decode(check(res).await?).await
  }

  // --- storage ---

  #[instrument(target = "backend", level = "debug", skip(self, session))]
  pub async fn storage_list(&self, session: &Session, bucket: &str, prefix: &str) -> Result<Vec<StorageObject>, BackendError> {
    let url = format!("{}/storage/v1/object/list/{}", self.base_url, bucket);
    let res = self.authed(self.client.post(&url), session)
      .json(&json!({ "prefix": prefix, "limit": 100, "offset": 0 }))
      .send().await?;
    decode(check(res).await?).await
  }

  #[instrument(target = "backend", level = "debug", skip(self, session))]
  pub async fn storage_delete(&self, session: &Session, bucket: &str, paths: &[String]) -> Result<(), BackendError> {
    let url = format!("{}/storage/v1/object/{}", self.base_url, bucket);
    let res = self.authed(self.client.delete(&url), session)
      .json(&json!({ "prefixes": paths }))
      .send().await?;
    check(res).await?;
    Ok(())
  }

  #[instrument(target = "backend", level = "debug", skip(self, session, bytes), fields(size = bytes.len()))]
  pub async fn storage_upload(
    &self,
    session: &Session,
    bucket: &str,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
  ) -> Result<(), BackendError> {
    let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path);
    let res = self.authed(self.client.post(&url), session)
      .header(CONTENT_TYPE, content_type)
      .header("x-upsert", "false")
      .body(bytes)
      .send().await?;
    check(res).await?;
    Ok(())
  }

  pub fn public_object_url(&self, bucket: &str, path: &str) -> String {
    format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, path)
  }
}

/// Turn a non-2xx response into `BackendError::Status` with the cleanest message we can find.
async fn check(res: Response) -> Result<Response, BackendError> {
  let status = res.status();
  if status.is_success() {
    return Ok(res);
  }
  let body = res.text().await.unwrap_or_default();
  let message = extract_error_message(&body).unwrap_or_else(|| trunc_for_log(&body, 300));
  error!(target: "backend", status = status.as_u16(), %message, "Backend request failed");
  Err(BackendError::Status { status: status.as_u16(), message })
}

async fn decode<T: DeserializeOwned>(res: Response) -> Result<T, BackendError> {
  let body = res.text().await?;
  debug!(target: "backend", body = %trunc_for_log(&body, 200), "Backend response");
  serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
}

/// PostgREST uses `message`, GoTrue `msg`/`error_description`, storage `error`.
fn extract_error_message(body: &str) -> Option<String> {
  let v: Value = serde_json::from_str(body).ok()?;
  ["message", "msg", "error_description", "error"]
    .iter()
    .find_map(|k| v.get(*k).and_then(Value::as_str))
    .map(str::to_string)
}
