//! Gateway configuration: TOML file (optional) plus environment overrides.
//!
//! Resolution order for every field: env variable, then TOML, then default.
//!
//! ```toml
//! [backend]
//! url = "https://xyz.supabase.co"
//! anon_key = "..."
//!
//! [vision]
//! model = "gemini-2.0-flash"
//! connect_timeout_secs = 30
//!
//! [storage]
//! profile_bucket = "profile_picture"
//! content_root = "./content"
//!
//! [prompts]
//! camera_verification = "..."
//! ```

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub backend: BackendConfig,
  #[serde(default)]
  pub vision: VisionConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub prompts: Prompts,
}

/// Hosted backend-as-a-service (auth, Postgres REST, storage).
#[derive(Clone, Debug, Deserialize, Default)]
pub struct BackendConfig {
  #[serde(default)] pub url: String,
  #[serde(default)] pub anon_key: String,
}

/// Vision-language endpoint used to judge photo evidence.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
  pub api_key: Option<String>,
  pub base_url: String,
  pub model: String,
  pub connect_timeout_secs: u64,
  pub request_timeout_secs: u64,
}

impl Default for VisionConfig {
  fn default() -> Self {
    Self {
      api_key: None,
      base_url: "https://generativelanguage.googleapis.com/v1beta/models".into(),
      model: "gemini-2.0-flash".into(),
      connect_timeout_secs: 30,
      request_timeout_secs: 30,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
  pub profile_bucket: String,
  /// Directory backing `content://` image handles.
  pub content_root: PathBuf,
  /// Where the signed-in session is persisted between restarts. `None` keeps it in memory only.
  pub session_path: Option<PathBuf>,
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      profile_bucket: "profile_picture".into(),
      content_root: PathBuf::from("./content"),
      session_path: None,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  /// Instruction sent with photo evidence when the mission carries no prompt of its own.
  pub camera_verification: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      camera_verification: "Look at this photo. Does it clearly show the eco-friendly action described by the mission? Answer 'yes' or 'no' and give one short reason.".into(),
    }
  }
}

impl AppConfig {
  /// Load from ECOQUEST_CONFIG_PATH (if set) and apply env overrides.
  pub fn load() -> Self {
    let mut cfg = load_file_from_env().unwrap_or_default();
    cfg.apply_env(|k| std::env::var(k).ok());
    cfg
  }

  fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("SUPABASE_URL") { self.backend.url = v; }
    if let Some(v) = var("SUPABASE_ANON_KEY") { self.backend.anon_key = v; }
    if let Some(v) = var("GEMINI_API_KEY") { self.vision.api_key = Some(v); }
    if let Some(v) = var("GEMINI_BASE_URL") { self.vision.base_url = v; }
    if let Some(v) = var("GEMINI_MODEL") { self.vision.model = v; }
    if let Some(v) = var("ECOQUEST_CONTENT_ROOT") { self.storage.content_root = PathBuf::from(v); }
    if let Some(v) = var("ECOQUEST_SESSION_PATH") { self.storage.session_path = Some(PathBuf::from(v)); }
    self.backend.url = self.backend.url.trim_end_matches('/').to_string();
    self.vision.base_url = self.vision.base_url.trim_end_matches('/').to_string();
  }
}

/// Attempt to load `AppConfig` from ECOQUEST_CONFIG_PATH. On any parsing/IO error, returns None.
fn load_file_from_env() -> Option<AppConfig> {
  let path = std::env::var("ECOQUEST_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "ecoquest", %path, "Loaded gateway config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "ecoquest", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "ecoquest", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_defaults() {
    let cfg: AppConfig = toml::from_str(
      r#"
      [backend]
      url = "https://demo.supabase.co/"
      anon_key = "anon"

      [vision]
      model = "gemini-1.5-flash"
      "#,
    )
    .expect("valid toml");
    assert_eq!(cfg.backend.anon_key, "anon");
    assert_eq!(cfg.vision.model, "gemini-1.5-flash");
    assert_eq!(cfg.vision.connect_timeout_secs, 30);
    assert_eq!(cfg.storage.profile_bucket, "profile_picture");
    assert!(!cfg.prompts.camera_verification.is_empty());
  }

  #[test]
  fn env_overrides_win_and_urls_are_normalized() {
    let mut cfg: AppConfig = toml::from_str("[backend]\nurl = \"https://a.example/\"\n").expect("toml");
    cfg.apply_env(|k| match k {
      "GEMINI_API_KEY" => Some("secret".into()),
      "GEMINI_BASE_URL" => Some("http://localhost:9000/models/".into()),
      _ => None,
    });
    assert_eq!(cfg.backend.url, "https://a.example");
    assert_eq!(cfg.vision.api_key.as_deref(), Some("secret"));
    assert_eq!(cfg.vision.base_url, "http://localhost:9000/models");
  }
}
