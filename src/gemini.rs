//! Minimal Gemini client for photo-evidence verification.
//!
//! One call shape only: `generateContent` with a text instruction and one inline image.
//! This boundary never fails: every error path (image access, transport, non-2xx,
//! malformed payload) comes back as a descriptive string, which the mission flow
//! then judges like any other model answer.
//!
//! NOTE: We never log the API key or the encoded image.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::config::VisionConfig;
use crate::image::{ImageResolver, ResolvedImage};
use crate::util::trunc_for_log;

pub const IMAGE_ACCESS_FAILURE: &str = "Could not access image file";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Leading text of every answer this client makes up itself instead of the model.
const FAILURE_PREFIXES: [&str; 5] = [
  "API Error",
  "Error analyzing image",
  "Error parsing response",
  "Empty response body",
  IMAGE_ACCESS_FAILURE,
];

/// Whether `text` is one of this client's failure strings rather than a model answer.
pub fn is_failure_text(text: &str) -> bool {
  FAILURE_PREFIXES.iter().any(|p| text.starts_with(p))
}

#[derive(Clone)]
pub struct Gemini {
  client: reqwest::Client,
  api_key: Option<String>,
  pub base_url: String,
  pub model: String,
  resolver: ImageResolver,
}

impl Gemini {
  pub fn from_config(cfg: &VisionConfig, resolver: ImageResolver) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder()
      .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
      .timeout(Duration::from_secs(cfg.request_timeout_secs))
      .build()?;
    Ok(Self {
      client,
      api_key: cfg.api_key.clone().filter(|k| !k.is_empty()),
      base_url: cfg.base_url.clone(),
      model: cfg.model.clone(),
      resolver,
    })
  }

  pub fn is_configured(&self) -> bool {
    self.api_key.is_some()
  }

  pub fn resolver(&self) -> &ImageResolver {
    &self.resolver
  }

  /// Ask the model about one image. Always returns text; see module docs.
  #[instrument(target = "vision", level = "info", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
  pub async fn analyze(&self, image_ref: &str, prompt: &str) -> String {
    let image = match self.resolver.resolve(image_ref) {
      Ok(img) => img,
      Err(e) => {
        warn!(target: "vision", %image_ref, error = %e, "Image reference could not be resolved");
        return IMAGE_ACCESS_FAILURE.to_string();
      }
    };
    let start = std::time::Instant::now();
    let text = self.generate(&image, prompt).await;
    info!(target: "vision", elapsed = ?start.elapsed(), image_bytes = image.bytes.len(), staged = image.temp_path().is_some(), answer = %trunc_for_log(&text, 120), "Vision answer received");
    text
  }

  async fn generate(&self, image: &ResolvedImage, prompt: &str) -> String {
    let Some(api_key) = &self.api_key else {
      return "Error analyzing image: vision endpoint not configured".into();
    };

    let url = format!("{}/{}:generateContent", self.base_url, self.model);
    let req = GenerateRequest {
      contents: vec![Content {
        parts: vec![
          Part::Text { text: prompt.to_string() },
          Part::InlineData {
            inline_data: InlineData {
              mime_type: image.mime_type.to_string(),
              data: STANDARD.encode(&image.bytes),
            },
          },
        ],
      }],
    };

    let res = match self
      .client
      .post(&url)
      .header(API_KEY_HEADER, api_key.as_str())
      .header(USER_AGENT, "ecoquest-gateway/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&req)
      .send()
      .await
    {
      Ok(r) => r,
      Err(e) => {
        // The URL stays out of anything logged or returned.
        let e = e.without_url();
        error!(target: "vision", error = %e, "Vision request failed");
        return format!("Error analyzing image: {e}");
      }
    };

    let status = res.status();
    let body = match res.text().await {
      Ok(b) => b,
      Err(e) => {
        let e = e.without_url();
        error!(target: "vision", error = %e, "Failed reading vision response body");
        return format!("Error analyzing image: {e}");
      }
    };

    if !status.is_success() {
      let details = if body.trim().is_empty() { "No error details".to_string() } else { body };
      error!(target: "vision", status = status.as_u16(), body = %trunc_for_log(&details, 300), "Vision API error");
      return format!("API Error: {} - {}", status.as_u16(), details);
    }

    if body.trim().is_empty() {
      return "Empty response body".into();
    }
    match extract_text(&body) {
      Ok(text) => text,
      Err(e) => {
        error!(target: "vision", error = %e, "Vision response parse error");
        format!("Error parsing response: {e}")
      }
    }
  }
}

/// Pull `candidates[0].content.parts[0].text` out of a generateContent envelope.
fn extract_text(body: &str) -> Result<String, String> {
  let parsed: GenerateResponse = serde_json::from_str(body).map_err(|e| e.to_string())?;
  parsed
    .candidates
    .into_iter()
    .next()
    .ok_or_else(|| "no candidates in response".to_string())?
    .content
    .parts
    .into_iter()
    .next()
    .and_then(|p| p.text)
    .ok_or_else(|| "first candidate has no text part".to_string())
}

// --- generateContent DTOs ---

#[derive(Serialize)]
struct GenerateRequest { contents: Vec<Content> }
#[derive(Serialize)]
struct Content { parts: Vec<Part> }
#[derive(Serialize)]
#[serde(untagged)]
enum Part {
  Text { text: String },
  InlineData { inline_data: InlineData },
}
#[derive(Serialize)]
struct InlineData { mime_type: String, data: String }

#[derive(Deserialize)]
struct GenerateResponse { candidates: Vec<Candidate> }
#[derive(Deserialize)]
struct Candidate { content: CandidateContent }
#[derive(Deserialize)]
struct CandidateContent { parts: Vec<CandidatePart> }
#[derive(Deserialize)]
struct CandidatePart { #[serde(default)] text: Option<String> }
