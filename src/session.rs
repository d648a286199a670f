//! Signed-in session state.
//!
//! There is exactly one writer (`SessionWriter`, owned by the auth repository) and any
//! number of cloneable readers. Readers can peek at the current value or subscribe to
//! changes. When a persistence path is configured the writer mirrors every change to a
//! small JSON file so a restart keeps the user signed in.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::supabase::BackendError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub access_token: String,
  #[serde(default)]
  pub refresh_token: Option<String>,
  pub user_id: String,
  pub email: String,
}

#[derive(Deserialize)]
struct Claims {
  exp: i64,
}

impl Session {
  /// Expiry read from the access token's `exp` claim. `None` when the token is not a JWT.
  pub fn expires_at(&self) -> Option<DateTime<Utc>> {
    let payload = self.access_token.split('.').nth(1)?;
    let raw = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&raw).ok()?;
    DateTime::from_timestamp(claims.exp, 0)
  }

  /// Whether the access token has expired or will within `margin` of `now`.
  pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
    self.expires_at().is_some_and(|exp| exp <= now + margin)
  }
}

pub struct SessionWriter {
  tx: watch::Sender<Option<Session>>,
  persist_to: Option<PathBuf>,
}

#[derive(Clone)]
pub struct SessionReader {
  rx: watch::Receiver<Option<Session>>,
}

/// Build the writer/reader pair, restoring a persisted session if one is found.
pub fn session_channel(persist_to: Option<PathBuf>) -> (SessionWriter, SessionReader) {
  let initial = persist_to.as_deref().and_then(restore);
  let (tx, rx) = watch::channel(initial);
  (SessionWriter { tx, persist_to }, SessionReader { rx })
}

fn restore(path: &Path) -> Option<Session> {
  let raw = std::fs::read_to_string(path).ok()?;
  match serde_json::from_str::<Session>(&raw) {
    Ok(s) => {
      info!(target: "ecoquest", user_id = %s.user_id, "Restored persisted session");
      Some(s)
    }
    Err(e) => {
      warn!(target: "ecoquest", path = %path.display(), error = %e, "Ignoring unreadable session file");
      None
    }
  }
}

impl SessionWriter {
  pub fn sign_in(&self, session: Session) {
    if let Some(path) = &self.persist_to {
      let written = serde_json::to_vec(&session)
        .map_err(std::io::Error::from)
        .and_then(|raw| std::fs::write(path, raw));
      if let Err(e) = written {
        warn!(target: "ecoquest", path = %path.display(), error = %e, "Could not persist session");
      }
    }
    self.tx.send_replace(Some(session));
  }

  pub fn sign_out(&self) {
    if let Some(path) = &self.persist_to {
      if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
          warn!(target: "ecoquest", path = %path.display(), error = %e, "Could not remove session file");
        }
      }
    }
    self.tx.send_replace(None);
  }

  pub fn reader(&self) -> SessionReader {
    SessionReader { rx: self.tx.subscribe() }
  }
}

impl SessionReader {
  pub fn current(&self) -> Option<Session> {
    self.rx.borrow().clone()
  }

  pub fn is_signed_in(&self) -> bool {
    self.rx.borrow().is_some()
  }

  /// Current session, or `NotSignedIn`.
  pub fn require(&self) -> Result<Session, BackendError> {
    self.current().ok_or(BackendError::NotSignedIn)
  }

  pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
    self.rx.clone()
  }
}
