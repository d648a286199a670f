use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::session::{Session, SessionWriter};
use crate::supabase::{BackendError, SupabaseClient};

/// Tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Email/password auth. Sole owner of the session writer.
pub struct AuthRepository {
  backend: SupabaseClient,
  session: SessionWriter,
  /// Refresh tokens are single use; concurrent refreshes would revoke each other.
  refreshing: Mutex<()>,
}

impl AuthRepository {
  pub fn new(backend: SupabaseClient, session: SessionWriter) -> Self {
    Self { backend, session, refreshing: Mutex::new(()) }
  }

  /// Refresh the access token if it has expired or is about to.
  ///
  /// Returns whether a refresh happened. A refresh token the backend rejects ends the
  /// session; a transport failure leaves it as it was.
  #[instrument(target = "backend", level = "debug", skip(self))]
  pub async fn refresh_if_expiring(&self) -> Result<bool, BackendError> {
    let _guard = self.refreshing.lock().await;
    let Some(current) = self.session.reader().current() else {
      return Ok(false);
    };
    if current.refresh_token.is_none() || !current.expires_within(Utc::now(), Duration::seconds(REFRESH_MARGIN_SECS)) {
      return Ok(false);
    }
    match self.backend.refresh(&current).await {
      Ok(fresh) => {
        info!(target: "backend", user_id = %fresh.user_id, "Access token refreshed");
        self.session.sign_in(fresh);
        Ok(true)
      }
      Err(e @ BackendError::Status { status: 400 | 401 | 403, .. }) => {
        warn!(target: "backend", error = %e, "Refresh token rejected; signing out");
        self.session.sign_out();
        Err(e)
      }
      Err(e) => Err(e),
    }
  }

  #[instrument(target = "backend", level = "info", skip(self, password))]
  pub async fn sign_up(&self, email: &str, password: &str) -> Result<(), BackendError> {
    self.backend.sign_up(email, password).await
  }

  #[instrument(target = "backend", level = "info", skip(self, password))]
  pub async fn login(&self, email: &str, password: &str) -> Result<Session, BackendError> {
    let session = self.backend.sign_in(email, password).await?;
    info!(target: "backend", user_id = %session.user_id, "Signed in");
    self.session.sign_in(session.clone());
    Ok(session)
  }

  /// Remote sign-out is best effort; the local session is always cleared.
  #[instrument(target = "backend", level = "info", skip(self))]
  pub async fn logout(&self) {
    if let Some(current) = self.session.reader().current() {
      if let Err(e) = self.backend.sign_out(&current).await {
        warn!(target: "backend", error = %e, "Remote sign-out failed; clearing local session anyway");
      }
    }
    self.session.sign_out();
  }
}
