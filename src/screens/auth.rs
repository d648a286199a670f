use serde::Serialize;
use tracing::{instrument, warn};

use crate::repo::{AuthRepository, ProfileRepository};
use crate::supabase::BackendError;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct LoginOutcome {
  pub user_id: String,
  /// `false` sends the user to profile completion first.
  pub profile_complete: bool,
}

/// Login and sign-up forms.
pub struct AuthScreen {
  auth: AuthRepository,
  profiles: ProfileRepository,
}

impl AuthScreen {
  pub fn new(auth: AuthRepository, profiles: ProfileRepository) -> Self {
    Self { auth, profiles }
  }

  pub async fn sign_up(&self, email: &str, password: &str) -> Result<(), BackendError> {
    self.auth.sign_up(email.trim(), password).await
  }

  /// Sign in, then check whether the profile exists. A failed check counts as incomplete.
  #[instrument(target = "ecoquest", level = "info", skip(self, password))]
  pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, BackendError> {
    let session = self.auth.login(email.trim(), password).await?;
    let profile_complete = match self.profiles.has_profile().await {
      Ok(exists) => exists,
      Err(e) => {
        warn!(target: "ecoquest", error = %e, "Profile check failed; treating profile as incomplete");
        false
      }
    };
    Ok(LoginOutcome { user_id: session.user_id, profile_complete })
  }

  pub async fn logout(&self) {
    self.auth.logout().await;
  }

  /// Keep the access token usable; failures are left for the request itself to surface.
  pub async fn keep_fresh(&self) {
    if let Err(e) = self.auth.refresh_if_expiring().await {
      warn!(target: "ecoquest", error = %e, "Session refresh failed");
    }
  }
}
