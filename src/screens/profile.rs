use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, instrument};

use crate::domain::Profile;
use crate::repo::ProfileRepository;
use crate::supabase::BackendError;

#[derive(Clone, Debug, Serialize)]
pub struct PictureUpdate {
  pub url: String,
  pub profile: Option<Profile>,
}

pub struct ProfileScreen {
  repo: ProfileRepository,
}

impl ProfileScreen {
  pub fn new(repo: ProfileRepository) -> Self {
    Self { repo }
  }

  pub async fn load(&self) -> Result<Profile, BackendError> {
    self.repo.profile().await
  }

  /// Upload, then re-read the profile so the caller sees the new picture reference.
  #[instrument(target = "ecoquest", level = "info", skip(self, bytes))]
  pub async fn change_picture(&self, bytes: Vec<u8>) -> Result<PictureUpdate, BackendError> {
    let url = self.repo.upload_picture(bytes).await?;
    let profile = match self.repo.profile().await {
      Ok(p) => Some(p),
      Err(e) => {
        error!(target: "ecoquest", error = %e, "Picture uploaded but profile reload failed");
        None
      }
    };
    Ok(PictureUpdate { url, profile })
  }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProfileForm {
  pub username: String,
  #[serde(default)]
  pub first_name: String,
  #[serde(default)]
  pub last_name: String,
}

#[derive(Debug, Error)]
pub enum ProfileFormError {
  #[error("Username is required")]
  MissingUsername,
  #[error("Username is not available")]
  UsernameTaken,
  #[error(transparent)]
  Backend(#[from] BackendError),
}

/// First-time profile completion and later edits.
pub struct ProfileFormScreen {
  repo: ProfileRepository,
}

impl ProfileFormScreen {
  pub fn new(repo: ProfileRepository) -> Self {
    Self { repo }
  }

  /// `None` for a blank username; nothing is asked of the backend then.
  pub async fn availability(&self, username: &str) -> Result<Option<bool>, BackendError> {
    let username = username.trim();
    if username.is_empty() {
      return Ok(None);
    }
    self.repo.is_username_available(username).await.map(Some)
  }

  #[instrument(target = "ecoquest", level = "info", skip(self))]
  pub async fn complete(&self, form: &ProfileForm) -> Result<(), ProfileFormError> {
    match self.availability(&form.username).await? {
      None => Err(ProfileFormError::MissingUsername),
      Some(false) => Err(ProfileFormError::UsernameTaken),
      Some(true) => {
        self.repo
          .save_completion(form.username.trim(), &form.first_name, &form.last_name, None)
          .await?;
        Ok(())
      }
    }
  }

  #[instrument(target = "ecoquest", level = "info", skip(self))]
  pub async fn update(&self, form: &ProfileForm) -> Result<(), ProfileFormError> {
    let username = form.username.trim();
    if username.is_empty() {
      return Err(ProfileFormError::MissingUsername);
    }
    self.repo.update(username, &form.first_name, &form.last_name).await?;
    Ok(())
  }
}
