//! HTTP-facing error type. Everything a handler can fail with funnels into `ApiError`,
//! which renders as a status code plus a plain-text message for inline display.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::warn;

use crate::flow::FlowError;
use crate::image::ImageError;
use crate::screens::profile::ProfileFormError;
use crate::supabase::BackendError;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("Malformed payload: {0}")]
  MalformedPayload(String),
  #[error("Unknown mission: {0}")]
  UnknownMission(i64),
  #[error("Unknown attempt")]
  UnknownAttempt,
  #[error(transparent)]
  Flow(#[from] FlowError),
  #[error(transparent)]
  Backend(#[from] BackendError),
  #[error(transparent)]
  ProfileForm(#[from] ProfileFormError),
  #[error("Could not store evidence: {0}")]
  Evidence(#[from] ImageError),
}

fn backend_status(e: &BackendError) -> StatusCode {
  match e {
    BackendError::NotSignedIn => StatusCode::UNAUTHORIZED,
    BackendError::Status { status: 401 | 403, .. } => StatusCode::UNAUTHORIZED,
    BackendError::Status { status: 400 | 409 | 422, .. } => StatusCode::BAD_REQUEST,
    _ => StatusCode::BAD_GATEWAY,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
      ApiError::UnknownMission(_) | ApiError::UnknownAttempt => StatusCode::NOT_FOUND,
      ApiError::Flow(FlowError::Quiz(_)) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::Flow(_) => StatusCode::CONFLICT,
      ApiError::Backend(e) => backend_status(e),
      ApiError::ProfileForm(ProfileFormError::MissingUsername) => StatusCode::BAD_REQUEST,
      ApiError::ProfileForm(ProfileFormError::UsernameTaken) => StatusCode::CONFLICT,
      ApiError::ProfileForm(ProfileFormError::Backend(e)) => backend_status(e),
      ApiError::Evidence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
      warn!(target: "ecoquest", %status, error = %self, "Request failed");
    }
    (status, self.to_string()).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::quiz::QuizError;

  #[test]
  fn status_mapping() {
    let s = |e: ApiError| e.into_response().status();
    assert_eq!(s(ApiError::Backend(BackendError::NotSignedIn)), StatusCode::UNAUTHORIZED);
    assert_eq!(s(ApiError::Backend(BackendError::Decode("x".into()))), StatusCode::BAD_GATEWAY);
    assert_eq!(s(ApiError::Flow(FlowError::Quiz(QuizError::Empty))), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(s(ApiError::Flow(FlowError::WrongRequirement("quiz"))), StatusCode::CONFLICT);
    assert_eq!(s(ApiError::ProfileForm(ProfileFormError::UsernameTaken)), StatusCode::CONFLICT);
    assert_eq!(s(ApiError::UnknownAttempt), StatusCode::NOT_FOUND);
  }
}
