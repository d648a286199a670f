use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument};

use crate::domain::Profile;
use crate::session::SessionReader;
use crate::supabase::{BackendError, SupabaseClient};

#[derive(Serialize)]
struct NewProfile<'a> {
  user_id: &'a str,
  username: &'a str,
  first_name: &'a str,
  last_name: &'a str,
  profile_picture: Option<&'a str>,
}

#[derive(Clone)]
pub struct ProfileRepository {
  backend: SupabaseClient,
  session: SessionReader,
  bucket: String,
}

impl ProfileRepository {
  pub fn new(backend: SupabaseClient, session: SessionReader, bucket: impl Into<String>) -> Self {
    Self { backend, session, bucket: bucket.into() }
  }

  async fn fetch(&self) -> Result<Option<Profile>, BackendError> {
    let s = self.session.require()?;
    let rows: Vec<Profile> = self.backend.select_eq(&s, "profiles", &[("user_id", s.user_id.as_str())]).await?;
    Ok(rows.into_iter().next())
  }

  /// Whether the signed-in user already completed their profile.
  #[instrument(target = "backend", level = "debug", skip(self))]
  pub async fn has_profile(&self) -> Result<bool, BackendError> {
    Ok(self.fetch().await?.is_some())
  }

  #[instrument(target = "backend", level = "debug", skip(self))]
  pub async fn profile(&self) -> Result<Profile, BackendError> {
    self.fetch().await?.ok_or_else(|| BackendError::Decode("no profile row for the signed-in user".into()))
  }

  #[instrument(target = "backend", level = "info", skip(self))]
  pub async fn save_completion(
    &self,
    username: &str,
    first_name: &str,
    last_name: &str,
    profile_picture: Option<&str>,
  ) -> Result<(), BackendError> {
    let s = self.session.require()?;
    let row = NewProfile { user_id: &s.user_id, username, first_name, last_name, profile_picture };
    self.backend.insert(&s, "profiles", &row).await
  }

  #[instrument(target = "backend", level = "info", skip(self))]
  pub async fn update(&self, username: &str, first_name: &str, last_name: &str) -> Result<(), BackendError> {
    let s = self.session.require()?;
    self.backend
      .rpc_unit(&s, "update_profile_info", json!({
        "p_user_id": s.user_id,
        "p_username": username,
        "p_first_name": first_name,
        "p_last_name": last_name,
      }))
      .await
  }

  #[instrument(target = "backend", level = "debug", skip(self))]
  pub async fn is_username_available(&self, username: &str) -> Result<bool, BackendError> {
    let s = self.session.require()?;
    self.backend.rpc(&s, "check_username_available", json!({ "p_username": username })).await
  }

  /// Replace the user's profile picture.
  ///
  /// Everything already stored under `{user_id}/` is deleted first, then the new image is
  /// uploaded as `{user_id}/{millis}.png` and recorded on the profile. Returns its public URL.
  #[instrument(target = "backend", level = "info", skip(self, bytes), fields(size = bytes.len()))]
  pub async fn upload_picture(&self, bytes: Vec<u8>) -> Result<String, BackendError> {
    let s = self.session.require()?;
    let prefix = format!("{}/", s.user_id);
    let new_path = format!("{}{}.png", prefix, chrono::Utc::now().timestamp_millis());

    let stale: Vec<String> = self
      .backend
      .storage_list(&s, &self.bucket, &prefix)
      .await?
      .into_iter()
      .map(|o| format!("{}{}", prefix, o.name))
      .filter(|p| *p != new_path)
      .collect();
    if !stale.is_empty() {
      info!(target: "backend", count = stale.len(), "Deleting previous profile pictures");
      self.backend.storage_delete(&s, &self.bucket, &stale).await?;
    }

    self.backend.storage_upload(&s, &self.bucket, &new_path, bytes, "image/png").await?;
    self.backend
      .rpc_unit(&s, "add_profile_pic", json!({ "p_user_id": s.user_id, "pro_pic": new_path }))
      .await?;
    Ok(self.backend.public_object_url(&self.bucket, &new_path))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::session::session_channel;
  use crate::supabase::tests::{client_for, session};
  use wiremock::matchers::{body_json, method, path, path_regex};
  use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

  fn repo(server: &MockServer) -> ProfileRepository {
    let (writer, reader) = session_channel(None);
    writer.sign_in(session());
    ProfileRepository::new(client_for(server), reader, "profile_picture")
  }

  /// Echoes the last recorded picture path back as the profile row.
  struct ProfileEcho(std::sync::Arc<std::sync::Mutex<Option<String>>>);
  impl Respond for ProfileEcho {
    fn respond(&self, _: &Request) -> ResponseTemplate {
      let pic = self.0.lock().unwrap().clone();
      ResponseTemplate::new(200).set_body_json(json!([{
        "user_id": session().user_id, "username": "ada", "profile_pic": pic,
        "daily_points": 1, "weekly_points": 2, "monthly_points": 3, "points": 4
      }]))
    }
  }

  struct RecordPic(std::sync::Arc<std::sync::Mutex<Option<String>>>);
  impl Respond for RecordPic {
    fn respond(&self, req: &Request) -> ResponseTemplate {
      let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
      *self.0.lock().unwrap() = body["pro_pic"].as_str().map(str::to_string);
      ResponseTemplate::new(204)
    }
  }

  #[tokio::test]
  async fn upload_replaces_old_pictures_and_profile_points_at_new_path() {
    let server = MockServer::start().await;
    let uid = session().user_id;
    let recorded = std::sync::Arc::new(std::sync::Mutex::new(None));

    Mock::given(method("POST"))
      .and(path("/storage/v1/object/list/profile_picture"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "name": "1700000000000.png" }])))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("DELETE"))
      .and(path("/storage/v1/object/profile_picture"))
      .and(body_json(json!({ "prefixes": [format!("{uid}/1700000000000.png")] })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path_regex(format!(r"^/storage/v1/object/profile_picture/{uid}/\d+\.png$")))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "ok" })))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/rest/v1/rpc/add_profile_pic"))
      .respond_with(RecordPic(recorded.clone()))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/rest/v1/profiles"))
      .respond_with(ProfileEcho(recorded.clone()))
      .mount(&server)
      .await;

    let repo = repo(&server);
    let url = repo.upload_picture(b"png".to_vec()).await.unwrap();

    let profile = repo.profile().await.unwrap();
    let pic = profile.profile_pic.expect("picture recorded");
    assert!(pic.starts_with(&format!("{uid}/")));
    assert_eq!(url, format!("{}/storage/v1/object/public/profile_picture/{}", server.uri(), pic));

    let order: Vec<String> = server
      .received_requests()
      .await
      .unwrap()
      .iter()
      .map(|r| format!("{} {}", r.method, r.url.path()))
      .collect();
    let delete_at = order.iter().position(|r| r.starts_with("DELETE")).unwrap();
    let upload_at = order.iter().position(|r| r.contains(&format!("profile_picture/{uid}/"))).unwrap();
    assert!(delete_at < upload_at, "old pictures must go first: {order:?}");
  }

  #[tokio::test]
  async fn missing_profile_row_means_incomplete_profile() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/rest/v1/profiles"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
      .mount(&server)
      .await;

    let repo = repo(&server);
    assert!(!repo.has_profile().await.unwrap());
    assert!(repo.profile().await.is_err());
  }
}
