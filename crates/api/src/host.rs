//! The reqwest-backed host client.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::client::ServerClient;
use crate::settings::{
    ApplicationSettings, PythonInfo, SchedulerSettings, ServerSettings, User,
};
use crate::types::{BundleId, ContentId, ContentSettings, Task, TaskId};
use crate::ApiError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for one host, authenticated with an API key.
pub struct HostClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ContentCreated {
    guid: ContentId,
}

#[derive(Deserialize)]
struct BundleCreated {
    id: BundleId,
}

#[derive(Deserialize)]
struct TaskStarted {
    task_id: TaskId,
}

impl HostClient {
    /// Creates a client for `base_url` (no trailing slash) with the given
    /// API key and per-request timeout.
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Key {api_key}"))
            .map_err(|_| ApiError::AuthenticationFailed)?;
        headers.insert(AUTHORIZATION, value);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The dashboard page for a content item, for linking users to
    /// partially-created deployments.
    pub fn dashboard_url(&self, id: &ContentId) -> String {
        format!("{}/dashboard/content/{id}", self.base_url)
    }

    /// The directly-served content URL.
    pub fn direct_url(&self, id: &ContentId) -> String {
        format!("{}/content/{id}", self.base_url)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn check(&self, resp: Response) -> Result<Response, ApiError> {
        let url = resp.url().to_string();
        match resp.status() {
            StatusCode::UNAUTHORIZED => Err(ApiError::AuthenticationFailed),
            StatusCode::FORBIDDEN => Err(ApiError::PermissionDenied { url }),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound { url }),
            status if status.is_success() => Ok(resp),
            status => Err(ApiError::Server {
                status: status.as_u16(),
                url,
            }),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        debug!(path, "GET");
        let resp = self.http.get(self.url(path)).send().await?;
        Ok(self.check(resp)?.json().await?)
    }
}

impl ServerClient for HostClient {
    async fn test_authentication(&self) -> Result<User, ApiError> {
        self.get_json("/api/v1/user").await
    }

    async fn server_settings(&self) -> Result<ServerSettings, ApiError> {
        self.get_json("/api/v1/server_settings").await
    }

    async fn application_settings(&self) -> Result<ApplicationSettings, ApiError> {
        self.get_json("/api/v1/server_settings/applications").await
    }

    async fn scheduler_settings(&self, app_mode: &str) -> Result<SchedulerSettings, ApiError> {
        self.get_json(&format!("/api/v1/server_settings/scheduler/{app_mode}"))
            .await
    }

    async fn python_info(&self) -> Result<PythonInfo, ApiError> {
        self.get_json("/api/v1/server_settings/python").await
    }

    async fn create_content(&self, settings: &ContentSettings) -> Result<ContentId, ApiError> {
        debug!("creating content item");
        let resp = self
            .http
            .post(self.url("/api/v1/content"))
            .json(settings)
            .send()
            .await?;
        let created: ContentCreated = self.check(resp)?.json().await?;
        Ok(created.guid)
    }

    async fn update_content(
        &self,
        id: &ContentId,
        settings: &ContentSettings,
    ) -> Result<(), ApiError> {
        debug!(content_id = %id, "updating content item");
        let resp = self
            .http
            .patch(self.url(&format!("/api/v1/content/{id}")))
            .json(settings)
            .send()
            .await?;
        self.check(resp)?;
        Ok(())
    }

    async fn set_environment(
        &self,
        id: &ContentId,
        env: &BTreeMap<String, String>,
    ) -> Result<(), ApiError> {
        let resp = self
            .http
            .put(self.url(&format!("/api/v1/content/{id}/environment")))
            .json(env)
            .send()
            .await?;
        self.check(resp)?;
        Ok(())
    }

    async fn upload_bundle(
        &self,
        id: &ContentId,
        bundle_path: &Path,
    ) -> Result<BundleId, ApiError> {
        debug!(content_id = %id, bundle = %bundle_path.display(), "uploading bundle");
        let file = tokio::fs::File::open(bundle_path).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let resp = self
            .http
            .post(self.url(&format!("/api/v1/content/{id}/bundles")))
            .header(reqwest::header::CONTENT_TYPE, "application/gzip")
            .body(body)
            .send()
            .await?;
        let created: BundleCreated = self.check(resp)?.json().await?;
        Ok(created.id)
    }

    async fn deploy_bundle(
        &self,
        id: &ContentId,
        bundle: &BundleId,
    ) -> Result<TaskId, ApiError> {
        debug!(content_id = %id, bundle_id = %bundle, "deploying bundle");
        let resp = self
            .http
            .post(self.url(&format!("/api/v1/content/{id}/deploy")))
            .json(&serde_json::json!({"bundle_id": bundle}))
            .send()
            .await?;
        let started: TaskStarted = self.check(resp)?.json().await?;
        Ok(started.task_id)
    }

    async fn get_task(&self, task: &TaskId, first: i64) -> Result<Task, ApiError> {
        self.get_json(&format!("/api/v1/tasks/{task}?first={first}"))
            .await
    }

    async fn validate_deployment(&self, id: &ContentId) -> Result<(), ApiError> {
        debug!(content_id = %id, "validating deployed content");
        let resp = self.http.get(self.direct_url(id)).send().await?;
        self.check(resp)?;
        Ok(())
    }
}
