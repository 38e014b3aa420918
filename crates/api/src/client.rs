//! The host API seam.

use std::collections::BTreeMap;
use std::path::Path;

use crate::settings::{
    ApplicationSettings, PythonInfo, SchedulerSettings, ServerSettings, User,
};
use crate::types::{BundleId, ContentId, ContentSettings, Task, TaskId};
use crate::ApiError;

/// Everything the publish pipeline needs from the host's API. The real
/// implementation is [`HostClient`](crate::HostClient); tests substitute
/// recording mocks.
pub trait ServerClient: Send + Sync {
    /// Verifies the stored credential and returns the authenticated user.
    fn test_authentication(&self) -> impl Future<Output = Result<User, ApiError>> + Send;

    fn server_settings(&self) -> impl Future<Output = Result<ServerSettings, ApiError>> + Send;

    fn application_settings(
        &self,
    ) -> impl Future<Output = Result<ApplicationSettings, ApiError>> + Send;

    /// Scheduler limits scoped to one app mode. Never called for static
    /// content; the host errors on that query.
    fn scheduler_settings(
        &self,
        app_mode: &str,
    ) -> impl Future<Output = Result<SchedulerSettings, ApiError>> + Send;

    fn python_info(&self) -> impl Future<Output = Result<PythonInfo, ApiError>> + Send;

    /// Creates a new content item and returns its id.
    fn create_content(
        &self,
        settings: &ContentSettings,
    ) -> impl Future<Output = Result<ContentId, ApiError>> + Send;

    /// Updates an existing content item's settings.
    fn update_content(
        &self,
        id: &ContentId,
        settings: &ContentSettings,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Replaces the content item's environment variables.
    fn set_environment(
        &self,
        id: &ContentId,
        env: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Streams a bundle archive to the host and returns its bundle id.
    fn upload_bundle(
        &self,
        id: &ContentId,
        bundle_path: &Path,
    ) -> impl Future<Output = Result<BundleId, ApiError>> + Send;

    /// Starts deployment of an uploaded bundle; returns the async task.
    fn deploy_bundle(
        &self,
        id: &ContentId,
        bundle: &BundleId,
    ) -> impl Future<Output = Result<TaskId, ApiError>> + Send;

    /// Polls a task. `first` is the index of the first output line the
    /// caller hasn't seen yet.
    fn get_task(
        &self,
        task: &TaskId,
        first: i64,
    ) -> impl Future<Output = Result<Task, ApiError>> + Send;

    /// Fetches the deployed content once to confirm it serves.
    fn validate_deployment(
        &self,
        id: &ContentId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}
