//! The staged publish pipeline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use podium_api::{
    check_capabilities, ApiError, BundleId, ContentId, ContentSettings, ServerClient, TaskId, User,
};
use podium_bundle::Bundler;
use podium_config::Config;
use podium_events::{Coded, Emitter, Event, Operation, Phase};

use crate::record::{DeploymentRecord, RecordedError};
use crate::registry::ActiveDeployments;
use crate::PublishError;

const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The dashboard page for a content item on the given host.
pub fn dashboard_url(server_url: &str, id: &ContentId) -> String {
    format!("{}/dashboard/content/{id}", server_url.trim_end_matches('/'))
}

/// The directly-served URL of a content item.
pub fn direct_url(server_url: &str, id: &ContentId) -> String {
    format!("{}/content/{id}", server_url.trim_end_matches('/'))
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishResult {
    pub content_id: ContentId,
    pub dashboard_url: String,
    pub direct_url: String,
}

/// Emits the per-stage start/success/failure envelope around each stage
/// future, keeping stage logic free of event plumbing.
#[derive(Clone)]
struct EventScope {
    emitter: Emitter,
    local_id: String,
}

impl EventScope {
    fn emit(&self, event: Event) {
        self.emitter.emit(event);
    }

    fn log(&self, op: Operation, message: &str) {
        self.emit(Event::new(
            &self.local_id,
            op,
            Phase::Log,
            podium_events::codes::NO_ERROR,
            json!({"message": message}),
        ));
    }

    async fn step<T>(
        &self,
        op: Operation,
        fut: impl Future<Output = Result<T, PublishError>>,
        success_data: impl FnOnce(&T) -> serde_json::Value,
    ) -> Result<T, PublishError> {
        self.emit(Event::start(&self.local_id, op));
        match fut.await {
            Ok(value) => {
                self.emit(Event::success(&self.local_id, op, success_data(&value)));
                Ok(value)
            }
            Err(err) => {
                self.emit(Event::failure(
                    &self.local_id,
                    op,
                    err.code(),
                    json!({"message": err.to_string(), "details": err.details()}),
                ));
                Err(err)
            }
        }
    }
}

/// Drives one publish of one project directory to one host.
pub struct Publisher {
    dir: PathBuf,
    save_name: String,
    server_url: String,
    config: Config,
    target: Option<DeploymentRecord>,
    emitter: Emitter,
    registry: Arc<ActiveDeployments>,
    local_id: String,
    wait_timeout: Duration,
    poll_interval: Duration,
}

impl Publisher {
    pub fn new(
        dir: impl Into<PathBuf>,
        save_name: impl Into<String>,
        server_url: impl Into<String>,
        config: Config,
    ) -> Self {
        Self {
            dir: dir.into(),
            save_name: save_name.into(),
            server_url: server_url.into(),
            config,
            target: None,
            emitter: Emitter::new(),
            registry: ActiveDeployments::shared(),
            local_id: Uuid::new_v4().to_string(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Loads the saved deployment record for this name, if one exists,
    /// making this publish a re-deploy of the recorded content item.
    pub fn load_target(mut self) -> Result<Self, PublishError> {
        let path = DeploymentRecord::path(&self.dir, &self.save_name);
        if path.is_file() {
            self.target = Some(DeploymentRecord::from_file(&path)?);
        }
        Ok(self)
    }

    pub fn with_emitter(mut self, emitter: Emitter) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn with_registry(mut self, registry: Arc<ActiveDeployments>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.wait_timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    /// The emitter carrying this publisher's events; subscribe before
    /// calling [`publish`](Self::publish).
    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    /// Correlation id stamped on every event of this publish.
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    fn content_id(&self) -> Option<ContentId> {
        self.target.as_ref().and_then(|t| t.content_id.clone())
    }

    /// Runs the whole pipeline. Stops at the first failing stage,
    /// persists whatever record state exists, and emits both the stage
    /// failure and an overall publish failure.
    pub async fn publish<C: ServerClient>(
        &mut self,
        client: &C,
    ) -> Result<PublishResult, PublishError> {
        let registry = Arc::clone(&self.registry);
        let _guard = registry.begin(&self.save_name)?;

        let scope = EventScope {
            emitter: self.emitter.clone(),
            local_id: self.local_id.clone(),
        };
        scope.emit(Event::start(&self.local_id, Operation::Publish));
        info!(
            server = %self.server_url,
            dir = %self.dir.display(),
            save_name = %self.save_name,
            "starting deployment to server"
        );

        match self.run_stages(client, &scope).await {
            Ok(result) => {
                scope.emit(Event::success(
                    &self.local_id,
                    Operation::Publish,
                    json!({
                        "contentId": result.content_id,
                        "dashboardUrl": result.dashboard_url,
                        "directUrl": result.direct_url,
                        "saveName": self.save_name,
                    }),
                ));
                info!(
                    content_id = %result.content_id,
                    dashboard_url = %result.dashboard_url,
                    "deployment successful"
                );
                Ok(result)
            }
            Err(err) => {
                error!(error = %err, "publish failed");
                self.record_failure(&err);
                let mut data = json!({
                    "message": err.to_string(),
                    "details": err.details(),
                });
                if let Some(id) = self.content_id() {
                    // A partially-created item is still linkable.
                    data["dashboardUrl"] = json!(dashboard_url(&self.server_url, &id));
                    data["directUrl"] = json!(direct_url(&self.server_url, &id));
                }
                scope.emit(Event::failure(
                    &self.local_id,
                    Operation::Publish,
                    err.code(),
                    data,
                ));
                Err(err)
            }
        }
    }

    async fn run_stages<C: ServerClient>(
        &mut self,
        client: &C,
        scope: &EventScope,
    ) -> Result<PublishResult, PublishError> {
        scope
            .step(
                Operation::PublishCheckCapabilities,
                self.preflight(client),
                |user| json!({"username": user.username}),
            )
            .await?;

        let settings = ContentSettings::from_config(&self.config);
        let content_id = match self.content_id() {
            Some(id) => {
                scope
                    .step(
                        Operation::PublishUpdateDeployment,
                        async {
                            match client.update_content(&id, &settings).await {
                                Ok(()) => Ok(id.clone()),
                                Err(ApiError::NotFound { .. }) => {
                                    Err(PublishError::DeploymentNotFound {
                                        content_id: id.clone(),
                                    })
                                }
                                Err(err) => Err(err.into()),
                            }
                        },
                        |id| json!({"contentId": id, "saveName": self.save_name}),
                    )
                    .await?
            }
            None => {
                scope
                    .step(
                        Operation::PublishCreateDeployment,
                        async { Ok(client.create_content(&settings).await?) },
                        |id| json!({"contentId": id, "saveName": self.save_name}),
                    )
                    .await?
            }
        };
        // Record the id before bundling so a later failure still leaves a
        // discoverable partial deployment.
        self.assign_content_id(content_id.clone())?;

        let (bundle_file, manifest) = scope
            .step(
                Operation::PublishCreateBundle,
                async {
                    let bundler = Bundler::from_directory(&self.dir, &[])?
                        .with_app_mode(self.config.content_type.app_mode());
                    let file = tempfile::NamedTempFile::new()?;
                    let manifest = bundler.create_bundle(file.reopen()?)?;
                    Ok::<_, PublishError>((file, manifest))
                },
                |(file, _)| json!({"filename": file.path()}),
            )
            .await?;

        let bundle_id = scope
            .step(
                Operation::PublishUploadBundle,
                async { Ok(client.upload_bundle(&content_id, bundle_file.path()).await?) },
                |id| json!({"bundleId": id}),
            )
            .await?;
        self.record_upload(bundle_id.clone(), manifest.filenames())?;

        scope
            .step(
                Operation::PublishUpdateContentSettings,
                async { Ok(client.update_content(&content_id, &settings).await?) },
                |_| serde_json::Value::Null,
            )
            .await?;

        // An empty environment section means "leave the server's values
        // alone", not "clear them".
        if !self.config.environment.is_empty() {
            let env = self.config.environment.clone();
            scope
                .step(
                    Operation::PublishSetEnvironment,
                    async { Ok(client.set_environment(&content_id, &env).await?) },
                    |_| json!({"count": env.len()}),
                )
                .await?;
        }

        let task_id = scope
            .step(
                Operation::PublishDeployBundle,
                async { Ok(client.deploy_bundle(&content_id, &bundle_id).await?) },
                |task| json!({"taskId": task}),
            )
            .await?;

        scope
            .step(
                Operation::PublishWaitForTask,
                self.wait_for_task(client, &task_id, scope.clone()),
                |_| serde_json::Value::Null,
            )
            .await?;

        if self.config.validate {
            scope
                .step(
                    Operation::PublishValidateDeployment,
                    async { Ok(client.validate_deployment(&content_id).await?) },
                    |_| serde_json::Value::Null,
                )
                .await?;
        }

        self.record_success()?;
        Ok(PublishResult {
            dashboard_url: dashboard_url(&self.server_url, &content_id),
            direct_url: direct_url(&self.server_url, &content_id),
            content_id,
        })
    }

    /// Authentication test, content-type drift check, and capability
    /// validation. Nothing remote is mutated until this passes.
    async fn preflight<C: ServerClient>(&self, client: &C) -> Result<User, PublishError> {
        let user = client.test_authentication().await?;
        info!(username = %user.username, email = %user.email, "publishing with credentials");

        if let Some(previous) = self.target.as_ref().and_then(|t| t.config.as_ref()) {
            if previous.content_type != self.config.content_type {
                return Err(PublishError::TypeChanged {
                    previous: previous.content_type.app_mode().to_string(),
                    current: self.config.content_type.app_mode().to_string(),
                });
            }
        }

        check_capabilities(client, &self.dir, &self.config).await?;
        Ok(user)
    }

    /// Polls the deployment task until it finishes, forwarding its output
    /// lines as log events. Bounded by the configured wait timeout.
    async fn wait_for_task<C: ServerClient>(
        &self,
        client: &C,
        task_id: &TaskId,
        scope: EventScope,
    ) -> Result<(), PublishError> {
        let deadline = Instant::now() + self.wait_timeout;
        let mut first = 0i64;
        loop {
            let task = client.get_task(task_id, first).await?;
            for line in &task.output {
                scope.log(Operation::PublishWaitForTask, line);
            }
            first = task.last;
            if task.finished {
                if !task.error.is_empty() {
                    return Err(PublishError::TaskFailed {
                        task_id: task_id.clone(),
                        message: task.error,
                    });
                }
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(PublishError::TaskTimedOut {
                    task_id: task_id.clone(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn assign_content_id(&mut self, id: ContentId) -> Result<(), PublishError> {
        let record = self
            .target
            .get_or_insert_with(|| DeploymentRecord::new(self.server_url.clone()));
        record.server_url = self.server_url.clone();
        record.content_id = Some(id.clone());
        record.config = Some(self.config.clone());
        record.dashboard_url = dashboard_url(&self.server_url, &id);
        record.direct_url = direct_url(&self.server_url, &id);
        record.error = None;
        self.write_record()
    }

    fn record_upload(&mut self, bundle_id: BundleId, files: Vec<String>) -> Result<(), PublishError> {
        if let Some(record) = self.target.as_mut() {
            record.bundle_id = Some(bundle_id);
            record.files = files;
        }
        self.write_record()
    }

    fn record_success(&mut self) -> Result<(), PublishError> {
        if let Some(record) = self.target.as_mut() {
            record.deployed_at = Some(chrono::Utc::now());
            record.error = None;
        }
        self.write_record()
    }

    /// Persists the failure into the record, if one exists yet. Failing
    /// to write at this point is logged, not surfaced: the publish error
    /// itself matters more.
    fn record_failure(&mut self, err: &PublishError) {
        let Some(record) = self.target.as_mut() else {
            return;
        };
        record.error = Some(RecordedError {
            code: err.code().to_string(),
            message: err.to_string(),
            details: err.details(),
        });
        if let Err(write_err) = self.write_record() {
            warn!(error = %write_err, "couldn't persist failure to the deployment record");
        }
    }

    fn write_record(&self) -> Result<(), PublishError> {
        let Some(record) = &self.target else {
            return Ok(());
        };
        record.write_file(&DeploymentRecord::path(&self.dir, &self.save_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Read;
    use std::path::Path;
    use std::sync::Mutex;

    use podium_api::{
        ApplicationSettings, PythonInfo, SchedulerSettings, ServerSettings, Task,
    };
    use podium_config::ContentType;
    use podium_events::codes;
    use tempfile::TempDir;

    /// Records every API call; fails on demand at one named call.
    #[derive(Default)]
    struct MockClient {
        calls: Mutex<Vec<String>>,
        fail_at: Option<&'static str>,
        tasks: Mutex<Vec<Task>>,
        uploads: Mutex<Vec<Vec<u8>>>,
    }

    impl MockClient {
        fn new() -> Self {
            let client = Self::default();
            client.tasks.lock().unwrap().push(Task {
                id: "task-3".into(),
                finished: true,
                output: vec!["Building image".into(), "Launching".into()],
                last: 2,
                error: String::new(),
            });
            client
        }

        fn failing_at(stage: &'static str) -> Self {
            let mut client = Self::new();
            client.fail_at = Some(stage);
            client
        }

        fn record(&self, name: &str) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(name.to_string());
            if self.fail_at == Some(name) {
                return Err(ApiError::Server {
                    status: 500,
                    url: format!("https://host.example.com/{name}"),
                });
            }
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ServerClient for MockClient {
        async fn test_authentication(&self) -> Result<User, ApiError> {
            self.record("test_authentication")?;
            Ok(User {
                username: "pat".into(),
                email: "pat@example.com".into(),
                user_role: "publisher".into(),
            })
        }

        async fn server_settings(&self) -> Result<ServerSettings, ApiError> {
            self.record("server_settings")?;
            Ok(ServerSettings::default())
        }

        async fn application_settings(&self) -> Result<ApplicationSettings, ApiError> {
            self.record("application_settings")?;
            Ok(ApplicationSettings::default())
        }

        async fn scheduler_settings(&self, _app_mode: &str) -> Result<SchedulerSettings, ApiError> {
            self.record("scheduler_settings")?;
            Ok(SchedulerSettings::default())
        }

        async fn python_info(&self) -> Result<PythonInfo, ApiError> {
            self.record("python_info")?;
            Ok(PythonInfo::default())
        }

        async fn create_content(&self, _settings: &ContentSettings) -> Result<ContentId, ApiError> {
            self.record("create_content")?;
            Ok(ContentId::from("content-1"))
        }

        async fn update_content(
            &self,
            _id: &ContentId,
            _settings: &ContentSettings,
        ) -> Result<(), ApiError> {
            self.record("update_content")
        }

        async fn set_environment(
            &self,
            _id: &ContentId,
            _env: &BTreeMap<String, String>,
        ) -> Result<(), ApiError> {
            self.record("set_environment")
        }

        async fn upload_bundle(
            &self,
            _id: &ContentId,
            bundle_path: &Path,
        ) -> Result<BundleId, ApiError> {
            self.record("upload_bundle")?;
            let bytes = std::fs::read(bundle_path)?;
            self.uploads.lock().unwrap().push(bytes);
            Ok(BundleId::from("bundle-9"))
        }

        async fn deploy_bundle(
            &self,
            _id: &ContentId,
            _bundle: &BundleId,
        ) -> Result<TaskId, ApiError> {
            self.record("deploy_bundle")?;
            Ok(TaskId::from("task-3"))
        }

        async fn get_task(&self, _task: &TaskId, _first: i64) -> Result<Task, ApiError> {
            self.record("get_task")?;
            let mut tasks = self.tasks.lock().unwrap();
            if tasks.is_empty() {
                // Keep polling: not finished yet.
                return Ok(Task {
                    id: "task-3".into(),
                    ..Task::default()
                });
            }
            Ok(tasks.remove(0))
        }

        async fn validate_deployment(&self, _id: &ContentId) -> Result<(), ApiError> {
            self.record("validate_deployment")
        }
    }

    fn project_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html></html>\n").unwrap();
        dir
    }

    fn publisher(dir: &TempDir) -> Publisher {
        Publisher::new(
            dir.path(),
            "staging",
            "https://host.example.com",
            Config::new(ContentType::Html, "index.html"),
        )
        .with_registry(Arc::new(ActiveDeployments::new()))
    }

    fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    #[tokio::test]
    async fn first_publish_creates_content_before_upload() {
        let dir = project_dir();
        let client = MockClient::new();
        let mut publisher = publisher(&dir);
        let mut rx = publisher.emitter().subscribe();

        let result = publisher.publish(&client).await.unwrap();
        assert_eq!(result.content_id, ContentId::from("content-1"));
        assert_eq!(
            result.dashboard_url,
            "https://host.example.com/dashboard/content/content-1"
        );

        let calls = client.calls();
        let create = calls.iter().position(|c| c == "create_content").unwrap();
        let upload = calls.iter().position(|c| c == "upload_bundle").unwrap();
        let deploy = calls.iter().position(|c| c == "deploy_bundle").unwrap();
        let wait = calls.iter().position(|c| c == "get_task").unwrap();
        assert!(create < upload && upload < deploy && deploy < wait);
        assert!(!calls.contains(&"validate_deployment".to_string()));

        // The record persisted with the assigned id and bundle.
        let record =
            DeploymentRecord::from_file(&DeploymentRecord::path(dir.path(), "staging")).unwrap();
        assert_eq!(record.content_id, Some(ContentId::from("content-1")));
        assert_eq!(record.bundle_id, Some(BundleId::from("bundle-9")));
        assert!(record.files.contains(&"index.html".to_string()));
        assert!(record.deployed_at.is_some());
        assert!(record.error.is_none());

        // Overall start first, overall success last.
        let events = drain_events(&mut rx);
        assert_eq!(events.first().unwrap().type_tag(), "publish/start");
        assert_eq!(events.last().unwrap().type_tag(), "publish/success");
        assert!(events
            .iter()
            .any(|e| e.type_tag() == "publish/createDeployment/success"));
    }

    #[tokio::test]
    async fn uploaded_bundle_is_gzip_with_manifest() {
        let dir = project_dir();
        let client = MockClient::new();
        publisher(&dir).publish(&client).await.unwrap();

        let uploads = client.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        let bytes = &uploads[0];
        assert_eq!(&bytes[..2], &[0x1f, 0x8b], "gzip magic");

        let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(bytes.as_slice()));
        let mut names = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            names.push(entry.path().unwrap().to_string_lossy().into_owned());
            let mut sink = Vec::new();
            entry.read_to_end(&mut sink).unwrap();
        }
        assert!(names.contains(&"index.html".to_string()));
        assert_eq!(names.last().map(String::as_str), Some("manifest.json"));
    }

    #[tokio::test]
    async fn second_publish_updates_instead_of_creating() {
        let dir = project_dir();
        let client = MockClient::new();
        publisher(&dir).publish(&client).await.unwrap();

        let client = MockClient::new();
        let mut publisher = publisher(&dir).load_target().unwrap();
        let mut rx = publisher.emitter().subscribe();
        publisher.publish(&client).await.unwrap();

        let calls = client.calls();
        assert!(!calls.contains(&"create_content".to_string()));
        let update = calls.iter().position(|c| c == "update_content").unwrap();
        let upload = calls.iter().position(|c| c == "upload_bundle").unwrap();
        assert!(update < upload, "update path converges on the same stages");

        let events = drain_events(&mut rx);
        assert!(events
            .iter()
            .any(|e| e.type_tag() == "publish/updateDeployment/success"));
        assert!(!events
            .iter()
            .any(|e| e.operation == Operation::PublishCreateDeployment));
    }

    #[tokio::test]
    async fn update_of_vanished_content_maps_to_deployment_not_found() {
        let dir = project_dir();
        let client = MockClient::new();
        publisher(&dir).publish(&client).await.unwrap();

        struct NotFoundClient(MockClient);
        impl ServerClient for NotFoundClient {
            async fn test_authentication(&self) -> Result<User, ApiError> {
                self.0.test_authentication().await
            }
            async fn server_settings(&self) -> Result<ServerSettings, ApiError> {
                self.0.server_settings().await
            }
            async fn application_settings(&self) -> Result<ApplicationSettings, ApiError> {
                self.0.application_settings().await
            }
            async fn scheduler_settings(
                &self,
                app_mode: &str,
            ) -> Result<SchedulerSettings, ApiError> {
                self.0.scheduler_settings(app_mode).await
            }
            async fn python_info(&self) -> Result<PythonInfo, ApiError> {
                self.0.python_info().await
            }
            async fn create_content(
                &self,
                settings: &ContentSettings,
            ) -> Result<ContentId, ApiError> {
                self.0.create_content(settings).await
            }
            async fn update_content(
                &self,
                _id: &ContentId,
                _settings: &ContentSettings,
            ) -> Result<(), ApiError> {
                Err(ApiError::NotFound {
                    url: "https://host.example.com/api/v1/content/content-1".into(),
                })
            }
            async fn set_environment(
                &self,
                id: &ContentId,
                env: &BTreeMap<String, String>,
            ) -> Result<(), ApiError> {
                self.0.set_environment(id, env).await
            }
            async fn upload_bundle(
                &self,
                id: &ContentId,
                path: &Path,
            ) -> Result<BundleId, ApiError> {
                self.0.upload_bundle(id, path).await
            }
            async fn deploy_bundle(
                &self,
                id: &ContentId,
                bundle: &BundleId,
            ) -> Result<TaskId, ApiError> {
                self.0.deploy_bundle(id, bundle).await
            }
            async fn get_task(&self, task: &TaskId, first: i64) -> Result<Task, ApiError> {
                self.0.get_task(task, first).await
            }
            async fn validate_deployment(&self, id: &ContentId) -> Result<(), ApiError> {
                self.0.validate_deployment(id).await
            }
        }

        let client = NotFoundClient(MockClient::new());
        let mut publisher = publisher(&dir).load_target().unwrap();
        let err = publisher.publish(&client).await.unwrap_err();
        assert_eq!(err.code(), codes::DEPLOYMENT_NOT_FOUND);
    }

    #[tokio::test]
    async fn failure_stops_pipeline_and_persists_error() {
        let dir = project_dir();
        let client = MockClient::failing_at("deploy_bundle");
        let mut publisher = publisher(&dir);
        let mut rx = publisher.emitter().subscribe();

        let err = publisher.publish(&client).await.unwrap_err();
        assert_eq!(err.code(), codes::SERVER_ERROR);

        // Nothing ran past the failing stage.
        assert!(!client.calls().contains(&"get_task".to_string()));

        // The record keeps the partial deployment plus the error.
        let record =
            DeploymentRecord::from_file(&DeploymentRecord::path(dir.path(), "staging")).unwrap();
        assert_eq!(record.content_id, Some(ContentId::from("content-1")));
        let recorded = record.error.unwrap();
        assert_eq!(recorded.code, "serverError");
        assert!(record.deployed_at.is_none());

        // Stage failure and overall failure are distinct events, and the
        // overall failure links to the partially-created item.
        let events = drain_events(&mut rx);
        assert!(events
            .iter()
            .any(|e| e.type_tag() == "publish/deployBundle/failure/serverError"));
        let overall = events.last().unwrap();
        assert_eq!(overall.type_tag(), "publish/failure/serverError");
        assert_eq!(
            overall.data["dashboardUrl"],
            "https://host.example.com/dashboard/content/content-1"
        );
    }

    #[tokio::test]
    async fn preflight_failure_aborts_before_any_mutation() {
        let dir = project_dir();
        let client = MockClient::failing_at("test_authentication");
        let err = publisher(&dir).publish(&client).await.unwrap_err();
        assert_eq!(err.code(), codes::SERVER_ERROR);
        assert!(!client.calls().contains(&"create_content".to_string()));
        // No record was ever written.
        assert!(!DeploymentRecord::path(dir.path(), "staging").exists());
    }

    #[tokio::test]
    async fn type_change_since_last_deploy_is_a_conflict() {
        let dir = project_dir();
        let client = MockClient::new();
        publisher(&dir).publish(&client).await.unwrap();

        std::fs::write(dir.path().join("app.py"), "import streamlit as st\n").unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "streamlit==1.30.0\n").unwrap();
        let mut changed = Publisher::new(
            dir.path(),
            "staging",
            "https://host.example.com",
            Config::new(ContentType::PythonStreamlit, "app.py"),
        )
        .with_registry(Arc::new(ActiveDeployments::new()))
        .load_target()
        .unwrap();

        let err = changed.publish(&MockClient::new()).await.unwrap_err();
        assert_eq!(err.code(), codes::TYPE_CHANGED);
    }

    #[tokio::test]
    async fn concurrent_publish_to_same_name_is_rejected() {
        let dir = project_dir();
        let registry = Arc::new(ActiveDeployments::new());
        let _guard = registry.begin("staging").unwrap();

        let mut publisher = publisher(&dir).with_registry(Arc::clone(&registry));
        let err = publisher.publish(&MockClient::new()).await.unwrap_err();
        assert_eq!(err.code(), codes::DEPLOYMENT_IN_PROGRESS);
    }

    #[tokio::test]
    async fn failed_task_surfaces_server_message() {
        let dir = project_dir();
        let client = MockClient::new();
        client.tasks.lock().unwrap().clear();
        client.tasks.lock().unwrap().push(Task {
            id: "task-3".into(),
            finished: true,
            error: "image build failed".into(),
            ..Task::default()
        });

        let err = publisher(&dir).publish(&client).await.unwrap_err();
        assert_eq!(err.code(), codes::TASK_FAILED);
        assert!(err.to_string().contains("image build failed"));
    }

    #[tokio::test]
    async fn unfinished_task_times_out() {
        let dir = project_dir();
        let client = MockClient::new();
        client.tasks.lock().unwrap().clear();

        let mut publisher = publisher(&dir)
            .with_wait_timeout(Duration::from_millis(30), Duration::from_millis(5));
        let err = publisher.publish(&client).await.unwrap_err();
        assert_eq!(err.code(), codes::TASK_TIMED_OUT);
    }

    #[tokio::test]
    async fn validate_stage_runs_when_configured() {
        let dir = project_dir();
        let client = MockClient::new();
        let mut cfg = Config::new(ContentType::Html, "index.html");
        cfg.validate = true;
        let mut publisher = Publisher::new(
            dir.path(),
            "staging",
            "https://host.example.com",
            cfg,
        )
        .with_registry(Arc::new(ActiveDeployments::new()));

        publisher.publish(&client).await.unwrap();
        assert!(client.calls().contains(&"validate_deployment".to_string()));
    }

    #[tokio::test]
    async fn environment_variables_are_pushed_when_configured() {
        let dir = project_dir();
        let client = MockClient::new();
        let mut cfg = Config::new(ContentType::Html, "index.html");
        cfg.environment.insert("LOG_LEVEL".into(), "debug".into());
        let mut publisher = Publisher::new(
            dir.path(),
            "staging",
            "https://host.example.com",
            cfg,
        )
        .with_registry(Arc::new(ActiveDeployments::new()));

        publisher.publish(&client).await.unwrap();
        let calls = client.calls();
        let env = calls.iter().position(|c| c == "set_environment").unwrap();
        let deploy = calls.iter().position(|c| c == "deploy_bundle").unwrap();
        assert!(env < deploy);
    }

    #[tokio::test]
    async fn task_output_forwarded_as_log_events() {
        let dir = project_dir();
        let client = MockClient::new();
        let mut publisher = publisher(&dir);
        let mut rx = publisher.emitter().subscribe();
        publisher.publish(&client).await.unwrap();

        let events = drain_events(&mut rx);
        let logs: Vec<_> = events
            .iter()
            .filter(|e| e.phase == Phase::Log)
            .map(|e| e.data["message"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(logs, vec!["Building image", "Launching"]);
    }
}
