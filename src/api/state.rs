//! API server state

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::mode::{parse_flag, resolve_mode, ModeSettings, OperatingMode};
use crate::storage::{SamplesDir, StorageBackend};
use crate::streaming::RangeStreamer;
use crate::upload::UploadService;

/// Environment variable re-read per request when `mode.follow_env` is set.
pub const FORCE_TEST_MODE_ENV: &str = "FORCE_TEST_MODE";

/// Mode settings shared by all requests.
///
/// Handlers take a fresh snapshot per request, so changes made through the
/// handle (or through the environment when following it) apply to the very
/// next request.
pub struct SettingsHandle {
    current: RwLock<ModeSettings>,
    follow_env: bool,
}

impl SettingsHandle {
    pub fn new(settings: ModeSettings, follow_env: bool) -> Self {
        Self {
            current: RwLock::new(settings),
            follow_env,
        }
    }

    /// Settings as of now
    pub async fn snapshot(&self) -> ModeSettings {
        let mut settings = self.current.read().await.clone();
        if self.follow_env {
            if let Ok(value) = std::env::var(FORCE_TEST_MODE_ENV) {
                settings.force_test_mode = parse_flag(&value);
            }
        }
        settings
    }

    pub async fn set_force_test_mode(&self, force: bool) {
        self.current.write().await.force_test_mode = force;
    }
}

/// API server state
#[derive(Clone)]
pub struct AppState {
    /// Mode settings, snapshotted per request
    pub settings: Arc<SettingsHandle>,

    pub catalog: Catalog,
    pub streamer: RangeStreamer,
    pub uploads: UploadService,

    /// Origins allowed to call the JSON endpoints
    pub allowed_origins: Arc<Vec<String>>,
    /// Host suffixes that force `https` in generated URLs
    pub tunnel_suffixes: Arc<Vec<String>>,
    /// Host used when a request carries no `Host` header
    pub fallback_host: String,
    pub max_upload_bytes: u64,
    pub service_name: String,
}

impl AppState {
    /// Build state from configuration and an optional cloud object store.
    pub fn new(config: &AppConfig, store: Option<Arc<dyn StorageBackend>>) -> Self {
        let samples = SamplesDir::new(&config.storage.samples_dir);

        Self {
            settings: Arc::new(SettingsHandle::new(
                config.mode_settings(),
                config.mode.follow_env,
            )),
            catalog: Catalog::new(samples.clone(), store.clone()),
            streamer: RangeStreamer::new(samples.clone()),
            uploads: UploadService::new(samples, store),
            allowed_origins: Arc::new(config.cors.allowed_origins.clone()),
            tunnel_suffixes: Arc::new(config.storage.tunnel_suffixes.clone()),
            fallback_host: format!("localhost:{}", config.server.port),
            max_upload_bytes: config.storage.max_upload_bytes,
            service_name: config.server.service_name.clone(),
        }
    }

    /// Resolve the operating mode for the current request.
    pub async fn resolve_mode(&self) -> (OperatingMode, ModeSettings) {
        let settings = self.settings.snapshot().await;
        (resolve_mode(&settings), settings)
    }
}
