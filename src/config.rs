use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::mode::{parse_flag, CloudCredentials, Environment, ModeSettings};
use crate::origin::DEFAULT_TUNNEL_SUFFIXES;
use crate::storage::StorageConfig;
use crate::upload::DEFAULT_MAX_UPLOAD_BYTES;

/// Top-level application configuration loaded from file + environment.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cors: CorsSection,
    pub storage: StorageSection,
    pub cloud: CloudSection,
    pub mode: ModeSection,
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Load configuration from disk and environment.
    pub fn load() -> Result<Self> {
        let config_path =
            env::var("STORYVAULT_CONFIG").unwrap_or_else(|_| "storyvault.toml".to_string());

        let mut builder = config::Config::builder();

        if Path::new(&config_path).exists() {
            builder = builder.add_source(config::File::from(PathBuf::from(&config_path)));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("STORYVAULT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build()?;
        let mut config: Self = settings.try_deserialize()?;

        config.apply_conventional_env(|name| env::var(name).ok());

        if config.logging.level.trim().is_empty() {
            config.logging.level = "info".to_string();
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply the conventional variable names deployment tooling already sets
    /// (`PORT`, `AWS_*`, `NODE_ENV`, ...). They take precedence over the file.
    pub fn apply_conventional_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(port) = non_blank("PORT").and_then(|p| p.trim().parse().ok()) {
            self.server.port = port;
        }
        if let Some(origins) = non_blank("ALLOWED_ORIGINS") {
            self.cors.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(region) = non_blank("AWS_REGION") {
            self.cloud.region = Some(region);
        }
        if let Some(bucket) = non_blank("AWS_S3_BUCKET_NAME") {
            self.cloud.bucket = Some(bucket);
        }
        if let Some(key) = non_blank("AWS_ACCESS_KEY_ID") {
            self.cloud.access_key_id = Some(key);
        }
        if let Some(secret) = non_blank("AWS_SECRET_ACCESS_KEY") {
            self.cloud.secret_access_key = Some(secret);
        }
        if let Some(endpoint) = non_blank("AWS_ENDPOINT_URL") {
            self.cloud.endpoint = Some(endpoint);
        }
        if let Some(marker) = non_blank("NODE_ENV") {
            self.mode.environment = Environment::from_marker(&marker);
        }
        if let Some(flag) = non_blank("FORCE_TEST_MODE") {
            self.mode.force_test_mode = parse_flag(&flag);
        }
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.storage.samples_dir.trim().is_empty() {
            bail!("storage.samples_dir must be specified");
        }
        if self.storage.max_upload_bytes == 0 {
            bail!("storage.max_upload_bytes must be greater than zero");
        }
        if matches!(self.cloud.backend, StorageBackendKind::Local) {
            let local = self
                .cloud
                .local
                .as_ref()
                .context("cloud.local configuration required when backend is 'local'")?;
            if local.root_path.trim().is_empty() {
                bail!("cloud.local.root_path must be specified");
            }
        }
        Ok(())
    }

    /// Snapshot consumed by the mode resolver.
    pub fn mode_settings(&self) -> ModeSettings {
        ModeSettings {
            environment: self.mode.environment,
            cloud: self.cloud.credentials(),
            force_test_mode: self.mode.force_test_mode,
        }
    }

    /// Resolve the object store configuration, if cloud mode can be served.
    ///
    /// Returns `None` when the S3 backend is selected but its settings are
    /// incomplete; cloud-mode requests then fail with a configuration error.
    pub fn storage_runtime(&self) -> Result<Option<StorageConfig>> {
        match self.cloud.backend {
            StorageBackendKind::S3 => {
                let credentials = self.cloud.credentials();
                if !credentials.is_complete() {
                    return Ok(None);
                }

                let value = |v: Option<String>| v.unwrap_or_default().trim().to_string();
                Ok(Some(StorageConfig::S3 {
                    bucket: value(credentials.bucket),
                    region: value(credentials.region),
                    access_key_id: value(credentials.access_key_id),
                    secret_access_key: value(credentials.secret_access_key),
                    endpoint: self
                        .cloud
                        .endpoint
                        .as_deref()
                        .map(str::trim)
                        .filter(|e| !e.is_empty())
                        .map(str::to_string),
                }))
            }
            StorageBackendKind::Local => {
                let local = self
                    .cloud
                    .local
                    .clone()
                    .context("cloud.local configuration required when backend is 'local'")?;
                Ok(Some(StorageConfig::Local {
                    root_path: local.root_path,
                    public_base_url: local.public_base_url,
                }))
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub service_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            service_name: "Bedtime Story Player Backend".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsSection {
    /// Origins allowed to call the JSON API; `*` allows any.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsSection {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub samples_dir: String,
    pub max_upload_bytes: u64,
    pub tunnel_suffixes: Vec<String>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            samples_dir: "./test/samples".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            tunnel_suffixes: DEFAULT_TUNNEL_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CloudSection {
    pub backend: StorageBackendKind,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint: Option<String>,
    pub local: Option<LocalStorageSection>,
}

impl CloudSection {
    pub fn credentials(&self) -> CloudCredentials {
        CloudCredentials {
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            access_key_id: self.access_key_id.clone(),
            secret_access_key: self.secret_access_key.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    #[default]
    S3,
    Local,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalStorageSection {
    pub root_path: String,
    pub public_base_url: String,
}

impl Default for LocalStorageSection {
    fn default() -> Self {
        Self {
            root_path: "./data/bucket".to_string(),
            public_base_url: "http://localhost:9000/stories-bucket".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ModeSection {
    pub environment: Environment,
    pub force_test_mode: bool,
    /// Re-read `FORCE_TEST_MODE` from the process environment per request.
    pub follow_env: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}
