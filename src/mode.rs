//! Operating mode resolution
//!
//! Decides per request whether uploads and listings go to the local samples
//! directory or to the cloud object store.

use serde::Deserialize;
use std::fmt;

/// Where stories are stored and listed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    LocalTest,
    Cloud,
}

impl OperatingMode {
    pub fn is_test(&self) -> bool {
        matches!(self, OperatingMode::LocalTest)
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatingMode::LocalTest => f.write_str("local-test"),
            OperatingMode::Cloud => f.write_str("cloud"),
        }
    }
}

/// Deployment environment marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    /// Parse a `NODE_ENV`-style marker. Anything unrecognised is development.
    pub fn from_marker(marker: &str) -> Self {
        match marker.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" => Environment::Test,
            _ => Environment::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// The four settings a cloud store needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudCredentials {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl CloudCredentials {
    /// All four settings present and non-blank.
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Names of the settings that are absent or blank.
    pub fn missing(&self) -> Vec<&'static str> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

        let mut missing = Vec::new();
        if !present(&self.bucket) {
            missing.push("bucket");
        }
        if !present(&self.region) {
            missing.push("region");
        }
        if !present(&self.access_key_id) {
            missing.push("access_key_id");
        }
        if !present(&self.secret_access_key) {
            missing.push("secret_access_key");
        }
        missing
    }
}

/// Configuration snapshot the resolver works from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeSettings {
    pub environment: Environment,
    pub cloud: CloudCredentials,
    pub force_test_mode: bool,
}

/// Resolve the operating mode for one request.
///
/// Production always runs in cloud mode. Elsewhere cloud mode needs complete
/// cloud settings and no forced test mode.
pub fn resolve_mode(settings: &ModeSettings) -> OperatingMode {
    if settings.environment.is_production() {
        return OperatingMode::Cloud;
    }

    if settings.cloud.is_complete() && !settings.force_test_mode {
        OperatingMode::Cloud
    } else {
        OperatingMode::LocalTest
    }
}

/// Parse a boolean flag the way shell environments spell it.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
