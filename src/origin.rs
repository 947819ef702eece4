//! Public origin of the current request.
//!
//! Local-test catalog URLs point back at this server, and the server is often
//! reached through a reverse proxy or a development tunnel, so the origin is
//! taken from the forwarding headers when present.

use axum::http::{header, HeaderMap};

/// Tunnel domains that only serve HTTPS.
pub const DEFAULT_TUNNEL_SUFFIXES: &[&str] = &[
    ".ngrok.io",
    ".ngrok.app",
    ".ngrok-free.app",
    ".ngrok-free.dev",
    ".loca.lt",
    ".trycloudflare.com",
    ".devtunnels.ms",
];

/// Scheme and host clients used to reach this server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
}

impl RequestOrigin {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
        }
    }

    /// Derive the origin from request headers.
    ///
    /// `X-Forwarded-Host` wins over `Host`; `X-Forwarded-Proto` wins over
    /// plain `http`. Hosts under a tunnel suffix are always `https`.
    pub fn from_headers<S: AsRef<str>>(
        headers: &HeaderMap,
        tunnel_suffixes: &[S],
        fallback_host: &str,
    ) -> Self {
        let host = first_value(headers, "x-forwarded-host")
            .or_else(|| first_value(headers, header::HOST.as_str()))
            .unwrap_or_else(|| fallback_host.to_string());

        let mut scheme = first_value(headers, "x-forwarded-proto")
            .map(|p| p.to_ascii_lowercase())
            .filter(|p| p == "http" || p == "https")
            .unwrap_or_else(|| "http".to_string());

        if is_tunnel_host(&host, tunnel_suffixes) {
            scheme = "https".to_string();
        }

        Self { scheme, host }
    }

    /// `scheme://host`
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }

    /// Absolute URL of the streaming endpoint for a stored file.
    pub fn file_url(&self, file_name: &str) -> String {
        format!("{}/file/{}", self.base_url(), urlencoding::encode(file_name))
    }
}

/// Whether a host (port ignored) sits under one of the tunnel suffixes.
pub fn is_tunnel_host<S: AsRef<str>>(host: &str, tunnel_suffixes: &[S]) -> bool {
    let hostname = host
        .rsplit_once(':')
        .filter(|(_, port)| port.chars().all(|c| c.is_ascii_digit()))
        .map(|(name, _)| name)
        .unwrap_or(host)
        .to_ascii_lowercase();

    tunnel_suffixes.iter().any(|suffix| {
        let suffix = suffix.as_ref().to_ascii_lowercase();
        let bare = suffix.trim_start_matches('.');
        hostname.ends_with(&suffix) || hostname == bare
    })
}

fn first_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
