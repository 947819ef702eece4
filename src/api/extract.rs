//! Request extractors

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

use crate::api::AppState;
use crate::origin::RequestOrigin;

#[async_trait]
impl FromRequestParts<AppState> for RequestOrigin {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(RequestOrigin::from_headers(
            &parts.headers,
            state.tunnel_suffixes.as_slice(),
            &state.fallback_host,
        ))
    }
}
