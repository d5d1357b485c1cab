use std::fmt;

use anyhow::anyhow;
use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use crate::utils::errors::AppError;

/// Header carrying the tenant identifier on anonymous, tenant-aware requests.
pub const TENANT_HEADER: &str = "tenant";

/// Identifier of an isolated clinic/organization scope. All user and role
/// data is partitioned by tenant; services receive the resolved context
/// explicitly with every call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        TenantId(value.to_string())
    }
}

/// Extractor for anonymous flows that are explicitly tenant-aware
/// (self-registration, forgot-password, token issuance). The header is
/// mandatory; its absence is a client error, never a silent default.
#[derive(Debug, Clone)]
pub struct TenantFromHeader(pub TenantId);

impl FromRequestParts<AppState> for TenantFromHeader {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let tenant = parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::bad_request(anyhow!("Missing '{}' header", TENANT_HEADER)))?;

        Ok(TenantFromHeader(TenantId(tenant.to_string())))
    }
}
