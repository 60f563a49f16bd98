// src/middleware/tenancy.rs

use axum::{extract::FromRequestParts, http::request::Parts};

// Cabeçalho com o slug do whitelabel
const TENANT_HEADER: &str = "x-tenant";
const MAIN_TENANT: &str = "main";

/// Tenant da requisição. `None` é o site principal (sem cabeçalho ou "main").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext(pub Option<String>);

impl TenantContext {
    pub fn from_value(raw: Option<&str>) -> Self {
        let tenant = raw
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty() && v != MAIN_TENANT);
        TenantContext(tenant)
    }

    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|value| value.to_str().ok());
        Ok(TenantContext::from_value(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_and_missing_mean_global() {
        assert_eq!(TenantContext::from_value(None), TenantContext(None));
        assert_eq!(TenantContext::from_value(Some("main")), TenantContext(None));
        assert_eq!(TenantContext::from_value(Some("  ")), TenantContext(None));
        assert_eq!(TenantContext::from_value(Some("Acme")), TenantContext(Some("acme".into())));
    }
}
