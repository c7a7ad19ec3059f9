//! Bearer/API-key authentication. Tokens are `{tenant_id}.{signature}` where
//! the signature is HMAC-SHA256 of the tenant id under `AUTH_SECRET`; the
//! tenant always comes from the validated token, never from a bare query
//! parameter. With auth disabled, `X-Tenant-Id` selects the tenant for
//! development and defaults to `public`.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::error::ApiError;
use crate::domain::value_objects::TenantId;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub require_auth: bool,
    pub secret: Option<String>,
}

impl AuthConfig {
    pub fn authenticate(
        &self,
        headers: &HeaderMap,
        query_token: Option<&str>,
    ) -> Result<TenantId, ApiError> {
        let token = bearer_token(headers)
            .or_else(|| header_value(headers, "x-api-key"))
            .or_else(|| query_token.map(str::to_string));

        if !self.require_auth {
            if let Some(token) = &token {
                if let Some(secret) = &self.secret {
                    if let Ok(tenant) = verify_token(secret, token) {
                        return Ok(tenant);
                    }
                }
            }
            let tenant = header_value(headers, "x-tenant-id")
                .unwrap_or_else(|| "public".to_string());
            return TenantId::new(tenant).map_err(|_| ApiError::MissingTenant);
        }

        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| ApiError::Internal("auth enabled without a secret".to_string()))?;
        let token = token.ok_or_else(|| ApiError::Unauthorized("missing token".to_string()))?;
        verify_token(secret, &token)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Mint a token for a tenant. Also what operators use to provision API keys.
pub fn mint_token(secret: &str, tenant: &TenantId) -> String {
    format!("{}.{}", tenant.as_str(), signature(secret, tenant.as_str()))
}

pub fn verify_token(secret: &str, token: &str) -> Result<TenantId, ApiError> {
    let (tenant_part, signature_part) = token
        .rsplit_once('.')
        .ok_or_else(|| ApiError::Unauthorized("malformed token".to_string()))?;
    let tenant = TenantId::new(tenant_part).map_err(|_| ApiError::MissingTenant)?;

    let expected = signature(secret, tenant_part);
    if !constant_time_eq(expected.as_bytes(), signature_part.as_bytes()) {
        return Err(ApiError::Unauthorized("invalid token".to_string()));
    }
    Ok(tenant)
}

fn signature(secret: &str, tenant: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(tenant.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn tenant(name: &str) -> TenantId {
        TenantId::new(name).unwrap()
    }

    fn config(require: bool) -> AuthConfig {
        AuthConfig {
            require_auth: require,
            secret: Some("test-secret".to_string()),
        }
    }

    fn headers_with_bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn minted_tokens_verify_back_to_the_tenant() {
        let t = tenant("acme");
        let token = mint_token("s", &t);
        assert_eq!(verify_token("s", &token).unwrap(), t);
    }

    #[test]
    fn tampered_tenant_is_rejected() {
        let token = mint_token("s", &tenant("acme"));
        let forged = token.replacen("acme", "evil", 1);
        assert!(verify_token("s", &forged).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint_token("s1", &tenant("acme"));
        assert!(verify_token("s2", &token).is_err());
    }

    #[test]
    fn bearer_header_authenticates() {
        let auth = config(true);
        let token = mint_token("test-secret", &tenant("acme"));
        let tenant_id = auth
            .authenticate(&headers_with_bearer(&token), None)
            .unwrap();
        assert_eq!(tenant_id.as_str(), "acme");
    }

    #[test]
    fn missing_token_is_unauthorized_when_required() {
        let auth = config(true);
        assert!(auth.authenticate(&HeaderMap::new(), None).is_err());
    }

    #[test]
    fn query_token_works_for_websocket_handshakes() {
        let auth = config(true);
        let token = mint_token("test-secret", &tenant("acme"));
        let tenant_id = auth.authenticate(&HeaderMap::new(), Some(&token)).unwrap();
        assert_eq!(tenant_id.as_str(), "acme");
    }

    #[test]
    fn dev_mode_falls_back_to_tenant_header() {
        let auth = config(false);
        let mut headers = HeaderMap::new();
        headers.insert("x-tenant-id", HeaderValue::from_static("dev-tenant"));
        assert_eq!(
            auth.authenticate(&headers, None).unwrap().as_str(),
            "dev-tenant"
        );
        assert_eq!(
            auth.authenticate(&HeaderMap::new(), None).unwrap().as_str(),
            "public"
        );
    }
}
