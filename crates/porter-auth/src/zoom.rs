//! Zoom server-to-server OAuth (account-credentials grant).
//!
//! The access token is cached process-wide behind a tokio mutex and
//! re-fetched when it is within [`REFRESH_MARGIN`] of expiry, so
//! concurrent requests never race on a redundant refresh.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::AuthError;

/// Refresh this long before the upstream expiry to avoid using a token
/// that dies mid-request.
pub const REFRESH_MARGIN: Duration = Duration::seconds(30);

#[derive(Debug, Clone)]
pub struct ZoomCredentials {
    pub account_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub host_email: String,
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// Process-wide bearer-token cache for the account-credentials exchange.
#[derive(Default)]
pub struct ZoomTokenCache {
    cached: Mutex<Option<CachedToken>>,
}

impl ZoomTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a valid bearer token, exchanging credentials against
    /// `{auth_base}/oauth/token` only when the cached one is missing or
    /// about to expire.
    pub async fn bearer(
        &self,
        http: &reqwest::Client,
        auth_base: &str,
        credentials: &ZoomCredentials,
    ) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() + REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let url = format!("{}/oauth/token", auth_base.trim_end_matches('/'));
        let response = http
            .post(&url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .query(&[
                ("grant_type", "account_credentials"),
                ("account_id", credentials.account_id.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Exchange {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await?;
        tracing::debug!(expires_in = token.expires_in, "fetched zoom access token");
        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        });
        Ok(value)
    }
}
