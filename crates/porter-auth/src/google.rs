//! Delegated Google credential (authorized-user refresh token).
//!
//! The calendar and mail gateways share one credential and one cached
//! access token; an expired token is refreshed transparently before the
//! next API call.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::zoom::REFRESH_MARGIN;
use crate::AuthError;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Contents of an authorized-user credential file (the `token.json`
/// produced by a one-time delegated consent flow).
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleCredential {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl GoogleCredential {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| AuthError::CredentialFile {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| AuthError::CredentialFormat {
            path: path.display().to_string(),
            source,
        })
    }
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

/// Cached access token for one [`GoogleCredential`].
#[derive(Default)]
pub struct GoogleTokenCache {
    cached: Mutex<Option<CachedToken>>,
}

impl GoogleTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a valid access token, running the refresh-token grant
    /// against the credential's `token_uri` when needed.
    pub async fn bearer(
        &self,
        http: &reqwest::Client,
        credential: &GoogleCredential,
    ) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() + REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let response = http
            .post(&credential.token_uri)
            .form(&[
                ("client_id", credential.client_id.as_str()),
                ("client_secret", credential.client_secret.as_str()),
                ("refresh_token", credential.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
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
        tracing::debug!(expires_in = token.expires_in, "refreshed google access token");
        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        });
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credential(token_uri: String) -> GoogleCredential {
        GoogleCredential {
            client_id: "cid".into(),
            client_secret: "csecret".into(),
            refresh_token: "rtok".into(),
            token_uri,
        }
    }

    #[test]
    fn load_reads_authorized_user_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"client_id": "cid", "client_secret": "cs", "refresh_token": "rt"}}"#
        )
        .unwrap();

        let cred = GoogleCredential::load(file.path()).unwrap();
        assert_eq!(cred.client_id, "cid");
        assert_eq!(cred.refresh_token, "rt");
        assert_eq!(cred.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn load_missing_file_is_a_credential_error() {
        let err = GoogleCredential::load("/nonexistent/token.json").unwrap_err();
        assert!(matches!(err, AuthError::CredentialFile { .. }));
    }

    #[test]
    fn load_rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = GoogleCredential::load(file.path()).unwrap_err();
        assert!(matches!(err, AuthError::CredentialFormat { .. }));
    }

    #[tokio::test]
    async fn bearer_runs_refresh_grant_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rtok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ga-token",
                "expires_in": 3599
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cache = GoogleTokenCache::new();
        let http = reqwest::Client::new();
        let cred = credential(format!("{}/token", server.uri()));
        assert_eq!(cache.bearer(&http, &cred).await.unwrap(), "ga-token");
        assert_eq!(cache.bearer(&http, &cred).await.unwrap(), "ga-token");
    }

    #[tokio::test]
    async fn bearer_surfaces_revoked_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
            .mount(&server)
            .await;

        let cache = GoogleTokenCache::new();
        let cred = credential(format!("{}/token", server.uri()));
        let err = cache.bearer(&reqwest::Client::new(), &cred).await.unwrap_err();
        match err {
            AuthError::Exchange { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("invalid_grant"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
