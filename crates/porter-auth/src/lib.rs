pub mod google;
pub mod zoom;

use thiserror::Error;

pub use google::{GoogleCredential, GoogleTokenCache};
pub use zoom::{ZoomCredentials, ZoomTokenCache};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("token exchange failed ({status}): {body}")]
    Exchange { status: u16, body: String },

    #[error("credential file {path}: {source}")]
    CredentialFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("credential file {path} is not valid JSON: {source}")]
    CredentialFormat {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
