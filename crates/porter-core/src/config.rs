//! YAML configuration with `${VAR}` environment interpolation for
//! secrets. One file, loaded once at startup.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use porter_auth::{GoogleCredential, ZoomCredentials};
use serde::{Deserialize, Serialize};

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_store_path() -> String {
    "porter.db".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_client_zone() -> String {
    "UTC".to_string()
}

fn default_reference_zone() -> String {
    "Asia/Kolkata".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimezoneConfig {
    /// Assumed for visitors who never state a zone.
    #[serde(default = "default_client_zone")]
    pub client_default: String,
    /// Operator-side zone used in notifications.
    #[serde(default = "default_reference_zone")]
    pub reference: String,
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self {
            client_default: default_client_zone(),
            reference: default_reference_zone(),
        }
    }
}

fn default_provider_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_provider_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    #[serde(default = "default_provider_model")]
    pub model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            base_url: default_provider_base_url(),
            model: default_provider_model(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoomConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub host_email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Path to an authorized-user JSON credential file.
    #[serde(default)]
    pub credential_file: String,
    /// From-address for outgoing invites and notifications.
    #[serde(default)]
    pub sender: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MainConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub timezones: TimezoneConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub zoom: ZoomConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    /// Receives lead notifications and meeting summaries.
    #[serde(default)]
    pub operator_email: Option<String>,
}

impl MainConfig {
    pub fn reference_zone(&self) -> Result<Tz> {
        self.timezones
            .reference
            .parse::<Tz>()
            .map_err(|_| anyhow!("unknown reference timezone: {}", self.timezones.reference))
    }

    pub fn client_default_zone(&self) -> Result<Tz> {
        self.timezones
            .client_default
            .parse::<Tz>()
            .map_err(|_| anyhow!("unknown client timezone: {}", self.timezones.client_default))
    }

    pub fn zoom_credentials(&self) -> Option<ZoomCredentials> {
        if !self.zoom.enabled {
            return None;
        }
        Some(ZoomCredentials {
            account_id: self.zoom.account_id.clone(),
            client_id: self.zoom.client_id.clone(),
            client_secret: self.zoom.client_secret.clone(),
            host_email: self.zoom.host_email.clone(),
        })
    }

    pub fn google_credential(&self) -> Result<Option<GoogleCredential>> {
        if !self.google.enabled {
            return Ok(None);
        }
        let credential = GoogleCredential::load(&self.google.credential_file)
            .with_context(|| format!("loading {}", self.google.credential_file))?;
        Ok(Some(credential))
    }
}

/// Interpolate `${VAR}` references from the process environment.
/// Unknown variables resolve to the empty string.
pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

pub fn load_config(path: &Path) -> Result<MainConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let mut config: MainConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))?;

    resolve_secrets(&mut config);
    validate_config(&config)?;
    Ok(config)
}

fn resolve_secrets(config: &mut MainConfig) {
    config.provider.api_key = resolve_env_var(&config.provider.api_key);
    config.zoom.account_id = resolve_env_var(&config.zoom.account_id);
    config.zoom.client_id = resolve_env_var(&config.zoom.client_id);
    config.zoom.client_secret = resolve_env_var(&config.zoom.client_secret);
    config.zoom.host_email = resolve_env_var(&config.zoom.host_email);
    config.google.credential_file = resolve_env_var(&config.google.credential_file);
    config.google.sender = resolve_env_var(&config.google.sender);
    if let Some(operator) = &config.operator_email {
        config.operator_email = Some(resolve_env_var(operator));
    }
}

pub fn validate_config(config: &MainConfig) -> Result<()> {
    config.reference_zone()?;
    config.client_default_zone()?;

    if config.provider.enabled && config.provider.api_key.is_empty() {
        return Err(anyhow!("provider enabled but api_key is empty"));
    }
    if config.zoom.enabled {
        for (field, value) in [
            ("account_id", &config.zoom.account_id),
            ("client_id", &config.zoom.client_id),
            ("client_secret", &config.zoom.client_secret),
            ("host_email", &config.zoom.host_email),
        ] {
            if value.is_empty() {
                return Err(anyhow!("zoom enabled but {field} is empty"));
            }
        }
    }
    if config.google.enabled {
        if config.google.credential_file.is_empty() {
            return Err(anyhow!("google enabled but credential_file is empty"));
        }
        if config.google.sender.is_empty() {
            return Err(anyhow!("google enabled but sender is empty"));
        }
    }
    Ok(())
}
