use std::{collections::HashMap, path::PathBuf, time::Duration};

use config::{Config as ConfigLib, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::domain::enrollment::attributes::{DEFAULT_ISSUER, DEFAULT_SCHEME_MANAGER};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub credentials: CredentialsConfig,
    /// Upper bound on every call to the verifier, issuer and issuing server
    pub upstream_timeout_secs: u64,
    pub verifier: ServiceConfig,
    pub issuer: ServiceConfig,
    pub issuing_server: IssuingServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a session is dropped
    pub expiry_secs: u64,
    pub max_sessions: usize,
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub scheme_manager: String,
    pub issuer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuingServerConfig {
    pub url: String,
    /// Our name towards the issuing server, the `iss` claim
    pub api_name: String,
    pub sign_jwts: bool,
    /// PKCS#8 DER encoded RSA key, required when `sign_jwts` is set
    #[serde(default)]
    pub jwt_private_key: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("server.host", "localhost")?
            .set_default("server.port", 8080)?
            .set_default("session.expiry_secs", 15 * 60)?
            .set_default("session.max_sessions", 100_000)?
            .set_default("session.cleanup_interval_secs", 60)?
            .set_default("credentials.scheme_manager", DEFAULT_SCHEME_MANAGER)?
            .set_default("credentials.issuer", DEFAULT_ISSUER)?
            .set_default("upstream_timeout_secs", 30)?
            .set_default("verifier.url", "http://localhost:8081")?
            .set_default("issuer.url", "http://localhost:8082")?
            .set_default("issuing_server.url", "http://localhost:8088/irma_api_server/api/v2")?
            .set_default("issuing_server.api_name", "mno")?
            .set_default("issuing_server.sign_jwts", false)?
            .add_source(File::with_name("config/settings").required(false));

        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Should be in the format APP_SERVER__HOST or APP_ISSUING_SERVER__URL
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.issuing_server.sign_jwts && self.issuing_server.jwt_private_key.is_none() {
            return Err(ConfigError::Message(
                "issuing_server.jwt_private_key is required when sign_jwts is enabled".into(),
            ));
        }
        if self.session.cleanup_interval_secs == 0 {
            return Err(ConfigError::Message(
                "session.cleanup_interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl SessionConfig {
    pub fn expiry(&self) -> chrono::Duration {
        i64::try_from(self.expiry_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}
