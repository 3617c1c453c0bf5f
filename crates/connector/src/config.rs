//! Connector configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SMC_HOST` - SMC management server hostname
//! - `SMC_KEY` - SMC API authentication key
//! - `APP_NAME` - Directory application whose assignments gate SMC access
//! - `LDAP_DOMAIN` - External LDAP user domain configured on the SMC
//! - `AZURE_ADMIN_LOGIN_NAME` - Directory account used by the Azure CLI
//! - `AZURE_ADMIN_LOGIN_PASSWORD` - Password of that account
//!
//! ## Optional
//! - `CONNECTOR_HOST` - Bind address (default: 127.0.0.1)
//! - `CONNECTOR_PORT` - Listen port (default: 8085)
//! - `SMC_PORT` - SMC API port (default: 8082)
//! - `SMC_API_VERSION` - SMC API version (default: 6.7)
//! - `SMC_NAME` - Product name accepted by the token permission check (default: smc)
//! - `SMC_LOGIN_DOMAIN` - Administrative domain used at login (default: Shared Domain)
//! - `LDAP_USERS_OU` - Organizational unit holding directory users (default: AADDC Users)
//! - `ROLES_UPDATE_TIME_IN_MINUTES` - Reconciliation interval (default: 3)
//! - `ROLE_RETRY_BACKOFF_SECONDS` - Wait before retrying an empty role load (default: 120)
//! - `ROLE_WRITE_PAUSE_MILLIS` - Pause after each permission write (default: 1000)
//! - `AZ_CLI_PATH` - Azure CLI executable (default: az)
//! - `LOG_FORMAT_JSON` - Emit JSON logs (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Sentry error sample rate (default: 1.0)
//!
//! ## Optional (default roles for new administrators)
//! - `ROLES_PERMISSIONS_<ROLE>` - one flag per role, e.g. `ROLES_PERMISSIONS_NSX_ROLE`
//!   (default: only `VIEWER` is true)
//! - `ROLES_CAN_USE_API`, `ROLES_ALLOW_SUDO`, `ROLES_CONSOLE_SUPERUSER` (default: false)
//! - `ROLES_ALLOW_TO_LOGIN_IN_SHARED` (default: true)
//!
//! ## Optional (TLS)
//! - `CONNECTOR_TLS_CERT` - PEM-encoded certificate chain
//! - `CONNECTOR_TLS_KEY` - PEM-encoded private key

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use smc_connector_core::SmcRole;
use thiserror::Error;

use crate::provisioning::RoleDefaults;
use crate::reconcile::ReconcileSettings;
use crate::smc::SmcEndpoint;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Connector configuration.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// IP address to bind the inbound API to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// SMC connection
    pub smc: SmcConfig,
    /// Directory access
    pub directory: DirectoryConfig,
    /// Reconciliation loop timing
    pub reconcile: ReconcileTiming,
    /// Roles and flags for newly created administrators
    pub role_defaults: RoleDefaults,
    /// Emit JSON logs instead of text
    pub log_format_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// TLS configuration for HTTPS (optional)
    pub tls: Option<TlsConfig>,
}

/// SMC connection settings.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct SmcConfig {
    pub host: String,
    pub port: u16,
    pub api_version: String,
    pub login_domain: String,
    /// Product name clients must present to the token permission check
    pub name: String,
    pub key: SecretString,
}

impl std::fmt::Debug for SmcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmcConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_version", &self.api_version)
            .field("login_domain", &self.login_domain)
            .field("name", &self.name)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SmcConfig {
    /// Connection settings for the SMC client.
    #[must_use]
    pub fn endpoint(&self) -> SmcEndpoint {
        SmcEndpoint {
            host: self.host.clone(),
            port: self.port,
            api_version: self.api_version.clone(),
            login_domain: self.login_domain.clone(),
            key: self.key.clone(),
        }
    }
}

/// Directory access settings.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct DirectoryConfig {
    pub app_name: String,
    pub ldap_domain: String,
    pub users_ou: String,
    pub az_cli_path: String,
    pub admin_login_name: String,
    pub admin_password: SecretString,
}

impl std::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("app_name", &self.app_name)
            .field("ldap_domain", &self.ldap_domain)
            .field("users_ou", &self.users_ou)
            .field("az_cli_path", &self.az_cli_path)
            .field("admin_login_name", &self.admin_login_name)
            .field("admin_password", &"[REDACTED]")
            .finish()
    }
}

/// Reconciliation loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileTiming {
    pub interval: Duration,
    pub role_retry_backoff: Duration,
    pub write_pause: Duration,
}

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

impl ConnectorConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the default role flags are contradictory.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`ConnectorConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Vars { lookup: &lookup };

        let host = env.parse_or("CONNECTOR_HOST", "127.0.0.1")?;
        let port = env.parse_or("CONNECTOR_PORT", "8085")?;

        let smc = SmcConfig {
            host: env.required("SMC_HOST")?,
            port: env.parse_or("SMC_PORT", "8082")?,
            api_version: env.or_default("SMC_API_VERSION", "6.7"),
            login_domain: env.or_default("SMC_LOGIN_DOMAIN", "Shared Domain"),
            name: env.or_default("SMC_NAME", "smc"),
            key: env.required_secret("SMC_KEY")?,
        };
        if let Err(e) = validate_secret_strength(smc.key.expose_secret(), "SMC_KEY") {
            tracing::warn!("SMC_KEY validation warning: {e}");
        }

        let directory = DirectoryConfig {
            app_name: env.required("APP_NAME")?,
            ldap_domain: env.required("LDAP_DOMAIN")?,
            users_ou: env.or_default("LDAP_USERS_OU", "AADDC Users"),
            az_cli_path: env.or_default("AZ_CLI_PATH", "az"),
            admin_login_name: env.required_non_empty("AZURE_ADMIN_LOGIN_NAME")?,
            admin_password: env.required_secret("AZURE_ADMIN_LOGIN_PASSWORD")?,
        };

        let reconcile = ReconcileTiming {
            interval: Duration::from_secs(60 * env.parse_or::<u64>("ROLES_UPDATE_TIME_IN_MINUTES", "3")?),
            role_retry_backoff: Duration::from_secs(env.parse_or("ROLE_RETRY_BACKOFF_SECONDS", "120")?),
            write_pause: Duration::from_millis(env.parse_or("ROLE_WRITE_PAUSE_MILLIS", "1000")?),
        };
        if reconcile.interval.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "ROLES_UPDATE_TIME_IN_MINUTES".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let role_defaults = role_defaults(&env)?;

        Ok(Self {
            host,
            port,
            smc,
            directory,
            reconcile,
            role_defaults,
            log_format_json: env.flag("LOG_FORMAT_JSON", false)?,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: env
                .optional("SENTRY_SAMPLE_RATE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(1.0),
            tls: tls_config(&env)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Settings for the reconciliation loop.
    #[must_use]
    pub fn reconcile_settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            interval: self.reconcile.interval,
            role_retry_backoff: self.reconcile.role_retry_backoff,
            write_pause: self.reconcile.write_pause,
            app_name: self.directory.app_name.clone(),
        }
    }
}

fn role_defaults(env: &Vars<'_>) -> Result<RoleDefaults, ConfigError> {
    let mut roles = Vec::new();
    for role in RoleDefaults::FLAG_ORDER {
        let key = format!("ROLES_PERMISSIONS_{}", role.config_key());
        if env.flag(&key, role == SmcRole::Viewer)? {
            roles.push(role);
        }
    }

    let defaults = RoleDefaults {
        roles,
        can_use_api: env.flag("ROLES_CAN_USE_API", false)?,
        allow_sudo: env.flag("ROLES_ALLOW_SUDO", false)?,
        console_superuser: env.flag("ROLES_CONSOLE_SUPERUSER", false)?,
        allow_to_login_in_shared: env.flag("ROLES_ALLOW_TO_LOGIN_IN_SHARED", true)?,
    };
    defaults.validate().map_err(|e| {
        ConfigError::InvalidEnvVar("ROLES_CONSOLE_SUPERUSER".to_string(), e.to_string())
    })?;
    Ok(defaults)
}

fn tls_config(env: &Vars<'_>) -> Result<Option<TlsConfig>, ConfigError> {
    match (env.optional("CONNECTOR_TLS_CERT"), env.optional("CONNECTOR_TLS_KEY")) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_pem: cert,
            key_pem: SecretString::from(key),
        })),
        (None, None) => Ok(None),
        _ => Err(ConfigError::InvalidEnvVar(
            "CONNECTOR_TLS_*".to_string(),
            "Both CONNECTOR_TLS_CERT and CONNECTOR_TLS_KEY must be set together".to_string(),
        )),
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable source with the typed accessors used above.
struct Vars<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Vars<'_> {
    /// Get an optional variable. Empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        (self.lookup)(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a required variable that must not be blank.
    fn required_non_empty(&self, key: &str) -> Result<String, ConfigError> {
        let value = self.required(key)?;
        if value.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                "must not be empty".to_string(),
            ));
        }
        Ok(value)
    }

    /// Get a required variable as a secret.
    fn required_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        Ok(SecretString::from(self.required_non_empty(key)?))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to `default`.
    fn parse_or<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    /// Parse a boolean flag (`true`/`false`/`1`/`0`/`yes`/`no`).
    fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        let Some(value) = self.optional(key) else {
            return Ok(default);
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("expected true or false, got '{other}'"),
            )),
        }
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated key."
            ),
        ));
    }

    Ok(())
}
