//! Application configuration loaded from a TOML file and environment variables.
//!
//! # Configuration Hierarchy
//!
//! Values are resolved in this order, later sources winning:
//!
//! 1. Built-in defaults (suitable for local development only)
//! 2. The TOML file passed with `--config` (default `config.toml`, optional)
//! 3. A `.env` file, if present
//! 4. Environment variables named `SECTION_KEY`, e.g. `SERVER_PORT`,
//!    `DATABASE_HOST`, `SESSION_KEY`
//!
//! # Example `config.toml`
//!
//! ```toml
//! [server]
//! port = 8080
//! mode = "release"
//!
//! [database]
//! host = "db.internal"
//! ssl_mode = "require"
//!
//! [session]
//! key = "<128 hex characters, generate with `portico hexkey --length 64`>"
//! secure = true
//! ```
//!
//! # Security Configuration
//!
//! - `SESSION_KEY`: 64-byte hex key used to encrypt the session cookie
//! - `SECURITY_ALLOWED_HOSTS`: comma-separated `Host` whitelist (empty = any)
//! - `SECURITY_TRUSTED_PROXIES`: CIDR ranges whose forwarding headers are trusted

use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use tower_sessions::cookie::SameSite;
use tracing::debug;

use crate::error::{AppError, AppResult};

/// Development-only session key. Never use it outside a laptop.
pub const DEV_SESSION_KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef\
                                   0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

/// Required length of the decoded session key in bytes.
pub const SESSION_KEY_LEN: usize = 64;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub session: SessionConfig,
    pub rate_limit: RateLimitConfig,
    pub observability: ObservabilityConfig,
}

// =============================================================================
// Sections
// =============================================================================

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (default: "0.0.0.0")
    pub host: String,
    /// Bind port (default: 3000)
    pub port: u16,
    /// Run mode; `debug` enables verbose logging defaults
    pub mode: ServerMode,
    /// Directory served under `/static`
    pub static_dir: String,
    /// Maximum request body size in bytes (default: 1MB)
    pub max_request_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            mode: ServerMode::Release,
            static_dir: "static".to_string(),
            max_request_body_size: 1024 * 1024,
        }
    }
}

/// PostgreSQL connection settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Database name
    pub db: String,
    pub ssl_mode: SslMode,
    /// Upper bound of pooled connections
    pub max_connections: u32,
    /// How long to wait for a pooled connection before failing
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "password".to_string(),
            db: "portico".to_string(),
            ssl_mode: SslMode::Disable,
            max_connections: 10,
            acquire_timeout_secs: 5,
        }
    }
}

// Manual impl keeps the password out of logs.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("db", &self.db)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .finish()
    }
}

impl DatabaseConfig {
    /// Build sqlx connection options from this section.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.db)
            .ssl_mode(self.ssl_mode.into())
    }

    /// Connection target for log lines (no credentials).
    pub fn display_target(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.db)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// Response hardening and host/proxy trust.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Accepted `Host` header values. Empty accepts any host.
    pub allowed_hosts: Vec<String>,
    /// `Strict-Transport-Security` max-age; 0 disables the header
    pub sts_seconds: u64,
    pub sts_include_subdomains: bool,
    pub frame_deny: bool,
    pub content_type_nosniff: bool,
    pub browser_xss_filter: bool,
    /// Empty disables the header
    pub content_security_policy: String,
    /// Trusted proxy CIDR ranges for client IP resolution.
    ///
    /// Empty trusts forwarding headers from any peer, which is only
    /// acceptable when the service is not reachable directly.
    pub trusted_proxies: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: vec![],
            sts_seconds: 86400 * 365,
            sts_include_subdomains: true,
            frame_deny: true,
            content_type_nosniff: true,
            browser_xss_filter: true,
            content_security_policy: "default-src 'self'".to_string(),
            trusted_proxies: vec![],
        }
    }
}

/// Session cookie and store settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Hex encoded 64-byte key for the encrypted cookie
    pub key: String,
    pub store: SessionStoreKind,
    pub path: String,
    /// Empty means a host-only cookie
    pub domain: String,
    /// Session lifetime in seconds since last activity
    pub max_age: i64,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSiteMode,
    /// How often expired sessions are swept from the store
    pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key: DEV_SESSION_KEY.to_string(),
            store: SessionStoreKind::Memory,
            path: "/".to_string(),
            domain: String::new(),
            max_age: 86400 * 30,
            secure: false,
            http_only: true,
            same_site: SameSiteMode::Lax,
            cleanup_interval_secs: 60,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("key", &"<redacted>")
            .field("store", &self.store)
            .field("path", &self.path)
            .field("domain", &self.domain)
            .field("max_age", &self.max_age)
            .field("secure", &self.secure)
            .field("http_only", &self.http_only)
            .field("same_site", &self.same_site)
            .field("cleanup_interval_secs", &self.cleanup_interval_secs)
            .finish()
    }
}

impl SessionConfig {
    /// Decode the hex session key.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the key is not valid hex or does
    /// not decode to exactly [`SESSION_KEY_LEN`] bytes.
    pub fn key_bytes(&self) -> AppResult<Vec<u8>> {
        let bytes = hex::decode(self.key.trim())
            .map_err(|e| AppError::ConfigError(format!("Invalid SESSION_KEY: {e}")))?;
        if bytes.len() != SESSION_KEY_LEN {
            return Err(AppError::ConfigError(format!(
                "SESSION_KEY must decode to {SESSION_KEY_LEN} bytes (got {})",
                bytes.len()
            )));
        }
        Ok(bytes)
    }

    pub fn uses_dev_key(&self) -> bool {
        self.key == DEV_SESSION_KEY
    }
}

/// Login throttling settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sustained login attempts per second per IP; 0 disables limiting
    pub login_rps: u32,
    /// Attempts allowed instantly before the sustained rate applies
    pub login_burst: u32,
    /// How often idle per-IP buckets are pruned
    pub prune_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login_rps: 2,
            login_burst: 5,
            prune_interval_secs: 60,
        }
    }
}

/// Logging and metrics settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter when `RUST_LOG` is unset
    pub log_level: String,
    pub log_format: LogFormat,
    /// Prometheus exporter port, 0 = disabled
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_port: 9090,
        }
    }
}

// =============================================================================
// Enumerated Values
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    Debug,
    Release,
    Test,
}

impl FromStr for ServerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "release" => Ok(Self::Release),
            "test" => Ok(Self::Test),
            other => Err(format!("unknown server mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    Disable,
    Allow,
    Prefer,
    Require,
}

impl FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disable" => Ok(Self::Disable),
            "allow" => Ok(Self::Allow),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            other => Err(format!("unknown ssl mode '{other}'")),
        }
    }
}

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Allow => PgSslMode::Allow,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSiteMode {
    Lax,
    Strict,
    None,
}

impl FromStr for SameSiteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lax" => Ok(Self::Lax),
            "strict" => Ok(Self::Strict),
            "none" => Ok(Self::None),
            other => Err(format!("unknown same-site mode '{other}'")),
        }
    }
}

impl From<SameSiteMode> for SameSite {
    fn from(mode: SameSiteMode) -> Self {
        match mode {
            SameSiteMode::Lax => SameSite::Lax,
            SameSiteMode::Strict => SameSite::Strict,
            SameSiteMode::None => SameSite::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreKind {
    Memory,
    Postgres,
}

impl FromStr for SessionStoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" => Ok(Self::Postgres),
            other => Err(format!("unknown session store '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

impl Config {
    /// Load configuration from an optional TOML file plus environment overrides.
    ///
    /// A missing file is not an error: defaults and the environment are used.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the file cannot be parsed, an
    /// environment override has the wrong type, or validation fails.
    pub fn load(path: &Path) -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                AppError::ConfigError(format!("Cannot read {}: {e}", path.display()))
            })?;
            Self::from_toml(&raw)?
        } else {
            debug!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML document, filling unspecified keys with defaults.
    pub fn from_toml(raw: &str) -> AppResult<Self> {
        toml::from_str(raw).map_err(|e| AppError::ConfigError(format!("Invalid config file: {e}")))
    }

    /// Apply `SECTION_KEY` environment variable overrides.
    fn apply_env_overrides(&mut self) -> AppResult<()> {
        // Server
        override_env(&mut self.server.host, "SERVER_HOST")?;
        override_env(&mut self.server.port, "SERVER_PORT")?;
        override_env(&mut self.server.mode, "SERVER_MODE")?;
        override_env(&mut self.server.static_dir, "SERVER_STATIC_DIR")?;
        override_env(
            &mut self.server.max_request_body_size,
            "SERVER_MAX_REQUEST_BODY_SIZE",
        )?;

        // Database
        override_env(&mut self.database.host, "DATABASE_HOST")?;
        override_env(&mut self.database.port, "DATABASE_PORT")?;
        override_env(&mut self.database.user, "DATABASE_USER")?;
        override_env(&mut self.database.password, "DATABASE_PASSWORD")?;
        override_env(&mut self.database.db, "DATABASE_DB")?;
        override_env(&mut self.database.ssl_mode, "DATABASE_SSL_MODE")?;
        override_env(&mut self.database.max_connections, "DATABASE_MAX_CONNECTIONS")?;
        override_env(
            &mut self.database.acquire_timeout_secs,
            "DATABASE_ACQUIRE_TIMEOUT_SECS",
        )?;

        // Security
        override_list(&mut self.security.allowed_hosts, "SECURITY_ALLOWED_HOSTS");
        override_env(&mut self.security.sts_seconds, "SECURITY_STS_SECONDS")?;
        override_env(
            &mut self.security.sts_include_subdomains,
            "SECURITY_STS_INCLUDE_SUBDOMAINS",
        )?;
        override_env(&mut self.security.frame_deny, "SECURITY_FRAME_DENY")?;
        override_env(
            &mut self.security.content_type_nosniff,
            "SECURITY_CONTENT_TYPE_NOSNIFF",
        )?;
        override_env(
            &mut self.security.browser_xss_filter,
            "SECURITY_BROWSER_XSS_FILTER",
        )?;
        override_env(
            &mut self.security.content_security_policy,
            "SECURITY_CONTENT_SECURITY_POLICY",
        )?;
        override_list(&mut self.security.trusted_proxies, "SECURITY_TRUSTED_PROXIES");

        // Session
        override_env(&mut self.session.key, "SESSION_KEY")?;
        override_env(&mut self.session.store, "SESSION_STORE")?;
        override_env(&mut self.session.path, "SESSION_PATH")?;
        override_env(&mut self.session.domain, "SESSION_DOMAIN")?;
        override_env(&mut self.session.max_age, "SESSION_MAX_AGE")?;
        override_env(&mut self.session.secure, "SESSION_SECURE")?;
        override_env(&mut self.session.http_only, "SESSION_HTTP_ONLY")?;
        override_env(&mut self.session.same_site, "SESSION_SAME_SITE")?;
        override_env(
            &mut self.session.cleanup_interval_secs,
            "SESSION_CLEANUP_INTERVAL_SECS",
        )?;

        // Rate limiting
        override_env(&mut self.rate_limit.login_rps, "RATE_LIMIT_LOGIN_RPS")?;
        override_env(&mut self.rate_limit.login_burst, "RATE_LIMIT_LOGIN_BURST")?;
        override_env(
            &mut self.rate_limit.prune_interval_secs,
            "RATE_LIMIT_PRUNE_INTERVAL_SECS",
        )?;

        // Observability
        override_env(&mut self.observability.log_level, "OBSERVABILITY_LOG_LEVEL")?;
        override_env(&mut self.observability.log_format, "OBSERVABILITY_LOG_FORMAT")?;
        override_env(&mut self.observability.metrics_port, "OBSERVABILITY_METRICS_PORT")?;

        Ok(())
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        self.session.key_bytes()?;

        if self.session.max_age <= 0 {
            return Err(AppError::ConfigError(
                "SESSION_MAX_AGE must be greater than 0".to_string(),
            ));
        }

        // Browsers drop SameSite=None cookies that are not Secure
        if self.session.same_site == SameSiteMode::None && !self.session.secure {
            return Err(AppError::ConfigError(
                "SESSION_SAME_SITE=none requires SESSION_SECURE=true".to_string(),
            ));
        }

        if self.server.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "SERVER_MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(AppError::ConfigError(
                "DATABASE_MAX_CONNECTIONS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Check if login rate limiting is enabled.
    pub fn rate_limiting_enabled(&self) -> bool {
        self.rate_limit.login_rps > 0
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.observability.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        if self.metrics_enabled() {
            Some(std::net::SocketAddr::from((
                [0, 0, 0, 0],
                self.observability.metrics_port,
            )))
        } else {
            None
        }
    }

    /// Default tracing filter when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &str {
        match self.server.mode {
            ServerMode::Debug => "debug",
            _ => &self.observability.log_level,
        }
    }
}

/// Replace `target` with the parsed value of environment variable `name`, if set.
fn override_env<T>(target: &mut T, name: &str) -> AppResult<()>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    if let Ok(val) = env::var(name) {
        *target = val
            .parse()
            .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}")))?;
    }
    Ok(())
}

/// Replace `target` with a comma-separated list from environment variable `name`, if set.
fn override_list(target: &mut Vec<String>, name: &str) {
    if let Ok(val) = env::var(name) {
        *target = parse_list(&val);
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.rate_limit.login_rps, 2);
        assert_eq!(config.rate_limit.login_burst, 5);
        assert_eq!(config.session.max_age, 86400 * 30);
        assert_eq!(config.session.same_site, SameSiteMode::Lax);
        assert!(config.session.http_only);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_addr_format() {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 8080;

        assert_eq!(config.server_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_toml_partial_sections_use_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 8081
            mode = "debug"

            [database]
            host = "db.internal"
            ssl_mode = "require"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.mode, ServerMode::Debug);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.ssl_mode, SslMode::Require);
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.default_log_filter(), "debug");
    }

    #[test]
    fn test_toml_rejects_unknown_enum_value() {
        let result = Config::from_toml(
            r#"
            [session]
            same_site = "sometimes"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_session_key_must_be_64_bytes() {
        let mut config = Config::default();
        config.session.key = "abcd".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("SESSION_KEY"));

        config.session.key = "zz".repeat(64);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_site_none_requires_secure() {
        let mut config = Config::default();
        config.session.same_site = SameSiteMode::None;
        assert!(config.validate().is_err());

        config.session.secure = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_body_size_zero() {
        let mut config = Config::default();
        config.server.max_request_body_size = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("SERVER_MAX_REQUEST_BODY_SIZE"));
    }

    #[test]
    fn test_rate_limiting_enabled() {
        let mut config = Config::default();
        assert!(config.rate_limiting_enabled());

        config.rate_limit.login_rps = 0;
        assert!(!config.rate_limiting_enabled());
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let config = Config::default();
        let rendered = format!("{config:?}");

        assert!(!rendered.contains(DEV_SESSION_KEY));
        assert!(!rendered.contains("\"password\""));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_parse_list_trims_and_skips_empty() {
        assert_eq!(
            parse_list(" example.com, ,www.example.com "),
            vec!["example.com".to_string(), "www.example.com".to_string()]
        );
    }

    #[test]
    fn test_enum_from_str_is_case_insensitive() {
        assert_eq!("REQUIRE".parse::<SslMode>().unwrap(), SslMode::Require);
        assert_eq!("Postgres".parse::<SessionStoreKind>().unwrap(), SessionStoreKind::Postgres);
        assert!("tls".parse::<SslMode>().is_err());
    }
}
