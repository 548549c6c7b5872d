use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

/// Shortest session secret accepted for signing cookies
const MIN_SESSION_SECRET_LEN: usize = 32;
/// Longest admin session accepted, 30 days
pub const MAX_SESSION_TTL_HOURS: u64 = 24 * 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub s3: S3Config,
    #[serde(default)]
    pub messaging: MessagingConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed to call the API with credentials. Empty allows any origin without cookies.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Signs the session cookie. Required.
    #[serde(default)]
    pub session_secret: Option<String>,
    /// Shared password for admins without a personal password hash
    #[serde(default)]
    pub admin_password: Option<String>,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u64,
    /// Admin row guaranteed to exist at startup
    #[serde(default)]
    pub bootstrap_email: Option<String>,
    #[serde(default)]
    pub bootstrap_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadBackend {
    Local,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    #[serde(default = "default_upload_backend")]
    pub backend: UploadBackend,
    /// Where the local backend keeps files
    #[serde(default = "default_upload_dir")]
    pub dir: String,
    /// Temp files for in-flight uploads. Defaults to `{dir}/.staging`.
    #[serde(default)]
    pub staging_dir: Option<String>,
    /// URL prefix the local files are served under
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: Option<String>,
    pub region: Option<String>,
    /// Base of the public object URL. Defaults to the bucket's virtual-host URL.
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    #[serde(default)]
    pub account_sid: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Sender WhatsApp number, e.g. `+14155238886`
    #[serde(default)]
    pub whatsapp_number: Option<String>,
    #[serde(default = "default_messaging_api_base")]
    pub api_base: String,
}

/// Credentials needed before any message can be sent
#[derive(Debug, Clone)]
pub struct MessagingCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub whatsapp_number: String,
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub enabled: bool,
    /// Use local sendmail binary instead of SMTP server
    #[serde(default = "default_true")]
    pub use_sendmail: bool,
    /// SMTP server host (only used if use_sendmail is false)
    #[serde(default)]
    pub host: String,
    /// SMTP server port (only used if use_sendmail is false)
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// SMTP username (only used if use_sendmail is false)
    #[serde(default)]
    pub username: String,
    /// SMTP password (only used if use_sendmail is false)
    #[serde(default)]
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    /// Hosts who receive an email for every RSVP
    #[serde(default)]
    pub notify_to: Vec<String>,
}

fn default_true() -> bool { true }
fn default_smtp_port() -> u16 { 587 }
fn default_session_ttl_hours() -> u64 { 24 }

impl AuthConfig {
    /// The cookie signing secret, checked for presence and length
    pub fn signing_secret(&self) -> Result<&str, ConfigError> {
        let secret = self
            .session_secret
            .as_deref()
            .ok_or(ConfigError::Missing("SESSION_SECRET"))?;
        if secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::Invalid {
                var: "SESSION_SECRET",
                reason: format!("must be at least {} bytes", MIN_SESSION_SECRET_LEN),
            });
        }
        Ok(secret)
    }

    /// Session lifetime, kept within 1 hour and MAX_SESSION_TTL_HOURS
    pub fn session_ttl(&self) -> chrono::Duration {
        let hours = self.session_ttl_hours.clamp(1, MAX_SESSION_TTL_HOURS);
        chrono::Duration::hours(hours as i64)
    }
}
fn default_upload_backend() -> UploadBackend { UploadBackend::Local }
fn default_upload_dir() -> String { "./data/uploads".to_string() }
fn default_public_prefix() -> String { "/uploads".to_string() }
fn default_max_file_bytes() -> u64 { 10 * 1024 * 1024 }
fn default_max_request_bytes() -> usize { 50 * 1024 * 1024 }
fn default_messaging_api_base() -> String { "https://api.twilio.com".to_string() }

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            backend: default_upload_backend(),
            dir: default_upload_dir(),
            staging_dir: None,
            public_prefix: default_public_prefix(),
            max_file_bytes: default_max_file_bytes(),
            max_request_bytes: default_max_request_bytes(),
        }
    }
}

impl UploadsConfig {
    pub fn staging_path(&self) -> PathBuf {
        match &self.staging_dir {
            Some(dir) => PathBuf::from(dir),
            None => PathBuf::from(&self.dir).join(".staging"),
        }
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            whatsapp_number: None,
            api_base: default_messaging_api_base(),
        }
    }
}

impl MessagingConfig {
    /// Fails with the first missing variable name
    pub fn credentials(&self) -> Result<MessagingCredentials, ConfigError> {
        let account_sid = self
            .account_sid
            .clone()
            .ok_or(ConfigError::Missing("TWILIO_ACCOUNT_SID"))?;
        let auth_token = self
            .auth_token
            .clone()
            .ok_or(ConfigError::Missing("TWILIO_AUTH_TOKEN"))?;
        let whatsapp_number = self
            .whatsapp_number
            .clone()
            .ok_or(ConfigError::Missing("TWILIO_WHATSAPP_NUMBER"))?;
        Ok(MessagingCredentials {
            account_sid,
            auth_token,
            whatsapp_number,
            api_base: self.api_base.trim_end_matches('/').to_string(),
        })
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            use_sendmail: true,
            host: "".to_string(),
            port: 587,
            username: "".to_string(),
            password: "".to_string(),
            from_email: "rsvp@localhost".to_string(),
            from_name: "Wedding RSVP".to_string(),
            notify_to: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                cors_origins: Vec::new(),
            },
            database: DatabaseConfig {
                url: "sqlite:./data/wedding.db".to_string(),
            },
            auth: AuthConfig {
                session_secret: None,
                admin_password: None,
                session_ttl_hours: default_session_ttl_hours(),
                bootstrap_email: None,
                bootstrap_name: None,
            },
            uploads: UploadsConfig::default(),
            s3: S3Config::default(),
            messaging: MessagingConfig::default(),
            smtp: SmtpConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        // Try to load from environment variable
        if let Ok(path) = std::env::var("WEDDING_CONFIG") {
            return Self::load_from_path(&PathBuf::from(path));
        }

        // Try to load from default locations
        let default_paths = vec![
            PathBuf::from("wedding-server.toml"),
            PathBuf::from("config/wedding-server.toml"),
            PathBuf::from("/etc/wedding/server.toml"),
        ];

        for path in default_paths {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        // Return default config if no file found
        tracing::warn!("No config file found, using defaults and environment");
        Ok(Self::default())
    }

    fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Environment variables win over file values. Blank variables are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(host) = var("HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::Invalid {
                var: "PORT",
                reason: format!("'{}' is not a port number", port),
            })?;
        }
        if let Some(origins) = var("CORS_ORIGINS") {
            self.server.cors_origins = origins.split(',').map(|o| o.trim().to_string()).collect();
        }
        if let Some(url) = var("DATABASE_URL") {
            self.database.url = url;
        }

        if let Some(secret) = var("SESSION_SECRET") {
            self.auth.session_secret = Some(secret);
        }
        if let Some(hours) = var("SESSION_TTL_HOURS") {
            self.auth.session_ttl_hours = hours.parse().map_err(|_| ConfigError::Invalid {
                var: "SESSION_TTL_HOURS",
                reason: format!("'{}' is not a number of hours", hours),
            })?;
        }
        if let Some(password) = var("ADMIN_PASSWORD") {
            self.auth.admin_password = Some(password);
        }
        if let Some(email) = var("ADMIN_EMAIL") {
            self.auth.bootstrap_email = Some(email);
        }
        if let Some(name) = var("ADMIN_NAME") {
            self.auth.bootstrap_name = Some(name);
        }

        if let Some(backend) = var("UPLOAD_BACKEND") {
            self.uploads.backend = match backend.to_ascii_lowercase().as_str() {
                "local" => UploadBackend::Local,
                "s3" => UploadBackend::S3,
                other => {
                    return Err(ConfigError::Invalid {
                        var: "UPLOAD_BACKEND",
                        reason: format!("expected 'local' or 's3', got '{}'", other),
                    })
                }
            };
        }
        if let Some(dir) = var("UPLOAD_DIR") {
            self.uploads.dir = dir;
        }
        if let Some(bucket) = var("S3_BUCKET") {
            self.s3.bucket = Some(bucket);
        }
        if let Some(region) = var("S3_REGION") {
            self.s3.region = Some(region);
        }
        if let Some(base) = var("S3_PUBLIC_BASE_URL") {
            self.s3.public_base_url = Some(base);
        }

        if let Some(sid) = var("TWILIO_ACCOUNT_SID") {
            self.messaging.account_sid = Some(sid);
        }
        if let Some(token) = var("TWILIO_AUTH_TOKEN") {
            self.messaging.auth_token = Some(token);
        }
        if let Some(number) = var("TWILIO_WHATSAPP_NUMBER") {
            self.messaging.whatsapp_number = Some(number);
        }

        if let Some(enabled) = var("SMTP_ENABLED") {
            self.smtp.enabled = matches!(enabled.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(host) = var("SMTP_HOST") {
            self.smtp.host = host;
            self.smtp.use_sendmail = false;
        }
        if let Some(port) = var("SMTP_PORT") {
            self.smtp.port = port.parse().map_err(|_| ConfigError::Invalid {
                var: "SMTP_PORT",
                reason: format!("'{}' is not a port number", port),
            })?;
        }
        if let Some(from) = var("SMTP_FROM") {
            self.smtp.from_email = from;
        }
        if let Some(name) = var("SMTP_FROM_NAME") {
            self.smtp.from_name = name;
        }
        if let Some(username) = var("SMTP_USERNAME") {
            self.smtp.username = username;
        }
        if let Some(password) = var("SMTP_PASSWORD") {
            self.smtp.password = password;
        }
        if let Some(to) = var("SMTP_NOTIFY_TO") {
            self.smtp.notify_to = to.split(',').map(|a| a.trim().to_string()).collect();
        }
        Ok(())
    }

    /// Startup checks for settings every request path depends on
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.auth.signing_secret()?;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.auth.session_ttl_hours) {
            return Err(ConfigError::Invalid {
                var: "SESSION_TTL_HOURS",
                reason: format!("must be between 1 and {} hours", MAX_SESSION_TTL_HOURS),
            });
        }
        if self.uploads.backend == UploadBackend::S3 && self.s3.bucket.is_none() {
            return Err(ConfigError::Missing("S3_BUCKET"));
        }
        if self.auth.admin_password.is_none() {
            tracing::warn!(
                "ADMIN_PASSWORD is not set: admins without a personal password can log in with any password"
            );
        }
        Ok(())
    }
}
