//! Server configuration: a TOML file plus environment overrides for
//! secrets.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clientele_auth::AuthConfig;
use clientele_db::DbConfig;
use serde::Deserialize;

pub const CONFIG_PATH_ENV: &str = "CLIENTELE_CONFIG";
pub const JWT_SECRET_ENV: &str = "CLIENTELE_JWT_SECRET";
pub const SMTP_PASSWORD_ENV: &str = "CLIENTELE_SMTP_PASSWORD";
const DEFAULT_CONFIG_FILE: &str = "clientele.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub email: EmailConfig,
    pub refresh_store: RefreshStoreBackend,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed to call the API. Empty forbids every
    /// cross-origin request; `"*"` allows all of them.
    pub cors_allowed_origins: Vec<String>,
}

/// The web front end's development server.
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            cors_allowed_origins: vec![DEFAULT_CORS_ORIGIN.into()],
        }
    }
}

impl HttpConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let db = DbConfig::default();
        Self {
            url: db.url,
            namespace: db.namespace,
            database: db.database,
            username: db.username,
            password: db.password,
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url)
            .field("namespace", &self.namespace)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl From<&DatabaseConfig> for DbConfig {
    fn from(c: &DatabaseConfig) -> Self {
        DbConfig {
            url: c.url.clone(),
            namespace: c.namespace.clone(),
            database: c.database.clone(),
            username: c.username.clone(),
            password: c.password.clone(),
        }
    }
}

/// Outgoing mail. Without `smtp_host` messages are only logged.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: String,
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            from_address: "no-reply@localhost".into(),
            from_name: "CRM".into(),
        }
    }
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field(
                "smtp_password",
                &self.smtp_password.as_ref().map(|_| "<redacted>"),
            )
            .field("from_address", &self.from_address)
            .field("from_name", &self.from_name)
            .finish()
    }
}

/// Where outstanding refresh tokens live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStoreBackend {
    /// Process memory. Tokens do not survive a restart.
    #[default]
    Memory,
    /// The `refresh_token` table.
    Database,
}

impl ServerConfig {
    /// Path from `CLIENTELE_CONFIG`, else `clientele.toml`.
    pub fn default_path() -> PathBuf {
        std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Read `path` if it exists (defaults otherwise) and apply secret
    /// overrides from the environment.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Self::parse(&content).with_context(|| format!("parsing {}", path.display()))?
        } else {
            tracing::warn!(path = %path.display(), "config file not found; using defaults");
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = lookup(JWT_SECRET_ENV).filter(|s| !s.is_empty()) {
            self.auth.jwt_secret = secret;
        }
        if let Some(password) = lookup(SMTP_PASSWORD_ENV).filter(|s| !s.is_empty()) {
            self.email.smtp_password = Some(password);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ServerConfig::parse("").unwrap();
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.http.cors_allowed_origins, [DEFAULT_CORS_ORIGIN]);
        assert_eq!(config.auth.access_token_lifetime_hours, 1);
        assert_eq!(config.auth.refresh_token_lifetime_days, 7);
        assert_eq!(config.refresh_store, RefreshStoreBackend::Memory);
        assert!(config.email.smtp_host.is_none());
    }

    #[test]
    fn sections_are_read() {
        let config = ServerConfig::parse(
            r#"
            refresh_store = "database"

            [http]
            port = 9000
            cors_allowed_origins = ["https://crm.example.test", "https://admin.example.test"]

            [auth]
            jwt_issuer = "crm"
            access_token_lifetime_hours = 2

            [email]
            smtp_host = "smtp.example.test"
            from_address = "crm@example.test"
            "#,
        )
        .unwrap();
        assert_eq!(config.http.bind_addr(), "0.0.0.0:9000");
        assert_eq!(
            config.http.cors_allowed_origins,
            ["https://crm.example.test", "https://admin.example.test"]
        );
        assert_eq!(config.auth.jwt_issuer, "crm");
        assert_eq!(config.auth.access_token_lifetime_hours, 2);
        assert_eq!(config.auth.min_password_length, 6);
        assert_eq!(config.refresh_store, RefreshStoreBackend::Database);
        assert_eq!(config.email.smtp_host.as_deref(), Some("smtp.example.test"));
        assert_eq!(config.email.smtp_port, 587);
    }

    #[test]
    fn env_overrides_secrets() {
        let mut config = ServerConfig::parse("[auth]\njwt_secret = \"from-file\"").unwrap();
        config.apply_env(|key| match key {
            JWT_SECRET_ENV => Some("from-env".into()),
            SMTP_PASSWORD_ENV => Some("smtp-pw".into()),
            _ => None,
        });
        assert_eq!(config.auth.jwt_secret, "from-env");
        assert_eq!(config.email.smtp_password.as_deref(), Some("smtp-pw"));
    }

    #[test]
    fn empty_env_value_is_ignored() {
        let mut config = ServerConfig::parse("[auth]\njwt_secret = \"from-file\"").unwrap();
        config.apply_env(|_| Some(String::new()));
        assert_eq!(config.auth.jwt_secret, "from-file");
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(ServerConfig::parse("refresh_store = \"redis\"").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ServerConfig::load_from(Path::new("/nonexistent/clientele.toml")).unwrap();
        assert_eq!(config.http.port, 8080);
    }
}
