use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use axum::http::HeaderValue;
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "authgate.toml";
const DEFAULT_IDENTITY_ENDPOINT: &str = "https://identitytoolkit.googleapis.com";

/// Top-level application configuration loaded from file + environment.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub app: AppSection,
    pub identity: IdentitySection,
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Load configuration from disk and environment.
    pub fn load() -> Result<Self> {
        Self::load_from_env(env::vars().collect())
    }

    /// Load configuration with `vars` standing in for the process environment.
    ///
    /// Precedence, lowest first: config file, `AUTHGATE_*` variables,
    /// deployment variables.
    pub fn load_from_env(vars: config::Map<String, String>) -> Result<Self> {
        let config_path = vars
            .get("AUTHGATE_CONFIG")
            .cloned()
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let mut builder = config::Config::builder();

        if Path::new(&config_path).exists() {
            builder = builder.add_source(config::File::from(PathBuf::from(&config_path)));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("AUTHGATE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(Some(vars.clone())),
        );

        let settings = builder.build()?;
        let mut config: Self = settings.try_deserialize()?;

        config.apply_deployment_overrides(|key| vars.get(key).cloned());
        config.normalise();

        Ok(config)
    }

    /// Load configuration from a single file, ignoring the environment.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref().to_path_buf()))
            .build()?;
        let mut config: Self = settings.try_deserialize()?;
        config.normalise();
        Ok(config)
    }

    /// Apply the plain deployment variables (`FRONTEND_URL`, `ENV`,
    /// `GOOGLE_APPLICATION_CREDENTIALS`) on top of the layered sources.
    pub fn apply_deployment_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(origin) = lookup("FRONTEND_URL") {
            self.app.frontend_url = origin;
        }
        if let Some(env_name) = lookup("ENV") {
            self.app.env = env_name;
        }
        if let Some(path) = lookup("GOOGLE_APPLICATION_CREDENTIALS") {
            if !path.trim().is_empty() {
                self.identity.credentials_path = Some(PathBuf::from(path));
            }
        }
    }

    fn normalise(&mut self) {
        if self.logging.level.trim().is_empty() {
            self.logging.level = "info".to_string();
        }
        self.identity.endpoint = self.identity.endpoint.trim_end_matches('/').to_string();
    }

    /// Reject configurations the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.identity.api_key.trim().is_empty() {
            bail!("identity.api_key must be specified");
        }
        if self.identity.timeout_secs == 0 {
            bail!("identity.timeout_secs must be greater than zero");
        }
        if self.identity.endpoint.is_empty() {
            bail!("identity.endpoint must be specified");
        }
        if self.app.frontend_url.trim() == "*" {
            bail!("app.frontend_url must name a single origin, not a wildcard");
        }
        if HeaderValue::from_str(&self.app.frontend_url).is_err() {
            bail!(
                "app.frontend_url is not a valid origin: {:?}",
                self.app.frontend_url
            );
        }
        Ok(())
    }

    /// Project the `app` section into the immutable settings record.
    pub fn settings(&self) -> Settings {
        Settings {
            app_name: self.app.name.clone(),
            env: self.app.env.clone(),
            frontend_url: self.app.frontend_url.clone(),
        }
    }
}

/// Process settings, built once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub app_name: String,
    pub env: String,
    /// The single origin allowed by CORS.
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    pub env: String,
    pub frontend_url: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "authgate".to_string(),
            env: "development".to_string(),
            frontend_url: "NA".to_string(),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct IdentitySection {
    pub api_key: String,
    pub endpoint: String,
    pub credentials_path: Option<PathBuf>,
    pub project_id: Option<String>,
    pub timeout_secs: u64,
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: DEFAULT_IDENTITY_ENDPOINT.to_string(),
            credentials_path: None,
            project_id: None,
            timeout_secs: 10,
        }
    }
}

impl std::fmt::Debug for IdentitySection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentitySection")
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .field("credentials_path", &self.credentials_path)
            .field("project_id", &self.project_id)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}
