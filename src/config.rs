use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub email: Option<EmailConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Anything other than "production" includes error diagnostics in 500
    /// responses.
    pub environment: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

/// SMTP settings for admin notifications. The whole section is optional;
/// without it the service runs with notifications disabled.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    /// true for implicit TLS (usually port 465), false for STARTTLS.
    #[serde(default)]
    pub secure: bool,
    pub user: String,
    pub password: String,
    pub admin_email: String,
}

impl AppConfig {
    /// Loads configuration from coded defaults, an optional TOML file
    /// (`feedback-api.toml` in the working directory, then
    /// `~/.config/feedback-api/config.toml`), and finally `FEEDBACK_API_*`
    /// environment variables. Captured once at startup; never re-read.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = defaults()?;

        if let Ok(current_dir) = std::env::current_dir() {
            let config_path = current_dir.join("feedback-api.toml");
            if config_path.exists() {
                builder = builder.add_source(File::from(config_path));
            }
        }

        if let Some(home) = home::home_dir() {
            let config_path = home.join(".config/feedback-api/config.toml");
            builder = builder.add_source(File::from(config_path).required(false));
        }

        let builder =
            builder.add_source(Environment::with_prefix("FEEDBACK_API").separator("__"));

        let mut config: AppConfig = builder.build()?.try_deserialize()?;
        config.expand_database_path();
        Ok(config)
    }

    pub fn load_from_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::Message(format!(
                "Configuration file not found: {}",
                config_path.display()
            )));
        }

        let builder = defaults()?
            .add_source(File::from(config_path.to_path_buf()))
            .add_source(Environment::with_prefix("FEEDBACK_API").separator("__"));

        let mut config: AppConfig = builder.build()?.try_deserialize()?;
        config.expand_database_path();
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.server.environment == "production"
    }

    fn expand_database_path(&mut self) {
        if self.database.path.starts_with("~") {
            if let Some(home) = home::home_dir() {
                let path_str = self.database.path.to_string_lossy();
                let expanded = path_str.replacen('~', &home.to_string_lossy(), 1);
                self.database.path = PathBuf::from(expanded);
            }
        }
    }
}

fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5000)?
        .set_default("server.environment", "development")?
        .set_default("database.path", "feedback.db")?
        .set_default(
            "cors.allowed_origins",
            vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
        )
}
