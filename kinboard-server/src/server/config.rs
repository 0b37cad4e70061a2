use serde::Deserialize;
use std::{env, fs, path::Path};

/// Server configuration, loaded from a YAML file. The signing secrets are
/// required fields so a deployment without them refuses to start instead of
/// falling back to something guessable.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HS256 secret for access tokens.
    pub jwt_secret: String,
    /// HS256 secret for refresh tokens. Must differ from `jwt_secret` so an
    /// access token can never pass for a refresh token.
    pub refresh_secret: String,
    #[serde(default)]
    pub listen_port: Option<u16>,
    #[serde(default)]
    pub dev_cors_origin: Option<String>,
    /// bcrypt cost factor for family PINs; defaults to the library default.
    #[serde(default)]
    pub bcrypt_cost: Option<u32>,
    /// How many recent messages a chat history fetch returns.
    #[serde(default = "default_chat_history_limit")]
    pub chat_history_limit: i64,
}

fn default_chat_history_limit() -> i64 {
    50
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Yaml(e) => write!(f, "YAML error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(value: serde_yaml::Error) -> Self {
        ConfigError::Yaml(value)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
        Self::load_from_path(path)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(&path)?;
        let cfg: AppConfig = serde_yaml::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("jwt_secret must not be empty".into()));
        }
        if self.refresh_secret.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "refresh_secret must not be empty".into(),
            ));
        }
        if self.jwt_secret == self.refresh_secret {
            return Err(ConfigError::Invalid(
                "jwt_secret and refresh_secret must differ".into(),
            ));
        }
        if self.chat_history_limit <= 0 {
            return Err(ConfigError::Invalid(
                "chat_history_limit must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let cfg: AppConfig = serde_yaml::from_str(
            "jwt_secret: access-secret\nrefresh_secret: refresh-secret\n",
        )
        .unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.chat_history_limit, 50);
        assert!(cfg.listen_port.is_none());
    }

    #[test]
    fn rejects_missing_secrets() {
        let res: Result<AppConfig, _> = serde_yaml::from_str("listen_port: 4000\n");
        assert!(res.is_err());
    }

    #[test]
    fn rejects_identical_secrets() {
        let cfg: AppConfig =
            serde_yaml::from_str("jwt_secret: same\nrefresh_secret: same\n").unwrap();
        assert!(cfg.validate().is_err());
    }
}
