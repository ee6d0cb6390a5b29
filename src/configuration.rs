use std::path::{Path, PathBuf};

use config::{Config, ConfigError, File};
use secrecy::Secret;
use serde_aux::field_attributes::deserialize_number_from_string;

use crate::query::RowPolicy;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub provider: ProviderSettings,
    pub store: StoreSettings,
    #[serde(default)]
    pub query: QuerySettings,
}

/// flow-segment endpoint of the traffic provider.
#[derive(serde::Deserialize, Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    pub api_key: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub zoom: u8,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_secs: u64,
}

#[derive(serde::Deserialize, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub table: String,
    pub sqlite: Option<SqliteSettings>,
    pub postgrest: Option<PostgrestSettings>,
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Sqlite,
    Postgrest,
}

#[derive(serde::Deserialize, Clone)]
pub struct SqliteSettings {
    pub path: PathBuf,
}

#[derive(serde::Deserialize, Clone)]
pub struct PostgrestSettings {
    pub uri: String,
    pub key: Secret<String>,
}

#[derive(serde::Deserialize, Clone, Default)]
pub struct QuerySettings {
    #[serde(default)]
    pub row_policy: RowPolicy,
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| ConfigError::Foreign(Box::new(e)))?;
    get_configuration_from(&base_path.join("configuration"))
}

/// layers `base`, then the file named after `APP_ENVIRONMENT`, then `APP_`
/// prefixed environment variables (`APP_PROVIDER__API_KEY=...`).
pub fn get_configuration_from(configuration_directory: &Path) -> Result<Settings, ConfigError> {
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(ConfigError::Message)?;

    let config = Config::builder()
        .add_source(File::from(configuration_directory.join("base")).required(true))
        .add_source(File::from(configuration_directory.join(environment.as_str())).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    config.try_deserialize()
}

pub enum Environment {
    Local,
    Production,
}
impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}
impl TryFrom<String> for Environment {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}
