use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use shared::domain::RESTRICTED_ROLE;
use url::Url;

use crate::error::ClientError;

pub const DEFAULT_PAGE_SIZE: u32 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api_base_url: String,
    pub page_size: u32,
    pub credentials_db_url: String,
    pub restricted_role: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080".into(),
            page_size: DEFAULT_PAGE_SIZE,
            credentials_db_url: "sqlite://./data/credentials.db".into(),
            restricted_role: RESTRICTED_ROLE.into(),
        }
    }
}

impl Settings {
    pub fn base_url(&self) -> Result<Url, ClientError> {
        parse_base_url(&self.api_base_url)
    }
}

/// Defaults, then `client.toml` if present, then `APP__*` variables.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from("client", "APP")
}

pub fn load_settings_from(file_stem: &str, env_prefix: &str) -> Result<Settings, ConfigError> {
    let defaults = Settings::default();
    let settings: Settings = Config::builder()
        .set_default("api_base_url", defaults.api_base_url)?
        .set_default("page_size", i64::from(defaults.page_size))?
        .set_default("credentials_db_url", defaults.credentials_db_url)?
        .set_default("restricted_role", defaults.restricted_role)?
        .add_source(File::with_name(file_stem).required(false))
        .add_source(
            Environment::with_prefix(env_prefix)
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    if settings.page_size == 0 {
        return Err(ConfigError::Message("page_size must be at least 1".into()));
    }
    Ok(settings)
}

/// Joins are relative, so the base must end with `/` or its last path
/// segment gets replaced.
pub fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let trimmed = raw.trim();
    let mut url = Url::parse(trimmed)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use std::{
        env, fs,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn unique_suffix() -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    }

    #[test]
    fn missing_file_yields_defaults() {
        let stem = env::temp_dir().join(format!("registry_missing_{}", unique_suffix()));
        let settings =
            load_settings_from(stem.to_string_lossy().as_ref(), "REGISTRY_TEST_NONE").expect("load");
        assert_eq!(settings.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(settings.restricted_role, "ROLE_USER");
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = env::temp_dir().join(format!("registry_cfg_{}", unique_suffix()));
        fs::create_dir_all(&dir).expect("dir");
        let path = dir.join("client.toml");
        fs::write(
            &path,
            "api_base_url = \"https://api.example.test/v1\"\npage_size = 10\n",
        )
        .expect("write");

        let stem = dir.join("client");
        let settings =
            load_settings_from(stem.to_string_lossy().as_ref(), "REGISTRY_TEST_FILE").expect("load");
        assert_eq!(settings.api_base_url, "https://api.example.test/v1");
        assert_eq!(settings.page_size, 10);
        assert_eq!(settings.credentials_db_url, Settings::default().credentials_db_url);

        fs::remove_dir_all(dir).expect("cleanup");
    }

    #[test]
    fn environment_overrides_file() {
        env::set_var("REGISTRY_TEST_ENV__PAGE_SIZE", "7");
        let stem = env::temp_dir().join(format!("registry_env_{}", unique_suffix()));
        let settings =
            load_settings_from(stem.to_string_lossy().as_ref(), "REGISTRY_TEST_ENV").expect("load");
        env::remove_var("REGISTRY_TEST_ENV__PAGE_SIZE");
        assert_eq!(settings.page_size, 7);
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = parse_base_url("https://api.example.test/v1").expect("url");
        assert_eq!(url.as_str(), "https://api.example.test/v1/");
        assert_eq!(
            url.join("api/cities").expect("join").as_str(),
            "https://api.example.test/v1/api/cities"
        );
    }

    #[test]
    fn rejects_relative_base_url() {
        assert!(matches!(
            parse_base_url("not a url"),
            Err(ClientError::InvalidBaseUrl(_))
        ));
    }
}
