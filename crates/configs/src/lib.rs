//! # configs
//!
//! Layered settings for the skillfeed binaries. Later layers win:
//!
//! 1. built-in defaults
//! 2. `skillfeed.toml` in the working directory, if present
//! 3. `SKILLFEED__<SECTION>__<KEY>` environment variables (a `.env` file is
//!    loaded into the environment first)
//!
//! ```text
//! SKILLFEED__API__BASE_URL=http://localhost:8080
//! SKILLFEED__SESSION__USER_ID=0190a6d2-8b1e-7c3a-9f4e-1a2b3c4d5e6f
//! SKILLFEED__SESSION__TOKEN=...
//! SKILLFEED__SESSION__FOLLOWING=<uuid>,<uuid>
//! SKILLFEED__FEED__SORT=trending
//! ```

use std::time::Duration;

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use sf_core::{AuthToken, Session, SortMode};
use uuid::Uuid;

const ENV_PREFIX: &str = "SKILLFEED";
const FILE_NAME: &str = "skillfeed";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("no session configured (set SKILLFEED__SESSION__USER_ID and SKILLFEED__SESSION__TOKEN)")]
    MissingSession,

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub api: ApiSettings,
    #[serde(default)]
    pub session: Option<SessionSettings>,
    pub feed: FeedSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionSettings {
    pub user_id: Uuid,
    #[serde(default)]
    pub display_name: String,
    #[serde(deserialize_with = "secret_string")]
    pub token: SecretString,
    #[serde(default)]
    pub following: Vec<Uuid>,
}

impl SessionSettings {
    pub fn to_session(&self) -> Session {
        let token = AuthToken::new(self.token.expose_secret());
        Session::new(self.user_id, self.display_name.clone(), token).following(self.following.iter().copied())
    }
}

/// Initial query of the feed view.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedSettings {
    pub sort: SortMode,
    pub search: String,
    pub category: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence when set.
    pub filter: String,
    pub json: bool,
}

fn secret_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

impl AppConfig {
    /// Load `.env`, `skillfeed.toml` and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::assemble(
            defaults()?
                .add_source(File::with_name(FILE_NAME).required(false))
                .add_source(environment()),
        )
    }

    /// Defaults overlaid with a TOML document. No environment lookup.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Self::assemble(defaults()?.add_source(File::from_str(toml, FileFormat::Toml)))
    }

    /// The configured session, which has no default.
    pub fn session(&self) -> Result<Session, ConfigError> {
        self.session
            .as_ref()
            .map(SessionSettings::to_session)
            .ok_or(ConfigError::MissingSession)
    }

    fn assemble(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api.base_url must be an http(s) URL, got `{url}`"
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.timeout_secs must be positive".into()));
        }
        if let Some(session) = &self.session {
            if session.token.expose_secret().trim().is_empty() {
                return Err(ConfigError::Invalid("session.token must not be empty".into()));
            }
        }
        Ok(())
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(config::Config::builder()
        .set_default("api.base_url", "http://localhost:8080")?
        .set_default("api.timeout_secs", 10)?
        .set_default("feed.sort", "latest")?
        .set_default("feed.search", "")?
        .set_default("feed.category", "")?
        .set_default("log.filter", "info,sf_engine=debug")?
        .set_default("log.json", false)?)
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("session.following")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_every_section_but_session() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.api.base_url, "http://localhost:8080");
        assert_eq!(config.api.timeout(), Duration::from_secs(10));
        assert_eq!(config.feed.sort, SortMode::Latest);
        assert!(config.feed.search.is_empty());
        assert!(!config.log.json);
        assert!(matches!(config.session(), Err(ConfigError::MissingSession)));
    }

    #[test]
    fn toml_overrides_defaults() {
        let user = Uuid::now_v7();
        let friend = Uuid::now_v7();
        let config = AppConfig::from_toml(&format!(
            r#"
            [api]
            base_url = "https://feed.example.com"

            [session]
            user_id = "{user}"
            display_name = "Ada"
            token = "s3cret"
            following = ["{friend}"]

            [feed]
            sort = "trending"
            "#
        ))
        .unwrap();

        assert_eq!(config.api.base_url, "https://feed.example.com");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.feed.sort, SortMode::Trending);

        let session = config.session().unwrap();
        assert_eq!(session.user_id, user);
        assert_eq!(session.token.expose(), "s3cret");
        assert_eq!(session.following, vec![friend]);
    }

    #[test]
    fn environment_layer_wins_and_splits_lists() {
        let (user, a, b) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        let vars: config::Map<String, String> = [
            ("SKILLFEED__API__TIMEOUT_SECS", "3".to_string()),
            ("SKILLFEED__LOG__JSON", "true".to_string()),
            ("SKILLFEED__SESSION__USER_ID", user.to_string()),
            ("SKILLFEED__SESSION__TOKEN", "tok".to_string()),
            ("SKILLFEED__SESSION__FOLLOWING", format!("{a},{b}")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let config = AppConfig::assemble(
            defaults()
                .unwrap()
                .add_source(File::from_str("[api]\ntimeout_secs = 30", FileFormat::Toml))
                .add_source(environment().source(Some(vars))),
        )
        .unwrap();

        assert_eq!(config.api.timeout_secs, 3);
        assert!(config.log.json);
        assert_eq!(config.session().unwrap().following, vec![a, b]);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let zero = AppConfig::from_toml("[api]\ntimeout_secs = 0");
        assert!(matches!(zero, Err(ConfigError::Invalid(_))));

        let ftp = AppConfig::from_toml("[api]\nbase_url = \"ftp://x\"");
        assert!(matches!(ftp, Err(ConfigError::Invalid(_))));

        let sort = AppConfig::from_toml("[feed]\nsort = \"random\"");
        assert!(matches!(sort, Err(ConfigError::Load(_))));
    }

    #[test]
    fn session_debug_output_hides_the_token() {
        let config = AppConfig::from_toml(&format!(
            "[session]\nuser_id = \"{}\"\ntoken = \"hunter2\"",
            Uuid::now_v7()
        ))
        .unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
