use std::{num::NonZeroU32, str::FromStr};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Env {
    Dev,
    Staging,
    Production,
}

pub struct ServerConfig {
    pub env: Env,
    pub database_url: String,
    pub site_url: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub admin_identity_ids: Vec<i32>,
    pub comment_rate_limit_per_minute: NonZeroU32,
}

const DEFAULT_SITE_URL: &str = "http://localhost:4321";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_COMMENT_RATE_LIMIT: u32 = 10;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Environment variable `{0}` is required")]
    Missing(String),

    #[error("Could not get the environment variable `{0}` due to unicode error")]
    NotUnicode(String),
}

/// Where variables are read from: the process environment outside of tests.
type Source<'a> = &'a dyn Fn(&str) -> Result<Option<String>, ConfigError>;

fn process_var(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(env) => Ok(Some(env)),
        Err(std::env::VarError::NotPresent) => {
            tracing::debug!("Missing environment variable `{key}`");
            Ok(None)
        }
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode(key.into())),
    }
}

fn var(source: Source, key: &str) -> Option<String> {
    source(key).unwrap_or_else(|e| {
        tracing::warn!("{e}, ignoring it");
        None
    })
}

fn required_var(source: Source, key: &str) -> Result<String, ConfigError> {
    source(key)?.ok_or_else(|| ConfigError::Missing(key.into()))
}

/// Parses a variable, falling back to `default` when it's absent or malformed
fn parsed_var<T: FromStr>(source: Source, key: &str, default: T) -> T {
    match var(source, key) {
        Some(val) => val.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Environment variable `{key}` has an invalid value `{val}`, using default");
            default
        }),
        None => default,
    }
}

/// Splits a comma separated list, skipping empty and unparsable items.
fn parse_list<T: FromStr>(raw: &str) -> Vec<T> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| match item.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid list item `{item}`");
                None
            }
        })
        .collect()
}

fn parse_env(raw: Option<&str>) -> Env {
    match raw {
        Some("dev") => Env::Dev,
        Some("staging") => Env::Staging,
        Some("production") => Env::Production,
        _ => Env::Dev,
    }
}

impl Env {
    /// Read on its own so logging can be set up before the rest of the
    /// configuration is loaded.
    pub fn from_env() -> Self {
        parse_env(var(&process_var, "ENVIRONMENT").as_deref())
    }
}

impl ServerConfig {
    /// Loads the configuration from the process environment. A missing
    /// required variable is logged and ends the process.
    pub fn new_from_env(env: Env) -> Self {
        Self::from_source(env, &process_var).unwrap_or_else(|e| {
            tracing::error!("{e}");
            std::process::exit(1)
        })
    }

    fn from_source(env: Env, source: Source) -> Result<Self, ConfigError> {
        let site_url = var(source, "SITE_URL")
            .unwrap_or_else(|| DEFAULT_SITE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let comment_rate_limit_per_minute = NonZeroU32::new(parsed_var(
            source,
            "COMMENT_RATE_LIMIT_PER_MINUTE",
            DEFAULT_COMMENT_RATE_LIMIT,
        ))
        .unwrap_or(NonZeroU32::MIN);

        Ok(ServerConfig {
            env,
            database_url: required_var(source, "DATABASE_URL")?,
            site_url,
            port: parsed_var(source, "PORT", DEFAULT_PORT),
            cors_origins: var(source, "CORS_ORIGINS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            admin_identity_ids: var(source, "ADMIN_IDENTITY_IDS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            comment_rate_limit_per_minute,
        })
    }

    pub fn is_admin(&self, identity_id: i32) -> bool {
        self.admin_identity_ids.contains(&identity_id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_list_skips_blank_and_invalid_items() {
        let ids: Vec<i32> = parse_list(" 1, 2,,abc, 42 ");
        assert_eq!(ids, vec![1, 2, 42]);

        let origins: Vec<String> = parse_list("https://a.example, https://b.example");
        assert_eq!(origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn test_parse_env_defaults_to_dev() {
        assert_eq!(parse_env(Some("production")), Env::Production);
        assert_eq!(parse_env(Some("staging")), Env::Staging);
        assert_eq!(parse_env(Some("prod")), Env::Dev);
        assert_eq!(parse_env(None), Env::Dev);
    }

    fn vars(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Result<Option<String>, ConfigError> {
        move |key: &str| {
            Ok(pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string()))
        }
    }

    #[test]
    fn test_missing_database_url_is_reported() {
        let source = vars(&[("PORT", "8080")]);
        let err = ServerConfig::from_source(Env::Dev, &source).err();
        assert_eq!(err, Some(ConfigError::Missing("DATABASE_URL".into())));
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("Environment variable `DATABASE_URL` is required")
        );
    }

    #[test]
    fn test_from_source_defaults_and_overrides() {
        let source = vars(&[
            ("DATABASE_URL", "postgres://localhost/shelf"),
            ("SITE_URL", "https://shelf.example/"),
            ("PORT", "not-a-port"),
            ("ADMIN_IDENTITY_IDS", "3, 5"),
            ("COMMENT_RATE_LIMIT_PER_MINUTE", "0"),
        ]);
        let config = ServerConfig::from_source(Env::Staging, &source).unwrap();

        assert_eq!(config.env, Env::Staging);
        assert_eq!(config.site_url, "https://shelf.example");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.admin_identity_ids, vec![3, 5]);
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.comment_rate_limit_per_minute, NonZeroU32::MIN);
    }

    #[test]
    fn test_unreadable_optional_var_is_ignored() {
        let source = |key: &str| match key {
            "DATABASE_URL" => Ok(Some("postgres://localhost/shelf".to_string())),
            "SITE_URL" => Err(ConfigError::NotUnicode(key.into())),
            _ => Ok(None),
        };
        let config = ServerConfig::from_source(Env::Dev, &source).unwrap();
        assert_eq!(config.site_url, DEFAULT_SITE_URL);
    }

    #[test]
    fn test_is_admin() {
        let config = ServerConfig {
            env: Env::Dev,
            database_url: String::new(),
            site_url: DEFAULT_SITE_URL.into(),
            port: DEFAULT_PORT,
            cors_origins: vec![],
            admin_identity_ids: vec![7, 9],
            comment_rate_limit_per_minute: NonZeroU32::MIN,
        };

        assert!(config.is_admin(7));
        assert!(!config.is_admin(8));
    }
}
