use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::llm_client::{DEFAULT_MODEL, DEFAULT_OLLAMA_URL};
use crate::pipeline::{DEFAULT_LIMIT, MAX_LIMIT};
use crate::scoring::relevance::DEFAULT_RELEVANCE_THRESHOLD;

/// Application configuration loaded from environment variables.
/// Startup fails if a value is present but unparseable.
#[derive(Debug, Clone)]
pub struct Config {
    /// No database means the in-memory store.
    pub database_url: Option<String>,
    pub ollama_url: String,
    pub ollama_model: String,
    pub relevance_threshold: f64,
    pub min_post_score: i64,
    pub min_comments: i64,
    pub scoring_concurrency: usize,
    pub search_default_limit: u32,
    pub search_max_limit: u32,
    pub reddit_user_agent: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            ollama_url: env_or("OLLAMA_URL", DEFAULT_OLLAMA_URL),
            ollama_model: env_or("OLLAMA_MODEL", DEFAULT_MODEL),
            relevance_threshold: parse_env("RELEVANCE_THRESHOLD", DEFAULT_RELEVANCE_THRESHOLD)?,
            min_post_score: parse_env("MIN_POST_SCORE", 10)?,
            min_comments: parse_env("MIN_COMMENTS", 5)?,
            scoring_concurrency: parse_env("SCORING_CONCURRENCY", 4)?,
            search_default_limit: parse_env("SEARCH_DEFAULT_LIMIT", DEFAULT_LIMIT)?,
            search_max_limit: parse_env("SEARCH_MAX_LIMIT", MAX_LIMIT)?,
            reddit_user_agent: env_or(
                "REDDIT_USER_AGENT",
                &format!("scout/{}", env!("CARGO_PKG_VERSION")),
            ),
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.relevance_threshold) {
            bail!("RELEVANCE_THRESHOLD must be between 0 and 1");
        }
        if self.scoring_concurrency == 0 {
            bail!("SCORING_CONCURRENCY must be at least 1");
        }
        if self.search_default_limit == 0 || self.search_default_limit > self.search_max_limit {
            bail!("SEARCH_DEFAULT_LIMIT must be between 1 and SEARCH_MAX_LIMIT");
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_uses_default_when_unset() {
        let value: u32 = parse_env("SCOUT_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_env_reports_bad_value() {
        std::env::set_var("SCOUT_TEST_BAD_PORT", "eighty");
        let err = parse_env::<u16>("SCOUT_TEST_BAD_PORT", 8080).unwrap_err();
        assert!(err.to_string().contains("SCOUT_TEST_BAD_PORT"));
    }

    #[test]
    fn test_threshold_out_of_range_is_rejected() {
        let config = Config {
            database_url: None,
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_model: DEFAULT_MODEL.to_string(),
            relevance_threshold: 1.5,
            min_post_score: 10,
            min_comments: 5,
            scoring_concurrency: 4,
            search_default_limit: DEFAULT_LIMIT,
            search_max_limit: MAX_LIMIT,
            reddit_user_agent: "scout-test".to_string(),
            port: 8080,
            rust_log: "info".to_string(),
        };
        assert!(config.validate().is_err());
    }
}
