use std::env;

/// Process-wide configuration, loaded once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub use_object_storage: bool,
    pub storage_endpoint: String,
    pub storage_access_key: String,
    pub storage_secret_key: String,
    pub storage_bucket: String,
    pub storage_region: String,
    pub default_user_agent: String,
    pub max_concurrent_jobs: usize,
    pub max_concurrent_fetches: usize,
    pub snapshot_every_pages: usize,
    pub summarizer_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue("PORT", "must be a valid u16"))?;

        let use_object_storage = env::var("USE_OBJECT_STORAGE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let storage_endpoint = env::var("STORAGE_ENDPOINT").unwrap_or_default();
        let storage_access_key = env::var("STORAGE_ACCESS_KEY").unwrap_or_default();
        let storage_secret_key = env::var("STORAGE_SECRET_KEY").unwrap_or_default();
        let storage_bucket =
            env::var("BUCKET_NAME").unwrap_or_else(|_| "llm-txt-jobs".to_string());
        let storage_region = env::var("REGION").unwrap_or_else(|_| "auto".to_string());

        if use_object_storage && storage_endpoint.is_empty() {
            return Err(ConfigError::Missing("STORAGE_ENDPOINT"));
        }

        let default_user_agent =
            env::var("USER_AGENT").unwrap_or_else(|_| "llm-txt-generator/0.1.0".to_string());

        let max_concurrent_jobs = env::var("MAX_CONCURRENT_JOBS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::InvalidValue("MAX_CONCURRENT_JOBS", "must be a valid usize")
            })?;

        let max_concurrent_fetches = env::var("MAX_CONCURRENT_FETCHES")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::InvalidValue("MAX_CONCURRENT_FETCHES", "must be a valid usize")
            })?;

        let snapshot_every_pages = env::var("SNAPSHOT_EVERY_PAGES")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::InvalidValue("SNAPSHOT_EVERY_PAGES", "must be a valid usize")
            })?;

        let summarizer_api_key = env::var("LLM_SUMMARIZER_API_KEY").ok();

        Ok(Config {
            port,
            use_object_storage,
            storage_endpoint,
            storage_access_key,
            storage_secret_key,
            storage_bucket,
            storage_region,
            default_user_agent,
            max_concurrent_jobs,
            max_concurrent_fetches,
            snapshot_every_pages,
            summarizer_api_key,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, &'static str),
}
