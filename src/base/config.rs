//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc};

use serde::Deserialize;

use crate::base::prompts;

use super::types::Res;

/// Default Instagram Graph API base URL.
fn default_graph_api_url() -> String {
    "https://graph.instagram.com/v21.0".to_string()
}

/// Default Gemini API base URL.
fn default_gemini_api_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

/// Default Gemini model to use.
fn default_gemini_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}

/// Default sampling temperature for the reply model.
fn default_gemini_temperature() -> f32 {
    0.9
}

/// Default max output tokens for the reply model.
fn default_gemini_max_tokens() -> u32 {
    500
}

/// Default persona directive for the reply model.
fn default_persona_directive() -> String {
    prompts::PERSONA_DIRECTIVE.to_string()
}

/// Default reply when generation fails.
fn default_fallback_reply() -> String {
    prompts::FALLBACK_REPLY.to_string()
}

/// Default bot display name.
fn default_bot_name() -> String {
    "reply-bot".to_string()
}

/// Default webhook listen address.
fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

/// Default timeout for outbound HTTP calls.
fn default_http_timeout_secs() -> u64 {
    30
}

/// Default number of prior turns given to the reply model.
fn default_history_limit() -> usize {
    20
}

/// Default capacity of the processed-message id cache.
fn default_seen_cache_capacity() -> usize {
    10_000
}

/// Default capacity of the sent-message id cache.
fn default_sent_cache_capacity() -> usize {
    5_000
}

/// Default database endpoint.
fn default_db_endpoint() -> String {
    "memory".to_string()
}

/// Configuration for the reply-bot application.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// The shared inner configuration.
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// The concrete configuration fields, shared behind an `Arc`.
#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// Instagram Graph API access token (`INSTAGRAM_ACCESS_TOKEN`).
    pub instagram_access_token: String,
    /// Instagram app secret used to check webhook signatures
    /// (`INSTAGRAM_APP_SECRET`). Empty disables signature enforcement.
    #[serde(default)]
    pub instagram_app_secret: String,
    /// Token expected during webhook subscription verification (`VERIFY_TOKEN`).
    pub verify_token: String,
    /// Instagram Graph API base URL (`GRAPH_API_URL`).
    #[serde(default = "default_graph_api_url")]
    pub graph_api_url: String,
    /// The bot's page/account id; webhook entries for other accounts are
    /// skipped (`BOT_PAGE_ID`).
    pub bot_page_id: String,
    /// The bot's Instagram-scoped user id, when it differs from the page id
    /// (`BOT_ACCOUNT_ID`). Used for self-message detection.
    #[serde(default)]
    pub bot_account_id: String,
    /// Gemini API key (`GEMINI_API_KEY`).
    pub gemini_api_key: String,
    /// Gemini model to use (`GEMINI_MODEL`).
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    /// Gemini API base URL (`GEMINI_API_URL`).
    #[serde(default = "default_gemini_api_url")]
    pub gemini_api_url: String,
    /// Sampling temperature for the reply model (`GEMINI_TEMPERATURE`).
    /// Value between 0 and 2. Higher values like 0.8 make output more random,
    /// while lower values like 0.2 make it more focused and deterministic.
    #[serde(default = "default_gemini_temperature")]
    pub gemini_temperature: f32,
    /// Max output tokens for the reply model (`GEMINI_MAX_TOKENS`).
    #[serde(default = "default_gemini_max_tokens")]
    pub gemini_max_tokens: u32,
    /// Optional custom persona directive to override the default
    /// (`PERSONA_DIRECTIVE`).
    #[serde(default = "default_persona_directive")]
    pub persona_directive: String,
    /// Reply sent when generation fails (`FALLBACK_REPLY`).
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
    /// Display name reported by the status route (`BOT_NAME`).
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    /// Address the webhook server binds to (`LISTEN_ADDR`).
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Timeout in seconds for outbound HTTP calls (`HTTP_TIMEOUT_SECS`).
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Number of prior turns given to the reply model (`HISTORY_LIMIT`).
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Capacity of the processed-message id cache (`SEEN_CACHE_CAPACITY`).
    #[serde(default = "default_seen_cache_capacity")]
    pub seen_cache_capacity: usize,
    /// Capacity of the sent-message id cache (`SENT_CACHE_CAPACITY`).
    #[serde(default = "default_sent_cache_capacity")]
    pub sent_cache_capacity: usize,
    /// Database endpoint (`DB_ENDPOINT`). `memory` runs an in-process store.
    #[serde(default = "default_db_endpoint")]
    pub db_endpoint: String,
    /// Database username (`DB_USERNAME`). Sign-in is skipped when empty.
    #[serde(default)]
    pub db_username: String,
    /// Database password (`DB_PASSWORD`).
    #[serde(default)]
    pub db_password: String,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            instagram_access_token: String::new(),
            instagram_app_secret: String::new(),
            verify_token: String::new(),
            graph_api_url: default_graph_api_url(),
            bot_page_id: String::new(),
            bot_account_id: String::new(),
            gemini_api_key: String::new(),
            gemini_model: default_gemini_model(),
            gemini_api_url: default_gemini_api_url(),
            gemini_temperature: default_gemini_temperature(),
            gemini_max_tokens: default_gemini_max_tokens(),
            persona_directive: default_persona_directive(),
            fallback_reply: default_fallback_reply(),
            bot_name: default_bot_name(),
            listen_addr: default_listen_addr(),
            http_timeout_secs: default_http_timeout_secs(),
            history_limit: default_history_limit(),
            seen_cache_capacity: default_seen_cache_capacity(),
            sent_cache_capacity: default_sent_cache_capacity(),
            db_endpoint: default_db_endpoint(),
            db_username: String::new(),
            db_password: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from the environment and an optional config file.
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(config::Environment::default().prefix("REPLY_BOT"));

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        if result.gemini_temperature < 0.0 || result.gemini_temperature > 2.0 {
            return Err(anyhow::anyhow!("Gemini temperature must be between 0 and 2."));
        }

        if result.gemini_max_tokens < 1 || result.gemini_max_tokens > 8192 {
            return Err(anyhow::anyhow!("Gemini max tokens must be between 1 and 8192."));
        }

        if result.http_timeout_secs < 1 || result.http_timeout_secs > 300 {
            return Err(anyhow::anyhow!("HTTP timeout must be between 1 and 300 seconds."));
        }

        if result.seen_cache_capacity < 2 || result.sent_cache_capacity < 2 {
            return Err(anyhow::anyhow!("Message id cache capacities must be at least 2."));
        }

        Ok(result)
    }
}
