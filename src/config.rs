use std::time::Duration;

/// Application-level constants
pub const SERVICE_NAME: &str = "prospector";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runtime configuration, read once at startup from `PROSPECTOR_*`
/// environment variables. Every knob has a working default, so the
/// service starts with no environment at all.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Base URL of the OpenAI-compatible completion endpoint.
    pub llm_base_url: String,
    pub llm_model: String,
    /// Bearer token for the completion endpoint, if it wants one.
    pub llm_api_key: Option<String>,
    /// Per-call timeout for capability requests.
    pub llm_timeout_secs: u64,
    /// Quality gate retry budget per stage call.
    pub gate_max_attempts: u32,
    /// Default top-N selection cap, overridable per request.
    pub max_selected: usize,
    /// Default minimum qualifying score, overridable per request.
    pub min_score_threshold: u8,
    /// Pause after each fully dispatched batch.
    pub batch_pause: Duration,
    /// Pause between consecutive webhook deliveries.
    pub delivery_pause: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PROSPECTOR_PORT", 5000),
            llm_base_url: std::env::var("PROSPECTOR_LLM_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434/v1".to_string()),
            llm_model: std::env::var("PROSPECTOR_LLM_MODEL")
                .unwrap_or_else(|_| "llama3.1".to_string()),
            llm_api_key: std::env::var("PROSPECTOR_LLM_API_KEY").ok(),
            llm_timeout_secs: env_parse("PROSPECTOR_LLM_TIMEOUT_SECS", 120),
            gate_max_attempts: env_parse("PROSPECTOR_GATE_MAX_ATTEMPTS", 3),
            max_selected: env_parse("PROSPECTOR_MAX_SELECTED", 3),
            min_score_threshold: env_parse("PROSPECTOR_MIN_SCORE", 70),
            batch_pause: Duration::from_millis(env_parse("PROSPECTOR_BATCH_PAUSE_MS", 5_000)),
            delivery_pause: Duration::from_millis(env_parse("PROSPECTOR_DELIVERY_PAUSE_MS", 500)),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            llm_base_url: "http://localhost:11434/v1".to_string(),
            llm_model: "llama3.1".to_string(),
            llm_api_key: None,
            llm_timeout_secs: 120,
            gate_max_attempts: 3,
            max_selected: 3,
            min_score_threshold: 70,
            batch_pause: Duration::from_millis(5_000),
            delivery_pause: Duration::from_millis(500),
        }
    }
}

/// Parse an env var, falling back to the default on absence or on an
/// unparseable value (logged, never fatal).
fn env_parse<T: std::str::FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default = %default, "Unparseable env var, using default");
            default
        }),
        Err(_) => default,
    }
}

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> String {
    format!("{SERVICE_NAME}=info,axum=info")
}
