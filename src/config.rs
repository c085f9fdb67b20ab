use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "RxGuard";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_OPENFDA_URL: &str = "https://api.fda.gov";
pub const DEFAULT_RXNORM_URL: &str = "https://rxnav.nlm.nih.gov/REST";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_RETRIES: usize = 1;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "rxguard=info"
}

/// Application data directory, `~/RxGuard/`. Falls back to the working
/// directory when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn database_path() -> PathBuf {
    app_data_dir().join("rxguard.db")
}

/// Endpoints, credentials and call policy for the external services.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub ocr_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_url: String,
    pub speech_key: Option<String>,
    pub speech_region: Option<String>,
    pub openfda_url: String,
    pub rxnorm_url: String,
    pub request_timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            ocr_url: None,
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_url: DEFAULT_GEMINI_URL.to_string(),
            speech_key: None,
            speech_region: None,
            openfda_url: DEFAULT_OPENFDA_URL.to_string(),
            rxnorm_url: DEFAULT_RXNORM_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ServiceConfig {
    /// Read `RXGUARD_*` environment variables over the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Self {
            ocr_url: var("RXGUARD_OCR_URL"),
            gemini_api_key: var("RXGUARD_GEMINI_API_KEY"),
            gemini_model: var("RXGUARD_GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_url: var("RXGUARD_GEMINI_URL").unwrap_or(defaults.gemini_url),
            speech_key: var("RXGUARD_SPEECH_KEY"),
            speech_region: var("RXGUARD_SPEECH_REGION"),
            openfda_url: var("RXGUARD_OPENFDA_URL").unwrap_or(defaults.openfda_url),
            rxnorm_url: var("RXGUARD_RXNORM_URL").unwrap_or(defaults.rxnorm_url),
            request_timeout_secs: parse_or(
                var("RXGUARD_REQUEST_TIMEOUT_SECS"),
                "RXGUARD_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            ),
            max_retries: parse_or(var("RXGUARD_MAX_RETRIES"), "RXGUARD_MAX_RETRIES", defaults.max_retries),
        }
    }
}

fn parse_or<T: std::str::FromStr + Copy>(value: Option<String>, key: &str, default: T) -> T {
    match value {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparseable setting");
            default
        }),
        None => default,
    }
}
