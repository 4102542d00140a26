use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_AMAZON_DOMAIN: &str = "amazon.com";
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

const IDENTITY_BASE_URL: &str = "https://api.amazon.com";
const AVS_BASE_URL: &str = "https://avs-alexa-12-na.amazon.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

#[derive(Clone)]
pub struct RefreshSecret(String);

impl RefreshSecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RefreshSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshSecret([REDACTED])")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub identity: String,
    pub api: String,
    pub web: String,
    pub privacy: String,
    pub avs: String,
}

impl Endpoints {
    pub fn for_domain(amazon_domain: &str) -> Self {
        let api = if amazon_domain == DEFAULT_AMAZON_DOMAIN {
            "https://pitangui.amazon.com".to_string()
        } else {
            "https://layla.amazon.com".to_string()
        };

        Self {
            identity: IDENTITY_BASE_URL.to_string(),
            api,
            web: format!("https://alexa.{amazon_domain}"),
            privacy: format!("https://www.{amazon_domain}"),
            avs: AVS_BASE_URL.to_string(),
        }
    }

    pub fn single_host(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            identity: base_url.clone(),
            api: base_url.clone(),
            web: base_url.clone(),
            privacy: base_url.clone(),
            avs: base_url,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub refresh_secret: RefreshSecret,
    pub amazon_domain: String,
    pub endpoints: Endpoints,
    pub http_timeout: Duration,
    pub poll_interval: Duration,
}

impl ClientConfig {
    pub fn new(refresh_secret: RefreshSecret, amazon_domain: impl Into<String>) -> Self {
        let amazon_domain = amazon_domain.into();
        Self {
            refresh_secret,
            endpoints: Endpoints::for_domain(&amazon_domain),
            amazon_domain,
            http_timeout: Duration::from_millis(DEFAULT_HTTP_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let refresh_secret = RefreshSecret::new(require_non_empty_env("ALEXA_REFRESH_TOKEN")?);
        let amazon_domain = optional_trimmed_env("ALEXA_AMAZON_DOMAIN")
            .unwrap_or_else(|| DEFAULT_AMAZON_DOMAIN.to_string());

        let defaults = Endpoints::for_domain(&amazon_domain);
        let endpoints = Endpoints {
            identity: url_env("ALEXA_IDENTITY_BASE_URL", defaults.identity)?,
            api: url_env("ALEXA_API_BASE_URL", defaults.api)?,
            web: url_env("ALEXA_WEB_BASE_URL", defaults.web)?,
            privacy: url_env("ALEXA_PRIVACY_BASE_URL", defaults.privacy)?,
            avs: url_env("ALEXA_AVS_BASE_URL", defaults.avs)?,
        };

        let poll_interval_ms = parse_u64_env("ALEXA_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        if poll_interval_ms == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "ALEXA_POLL_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            refresh_secret,
            amazon_domain,
            endpoints,
            http_timeout: Duration::from_millis(parse_u64_env(
                "ALEXA_HTTP_TIMEOUT_MS",
                DEFAULT_HTTP_TIMEOUT_MS,
            )?),
            poll_interval: Duration::from_millis(poll_interval_ms),
        })
    }

    pub fn from_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_env()
    }
}

fn require_non_empty_env(key: &str) -> Result<String, ConfigError> {
    optional_trimmed_env(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()))
}

fn parse_u64_env(key: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::ParseInt(key.to_string())),
        Err(_) => Ok(default),
    }
}

fn url_env(key: &str, default: String) -> Result<String, ConfigError> {
    let Some(value) = optional_trimmed_env(key) else {
        return Ok(default);
    };

    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::InvalidConfiguration(format!(
            "{key} must start with http:// or https://"
        )));
    }

    Ok(value.trim_end_matches('/').to_string())
}

fn optional_trimmed_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::{ClientConfig, ConfigError, Endpoints, RefreshSecret};

    const KEYS: [&str; 9] = [
        "ALEXA_REFRESH_TOKEN",
        "ALEXA_AMAZON_DOMAIN",
        "ALEXA_HTTP_TIMEOUT_MS",
        "ALEXA_POLL_INTERVAL_MS",
        "ALEXA_IDENTITY_BASE_URL",
        "ALEXA_API_BASE_URL",
        "ALEXA_WEB_BASE_URL",
        "ALEXA_PRIVACY_BASE_URL",
        "ALEXA_AVS_BASE_URL",
    ];

    fn clear_env() {
        for key in KEYS {
            // SAFETY: env-mutating tests are serialized with #[serial].
            unsafe { std::env::remove_var(key) };
        }
    }

    fn set_env(key: &str, value: &str) {
        // SAFETY: env-mutating tests are serialized with #[serial].
        unsafe { std::env::set_var(key, value) };
    }

    #[test]
    fn us_domain_uses_pitangui_api_host() {
        let endpoints = Endpoints::for_domain("amazon.com");
        assert_eq!(endpoints.api, "https://pitangui.amazon.com");
        assert_eq!(endpoints.web, "https://alexa.amazon.com");
        assert_eq!(endpoints.privacy, "https://www.amazon.com");
    }

    #[test]
    fn other_domains_use_layla_api_host() {
        let endpoints = Endpoints::for_domain("amazon.de");
        assert_eq!(endpoints.api, "https://layla.amazon.com");
        assert_eq!(endpoints.web, "https://alexa.amazon.de");
        assert_eq!(endpoints.identity, "https://api.amazon.com");
    }

    #[test]
    fn refresh_secret_debug_is_redacted() {
        let secret = RefreshSecret::new("Atnr|super-secret");
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    #[serial]
    fn from_env_requires_refresh_token() {
        clear_env();
        let err = ClientConfig::from_env().expect_err("missing token should fail");
        assert!(matches!(err, ConfigError::MissingVar(ref key) if key == "ALEXA_REFRESH_TOKEN"));
    }

    #[test]
    #[serial]
    fn from_env_applies_defaults_and_overrides() {
        clear_env();
        set_env("ALEXA_REFRESH_TOKEN", "Atnr|token");
        set_env("ALEXA_AMAZON_DOMAIN", "amazon.co.uk");
        set_env("ALEXA_POLL_INTERVAL_MS", "250");
        set_env("ALEXA_AVS_BASE_URL", "http://127.0.0.1:9000/");

        let config = ClientConfig::from_env().expect("config should load");
        clear_env();

        assert_eq!(config.amazon_domain, "amazon.co.uk");
        assert_eq!(config.endpoints.web, "https://alexa.amazon.co.uk");
        assert_eq!(config.endpoints.avs, "http://127.0.0.1:9000");
        assert_eq!(config.poll_interval.as_millis(), 250);
        assert_eq!(config.http_timeout.as_millis(), 30_000);
    }

    #[test]
    #[serial]
    fn from_env_rejects_non_http_override() {
        clear_env();
        set_env("ALEXA_REFRESH_TOKEN", "Atnr|token");
        set_env("ALEXA_API_BASE_URL", "ftp://example.com");

        let err = ClientConfig::from_env().expect_err("non-http url should fail");
        clear_env();

        assert!(matches!(err, ConfigError::InvalidConfiguration(_)));
    }

    #[test]
    #[serial]
    fn from_env_rejects_invalid_integers() {
        clear_env();
        set_env("ALEXA_REFRESH_TOKEN", "Atnr|token");
        set_env("ALEXA_HTTP_TIMEOUT_MS", "soon");

        let err = ClientConfig::from_env().expect_err("bad integer should fail");
        clear_env();

        assert!(matches!(err, ConfigError::ParseInt(ref key) if key == "ALEXA_HTTP_TIMEOUT_MS"));
    }
}
