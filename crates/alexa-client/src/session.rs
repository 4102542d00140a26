use std::collections::BTreeMap;
use std::fmt;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, COOKIE, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{Endpoints, RefreshSecret};
use crate::error::AlexaError;
use crate::extract::{ExtractionStrategy, cookie_value};
use crate::transport::{BROWSER_USER_AGENT, Transport, decode};

pub(crate) const APP_NAME: &str = "Amazon Alexa";
pub(crate) const APP_VERSION: &str = "2.2.696573.0";
const IDENTITY_AUTH_DOMAIN_HEADER: &str = "x-amzn-identity-auth-domain";
const CSRF_COOKIE: &str = "csrf";

pub(crate) const COOKIE_EXCHANGE_PATH: &str = "/ap/exchangetoken/cookies";
pub(crate) const BEARER_TOKEN_PATH: &str = "/auth/token";
pub(crate) const CSRF_PROBE_PATH: &str = "/api/language";
pub(crate) const ACTIVITY_PAGE_PATH: &str = "/alexa-privacy/apd/activity?ref=activityHistory";

#[derive(Default)]
pub struct Session {
    cookies: String,
    csrf: Option<String>,
    activity_csrf: Option<String>,
    bearer_token: Option<String>,
    customer_id: Option<String>,
    conversation_id: Option<String>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("has_cookies", &!self.cookies.is_empty())
            .field("has_csrf", &self.csrf.is_some())
            .field("has_activity_csrf", &self.activity_csrf.is_some())
            .field("has_bearer_token", &self.bearer_token.is_some())
            .field("customer_id", &self.customer_id)
            .field("conversation_id", &self.conversation_id)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct CookieExchangeResponse {
    #[serde(default)]
    response: CookieExchangeBody,
}

#[derive(Debug, Default, Deserialize)]
struct CookieExchangeBody {
    #[serde(default)]
    tokens: CookieExchangeTokens,
}

#[derive(Debug, Default, Deserialize)]
struct CookieExchangeTokens {
    #[serde(default)]
    cookies: BTreeMap<String, Vec<ExchangedCookie>>,
}

#[derive(Debug, Deserialize)]
struct ExchangedCookie {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value")]
    value: String,
}

#[derive(Debug, Deserialize)]
struct BearerTokenResponse {
    #[serde(default)]
    access_token: String,
}

impl Session {
    pub fn cookies(&self) -> &str {
        &self.cookies
    }

    pub fn csrf(&self) -> Option<&str> {
        self.csrf.as_deref()
    }

    pub fn activity_csrf(&self) -> Option<&str> {
        self.activity_csrf.as_deref()
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    pub fn customer_id(&self) -> Option<&str> {
        self.customer_id.as_deref()
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn set_conversation_id(&mut self, conversation_id: impl Into<String>) {
        let conversation_id = conversation_id.into();
        self.conversation_id = if conversation_id.trim().is_empty() {
            None
        } else {
            Some(conversation_id)
        };
    }

    /// Caches the first customer id seen; later values are ignored.
    pub(crate) fn remember_customer_id(&mut self, customer_id: &str) {
        if self.customer_id.is_none() && !customer_id.is_empty() {
            self.customer_id = Some(customer_id.to_string());
        }
    }

    pub async fn ensure_cookies(
        &mut self,
        transport: &Transport,
        endpoints: &Endpoints,
        amazon_domain: &str,
        secret: &RefreshSecret,
    ) -> Result<(), AlexaError> {
        if !self.cookies.is_empty() {
            return Ok(());
        }

        let cookie_domain = format!(".{amazon_domain}");
        let request = transport
            .http()
            .post(format!("{}{COOKIE_EXCHANGE_PATH}", endpoints.identity))
            .header(IDENTITY_AUTH_DOMAIN_HEADER, format!("api.{amazon_domain}"))
            .form(&[
                ("app_name", APP_NAME),
                ("requested_token_type", "auth_cookies"),
                ("source_token_type", "refresh_token"),
                ("source_token", secret.expose()),
                ("domain", cookie_domain.as_str()),
            ]);

        let response = transport.execute("cookie exchange", request).await?;
        if response.status != StatusCode::OK {
            return Err(AlexaError::Auth(format!(
                "cookie exchange returned HTTP {}: {}",
                response.status.as_u16(),
                response.body
            )));
        }

        let parsed: CookieExchangeResponse = decode("cookie exchange", &response.body)?;
        let cookies = parsed
            .response
            .tokens
            .cookies
            .into_values()
            .flatten()
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect::<Vec<_>>();

        if cookies.is_empty() {
            return Err(AlexaError::Auth(
                "no cookies received from token exchange".to_string(),
            ));
        }

        debug!(cookie_count = cookies.len(), "session cookies acquired");
        self.cookies = cookies.join("; ");
        Ok(())
    }

    pub async fn ensure_csrf(
        &mut self,
        transport: &Transport,
        endpoints: &Endpoints,
    ) -> Result<(), AlexaError> {
        if self.csrf.is_some() {
            return Ok(());
        }
        if self.cookies.is_empty() {
            return Err(AlexaError::Auth(
                "session cookies are required before the CSRF token".to_string(),
            ));
        }

        let request = transport
            .http()
            .get(format!("{}{CSRF_PROBE_PATH}", endpoints.web))
            .header(COOKIE, self.cookies.as_str())
            .header(ACCEPT, "application/json");
        let response = transport.execute("csrf probe", request).await?;

        if let Some(token) = response.set_cookie(CSRF_COOKIE) {
            self.cookies = format!("{}; {CSRF_COOKIE}={token}", self.cookies);
            self.csrf = Some(token.to_string());
            info!("alexa session established");
            return Ok(());
        }

        if let Some(token) = cookie_value(&self.cookies, CSRF_COOKIE) {
            self.csrf = Some(token.to_string());
            info!("alexa session established");
            return Ok(());
        }

        Err(AlexaError::Auth(format!(
            "CSRF token not found (probe returned HTTP {})",
            response.status.as_u16()
        )))
    }

    pub async fn ensure_activity_csrf(
        &mut self,
        transport: &Transport,
        endpoints: &Endpoints,
        strategy: &ExtractionStrategy,
    ) -> Result<(), AlexaError> {
        if self.activity_csrf.is_some() {
            return Ok(());
        }

        let request = transport
            .http()
            .get(format!("{}{ACTIVITY_PAGE_PATH}", endpoints.privacy))
            .header(COOKIE, self.cookies.as_str())
            .header(ACCEPT, "text/html,application/xhtml+xml")
            .header(USER_AGENT, BROWSER_USER_AGENT);
        let response = transport.execute_checked("activity page", request).await?;

        let Some(found) = strategy.first_match(&response.body) else {
            return Err(AlexaError::Protocol(format!(
                "activity CSRF token not found in page (tried {})",
                strategy.matcher_names().join(", ")
            )));
        };

        debug!(matcher = found.matcher, "activity csrf extracted");
        self.activity_csrf = Some(found.value);
        Ok(())
    }

    pub async fn ensure_bearer_token(
        &mut self,
        transport: &Transport,
        endpoints: &Endpoints,
        secret: &RefreshSecret,
    ) -> Result<String, AlexaError> {
        if let Some(token) = &self.bearer_token {
            return Ok(token.clone());
        }

        let request = transport
            .http()
            .post(format!("{}{BEARER_TOKEN_PATH}", endpoints.identity))
            .header(IDENTITY_AUTH_DOMAIN_HEADER, "api.amazon.com")
            .header(ACCEPT, "application/json")
            .form(&[
                ("requested_token_type", "access_token"),
                ("source_token_type", "refresh_token"),
                ("source_token", secret.expose()),
                ("app_name", APP_NAME),
                ("app_version", APP_VERSION),
            ]);

        let response = transport.execute("bearer token exchange", request).await?;
        if response.status != StatusCode::OK {
            return Err(AlexaError::Auth(format!(
                "bearer token exchange returned HTTP {}: {}",
                response.status.as_u16(),
                response.body
            )));
        }

        let parsed: BearerTokenResponse = decode("bearer token exchange", &response.body)?;
        if parsed.access_token.is_empty() {
            return Err(AlexaError::Auth(
                "bearer token exchange returned no token".to_string(),
            ));
        }

        debug!("conversational bearer token acquired");
        self.bearer_token = Some(parsed.access_token.clone());
        Ok(parsed.access_token)
    }
}
