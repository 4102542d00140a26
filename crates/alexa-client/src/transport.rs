use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::AlexaError;
use crate::session::Session;

pub(crate) const CSRF_HEADER: &str = "csrf";
pub(crate) const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub set_cookies: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    pub fn set_cookie(&self, name: &str) -> Option<&str> {
        self.set_cookies
            .iter()
            .find(|(cookie_name, value)| cookie_name == name && !value.is_empty())
            .map(|(_, value)| value.as_str())
    }

    fn into_backend_error(self) -> AlexaError {
        AlexaError::Backend {
            status: self.status.as_u16(),
            body: self.body,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
}

impl Transport {
    pub fn new(timeout: Duration) -> Result<Self, AlexaError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AlexaError::transport("http client build"))?;
        Ok(Self { http })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn authenticated(&self, session: &Session, method: Method, url: &str) -> RequestBuilder {
        let mut request = self
            .http
            .request(method, url)
            .header(COOKIE, session.cookies())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");
        if let Some(csrf) = session.csrf() {
            request = request.header(CSRF_HEADER, csrf);
        }
        request
    }

    pub async fn execute(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<RawResponse, AlexaError> {
        let response = request
            .send()
            .await
            .map_err(AlexaError::transport(operation))?;

        let status = response.status();
        let set_cookies = response
            .cookies()
            .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
            .collect();
        let body = response
            .text()
            .await
            .map_err(AlexaError::transport(operation))?;

        debug!(
            operation,
            status = status.as_u16(),
            body_len = body.len(),
            "backend call completed"
        );

        Ok(RawResponse {
            status,
            set_cookies,
            body,
        })
    }

    pub async fn execute_checked(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<RawResponse, AlexaError> {
        let response = self.execute(operation, request).await?;
        if response.status.as_u16() >= 400 {
            return Err(response.into_backend_error());
        }
        Ok(response)
    }

    pub async fn execute_ok(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<RawResponse, AlexaError> {
        let response = self.execute(operation, request).await?;
        if response.status != StatusCode::OK {
            return Err(response.into_backend_error());
        }
        Ok(response)
    }

    pub async fn json<T>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, AlexaError>
    where
        T: DeserializeOwned,
    {
        let response = self.execute_checked(operation, request).await?;
        decode(operation, &response.body)
    }
}

pub(crate) fn decode<T>(what: &str, body: &str) -> Result<T, AlexaError>
where
    T: DeserializeOwned,
{
    serde_json::from_str(body).map_err(|err| AlexaError::decode(what, err))
}
