//! HTTP transport seam.
//!
//! The dispatcher only depends on the [`Transport`] trait. [`ReqwestTransport`]
//! is the production implementation.

use crate::request::RequestDescriptor;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

/// Boxed error returned by a transport.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Response as received from the wire, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Looks up a header value, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Performs one HTTP call described by a [`RequestDescriptor`].
///
/// Implementations must not retry and must not interpret the status code; a
/// non-2xx response is still `Ok`.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    async fn execute(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError>;
}

/// [`Transport`] backed by `reqwest`.
///
/// A fresh `reqwest::Client` is built per call because proxy and timeout are
/// per-call inputs.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    connect_timeout: Duration,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the TCP connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn build_http_client(
        &self,
        request: &RequestDescriptor,
    ) -> Result<reqwest::Client, TransportError> {
        let mut builder = reqwest::Client::builder().connect_timeout(self.connect_timeout);

        if let Some(proxy) = &request.proxy {
            let mut reqwest_proxy = reqwest::Proxy::all(proxy.url.as_str())?;
            if let (Some(username), Some(password)) = (&proxy.username, &proxy.password) {
                reqwest_proxy = reqwest_proxy.basic_auth(username, password);
            }
            builder = builder.proxy(reqwest_proxy);
        }

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(builder.build()?)
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(crate::DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    async fn execute(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError> {
        let http_client = self.build_http_client(request)?;

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }

        let mut call = http_client
            .request(request.method.into(), request.url())
            .headers(headers);
        if let Some(body) = &request.body {
            call = call.body(body.encode()?);
        }

        let response = call.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Options, Protocol};
    use crate::request::Method;
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn local(server: &MockServer, method: Method, path: &str) -> RequestDescriptor {
        RequestDescriptor::new(method, server.address().to_string(), path)
            .with_options(&Options::new().protocol(Protocol::Http))
    }

    #[test]
    fn test_raw_response_header_lookup() {
        let mut response = RawResponse::new(200, "ok");
        response
            .headers
            .push(("content-type".to_string(), "text/plain".to_string()));
        assert_eq!(response.header("Content-Type"), Some("text/plain"));
        assert_eq!(response.header("missing"), None);
        assert_eq!(response.text(), "ok");
    }

    #[tokio::test]
    async fn test_execute_get_with_headers_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/data/v37.0/query/"))
            .and(query_param("q", "SELECT Id FROM Account"))
            .and(header("Authorization", "OAuth token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"done":true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let request = local(
            &server,
            Method::Get,
            "/services/data/v37.0/query/?q=SELECT+Id+FROM+Account",
        )
        .authorized("token");
        let response = ReqwestTransport::new().execute(&request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, br#"{"done":true}"#.to_vec());
    }

    #[tokio::test]
    async fn test_execute_posts_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/data/v37.0/sobjects/Account"))
            .and(body_string(r#"{"Name":"Acme"}"#))
            .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"id":"001"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let request = local(&server, Method::Post, "/services/data/v37.0/sobjects/Account")
            .authorized("token")
            .json(json!({"Name": "Acme"}));
        let response = ReqwestTransport::new().execute(&request).await.unwrap();

        assert_eq!(response.status, 201);
    }

    #[tokio::test]
    async fn test_execute_returns_error_status_without_failing() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404).set_body_string("[]"))
            .mount(&server)
            .await;

        let request = local(&server, Method::Delete, "/anything");
        let response = ReqwestTransport::new().execute(&request).await.unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_execute_rejects_invalid_header_name() {
        let request = RequestDescriptor::new(Method::Get, "localhost", "/").header("bad header", "x");
        let result = ReqwestTransport::new().execute(&request).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_execute_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let request = local(&server, Method::Get, "/slow")
            .with_options(&Options::new().protocol(Protocol::Http).timeout_secs(0.05));
        let result = ReqwestTransport::new().execute(&request).await;
        assert!(result.is_err());
    }
}
