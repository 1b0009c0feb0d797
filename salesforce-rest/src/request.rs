//! Plain-data description of a single HTTP call.

use crate::options::{Options, Protocol, ProxyConfig};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// `Content-Type` used for JSON bodies and as the default for authenticated calls.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// `Content-Type` used for OAuth form posts.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HTTP verb of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Serialized as JSON.
    Json(Value),
    /// Serialized as `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
    /// Sent as-is (CSV, XML, multipart).
    Raw(Vec<u8>),
}

impl Body {
    /// Encodes the payload into the bytes put on the wire.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        match self {
            Body::Json(value) => serde_json::to_vec(value).map_err(EncodeError::Json),
            Body::Form(pairs) => serde_urlencoded::to_string(pairs)
                .map(String::into_bytes)
                .map_err(EncodeError::Form),
            Body::Raw(bytes) => Ok(bytes.clone()),
        }
    }
}

/// Failure to encode a [`Body`].
#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    #[error("Failed to encode JSON body: {0}")]
    Json(#[source] serde_json::Error),
    #[error("Failed to encode form body: {0}")]
    Form(#[source] serde_urlencoded::ser::Error),
}

/// Everything needed to perform one HTTP call.
///
/// Built fresh for every call and never reused after dispatch.
///
/// # Example
///
/// ```
/// use salesforce_rest::request::{Method, RequestDescriptor};
///
/// let request = RequestDescriptor::new(Method::Get, "na1.salesforce.com", "/services/data/")
///     .authorized("00Dxx!token");
///
/// assert_eq!(request.url(), "https://na1.salesforce.com/services/data/");
/// assert_eq!(request.headers["Authorization"], "OAuth 00Dxx!token");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub protocol: Protocol,
    /// Host without scheme, optionally with a port.
    pub host: String,
    /// Absolute path including any query string.
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Body>,
    pub proxy: Option<ProxyConfig>,
    pub timeout: Option<Duration>,
}

impl RequestDescriptor {
    pub fn new(method: Method, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            protocol: Protocol::default(),
            host: host.into(),
            path: path.into(),
            headers: BTreeMap::new(),
            body: None,
            proxy: None,
            timeout: None,
        }
    }

    /// Adds the session headers sent on every authenticated call.
    ///
    /// `Authorization` is always replaced; `Content-Type` and `Accept-Encoding`
    /// are only filled in when not already present.
    pub fn authorized(mut self, token: &str) -> Self {
        self.headers
            .insert("Authorization".to_string(), format!("OAuth {token}"));
        self.headers
            .entry("Content-Type".to_string())
            .or_insert_with(|| JSON_CONTENT_TYPE.to_string());
        self.headers
            .entry("Accept-Encoding".to_string())
            .or_insert_with(|| JSON_CONTENT_TYPE.to_string());
        self
    }

    /// Sets or replaces a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn json(mut self, value: Value) -> Self {
        self.body = Some(Body::Json(value));
        self
    }

    /// Sets a form body together with its `Content-Type`.
    pub fn form<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = Some(Body::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ));
        self.header("Content-Type", FORM_CONTENT_TYPE)
    }

    /// Sets a raw body together with its `Content-Type`.
    pub fn raw(mut self, bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        self.body = Some(Body::Raw(bytes.into()));
        self.header("Content-Type", content_type)
    }

    /// Applies scheme, proxy and timeout from resolved options.
    pub fn with_options(mut self, options: &Options) -> Self {
        self.protocol = options.resolved_protocol();
        self.proxy = options.proxy.clone();
        self.timeout = options.timeout();
        self
    }

    /// Full request URL.
    pub fn url(&self) -> String {
        format!("{}://{}{}", self.protocol, self.host, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_method_is_get() {
        assert_eq!(Method::default(), Method::Get);
    }

    #[test]
    fn test_authorized_sets_default_headers() {
        let request = RequestDescriptor::new(Method::Get, "host", "/").authorized("abc");
        assert_eq!(request.headers["Authorization"], "OAuth abc");
        assert_eq!(request.headers["Content-Type"], "application/json");
        assert_eq!(request.headers["Accept-Encoding"], "application/json");
    }

    #[test]
    fn test_authorized_keeps_overridden_content_type() {
        let request = RequestDescriptor::new(Method::Put, "host", "/batches")
            .raw(b"Name\nAcme\n".to_vec(), "text/csv")
            .authorized("abc");
        assert_eq!(request.headers["Content-Type"], "text/csv");
        assert_eq!(request.headers["Authorization"], "OAuth abc");
    }

    #[test]
    fn test_with_options_applies_transport_settings() {
        let options = Options::new()
            .protocol(Protocol::Http)
            .proxy(ProxyConfig::new("http://proxy:3128"))
            .timeout_secs(2.0);
        let request = RequestDescriptor::new(Method::Get, "127.0.0.1:8080", "/x").with_options(&options);
        assert_eq!(request.url(), "http://127.0.0.1:8080/x");
        assert_eq!(request.proxy, Some(ProxyConfig::new("http://proxy:3128")));
        assert_eq!(request.timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_form_body_encoding() {
        let request = RequestDescriptor::new(Method::Post, "host", "/services/oauth2/token")
            .form([("grant_type", "password"), ("username", "a b@example.com")]);
        assert_eq!(
            request.headers["Content-Type"],
            "application/x-www-form-urlencoded"
        );
        let encoded = request.body.unwrap().encode().unwrap();
        assert_eq!(
            String::from_utf8(encoded).unwrap(),
            "grant_type=password&username=a+b%40example.com"
        );
    }

    #[test]
    fn test_json_body_encoding() {
        let body = Body::Json(json!({"Name": "Acme"}));
        assert_eq!(body.encode().unwrap(), br#"{"Name":"Acme"}"#.to_vec());
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(reqwest::Method::from(Method::Patch), reqwest::Method::PATCH);
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }
}
