//! Layered request options.
//!
//! The client holds one [`Options`] value as its defaults. A call can layer a
//! second [`Options`] on top via [`Client::with_options`](crate::client::Client::with_options);
//! every field left unset falls back to the client-level value, then to the
//! crate default.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// URL scheme used to reach Salesforce hosts.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// TLS, used for every real Salesforce endpoint.
    #[default]
    Https,
    /// Plain HTTP, useful for local gateways and mock servers.
    Http,
}

impl Protocol {
    /// Returns the scheme without the `://` separator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Https => "https",
            Protocol::Http => "http",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proxy settings applied to a single HTTP call.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy URL, e.g. `http://proxy.example.com:8080`.
    pub url: String,
    /// Basic-auth username for the proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Basic-auth password for the proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ProxyConfig {
    /// Creates a proxy configuration without authentication.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
        }
    }

    /// Sets basic-auth credentials for the proxy.
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

/// Per-client or per-call request options.
///
/// # Example
///
/// ```
/// use salesforce_rest::options::Options;
///
/// let defaults = Options::new().api_version("52.0").timeout_secs(30.0);
/// let call = Options::new().timeout_secs(5.0);
///
/// let effective = call.layered_over(&defaults);
/// assert_eq!(effective.api_version.as_deref(), Some("52.0"));
/// assert_eq!(effective.timeout_secs, Some(5.0));
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Options {
    /// Salesforce API version such as `"52.0"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Host used for authentication calls, e.g. `test.salesforce.com`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_host: Option<String>,
    /// URL scheme for every call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    /// Proxy for every call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
    /// Combined connect and read timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,
}

impl Options {
    /// Creates an empty set of options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API version.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Sets the login host.
    pub fn login_host(mut self, host: impl Into<String>) -> Self {
        self.login_host = Some(host.into());
        self
    }

    /// Sets the URL scheme.
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    /// Sets the proxy.
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Sets the timeout in seconds.
    pub fn timeout_secs(mut self, secs: f64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Returns a copy of `self` where each unset field is taken from `defaults`.
    pub fn layered_over(&self, defaults: &Options) -> Options {
        Options {
            api_version: self
                .api_version
                .clone()
                .or_else(|| defaults.api_version.clone()),
            login_host: self
                .login_host
                .clone()
                .or_else(|| defaults.login_host.clone()),
            protocol: self.protocol.or(defaults.protocol),
            proxy: self.proxy.clone().or_else(|| defaults.proxy.clone()),
            timeout_secs: self.timeout_secs.or(defaults.timeout_secs),
        }
    }

    /// Effective login host.
    pub fn resolved_login_host(&self) -> &str {
        self.login_host
            .as_deref()
            .unwrap_or(crate::DEFAULT_LOGIN_HOST)
    }

    /// Effective URL scheme.
    pub fn resolved_protocol(&self) -> Protocol {
        self.protocol.unwrap_or_default()
    }

    /// Effective timeout. Negative, infinite or NaN values count as unset.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layered_over_prefers_call_values() {
        let defaults = Options::new()
            .api_version("40.0")
            .login_host("test.salesforce.com")
            .timeout_secs(10.0);
        let call = Options::new().api_version("52.0");

        let effective = call.layered_over(&defaults);
        assert_eq!(effective.api_version.as_deref(), Some("52.0"));
        assert_eq!(effective.login_host.as_deref(), Some("test.salesforce.com"));
        assert_eq!(effective.timeout_secs, Some(10.0));
    }

    #[test]
    fn test_layered_over_empty_keeps_defaults() {
        let defaults = Options::new()
            .proxy(ProxyConfig::new("http://proxy:8080"))
            .protocol(Protocol::Http);
        let effective = Options::new().layered_over(&defaults);
        assert_eq!(effective, defaults);
    }

    #[test]
    fn test_resolved_defaults() {
        let options = Options::new();
        assert_eq!(options.resolved_login_host(), "login.salesforce.com");
        assert_eq!(options.resolved_protocol(), Protocol::Https);
        assert!(options.timeout().is_none());
    }

    #[test]
    fn test_timeout_conversion() {
        assert_eq!(
            Options::new().timeout_secs(1.5).timeout(),
            Some(Duration::from_millis(1500))
        );
        assert!(Options::new().timeout_secs(-1.0).timeout().is_none());
        assert!(Options::new().timeout_secs(f64::NAN).timeout().is_none());
    }

    #[test]
    fn test_options_deserialize() {
        let options: Options = serde_json::from_str(
            r#"{"api_version":"45.0","protocol":"http","proxy":{"url":"http://p:1"}}"#,
        )
        .unwrap();
        assert_eq!(options.api_version.as_deref(), Some("45.0"));
        assert_eq!(options.protocol, Some(Protocol::Http));
        assert_eq!(options.proxy, Some(ProxyConfig::new("http://p:1")));
    }

    #[test]
    fn test_protocol_display() {
        assert_eq!(Protocol::Https.to_string(), "https");
        assert_eq!(Protocol::Http.to_string(), "http");
    }
}
