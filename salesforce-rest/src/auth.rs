//! Authentication flows producing a [`Session`].
//!
//! Three flows are supported:
//!
//! - [`password`]: OAuth 2.0 username-password grant.
//! - [`device`]: OAuth 2.0 device flow, split into an authorize phase and a
//!   poll phase that the caller drives.
//! - [`soap`]: SOAP `login` call against the enterprise endpoint.
//!
//! Every flow returns a [`Response`] and never fails outright. OAuth calls
//! treat any status other than 200 as an [`Error::Rejected`] carrying the
//! parsed error body.

pub mod device;
pub mod password;
pub mod soap;

use crate::dispatch::{self, dispatch, Response};
use crate::options::Options;
use crate::request::{Method, RequestDescriptor};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// OAuth 2.0 token endpoint.
pub const TOKEN_PATH: &str = "/services/oauth2/token";

/// OAuth 2.0 token revocation endpoint.
pub const REVOKE_PATH: &str = "/services/oauth2/revoke";

/// Authentication failures.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The OAuth endpoint answered with a status other than 200.
    ///
    /// `payload` holds the parsed error body, typically carrying
    /// `error`/`error_description` or `message`/`errorCode` fields.
    #[error("OAuth call failed. Received {status} status code")]
    Rejected { status: u16, payload: Option<Value> },
    /// The SOAP endpoint answered with a status other than 200.
    #[error("Request failed. Received {status} status code")]
    SoapFault { status: u16 },
    #[error(transparent)]
    Xml(#[from] crate::xml::Error),
    /// A field needed to build the session is missing from the response.
    #[error("Missing `{0}` in authentication response")]
    MissingField(String),
    /// The device poll was attempted before a device code was obtained.
    #[error("Device flow has not been authorized")]
    DeviceNotAuthorized,
    #[error("Invalid URL `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl Error {
    /// The OAuth error code when the payload carries one.
    ///
    /// Looks at `error` for token endpoint errors and at `errorCode` of the
    /// first entry for REST style error arrays.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Error::Rejected {
                payload: Some(payload),
                ..
            } => payload
                .get("error")
                .and_then(Value::as_str)
                .or_else(|| payload.get(0)?.get("errorCode")?.as_str()),
            _ => None,
        }
    }
}

/// Authenticated token and host used by every subsequent call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    /// Instance host without scheme, e.g. `na1.salesforce.com`.
    pub instance_host: String,
    pub api_version: String,
}

/// Successful response of the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    pub instance_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Any other field returned by the server.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl TokenResponse {
    /// Host portion of `instance_url`.
    pub fn instance_host(&self) -> Result<String, Error> {
        host_of(&self.instance_url)
    }
}

/// Returns `host[:port]` of an absolute URL.
pub fn host_of(url: &str) -> Result<String, Error> {
    let parsed = url::Url::parse(url).map_err(|source| Error::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::MissingField("host".to_string()))?;
    Ok(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Builds a form POST to an OAuth endpoint.
pub(crate) fn oauth_request(
    host: &str,
    path: &str,
    form: Vec<(&'static str, String)>,
    options: &Options,
) -> RequestDescriptor {
    RequestDescriptor::new(Method::Post, host, path)
        .form(form)
        .with_options(options)
}

/// Dispatches an OAuth call. A non-200 status moves the parsed body into an
/// [`Error::Rejected`], leaving the response body absent.
pub(crate) async fn oauth_call(
    transport: &dyn Transport,
    request: RequestDescriptor,
) -> Response<Value> {
    let mut response = dispatch(transport, request).await;
    if let Some(status) = response.status {
        if status != 200 && response.errors.is_empty() {
            let payload = response.body.take();
            response.record(Error::Rejected { status, payload }.into());
        }
    }
    response
}

/// Decodes a token endpoint body.
pub(crate) fn token_response(response: Response<Value>) -> Response<TokenResponse> {
    response.and_then(|body| {
        serde_json::from_value(body).map_err(|source| dispatch::Error::Parse { source })
    })
}

/// Revokes `token` on `host`, ending the session.
///
/// Salesforce answers 200 with an empty body on success, which yields an
/// absent body and no error.
#[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
pub async fn revoke(
    transport: &dyn Transport,
    host: &str,
    token: &str,
    options: &Options,
) -> Response<Value> {
    let request = oauth_request(host, REVOKE_PATH, vec![("token", token.to_string())], options);
    oauth_call(transport, request).await
}
