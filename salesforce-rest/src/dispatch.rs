//! Request dispatch and response normalization.
//!
//! [`dispatch`] never fails: every problem is appended to
//! [`Response::errors`] and the body is left absent. Callers check for a
//! missing body instead of matching on `Err`.
//!
//! Normalization rules, applied in order:
//!
//! 1. A transport failure records [`Error::Transport`].
//! 2. A raw body that is exactly the four bytes `null` records
//!    [`Error::NullBody`], whatever the status code.
//! 3. An empty body (204 No Content, an empty 201 from an upload, an empty
//!    error page) yields an absent body without a parse error. The status
//!    code is still available to the caller.
//! 4. Anything else is parsed; a parse failure records [`Error::Parse`].

use crate::auth;
use crate::request::RequestDescriptor;
use crate::transport::{RawResponse, Transport, TransportError};
use serde_json::Value;
use tracing::{error, info};

/// Sentinel body some endpoints return on failure with a success status.
const NULL_BODY: &[u8] = b"null";

/// Problems recorded while dispatching a request.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Connection, timeout or request construction failure.
    #[error("HTTP transport error: {0}")]
    Transport(TransportError),
    /// The server answered with the literal text `null`.
    #[error("Request body is null")]
    NullBody,
    /// The body was not valid JSON.
    #[error("Failed to parse response body: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },
    /// An authentication endpoint rejected the call.
    #[error(transparent)]
    Auth(#[from] auth::Error),
    /// The body parsed but lacked something the operation relies on.
    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),
    /// The response carried no body and no error explains why.
    #[error("Response carried no content")]
    NoContent,
}

/// Normalized result of one HTTP call.
///
/// `errors` only ever grows. When it is non-empty the body is usually absent,
/// but a few operations (SOAP login) keep the parsed body alongside an error.
#[derive(Debug)]
pub struct Response<T = Value> {
    /// The descriptor that was dispatched.
    pub request: RequestDescriptor,
    /// HTTP status, absent when the transport failed.
    pub status: Option<u16>,
    pub body: Option<T>,
    /// Untouched wire response.
    pub raw: Option<RawResponse>,
    pub errors: Vec<Error>,
}

impl<T> Response<T> {
    pub(crate) fn new(request: RequestDescriptor) -> Self {
        Self {
            request,
            status: None,
            body: None,
            raw: None,
            errors: Vec::new(),
        }
    }

    /// True when no error was recorded and the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.status.is_some_and(|s| (200..300).contains(&s))
    }

    /// Appends an error and logs it.
    pub(crate) fn record(&mut self, err: Error) {
        error!(
            method = %self.request.method,
            path = %self.request.path,
            status = ?self.status,
            error = %err,
            "Request failed"
        );
        self.errors.push(err);
    }

    /// Transforms the body, keeping status and errors.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        Response {
            request: self.request,
            status: self.status,
            body: self.body.map(f),
            raw: self.raw,
            errors: self.errors,
        }
    }

    /// Transforms the body with a fallible function. A failure is recorded
    /// and leaves the body absent.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Result<U, Error>) -> Response<U> {
        let Response {
            request,
            status,
            body,
            raw,
            errors,
        } = self;
        let mut response = Response {
            request,
            status,
            body: None,
            raw,
            errors,
        };
        if let Some(body) = body {
            match f(body) {
                Ok(value) => response.body = Some(value),
                Err(err) => response.record(err),
            }
        }
        response
    }

    /// Converts into a `Result`: the body if present, otherwise the first
    /// recorded error, otherwise [`Error::NoContent`].
    pub fn into_result(self) -> Result<T, Error> {
        match self.body {
            Some(body) => Ok(body),
            None => Err(self.errors.into_iter().next().unwrap_or(Error::NoContent)),
        }
    }
}

fn is_no_content(raw: &RawResponse) -> bool {
    raw.status == 204 || raw.body.is_empty()
}

/// Performs the call and applies the null-body and no-content rules, keeping
/// the body as bytes.
async fn exchange(transport: &dyn Transport, request: RequestDescriptor) -> Response<Vec<u8>> {
    info!(method = %request.method, path = %request.path, "{} {}", request.method, request.path);

    let mut response = Response::new(request);
    match transport.execute(&response.request).await {
        Ok(raw) => {
            response.status = Some(raw.status);
            if raw.body == NULL_BODY {
                response.raw = Some(raw);
                response.record(Error::NullBody);
            } else {
                if !is_no_content(&raw) {
                    response.body = Some(raw.body.clone());
                }
                response.raw = Some(raw);
            }
        }
        Err(err) => response.record(Error::Transport(err)),
    }
    response
}

/// Dispatches a request and parses the body as JSON.
///
/// # Example
///
/// ```no_run
/// use salesforce_rest::dispatch::dispatch;
/// use salesforce_rest::request::{Method, RequestDescriptor};
/// use salesforce_rest::transport::ReqwestTransport;
///
/// # #[tokio::main]
/// # async fn main() {
/// let request = RequestDescriptor::new(Method::Get, "na1.salesforce.com", "/services/data/");
/// let response = dispatch(&ReqwestTransport::new(), request).await;
/// if response.body.is_none() {
///     for err in &response.errors {
///         eprintln!("{err}");
///     }
/// }
/// # }
/// ```
#[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
pub async fn dispatch(transport: &dyn Transport, request: RequestDescriptor) -> Response<Value> {
    exchange(transport, request)
        .await
        .and_then(|bytes| serde_json::from_slice(&bytes).map_err(|source| Error::Parse { source }))
}

/// Dispatches a request and returns the body as raw bytes (blobs, CSV).
#[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
pub async fn dispatch_bytes(
    transport: &dyn Transport,
    request: RequestDescriptor,
) -> Response<Vec<u8>> {
    exchange(transport, request).await
}
