//! OAuth 2.0 device flow.
//!
//! The flow has two phases with a human in between:
//!
//! 1. [`authorize`] requests a device code and a user code. The user code is
//!    shown to a person who approves it at the verification URI.
//! 2. [`poll`] exchanges the device code for an access token. Until the
//!    person approves, the server answers `authorization_pending`.
//!
//! The caller decides how often and how long to poll. [`DeviceFlow`] bundles
//! both phases with optional callbacks and a bounded polling helper.

use super::{oauth_call, oauth_request, token_response, Error, TokenResponse, TOKEN_PATH};
use crate::dispatch::{self, Response};
use crate::options::Options;
use crate::request::RequestDescriptor;
use crate::transport::Transport;
use oauth2::{ClientId, DeviceCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Polling interval used when the server does not send one.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// OAuth error codes meaning "keep polling".
const PENDING_ERRORS: [&str; 2] = ["authorization_pending", "slow_down"];

/// State carried from the authorize phase to the poll phase.
#[derive(Debug, Clone)]
pub struct DeviceFlowState {
    pub client_id: ClientId,
    /// Set by [`authorize`], consumed by [`poll`].
    pub device_code: Option<DeviceCode>,
    pub scope: Option<String>,
}

impl DeviceFlowState {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: ClientId::new(client_id.into()),
            device_code: None,
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// Response of the authorize phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceAuthorization {
    pub device_code: String,
    /// Code the person types at the verification URI.
    pub user_code: String,
    pub verification_uri: String,
    /// Seconds to wait between polls.
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

/// Builds the authorize request.
pub fn authorize_request(state: &DeviceFlowState, options: &Options) -> RequestDescriptor {
    let mut form = vec![
        ("response_type", "device_code".to_string()),
        ("client_id", state.client_id.as_str().to_string()),
    ];
    if let Some(scope) = &state.scope {
        form.push(("scope", scope.clone()));
    }
    oauth_request(options.resolved_login_host(), TOKEN_PATH, form, options)
}

/// Builds the poll request. `None` until a device code is known.
pub fn poll_request(state: &DeviceFlowState, options: &Options) -> Option<RequestDescriptor> {
    let device_code = state.device_code.as_ref()?;
    let form = vec![
        ("grant_type", "device".to_string()),
        ("client_id", state.client_id.as_str().to_string()),
        ("code", device_code.secret().clone()),
    ];
    Some(oauth_request(
        options.resolved_login_host(),
        TOKEN_PATH,
        form,
        options,
    ))
}

/// Runs the authorize phase and stores the device code in `state`.
#[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
pub async fn authorize(
    transport: &dyn Transport,
    state: &mut DeviceFlowState,
    options: &Options,
) -> Response<DeviceAuthorization> {
    let response = oauth_call(transport, authorize_request(state, options))
        .await
        .and_then(|body| {
            serde_json::from_value::<DeviceAuthorization>(body)
                .map_err(|source| dispatch::Error::Parse { source })
        });
    if let Some(authorization) = &response.body {
        state.device_code = Some(DeviceCode::new(authorization.device_code.clone()));
    }
    response
}

/// Runs one poll of the token endpoint.
///
/// Before [`authorize`] succeeded nothing is sent and the response carries
/// [`Error::DeviceNotAuthorized`].
#[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
pub async fn poll(
    transport: &dyn Transport,
    state: &DeviceFlowState,
    options: &Options,
) -> Response<TokenResponse> {
    match poll_request(state, options) {
        Some(request) => token_response(oauth_call(transport, request).await),
        None => {
            let mut response = Response::new(oauth_request(
                options.resolved_login_host(),
                TOKEN_PATH,
                Vec::new(),
                options,
            ));
            response.record(Error::DeviceNotAuthorized.into());
            response
        }
    }
}

/// True when the response says the person has not approved yet.
pub fn is_pending<T>(response: &Response<T>) -> bool {
    response.errors.iter().any(|err| match err {
        dispatch::Error::Auth(auth) => auth
            .error_code()
            .is_some_and(|code| PENDING_ERRORS.contains(&code)),
        _ => false,
    })
}

type AuthorizeCallback = Box<dyn Fn(&Response<DeviceAuthorization>) + Send + Sync>;
type AuthenticateCallback = Box<dyn Fn(&Response<TokenResponse>) + Send + Sync>;

/// Device flow driver holding the transport, the state and the callbacks.
///
/// # Example
///
/// ```no_run
/// use salesforce_rest::auth::device::DeviceFlow;
/// use salesforce_rest::options::Options;
/// use salesforce_rest::transport::ReqwestTransport;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() {
/// let mut flow = DeviceFlow::new(Arc::new(ReqwestTransport::new()), "client_id", Options::new())
///     .on_authorize(|response| {
///         if let Some(authorization) = &response.body {
///             println!("Visit {} and enter {}", authorization.verification_uri, authorization.user_code);
///         }
///     });
///
/// flow.authorize().await;
/// let token = flow.wait_for_authentication(60).await;
/// println!("authenticated: {}", token.body.is_some());
/// # }
/// ```
pub struct DeviceFlow {
    transport: Arc<dyn Transport>,
    options: Options,
    state: DeviceFlowState,
    authorization: Option<DeviceAuthorization>,
    on_authorize: Option<AuthorizeCallback>,
    on_authenticate: Option<AuthenticateCallback>,
}

impl fmt::Debug for DeviceFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceFlow")
            .field("options", &self.options)
            .field("state", &self.state)
            .field("authorization", &self.authorization)
            .field("on_authorize", &self.on_authorize.is_some())
            .field("on_authenticate", &self.on_authenticate.is_some())
            .finish()
    }
}

impl DeviceFlow {
    pub fn new(
        transport: Arc<dyn Transport>,
        client_id: impl Into<String>,
        options: Options,
    ) -> Self {
        Self {
            transport,
            options,
            state: DeviceFlowState::new(client_id),
            authorization: None,
            on_authorize: None,
            on_authenticate: None,
        }
    }

    /// Requests the given OAuth scopes.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.state.scope = Some(scope.into());
        self
    }

    /// Called after every authorize call, successful or not.
    pub fn on_authorize(
        mut self,
        callback: impl Fn(&Response<DeviceAuthorization>) + Send + Sync + 'static,
    ) -> Self {
        self.on_authorize = Some(Box::new(callback));
        self
    }

    /// Called after every poll, successful or not.
    pub fn on_authenticate(
        mut self,
        callback: impl Fn(&Response<TokenResponse>) + Send + Sync + 'static,
    ) -> Self {
        self.on_authenticate = Some(Box::new(callback));
        self
    }

    pub fn state(&self) -> &DeviceFlowState {
        &self.state
    }

    /// Result of the last successful authorize call.
    pub fn authorization(&self) -> Option<&DeviceAuthorization> {
        self.authorization.as_ref()
    }

    /// Runs the authorize phase.
    pub async fn authorize(&mut self) -> Response<DeviceAuthorization> {
        let response = authorize(self.transport.as_ref(), &mut self.state, &self.options).await;
        if let Some(authorization) = &response.body {
            self.authorization = Some(authorization.clone());
        }
        if let Some(callback) = &self.on_authorize {
            callback(&response);
        }
        response
    }

    /// Runs one poll.
    pub async fn poll(&mut self) -> Response<TokenResponse> {
        let response = poll(self.transport.as_ref(), &self.state, &self.options).await;
        if let Some(callback) = &self.on_authenticate {
            callback(&response);
        }
        response
    }

    /// Polls at the server-provided interval until a token arrives, a
    /// non-pending error occurs, or `max_polls` polls were made.
    ///
    /// Returns the last poll response.
    pub async fn wait_for_authentication(&mut self, max_polls: usize) -> Response<TokenResponse> {
        let interval = Duration::from_secs(
            self.authorization
                .as_ref()
                .map_or(DEFAULT_POLL_INTERVAL_SECS, |a| a.interval),
        );

        let mut polls = 0;
        loop {
            let response = self.poll().await;
            polls += 1;
            if response.body.is_some() || !is_pending(&response) || polls >= max_polls {
                return response;
            }
            debug!(polls, interval_secs = interval.as_secs(), "Authorization pending");
            tokio::time::sleep(interval).await;
        }
    }
}
