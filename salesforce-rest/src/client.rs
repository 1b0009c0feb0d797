use crate::auth::device::{self, DeviceFlow};
use crate::auth::password::{self, PasswordGrant};
use crate::auth::soap::{self, SoapLogin};
use crate::auth::{self, Session, TokenResponse};
use crate::dispatch::{self, dispatch, dispatch_bytes, Response};
use crate::options::Options;
use crate::request::{Method, RequestDescriptor, JSON_CONTENT_TYPE};
use crate::transport::{ReqwestTransport, Transport};
use crate::xml::XmlMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Endpoint listing the API versions an instance supports.
pub const VERSIONS_PATH: &str = "/services/data/";

/// Errors that can occur during client operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Failed to read credentials file from disk.
    #[error("Failed to read credentials file at {path}: {source}")]
    ReadCredentials {
        /// Path to the credentials file that failed to read.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Failed to parse credentials JSON.
    #[error("Failed to parse credentials JSON: {source}")]
    ParseCredentials {
        #[source]
        source: serde_json::Error,
    },
    /// Required builder parameter was not provided.
    #[error("Missing required attribute: {}", _0)]
    MissingRequiredAttribute(String),
    /// Invalid credentials for the selected auth flow.
    #[error("Invalid credentials for {flow}: {message}")]
    InvalidCredentials {
        /// The authentication flow that failed validation.
        flow: String,
        /// Description of what's missing or invalid.
        message: String,
    },
    /// Authentication produced no usable session.
    ///
    /// `errors` holds what the authentication call recorded, including any
    /// [`auth::Error::Rejected`] with the server's error payload.
    #[error("Failed to perform `login` request")]
    Login { errors: Vec<dispatch::Error> },
    /// The device flow could not be authorized.
    #[error("Failed to perform device authorization")]
    DeviceFlow { errors: Vec<dispatch::Error> },
    /// The person did not approve the device in time.
    #[error("Device flow still pending after {polls} polls")]
    DeviceFlowExpired { polls: usize },
    /// An operation needing a session was called before logging in.
    #[error("Client is not connected")]
    NotConnected,
}

impl Error {
    /// The authentication error recorded by a failed login, if any.
    pub fn auth_error(&self) -> Option<&auth::Error> {
        match self {
            Error::Login { errors } | Error::DeviceFlow { errors } => {
                errors.iter().find_map(|err| match err {
                    dispatch::Error::Auth(auth) => Some(auth),
                    _ => None,
                })
            }
            _ => None,
        }
    }
}

/// Authentication flow used by [`Client::connect`] and [`Client::scoped`].
///
/// The device flow needs a human in the loop and is driven separately through
/// [`Client::device_flow`].
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthFlow {
    /// OAuth 2.0 username-password grant.
    ///
    /// Requires: `client_id`, `client_secret`, `username`, `password`
    #[default]
    UsernamePassword,
    /// SOAP `login` call.
    ///
    /// Requires: `username`, `password`
    Soap,
}

/// Salesforce credentials.
///
/// Obtained from a Salesforce Connected App plus the integration user.
///
/// # Example
///
/// ```
/// use salesforce_rest::client::Credentials;
///
/// let creds = Credentials::new("client_id", "client_secret", "user@example.com", "password");
/// assert!(creds.org_id.is_none());
/// ```
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct Credentials {
    /// Client ID from the Connected App (Consumer Key).
    pub client_id: String,
    /// Client Secret from the Connected App (Consumer Secret).
    pub client_secret: String,
    /// Username for authentication (email address).
    pub username: String,
    /// Password for authentication.
    ///
    /// **Note:** If your org requires a security token, append it to the password.
    pub password: String,
    /// Organization ID, sent with SOAP logins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            username: username.into(),
            password: password.into(),
            org_id: None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("org_id", &self.org_id)
            .finish()
    }
}

/// Source for loading credentials.
#[derive(Debug, Clone)]
pub enum CredentialsFrom {
    /// Load credentials from a JSON file.
    Path(PathBuf),
    /// Use credentials provided directly.
    Value(Credentials),
}

/// Salesforce REST client.
///
/// Use [`Builder`] to construct a client instance, then [`connect`](Self::connect)
/// to establish a [`Session`]. Every endpoint operation returns a
/// [`Response`]; inspect its `errors` when the body is absent.
///
/// # Examples
///
/// ## Username-Password Flow (Default)
///
/// ```no_run
/// use salesforce_rest::client::{self, Credentials};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = client::Builder::new()
///     .credentials(Credentials::new("client_id", "client_secret", "user@example.com", "password"))
///     .build()?
///     .connect()
///     .await?;
///
/// let accounts = client.query("SELECT Id, Name FROM Account LIMIT 10").await?;
/// println!("{:?}", accounts.body);
/// # Ok(())
/// # }
/// ```
///
/// ## Loading Credentials from File
///
/// ```no_run
/// use salesforce_rest::client::{self, AuthFlow};
/// use std::path::PathBuf;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = client::Builder::new()
///     .credentials_path(PathBuf::from("credentials.json"))
///     .auth_flow(AuthFlow::Soap)
///     .build()?
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    /// Source of credentials (file path or direct value).
    credentials_from: CredentialsFrom,
    /// Authentication flow to use.
    auth_flow: AuthFlow,
    transport: Arc<dyn Transport>,
    /// Client-level defaults, possibly layered by [`with_options`](Self::with_options).
    options: Options,
    pub(crate) session: Option<Session>,
}

impl Client {
    fn load_credentials(&self) -> Result<Credentials, Error> {
        match &self.credentials_from {
            CredentialsFrom::Value(creds) => Ok(creds.clone()),
            CredentialsFrom::Path(path) => {
                let credentials_string =
                    fs::read_to_string(path).map_err(|e| Error::ReadCredentials {
                        path: path.clone(),
                        source: e,
                    })?;
                serde_json::from_str(&credentials_string)
                    .map_err(|e| Error::ParseCredentials { source: e })
            }
        }
    }

    /// Validates that required credential fields are present for the selected auth flow.
    fn validate_credentials(&self, credentials: &Credentials) -> Result<(), Error> {
        let flow = format!("{:?}", self.auth_flow);
        let mut required = vec![
            ("username", &credentials.username),
            ("password", &credentials.password),
        ];
        if self.auth_flow == AuthFlow::UsernamePassword {
            required.push(("client_id", &credentials.client_id));
            required.push(("client_secret", &credentials.client_secret));
        }

        match required.into_iter().find(|(_, value)| value.is_empty()) {
            Some((name, _)) => Err(Error::InvalidCredentials {
                flow,
                message: format!("`{name}` cannot be None"),
            }),
            None => Ok(()),
        }
    }

    /// Logs in with the configured [`AuthFlow`].
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Credentials file cannot be read ([`Error::ReadCredentials`])
    /// - Credentials JSON is invalid ([`Error::ParseCredentials`])
    /// - Required fields are missing for the auth flow ([`Error::InvalidCredentials`])
    /// - No session could be established ([`Error::Login`])
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn connect(mut self) -> Result<Self, Error> {
        self.authenticate().await?;
        Ok(self)
    }

    async fn authenticate(&mut self) -> Result<(), Error> {
        match self.auth_flow {
            AuthFlow::UsernamePassword => {
                self.login().await?;
            }
            AuthFlow::Soap => {
                let response = self.login_via_soap().await?;
                if self.session.is_none() {
                    return Err(Error::Login {
                        errors: response.errors,
                    });
                }
            }
        }
        Ok(())
    }

    /// Performs the OAuth username-password login and establishes the session.
    ///
    /// # Errors
    ///
    /// Besides credential loading errors, returns [`Error::Login`] when no
    /// token was obtained. A rejected login (e.g. HTTP 400 `invalid_grant`)
    /// is reachable through [`Error::auth_error`].
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn login(&mut self) -> Result<Response<TokenResponse>, Error> {
        let credentials = self.load_credentials()?;
        self.validate_credentials(&credentials)?;

        let grant = PasswordGrant::new(
            credentials.client_id,
            credentials.client_secret,
            credentials.username,
            credentials.password,
        );
        let mut response = password::authenticate(self.transport.as_ref(), &grant, &self.options).await;

        let Some(token) = &response.body else {
            return Err(Error::Login {
                errors: response.errors,
            });
        };
        match token.instance_host() {
            Ok(host) => {
                let access_token = token.access_token.clone();
                self.establish_session(access_token, host).await;
                Ok(response)
            }
            Err(err) => {
                response.errors.push(err.into());
                Err(Error::Login {
                    errors: response.errors,
                })
            }
        }
    }

    /// Performs the SOAP login.
    ///
    /// The session is established only for an HTTP 200 carrying a session id.
    /// Otherwise the parsed envelope and the recorded errors are returned
    /// so a SOAP fault can be inspected.
    ///
    /// # Errors
    ///
    /// Besides credential loading errors, returns [`Error::Login`] when the
    /// call produced no response at all.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn login_via_soap(&mut self) -> Result<Response<XmlMap>, Error> {
        let credentials = self.load_credentials()?;
        self.validate_credentials(&credentials)?;

        let mut login = SoapLogin::new(credentials.username, credentials.password);
        login.org_id = credentials.org_id;
        let response = soap::authenticate(self.transport.as_ref(), &login, &self.options).await;

        if response.status.is_none() {
            return Err(Error::Login {
                errors: response.errors,
            });
        }
        if response.errors.is_empty() {
            if let Some(Ok((token, host))) = response.body.as_ref().map(soap::login_session) {
                self.establish_session(token, host).await;
            }
        }
        Ok(response)
    }

    /// Starts a device flow for the configured client id.
    ///
    /// Drive it with [`DeviceFlow::authorize`] and [`DeviceFlow::poll`], or
    /// hand it to [`login_via_device_flow`](Self::login_via_device_flow).
    pub fn device_flow(&self) -> Result<DeviceFlow, Error> {
        let credentials = self.load_credentials()?;
        if credentials.client_id.is_empty() {
            return Err(Error::InvalidCredentials {
                flow: "DeviceFlow".to_string(),
                message: "`client_id` cannot be None".to_string(),
            });
        }
        Ok(DeviceFlow::new(
            self.transport.clone(),
            credentials.client_id,
            self.options.clone(),
        ))
    }

    /// Runs both device flow phases and establishes the session.
    ///
    /// The authorize phase is skipped when `flow` was already authorized.
    /// Polling stops after `max_polls` polls.
    ///
    /// # Errors
    ///
    /// - [`Error::DeviceFlow`] when authorization or polling failed
    /// - [`Error::DeviceFlowExpired`] when the poll budget ran out
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn login_via_device_flow(
        &mut self,
        flow: &mut DeviceFlow,
        max_polls: usize,
    ) -> Result<Response<TokenResponse>, Error> {
        if flow.authorization().is_none() {
            let response = flow.authorize().await;
            if response.body.is_none() {
                return Err(Error::DeviceFlow {
                    errors: response.errors,
                });
            }
        }

        let mut response = flow.wait_for_authentication(max_polls).await;
        let Some(token) = &response.body else {
            if device::is_pending(&response) {
                return Err(Error::DeviceFlowExpired { polls: max_polls });
            }
            return Err(Error::DeviceFlow {
                errors: response.errors,
            });
        };
        match token.instance_host() {
            Ok(host) => {
                let access_token = token.access_token.clone();
                self.establish_session(access_token, host).await;
                Ok(response)
            }
            Err(err) => {
                response.errors.push(err.into());
                Err(Error::DeviceFlow {
                    errors: response.errors,
                })
            }
        }
    }

    async fn establish_session(&mut self, token: String, instance_host: String) {
        let api_version = self.resolve_api_version(&instance_host).await;
        info!(instance_host = %instance_host, api_version = %api_version, "Session established");
        self.session = Some(Session {
            token,
            instance_host,
            api_version,
        });
    }

    /// Configured API version, or the latest version the instance reports,
    /// or [`DEFAULT_API_VERSION`](crate::DEFAULT_API_VERSION).
    async fn resolve_api_version(&self, instance_host: &str) -> String {
        if let Some(version) = &self.options.api_version {
            return version.clone();
        }

        let request = RequestDescriptor::new(Method::Get, instance_host, VERSIONS_PATH)
            .header("Content-Type", JSON_CONTENT_TYPE)
            .with_options(&self.options);
        let response = dispatch(self.transport.as_ref(), request).await;

        if response.status == Some(200) {
            if let Some(version) = response.body.as_ref().and_then(latest_version) {
                return version;
            }
        }
        debug!(status = ?response.status, "Falling back to default API version");
        crate::DEFAULT_API_VERSION.to_string()
    }

    /// Revokes the session token.
    ///
    /// The session is kept on the client; a revoked token simply stops working.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn logout(&self) -> Result<Response<Value>, Error> {
        let session = self.session()?;
        Ok(auth::revoke(
            self.transport.as_ref(),
            &session.instance_host,
            &session.token,
            &self.options,
        )
        .await)
    }

    /// Lists the API versions supported by the instance.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn versions(&self) -> Result<Response<Value>, Error> {
        let session = self.session()?;
        let request = RequestDescriptor::new(Method::Get, &session.instance_host, VERSIONS_PATH)
            .authorized(&session.token)
            .with_options(&self.options);
        Ok(self.send(request).await)
    }

    /// Logs in, runs `f`, then logs out.
    ///
    /// Logout failures are logged and never override the result of `f`.
    ///
    /// # Errors
    ///
    /// Returns the login error when no session could be established; `f`
    /// is not run in that case.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use salesforce_rest::client::{self, Credentials};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = client::Builder::new()
    ///     .credentials(Credentials::new("client_id", "client_secret", "user@example.com", "password"))
    ///     .build()?;
    ///
    /// let total = client
    ///     .scoped(async |client| {
    ///         let response = client.query("SELECT COUNT() FROM Lead").await?;
    ///         Ok::<_, client::Error>(response.body.map(|body| body["totalSize"].clone()))
    ///     })
    ///     .await??;
    /// println!("{total:?}");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn scoped<F, T>(mut self, f: F) -> Result<T, Error>
    where
        F: AsyncFnOnce(&Client) -> T,
    {
        self.authenticate().await?;
        let output = f(&self).await;

        match self.logout().await {
            Ok(response) if response.errors.is_empty() => {}
            Ok(response) => {
                let reasons: Vec<String> = response.errors.iter().map(ToString::to_string).collect();
                warn!(reasons = ?reasons, "Unable to logout");
            }
            Err(err) => warn!(reason = %err, "Unable to logout"),
        }
        Ok(output)
    }

    /// Returns a client whose options are `options` layered over this
    /// client's options. The session is shared.
    ///
    /// ```no_run
    /// # use salesforce_rest::client::Client;
    /// # use salesforce_rest::options::Options;
    /// # async fn run(client: Client) -> Result<(), salesforce_rest::client::Error> {
    /// let legacy = client.with_options(Options::new().api_version("40.0").timeout_secs(5.0));
    /// let response = legacy.query("SELECT Id FROM Contact").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_options(&self, options: Options) -> Client {
        let mut client = self.clone();
        client.options = options.layered_over(&self.options);
        client
    }

    /// The current session.
    pub fn session(&self) -> Result<&Session, Error> {
        self.session.as_ref().ok_or(Error::NotConnected)
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Effective options of this client.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// API version used for REST paths: the layered option, else the
    /// session's resolved version.
    pub fn api_version(&self) -> Result<&str, Error> {
        match &self.options.api_version {
            Some(version) => Ok(version),
            None => Ok(&self.session()?.api_version),
        }
    }

    /// `/services/data/v{version}{suffix}`.
    pub(crate) fn data_path(&self, suffix: &str) -> Result<String, Error> {
        Ok(format!("/services/data/v{}{}", self.api_version()?, suffix))
    }

    /// Authenticated request against the instance host.
    pub(crate) fn rest_request(
        &self,
        method: Method,
        path: impl Into<String>,
    ) -> Result<RequestDescriptor, Error> {
        let session = self.session()?;
        Ok(
            RequestDescriptor::new(method, session.instance_host.clone(), path)
                .authorized(&session.token)
                .with_options(&self.options),
        )
    }

    pub(crate) async fn send(&self, request: RequestDescriptor) -> Response<Value> {
        dispatch(self.transport.as_ref(), request).await
    }

    pub(crate) async fn send_bytes(&self, request: RequestDescriptor) -> Response<Vec<u8>> {
        dispatch_bytes(self.transport.as_ref(), request).await
    }
}

/// Picks the numerically greatest `version` from a versions listing.
pub fn latest_version(versions: &Value) -> Option<String> {
    fn numeric(version: &str) -> Option<(u32, u32)> {
        let (major, minor) = version.split_once('.').unwrap_or((version, "0"));
        Some((major.parse().ok()?, minor.parse().ok()?))
    }

    versions
        .as_array()?
        .iter()
        .filter_map(|entry| entry.get("version")?.as_str())
        .filter_map(|version| numeric(version).map(|key| (key, version)))
        .max_by_key(|(key, _)| *key)
        .map(|(_, version)| version.to_string())
}

/// Builder for creating [`Client`] instances.
///
/// Credentials must be provided via either [`credentials_path`](Self::credentials_path)
/// or [`credentials`](Self::credentials).
#[derive(Default)]
pub struct Builder {
    credentials_from: Option<CredentialsFrom>,
    auth_flow: Option<AuthFlow>,
    options: Option<Options>,
    transport: Option<Arc<dyn Transport>>,
}

impl Builder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Builder::default()
    }

    /// Loads credentials from a JSON file.
    ///
    /// Expected JSON format:
    /// ```json
    /// {
    ///   "client_id": "your_client_id",
    ///   "client_secret": "your_client_secret",
    ///   "username": "user@example.com",
    ///   "password": "your_password"
    /// }
    /// ```
    pub fn credentials_path(mut self, path: PathBuf) -> Self {
        self.credentials_from = Some(CredentialsFrom::Path(path));
        self
    }

    /// Sets credentials directly.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials_from = Some(CredentialsFrom::Value(credentials));
        self
    }

    /// Sets the authentication flow.
    ///
    /// Defaults to [`AuthFlow::UsernamePassword`] if not specified.
    pub fn auth_flow(mut self, auth_flow: AuthFlow) -> Self {
        self.auth_flow = Some(auth_flow);
        self
    }

    /// Sets client-level default options.
    pub fn options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }

    /// Replaces the HTTP transport. Defaults to [`ReqwestTransport`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials were not provided via either
    /// [`credentials_path`](Self::credentials_path) or [`credentials`](Self::credentials).
    pub fn build(self) -> Result<Client, Error> {
        Ok(Client {
            credentials_from: self.credentials_from.ok_or_else(|| {
                Error::MissingRequiredAttribute("credentials or credentials_path".to_string())
            })?,
            auth_flow: self.auth_flow.unwrap_or_default(),
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(ReqwestTransport::new())),
            options: self.options.unwrap_or_default(),
            session: None,
        })
    }
}
