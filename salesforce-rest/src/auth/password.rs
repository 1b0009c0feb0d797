//! OAuth 2.0 username-password grant.

use super::{oauth_call, oauth_request, token_response, TokenResponse, TOKEN_PATH};
use crate::dispatch::Response;
use crate::options::Options;
use crate::request::RequestDescriptor;
use crate::transport::Transport;
use oauth2::{ClientId, ClientSecret, ResourceOwnerPassword, ResourceOwnerUsername};

/// Inputs of the password grant.
///
/// Secrets are wrapped in `oauth2` secret types so they never show up in
/// `Debug` output.
#[derive(Debug, Clone)]
pub struct PasswordGrant {
    pub client_id: ClientId,
    pub client_secret: ClientSecret,
    pub username: ResourceOwnerUsername,
    /// Password, with the security token appended when the org requires one.
    pub password: ResourceOwnerPassword,
}

impl PasswordGrant {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client_id: ClientId::new(client_id.into()),
            client_secret: ClientSecret::new(client_secret.into()),
            username: ResourceOwnerUsername::new(username.into()),
            password: ResourceOwnerPassword::new(password.into()),
        }
    }

    fn form(&self) -> Vec<(&'static str, String)> {
        vec![
            ("grant_type", "password".to_string()),
            ("client_id", self.client_id.as_str().to_string()),
            ("client_secret", self.client_secret.secret().clone()),
            ("username", self.username.as_str().to_string()),
            ("password", self.password.secret().clone()),
        ]
    }
}

/// Builds the token request against the login host.
pub fn request(grant: &PasswordGrant, options: &Options) -> RequestDescriptor {
    oauth_request(
        options.resolved_login_host(),
        TOKEN_PATH,
        grant.form(),
        options,
    )
}

/// Exchanges username and password for an access token.
///
/// The body is present only for an HTTP 200 whose body decodes as a
/// [`TokenResponse`]. Any other status records an
/// [`auth::Error::Rejected`](super::Error::Rejected) holding the server's
/// error body.
///
/// # Example
///
/// ```no_run
/// use salesforce_rest::auth::password::{self, PasswordGrant};
/// use salesforce_rest::options::Options;
/// use salesforce_rest::transport::ReqwestTransport;
///
/// # #[tokio::main]
/// # async fn main() {
/// let grant = PasswordGrant::new("client_id", "client_secret", "user@example.com", "pass+token");
/// let response = password::authenticate(&ReqwestTransport::new(), &grant, &Options::new()).await;
/// match response.body {
///     Some(token) => println!("instance: {}", token.instance_url),
///     None => eprintln!("login failed: {:?}", response.errors),
/// }
/// # }
/// ```
#[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
pub async fn authenticate(
    transport: &dyn Transport,
    grant: &PasswordGrant,
    options: &Options,
) -> Response<TokenResponse> {
    token_response(oauth_call(transport, request(grant, options)).await)
}
