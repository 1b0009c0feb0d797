//! SOAP `login` against the enterprise endpoint.

use super::{host_of, Error};
use crate::dispatch::{self, dispatch_bytes, Response};
use crate::options::Options;
use crate::request::{Method, RequestDescriptor};
use crate::transport::Transport;
use crate::xml::{element_to_map, text_at, XmlMap};
use oauth2::ResourceOwnerPassword;
use quick_xml::escape::escape;

pub const ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const ENTERPRISE_NS: &str = "urn:enterprise.soap.sforce.com";

const BODY_TAG: &str = "{http://schemas.xmlsoap.org/soap/envelope/}Body";
const LOGIN_RESPONSE_TAG: &str = "{urn:enterprise.soap.sforce.com}loginResponse";
const RESULT_TAG: &str = "{urn:enterprise.soap.sforce.com}result";
const SESSION_ID_PATH: [&str; 4] = [
    BODY_TAG,
    LOGIN_RESPONSE_TAG,
    RESULT_TAG,
    "{urn:enterprise.soap.sforce.com}sessionId",
];
const SERVER_URL_PATH: [&str; 4] = [
    BODY_TAG,
    LOGIN_RESPONSE_TAG,
    RESULT_TAG,
    "{urn:enterprise.soap.sforce.com}serverUrl",
];

/// Inputs of a SOAP login.
#[derive(Debug, Clone)]
pub struct SoapLogin {
    pub username: String,
    pub password: ResourceOwnerPassword,
    /// Scopes the login to an organization through a `LoginScopeHeader`.
    pub org_id: Option<String>,
}

impl SoapLogin {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: ResourceOwnerPassword::new(password.into()),
            org_id: None,
        }
    }

    pub fn org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    /// SOAP envelope for the `login` call. Values are XML-escaped.
    pub fn envelope(&self) -> String {
        let header = match &self.org_id {
            Some(org_id) => format!(
                "<soapenv:Header><LoginScopeHeader xmlns=\"{ENTERPRISE_NS}\"><organizationId>{}</organizationId></LoginScopeHeader></soapenv:Header>",
                escape(org_id.as_str())
            ),
            None => String::new(),
        };
        format!(
            "<soapenv:Envelope xmlns:soapenv=\"{ENVELOPE_NS}\">{header}<soapenv:Body><login xmlns=\"{ENTERPRISE_NS}\"><username>{}</username><password>{}</password></login></soapenv:Body></soapenv:Envelope>",
            escape(self.username.as_str()),
            escape(self.password.secret().as_str()),
        )
    }
}

/// Builds the login request against the login host.
pub fn request(login: &SoapLogin, options: &Options) -> RequestDescriptor {
    let version = options
        .api_version
        .as_deref()
        .unwrap_or(crate::DEFAULT_API_VERSION);
    RequestDescriptor::new(
        Method::Post,
        options.resolved_login_host(),
        format!("/services/Soap/c/{version}/"),
    )
    .header("SOAPAction", "login")
    .raw(login.envelope(), "text/xml; charset=utf-8")
    .with_options(options)
}

/// Extracts the session id and the instance host from a parsed login
/// response.
pub fn login_session(envelope: &XmlMap) -> Result<(String, String), Error> {
    let session_id = text_at(envelope, &SESSION_ID_PATH)
        .ok_or_else(|| Error::MissingField("sessionId".to_string()))?;
    let server_url = text_at(envelope, &SERVER_URL_PATH)
        .ok_or_else(|| Error::MissingField("serverUrl".to_string()))?;
    Ok((session_id.to_string(), host_of(server_url)?))
}

/// Performs the SOAP login.
///
/// The body holds the parsed envelope whenever it was well-formed XML, even
/// for a non-200 status, so a SOAP fault can be inspected. A non-200 status
/// additionally records [`Error::SoapFault`]; a 200 without a session records
/// [`Error::MissingField`].
#[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
pub async fn authenticate(
    transport: &dyn Transport,
    login: &SoapLogin,
    options: &Options,
) -> Response<XmlMap> {
    let mut response = dispatch_bytes(transport, request(login, options))
        .await
        .and_then(|bytes| {
            element_to_map(&String::from_utf8_lossy(&bytes))
                .map_err(|err| dispatch::Error::Auth(Error::Xml(err)))
        });

    match response.status {
        Some(200) => {
            let extracted = response.body.as_ref().map(login_session);
            if let Some(Err(err)) = extracted {
                response.record(err.into());
            }
        }
        Some(status) => response.record(Error::SoapFault { status }.into()),
        None => {}
    }
    response
}
