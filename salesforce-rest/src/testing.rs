//! Test doubles shared by the unit tests.

use crate::auth::Session;
use crate::client::{self, Client, Credentials};
use crate::request::RequestDescriptor;
use crate::transport::{RawResponse, Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Transport that replays queued responses and records every request.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<RawResponse, String>>>,
    requests: Mutex<Vec<RequestDescriptor>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, status: u16, body: &str) -> Self {
        self.respond_bytes(status, body.as_bytes())
    }

    pub(crate) fn respond_bytes(self, status: u16, body: &[u8]) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(RawResponse::new(status, body.to_vec())));
        self
    }

    pub(crate) fn fail(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub(crate) fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(raw)) => Ok(raw),
            Some(Err(message)) => Err(message.into()),
            None => Err("no scripted response left".into()),
        }
    }
}

pub(crate) fn credentials() -> Credentials {
    Credentials::new("client_id", "client_secret", "user@example.com", "password")
}

/// Client with an established session on `na1.salesforce.com`, API 37.0.
pub(crate) fn connected_client(transport: Arc<ScriptedTransport>) -> Client {
    let mut client = client::Builder::new()
        .credentials(credentials())
        .transport(transport)
        .build()
        .unwrap();
    client.session = Some(Session {
        token: "00Dxx0000001gPL!token".to_string(),
        instance_host: "na1.salesforce.com".to_string(),
        api_version: "37.0".to_string(),
    });
    client
}
