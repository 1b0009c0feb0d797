//! Unofficial Rust SDK for the Salesforce REST API.
//!
//! This crate provides OAuth and SOAP authentication, a uniform response
//! envelope for every call, and endpoint namespaces for sObjects, queries,
//! Bulk API 2.0 ingest jobs, Chatter, Analytics (Wave), Einstein generative
//! models and Apex.
//!
//! # Examples
//!
//! ```no_run
//! use salesforce_rest::client::{self, Credentials};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = client::Builder::new()
//!     .credentials(Credentials::new("client_id", "client_secret", "user@example.com", "password"))
//!     .build()?
//!     .connect()
//!     .await?;
//!
//! let created = client
//!     .sobjects("Lead")
//!     .insert(json!({"LastName": "Smith", "Company": "Acme"}))
//!     .await?;
//! println!("{:?}", created.body);
//! # Ok(())
//! # }
//! ```

/// Default Salesforce API version, used when neither the options nor the
/// instance provide one.
pub const DEFAULT_API_VERSION: &str = "37.0";

/// Default host for login and token calls.
pub const DEFAULT_LOGIN_HOST: &str = "login.salesforce.com";

/// Default connection timeout for HTTP requests (30 seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Per-call options layered over client defaults.
pub mod options;

/// Transport-independent request description.
pub mod request;

/// HTTP transport seam.
pub mod transport;

/// Request dispatch and response normalization.
pub mod dispatch;

/// XML to map conversion for SOAP responses.
pub mod xml;

/// OAuth 2.0 and SOAP authentication flows.
pub mod auth;

/// Client construction, session management and credential handling.
pub mod client;

/// SOQL queries, pagination and SOSL search.
pub mod query;

/// sObject records, blobs and describe calls.
pub mod sobjects;

/// Anonymous Apex, Apex REST and approval processes.
pub mod apex;

/// Bulk API 2.0 ingest jobs.
pub mod bulkapi;

/// Chatter feed items and comments.
pub mod chatter;

/// Analytics (Wave) datasets and SAQL queries.
pub mod wave;

/// Einstein generative model generations and embeddings.
pub mod einstein;

#[cfg(test)]
mod testing;

pub use client::{AuthFlow, Builder, Client, Credentials};
pub use dispatch::Response;
pub use options::{Options, Protocol, ProxyConfig};
