//! Example of logging in and reading records.
//!
//! This example demonstrates:
//! - Loading credentials from the environment
//! - A scoped session that logs out when done
//! - Following query pages with `query_more`
//! - Inspecting recorded errors when a body is absent

use salesforce_rest::client::{self, Credentials};
use salesforce_rest::options::Options;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut options = Options::new();
    if let Ok(host) = std::env::var("SALESFORCE_LOGIN_HOST") {
        options = options.login_host(host);
    }

    let client = client::Builder::new()
        .credentials(Credentials::new(
            std::env::var("SALESFORCE_CLIENT_ID")?,
            std::env::var("SALESFORCE_CLIENT_SECRET")?,
            std::env::var("SALESFORCE_USERNAME")?,
            std::env::var("SALESFORCE_PASSWORD")?,
        ))
        .options(options)
        .build()?;

    client
        .scoped(async |client| {
            info!("Connected with API version {:?}", client.api_version());

            let response = match client.query_more("SELECT Id, Name FROM Account").await {
                Ok(response) => response,
                Err(err) => {
                    error!("Query not sent: {err}");
                    return;
                }
            };

            match response.body {
                Some(pages) => {
                    let records: usize = pages
                        .iter()
                        .filter_map(|page| page["records"].as_array())
                        .map(Vec::len)
                        .sum();
                    info!("Fetched {records} accounts in {} pages", pages.len());
                }
                None => {
                    for err in &response.errors {
                        error!("Query failed: {err}");
                    }
                }
            }
        })
        .await?;

    Ok(())
}
