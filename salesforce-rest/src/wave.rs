//! Analytics (Wave) datasets and SAQL queries.

use crate::client::{Client, Error};
use crate::dispatch::Response;
use crate::request::Method;
use serde_json::{json, Value};

/// Analytics operations, obtained from [`Client::wave`].
#[derive(Clone, Copy, Debug)]
pub struct Wave<'a> {
    client: &'a Client,
}

impl Client {
    pub fn wave(&self) -> Wave<'_> {
        Wave { client: self }
    }
}

impl Wave<'_> {
    /// Fetches a dataset by API name, e.g. `"opportunities"`.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn dataset(&self, api_name: &str) -> Result<Response<Value>, Error> {
        let path = self.client.data_path(&format!("/wave/datasets/{api_name}"))?;
        Ok(self.client.send(self.client.rest_request(Method::Get, path)?).await)
    }

    /// Runs a query. `query` is the full request body, e.g.
    /// `{"query": "q = load \"0Fb...\"; ..."}`.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn query(&self, query: Value) -> Result<Response<Value>, Error> {
        let path = self.client.data_path("/wave/query")?;
        let request = self.client.rest_request(Method::Post, path)?.json(query);
        Ok(self.client.send(request).await)
    }

    /// Runs a SAQL statement, wrapping it in the `{"query": ..}` body.
    pub async fn saql(&self, saql: &str) -> Result<Response<Value>, Error> {
        self.query(json!({ "query": saql })).await
    }
}
