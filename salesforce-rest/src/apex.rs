//! Anonymous Apex, Apex REST resources and approval processes.

use crate::client::{Client, Error};
use crate::dispatch::Response;
use crate::query::with_query;
use crate::request::Method;
use serde_json::Value;
use url::form_urlencoded;

/// Prefix of custom Apex REST resources.
pub const APEX_REST_PATH: &str = "/services/apexrest/";

impl Client {
    /// Executes a block of anonymous Apex through the Tooling API.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use salesforce_rest::client::Client;
    /// # async fn run(client: Client) -> Result<(), salesforce_rest::client::Error> {
    /// let response = client.execute_anonymous("System.debug('Hello world');").await?;
    /// println!("compiled: {:?}", response.body.map(|body| body["compiled"].clone()));
    /// # Ok(())
    /// # }
    /// ```
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn execute_anonymous(&self, apex: &str) -> Result<Response<Value>, Error> {
        let path = with_query(
            &self.data_path("/tooling/executeAnonymous/")?,
            "anonymousBody",
            apex,
        );
        Ok(self.send(self.rest_request(Method::Get, path)?).await)
    }

    /// Calls a custom Apex REST resource at `/services/apexrest/{action}`.
    ///
    /// `params` are form-urlencoded into the query string. `body` is sent as
    /// JSON when present.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn apex_rest(
        &self,
        action: &str,
        method: Method,
        params: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Response<Value>, Error> {
        let mut path = format!("{APEX_REST_PATH}{action}");
        if !params.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params)
                .finish();
            path = format!("{path}?{encoded}");
        }

        let mut request = self.rest_request(method, path)?;
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(self.send(request).await)
    }

    /// Lists approval processes, or submits approval requests when `body`
    /// is given.
    ///
    /// Without a body this is a GET; with a body it is a POST.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn approvals(&self, body: Option<Value>) -> Result<Response<Value>, Error> {
        let path = self.data_path("/process/approvals/")?;
        let request = match body {
            Some(body) => self.rest_request(Method::Post, path)?.json(body),
            None => self.rest_request(Method::Get, path)?,
        };
        Ok(self.send(request).await)
    }
}

#[cfg(test)]
mod tests {
    use crate::request::{Body, Method};
    use crate::testing::{connected_client, ScriptedTransport};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_execute_anonymous() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            200,
            r#"{"line":-1,"column":-1,"compiled":true,"success":true,"compileProblem":null}"#,
        ));
        let client = connected_client(transport.clone());

        let response = client
            .execute_anonymous("system.debug('test');")
            .await
            .unwrap();
        assert_eq!(response.body.unwrap()["success"], true);
        assert_eq!(
            transport.requests()[0].path,
            "/services/data/v37.0/tooling/executeAnonymous/?anonymousBody=system.debug%28%27test%27%29%3B"
        );
    }

    #[tokio::test]
    async fn test_apex_rest_with_params_and_body() {
        let transport = Arc::new(ScriptedTransport::new().respond(200, r#"{"ok":true}"#));
        let client = connected_client(transport.clone());

        client
            .apex_rest(
                "Cases/v1",
                Method::Put,
                &[("priority", "High"), ("origin", "Web & Email")],
                Some(json!({"subject": "Broken"})),
            )
            .await
            .unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, Method::Put);
        assert_eq!(
            sent.path,
            "/services/apexrest/Cases/v1?priority=High&origin=Web+%26+Email"
        );
        assert_eq!(sent.body, Some(Body::Json(json!({"subject": "Broken"}))));
    }

    #[tokio::test]
    async fn test_apex_rest_without_params() {
        let transport = Arc::new(ScriptedTransport::new().respond(200, "[]"));
        let client = connected_client(transport.clone());

        client
            .apex_rest("Accounts", Method::Get, &[], None)
            .await
            .unwrap();
        let sent = &transport.requests()[0];
        assert_eq!(sent.path, "/services/apexrest/Accounts");
        assert!(sent.body.is_none());
    }

    #[tokio::test]
    async fn test_approvals_method_depends_on_body() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(200, r#"{"approvals":{}}"#)
                .respond(200, r#"[{"errors":null,"success":true}]"#),
        );
        let client = connected_client(transport.clone());

        client.approvals(None).await.unwrap();
        let submitted = client
            .approvals(Some(json!({"requests": [{"actionType": "Submit", "contextId": "001D000000I8mIm"}]})))
            .await
            .unwrap();
        assert_eq!(submitted.body.unwrap()[0]["success"], true);

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::Get);
        assert_eq!(requests[0].path, "/services/data/v37.0/process/approvals/");
        assert!(requests[0].body.is_none());
        assert_eq!(requests[1].method, Method::Post);
    }
}
