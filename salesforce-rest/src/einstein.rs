//! Einstein generative AI models through the Models API.

use crate::client::{Client, Error};
use crate::dispatch::Response;
use crate::request::Method;
use serde_json::Value;

/// Einstein LLM operations, obtained from [`Client::einstein`].
#[derive(Clone, Copy, Debug)]
pub struct Einstein<'a> {
    client: &'a Client,
}

impl Client {
    pub fn einstein(&self) -> Einstein<'_> {
        Einstein { client: self }
    }
}

impl Einstein<'_> {
    async fn post(&self, resource: &str, body: Value) -> Result<Response<Value>, Error> {
        let path = self.client.data_path(&format!("/einstein/llm/{resource}"))?;
        let request = self.client.rest_request(Method::Post, path)?.json(body);
        Ok(self.client.send(request).await)
    }

    /// Generates text from a prompt.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use salesforce_rest::client::Client;
    /// use serde_json::json;
    ///
    /// # async fn run(client: Client) -> Result<(), salesforce_rest::client::Error> {
    /// let generated = client
    ///     .einstein()
    ///     .generations(json!({
    ///         "promptTextorId": "Summarize the open cases",
    ///         "provider": "OpenAI",
    ///         "additionalConfig": {"maxTokens": 512},
    ///     }))
    ///     .await?;
    /// println!("{:?}", generated.body.map(|body| body["generations"][0]["text"].clone()));
    /// # Ok(())
    /// # }
    /// ```
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn generations(&self, body: Value) -> Result<Response<Value>, Error> {
        self.post("prompt/generations", body).await
    }

    /// Computes embedding vectors for a list of prompts.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn embeddings(&self, body: Value) -> Result<Response<Value>, Error> {
        self.post("embeddings", body).await
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{connected_client, ScriptedTransport};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_generations() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            200,
            r#"{"generations":[{"text":"Why did the developer go broke? Too many API calls."}]}"#,
        ));
        let client = connected_client(transport.clone());

        let response = client
            .einstein()
            .generations(json!({"promptTextorId": "Tell a joke", "provider": "OpenAI"}))
            .await
            .unwrap();
        assert!(response.body.unwrap()["generations"][0]["text"]
            .as_str()
            .unwrap()
            .contains("API calls"));
        assert_eq!(
            transport.requests()[0].path,
            "/services/data/v37.0/einstein/llm/prompt/generations"
        );
    }

    #[tokio::test]
    async fn test_embeddings() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            200,
            r#"{"embeddings":[{"embedding":[-0.011822878,0.2,-0.0059212535],"index":0}]}"#,
        ));
        let client = connected_client(transport.clone());

        let response = client
            .einstein()
            .embeddings(json!({"prompts": {"wrappedListString": ["blog ideas"]}}))
            .await
            .unwrap();
        let body = response.body.unwrap();
        let vector = body["embeddings"][0]["embedding"].as_array().unwrap();
        assert_eq!(vector.first().unwrap().as_f64(), Some(-0.011822878));
        assert_eq!(vector.last().unwrap().as_f64(), Some(-0.0059212535));
        assert_eq!(
            transport.requests()[0].path,
            "/services/data/v37.0/einstein/llm/embeddings"
        );
    }
}
