//! Chatter feed items and comments.

use crate::client::{Client, Error};
use crate::dispatch::Response;
use crate::request::Method;
use serde_json::Value;

/// Chatter operations, obtained from [`Client::chatter`].
#[derive(Clone, Copy, Debug)]
pub struct Chatter<'a> {
    client: &'a Client,
}

impl Client {
    pub fn chatter(&self) -> Chatter<'_> {
        Chatter { client: self }
    }
}

impl Chatter<'_> {
    /// Posts a feed item.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use salesforce_rest::client::Client;
    /// use serde_json::json;
    ///
    /// # async fn run(client: Client) -> Result<(), salesforce_rest::client::Error> {
    /// client
    ///     .chatter()
    ///     .feed_item(json!({
    ///         "body": {"messageSegments": [{"type": "Text", "text": "Release is out"}]},
    ///         "feedElementType": "FeedItem",
    ///         "subjectId": "me",
    ///     }))
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn feed_item(&self, body: Value) -> Result<Response<Value>, Error> {
        let path = self.client.data_path("/chatter/feed-elements")?;
        let request = self.client.rest_request(Method::Post, path)?.json(body);
        Ok(self.client.send(request).await)
    }

    /// Comments on the feed element `feed_element_id`.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn feed_comment(&self, feed_element_id: &str, body: Value) -> Result<Response<Value>, Error> {
        let path = self.client.data_path(&format!(
            "/chatter/feed-elements/{feed_element_id}/capabilities/comments/items"
        ))?;
        let request = self.client.rest_request(Method::Post, path)?.json(body);
        Ok(self.client.send(request).await)
    }
}

#[cfg(test)]
mod tests {
    use crate::request::Method;
    use crate::testing::{connected_client, ScriptedTransport};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_feed_item_and_comment() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(201, r#"{"id":"0D5D0000000DaZBKA0","type":"TextPost"}"#)
                .respond(201, r#"{"id":"0D7D0000000Ai6uKAC"}"#),
        );
        let client = connected_client(transport.clone());

        let item = client
            .chatter()
            .feed_item(json!({"subjectId": "me", "feedElementType": "FeedItem"}))
            .await
            .unwrap();
        let item_id = item.body.unwrap()["id"].as_str().unwrap().to_string();
        client
            .chatter()
            .feed_comment(&item_id, json!({"body": {"messageSegments": []}}))
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[0].path, "/services/data/v37.0/chatter/feed-elements");
        assert_eq!(
            requests[1].path,
            "/services/data/v37.0/chatter/feed-elements/0D5D0000000DaZBKA0/capabilities/comments/items"
        );
    }
}
