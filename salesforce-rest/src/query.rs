//! SOQL queries, pagination and SOSL search.
//!
//! Large result sets come back in pages. Each page reports `done`, and while
//! `done` is false it carries a server-relative `nextRecordsUrl` to fetch
//! the next page. [`QueryCursor`] tracks that state; [`Client::query_more`]
//! drives it to completion.

use crate::client::{Client, Error};
use crate::dispatch::{self, Response};
use crate::request::Method;
use serde_json::Value;
use tracing::debug;
use url::form_urlencoded;

/// `{path}?{key}={value}` with the value form-urlencoded.
pub(crate) fn with_query(path: &str, key: &str, value: &str) -> String {
    let encoded = form_urlencoded::Serializer::new(String::new())
        .append_pair(key, value)
        .finish();
    format!("{path}?{encoded}")
}

/// Pagination state of a SOQL query.
///
/// A cursor starts with no pages. Every page fed to [`advance`](Self::advance)
/// is kept in request order; the cursor is done once a page reports
/// `done: true`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryCursor {
    pages: Vec<Value>,
    next_records_url: Option<String>,
    done: bool,
}

impl QueryCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the next page.
    ///
    /// # Errors
    ///
    /// [`dispatch::Error::UnexpectedShape`] when the page has no boolean
    /// `done`, or reports `done: false` without a `nextRecordsUrl`. The
    /// cursor is left unchanged in that case.
    pub fn advance(&mut self, page: Value) -> Result<(), dispatch::Error> {
        let done = page.get("done").and_then(Value::as_bool).ok_or_else(|| {
            dispatch::Error::UnexpectedShape("query page has no boolean `done`".to_string())
        })?;
        let next_records_url = if done {
            None
        } else {
            let url = page
                .get("nextRecordsUrl")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    dispatch::Error::UnexpectedShape(
                        "query page is not done but has no `nextRecordsUrl`".to_string(),
                    )
                })?;
            Some(url.to_string())
        };

        self.done = done;
        self.next_records_url = next_records_url;
        self.pages.push(page);
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Path of the next page, while the cursor is not done.
    pub fn next_records_url(&self) -> Option<&str> {
        self.next_records_url.as_deref()
    }

    pub fn pages(&self) -> &[Value] {
        &self.pages
    }

    pub fn into_pages(self) -> Vec<Value> {
        self.pages
    }
}

impl Client {
    /// Runs a SOQL query and returns its first page.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use salesforce_rest::client::Client;
    /// # async fn run(client: Client) -> Result<(), salesforce_rest::client::Error> {
    /// let response = client.query("SELECT Id, Name FROM Account LIMIT 10").await?;
    /// if let Some(page) = response.body {
    ///     println!("{} records", page["totalSize"]);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn query(&self, soql: &str) -> Result<Response<Value>, Error> {
        let path = with_query(&self.data_path("/query/")?, "q", soql);
        Ok(self.send(self.rest_request(Method::Get, path)?).await)
    }

    /// Runs a SOQL query and follows `nextRecordsUrl` until a page reports
    /// `done: true`.
    ///
    /// The body holds every page in request order. If any page fails, the
    /// body is absent and the failure is in `errors`; pages fetched before
    /// the failure are not returned.
    ///
    /// There is no page limit. A server that never reports `done: true`
    /// keeps this call running.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn query_more(&self, soql: &str) -> Result<Response<Vec<Value>>, Error> {
        let mut cursor = QueryCursor::new();
        let mut request = self.rest_request(
            Method::Get,
            with_query(&self.data_path("/query/")?, "q", soql),
        )?;

        loop {
            let response = self.send(request).await.and_then(|page| cursor.advance(page));
            if response.body.is_none() {
                return Ok(response.map(|()| Vec::new()));
            }

            let Some(next) = cursor.next_records_url() else {
                debug!(pages = cursor.pages().len(), "Query complete");
                return Ok(response.map(|()| cursor.into_pages()));
            };
            debug!(pages = cursor.pages().len(), next = %next, "Fetching next query page");
            request = self.rest_request(Method::Get, next)?;
        }
    }

    /// Runs a SOSL search.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn search(&self, sosl: &str) -> Result<Response<Value>, Error> {
        let path = with_query(&self.data_path("/search/")?, "q", sosl);
        Ok(self.send(self.rest_request(Method::Get, path)?).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{connected_client, ScriptedTransport};
    use serde_json::json;
    use std::sync::Arc;

    const NEXT_1: &str = "/services/data/v37.0/query/01gD0000002HU6KIAW-2000";
    const NEXT_2: &str = "/services/data/v37.0/query/01gD0000002HU6KIAW-4000";

    fn page(done: bool, next: Option<&str>, name: &str) -> String {
        let mut page = json!({
            "totalSize": 3,
            "done": done,
            "records": [{"attributes": {"type": "Account"}, "Name": name}],
        });
        if let Some(next) = next {
            page["nextRecordsUrl"] = json!(next);
        }
        page.to_string()
    }

    #[test]
    fn test_with_query_encodes_value() {
        assert_eq!(
            with_query("/services/data/v37.0/query/", "q", "SELECT Id FROM Lead WHERE Name = 'A&B'"),
            "/services/data/v37.0/query/?q=SELECT+Id+FROM+Lead+WHERE+Name+%3D+%27A%26B%27"
        );
    }

    #[test]
    fn test_cursor_advance() {
        let mut cursor = QueryCursor::new();
        assert!(!cursor.is_done());

        cursor
            .advance(json!({"done": false, "nextRecordsUrl": NEXT_1}))
            .unwrap();
        assert_eq!(cursor.next_records_url(), Some(NEXT_1));

        cursor.advance(json!({"done": true})).unwrap();
        assert!(cursor.is_done());
        assert_eq!(cursor.next_records_url(), None);
        assert_eq!(cursor.pages().len(), 2);
    }

    #[test]
    fn test_cursor_rejects_malformed_pages() {
        let mut cursor = QueryCursor::new();
        assert!(matches!(
            cursor.advance(json!({"records": []})),
            Err(dispatch::Error::UnexpectedShape(_))
        ));
        assert!(matches!(
            cursor.advance(json!({"done": false})),
            Err(dispatch::Error::UnexpectedShape(_))
        ));
        assert!(matches!(
            cursor.advance(json!([{"errorCode": "MALFORMED_QUERY"}])),
            Err(dispatch::Error::UnexpectedShape(_))
        ));
        assert!(cursor.pages().is_empty());
    }

    #[tokio::test]
    async fn test_query_request() {
        let transport = Arc::new(ScriptedTransport::new().respond(200, &page(true, None, "Acme")));
        let client = connected_client(transport.clone());

        let response = client.query("SELECT Name FROM Account").await.unwrap();
        assert_eq!(response.body.unwrap()["records"][0]["Name"], "Acme");

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, Method::Get);
        assert_eq!(
            sent.url(),
            "https://na1.salesforce.com/services/data/v37.0/query/?q=SELECT+Name+FROM+Account"
        );
        assert_eq!(sent.headers["Authorization"], "OAuth 00Dxx0000001gPL!token");
    }

    #[tokio::test]
    async fn test_search_request() {
        let transport = Arc::new(ScriptedTransport::new().respond(200, r#"{"searchRecords":[]}"#));
        let client = connected_client(transport.clone());

        client
            .search("FIND {sfdc_py} RETURNING Account(Id, Name)")
            .await
            .unwrap();
        assert_eq!(
            transport.requests()[0].path,
            "/services/data/v37.0/search/?q=FIND+%7Bsfdc_py%7D+RETURNING+Account%28Id%2C+Name%29"
        );
    }

    #[tokio::test]
    async fn test_query_more_single_page_makes_one_call() {
        let transport = Arc::new(ScriptedTransport::new().respond(200, &page(true, None, "A")));
        let client = connected_client(transport.clone());

        let response = client.query_more("SELECT Name FROM Account").await.unwrap();
        assert_eq!(response.body.unwrap().len(), 1);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_query_more_follows_next_records_url() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(200, &page(false, Some(NEXT_1), "A"))
                .respond(200, &page(false, Some(NEXT_2), "B"))
                .respond(200, &page(true, None, "C")),
        );
        let client = connected_client(transport.clone());

        let response = client.query_more("SELECT Name FROM Account").await.unwrap();
        let pages = response.body.unwrap();
        let names: Vec<&str> = pages
            .iter()
            .map(|page| page["records"][0]["Name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["A", "B", "C"]);
        assert!(response.errors.is_empty());

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].path, NEXT_1);
        assert_eq!(requests[2].path, NEXT_2);
        assert_eq!(requests[2].host, "na1.salesforce.com");
        assert!(requests[2].headers.contains_key("Authorization"));
    }

    #[tokio::test]
    async fn test_query_more_second_page_failure_is_absent() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(200, &page(false, Some(NEXT_1), "A"))
                .respond(200, "<html>maintenance</html>"),
        );
        let client = connected_client(transport.clone());

        let response = client.query_more("SELECT Name FROM Account").await.unwrap();
        assert!(response.body.is_none());
        assert!(matches!(response.errors[0], dispatch::Error::Parse { .. }));
        assert_eq!(response.request.path, NEXT_1);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_query_more_error_page_is_absent() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            400,
            r#"[{"message":"unexpected token","errorCode":"MALFORMED_QUERY"}]"#,
        ));
        let client = connected_client(transport);

        let response = client.query_more("SELEC").await.unwrap();
        assert!(response.body.is_none());
        assert_eq!(response.status, Some(400));
        assert!(matches!(response.errors[0], dispatch::Error::UnexpectedShape(_)));
    }
}
