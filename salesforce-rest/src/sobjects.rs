//! sObject records, blobs and describe calls.
//!
//! Obtain a handle with [`Client::sobjects`], narrow it to a record with
//! [`SObjects::id`] (and optionally [`SObjects::external_id`]), then call an
//! operation. Every operation sends `Sforce-Auto-Assign: FALSE` so assignment
//! rules are not triggered.

use crate::client::{Client, Error};
use crate::dispatch::Response;
use crate::request::{Method, RequestDescriptor};
use serde_json::Value;

/// Boundary separating the parts of a binary insert body.
pub const MULTIPART_BOUNDARY: &str = "boundary_string";

const AUTO_ASSIGN_HEADER: &str = "Sforce-Auto-Assign";
const OCTET_STREAM: &str = "application/octet-stream";

/// File content for a binary field such as `Document.Body` or
/// `ContentVersion.VersionData`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryFile {
    pub filename: String,
    pub content: Vec<u8>,
    /// MIME type of `content`, e.g. `application/pdf`.
    pub content_type: String,
}

impl BinaryFile {
    pub fn new(
        filename: impl Into<String>,
        content: impl Into<Vec<u8>>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
            content_type: content_type.into(),
        }
    }
}

/// Operations on one sObject type, or on one record of it.
#[derive(Debug, Clone)]
pub struct SObjects<'a> {
    client: &'a Client,
    object_type: String,
    id: Option<String>,
    external_id: Option<String>,
    binary_field: Option<String>,
}

impl Client {
    /// Handle for sObject operations on `object_type`, e.g. `"Account"`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use salesforce_rest::client::Client;
    /// use serde_json::json;
    ///
    /// # async fn run(client: Client) -> Result<(), salesforce_rest::client::Error> {
    /// let created = client
    ///     .sobjects("Lead")
    ///     .insert(json!({"LastName": "Smith", "Company": "Acme"}))
    ///     .await?;
    ///
    /// if let Some(id) = created.body.as_ref().and_then(|body| body["id"].as_str()) {
    ///     client
    ///         .sobjects("Lead")
    ///         .id(id)
    ///         .update(json!({"Company": "Acme Corp"}))
    ///         .await?;
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn sobjects(&self, object_type: impl Into<String>) -> SObjects<'_> {
        SObjects {
            client: self,
            object_type: object_type.into(),
            id: None,
            external_id: None,
            binary_field: None,
        }
    }

    /// Lists every sObject type available in the org.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn describe_global(&self) -> Result<Response<Value>, Error> {
        let request = sobject_request(self, Method::Get, "")?;
        Ok(self.send(request).await)
    }
}

fn sobject_request(client: &Client, method: Method, resource: &str) -> Result<RequestDescriptor, Error> {
    let path = client.data_path(&format!("/sobjects{resource}"))?;
    Ok(client
        .rest_request(method, path)?
        .header(AUTO_ASSIGN_HEADER, "FALSE"))
}

impl SObjects<'_> {
    /// Targets the record with this id, or with this external id value when
    /// [`external_id`](Self::external_id) is also set.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Addresses the record through an external id field instead of its
    /// Salesforce id.
    pub fn external_id(mut self, field: impl Into<String>) -> Self {
        self.external_id = Some(field.into());
        self
    }

    /// Names the field holding binary content, e.g. `"Body"`.
    pub fn binary_field(mut self, field: impl Into<String>) -> Self {
        self.binary_field = Some(field.into());
        self
    }

    /// Path below `/sobjects`.
    pub fn resource_path(&self) -> String {
        match (&self.id, &self.external_id) {
            (Some(id), Some(field)) => format!("/{}/{}/{}", self.object_type, field, id),
            (Some(id), None) => format!("/{}/{}", self.object_type, id),
            (None, _) => format!("/{}", self.object_type),
        }
    }

    fn request(&self, method: Method, suffix: &str) -> Result<RequestDescriptor, Error> {
        sobject_request(
            self.client,
            method,
            &format!("{}{}", self.resource_path(), suffix),
        )
    }

    /// Creates a record.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn insert(&self, body: Value) -> Result<Response<Value>, Error> {
        let request = self.request(Method::Post, "")?.json(body);
        Ok(self.client.send(request).await)
    }

    /// Creates a record together with the content of its binary field as a
    /// `multipart/form-data` request.
    ///
    /// # Errors
    ///
    /// [`Error::MissingRequiredAttribute`] when no
    /// [`binary_field`](Self::binary_field) was set.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn insert_binary(&self, body: Value, file: BinaryFile) -> Result<Response<Value>, Error> {
        let field = self
            .binary_field
            .as_deref()
            .ok_or_else(|| Error::MissingRequiredAttribute("binary_field".to_string()))?;

        let content_type = format!("multipart/form-data;boundary=\"{MULTIPART_BOUNDARY}\"");
        let request = self
            .request(Method::Post, "")?
            .raw(multipart_body(&self.object_type, &body, field, &file), content_type);
        Ok(self.client.send(request).await)
    }

    /// Updates the record. Salesforce answers 204 with no body on success.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn update(&self, body: Value) -> Result<Response<Value>, Error> {
        let request = self.request(Method::Patch, "")?.json(body);
        Ok(self.client.send(request).await)
    }

    /// Inserts or updates the record addressed by an external id.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn upsert(&self, body: Value) -> Result<Response<Value>, Error> {
        let request = self.request(Method::Patch, "")?.json(body);
        Ok(self.client.send(request).await)
    }

    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn delete(&self) -> Result<Response<Value>, Error> {
        let request = self.request(Method::Delete, "")?;
        Ok(self.client.send(request).await)
    }

    /// Fetches the record, or basic information on the type when no id is set.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn query(&self) -> Result<Response<Value>, Error> {
        let request = self.request(Method::Get, "")?;
        Ok(self.client.send(request).await)
    }

    /// Fetches the record and then the content of its binary field.
    ///
    /// The second response is present only when a
    /// [`binary_field`](Self::binary_field) is set and the record holds a
    /// URL for it.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn query_with_blob(
        &self,
    ) -> Result<(Response<Value>, Option<Response<Vec<u8>>>), Error> {
        let record = self.query().await?;
        let blob_url = self
            .binary_field
            .as_deref()
            .and_then(|field| record.body.as_ref()?.get(field)?.as_str())
            .map(str::to_string);

        let blob = match blob_url {
            Some(url) => {
                let request = self
                    .client
                    .rest_request(Method::Get, url)?
                    .header("Content-Type", OCTET_STREAM);
                Some(self.client.send_bytes(request).await)
            }
            None => None,
        };
        Ok((record, blob))
    }

    /// Field metadata of the type.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn describe(&self) -> Result<Response<Value>, Error> {
        let request = self.request(Method::Get, "/describe")?;
        Ok(self.client.send(request).await)
    }
}

/// Two-part body: the record as JSON named `entity_{type}`, then the file
/// named after the binary field.
fn multipart_body(object_type: &str, body: &Value, field: &str, file: &BinaryFile) -> Vec<u8> {
    let mut out = Vec::with_capacity(file.content.len() + 512);
    out.extend_from_slice(
        format!(
            "--{MULTIPART_BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"entity_{}\";\r\n\
             Content-Type: application/json\r\n\r\n\
             {body}\r\n\r\n\
             --{MULTIPART_BOUNDARY}\r\n\
             Content-Type: {}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{}\"\r\n\r\n",
            object_type.to_lowercase(),
            file.content_type,
            file.filename,
        )
        .as_bytes(),
    );
    out.extend_from_slice(&file.content);
    out.extend_from_slice(format!("\r\n\r\n--{MULTIPART_BOUNDARY}--").as_bytes());
    out
}
