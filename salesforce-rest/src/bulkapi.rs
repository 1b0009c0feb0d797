//! Salesforce Bulk API 2.0 ingest jobs.
//!
//! An ingest job loads, updates, upserts or deletes large numbers of records:
//!
//! 1. Create the job with [`IngestClient::create_job`]
//! 2. Upload CSV data with [`IngestClient::upload_data`]
//! 3. Close the job by setting [`JobState::UploadComplete`]
//! 4. Poll [`IngestClient::get_job`] until the job completes
//! 5. Fetch successful, failed and unprocessed records as CSV
//!
//! # Example
//!
//! ```no_run
//! use salesforce_rest::bulkapi::{CreateIngestJobRequest, IngestOperation, JobState};
//! # use salesforce_rest::client::Client;
//!
//! # async fn run(client: Client) -> Result<(), salesforce_rest::client::Error> {
//! let ingest = client.jobs().ingest();
//!
//! let job = ingest
//!     .create_job(&CreateIngestJobRequest::new("Account", IngestOperation::Insert))
//!     .await?;
//! let job_id = job.body.as_ref().and_then(|job| job["id"].as_str()).unwrap_or_default().to_string();
//!
//! ingest.upload_data(&job_id, "Name\nAcme\nGlobex\n").await?;
//! ingest.update_job(&job_id, JobState::UploadComplete).await?;
//! # Ok(())
//! # }
//! ```

pub mod ingest;

use crate::client::Client;
use serde::{Deserialize, Serialize};

pub use ingest::IngestClient;

/// Entry point for Bulk API 2.0 operations, obtained from [`Client::jobs`].
#[derive(Clone, Copy, Debug)]
pub struct Jobs<'a> {
    client: &'a Client,
}

impl Client {
    /// Bulk API 2.0 job operations.
    pub fn jobs(&self) -> Jobs<'_> {
        Jobs { client: self }
    }
}

impl<'a> Jobs<'a> {
    /// Ingest job operations.
    pub fn ingest(&self) -> IngestClient<'a> {
        IngestClient::new(self.client)
    }
}

/// Operation an ingest job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IngestOperation {
    Insert,
    Update,
    Upsert,
    Delete,
    HardDelete,
}

/// State of an ingest job. Only `UploadComplete` and `Aborted` can be set
/// by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Open,
    UploadComplete,
    InProgress,
    Aborted,
    JobComplete,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnDelimiter {
    Backquote,
    Caret,
    Comma,
    Pipe,
    Semicolon,
    Tab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineEnding {
    #[serde(rename = "LF")]
    Lf,
    #[serde(rename = "CRLF")]
    Crlf,
}

/// Body of a create job request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIngestJobRequest {
    /// sObject type, e.g. `Account`.
    pub object: String,
    pub operation: IngestOperation,
    /// Required for upserts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id_field_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_delimiter: Option<ColumnDelimiter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_ending: Option<LineEnding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_rule_id: Option<String>,
}

impl CreateIngestJobRequest {
    pub fn new(object: impl Into<String>, operation: IngestOperation) -> Self {
        Self {
            object: object.into(),
            operation,
            external_id_field_name: None,
            content_type: None,
            column_delimiter: None,
            line_ending: None,
            assignment_rule_id: None,
        }
    }

    pub fn external_id_field_name(mut self, field: impl Into<String>) -> Self {
        self.external_id_field_name = Some(field.into());
        self
    }

    pub fn column_delimiter(mut self, delimiter: ColumnDelimiter) -> Self {
        self.column_delimiter = Some(delimiter);
        self
    }

    pub fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = Some(line_ending);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_request_serializes_camel_case() {
        let request = CreateIngestJobRequest::new("Contact", IngestOperation::Upsert)
            .external_id_field_name("Ext_Id__c")
            .column_delimiter(ColumnDelimiter::Semicolon)
            .line_ending(LineEnding::Crlf);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "object": "Contact",
                "operation": "upsert",
                "externalIdFieldName": "Ext_Id__c",
                "columnDelimiter": "SEMICOLON",
                "lineEnding": "CRLF",
            })
        );
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_value(IngestOperation::HardDelete).unwrap(), "hardDelete");
        assert_eq!(serde_json::to_value(JobState::UploadComplete).unwrap(), "UploadComplete");
        let state: JobState = serde_json::from_value(json!("JobComplete")).unwrap();
        assert_eq!(state, JobState::JobComplete);
    }
}
