//! Bulk API 2.0 ingest operations for loading, updating, or deleting large data sets.

use super::{CreateIngestJobRequest, JobState};
use crate::client::{Client, Error};
use crate::dispatch::Response;
use crate::request::{Method, RequestDescriptor};
use serde_json::{json, Value};

const CSV_CONTENT_TYPE: &str = "text/csv";

/// Client for Bulk API 2.0 ingest operations.
///
/// Results of a processed job are CSV and come back as raw bytes.
#[derive(Clone, Copy, Debug)]
pub struct IngestClient<'a> {
    client: &'a Client,
}

impl<'a> IngestClient<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    fn request(&self, method: Method, suffix: &str) -> Result<RequestDescriptor, Error> {
        let path = self.client.data_path(&format!("/jobs/ingest{suffix}"))?;
        self.client.rest_request(method, path)
    }

    /// Creates a new ingest job.
    ///
    /// The response carries the job id and the `contentUrl` for the upload.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn create_job(&self, request: &CreateIngestJobRequest) -> Result<Response<Value>, Error> {
        let body = json!(request);
        let request = self.request(Method::Post, "")?.json(body);
        Ok(self.client.send(request).await)
    }

    /// Uploads CSV data to an open job.
    ///
    /// Salesforce answers 201 with an empty body, so a successful upload has
    /// no body and no errors.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn upload_data(&self, job_id: &str, csv: impl Into<Vec<u8>>) -> Result<Response<Value>, Error> {
        let request = self
            .request(Method::Put, &format!("/{job_id}/batches"))?
            .raw(csv, CSV_CONTENT_TYPE);
        Ok(self.client.send(request).await)
    }

    /// Retrieves information about an ingest job.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn get_job(&self, job_id: &str) -> Result<Response<Value>, Error> {
        let request = self.request(Method::Get, &format!("/{job_id}"))?;
        Ok(self.client.send(request).await)
    }

    /// Lists all ingest jobs.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn get_all_jobs(&self) -> Result<Response<Value>, Error> {
        let request = self.request(Method::Get, "")?;
        Ok(self.client.send(request).await)
    }

    /// Changes the job state, typically to [`JobState::UploadComplete`] to
    /// start processing or [`JobState::Aborted`] to cancel.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn update_job(&self, job_id: &str, state: JobState) -> Result<Response<Value>, Error> {
        let request = self
            .request(Method::Patch, &format!("/{job_id}"))?
            .json(json!({ "state": state }));
        Ok(self.client.send(request).await)
    }

    /// Deletes a job. Only closed jobs can be deleted.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn delete_job(&self, job_id: &str) -> Result<Response<Value>, Error> {
        let request = self.request(Method::Delete, &format!("/{job_id}"))?;
        Ok(self.client.send(request).await)
    }

    /// Records processed successfully, as CSV.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn get_successful_results(&self, job_id: &str) -> Result<Response<Vec<u8>>, Error> {
        self.results(job_id, "successfulResults").await
    }

    /// Records that failed, as CSV with `sf__Id` and `sf__Error` columns.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn get_failed_results(&self, job_id: &str) -> Result<Response<Vec<u8>>, Error> {
        self.results(job_id, "failedResults").await
    }

    /// Records not processed before the job finished or was aborted, as CSV.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn get_unprocessed_results(&self, job_id: &str) -> Result<Response<Vec<u8>>, Error> {
        self.results(job_id, "unprocessedrecords").await
    }

    async fn results(&self, job_id: &str, resource: &str) -> Result<Response<Vec<u8>>, Error> {
        let request = self
            .request(Method::Get, &format!("/{job_id}/{resource}"))?
            .header("Accept", CSV_CONTENT_TYPE);
        Ok(self.client.send_bytes(request).await)
    }
}
