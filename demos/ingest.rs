//! Example of using Bulk API 2.0 ingest operations.
//!
//! This example demonstrates:
//! - Creating an ingest job
//! - Uploading CSV data
//! - Marking upload as complete
//! - Monitoring job progress
//! - Retrieving successful, failed, and unprocessed results
//! - Deleting the job

use salesforce_rest::bulkapi::{CreateIngestJobRequest, IngestOperation, JobState};
use salesforce_rest::client::{self, Credentials};
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let client = client::Builder::new()
        .credentials(Credentials::new(
            std::env::var("SALESFORCE_CLIENT_ID")?,
            std::env::var("SALESFORCE_CLIENT_SECRET")?,
            std::env::var("SALESFORCE_USERNAME")?,
            std::env::var("SALESFORCE_PASSWORD")?,
        ))
        .build()?
        .connect()
        .await?;
    let ingest = client.jobs().ingest();

    info!("Creating an ingest job");
    let job = ingest
        .create_job(&CreateIngestJobRequest::new("Account", IngestOperation::Insert))
        .await?
        .into_result()?;
    let job_id = job["id"].as_str().unwrap_or_default().to_string();
    info!("Created ingest job: {job_id}");

    let csv_data = "Name,Industry\nAcme Corp,Technology\nGlobex,Manufacturing\n";
    let upload = ingest.upload_data(&job_id, csv_data).await?;
    if !upload.is_success() {
        error!("Upload failed with status {:?}", upload.status);
        return Ok(());
    }

    info!("Marking upload as complete");
    ingest.update_job(&job_id, JobState::UploadComplete).await?;

    info!("Waiting for job to complete");
    loop {
        let status = ingest.get_job(&job_id).await?.into_result()?;
        let state: Option<JobState> = serde_json::from_value(status["state"].clone()).ok();
        info!("Current state: {state:?}");

        match state {
            Some(JobState::JobComplete) => break,
            Some(JobState::Failed) | Some(JobState::Aborted) => {
                error!("Job did not complete: {}", status["errorMessage"]);
                return Ok(());
            }
            _ => tokio::time::sleep(Duration::from_secs(2)).await,
        }
    }

    for (label, response) in [
        ("successful", ingest.get_successful_results(&job_id).await?),
        ("failed", ingest.get_failed_results(&job_id).await?),
        ("unprocessed", ingest.get_unprocessed_results(&job_id).await?),
    ] {
        let csv = String::from_utf8_lossy(response.body.as_deref().unwrap_or_default()).to_string();
        info!("{label} results:\n{csv}");
    }

    ingest.delete_job(&job_id).await?;
    info!("Deleted ingest job: {job_id}");

    client.logout().await?;
    Ok(())
}
