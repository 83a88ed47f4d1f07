use std::time::Duration;

use async_trait::async_trait;
use promptsmith_core_types::{PipelineError, Task};
use promptsmith_scheduler::ResultSink;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use super::{HistoryError, HistoryRecord, NewHistoryRecord};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

/// Talks to a history service over HTTP.
#[derive(Clone)]
pub struct HistoryClient {
    http: Client,
    base_url: String,
}

impl HistoryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, HistoryError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn tasks_url(&self) -> String {
        format!("{}/tasks", self.base_url)
    }

    pub async fn create(&self, request: &NewHistoryRecord) -> Result<HistoryRecord, HistoryError> {
        let response = self.http.post(self.tasks_url()).json(request).send().await?;
        let record: HistoryRecord = unwrap_envelope(response).await?;
        debug!(id = %record.id, "history record created");
        Ok(record)
    }

    pub async fn latest(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        let response = self.http.get(self.tasks_url()).send().await?;
        unwrap_envelope(response).await
    }
}

async fn unwrap_envelope<T>(response: reqwest::Response) -> Result<T, HistoryError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    let body = response.text().await?;
    let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|err| {
        HistoryError::Rejected {
            status: status.as_u16(),
            message: format!("unexpected response body: {err}"),
        }
    })?;
    match envelope {
        Envelope {
            success: true,
            data: Some(data),
            ..
        } => Ok(data),
        Envelope { error, .. } => Err(HistoryError::Rejected {
            status: status.as_u16(),
            message: error.unwrap_or_else(|| "request failed".to_string()),
        }),
    }
}

#[async_trait]
impl ResultSink for HistoryClient {
    async fn record(&self, task: &Task) -> Result<(), PipelineError> {
        let record = self.create(&NewHistoryRecord::from_task(task)).await?;
        info!(task = %task.id, history = %record.id, "result saved to history");
        Ok(())
    }
}
