//! HTTP client for the analysis service.

use async_trait::async_trait;
use serde_json::Value;

use crate::analysis::{AnalysisService, AnalysisSubmission, ChatReply, ChatRequest, ServiceError};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::models::StatusReport;
use crate::utils::HttpClient;

/// Analysis service reached over HTTP
///
/// - `POST <base>/analyze` with the submission payload, answering `{ "jobId": ... }`
/// - `GET <base>/status/<jobId>`, answering `{ status, progress?, result?, error? }`
/// - `POST <base>/chat_rag` with `{ uid?, message, context_ids }`, answering `{ answer, sources }`
#[derive(Debug, Clone)]
pub struct HttpAnalysisService {
    client: HttpClient,
    base_url: String,
}

impl HttpAnalysisService {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config.timeout())?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn check(response: reqwest::Response) -> std::result::Result<reqwest::Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ServiceError::Rejected {
            status: status.as_u16(),
            body: body.chars().take(500).collect(),
        })
    }
}

fn unreachable(e: reqwest::Error) -> ServiceError {
    ServiceError::Unreachable(e.to_string())
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn submit(&self, submission: &AnalysisSubmission) -> std::result::Result<String, ServiceError> {
        let url = format!("{}/analyze", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&submission.to_payload())
            .send()
            .await
            .map_err(unreachable)?;

        let body: Value = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;

        body.get("jobId")
            .or_else(|| body.get("job_id"))
            .and_then(|id| match id {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| ServiceError::Malformed("response has no jobId".to_string()))
    }

    async fn status(&self, job_id: &str) -> std::result::Result<StatusReport, ServiceError> {
        let url = format!("{}/status/{}", self.base_url, urlencoding::encode(job_id));
        let response = self.client.get(&url).send().await.map_err(unreachable)?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))
    }

    async fn chat(&self, request: &ChatRequest) -> std::result::Result<ChatReply, ServiceError> {
        let url = format!("{}/chat_rag", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request.to_payload())
            .send()
            .await
            .map_err(unreachable)?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))
    }
}
