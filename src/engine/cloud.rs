//! HTTP client for cloud recognition services.
//!
//! Speaks a generic asynchronous job protocol: POST the audio reference and
//! boost vocabulary to create a job, then poll the job resource until it
//! reports completed or failed.

use super::{JobStatus, SpeechEngine};
use crate::error::{Result, TolkError};
use crate::transcript::Utterance;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default timeout for recognition service requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Cloud speech-to-text engine client.
#[derive(Debug)]
pub struct CloudEngine {
    engine_id: String,
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    audio_url: &'a str,
    boost_phrases: &'a [String],
}

#[derive(Deserialize)]
struct SubmitResponse {
    job_id: String,
}

#[derive(Deserialize)]
struct JobResponse {
    status: String,
    #[serde(default)]
    utterances: Option<Vec<Utterance>>,
    #[serde(default)]
    duration_seconds: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

impl CloudEngine {
    /// Build a client from an engine descriptor's config map.
    ///
    /// Requires `base_url`; `api_key` is optional.
    pub fn from_config(engine_id: &str, config: &HashMap<String, String>) -> Result<Self> {
        let base_url = config
            .get("base_url")
            .ok_or_else(|| {
                TolkError::Config(format!("Engine {} is missing base_url", engine_id))
            })?
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            engine_id: engine_id.to_string(),
            client,
            base_url,
            api_key: config.get("api_key").cloned(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl SpeechEngine for CloudEngine {
    #[instrument(skip(self, boost_terms), fields(engine = %self.engine_id))]
    async fn submit(&self, audio_reference: &str, boost_terms: &[String]) -> Result<String> {
        let url = format!("{}/v1/jobs", self.base_url);
        let body = SubmitRequest {
            audio_url: audio_reference,
            boost_phrases: boost_terms,
        };

        let response = self
            .authorize(self.client.post(&url).json(&body))
            .send()
            .await
            .map_err(|e| TolkError::Submission(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TolkError::Submission(format!(
                "Recognition service returned {}",
                response.status()
            )));
        }

        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| TolkError::Submission(format!("Malformed submit response: {}", e)))?;

        debug!("Submitted recognition job {}", parsed.job_id);
        Ok(parsed.job_id)
    }

    #[instrument(skip(self), fields(engine = %self.engine_id))]
    async fn job_status(&self, external_job_id: &str) -> Result<JobStatus> {
        let url = format!("{}/v1/jobs/{}", self.base_url, external_job_id);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| TolkError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TolkError::Fetch(format!(
                "Recognition service returned {}",
                response.status()
            )));
        }

        let job: JobResponse = response
            .json()
            .await
            .map_err(|e| TolkError::Fetch(format!("Malformed job response: {}", e)))?;

        match job.status.as_str() {
            "queued" | "running" | "processing" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed {
                utterances: job.utterances.unwrap_or_default(),
                duration_seconds: job.duration_seconds.unwrap_or(0.0),
            }),
            "failed" | "error" => Ok(JobStatus::Failed {
                message: job.error.unwrap_or_else(|| "Unknown engine error".to_string()),
            }),
            other => Err(TolkError::Recognition(format!(
                "Unknown job status from engine: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_base_url() {
        let err = CloudEngine::from_config("e1", &HashMap::new()).unwrap_err();
        assert!(matches!(err, TolkError::Config(_)));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let mut config = HashMap::new();
        config.insert("base_url".to_string(), "https://stt.example.com/".to_string());

        let engine = CloudEngine::from_config("e1", &config).unwrap();
        assert_eq!(engine.base_url, "https://stt.example.com");
    }
}
