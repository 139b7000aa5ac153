use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use crate::core::config::Settings;

#[derive(Debug, Error)]
pub(crate) enum ExtractionError {
    #[error("document is empty")]
    EmptyDocument,
    #[error("document contains no extractable text")]
    NoText,
    #[error("text extraction is not configured")]
    NotConfigured,
    #[error("extraction request failed: {0}")]
    Request(String),
    #[error("extraction job {request_id} failed: {message}")]
    JobFailed { request_id: String, message: String },
    #[error("extraction job {request_id} did not finish after {attempts} polls")]
    TimedOut { request_id: String, attempts: u32 },
}

/// PDF to text conversion.
#[async_trait]
pub(crate) trait TextExtractor: Send + Sync {
    async fn extract_text(&self, document: &[u8]) -> Result<String, ExtractionError>;
}

#[derive(Debug, Clone)]
struct JobRef {
    request_id: String,
    check_url: String,
}

/// Datalab-style marker API: upload the document, then poll until the
/// markdown rendition is ready.
#[derive(Debug, Clone)]
pub(crate) struct MarkerTextExtractor {
    client: Client,
    api_key: String,
    base_url: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl MarkerTextExtractor {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let extraction = settings.extraction();
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(20))
            .timeout(Duration::from_secs(extraction.timeout_seconds))
            .build()
            .context("Failed to build extraction HTTP client")?;

        Ok(Self {
            client,
            api_key: extraction.api_key.clone(),
            base_url: extraction.base_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_secs(extraction.poll_interval_seconds),
            max_poll_attempts: extraction.max_poll_attempts,
        })
    }

    async fn submit(&self, document: &[u8]) -> Result<JobRef, ExtractionError> {
        let part = Part::bytes(document.to_vec())
            .file_name("submission.pdf")
            .mime_str("application/pdf")
            .map_err(|err| ExtractionError::Request(err.to_string()))?;
        let form = Form::new().part("file", part).text("output_format", "markdown");

        let response = self
            .client
            .post(format!("{}/marker", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|err| ExtractionError::Request(err.to_string()))?;

        let status = response.status();
        let payload = read_json(response).await?;
        if !status.is_success() || reports_failure(&payload) {
            return Err(ExtractionError::Request(format!(
                "submit rejected (status {status}): {}",
                error_message(&payload)
            )));
        }

        job_ref(&self.base_url, &payload).ok_or_else(|| {
            ExtractionError::Request("submit response missing request reference".to_string())
        })
    }

    async fn poll(&self, job: &JobRef) -> Result<String, ExtractionError> {
        for attempt in 1..=self.max_poll_attempts {
            let response = self
                .client
                .get(&job.check_url)
                .header("X-Api-Key", &self.api_key)
                .send()
                .await
                .map_err(|err| ExtractionError::Request(err.to_string()))?;

            let status = response.status();
            let payload = read_json(response).await?;
            if !status.is_success() {
                return Err(ExtractionError::Request(format!(
                    "poll failed (status {status}): {}",
                    error_message(&payload)
                )));
            }

            match job_status(&payload).as_str() {
                "complete" | "completed" => return markdown_text(&payload),
                "failed" | "error" => {
                    return Err(ExtractionError::JobFailed {
                        request_id: job.request_id.clone(),
                        message: error_message(&payload),
                    });
                }
                _ if reports_failure(&payload) => {
                    return Err(ExtractionError::JobFailed {
                        request_id: job.request_id.clone(),
                        message: error_message(&payload),
                    });
                }
                _ => {}
            }

            tracing::debug!(request_id = %job.request_id, attempt, "Extraction still running");
            if attempt < self.max_poll_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        Err(ExtractionError::TimedOut {
            request_id: job.request_id.clone(),
            attempts: self.max_poll_attempts,
        })
    }
}

#[async_trait]
impl TextExtractor for MarkerTextExtractor {
    async fn extract_text(&self, document: &[u8]) -> Result<String, ExtractionError> {
        if document.is_empty() {
            return Err(ExtractionError::EmptyDocument);
        }
        if self.api_key.is_empty() {
            return Err(ExtractionError::NotConfigured);
        }

        let job = self.submit(document).await?;
        tracing::info!(request_id = %job.request_id, bytes = document.len(), "Submitted document for extraction");
        let text = self.poll(&job).await?;
        metrics::counter!("text_extractions_total").increment(1);
        Ok(text)
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, ExtractionError> {
    let raw = response.text().await.map_err(|err| ExtractionError::Request(err.to_string()))?;
    serde_json::from_str(&raw).map_err(|err| {
        ExtractionError::Request(format!(
            "non-JSON body: {err}: {}",
            raw.chars().take(200).collect::<String>()
        ))
    })
}

fn reports_failure(payload: &Value) -> bool {
    payload.get("success").and_then(Value::as_bool) == Some(false)
}

fn job_status(payload: &Value) -> String {
    payload
        .get("status")
        .and_then(Value::as_str)
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "unknown".to_string())
}

fn job_ref(base_url: &str, payload: &Value) -> Option<JobRef> {
    let check_url = payload.get("request_check_url").and_then(Value::as_str).and_then(|raw| {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Some(raw.to_string());
        }
        reqwest::Url::parse(&format!("{base_url}/"))
            .ok()
            .and_then(|base| base.join(raw).ok())
            .map(|url| url.to_string())
    });

    let request_id = payload
        .get("request_id")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .or_else(|| {
            check_url
                .as_deref()
                .and_then(|url| url.trim_end_matches('/').rsplit('/').next())
                .map(ToString::to_string)
        })?;

    let check_url = check_url.unwrap_or_else(|| format!("{base_url}/marker/{request_id}"));
    Some(JobRef { request_id, check_url })
}

fn markdown_text(payload: &Value) -> Result<String, ExtractionError> {
    let container = payload.get("result").unwrap_or(payload);
    let text = container
        .get("markdown")
        .or_else(|| payload.get("markdown"))
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ExtractionError::NoText);
    }
    Ok(text.to_string())
}

fn error_message(payload: &Value) -> String {
    if let Some(detail) = payload.get("detail") {
        if let Some(text) = detail.as_str() {
            return text.to_string();
        }
        if let Some(items) = detail.as_array() {
            let joined = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; ");
            if !joined.is_empty() {
                return joined;
            }
        }
    }

    payload
        .get("error")
        .or_else(|| payload.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("unknown_error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn job_ref_resolves_relative_check_url() {
        let job = job_ref(
            "https://extract.example/api/v1",
            &json!({"request_check_url": "marker/abc123"}),
        )
        .expect("job reference");

        assert_eq!(job.request_id, "abc123");
        assert_eq!(job.check_url, "https://extract.example/api/v1/marker/abc123");
    }

    #[test]
    fn job_ref_falls_back_to_request_id() {
        let job = job_ref("https://extract.example/api/v1", &json!({"request_id": "r-1"}))
            .expect("job reference");
        assert_eq!(job.check_url, "https://extract.example/api/v1/marker/r-1");
        assert!(job_ref("https://extract.example", &json!({})).is_none());
    }

    #[test]
    fn blank_markdown_means_no_text() {
        assert!(matches!(
            markdown_text(&json!({"status": "complete", "markdown": "  \n"})),
            Err(ExtractionError::NoText)
        ));
        assert_eq!(
            markdown_text(&json!({"result": {"markdown": "# Answer\nText"}})).expect("text"),
            "# Answer\nText"
        );
    }

    #[test]
    fn error_message_joins_validation_details() {
        let payload = json!({"detail": [{"msg": "file too large"}, {"msg": "bad type"}]});
        assert_eq!(error_message(&payload), "file too large; bad type");
        assert_eq!(error_message(&json!({"error": "quota"})), "quota");
    }
}
