//! HTTP client for the fallback face-comparison service.
//!
//! Speaks the Face++-shaped `/compare` API: both images in one
//! multipart request, a 0–100 `confidence` back. Runs on the engine thread,
//! so the blocking reqwest client is safe here.

use crate::config::FallbackConfig;
use facegate_core::{CompareError, CompareService};

pub struct FaceCompareClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl FaceCompareClient {
    pub fn new(cfg: FallbackConfig) -> Result<Self, CompareError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| CompareError::Unavailable(e.to_string()))?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key,
            api_secret: cfg.api_secret,
        })
    }
}

impl CompareService for FaceCompareClient {
    fn compare(&self, probe: &[u8], reference: &[u8]) -> Result<f32, CompareError> {
        let form = reqwest::blocking::multipart::Form::new()
            .text("api_key", self.api_key.clone())
            .text("api_secret", self.api_secret.clone())
            .part(
                "image_file1",
                reqwest::blocking::multipart::Part::bytes(probe.to_vec()).file_name("probe.jpg"),
            )
            .part(
                "image_file2",
                reqwest::blocking::multipart::Part::bytes(reference.to_vec())
                    .file_name("reference.jpg"),
            );

        let response = self
            .http
            .post(format!("{}/compare", self.base_url))
            .multipart(form)
            .send()
            .map_err(|e| CompareError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .map_err(|e| CompareError::Protocol(format!("non-JSON response: {e}")))?;

        if !status.is_success() {
            return Err(CompareError::Protocol(format!(
                "status {status}: {}",
                body.get("error_message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown error")
            )));
        }
        parse_confidence(&body)
    }
}

/// A successful response without a `confidence` field means the service
/// found no comparable face pair; that is a zero-similarity signal, not a
/// protocol error.
fn parse_confidence(body: &serde_json::Value) -> Result<f32, CompareError> {
    match body.get("confidence") {
        Some(value) => value
            .as_f64()
            .map(|c| c as f32)
            .ok_or_else(|| CompareError::Protocol(format!("malformed confidence: {value}"))),
        None => Ok(0.0),
    }
}
