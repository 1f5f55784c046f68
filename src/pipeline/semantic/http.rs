use serde::Serialize;
use std::time::Duration;

use crate::models::SourceField;

use super::client::{validate_findings, RawFinding, SemanticExtractor, SemanticFinding};
use super::SemanticError;

/// HTTP client for the external extraction service.
///
/// One POST per (facility, field) with a hard per-call timeout so a slow
/// call abandons that facility's augmentation without blocking siblings.
pub struct HttpSemanticClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_ms: u64,
}

impl HttpSemanticClient {
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self, SemanticError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| SemanticError::InvalidResponse(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_ms,
        })
    }
}

/// Request body for the extraction endpoint.
#[derive(Serialize)]
struct ExtractRequest<'a> {
    facility_id: &'a str,
    field_name: &'a str,
    raw_text: &'a str,
}

impl SemanticExtractor for HttpSemanticClient {
    fn extract(
        &self,
        facility_id: &str,
        field: SourceField,
        text: &str,
    ) -> Result<Vec<SemanticFinding>, SemanticError> {
        let url = format!("{}/extract", self.base_url);
        let body = ExtractRequest {
            facility_id,
            field_name: field.as_str(),
            raw_text: text,
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                SemanticError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                SemanticError::Timeout(self.timeout_ms)
            } else {
                SemanticError::InvalidResponse(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SemanticError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw: Vec<RawFinding> = response
            .json()
            .map_err(|e| SemanticError::InvalidResponse(e.to_string()))?;

        Ok(validate_findings(raw))
    }
}
