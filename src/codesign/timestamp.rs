// src/codesign/timestamp.rs

//! Timestamp authority client
//!
//! Uploads an armored signature to the co-signing service and returns the
//! response body untouched. The body is the signature token stored in the
//! package; nothing here parses or validates it.
//!
//! Submission is attempted exactly once. Whether to retry a signing
//! ceremony is the caller's call.

use crate::error::{Error, Result};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use tracing::info;

/// Default co-signing service
pub const DEFAULT_TIMESTAMP_URL: &str = "http://timestamp.synology.com/timestamp.php";

/// Multipart field carrying the signature
const UPLOAD_FIELD: &str = "file";

/// HTTP client for one timestamp endpoint
pub struct TimestampClient {
    client: Client,
    endpoint: String,
}

impl TimestampClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = url::Url::parse(endpoint)
            .map_err(|e| Error::ConfigError(format!("Invalid timestamp URL {endpoint}: {e}")))?;

        let client = Client::builder()
            .build()
            .map_err(|e| Error::SignatureRetrieval(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Submit `signature` and return the token bytes
    pub fn submit(&self, signature: &[u8], file_name: &str) -> Result<Vec<u8>> {
        info!("SYNO: Submit signature to {}", self.endpoint);

        let part = Part::bytes(signature.to_vec()).file_name(file_name.to_string());
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .map_err(|e| Error::SignatureRetrieval(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::SignatureRetrieval(format!(
                "HTTP {} from {}",
                status, self.endpoint
            )));
        }

        let token = response
            .bytes()
            .map_err(|e| Error::SignatureRetrieval(format!("Failed to read response: {e}")))?;
        if token.is_empty() {
            return Err(Error::SignatureRetrieval(format!(
                "Empty response from {}",
                self.endpoint
            )));
        }

        Ok(token.to_vec())
    }
}
