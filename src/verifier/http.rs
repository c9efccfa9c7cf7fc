use std::time::Duration;

use reqwest::{
    multipart::{Form, Part},
    Client, StatusCode,
};
use serde::Deserialize;

use super::{Comparison, IdentityVerifier, ImageRole, VerifierError};

/// Client for a face verification service speaking the `/verify` multipart protocol.
///
/// The service answers `200 {"match": bool, "distance": number}` on success,
/// and `400 {"error": "..."}` when it cannot find a face in one of the images.
pub struct HttpVerifier {
    client: Client,
    endpoint: String,
}

impl HttpVerifier {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = format!("{}/verify", base_url.trim_end_matches('/'));
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn image_part(bytes: &[u8], file_name: &'static str) -> Result<Part, VerifierError> {
        Part::bytes(bytes.to_vec())
            .file_name(file_name)
            .mime_str("image/jpeg")
            .map_err(|e| VerifierError::Service(e.to_string()))
    }
}

/// Error body returned by the service.
#[derive(Deserialize)]
struct ServiceError {
    error: String,
}

/// Work out which image a "no face" message refers to.
fn classify_rejection(message: &str) -> VerifierError {
    let message_lower = message.to_ascii_lowercase();
    if message_lower.contains("no face") {
        if message_lower.contains("stored") || message_lower.contains("profile") {
            return VerifierError::NoFace(ImageRole::Reference);
        }
        if message_lower.contains("captured") {
            return VerifierError::NoFace(ImageRole::Captured);
        }
    }
    VerifierError::Service(format!("request rejected: {message}"))
}

#[rocket::async_trait]
impl IdentityVerifier for HttpVerifier {
    async fn compare(&self, reference: &[u8], probe: &[u8]) -> Result<Comparison, VerifierError> {
        let form = Form::new()
            .part("storedImage", Self::image_part(reference, "stored.jpg")?)
            .part("capturedImage", Self::image_part(probe, "captured.jpg")?);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| VerifierError::Service(e.to_string()))?;

        match response.status() {
            StatusCode::OK => response
                .json::<Comparison>()
                .await
                .map_err(|e| VerifierError::Service(format!("malformed response: {e}"))),
            StatusCode::BAD_REQUEST => {
                let body = response
                    .json::<ServiceError>()
                    .await
                    .map_err(|e| VerifierError::Service(format!("malformed response: {e}")))?;
                Err(classify_rejection(&body.error))
            }
            status => Err(VerifierError::Service(format!("service returned {status}"))),
        }
    }
}
