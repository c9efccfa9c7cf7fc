use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{Comparison, IdentityVerifier, ImageRole, VerifierError};

/// What the stub should answer with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StubResponse {
    Distance(f64),
    NoFace(ImageRole),
    Fail,
    /// Never answer within any reasonable timeout.
    Hang,
}

/// A scripted verifier for tests. Clones share the same script and call count.
#[derive(Clone)]
pub struct StubVerifier {
    response: Arc<Mutex<StubResponse>>,
    calls: Arc<AtomicUsize>,
}

impl Default for StubVerifier {
    fn default() -> Self {
        Self {
            response: Arc::new(Mutex::new(StubResponse::Distance(0.1))),
            calls: Default::default(),
        }
    }
}

impl StubVerifier {
    pub fn respond_with(&self, response: StubResponse) {
        *self.response.lock().unwrap() = response;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[rocket::async_trait]
impl IdentityVerifier for StubVerifier {
    async fn compare(&self, _reference: &[u8], _probe: &[u8]) -> Result<Comparison, VerifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = *self.response.lock().unwrap();
        match response {
            StubResponse::Distance(distance) => Ok(Comparison {
                matched: distance < 0.6,
                distance,
            }),
            StubResponse::NoFace(role) => Err(VerifierError::NoFace(role)),
            StubResponse::Fail => Err(VerifierError::Service("stub failure".to_string())),
            StubResponse::Hang => {
                rocket::tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(VerifierError::Service("stub hung up".to_string()))
            }
        }
    }
}
