use crate::error::{ LoadTestError, Result };
use crate::pacer::Pacer;
use crate::stats::LoadStats;

use std::sync::Arc;
use chrono::Utc;
use isahc::{ AsyncReadResponseExt, HttpClient, Request };
use isahc::http::StatusCode;
use serde::{ Deserialize, Serialize };
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Body sent to the encryption endpoint
#[derive(Debug, Serialize)]
pub struct EncryptRequest<'a> {
    pub message: &'a str,
}

/// Body returned by the encryption endpoint on success
#[derive(Debug, Deserialize)]
pub struct EncryptResponse {
    pub encrypted: String,
}

/// Body returned by the encryption endpoint on failure
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Worker that fires one encryption request per pacer tick and records the
/// outcome into the shared [`LoadStats`].
#[derive(Debug, Clone)]
pub struct RequestDriver {
    id: usize,
    client: HttpClient,
    target_url: String,
    stats: Arc<LoadStats>,
}

impl RequestDriver {
    pub fn new(id: usize, client: HttpClient, target_url: String, stats: Arc<LoadStats>) -> Self {
        Self { id, client, target_url, stats }
    }

    /// Run until `cancel` fires.
    ///
    /// Cancellation only interrupts the wait for the next tick. A request that
    /// is already in flight runs to completion and its outcome is recorded
    /// before the loop exits, so joining the returned future guarantees no
    /// further writes to the stats.
    pub async fn run(self, pacer: Arc<Pacer>, cancel: CancellationToken) {
        let mut sequence: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = pacer.tick() => {}
            }

            sequence += 1;
            self.fire(sequence).await;
        }
        debug!(worker = self.id, sent = sequence, "request driver stopped");
    }

    /// Send one request and record its terminal outcome
    async fn fire(&self, sequence: u64) {
        let message = self.message(sequence);
        let start = Instant::now();

        match self.send_encrypt_request(&message).await {
            Ok(_) => self.stats.record_success(start.elapsed()),
            Err(err) => {
                debug!(worker = self.id, error = %err, "encrypt request failed");
                self.stats.record_failure();
            }
        }
    }

    // Unique per worker and per send so the target cannot serve cached results
    fn message(&self, sequence: u64) -> String {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        format!("Test message {}-{} {}", self.id, sequence, nanos)
    }

    /// POST `{"message": ..}` to the target and classify the response
    pub async fn send_encrypt_request(&self, message: &str) -> Result<EncryptResponse> {
        let body = serde_json::to_vec(&EncryptRequest { message })?;
        let request = Request::post(self.target_url.as_str())
            .header("content-type", "application/json")
            .body(body)?;

        let mut response = self.client.send_async(request).await?;
        let status = response.status();
        let text = response.text().await?;

        if status != StatusCode::OK {
            let message = match serde_json::from_str::<ErrorResponse>(&text) {
                Ok(err) => err.error,
                Err(_) => "failed to parse error response".to_string(),
            };
            return Err(LoadTestError::RequestApplication { status: status.as_u16(), message });
        }

        serde_json::from_str::<EncryptResponse>(&text).map_err(LoadTestError::ResponseParse)
    }
}
