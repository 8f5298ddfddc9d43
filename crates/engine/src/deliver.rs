use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use relay_core::UsageRecord;

/// Fixed batch size per request.
pub const BATCH_SIZE: usize = 200;
/// Wall-clock budget for one delivery pass, measured from scheduler entry.
pub const SEND_BUDGET: Duration = Duration::from_secs(10);
/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum DeliverError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server rejected batch: status {status}")]
    Rejected { status: u16 },
}

/// Seam between the scheduler and the wire. The engine is single-threaded,
/// so one submission is in flight at a time.
pub trait Transport {
    fn submit(&self, records: &[UsageRecord]) -> Result<(), DeliverError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest<'a> {
    username: &'a str,
    usage: &'a [UsageRecord],
}

/// Blocking HTTP transport posting to `{serverUrl}/api/usage/submit`.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    endpoint: String,
    username: String,
}

impl HttpTransport {
    pub fn new(server_url: &str, username: &str) -> Result<Self, DeliverError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/usage/submit", server_url.trim_end_matches('/')),
            username: username.to_string(),
        })
    }
}

impl Transport for HttpTransport {
    fn submit(&self, records: &[UsageRecord]) -> Result<(), DeliverError> {
        let body = SubmitRequest {
            username: &self.username,
            usage: records,
        };
        let response = self.client.post(&self.endpoint).json(&body).send()?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(DeliverError::Rejected { status });
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct DeliveryOutcome {
    pub sent: usize,
    pub unsent: Vec<UsageRecord>,
}

/// Send batches strictly in input order until the budget runs out or a
/// request fails; there are no retries, so the unsent tail is always
/// contiguous. Deferring the tail to the next run via the pending buffer is
/// cheaper than making the host session wait on a struggling server.
pub fn send_batches(
    transport: &dyn Transport,
    mut records: Vec<UsageRecord>,
    budget: Duration,
) -> DeliveryOutcome {
    let started = Instant::now();
    let mut sent = 0usize;

    while sent < records.len() {
        if started.elapsed() >= budget {
            tracing::debug!(sent, remaining = records.len() - sent, "send budget exhausted");
            break;
        }
        let end = usize::min(sent + BATCH_SIZE, records.len());
        match transport.submit(&records[sent..end]) {
            Ok(()) => {
                tracing::debug!(batch = end - sent, "batch delivered");
                sent = end;
            }
            Err(err) => {
                tracing::warn!(error = %err, "delivery failed, deferring remainder");
                break;
            }
        }
    }

    let unsent = records.split_off(sent);
    DeliveryOutcome { sent, unsent }
}
