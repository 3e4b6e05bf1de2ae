use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;

use super::PollingPolicy;

/// Outcome of one probe attempt. Immutable once recorded.
#[derive(Debug, Clone, Serialize)]
pub struct HealthProbeResult {
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    pub succeeded: bool,
    pub status: Option<u16>,
    pub body: Option<String>,
    pub error: Option<String>,
}

impl HealthProbeResult {
    pub fn ok(status: u16, body: String) -> Self {
        Self {
            at: OffsetDateTime::now_utc(),
            succeeded: true,
            status: Some(status),
            body: Some(body),
            error: None,
        }
    }

    pub fn rejected(status: u16, body: String) -> Self {
        Self {
            at: OffsetDateTime::now_utc(),
            succeeded: false,
            status: Some(status),
            body: Some(body),
            error: None,
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            at: OffsetDateTime::now_utc(),
            succeeded: false,
            status: None,
            body: None,
            error: Some(error),
        }
    }

    /// One-line rendering for operator-facing reports.
    pub fn describe(&self) -> String {
        match (self.succeeded, self.status, &self.error) {
            (true, Some(status), _) => format!("status {status}, body ok"),
            (false, Some(status), _) => {
                let body = self.body.as_deref().unwrap_or("");
                format!("status {status}, body {body:?}")
            }
            (_, None, Some(error)) => error.clone(),
            _ => "no response".to_string(),
        }
    }
}

pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = HealthProbeResult> + Send + 'a>>;

/// Seam between the polling state machine and the wire. Production uses
/// HTTP; tests script the sequence of results.
pub trait HealthProbe: Send + Sync {
    fn probe(&self) -> ProbeFuture<'_>;
}

pub struct HttpHealthProbe {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpHealthProbe {
    pub fn new(policy: &PollingPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: policy.endpoint_url(),
            timeout: policy.per_attempt_timeout,
        }
    }

    /// Single probe with its own timeout, independent of the poller's
    /// wall-clock budget.
    pub async fn probe_once(&self) -> HealthProbeResult {
        let response = match self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return HealthProbeResult::failed(e.to_string()),
        };
        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return HealthProbeResult::failed(e.to_string()),
        };
        if status == 200 && body_reports_ok(&body) {
            HealthProbeResult::ok(status, body)
        } else {
            HealthProbeResult::rejected(status, body)
        }
    }
}

impl HealthProbe for HttpHealthProbe {
    fn probe(&self) -> ProbeFuture<'_> {
        Box::pin(self.probe_once())
    }
}

/// Healthy means a JSON body whose `status` field equals "ok"; anything
/// else, malformed bodies included, is unhealthy.
fn body_reports_ok(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("status").and_then(|s| s.as_str()).map(|s| s == "ok"))
        .unwrap_or(false)
}

/// Bounded ordered record of recent probe attempts; oldest entries drop
/// first once capacity is reached.
#[derive(Debug)]
pub struct ProbeHistory {
    results: VecDeque<HealthProbeResult>,
    capacity: usize,
}

impl ProbeHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            results: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, result: HealthProbeResult) {
        if self.results.len() == self.capacity {
            self.results.pop_front();
        }
        self.results.push_back(result);
    }

    pub fn last(&self) -> Option<&HealthProbeResult> {
        self.results.back()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn snapshot(&self) -> Vec<HealthProbeResult> {
        self.results.iter().cloned().collect()
    }
}
