//! Hash reputation lookup
//!
//! One synchronous query per unique digest per run. Rate-limit replies are
//! retried after a fixed cooldown, up to a retry budget. Every outcome,
//! errors included, becomes a [`Verdict`] and is cached.

use crate::hashing::is_valid_digest;
use crate::models::{Verdict, VerdictError};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_ENDPOINT: &str = "https://www.virustotal.com/vtapi/v2/file/report";

/// Raw answer from the reputation service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceReply {
    RateLimited,
    Body(String),
}

/// Seam between the lookup cache and the network
pub trait ReputationService {
    /// Query one digest. `Err` means the request never produced a reply.
    fn query(&self, digest: &str) -> Result<ServiceReply>;
}

/// VirusTotal v2 file report client
pub struct VirusTotalClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
}

impl VirusTotalClient {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            bail!("VirusTotal API key is empty");
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.trim().to_string(),
        })
    }
}

impl ReputationService for VirusTotalClient {
    fn query(&self, digest: &str) -> Result<ServiceReply> {
        let res = self
            .client
            .post(&self.endpoint)
            .form(&[("apikey", self.api_key.as_str()), ("resource", digest)])
            .send()
            .with_context(|| format!("Request to {} failed", self.endpoint))?;

        let status = res.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(ServiceReply::RateLimited);
        }
        if !status.is_success() {
            bail!("{} returned {}", self.endpoint, status);
        }
        let body = res.text().context("Failed to read response body")?;
        Ok(ServiceReply::Body(body))
    }
}

#[derive(Debug, Deserialize)]
struct ReportBody {
    response_code: Option<i64>,
    positives: Option<u64>,
    total: Option<u64>,
}

/// Map a response body onto a verdict
pub fn decode_verdict(body: &str) -> Verdict {
    let Ok(report) = serde_json::from_str::<ReportBody>(body) else {
        return Verdict::Error(VerdictError::Malformed);
    };
    match report.response_code {
        Some(-2) => Verdict::Queued,
        Some(-1) => Verdict::Error(VerdictError::Service),
        Some(0) => Verdict::NotScanned,
        Some(1) => match report.total {
            Some(total) if total > 0 => Verdict::Scanned {
                positives: report.positives.unwrap_or(0),
                total,
            },
            _ => Verdict::Error(VerdictError::MissingTotal),
        },
        _ => Verdict::Error(VerdictError::Malformed),
    }
}

/// Cached, rate-limit aware front of a [`ReputationService`]
pub struct ReputationLookup {
    service: Box<dyn ReputationService>,
    cache: HashMap<String, Verdict>,
    cooldown: Duration,
    max_retries: u32,
    calls: usize,
}

impl ReputationLookup {
    pub fn new(service: Box<dyn ReputationService>, cooldown: Duration, max_retries: u32) -> Self {
        Self {
            service,
            cache: HashMap::new(),
            cooldown,
            max_retries,
            calls: 0,
        }
    }

    /// Outbound requests made so far, retries included
    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Verdict for `digest`; `None` when it is not a valid digest.
    pub fn verdict(&mut self, digest: &str) -> Option<Verdict> {
        let digest = digest.trim().to_ascii_lowercase();
        if !is_valid_digest(&digest) {
            debug!(target: "reputation", digest = %digest, "Not a valid digest, lookup skipped");
            return None;
        }
        if let Some(verdict) = self.cache.get(&digest) {
            return Some(verdict.clone());
        }

        let verdict = self.fetch(&digest);
        self.cache.insert(digest, verdict.clone());
        Some(verdict)
    }

    fn fetch(&mut self, digest: &str) -> Verdict {
        let mut retries = 0;
        loop {
            self.calls += 1;
            match self.service.query(digest) {
                Ok(ServiceReply::Body(body)) => return decode_verdict(&body),
                Ok(ServiceReply::RateLimited) if retries < self.max_retries => {
                    retries += 1;
                    warn!(
                        target: "reputation",
                        digest = %digest,
                        retry = retries,
                        cooldown_secs = self.cooldown.as_secs(),
                        "Rate limited, waiting before retry"
                    );
                    thread::sleep(self.cooldown);
                }
                Ok(ServiceReply::RateLimited) => {
                    warn!(
                        target: "reputation",
                        digest = %digest,
                        retries,
                        "Still rate limited after retry budget"
                    );
                    return Verdict::Error(VerdictError::RateLimited);
                }
                Err(e) => {
                    warn!(target: "reputation", digest = %digest, error = %e, "Reputation query failed");
                    return Verdict::Error(VerdictError::Transport);
                }
            }
        }
    }
}
