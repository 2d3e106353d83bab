//! Per-provider token-bucket admission control.
//!
//! Every search acquires admission from the [`RateGovernor`] before
//! hitting the backend. `acquire` suspends only the calling worker
//! task; other workers proceed independently. A bounded maximum wait
//! converts starvation into a [`RateLimitExceeded`] soft failure the
//! worker treats as "skip this search, continue the angle".

mod bucket;

use crate::config::{ProviderLimits, ResearchConfig};
use crate::providers::SearchProvider;
use bucket::TokenBucket;
use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;

/// Admission wait exceeded the configured bound.
#[derive(Debug, Error)]
#[error("rate limit admission for {provider} exceeded max wait of {max_wait:?}")]
pub struct RateLimitExceeded {
    pub provider: SearchProvider,
    pub max_wait: Duration,
}

/// Cumulative admission statistics, exported with the session snapshot.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct GovernorStats {
    pub acquired: u64,
    pub waits: u64,
    pub total_wait_secs: f64,
    pub rejected: u64,
}

#[derive(Debug)]
struct ProviderBuckets {
    requests: TokenBucket,
    /// Secondary bucket for LLM token-per-minute budgets.
    tokens: Option<TokenBucket>,
}

impl ProviderBuckets {
    fn new(limits: ProviderLimits, now: Instant) -> Self {
        Self {
            requests: TokenBucket::new(limits.requests_per_minute, now),
            tokens: limits
                .tokens_per_minute
                .map(|tpm| TokenBucket::new(tpm, now)),
        }
    }
}

/// Per-provider token-bucket admission control, safe for concurrent
/// use from all angle workers simultaneously.
#[derive(Debug)]
pub struct RateGovernor {
    limits: HashMap<SearchProvider, ProviderLimits>,
    buckets: Mutex<HashMap<SearchProvider, ProviderBuckets>>,
    max_wait: Duration,
    stats: StdMutex<GovernorStats>,
}

impl RateGovernor {
    pub fn new(config: &ResearchConfig) -> Self {
        let limits = SearchProvider::ALL
            .iter()
            .map(|p| (*p, config.limits_for(p.as_str())))
            .collect();
        Self {
            limits,
            buckets: Mutex::new(HashMap::new()),
            max_wait: Duration::from_secs(config.max_rate_wait_secs),
            stats: StdMutex::new(GovernorStats::default()),
        }
    }

    /// Acquire admission for one request against `provider`, estimated
    /// to consume `estimated_tokens` LLM tokens.
    ///
    /// Suspends the calling task until both buckets admit the request
    /// or the cumulative wait exceeds the configured bound.
    pub async fn acquire(
        &self,
        provider: SearchProvider,
        estimated_tokens: u32,
    ) -> Result<(), RateLimitExceeded> {
        let mut waited = Duration::ZERO;

        loop {
            let wait = {
                let mut buckets = self.buckets.lock().await;
                let now = Instant::now();
                let entry = buckets.entry(provider).or_insert_with(|| {
                    let limits = self
                        .limits
                        .get(&provider)
                        .copied()
                        .unwrap_or_default();
                    ProviderBuckets::new(limits, now)
                });

                match Self::try_admit(entry, estimated_tokens, now) {
                    Ok(()) => {
                        let mut stats = self.stats.lock().expect("governor stats lock poisoned");
                        stats.acquired += 1;
                        return Ok(());
                    }
                    Err(wait) => wait,
                }
            };

            if waited + wait > self.max_wait {
                let mut stats = self.stats.lock().expect("governor stats lock poisoned");
                stats.rejected += 1;
                return Err(RateLimitExceeded {
                    provider,
                    max_wait: self.max_wait,
                });
            }

            debug!(provider = %provider, wait_ms = wait.as_millis() as u64, "rate limit wait");
            {
                let mut stats = self.stats.lock().expect("governor stats lock poisoned");
                stats.waits += 1;
                stats.total_wait_secs += wait.as_secs_f64();
            }

            // Sleep outside the bucket lock so other workers admit freely.
            sleep(wait).await;
            waited += wait;
        }
    }

    pub fn stats(&self) -> GovernorStats {
        *self.stats.lock().expect("governor stats lock poisoned")
    }

    fn try_admit(
        entry: &mut ProviderBuckets,
        estimated_tokens: u32,
        now: Instant,
    ) -> Result<(), Duration> {
        if let Err(wait) = entry.requests.try_take(1.0, now) {
            return Err(wait);
        }
        if estimated_tokens > 0
            && let Some(tokens) = entry.tokens.as_mut()
            && let Err(wait) = tokens.try_take(estimated_tokens as f64, now)
        {
            // Not admitted: hand the request token back so retries of
            // the wait loop cannot drain the request bucket.
            entry.requests.put_back(1.0);
            return Err(wait);
        }
        Ok(())
    }
}
