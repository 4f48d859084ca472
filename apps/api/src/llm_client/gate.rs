//! Rate-Limited Call Gate — the single lane every model call drives through.
//!
//! The upstream quota is one shared resource, so calls are globally
//! serialized even across unrelated jobs and pipelines. The gate is an
//! explicit object built once at startup and injected wherever calls are
//! made; there is no module-level queue state.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};
use tracing::warn;

use crate::llm_client::{GenerateReply, GenerateRequest, LlmError, ModelBackend};

/// Gate tuning. Defaults match the upstream free-tier quota profile.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Minimum spacing between consecutive underlying calls.
    pub min_interval: Duration,
    /// Total attempts per submission when the error is rate-limit class.
    pub max_retries: u32,
    /// Backoff base; attempt `i` (0-based) waits `2^(i+1) × base`.
    pub backoff_base: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(2000),
            max_retries: 3,
            backoff_base: Duration::from_millis(2000),
        }
    }
}

/// Serializing, rate-limit-aware submission point for all outbound calls.
pub struct CallGate {
    backend: Arc<dyn ModelBackend>,
    config: GateConfig,
    /// Timestamp of the last *successful* call. The lock doubles as the
    /// queue: it is held across the entire submission (spacing sleep,
    /// underlying call, backoff retries), and tokio's mutex wakes waiters
    /// in FIFO order, so submission N+1 never starts before N has settled.
    last_success: Mutex<Option<Instant>>,
}

impl CallGate {
    pub fn new(backend: Arc<dyn ModelBackend>, config: GateConfig) -> Self {
        Self {
            backend,
            config,
            last_success: Mutex::new(None),
        }
    }

    /// Submits one generation call. Blocks behind any in-flight submission,
    /// enforces the minimum inter-call spacing, retries rate-limit errors
    /// with exponential backoff, and re-raises after exhausting retries.
    /// Non-rate-limit errors propagate immediately.
    pub async fn submit(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateReply, LlmError> {
        let mut last_success = self.last_success.lock().await;

        if let Some(last) = *last_success {
            let elapsed = last.elapsed();
            if elapsed < self.config.min_interval {
                sleep(self.config.min_interval - elapsed).await;
            }
        }

        let mut attempt: u32 = 0;
        loop {
            match self.backend.generate(model, request).await {
                Ok(reply) => {
                    *last_success = Some(Instant::now());
                    return Ok(reply);
                }
                Err(err) if err.is_rate_limit() && attempt + 1 < self.config.max_retries => {
                    let wait = self.config.backoff_base * 2u32.pow(attempt + 1);
                    warn!(
                        "rate limit hit (attempt {}), retrying in {}ms",
                        attempt + 1,
                        wait.as_millis()
                    );
                    sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
