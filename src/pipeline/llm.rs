//! Model Invoker: resume text → [`ProfileRecord`], with retry/backoff.
//!
//! Every attempt sends the same two messages (the instruction payload as the
//! system turn, the extracted resume text as the user turn) with fixed
//! low-temperature sampling, runs the reply through Response Repair and
//! parses it. A failure at any of those steps is retried.
//!
//! ## Retry Strategy
//!
//! Shared chat endpoints rate-limit under concurrent load, and a model reply
//! that fails to parse is usually fine on the next draw. After failed attempt
//! `k` (0-indexed) the invoker sleeps `2^k` backoff units plus a uniform
//! jitter in `[0, 0.5)` units, so runs that failed together do not retry in
//! lockstep. With the default one-second unit and five attempts the waits
//! are roughly 1 s → 2 s → 4 s → 8 s before the last error is returned.

use crate::error::{display_chain, InferenceError, ModelError};
use crate::pipeline::repair::repair_json;
use crate::profile::ProfileRecord;
use async_trait::async_trait;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    /// Cap on completion tokens; `None` leaves it to the endpoint.
    pub max_tokens: Option<usize>,
}

/// Low-variance settings used for profile extraction.
pub const PROFILE_SAMPLING: SamplingParams = SamplingParams {
    temperature: 0.2,
    top_p: 1.0,
    frequency_penalty: 0.0,
    presence_penalty: 0.0,
    max_tokens: None,
};

/// One chat completion: a system turn and a user turn in, reply text out.
///
/// Implementations must be safe to call concurrently from many runs; they
/// hold configuration only.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        sampling: &SamplingParams,
    ) -> Result<String, ModelError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, first one included.
    pub max_attempts: u32,
    pub backoff_unit: Duration,
    /// Upper bound (exclusive) of the random jitter, in backoff units.
    pub max_jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_unit: Duration::from_secs(1),
            max_jitter: 0.5,
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (0-indexed) for a given jitter.
    pub fn delay_after(&self, attempt: u32, jitter: f64) -> Duration {
        let factor = 2f64.powi(attempt.min(30) as i32) + jitter;
        self.backoff_unit.mul_f64(factor)
    }

    fn jittered_delay(&self, attempt: u32) -> Duration {
        let jitter = if self.max_jitter > 0.0 {
            rand::thread_rng().gen_range(0.0..self.max_jitter)
        } else {
            0.0
        };
        self.delay_after(attempt, jitter)
    }
}

/// A successfully inferred record and how many attempts it took.
#[derive(Debug, Clone)]
pub struct Inference {
    pub record: ProfileRecord,
    pub attempts: u32,
}

/// Why a single attempt failed.
#[derive(Debug)]
enum AttemptError {
    Model(ModelError),
    Malformed(String),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Model(e) => f.write_str(&display_chain(e)),
            AttemptError::Malformed(detail) => f.write_str(detail),
        }
    }
}

impl AttemptError {
    fn into_inference_error(self, attempts: u32) -> InferenceError {
        match self {
            AttemptError::Model(source) => {
                InferenceError::ModelInvocationFailed { attempts, source }
            }
            AttemptError::Malformed(detail) => {
                InferenceError::MalformedResponse { attempts, detail }
            }
        }
    }
}

/// Shared, read-only model stage. Clone it freely; clones share the client.
#[derive(Clone)]
pub struct ModelInvoker {
    client: Arc<dyn ModelClient>,
    system_prompt: Arc<str>,
    sampling: SamplingParams,
    retry: RetryPolicy,
}

impl fmt::Debug for ModelInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInvoker")
            .field("system_prompt_len", &self.system_prompt.len())
            .field("sampling", &self.sampling)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ModelInvoker {
    pub fn new(
        client: Arc<dyn ModelClient>,
        system_prompt: impl Into<Arc<str>>,
        sampling: SamplingParams,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            system_prompt: system_prompt.into(),
            sampling,
            retry,
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Turn extracted resume text into a profile record.
    ///
    /// # Errors
    /// After the attempt budget is spent, the last attempt's failure:
    /// [`InferenceError::ModelInvocationFailed`] for a transport/API error,
    /// [`InferenceError::MalformedResponse`] for an unusable reply.
    pub async fn infer(&self, text: &str) -> Result<Inference, InferenceError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let start = Instant::now();
        let mut attempt = 0;
        loop {
            match self.attempt(text).await {
                Ok(record) => {
                    info!(
                        "Model returned a profile after {} attempt(s) in {:?}",
                        attempt + 1,
                        start.elapsed()
                    );
                    return Ok(Inference {
                        record,
                        attempts: attempt + 1,
                    });
                }
                Err(err) if attempt + 1 >= max_attempts => {
                    warn!(
                        "Model attempt {}/{} failed, giving up: {}",
                        attempt + 1,
                        max_attempts,
                        err
                    );
                    return Err(err.into_inference_error(attempt + 1));
                }
                Err(err) => {
                    let delay = self.retry.jittered_delay(attempt);
                    warn!(
                        "Model attempt {}/{} failed, retrying in {}ms: {}",
                        attempt + 1,
                        max_attempts,
                        delay.as_millis(),
                        err
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(&self, text: &str) -> Result<ProfileRecord, AttemptError> {
        let raw = self
            .client
            .complete(&self.system_prompt, text, &self.sampling)
            .await
            .map_err(AttemptError::Model)?;
        debug!("Model reply: {} characters", raw.len());
        let json = repair_json(&raw).map_err(|e| AttemptError::Malformed(e.to_string()))?;
        ProfileRecord::from_json(json)
            .map_err(|e| AttemptError::Malformed(format!("reply is not a valid profile: {e}")))
    }
}
