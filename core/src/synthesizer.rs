//! Narrative synthesizer: builds the prompt for a `CaseContext` and makes
//! one logical reasoning call, retrying transient failures with capped
//! exponential backoff.
//!
//! RULES:
//!   - Fatal call errors are never retried.
//!   - At most `max_attempts` calls per case; exhaustion is a failure,
//!     never a fabricated report.

use crate::{
    aggregator::CaseContext,
    config::{AnalyticsConfig, RetryConfig},
    error::{CallError, TriageError, TriageResult},
    prompt::build_prompt,
    reasoning::ReasoningClient,
    warning::Warning,
};
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Fraction of each delay added as random jitter.
    pub jitter: f64,
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            initial_backoff: Duration::from_millis(cfg.initial_backoff_ms),
            max_backoff: Duration::from_millis(cfg.max_backoff_ms),
            jitter: cfg.jitter.clamp(0.0, 1.0),
        }
    }

    /// Base delay before retry `n` (1-based): doubles each retry, capped.
    pub fn base_delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Base delay plus jitter, never above `max_backoff`.
    fn delay(&self, retry: u32, rng: &mut impl Rng) -> Duration {
        let base = self.base_delay(retry);
        if self.jitter <= 0.0 || base.is_zero() {
            return base;
        }
        (base + base.mul_f64(rng.gen_range(0.0..=self.jitter))).min(self.max_backoff)
    }
}

#[derive(Debug, Clone)]
pub struct Synthesis {
    pub raw_text: String,
    pub attempts: u32,
    pub prompt_chars: usize,
}

pub struct Synthesizer<'a> {
    client: &'a dyn ReasoningClient,
    policy: RetryPolicy,
    analytics: &'a AnalyticsConfig,
    max_prompt_chars: usize,
}

impl<'a> Synthesizer<'a> {
    pub fn new(
        client: &'a dyn ReasoningClient,
        policy: RetryPolicy,
        analytics: &'a AnalyticsConfig,
        max_prompt_chars: usize,
    ) -> Self {
        Self {
            client,
            policy,
            analytics,
            max_prompt_chars,
        }
    }

    /// Prompt truncation and transient failures are appended to `warnings`,
    /// whether or not the call eventually succeeds.
    pub fn synthesize(
        &self,
        ctx: &CaseContext,
        warnings: &mut Vec<Warning>,
    ) -> TriageResult<Synthesis> {
        let built = build_prompt(ctx, self.analytics, self.max_prompt_chars);
        if let Some(w) = built.truncation_warning() {
            log::warn!("case {}: {w}", ctx.reference.case_id);
            warnings.push(w);
        }
        let prompt = built.prompt;
        let prompt_chars = prompt.char_len();
        log::debug!(
            "case {}: prompt ready ({prompt_chars} chars) for model {}",
            ctx.reference.case_id,
            self.client.model_name()
        );

        let mut rng = rand::thread_rng();
        let mut last_err = String::new();

        for attempt in 1..=self.policy.max_attempts {
            if attempt > 1 {
                let delay = self.policy.delay(attempt - 1, &mut rng);
                log::debug!(
                    "case {}: retry {}/{} after {:?}",
                    ctx.reference.case_id,
                    attempt - 1,
                    self.policy.max_attempts - 1,
                    delay
                );
                std::thread::sleep(delay);
            }

            match self.client.complete(&prompt) {
                Ok(raw_text) => {
                    log::info!(
                        "case {}: reasoning call succeeded on attempt {attempt}",
                        ctx.reference.case_id
                    );
                    return Ok(Synthesis {
                        raw_text,
                        attempts: attempt,
                        prompt_chars,
                    });
                }
                Err(CallError::Fatal(reason)) => {
                    log::error!("case {}: reasoning call failed: {reason}", ctx.reference.case_id);
                    return Err(TriageError::Call(CallError::Fatal(reason)));
                }
                Err(CallError::Transient(reason)) => {
                    log::warn!(
                        "case {}: attempt {attempt} failed transiently: {reason}",
                        ctx.reference.case_id
                    );
                    if attempt < self.policy.max_attempts {
                        warnings.push(Warning::CallRetried {
                            attempt,
                            reason: reason.clone(),
                        });
                    }
                    last_err = reason;
                }
            }
        }

        Err(TriageError::RetriesExhausted {
            attempts: self.policy.max_attempts,
            last: last_err,
        })
    }
}
