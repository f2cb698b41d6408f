//! Runtime configuration.
//!
//! The core receives a `TriageConfig` that has already been loaded and
//! validated. It never reads environment variables or flags itself; the
//! `case-triage` binary fills in credentials before handing it over.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Room the case data needs on top of the fixed system prompt.
const MIN_CASE_CHARS: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// SQLite file holding the `customer` table.
    pub customer_db: String,
    /// SQLite file holding the `txn` table.
    pub transaction_db: String,
    /// SQLite file holding the `prior_case` table.
    pub case_history_db: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            customer_db: "data/records.db".into(),
            transaction_db: "data/records.db".into(),
            case_history_db: "data/records.db".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_url: String,
    pub model: String,
    /// Never serialized back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".into(),
            model: "gpt-4o-mini".into(),
            api_key: None,
            temperature: 0.1,
            top_p: 0.9,
            max_tokens: 2500,
            timeout_secs: 45,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, the first call included.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Fraction of each backoff added as random jitter, in [0, 1].
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            jitter: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Most recent N transactions kept in a case context.
    pub transaction_cap: usize,
    /// Upper bound on system + user prompt, in characters.
    pub max_prompt_chars: usize,
    /// Run the three record lookups concurrently.
    pub parallel_lookups: bool,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            transaction_cap: 200,
            max_prompt_chars: 24_000,
            parallel_lookups: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// |z| above which a single transaction is an outlier.
    pub outlier_z_threshold: f64,
    /// |z| above which a month's total is flagged.
    pub monthly_z_threshold: f64,
    /// Fewer transactions than this and no indicators are computed.
    pub min_transactions: usize,
    /// Coefficient of variation above which an account is volatile.
    pub volatility_threshold: f64,
    /// Share of round amounts above which structuring is suspected.
    pub round_amount_ratio: f64,
    /// z above which a month's transaction count is flagged.
    pub frequency_z_threshold: f64,
    /// |z| against its own account above which a flagged transaction is high risk.
    pub comparison_high_z: f64,
    /// |z| above which a flagged transaction is an outlier and medium risk.
    pub comparison_medium_z: f64,
    /// Percentage deviation from the account mean that alone makes medium risk.
    pub comparison_deviation_pct: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            outlier_z_threshold: 2.5,
            monthly_z_threshold: 2.0,
            min_transactions: 3,
            volatility_threshold: 0.8,
            round_amount_ratio: 0.7,
            frequency_z_threshold: 2.0,
            comparison_high_z: 3.0,
            comparison_medium_z: 2.0,
            comparison_deviation_pct: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub sources: SourcesConfig,
    pub llm: LlmConfig,
    pub retry: RetryConfig,
    pub limits: LimitsConfig,
    pub analytics: AnalyticsConfig,
    /// Directory the file sink writes reports into.
    pub output_dir: String,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            sources: SourcesConfig::default(),
            llm: LlmConfig::default(),
            retry: RetryConfig::default(),
            limits: LimitsConfig::default(),
            analytics: AnalyticsConfig::default(),
            output_dir: "output".into(),
        }
    }
}

impl TriageConfig {
    /// Load from a JSON file. Absent sections take their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: TriageConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        Ok(config)
    }

    /// Config for unit and integration tests: no backoff delay, no jitter,
    /// a small transaction cap.
    pub fn default_test() -> Self {
        Self {
            llm: LlmConfig {
                api_key: Some("test-key".into()),
                timeout_secs: 5,
                ..LlmConfig::default()
            },
            retry: RetryConfig {
                max_attempts: 3,
                initial_backoff_ms: 0,
                max_backoff_ms: 0,
                jitter: 0.0,
            },
            limits: LimitsConfig {
                transaction_cap: 50,
                max_prompt_chars: 16_000,
                parallel_lookups: true,
            },
            ..Self::default()
        }
    }

    /// Every problem that would make a run pointless. Empty means usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        match &self.llm.api_key {
            Some(k) if !k.trim().is_empty() => {}
            _ => errors.push("LLM API key is not set".to_string()),
        }
        if self.llm.api_url.trim().is_empty() {
            errors.push("LLM API URL is empty".to_string());
        }
        if self.retry.max_attempts == 0 {
            errors.push("retry.max_attempts must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            errors.push(format!("retry.jitter must be in [0, 1], got {}", self.retry.jitter));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            errors.push("retry.initial_backoff_ms exceeds retry.max_backoff_ms".to_string());
        }
        if self.limits.transaction_cap == 0 {
            errors.push("limits.transaction_cap must be at least 1".to_string());
        }
        let floor = crate::prompt::SYSTEM_PROMPT.chars().count() + MIN_CASE_CHARS;
        if self.limits.max_prompt_chars < floor {
            errors.push(format!(
                "limits.max_prompt_chars too small ({}); need at least {floor}",
                self.limits.max_prompt_chars
            ));
        }
        errors
    }
}
