//! Per-task resource budgets.
//!
//! Every graph node carries a [`TaskBudget`] bounding its latency, retries,
//! and token envelope. Budgets start from a shared default; a static
//! per-provider override table adjusts the providers whose workloads differ
//! from the baseline.

use crate::provider::ProviderKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resource bounds for one graph task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBudget {
    /// Wall-clock bound for a single provider call, in milliseconds.
    pub max_latency_ms: u64,

    /// Retries allowed after the first attempt, for transient failures only.
    pub max_retries: u32,

    /// Input token envelope for the task.
    pub max_input_tokens: u32,

    /// Output token envelope for the task.
    pub max_output_tokens: u32,
}

impl Default for TaskBudget {
    fn default() -> Self {
        Self {
            max_latency_ms: 8_000,
            max_retries: 1,
            max_input_tokens: 4_000,
            max_output_tokens: 1_024,
        }
    }
}

impl TaskBudget {
    /// The effective budget for a provider: the default with the provider's
    /// static overrides merged on top. Providers without overrides get the
    /// default unchanged.
    #[must_use]
    pub fn for_provider(kind: ProviderKind) -> Self {
        let base = Self::default();
        match kind {
            // Web search pays network round-trips to search and scrape.
            ProviderKind::WebSearch => Self {
                max_latency_ms: 15_000,
                max_retries: 2,
                max_output_tokens: 2_048,
                ..base
            },
            // Voice analytics aggregates over call logs; slower, never worth
            // retrying within a turn.
            ProviderKind::VoiceAnalytics => Self {
                max_latency_ms: 12_000,
                max_retries: 0,
                ..base
            },
            ProviderKind::Knowledge => Self {
                max_output_tokens: 2_048,
                ..base
            },
            ProviderKind::Memory | ProviderKind::SocialGraph => base,
        }
    }

    /// The latency bound as a [`Duration`].
    #[must_use]
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.max_latency_ms)
    }
}
