//! Top-level orchestrator configuration.

use orchestrator_canary::CanaryConfig;
use orchestrator_core::{ProviderKind, ToolDefinition};
use orchestrator_critic::CriticConfig;
use orchestrator_graph::ExecutorConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tool-use policy for synthesis calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolPolicy {
    /// Whether tools are offered to the model at all.
    pub enabled: bool,
    /// Tool names never offered, even when enabled.
    #[serde(default)]
    pub blocklist: Vec<String>,
}

impl ToolPolicy {
    /// Filter a tool set down to what the policy permits. Returns `None`
    /// when tools are disabled or nothing survives the blocklist.
    #[must_use]
    pub fn permitted(&self, tools: &[ToolDefinition]) -> Option<Vec<ToolDefinition>> {
        if !self.enabled {
            return None;
        }
        let allowed: Vec<ToolDefinition> = tools
            .iter()
            .filter(|t| !self.blocklist.iter().any(|blocked| blocked == &t.name))
            .cloned()
            .collect();
        if allowed.is_empty() {
            None
        } else {
            Some(allowed)
        }
    }
}

/// Configuration for one orchestrator instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Whether retrieval graphs fan out in parallel; disabled builds linear
    /// chains.
    pub parallel_retrieval: bool,

    /// Providers globally removed from every graph.
    #[serde(default)]
    pub skipped_providers: Vec<ProviderKind>,

    /// Graph executor settings.
    pub executor: ExecutorConfig,

    /// Canary admission settings.
    pub canary: CanaryConfig,

    /// Critic loop settings.
    pub critic: CriticConfig,

    /// Tool-use policy for synthesis.
    pub tool_policy: ToolPolicy,

    /// Wall-clock bound for the synthesis call.
    #[serde(with = "humantime_serde")]
    pub synthesis_timeout: Duration,

    /// Model used by the default draft evaluator.
    pub evaluator_model: String,

    /// Optional allow-list constraining model resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_allow_list: Option<Vec<String>>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            parallel_retrieval: true,
            skipped_providers: Vec::new(),
            executor: ExecutorConfig::default(),
            canary: CanaryConfig::default(),
            critic: CriticConfig::default(),
            tool_policy: ToolPolicy::default(),
            synthesis_timeout: Duration::from_secs(45),
            evaluator_model: "gpt-4o-mini".to_string(),
            model_allow_list: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: String::new(),
            parameters: json!({}),
        }
    }

    #[test]
    fn test_tool_policy_disabled_offers_nothing() {
        let policy = ToolPolicy::default();
        assert!(policy.permitted(&[tool("search")]).is_none());
    }

    #[test]
    fn test_tool_policy_blocklist_filters() {
        let policy = ToolPolicy {
            enabled: true,
            blocklist: vec!["shell".to_string()],
        };
        let permitted = policy.permitted(&[tool("search"), tool("shell")]).unwrap();
        assert_eq!(permitted.len(), 1);
        assert_eq!(permitted[0].name, "search");
    }

    #[test]
    fn test_tool_policy_fully_blocked_offers_nothing() {
        let policy = ToolPolicy {
            enabled: true,
            blocklist: vec!["search".to_string()],
        };
        assert!(policy.permitted(&[tool("search")]).is_none());
    }

    #[test]
    fn test_config_roundtrips_through_serde() {
        let config = OrchestratorConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: OrchestratorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.parallel_retrieval, config.parallel_retrieval);
        assert_eq!(back.synthesis_timeout, config.synthesis_timeout);
        assert_eq!(back.evaluator_model, config.evaluator_model);
    }
}
