//! Configuration for orchestrator runs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the feature implementation loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Maximum verification retries per task before escalating to a
    /// clarification request.
    #[serde(default = "default_max_verify_retries")]
    pub max_verify_retries: u32,
    /// Subagent execution timeout in seconds.
    #[serde(default = "default_subagent_timeout")]
    pub subagent_timeout_secs: u64,
}

fn default_max_verify_retries() -> u32 {
    2
}

fn default_subagent_timeout() -> u64 {
    1800 // 30 minutes per task
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_verify_retries: default_max_verify_retries(),
            subagent_timeout_secs: default_subagent_timeout(),
        }
    }
}

/// Configuration for sanity checks against the production URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanityConfig {
    /// Timeout for an HTTP sanity check in seconds.
    #[serde(default = "default_sanity_timeout")]
    pub timeout_secs: u64,
    /// HTTP status treated as a pass.
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
}

fn default_sanity_timeout() -> u64 {
    5
}

fn default_expected_status() -> u16 {
    200
}

impl Default for SanityConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_sanity_timeout(),
            expected_status: default_expected_status(),
        }
    }
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Feature loop configuration.
    #[serde(default)]
    pub feature_loop: LoopConfig,
    /// Sanity check configuration.
    #[serde(default)]
    pub sanity: SanityConfig,
    /// Phase-advance attempts tolerated with the same unresolved
    /// clarification before the run aborts.
    #[serde(default = "default_max_advance_attempts")]
    pub max_advance_attempts: u32,
}

fn default_max_advance_attempts() -> u32 {
    3
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            feature_loop: LoopConfig::default(),
            sanity: SanityConfig::default(),
            max_advance_attempts: default_max_advance_attempts(),
        }
    }
}

impl OrchestratorConfig {
    /// Sets the verification retry budget.
    pub fn with_max_verify_retries(mut self, retries: u32) -> Self {
        self.feature_loop.max_verify_retries = retries;
        self
    }

    /// Sets the sanity check timeout.
    pub fn with_sanity_timeout(mut self, timeout: Duration) -> Self {
        self.sanity.timeout_secs = timeout.as_secs();
        self
    }

    /// Sets the abort threshold for unresolved clarifications.
    pub fn with_max_advance_attempts(mut self, attempts: u32) -> Self {
        self.max_advance_attempts = attempts;
        self
    }

    /// Returns the sanity check timeout as a Duration.
    pub fn sanity_timeout(&self) -> Duration {
        Duration::from_secs(self.sanity.timeout_secs)
    }

    /// Returns the subagent timeout as a Duration.
    pub fn subagent_timeout(&self) -> Duration {
        Duration::from_secs(self.feature_loop.subagent_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_has_sensible_defaults() {
        let config = OrchestratorConfig::default();

        assert_eq!(config.feature_loop.max_verify_retries, 2);
        assert_eq!(config.feature_loop.subagent_timeout_secs, 1800);
        assert_eq!(config.sanity.timeout_secs, 5);
        assert_eq!(config.sanity.expected_status, 200);
        assert_eq!(config.max_advance_attempts, 3);
    }

    #[test]
    fn config_builder_works() {
        let config = OrchestratorConfig::default()
            .with_max_verify_retries(4)
            .with_sanity_timeout(Duration::from_secs(10))
            .with_max_advance_attempts(5);

        assert_eq!(config.feature_loop.max_verify_retries, 4);
        assert_eq!(config.sanity_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_advance_attempts, 5);
    }

    #[test]
    fn config_deserializes_from_toml() {
        let toml = r#"
            max_advance_attempts = 6

            [feature_loop]
            max_verify_retries = 1

            [sanity]
            timeout_secs = 15
            expected_status = 204
        "#;

        let config: OrchestratorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.feature_loop.max_verify_retries, 1);
        assert_eq!(config.sanity.timeout_secs, 15);
        assert_eq!(config.sanity.expected_status, 204);
        assert_eq!(config.max_advance_attempts, 6);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: OrchestratorConfig = toml::from_str("[sanity]\ntimeout_secs = 2\n").unwrap();
        assert_eq!(config.sanity.timeout_secs, 2);
        assert_eq!(config.sanity.expected_status, 200);
        assert_eq!(config.feature_loop.max_verify_retries, 2);
    }
}
