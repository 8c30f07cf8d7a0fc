//! Runtime configuration
//!
//! Every field is optional in JSON and falls back to the documented default.

use serde::{Deserialize, Serialize};

use crate::core::registry::DEFAULT_RETIRED_LIMIT;
use crate::core::scheduler::EffectPolicy;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Rescheduling policy of deferred effects (default: replace)
    pub effect_policy: EffectPolicy,
    /// Report invocations on unmounted blocks as stale registrations rather
    /// than missing methods (default: true)
    pub strict_lifecycle: bool,
    /// Prefix of generated class names (default: "lf")
    pub css_prefix: String,
    /// `handle` renders only when something changed (default: false, always render)
    pub render_only_when_dirty: bool,
    /// Unmounted block ids remembered for stale-registration reports (default: 1024)
    pub retired_limit: usize,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_effect_policy(mut self, policy: EffectPolicy) -> Self {
        self.effect_policy = policy;
        self
    }

    pub fn with_strict_lifecycle(mut self, strict: bool) -> Self {
        self.strict_lifecycle = strict;
        self
    }

    pub fn with_css_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.css_prefix = prefix.into();
        self
    }

    pub fn with_render_only_when_dirty(mut self, enabled: bool) -> Self {
        self.render_only_when_dirty = enabled;
        self
    }

    pub fn with_retired_limit(mut self, limit: usize) -> Self {
        self.retired_limit = limit;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            effect_policy: EffectPolicy::Replace,
            strict_lifecycle: true,
            css_prefix: "lf".into(),
            render_only_when_dirty: false,
            retired_limit: DEFAULT_RETIRED_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = RuntimeConfig::from_json("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert!(config.strict_lifecycle);
        assert_eq!(config.effect_policy, EffectPolicy::Replace);
    }

    #[test]
    fn test_partial_json() {
        let config = RuntimeConfig::from_json(
            r#"{ "effectPolicy": "queue", "cssPrefix": "app", "retiredLimit": 16 }"#,
        )
        .unwrap();
        assert_eq!(config.effect_policy, EffectPolicy::Queue);
        assert_eq!(config.css_prefix, "app");
        assert_eq!(config.retired_limit, 16);
        assert!(config.strict_lifecycle);
    }

    #[test]
    fn test_builder() {
        let config = RuntimeConfig::new()
            .with_strict_lifecycle(false)
            .with_render_only_when_dirty(true);
        assert!(!config.strict_lifecycle);
        assert!(config.render_only_when_dirty);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        assert!(RuntimeConfig::from_json(r#"{ "effectPolicy": "sometimes" }"#).is_err());
    }
}
