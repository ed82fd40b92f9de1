use airi_core::config::RouterConfig;
use airi_core::StructuredResponse;
use tracing::debug;

use crate::catalog::Catalog;
use crate::rules::{build_table, default_rules, Rule};

/// First-match-wins router over a priority-ordered rule table.
///
/// Built once at startup and shared read-only between requests.
#[derive(Debug, Clone)]
pub struct RuleRouter {
    rules: Vec<Rule>,
    catalog: Catalog,
}

impl Default for RuleRouter {
    fn default() -> Self {
        Self::from_config(&RouterConfig::default())
    }
}

impl RuleRouter {
    /// Build from the built-in tables adjusted by `config`.
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            rules: build_table(default_rules(), &config.rules),
            catalog: Catalog::from_config(config),
        }
    }

    /// Build from an explicit rule list and catalog. The list is sorted
    /// here, so definition order only matters for equal priorities.
    pub fn with_rules(rules: Vec<Rule>, catalog: Catalog) -> Self {
        Self {
            rules: build_table(rules, &[]),
            catalog,
        }
    }

    /// Route an utterance. `None` means no rule matched.
    pub fn route(&self, text: &str) -> Option<StructuredResponse> {
        let lower = text.to_lowercase();
        let rule = self.rules.iter().find(|rule| rule.matches(&lower))?;
        let resp = rule.respond(text, &lower, &self.catalog);
        debug!(rule = %rule.name, intent = %resp.intent, "Rule matched");
        Some(resp)
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}
