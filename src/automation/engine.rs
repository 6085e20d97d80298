//! Rule execution.

use super::cache::ExecutionCache;
use super::template::expand_template;
use crate::types::AutomationRule;
use async_trait::async_trait;
use regex_lite::Regex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default maximum length of a rule pattern, in bytes.
pub const DEFAULT_MAX_PATTERN_LEN: usize = 1024;

/// Default maximum size of task text evaluated against rules, in bytes.
pub const DEFAULT_MAX_CONTENT_BYTES: usize = 64 * 1024;

/// Errors raised while evaluating automation rules.
///
/// Only `RuleStore` ever reaches callers of [`AutomationEngine::execute`];
/// pattern errors are logged and the offending rule is skipped.
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("failed to load automation rules for user {user_id}: {source}")]
    RuleStore {
        user_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("rule {rule_id} has an invalid pattern: {source}")]
    InvalidPattern {
        rule_id: String,
        #[source]
        source: regex_lite::Error,
    },

    #[error("rule {rule_id} pattern is {len} bytes, limit is {limit}")]
    PatternTooLong {
        rule_id: String,
        len: usize,
        limit: usize,
    },
}

/// Read access to a user's automation rules.
#[async_trait]
pub trait RuleSource: Send + Sync {
    /// All rules owned by `user_id`, in a stable order (by name).
    async fn rules_for_user(&self, user_id: &str) -> anyhow::Result<Vec<AutomationRule>>;
}

#[async_trait]
impl<T: RuleSource + ?Sized> RuleSource for Arc<T> {
    async fn rules_for_user(&self, user_id: &str) -> anyhow::Result<Vec<AutomationRule>> {
        (**self).rules_for_user(user_id).await
    }
}

/// Input bounds applied to user-supplied patterns and task text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    pub max_pattern_len: usize,
    pub max_content_bytes: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_pattern_len: DEFAULT_MAX_PATTERN_LEN,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
        }
    }
}

/// Compile a rule's pattern, enforcing the pattern length limit.
pub fn compile_rule(rule: &AutomationRule, limits: &EngineLimits) -> Result<Regex, AutomationError> {
    if rule.regex.len() > limits.max_pattern_len {
        return Err(AutomationError::PatternTooLong {
            rule_id: rule.id.clone(),
            len: rule.regex.len(),
            limit: limits.max_pattern_len,
        });
    }
    Regex::new(&rule.regex).map_err(|source| AutomationError::InvalidPattern {
        rule_id: rule.id.clone(),
        source,
    })
}

/// Links produced by one evaluation and the rules that fired to produce them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedLinks {
    pub links: Vec<String>,
    pub fired_rules: Vec<String>,
}

impl GeneratedLinks {
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Evaluates a user's rules against task text, firing each rule at most
/// once per `(user, content)` until the cache is invalidated.
#[derive(Clone)]
pub struct AutomationEngine {
    source: Arc<dyn RuleSource>,
    cache: Arc<ExecutionCache>,
    limits: EngineLimits,
}

impl AutomationEngine {
    pub fn new(source: Arc<dyn RuleSource>, cache: Arc<ExecutionCache>) -> Self {
        Self {
            source,
            cache,
            limits: EngineLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: EngineLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn cache(&self) -> &Arc<ExecutionCache> {
        &self.cache
    }

    pub fn limits(&self) -> &EngineLimits {
        &self.limits
    }

    /// Generate links for `content` from the rules of `user_id`.
    ///
    /// Returns only links produced by rules that have not already fired for
    /// this exact content, skipping any link already in `existing_links` or
    /// produced earlier in the same call. Rules are evaluated in the order the
    /// rule source returns them and each uses its first match only.
    ///
    /// Fails only when the rules cannot be loaded; the cache is untouched in
    /// that case.
    pub async fn execute(
        &self,
        content: &str,
        user_id: &str,
        existing_links: &[String],
    ) -> Result<Vec<String>, AutomationError> {
        Ok(self
            .execute_tracked(content, user_id, existing_links)
            .await?
            .links)
    }

    /// Like [`execute`](Self::execute), also returning the ids of the rules
    /// that fired so a caller can [`forget`](Self::forget) them if the links
    /// are never saved.
    pub async fn execute_tracked(
        &self,
        content: &str,
        user_id: &str,
        existing_links: &[String],
    ) -> Result<GeneratedLinks, AutomationError> {
        let rules = self
            .source
            .rules_for_user(user_id)
            .await
            .map_err(|source| AutomationError::RuleStore {
                user_id: user_id.to_string(),
                source,
            })?;

        let mut generated = GeneratedLinks::default();
        if rules.is_empty() {
            return Ok(generated);
        }

        if content.len() > self.limits.max_content_bytes {
            debug!(
                user_id = %user_id,
                content_bytes = content.len(),
                limit = self.limits.max_content_bytes,
                "Content too large for automation, skipping rules"
            );
            return Ok(generated);
        }

        for rule in &rules {
            if rule.user_id != user_id {
                warn!(rule_id = %rule.id, user_id = %user_id, "Ignoring rule owned by another user");
                continue;
            }

            if self.cache.was_executed(user_id, content, &rule.id) {
                debug!(rule_id = %rule.id, "Rule already executed for this content, skipping");
                continue;
            }

            let regex = match compile_rule(rule, &self.limits) {
                Ok(regex) => regex,
                Err(e) => {
                    warn!(rule_id = %rule.id, error = %e, "Skipping automation rule");
                    continue;
                }
            };

            let Some(caps) = regex.captures(content) else {
                continue;
            };

            let link = expand_template(&rule.link_template, &caps);
            if link.is_empty() {
                debug!(rule_id = %rule.id, "Rule template expanded to an empty link, skipping");
                continue;
            }
            if existing_links.contains(&link) || generated.links.contains(&link) {
                debug!(rule_id = %rule.id, link = %link, "Generated link already present");
                continue;
            }

            self.cache.record_executed(user_id, content, &rule.id);
            info!(rule_id = %rule.id, link = %link, "Automation rule generated link");
            generated.links.push(link);
            generated.fired_rules.push(rule.id.clone());
        }

        Ok(generated)
    }

    /// Clear the execution records behind `generated` so those rules can fire
    /// again for `content`.
    pub fn forget(&self, user_id: &str, content: &str, generated: &GeneratedLinks) {
        self.cache.forget(user_id, content, &generated.fired_rules);
        debug!(user_id = %user_id, rules = generated.fired_rules.len(), "Forgot unsaved automation results");
    }

    /// Forget what has fired for `user_id`. Call after any change to that
    /// user's rules.
    pub fn clear_user_cache(&self, user_id: &str) {
        let removed = self.cache.invalidate_user(user_id);
        debug!(user_id = %user_id, removed, "Cleared automation cache for user");
    }

    /// Forget everything that has fired.
    pub fn clear_all_cache(&self) {
        self.cache.invalidate_all();
        info!("Cleared automation cache");
    }
}
