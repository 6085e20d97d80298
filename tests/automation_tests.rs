//! Integration tests for the automation engine.
//!
//! Rules come from an in-memory source unless a test needs the database.

use anyhow::anyhow;
use async_trait::async_trait;
use kanban_board::automation::{
    AutomationEngine, AutomationError, EngineLimits, ExecutionCache, RuleSource,
};
use kanban_board::db::Database;
use kanban_board::types::{AutomationRule, RuleInput};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn rule(id: &str, user_id: &str, regex: &str, template: &str) -> AutomationRule {
    AutomationRule {
        id: id.to_string(),
        name: id.to_string(),
        regex: regex.to_string(),
        link_template: template.to_string(),
        user_id: user_id.to_string(),
        created_at: 0,
        updated_at: 0,
    }
}

/// Fixed rule list that counts how often it is asked.
struct StaticRules {
    rules: Vec<AutomationRule>,
    calls: AtomicUsize,
}

impl StaticRules {
    fn new(rules: Vec<AutomationRule>) -> Arc<Self> {
        Arc::new(Self {
            rules,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl RuleSource for StaticRules {
    async fn rules_for_user(&self, user_id: &str) -> anyhow::Result<Vec<AutomationRule>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rules
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// Returns every rule regardless of the requested user.
struct LeakyRules(Vec<AutomationRule>);

#[async_trait]
impl RuleSource for LeakyRules {
    async fn rules_for_user(&self, _user_id: &str) -> anyhow::Result<Vec<AutomationRule>> {
        Ok(self.0.clone())
    }
}

struct FailingRules;

#[async_trait]
impl RuleSource for FailingRules {
    async fn rules_for_user(&self, _user_id: &str) -> anyhow::Result<Vec<AutomationRule>> {
        Err(anyhow!("connection refused"))
    }
}

fn github_and_jira() -> Vec<AutomationRule> {
    vec![
        rule(
            "r1",
            "u1",
            r"#(\d+)",
            "https://github.com/user/repo/issues/$1",
        ),
        rule(
            "r2",
            "u1",
            r"([A-Z]+-\d+)",
            "https://jira.company.com/browse/$1",
        ),
    ]
}

fn engine_with(source: Arc<dyn RuleSource>, capacity: usize) -> AutomationEngine {
    AutomationEngine::new(source, Arc::new(ExecutionCache::new(capacity)))
}

mod execution_tests {
    use super::*;

    #[tokio::test]
    async fn generates_links_once_per_content() {
        let engine = engine_with(StaticRules::new(github_and_jira()), 100);
        let content = "Fix bug #123 and PROJ-456";

        let first = engine.execute(content, "u1", &[]).await.unwrap();
        assert_eq!(
            first,
            vec![
                "https://github.com/user/repo/issues/123".to_string(),
                "https://jira.company.com/browse/PROJ-456".to_string(),
            ]
        );

        let second = engine.execute(content, "u1", &[]).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn issue_and_jira_rules_fire_once() {
        let engine = engine_with(
            StaticRules::new(vec![
                rule(
                    "github",
                    "u1",
                    r"#(\d+)",
                    "https://github.com/user/repo/issues/$1",
                ),
                rule(
                    "jira",
                    "u1",
                    r"JIRA-(\d+)",
                    "https://company.atlassian.net/browse/JIRA-$1",
                ),
            ]),
            2,
        );
        let content = "Fix issue #123 and JIRA-456";

        assert_eq!(
            engine.execute(content, "u1", &[]).await.unwrap(),
            vec![
                "https://github.com/user/repo/issues/123".to_string(),
                "https://company.atlassian.net/browse/JIRA-456".to_string(),
            ]
        );
        assert!(engine.execute(content, "u1", &[]).await.unwrap().is_empty());

        engine.execute("Fix issue #1", "u1", &[]).await.unwrap();
        engine.execute("Fix issue #2", "u1", &[]).await.unwrap();
        assert_eq!(engine.execute(content, "u1", &[]).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn different_content_fires_again() {
        let engine = engine_with(StaticRules::new(github_and_jira()), 100);

        engine.execute("Fix #1", "u1", &[]).await.unwrap();
        let links = engine.execute("Fix #2", "u1", &[]).await.unwrap();

        assert_eq!(links, vec!["https://github.com/user/repo/issues/2".to_string()]);
    }

    #[tokio::test]
    async fn clearing_user_cache_lets_rules_fire_again() {
        let engine = engine_with(StaticRules::new(github_and_jira()), 100);
        let content = "Fix bug #123 and PROJ-456";

        assert_eq!(engine.execute(content, "u1", &[]).await.unwrap().len(), 2);
        engine.clear_user_cache("u1");
        assert_eq!(engine.execute(content, "u1", &[]).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn clearing_all_caches_resets_every_user() {
        let source = StaticRules::new(vec![
            rule("a", "u1", r"#(\d+)", "https://a/$1"),
            rule("b", "u2", r"#(\d+)", "https://b/$1"),
        ]);
        let engine = engine_with(source, 100);

        engine.execute("#7", "u1", &[]).await.unwrap();
        engine.execute("#7", "u2", &[]).await.unwrap();
        assert_eq!(engine.cache().len(), 2);

        engine.clear_all_cache();
        assert!(engine.cache().is_empty());
        assert_eq!(
            engine.execute("#7", "u2", &[]).await.unwrap(),
            vec!["https://b/7".to_string()]
        );
    }

    #[tokio::test]
    async fn invalid_pattern_does_not_block_other_rules() {
        let source = StaticRules::new(vec![
            rule("broken", "u1", "(unclosed", "https://never/$0"),
            rule("ok", "u1", r"#(\d+)", "https://ok/$1"),
        ]);
        let engine = engine_with(source, 100);

        let links = engine.execute("see #5", "u1", &[]).await.unwrap();

        assert_eq!(links, vec!["https://ok/5".to_string()]);
        assert!(!engine.cache().was_executed("u1", "see #5", "broken"));
        assert!(engine.cache().was_executed("u1", "see #5", "ok"));
    }

    #[tokio::test]
    async fn existing_link_is_suppressed_and_not_recorded() {
        let engine = engine_with(StaticRules::new(github_and_jira()), 100);
        let existing = vec!["https://github.com/user/repo/issues/9".to_string()];

        let links = engine.execute("Fix #9", "u1", &existing).await.unwrap();
        assert!(links.is_empty());
        assert!(!engine.cache().was_executed("u1", "Fix #9", "r1"));

        // Once the link is gone from the task, the rule can still fire.
        let links = engine.execute("Fix #9", "u1", &[]).await.unwrap();
        assert_eq!(links, existing);
    }

    #[tokio::test]
    async fn duplicate_links_within_one_call_are_dropped() {
        let source = StaticRules::new(vec![
            rule("first", "u1", r"#(\d+)", "https://gh/$1"),
            rule("second", "u1", r"issue #(\d+)", "https://gh/$1"),
        ]);
        let engine = engine_with(source, 100);

        let links = engine.execute("issue #3", "u1", &[]).await.unwrap();

        assert_eq!(links, vec!["https://gh/3".to_string()]);
        assert!(engine.cache().was_executed("u1", "issue #3", "first"));
        assert!(!engine.cache().was_executed("u1", "issue #3", "second"));
    }

    #[tokio::test]
    async fn only_first_match_is_used() {
        let engine = engine_with(StaticRules::new(github_and_jira()), 100);

        let links = engine.execute("#1 then #2", "u1", &[]).await.unwrap();

        assert_eq!(links, vec!["https://github.com/user/repo/issues/1".to_string()]);
    }

    #[tokio::test]
    async fn whole_match_and_missing_groups_expand() {
        let source = StaticRules::new(vec![
            rule("whole", "u1", r"[A-Z]+-\d+", "https://jira/$0"),
            rule("gap", "u1", r"v(\d+)", "https://rel/$1/$2"),
        ]);
        let engine = engine_with(source, 100);

        let links = engine.execute("ABC-1 in v2", "u1", &[]).await.unwrap();

        assert_eq!(
            links,
            vec!["https://jira/ABC-1".to_string(), "https://rel/2/".to_string()]
        );
    }

    #[tokio::test]
    async fn no_match_generates_nothing() {
        let engine = engine_with(StaticRules::new(github_and_jira()), 100);

        let links = engine.execute("nothing to see", "u1", &[]).await.unwrap();

        assert!(links.is_empty());
        assert!(engine.cache().is_empty());
    }

    #[tokio::test]
    async fn user_without_rules_gets_nothing() {
        let engine = engine_with(StaticRules::new(github_and_jira()), 100);

        let links = engine.execute("Fix #1", "someone-else", &[]).await.unwrap();

        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn rules_of_other_users_are_ignored() {
        let source = Arc::new(LeakyRules(vec![
            rule("mine", "u1", r"#(\d+)", "https://mine/$1"),
            rule("theirs", "u2", r"#(\d+)", "https://theirs/$1"),
        ]));
        let engine = engine_with(source, 100);

        let links = engine.execute("#4", "u1", &[]).await.unwrap();

        assert_eq!(links, vec!["https://mine/4".to_string()]);
    }

    #[tokio::test]
    async fn same_content_is_independent_per_user() {
        let source = StaticRules::new(vec![
            rule("a", "u1", r"#(\d+)", "https://a/$1"),
            rule("b", "u2", r"#(\d+)", "https://b/$1"),
        ]);
        let engine = engine_with(source, 100);

        assert_eq!(engine.execute("#1", "u1", &[]).await.unwrap().len(), 1);
        assert_eq!(engine.execute("#1", "u2", &[]).await.unwrap().len(), 1);

        engine.clear_user_cache("u1");
        assert_eq!(engine.execute("#1", "u1", &[]).await.unwrap().len(), 1);
        assert!(engine.execute("#1", "u2", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rule_store_failure_is_reported_and_cache_untouched() {
        let cache = Arc::new(ExecutionCache::new(10));
        cache.record_executed("u1", "Fix #1", "r1");
        let engine = AutomationEngine::new(Arc::new(FailingRules), Arc::clone(&cache));

        let err = engine.execute("Fix #1", "u1", &[]).await.unwrap_err();

        assert!(matches!(err, AutomationError::RuleStore { ref user_id, .. } if user_id == "u1"));
        assert_eq!(cache.len(), 1);
        assert!(cache.was_executed("u1", "Fix #1", "r1"));
    }

    #[tokio::test]
    async fn rules_are_fetched_on_every_call() {
        let source = StaticRules::new(github_and_jira());
        let engine = engine_with(source.clone(), 100);

        engine.execute("Fix #1", "u1", &[]).await.unwrap();
        engine.execute("Fix #1", "u1", &[]).await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}

mod forget_tests {
    use super::*;

    #[tokio::test]
    async fn tracked_execution_reports_fired_rules() {
        let engine = engine_with(StaticRules::new(github_and_jira()), 100);

        let generated = engine
            .execute_tracked("Fix #7", "u1", &[])
            .await
            .unwrap();

        assert_eq!(
            generated.links,
            vec!["https://github.com/user/repo/issues/7".to_string()]
        );
        assert_eq!(generated.fired_rules, vec!["r1".to_string()]);
    }

    #[tokio::test]
    async fn forgotten_links_fire_again() {
        let cache = Arc::new(ExecutionCache::new(100));
        let engine = AutomationEngine::new(
            StaticRules::new(github_and_jira()),
            Arc::clone(&cache),
        );
        let content = "Fix bug #123 and PROJ-456";

        let generated = engine.execute_tracked(content, "u1", &[]).await.unwrap();
        assert_eq!(generated.links.len(), 2);
        assert!(cache.was_executed("u1", content, "r1"));

        engine.forget("u1", content, &generated);

        assert!(!cache.was_executed("u1", content, "r1"));
        assert!(cache.is_empty());
        assert_eq!(engine.execute(content, "u1", &[]).await.unwrap(), generated.links);
    }

    #[tokio::test]
    async fn forget_keeps_earlier_records() {
        let cache = Arc::new(ExecutionCache::new(100));
        let engine = AutomationEngine::new(
            StaticRules::new(github_and_jira()),
            Arc::clone(&cache),
        );
        let content = "Fix bug #123 and PROJ-456";
        cache.record_executed("u1", content, "r1");

        let generated = engine.execute_tracked(content, "u1", &[]).await.unwrap();
        assert_eq!(generated.fired_rules, vec!["r2".to_string()]);

        engine.forget("u1", content, &generated);

        assert!(cache.was_executed("u1", content, "r1"));
        assert!(!cache.was_executed("u1", content, "r2"));
    }
}

mod limit_tests {
    use super::*;

    #[tokio::test]
    async fn evicted_content_can_fire_again() {
        let engine = engine_with(StaticRules::new(github_and_jira()), 2);

        assert_eq!(engine.execute("#1", "u1", &[]).await.unwrap().len(), 1);
        assert_eq!(engine.execute("#2", "u1", &[]).await.unwrap().len(), 1);
        assert_eq!(engine.execute("#3", "u1", &[]).await.unwrap().len(), 1);
        assert_eq!(engine.cache().len(), 2);

        // "#1" was the oldest key and has been evicted.
        assert_eq!(engine.execute("#1", "u1", &[]).await.unwrap().len(), 1);
        // "#3" is still remembered.
        assert!(engine.execute("#3", "u1", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_content_is_not_evaluated() {
        let limits = EngineLimits {
            max_content_bytes: 16,
            ..Default::default()
        };
        let engine = engine_with(StaticRules::new(github_and_jira()), 100).with_limits(limits);

        let long = format!("{} #1", "x".repeat(32));
        assert!(engine.execute(&long, "u1", &[]).await.unwrap().is_empty());
        assert!(engine.cache().is_empty());

        assert_eq!(engine.execute("#1", "u1", &[]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn overlong_pattern_is_skipped() {
        let limits = EngineLimits {
            max_pattern_len: 8,
            ..Default::default()
        };
        let source = StaticRules::new(vec![
            rule("long", "u1", r"(?:#)(\d+)(?:\b)", "https://long/$1"),
            rule("short", "u1", r"#(\d+)", "https://short/$1"),
        ]);
        let engine = engine_with(source, 100).with_limits(limits);

        let links = engine.execute("#6", "u1", &[]).await.unwrap();

        assert_eq!(links, vec!["https://short/6".to_string()]);
    }
}

mod database_source_tests {
    use super::*;

    fn input(name: &str, regex: &str, template: &str) -> RuleInput {
        RuleInput {
            name: name.to_string(),
            regex: regex.to_string(),
            link_template: template.to_string(),
        }
    }

    #[tokio::test]
    async fn database_rules_run_in_name_order() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.create_rule("u1", &input("zeta", r"#(\d+)", "https://z/$1"))
            .unwrap();
        db.create_rule("u1", &input("alpha", r"#(\d+)", "https://a/$1"))
            .unwrap();
        db.create_rule("u2", &input("other", r"#(\d+)", "https://o/$1"))
            .unwrap();

        let engine = engine_with(db.clone(), 100);
        let links = engine.execute("#8", "u1", &[]).await.unwrap();

        assert_eq!(
            links,
            vec!["https://a/8".to_string(), "https://z/8".to_string()]
        );
    }

    #[tokio::test]
    async fn edited_rule_fires_after_cache_clear() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let rule = db
            .create_rule("u1", &input("gh", r"#(\d+)", "https://old/$1"))
            .unwrap();
        let engine = engine_with(db.clone(), 100);

        assert_eq!(
            engine.execute("#1", "u1", &[]).await.unwrap(),
            vec!["https://old/1".to_string()]
        );

        db.update_rule("u1", &rule.id, &input("gh", r"#(\d+)", "https://new/$1"))
            .unwrap()
            .unwrap();
        assert!(engine.execute("#1", "u1", &[]).await.unwrap().is_empty());

        engine.clear_user_cache("u1");
        assert_eq!(
            engine.execute("#1", "u1", &[]).await.unwrap(),
            vec!["https://new/1".to_string()]
        );
    }
}
