//! Automation rule storage.

use super::{Database, now_ms};
use crate::automation::RuleSource;
use crate::types::{AutomationRule, RuleInput};
use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{Row, params};
use uuid::Uuid;

fn parse_rule_row(row: &Row) -> rusqlite::Result<AutomationRule> {
    Ok(AutomationRule {
        id: row.get("id")?,
        name: row.get("name")?,
        regex: row.get("regex")?,
        link_template: row.get("link_template")?,
        user_id: row.get("user_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl Database {
    /// List a user's rules ordered by name (ties broken by id).
    pub fn list_rules(&self, user_id: &str) -> Result<Vec<AutomationRule>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM automation_rules WHERE user_id = ?1 ORDER BY name ASC, id ASC",
            )?;
            let rules = stmt
                .query_map(params![user_id], parse_rule_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rules)
        })
    }

    /// Get one rule, only if it belongs to `user_id`.
    pub fn get_rule(&self, user_id: &str, rule_id: &str) -> Result<Option<AutomationRule>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM automation_rules WHERE id = ?1 AND user_id = ?2")?;

            match stmt.query_row(params![rule_id, user_id], parse_rule_row) {
                Ok(rule) => Ok(Some(rule)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Create a rule for `user_id`.
    pub fn create_rule(&self, user_id: &str, input: &RuleInput) -> Result<AutomationRule> {
        let now = now_ms();
        let rule = AutomationRule {
            id: Uuid::now_v7().to_string(),
            name: input.name.clone(),
            regex: input.regex.clone(),
            link_template: input.link_template.clone(),
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO automation_rules (id, user_id, name, regex, link_template, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    &rule.id,
                    &rule.user_id,
                    &rule.name,
                    &rule.regex,
                    &rule.link_template,
                    rule.created_at,
                    rule.updated_at,
                ],
            )?;
            Ok(())
        })?;

        Ok(rule)
    }

    /// Replace a rule's fields. Returns `None` if the rule does not exist or
    /// belongs to another user.
    pub fn update_rule(
        &self,
        user_id: &str,
        rule_id: &str,
        input: &RuleInput,
    ) -> Result<Option<AutomationRule>> {
        let updated = self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE automation_rules SET name = ?1, regex = ?2, link_template = ?3, updated_at = ?4
                 WHERE id = ?5 AND user_id = ?6",
                params![
                    &input.name,
                    &input.regex,
                    &input.link_template,
                    now_ms(),
                    rule_id,
                    user_id,
                ],
            )?;
            Ok(changed > 0)
        })?;

        if !updated {
            return Ok(None);
        }
        self.get_rule(user_id, rule_id)
    }

    /// Delete a rule. Returns false if nothing was deleted.
    pub fn delete_rule(&self, user_id: &str, rule_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM automation_rules WHERE id = ?1 AND user_id = ?2",
                params![rule_id, user_id],
            )?;
            Ok(deleted > 0)
        })
    }
}

#[async_trait]
impl RuleSource for Database {
    async fn rules_for_user(&self, user_id: &str) -> Result<Vec<AutomationRule>> {
        self.list_rules(user_id)
    }
}
