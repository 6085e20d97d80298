//! Core types for the kanban board.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a stored priority string. Unknown values fall back to medium.
pub fn parse_priority(s: &str) -> Priority {
    match s.to_lowercase().as_str() {
        "low" => Priority::Low,
        "high" => Priority::High,
        _ => Priority::Medium,
    }
}

/// A user-defined rule that turns regex matches in task text into links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: String,
    pub name: String,
    pub regex: String,
    pub link_template: String,
    pub user_id: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

/// Fields accepted when creating or replacing a rule.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub regex: String,
    #[serde(default)]
    pub link_template: String,
}

/// A board column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub position: i64,
    pub hidden: bool,
    pub created_at: i64,
}

/// Partial column update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColumnUpdate {
    pub title: Option<String>,
    pub hidden: Option<bool>,
}

impl ColumnUpdate {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.hidden.is_none()
    }
}

/// A column together with its tasks, as returned by the board view.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnWithTasks {
    #[serde(flatten)]
    pub column: Column,
    pub tasks: Vec<Task>,
}

/// A task card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub column_id: String,
    pub user_id: String,
    pub content: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub due_date: Option<String>,
    pub position: i64,
    pub links: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields for a new task. `links` are the user-submitted links.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    #[serde(default)]
    pub column_id: String,
    #[serde(default)]
    pub content: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub due_date: Option<String>,
    pub links: Option<Vec<String>>,
}

/// Partial task update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
    pub content: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<String>,
    pub tags: Option<Vec<String>>,
    pub links: Option<Vec<String>>,
}

impl TaskUpdate {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.tags.is_none()
            && self.links.is_none()
    }
}
