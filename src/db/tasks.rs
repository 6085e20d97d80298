//! Task CRUD.

use super::columns::get_column_internal;
use super::{Database, now_ms, parse_string_list};
use crate::types::{NewTask, Task, TaskUpdate, parse_priority};
use anyhow::{Result, anyhow};
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let priority: String = row.get("priority")?;
    let tags_json: Option<String> = row.get("tags")?;
    let links_json: Option<String> = row.get("links")?;

    Ok(Task {
        id: row.get("id")?,
        column_id: row.get("column_id")?,
        user_id: row.get("user_id")?,
        content: row.get("content")?,
        description: row.get("description")?,
        priority: parse_priority(&priority),
        tags: parse_string_list(tags_json),
        due_date: row.get("due_date")?,
        position: row.get("position")?,
        links: parse_string_list(links_json),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
fn get_task_internal(conn: &Connection, user_id: &str, task_id: &str) -> Result<Option<Task>> {
    let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1 AND user_id = ?2")?;

    match stmt.query_row(params![task_id, user_id], parse_task_row) {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    /// Create a task at the end of its column.
    ///
    /// `links` is stored as given; callers merge in generated links first.
    /// Returns `None` if the column does not exist or belongs to another user.
    pub fn create_task(
        &self,
        user_id: &str,
        input: &NewTask,
        links: Vec<String>,
    ) -> Result<Option<Task>> {
        let id = Uuid::now_v7().to_string();
        let now = now_ms();
        let priority = input.priority.unwrap_or_default();
        let tags = input.tags.clone().unwrap_or_default();
        let tags_json = serde_json::to_string(&tags)?;
        let links_json = serde_json::to_string(&links)?;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if get_column_internal(&tx, user_id, &input.column_id)?.is_none() {
                return Ok(None);
            }

            let position: i64 = tx.query_row(
                "SELECT COALESCE(MAX(position), -1) + 1 FROM tasks
                 WHERE column_id = ?1 AND user_id = ?2",
                params![&input.column_id, user_id],
                |row| row.get(0),
            )?;

            tx.execute(
                "INSERT INTO tasks (
                    id, column_id, user_id, content, description, priority,
                    tags, due_date, position, links, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    &id,
                    &input.column_id,
                    user_id,
                    &input.content,
                    &input.description,
                    priority.as_str(),
                    tags_json,
                    &input.due_date,
                    position,
                    links_json,
                    now,
                    now,
                ],
            )?;

            tx.commit()?;

            Ok(Some(Task {
                id,
                column_id: input.column_id.clone(),
                user_id: user_id.to_string(),
                content: input.content.clone(),
                description: input.description.clone(),
                priority,
                tags,
                due_date: input.due_date.clone(),
                position,
                links,
                created_at: now,
                updated_at: now,
            }))
        })
    }

    /// Get a task, only if it belongs to `user_id`.
    pub fn get_task(&self, user_id: &str, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, user_id, task_id))
    }

    /// Apply the fields set in `update`. Returns `None` if the task does not
    /// exist or belongs to another user.
    pub fn update_task(
        &self,
        user_id: &str,
        task_id: &str,
        update: &TaskUpdate,
    ) -> Result<Option<Task>> {
        if update.is_empty() {
            return Err(anyhow!("No fields to update"));
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ref content) = update.content {
            sets.push("content = ?");
            values.push(Box::new(content.clone()));
        }
        if let Some(ref description) = update.description {
            sets.push("description = ?");
            values.push(Box::new(description.clone()));
        }
        if let Some(priority) = update.priority {
            sets.push("priority = ?");
            values.push(Box::new(priority.as_str()));
        }
        if let Some(ref due_date) = update.due_date {
            sets.push("due_date = ?");
            values.push(Box::new(due_date.clone()));
        }
        if let Some(ref tags) = update.tags {
            sets.push("tags = ?");
            values.push(Box::new(serde_json::to_string(tags)?));
        }
        if let Some(ref links) = update.links {
            sets.push("links = ?");
            values.push(Box::new(serde_json::to_string(links)?));
        }

        sets.push("updated_at = ?");
        values.push(Box::new(now_ms()));
        values.push(Box::new(task_id.to_string()));
        values.push(Box::new(user_id.to_string()));

        let sql = format!(
            "UPDATE tasks SET {} WHERE id = ? AND user_id = ?",
            sets.join(", ")
        );

        self.with_conn(|conn| {
            let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
            let changed = conn.execute(&sql, params.as_slice())?;
            if changed == 0 {
                return Ok(None);
            }
            get_task_internal(conn, user_id, task_id)
        })
    }

    /// Delete a task. Returns false if nothing was deleted.
    pub fn delete_task(&self, user_id: &str, task_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
                params![task_id, user_id],
            )?;
            Ok(deleted > 0)
        })
    }
}
