//! Board columns and the board view.

use super::tasks::parse_task_row;
use super::{Database, now_ms};
use crate::types::{Column, ColumnUpdate, ColumnWithTasks, Task};
use anyhow::Result;
use rusqlite::{Connection, Row, params};
use std::collections::HashMap;
use uuid::Uuid;

fn parse_column_row(row: &Row) -> rusqlite::Result<Column> {
    Ok(Column {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        position: row.get("position")?,
        hidden: row.get("hidden")?,
        created_at: row.get("created_at")?,
    })
}

/// Column lookup scoped to the owner, usable inside an open connection.
pub(crate) fn get_column_internal(
    conn: &Connection,
    user_id: &str,
    column_id: &str,
) -> Result<Option<Column>> {
    let mut stmt = conn.prepare("SELECT * FROM columns WHERE id = ?1 AND user_id = ?2")?;

    match stmt.query_row(params![column_id, user_id], parse_column_row) {
        Ok(column) => Ok(Some(column)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn next_column_position(conn: &Connection, user_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM columns WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )
}

impl Database {
    /// Create a column at the end of the user's board.
    pub fn create_column(&self, user_id: &str, title: &str) -> Result<Column> {
        let id = Uuid::now_v7().to_string();
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let position = next_column_position(&tx, user_id)?;

            tx.execute(
                "INSERT INTO columns (id, user_id, title, position, hidden, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                params![&id, user_id, title, position, now],
            )?;

            tx.commit()?;

            Ok(Column {
                id,
                user_id: user_id.to_string(),
                title: title.to_string(),
                position,
                hidden: false,
                created_at: now,
            })
        })
    }

    /// Get a column, only if it belongs to `user_id`.
    pub fn get_column(&self, user_id: &str, column_id: &str) -> Result<Option<Column>> {
        self.with_conn(|conn| get_column_internal(conn, user_id, column_id))
    }

    /// Give a user with no columns the `titles` columns, in order.
    /// Returns how many columns were created.
    pub fn seed_columns(&self, user_id: &str, titles: &[String]) -> Result<usize> {
        if titles.is_empty() {
            return Ok(0);
        }
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let existing: i64 = tx.query_row(
                "SELECT COUNT(*) FROM columns WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )?;
            if existing > 0 {
                return Ok(0);
            }

            for (position, title) in titles.iter().enumerate() {
                tx.execute(
                    "INSERT INTO columns (id, user_id, title, position, hidden, created_at)
                     VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                    params![Uuid::now_v7().to_string(), user_id, title, position as i64, now],
                )?;
            }

            tx.commit()?;
            Ok(titles.len())
        })
    }

    /// Rename and/or hide a column. Returns `None` if the column does not
    /// exist or belongs to another user.
    pub fn update_column(
        &self,
        user_id: &str,
        column_id: &str,
        update: &ColumnUpdate,
    ) -> Result<Option<Column>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE columns SET title = COALESCE(?1, title), hidden = COALESCE(?2, hidden)
                 WHERE id = ?3 AND user_id = ?4",
                params![&update.title, update.hidden, column_id, user_id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            get_column_internal(conn, user_id, column_id)
        })
    }

    /// Delete a column together with its tasks. Returns false if nothing was deleted.
    pub fn delete_column(&self, user_id: &str, column_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM columns WHERE id = ?1 AND user_id = ?2",
                params![column_id, user_id],
            )?;
            Ok(deleted > 0)
        })
    }

    /// All of a user's columns with their tasks, both ordered by position.
    pub fn get_board(&self, user_id: &str) -> Result<Vec<ColumnWithTasks>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM columns WHERE user_id = ?1 ORDER BY position ASC")?;
            let columns = stmt
                .query_map(params![user_id], parse_column_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut stmt = conn.prepare(
                "SELECT * FROM tasks WHERE user_id = ?1 ORDER BY position ASC, created_at ASC",
            )?;
            let tasks = stmt
                .query_map(params![user_id], parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut by_column: HashMap<String, Vec<Task>> = HashMap::new();
            for task in tasks {
                by_column.entry(task.column_id.clone()).or_default().push(task);
            }

            Ok(columns
                .into_iter()
                .map(|column| {
                    let tasks = by_column.remove(&column.id).unwrap_or_default();
                    ColumnWithTasks { column, tasks }
                })
                .collect())
        })
    }
}
