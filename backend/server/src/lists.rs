use rusqlite::{OptionalExtension, Row, params};
use serde::Serialize;
use tracing::debug;

use crate::{database::Store, error::AppError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct List {
    pub id: i64,
    pub name: String,
    pub last_used: f64,
}

impl List {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            last_used: row.get("last_used")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewList {
    pub id: i64,
    pub name: String,
}

impl Store {
    pub fn lists(&self) -> Result<Vec<List>, AppError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, last_used FROM lists")?;

        let lists = stmt
            .query_map([], List::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(lists)
    }

    pub fn list(&self, id: i64) -> Result<List, AppError> {
        self.conn
            .query_row(
                "SELECT id, name, last_used FROM lists WHERE id = ?1",
                [id],
                List::from_row,
            )
            .optional()?
            .ok_or(AppError::NotFound("List"))
    }

    /// An empty or missing name becomes `List {n + 1}`. Count and insert are
    /// separate statements, two concurrent creates can pick the same name.
    pub fn create_list(&self, name: Option<String>, last_used: f64) -> Result<NewList, AppError> {
        let name = match name.filter(|name| !name.is_empty()) {
            Some(name) => name,
            None => {
                let count: i64 = self
                    .conn
                    .query_row("SELECT COUNT(*) FROM lists", [], |row| row.get(0))?;
                format!("List {}", count + 1)
            }
        };

        self.conn.execute(
            "INSERT INTO lists (name, last_used) VALUES (?1, ?2)",
            params![name, last_used],
        )?;
        let id = self.conn.last_insert_rowid();

        debug!("Created list {id} ({name})");
        Ok(NewList { id, name })
    }

    /// Unconditional, an unknown id is a no-op.
    pub fn update_list(&self, id: i64, name: &str, last_used: f64) -> Result<(), AppError> {
        let changed = self.conn.execute(
            "UPDATE lists SET name = ?1, last_used = ?2 WHERE id = ?3",
            params![name, last_used, id],
        )?;

        debug!("Updated list {id}, {changed} row(s)");
        Ok(())
    }

    pub fn delete_list(&self, id: i64) -> Result<(), AppError> {
        let changed = self.conn.execute("DELETE FROM lists WHERE id = ?1", [id])?;

        debug!("Deleted list {id}, {changed} row(s)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    #[test]
    fn test_default_names_count_up() {
        let store = store();

        let names: Vec<String> = (0..3)
            .map(|_| store.create_list(None, 1.0).unwrap().name)
            .collect();

        assert_eq!(names, ["List 1", "List 2", "List 3"]);
    }

    #[test]
    fn test_empty_name_gets_default() {
        let store = store();
        store.create_list(Some("Verbs".to_string()), 1.0).unwrap();

        let created = store.create_list(Some(String::new()), 1.0).unwrap();

        assert_eq!(created.name, "List 2");
    }

    #[test]
    fn test_create_then_get() {
        let store = store();

        let created = store
            .create_list(Some("Animals".to_string()), 1_700_000_000.5)
            .unwrap();
        let list = store.list(created.id).unwrap();

        assert_eq!(
            list,
            List {
                id: created.id,
                name: "Animals".to_string(),
                last_used: 1_700_000_000.5,
            }
        );
    }

    #[test]
    fn test_whole_second_timestamp_reads_back() {
        let store = store();

        let created = store.create_list(None, 1_700_000_000.0).unwrap();

        assert_eq!(store.list(created.id).unwrap().last_used, 1_700_000_000.0);
    }

    #[test]
    fn test_missing_list() {
        let store = store();

        assert!(matches!(store.list(42), Err(AppError::NotFound("List"))));
    }

    #[test]
    fn test_ids_are_monotonic() {
        let store = store();

        let first = store.create_list(None, 1.0).unwrap();
        store.delete_list(first.id).unwrap();
        let second = store.create_list(None, 1.0).unwrap();

        assert!(second.id > first.id);
    }

    #[test]
    fn test_update_list() {
        let store = store();
        let created = store.create_list(None, 1.0).unwrap();

        store.update_list(created.id, "Renamed", 2.0).unwrap();

        let list = store.list(created.id).unwrap();
        assert_eq!(list.name, "Renamed");
        assert_eq!(list.last_used, 2.0);
    }

    #[test]
    fn test_update_missing_list_is_noop() {
        let store = store();

        store.update_list(99, "Ghost", 1.0).unwrap();

        assert!(store.lists().unwrap().is_empty());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = store();
        let created = store.create_list(None, 1.0).unwrap();

        store.delete_list(created.id).unwrap();
        store.delete_list(created.id).unwrap();

        assert!(store.lists().unwrap().is_empty());
    }
}
