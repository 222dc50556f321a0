// src/db/backend.rs

//! Shared handle to the persistent metadata backend
//!
//! A [`Backend`] wraps one SQLite connection behind a mutex and hands out
//! cheap clones. Every store instance that persists through the backend
//! holds a clone; the connection closes when the last clone drops. This
//! replaces ambient global state: ownership of the handle is explicit and
//! teardown is deterministic.
//!
//! Every write sequence runs inside a transaction. A failure mid-sequence
//! rolls the whole batch back; there is no partial row state to observe.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::db::schema;
use crate::error::{Error, Result};

/// Reference-counted handle to the metadata database
#[derive(Clone)]
pub struct Backend {
    conn: Arc<Mutex<Connection>>,
}

impl Backend {
    /// Open (or create) the backend database at `path` and bring its schema
    /// up to date.
    pub fn open(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "opening metadata backend");
        let conn = Connection::open(path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory backend, mainly for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of live handles sharing the underlying connection
    pub fn user_count(&self) -> usize {
        Arc::strong_count(&self.conn)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::InitError("metadata backend lock poisoned".to_string()))
    }

    /// Register a recipe, returning its key. Registration is atomic: either
    /// the row exists afterwards or nothing changed. Registering an already
    /// known recipe returns the existing key.
    pub fn register_recipe(&self, recipe: &str) -> Result<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT key FROM recipes WHERE recipe = ?1",
                [recipe],
                |row| row.get(0),
            )
            .optional()?;

        let key = match existing {
            Some(key) => key,
            None => {
                tx.execute("INSERT INTO recipes (recipe) VALUES (?1)", [recipe])?;
                tx.last_insert_rowid()
            }
        };

        tx.commit()?;
        debug!(recipe, key, "registered recipe");
        Ok(key)
    }

    /// Remove a recipe and, via cascade, everything stored under it
    pub fn remove_recipe(&self, recipe: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM recipes WHERE recipe = ?1", [recipe])?;
        Ok(removed > 0)
    }

    /// Insert one variable row under a recipe key
    pub fn insert_var(
        &self,
        recipe_key: i64,
        name: &str,
        value: &str,
        priority: i32,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO vars (recipe, priority, var, val) VALUES (?1, ?2, ?3, ?4)",
            params![recipe_key, priority, name, value],
        )?;
        Ok(())
    }

    /// Replace a recipe's variable rows with `rows` in one transaction
    pub fn store_vars(&self, recipe_key: i64, rows: &[(String, String, i32)]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM vars WHERE recipe = ?1", [recipe_key])?;
        for (name, value, priority) in rows {
            tx.execute(
                "INSERT INTO vars (recipe, priority, var, val) VALUES (?1, ?2, ?3, ?4)",
                params![recipe_key, priority, name, value],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Look up a variable for a recipe by name. Mirrors override precedence:
    /// rows are ordered by scope priority descending and the first match
    /// wins.
    pub fn lookup_var(&self, recipe: &str, name: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT val FROM vars
                 JOIN recipes ON vars.recipe = recipes.key
                 WHERE recipes.recipe = ?1 AND vars.var = ?2
                 ORDER BY vars.priority DESC LIMIT 1",
                params![recipe, name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Remove a variable's rows under a recipe key
    pub fn remove_var(&self, recipe_key: i64, name: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM vars WHERE recipe = ?1 AND var = ?2",
            params![recipe_key, name],
        )?;
        Ok(removed > 0)
    }

    /// Set a variable attribute, replacing any previous value in one
    /// statement
    pub fn insert_attr(
        &self,
        recipe_key: i64,
        name: &str,
        attr: &str,
        value: &str,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO attrs (recipe, var, attr, val) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(recipe, var, attr) DO UPDATE SET val = excluded.val",
            params![recipe_key, name, attr, value],
        )?;
        Ok(())
    }

    pub fn lookup_attr(
        &self,
        recipe_key: i64,
        name: &str,
        attr: &str,
    ) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT val FROM attrs WHERE recipe = ?1 AND var = ?2 AND attr = ?3",
                params![recipe_key, name, attr],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn remove_attr(&self, recipe_key: i64, name: &str, attr: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM attrs WHERE recipe = ?1 AND var = ?2 AND attr = ?3",
            params![recipe_key, name, attr],
        )?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_register_recipe_is_idempotent() {
        let backend = Backend::open_in_memory().unwrap();
        let key1 = backend.register_recipe("meta/core.recipe").unwrap();
        let key2 = backend.register_recipe("meta/core.recipe").unwrap();
        assert_eq!(key1, key2);

        let other = backend.register_recipe("meta/other.recipe").unwrap();
        assert_ne!(key1, other);
    }

    #[test]
    fn test_var_roundtrip_prefers_highest_priority() {
        let backend = Backend::open_in_memory().unwrap();
        let key = backend.register_recipe("r").unwrap();

        backend.insert_var(key, "VAR", "base", 0).unwrap();
        backend.insert_var(key, "VAR", "override", 10).unwrap();
        backend.insert_var(key, "VAR", "middle", 5).unwrap();

        let value = backend.lookup_var("r", "VAR").unwrap();
        assert_eq!(value.as_deref(), Some("override"));

        assert!(backend.remove_var(key, "VAR").unwrap());
        assert_eq!(backend.lookup_var("r", "VAR").unwrap(), None);
    }

    #[test]
    fn test_store_vars_replaces_previous_rows() {
        let backend = Backend::open_in_memory().unwrap();
        let key = backend.register_recipe("r").unwrap();

        backend.insert_var(key, "OLD", "stale", 0).unwrap();
        backend
            .store_vars(key, &[("NEW".to_string(), "fresh".to_string(), 0)])
            .unwrap();

        assert_eq!(backend.lookup_var("r", "OLD").unwrap(), None);
        assert_eq!(
            backend.lookup_var("r", "NEW").unwrap().as_deref(),
            Some("fresh")
        );
    }

    #[test]
    fn test_attr_crud() {
        let backend = Backend::open_in_memory().unwrap();
        let key = backend.register_recipe("r").unwrap();

        backend.insert_attr(key, "VAR", "export", "1").unwrap();
        assert_eq!(
            backend.lookup_attr(key, "VAR", "export").unwrap().as_deref(),
            Some("1")
        );

        // Replacement leaves exactly one row with the new value.
        backend.insert_attr(key, "VAR", "export", "0").unwrap();
        assert_eq!(
            backend.lookup_attr(key, "VAR", "export").unwrap().as_deref(),
            Some("0")
        );

        assert!(backend.remove_attr(key, "VAR", "export").unwrap());
        assert!(!backend.remove_attr(key, "VAR", "export").unwrap());
        assert_eq!(backend.lookup_attr(key, "VAR", "export").unwrap(), None);
    }

    #[test]
    fn test_remove_recipe_cascades() {
        let backend = Backend::open_in_memory().unwrap();
        let key = backend.register_recipe("r").unwrap();
        backend.insert_var(key, "VAR", "v", 0).unwrap();
        backend.insert_attr(key, "VAR", "export", "1").unwrap();

        assert!(backend.remove_recipe("r").unwrap());
        assert_eq!(backend.lookup_var("r", "VAR").unwrap(), None);
        assert!(!backend.remove_recipe("r").unwrap());
    }

    #[test]
    fn test_clones_share_one_connection() {
        let temp = NamedTempFile::new().unwrap();
        let backend = Backend::open(temp.path()).unwrap();
        assert_eq!(backend.user_count(), 1);

        let clone = backend.clone();
        assert_eq!(backend.user_count(), 2);

        let key = clone.register_recipe("r").unwrap();
        clone.insert_var(key, "VAR", "v", 0).unwrap();
        drop(clone);
        assert_eq!(backend.user_count(), 1);

        // Writes through the dropped clone remain visible.
        assert_eq!(
            backend.lookup_var("r", "VAR").unwrap().as_deref(),
            Some("v")
        );
    }
}
