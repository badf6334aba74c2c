//! Named cache stores.
//!
//! A store is created on first open and lives until it is deleted as a whole;
//! deleting a store drops every entry it holds.

use super::connection::CacheStorage;
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;

/// Handle to one named cache store.
///
/// Handles stay valid after the store is deleted, but every write through
/// them is rejected and every lookup misses.
#[derive(Clone, Debug)]
pub struct CacheStore {
    pub(crate) storage: CacheStorage,
    pub(crate) id: i64,
    pub(crate) name: String,
}

impl CacheStore {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl CacheStorage {
    /// Open the store with the given name, creating it if absent.
    pub async fn open_store(&self, name: &str) -> Result<CacheStore, Error> {
        let store_name = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        let id = self
            .conn
            .call(move |conn| -> Result<i64, Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![store_name, created_at],
                )?;
                let id = conn.query_row("SELECT id FROM cache_stores WHERE name = ?1", params![store_name], |row| {
                    row.get(0)
                })?;
                Ok(id)
            })
            .await
            .map_err(Error::from)?;

        Ok(CacheStore { storage: self.clone(), id, name: name.to_string() })
    }

    /// Get an existing store without creating it.
    pub async fn get_store(&self, name: &str) -> Result<Option<CacheStore>, Error> {
        let store_name = name.to_string();
        let id: Option<i64> = self
            .conn
            .call(move |conn| -> Result<Option<i64>, Error> {
                let id = conn
                    .query_row("SELECT id FROM cache_stores WHERE name = ?1", params![store_name], |row| {
                        row.get(0)
                    })
                    .optional()?;
                Ok(id)
            })
            .await
            .map_err(Error::from)?;

        Ok(id.map(|id| CacheStore { storage: self.clone(), id, name: name.to_string() }))
    }

    pub async fn has_store(&self, name: &str) -> Result<bool, Error> {
        Ok(self.get_store(name).await?.is_some())
    }

    /// Names of all stores, in creation order.
    pub async fn store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY id ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and all of its entries.
    ///
    /// Returns false if no store had that name.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let store_name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM cache_stores WHERE name = ?1", params![store_name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
