//! Entry operations on a cache store.
//!
//! Entries are keyed by request URL (fragment removed). Only GET requests
//! are ever matched or stored.

use super::hash::body_digest;
use super::stores::CacheStore;
use crate::http::{Request, Response};
use crate::Error;
use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

/// Metadata for one stored entry.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EntryMeta {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub size: u64,
    pub body_sha256: String,
    pub stored_at: String,
}

/// Refuse what the host Cache API refuses: non-GET requests, partial
/// content, and responses that vary on everything.
fn check_cacheable(request: &Request, response: &Response) -> Result<(), Error> {
    if !request.is_get() {
        return Err(Error::PutRejected(format!("{} requests are not cacheable", request.method)));
    }
    if response.status == 206 {
        return Err(Error::PutRejected(format!("partial response for {}", request.url)));
    }
    if response
        .header("vary")
        .is_some_and(|v| v.split(',').any(|part| part.trim() == "*"))
    {
        return Err(Error::PutRejected(format!("Vary: * response for {}", request.url)));
    }
    Ok(())
}

fn write_entry(
    conn: &rusqlite::Connection, store_id: i64, store_name: &str, quota: Option<u64>, key: &str, response: &Response,
) -> Result<(), Error> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM cache_stores WHERE id = ?1)",
        params![store_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(Error::PutRejected(format!("cache store {store_name} was deleted")));
    }

    if let Some(quota) = quota {
        let used: i64 = conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(body)), 0) FROM cache_entries WHERE NOT (store_id = ?1 AND url = ?2)",
            params![store_id, key],
            |row| row.get(0),
        )?;
        let needed = used as u64 + response.body.len() as u64;
        if needed > quota {
            return Err(Error::QuotaExceeded(format!("{needed} bytes exceeds quota of {quota}")));
        }
    }

    let headers_json = serde_json::to_string(&response.headers)
        .map_err(|e| Error::InvalidInput(format!("failed to encode headers: {e}")))?;

    conn.execute(
        "INSERT INTO cache_entries
            (store_id, url, final_url, status, status_text, headers_json, body, body_sha256, stored_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(store_id, url) DO UPDATE SET
            final_url = excluded.final_url,
            status = excluded.status,
            status_text = excluded.status_text,
            headers_json = excluded.headers_json,
            body = excluded.body,
            body_sha256 = excluded.body_sha256,
            stored_at = excluded.stored_at",
        params![
            store_id,
            key,
            &response.url,
            response.status,
            &response.status_text,
            headers_json,
            &response.body[..],
            body_digest(&response.body),
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

impl CacheStore {
    /// Look up the stored response for an exact cache key.
    pub async fn match_url(&self, key: &str) -> Result<Option<Response>, Error> {
        let store_id = self.id;
        let key = key.to_string();
        self.storage
            .conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let row = conn
                    .query_row(
                        "SELECT final_url, status, status_text, headers_json, body FROM cache_entries
                        WHERE store_id = ?1 AND url = ?2",
                        params![store_id, key],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, u16>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, String>(3)?,
                                row.get::<_, Vec<u8>>(4)?,
                            ))
                        },
                    )
                    .optional()?;

                let Some((url, status, status_text, headers_json, body)) = row else {
                    return Ok(None);
                };
                let headers = serde_json::from_str(&headers_json)
                    .map_err(|e| Error::InvalidInput(format!("corrupt headers for {key}: {e}")))?;

                Ok(Some(Response { url, status, status_text, headers, body: Bytes::from(body) }))
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a request. Non-GET requests never match.
    pub async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        if !request.is_get() {
            return Ok(None);
        }
        self.match_url(&request.cache_key()).await
    }

    /// Store a response for a request, replacing any previous entry.
    pub async fn put(&self, request: &Request, response: &Response) -> Result<(), Error> {
        check_cacheable(request, response)?;

        let store_id = self.id;
        let store_name = self.name.clone();
        let quota = self.storage.quota_bytes;
        let key = request.cache_key();
        let response = response.clone();
        self.storage
            .conn
            .call(move |conn| -> Result<(), Error> { write_entry(conn, store_id, &store_name, quota, &key, &response) })
            .await
            .map_err(Error::from)
    }

    /// Store several responses in one transaction: either all land or none do.
    pub async fn put_all(&self, entries: Vec<(Request, Response)>) -> Result<(), Error> {
        for (request, response) in &entries {
            check_cacheable(request, response)?;
        }

        let store_id = self.id;
        let store_name = self.name.clone();
        let quota = self.storage.quota_bytes;
        self.storage
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for (request, response) in &entries {
                    write_entry(&tx, store_id, &store_name, quota, &request.cache_key(), response)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Cache keys held by this store, oldest first.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        let store_id = self.id;
        self.storage
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM cache_entries WHERE store_id = ?1 ORDER BY rowid ASC")?;
                let keys = stmt
                    .query_map(params![store_id], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Entry metadata, oldest first.
    pub async fn entries(&self) -> Result<Vec<EntryMeta>, Error> {
        let store_id = self.id;
        self.storage
            .conn
            .call(move |conn| -> Result<Vec<EntryMeta>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, status, headers_json, LENGTH(body), body_sha256, stored_at
                    FROM cache_entries WHERE store_id = ?1 ORDER BY rowid ASC",
                )?;
                let rows = stmt
                    .query_map(params![store_id], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, u16>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, String>(5)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(rows
                    .into_iter()
                    .map(|(url, status, headers_json, size, body_sha256, stored_at)| {
                        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json).unwrap_or_default();
                        let content_type = headers
                            .into_iter()
                            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
                            .map(|(_, v)| v);
                        EntryMeta { url, status, content_type, size: size as u64, body_sha256, stored_at }
                    })
                    .collect())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete one entry. Returns false if nothing was stored under the key.
    pub async fn delete(&self, key: &str) -> Result<bool, Error> {
        let store_id = self.id;
        let key = key.to_string();
        self.storage
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted =
                    conn.execute("DELETE FROM cache_entries WHERE store_id = ?1 AND url = ?2", params![store_id, key])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn len(&self) -> Result<usize, Error> {
        let store_id = self.id;
        self.storage
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM cache_entries WHERE store_id = ?1", params![store_id], |row| {
                        row.get(0)
                    })?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len().await? == 0)
    }
}
