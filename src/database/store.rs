//! Catalog store on SQLite.
//!
//! The reconciler owns every column it writes through [`CatalogStore::apply_work`];
//! `rating` belongs to the API layer and is only reachable through
//! [`CatalogStore::set_rating`]. The upsert is deliberately a partial update
//! so a sync pass can never clobber a rating.

use std::collections::HashSet;

use anyhow::{ensure, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::database::schema::SCHEMA;
use crate::ingest::pages::PageEntry;

/// Sync-owned fields of a work, as derived from the filesystem.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkRecord {
    pub key: String,
    pub title: String,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub meta: Option<String>,
    pub published_at: Option<i64>,
}

/// A stored work row, the shape the API layer reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkRow {
    pub id: i64,
    pub key: String,
    pub title: String,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub meta: Option<String>,
    pub published_at: Option<i64>,
    pub rating: Option<i64>,
}

/// A stored page row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageRow {
    pub id: i64,
    pub work_id: i64,
    pub page_index: i64,
    pub path: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub ratio: Option<f64>,
}

pub struct CatalogStore {
    conn: Connection,
}

impl CatalogStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open catalog database")?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("Failed to enable WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("Failed to enable foreign keys")?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize schema")?;
        Ok(Self { conn })
    }

    /// Upsert a work and replace all of its pages, atomically.
    ///
    /// An existing row keyed the same is updated in place; the update names
    /// only sync-owned columns, leaving `rating` untouched. Pages are fully
    /// replaced, never diffed. Returns the work's catalog id.
    pub fn apply_work(&mut self, work: &WorkRecord, pages: &[PageEntry]) -> Result<i64> {
        let tx = self
            .conn
            .transaction()
            .context("Failed to begin transaction")?;

        let work_id: i64 = tx
            .query_row(
                "INSERT INTO works (key, title, category, tags, meta, published_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(key) DO UPDATE SET
                     title = excluded.title,
                     category = excluded.category,
                     tags = excluded.tags,
                     meta = excluded.meta,
                     published_at = excluded.published_at
                 RETURNING id",
                params![
                    work.key,
                    work.title,
                    work.category,
                    work.tags,
                    work.meta,
                    work.published_at
                ],
                |row| row.get(0),
            )
            .with_context(|| format!("Failed to upsert work {}", work.key))?;

        tx.execute("DELETE FROM pages WHERE work_id = ?1", params![work_id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO pages (work_id, page_index, path, width, height, ratio)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for page in pages {
                stmt.execute(params![
                    work_id,
                    page.page_index,
                    page.path,
                    page.width,
                    page.height,
                    page.ratio
                ])?;
            }
        }

        tx.commit().context("Failed to commit work transaction")?;
        Ok(work_id)
    }

    /// Delete every work whose key is not in `keep`, pages first, in one
    /// transaction. Returns the number of works removed.
    pub fn prune_except(&mut self, keep: &HashSet<String>) -> Result<usize> {
        let tx = self
            .conn
            .transaction()
            .context("Failed to begin prune transaction")?;

        let stale: Vec<i64> = {
            let mut stmt = tx.prepare("SELECT id, key FROM works")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?;

            let mut stale = Vec::new();
            for row in rows {
                let (id, key) = row?;
                if !keep.contains(&key) {
                    stale.push(id);
                }
            }
            stale
        };

        for id in &stale {
            tx.execute("DELETE FROM pages WHERE work_id = ?1", params![id])?;
            tx.execute("DELETE FROM works WHERE id = ?1", params![id])?;
        }

        tx.commit().context("Failed to commit prune transaction")?;
        Ok(stale.len())
    }

    pub fn work_by_key(&self, key: &str) -> Result<Option<WorkRow>> {
        self.conn
            .query_row(
                "SELECT id, key, title, category, tags, meta, published_at, rating
                 FROM works WHERE key = ?1",
                params![key],
                |row| {
                    Ok(WorkRow {
                        id: row.get(0)?,
                        key: row.get(1)?,
                        title: row.get(2)?,
                        category: row.get(3)?,
                        tags: row.get(4)?,
                        meta: row.get(5)?,
                        published_at: row.get(6)?,
                        rating: row.get(7)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("Failed to look up work {key}"))
    }

    pub fn pages_for_work(&self, work_id: i64) -> Result<Vec<PageRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, work_id, page_index, path, width, height, ratio
             FROM pages WHERE work_id = ?1 ORDER BY page_index",
        )?;
        let rows = stmt.query_map(params![work_id], |row| {
            Ok(PageRow {
                id: row.get(0)?,
                work_id: row.get(1)?,
                page_index: row.get(2)?,
                path: row.get(3)?,
                width: row.get(4)?,
                height: row.get(5)?,
                ratio: row.get(6)?,
            })
        })?;

        let mut pages = Vec::new();
        for row in rows {
            pages.push(row?);
        }
        Ok(pages)
    }

    /// API-layer mutation: set or clear a work's rating. The reconciler never
    /// calls this. Returns false when no such work exists.
    pub fn set_rating(&mut self, key: &str, rating: Option<i64>) -> Result<bool> {
        if let Some(value) = rating {
            ensure!((1..=5).contains(&value), "rating must be between 1 and 5");
        }
        let changed = self.conn.execute(
            "UPDATE works SET rating = ?1 WHERE key = ?2",
            params![rating, key],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> CatalogStore {
        let path = dir.path().join("catalog.db");
        CatalogStore::open(path.to_str().unwrap()).unwrap()
    }

    fn record(key: &str, title: &str) -> WorkRecord {
        WorkRecord {
            key: key.to_string(),
            title: title.to_string(),
            category: None,
            tags: None,
            meta: None,
            published_at: None,
        }
    }

    fn page(path: &str, index: i64) -> PageEntry {
        PageEntry {
            path: path.to_string(),
            page_index: index,
            width: Some(100),
            height: Some(200),
            ratio: Some(0.5),
        }
    }

    #[test]
    fn insert_then_update_keeps_one_row_per_key() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        let first = store.apply_work(&record("a", "one"), &[]).unwrap();
        let second = store.apply_work(&record("a", "two"), &[]).unwrap();
        assert_eq!(first, second);

        let row = store.work_by_key("a").unwrap().unwrap();
        assert_eq!(row.title, "two");
    }

    #[test]
    fn pages_are_fully_replaced() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        let id = store
            .apply_work(&record("a", "t"), &[page("a/1.jpg", 0), page("a/2.jpg", 1)])
            .unwrap();
        store.apply_work(&record("a", "t"), &[page("a/3.jpg", 0)]).unwrap();

        let pages = store.pages_for_work(id).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].path, "a/3.jpg");
        assert_eq!(pages[0].page_index, 0);
    }

    #[test]
    fn upsert_does_not_touch_rating() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        store.apply_work(&record("a", "t"), &[]).unwrap();
        assert!(store.set_rating("a", Some(4)).unwrap());

        store.apply_work(&record("a", "renamed"), &[]).unwrap();
        let row = store.work_by_key("a").unwrap().unwrap();
        assert_eq!(row.title, "renamed");
        assert_eq!(row.rating, Some(4));
    }

    #[test]
    fn rating_is_validated_and_clearable() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);
        store.apply_work(&record("a", "t"), &[]).unwrap();

        assert!(store.set_rating("a", Some(6)).is_err());
        assert!(store.set_rating("a", Some(5)).unwrap());
        assert!(store.set_rating("a", None).unwrap());
        assert!(!store.set_rating("missing", Some(3)).unwrap());
        assert_eq!(store.work_by_key("a").unwrap().unwrap().rating, None);
    }

    #[test]
    fn prune_removes_only_unlisted_works() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        let kept = store.apply_work(&record("keep", "k"), &[page("keep/1.jpg", 0)]).unwrap();
        let gone = store.apply_work(&record("gone", "g"), &[page("gone/1.jpg", 0)]).unwrap();

        let keep: HashSet<String> = ["keep".to_string()].into_iter().collect();
        assert_eq!(store.prune_except(&keep).unwrap(), 1);

        assert!(store.work_by_key("keep").unwrap().is_some());
        assert!(store.work_by_key("gone").unwrap().is_none());
        assert_eq!(store.pages_for_work(kept).unwrap().len(), 1);
        assert!(store.pages_for_work(gone).unwrap().is_empty());
    }
}
