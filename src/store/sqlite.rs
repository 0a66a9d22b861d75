use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, WatcherError};
use crate::domain::{BlogState, CheckHistory};
use crate::store::{HistoryStore, StateStore};

const STATE_COLUMNS: &str = "blog_id, etag, last_modified, url_fingerprint, feed_url, sitemap_url,
     recent_entry_keys, last_checked_at, last_changed_at, consecutive_errors";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| WatcherError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            WatcherError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn state_from_row(row: &Row<'_>) -> rusqlite::Result<(BlogState, Option<String>)> {
        let state = BlogState {
            blog_id: row.get(0)?,
            etag: row.get(1)?,
            last_modified: row.get(2)?,
            url_fingerprint: row.get(3)?,
            feed_url: row.get(4)?,
            sitemap_url: row.get(5)?,
            recent_entry_keys: None,
            last_checked_at: row
                .get::<_, String>(7)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
            last_changed_at: row
                .get::<_, Option<String>>(8)?
                .and_then(|s| Self::parse_datetime(&s)),
            consecutive_errors: row.get(9)?,
        };
        Ok((state, row.get(6)?))
    }

    /// Entry keys are stored as a JSON array.
    fn with_entry_keys(state: BlogState, keys: Option<String>) -> Result<BlogState> {
        let recent_entry_keys = match keys {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        };
        Ok(BlogState {
            recent_entry_keys,
            ..state
        })
    }
}

impl StateStore for SqliteStore {
    fn get(&self, blog_id: &str) -> Result<Option<BlogState>> {
        let conn = self.conn()?;

        let row = conn
            .query_row(
                &format!("SELECT {} FROM blog_state WHERE blog_id = ?1", STATE_COLUMNS),
                params![blog_id],
                Self::state_from_row,
            )
            .optional()?;

        row.map(|(state, keys)| Self::with_entry_keys(state, keys))
            .transpose()
    }

    fn upsert(&self, state: &BlogState) -> Result<()> {
        state.validate()?;
        let keys = state
            .recent_entry_keys
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO blog_state ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                STATE_COLUMNS
            ),
            params![
                state.blog_id,
                state.etag,
                state.last_modified,
                state.url_fingerprint,
                state.feed_url,
                state.sitemap_url,
                keys,
                state.last_checked_at.to_rfc3339(),
                state.last_changed_at.map(|dt| dt.to_rfc3339()),
                state.consecutive_errors,
            ],
        )?;

        Ok(())
    }

    fn delete(&self, blog_id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM blog_state WHERE blog_id = ?1", params![blog_id])?;
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<BlogState>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM blog_state ORDER BY blog_id",
            STATE_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], Self::state_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(state, keys)| Self::with_entry_keys(state, keys))
            .collect()
    }
}

impl HistoryStore for SqliteStore {
    fn add(&self, entry: &CheckHistory) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO check_history (blog_id, checked_at, http_status, changed, url_fingerprint, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.blog_id,
                entry.checked_at.to_rfc3339(),
                entry.http_status,
                entry.changed,
                entry.url_fingerprint,
                entry.error_message,
            ],
        )?;

        Ok(())
    }

    fn list_by_blog(&self, blog_id: &str, limit: usize) -> Result<Vec<CheckHistory>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT blog_id, checked_at, http_status, changed, url_fingerprint, error_message
             FROM check_history WHERE blog_id = ?1
             ORDER BY checked_at DESC, id DESC LIMIT ?2",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let entries = stmt
            .query_map(params![blog_id, limit], |row| {
                Ok(CheckHistory {
                    blog_id: row.get(0)?,
                    checked_at: row
                        .get::<_, String>(1)
                        .ok()
                        .and_then(|s| Self::parse_datetime(&s))
                        .unwrap_or_else(Utc::now),
                    http_status: row.get(2)?,
                    changed: row.get(3)?,
                    url_fingerprint: row.get(4)?,
                    error_message: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample_state(blog_id: &str) -> BlogState {
        let checked = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        BlogState {
            etag: Some("\"v1\"".into()),
            last_modified: Some("Wed, 01 May 2024 12:00:00 GMT".into()),
            url_fingerprint: Some("abc".into()),
            feed_url: Some("https://example.com/feed.xml".into()),
            sitemap_url: None,
            recent_entry_keys: Some(vec!["a".into(), "b".into()]),
            last_changed_at: Some(checked - Duration::days(1)),
            consecutive_errors: 2,
            ..BlogState::new(blog_id, checked).unwrap()
        }
    }

    #[test]
    fn test_get_missing_state() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(store.get("https://example.com").unwrap(), None);
    }

    #[test]
    fn test_upsert_and_get_roundtrip() {
        let store = SqliteStore::in_memory().unwrap();
        let state = sample_state("https://example.com");

        store.upsert(&state).unwrap();

        assert_eq!(store.get("https://example.com").unwrap(), Some(state));
    }

    #[test]
    fn test_upsert_replaces_whole_row() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert(&sample_state("https://example.com")).unwrap();

        let replacement = BlogState::new("https://example.com", Utc::now()).unwrap();
        store.upsert(&replacement).unwrap();

        let stored = store.get("https://example.com").unwrap().unwrap();
        assert_eq!(stored.etag, None);
        assert_eq!(stored.recent_entry_keys, None);
        assert_eq!(stored.consecutive_errors, 0);
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_rejects_empty_blog_id() {
        let store = SqliteStore::in_memory().unwrap();
        let mut state = sample_state("x");
        state.blog_id = "  ".into();
        assert!(store.upsert(&state).is_err());
    }

    #[test]
    fn test_delete_and_list_all() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert(&sample_state("https://b.example.com")).unwrap();
        store.upsert(&sample_state("https://a.example.com")).unwrap();

        let ids: Vec<String> = store.list_all().unwrap().into_iter().map(|s| s.blog_id).collect();
        assert_eq!(ids, vec!["https://a.example.com", "https://b.example.com"]);

        store.delete("https://a.example.com").unwrap();
        assert_eq!(store.get("https://a.example.com").unwrap(), None);
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_history_newest_first() {
        let store = SqliteStore::in_memory().unwrap();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

        for hour in 0..3 {
            store
                .add(&CheckHistory {
                    blog_id: "https://example.com".into(),
                    checked_at: start + Duration::hours(hour),
                    http_status: Some(200),
                    changed: hour == 2,
                    url_fingerprint: Some(format!("fp-{}", hour)),
                    error_message: None,
                })
                .unwrap();
        }
        store
            .add(&CheckHistory {
                blog_id: "https://other.example.com".into(),
                checked_at: start,
                http_status: None,
                changed: false,
                url_fingerprint: None,
                error_message: Some("HTTP 503 after retries".into()),
            })
            .unwrap();

        let history = store.list_by_blog("https://example.com", 2).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].url_fingerprint.as_deref(), Some("fp-2"));
        assert!(history[0].changed);
        assert_eq!(history[1].checked_at, start + Duration::hours(1));

        let failed = store.list_by_blog("https://other.example.com", 10).unwrap();
        assert_eq!(failed[0].http_status, None);
        assert_eq!(failed[0].error_message.as_deref(), Some("HTTP 503 after retries"));
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.db");

        {
            let store = SqliteStore::new(&path).unwrap();
            store.upsert(&sample_state("https://example.com")).unwrap();
        }

        let reopened = SqliteStore::new(&path).unwrap();
        assert!(reopened.get("https://example.com").unwrap().is_some());
    }
}
