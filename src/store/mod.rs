pub mod sqlite;

use crate::app::Result;
use crate::domain::{BlogState, CheckHistory};

pub use sqlite::SqliteStore;

/// Latest detection state per blog id.
pub trait StateStore: Send + Sync {
    fn get(&self, blog_id: &str) -> Result<Option<BlogState>>;
    /// Insert, or replace every column of the existing row.
    fn upsert(&self, state: &BlogState) -> Result<()>;
    /// Operator action only; the detection cascade never deletes.
    fn delete(&self, blog_id: &str) -> Result<()>;
    fn list_all(&self) -> Result<Vec<BlogState>>;
}

/// Append-only log of checks.
pub trait HistoryStore: Send + Sync {
    fn add(&self, entry: &CheckHistory) -> Result<()>;
    /// Most recent first.
    fn list_by_blog(&self, blog_id: &str, limit: usize) -> Result<Vec<CheckHistory>>;
}
