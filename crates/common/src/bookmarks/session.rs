//! Bookmark lists of anonymous sessions

use super::{generate_share_key, NewBookmark};
use crate::db::models::BookmarkList;
use crate::db::Repository;
use crate::errors::{AppError, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug)]
struct SessionList {
    bookmarks: Vec<NewBookmark>,
    last_access: Instant,
}

/// In-memory bookmark lists keyed by session id
pub struct SessionBookmarkStore {
    lists: Mutex<HashMap<String, SessionList>>,
    idle_timeout: Duration,
}

impl SessionBookmarkStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            lists: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionList>> {
        match self.lists.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Bookmarks of a session, creating an empty list on first access
    pub fn get_or_create(&self, session_id: &str) -> Vec<NewBookmark> {
        let mut lists = self.lock();
        let list = lists.entry(session_id.to_string()).or_insert_with(|| SessionList {
            bookmarks: Vec::new(),
            last_access: Instant::now(),
        });
        list.last_access = Instant::now();
        list.bookmarks.clone()
    }

    /// Add a bookmark; returns `false` when the session already has one for the same target
    pub fn add(&self, session_id: &str, bookmark: NewBookmark) -> Result<bool> {
        let bookmark = bookmark.validated()?;
        let mut lists = self.lock();
        let list = lists.entry(session_id.to_string()).or_insert_with(|| SessionList {
            bookmarks: Vec::new(),
            last_access: Instant::now(),
        });
        list.last_access = Instant::now();
        if list.bookmarks.iter().any(|b| b.same_target(&bookmark)) {
            return Ok(false);
        }
        list.bookmarks.push(bookmark);
        Ok(true)
    }

    /// Remove the bookmark at `index`
    pub fn remove(&self, session_id: &str, index: usize) -> bool {
        let mut lists = self.lock();
        match lists.get_mut(session_id) {
            Some(list) if index < list.bookmarks.len() => {
                list.bookmarks.remove(index);
                list.last_access = Instant::now();
                true
            }
            _ => false,
        }
    }

    /// Bookmarks of a session without creating one
    pub fn list(&self, session_id: &str) -> Option<Vec<NewBookmark>> {
        self.lock().get(session_id).map(|l| l.bookmarks.clone())
    }

    pub fn clear(&self, session_id: &str) -> bool {
        self.lock().remove(session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop sessions idle for longer than the timeout; returns how many were dropped
    pub fn evict_idle(&self, now: Instant) -> usize {
        let mut lists = self.lock();
        let before = lists.len();
        lists.retain(|_, l| now.saturating_duration_since(l.last_access) <= self.idle_timeout);
        let evicted = before - lists.len();
        if evicted > 0 {
            debug!(evicted, "Evicted idle session bookmark lists");
        }
        evicted
    }

    /// Remove a session's list and hand out its bookmarks
    pub fn take(&self, session_id: &str) -> Option<Vec<NewBookmark>> {
        self.lock().remove(session_id).map(|l| l.bookmarks)
    }

    /// Put taken bookmarks back in front of anything added since
    pub fn restore(&self, session_id: &str, bookmarks: Vec<NewBookmark>) {
        let mut lists = self.lock();
        let list = lists.entry(session_id.to_string()).or_insert_with(|| SessionList {
            bookmarks: Vec::new(),
            last_access: Instant::now(),
        });
        list.last_access = Instant::now();
        let added = std::mem::replace(&mut list.bookmarks, bookmarks);
        for bookmark in added {
            if !list.bookmarks.iter().any(|b| b.same_target(&bookmark)) {
                list.bookmarks.push(bookmark);
            }
        }
    }

    /// Persist a session's bookmarks as a new list of `owner_id`
    ///
    /// The session list is taken out first so concurrent additions start a
    /// fresh list. On failure the partial list is deleted and the session
    /// keeps its bookmarks.
    pub async fn transfer(
        &self,
        session_id: &str,
        owner_id: Uuid,
        name: String,
        repo: &Repository,
    ) -> Result<BookmarkList> {
        let bookmarks = self
            .take(session_id)
            .ok_or_else(|| AppError::not_found("session bookmark list", session_id))?;

        match persist(repo, owner_id, name, &bookmarks).await {
            Ok(list) => {
                info!(list_id = list.id, count = bookmarks.len(), "Transferred session bookmarks");
                Ok(list)
            }
            Err((list_id, e)) => {
                if let Some(id) = list_id {
                    if let Err(cleanup) = repo.delete_bookmark_list(id).await {
                        warn!(list_id = id, error = %cleanup, "Failed to delete partially transferred list");
                    }
                }
                warn!(session_id = %session_id, error = %e, "Bookmark transfer failed, keeping session list");
                self.restore(session_id, bookmarks);
                Err(e)
            }
        }
    }
}

/// Create the list and its bookmarks; on error reports the id of a list already created
async fn persist(
    repo: &Repository,
    owner_id: Uuid,
    name: String,
    bookmarks: &[NewBookmark],
) -> std::result::Result<BookmarkList, (Option<i64>, AppError)> {
    let list = repo
        .create_bookmark_list(owner_id, name, None, false, generate_share_key())
        .await
        .map_err(|e| (None, e))?;
    for bookmark in bookmarks {
        repo.add_bookmark(list.id, bookmark.clone())
            .await
            .map_err(|e| (Some(list.id), e))?;
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookmarks::tests::record;
    use std::sync::Arc;

    #[test]
    fn test_add_list_remove() {
        let store = SessionBookmarkStore::new(Duration::from_secs(60));
        assert!(store.get_or_create("s1").is_empty());
        assert!(store.add("s1", record("PPN1")).unwrap());
        assert!(!store.add("s1", record("PPN1")).unwrap());
        assert!(store.add("s1", record("PPN2")).unwrap());
        assert_eq!(store.list("s1").unwrap().len(), 2);

        assert!(store.remove("s1", 0));
        assert!(!store.remove("s1", 5));
        assert_eq!(store.list("s1").unwrap()[0].pi.as_deref(), Some("PPN2"));

        assert!(store.clear("s1"));
        assert!(store.list("s1").is_none());
    }

    #[test]
    fn test_take_and_restore() {
        let store = SessionBookmarkStore::new(Duration::from_secs(60));
        store.add("s1", record("PPN1")).unwrap();
        store.add("s1", record("PPN2")).unwrap();

        let taken = store.take("s1").unwrap();
        assert_eq!(taken.len(), 2);
        assert!(store.list("s1").is_none());
        assert!(store.take("s1").is_none());

        // added while the transfer was running
        store.add("s1", record("PPN3")).unwrap();
        store.add("s1", record("PPN1")).unwrap();

        store.restore("s1", taken);
        let pis: Vec<_> = store
            .list("s1")
            .unwrap()
            .into_iter()
            .filter_map(|b| b.pi)
            .collect();
        assert_eq!(pis, vec!["PPN1", "PPN2", "PPN3"]);
    }

    #[test]
    fn test_invalid_bookmark_is_rejected() {
        let store = SessionBookmarkStore::new(Duration::from_secs(60));
        let bad = NewBookmark { pi: None, ..record("x") };
        assert!(store.add("s1", bad).is_err());
    }

    #[test]
    fn test_concurrent_get_or_create_yields_one_list() {
        let store = Arc::new(SessionBookmarkStore::new(Duration::from_secs(60)));
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.get_or_create("shared");
                    store.add("shared", record(&format!("PPN{}", i))).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(), 1);
        assert_eq!(store.list("shared").unwrap().len(), 16);
    }

    #[test]
    fn test_evict_idle() {
        let store = SessionBookmarkStore::new(Duration::from_secs(30));
        store.get_or_create("old");
        store.get_or_create("fresh");
        assert_eq!(store.evict_idle(Instant::now()), 0);
        assert_eq!(store.evict_idle(Instant::now() + Duration::from_secs(31)), 2);
        assert!(store.is_empty());
    }
}
