//! Bookmarks and bookmark lists
//!
//! Logged-in users keep their lists in the database; anonymous visitors get
//! a list held in memory for the lifetime of their session (see
//! [`SessionBookmarkStore`]).

mod session;

pub use session::SessionBookmarkStore;

use crate::db::models::{Bookmark, BookmarkList};
use crate::errors::{AppError, Result};
use crate::search::{fields, quoted};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A bookmark about to be stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewBookmark {
    pub pi: Option<String>,
    pub logid: Option<String>,
    /// Page order; only meaningful together with a PI
    pub order: Option<i32>,
    #[validate(url)]
    pub url: Option<String>,
    #[validate(length(max = 1000))]
    pub title: String,
    pub description: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl NewBookmark {
    /// Normalize blank fields and enforce that a bookmark points at a record or a url
    pub fn validated(self) -> Result<Self> {
        let bookmark = NewBookmark {
            pi: non_blank(self.pi),
            logid: non_blank(self.logid),
            url: non_blank(self.url),
            description: non_blank(self.description),
            title: self.title.trim().to_string(),
            order: self.order,
        };
        bookmark.validate()?;

        if bookmark.pi.is_none() && bookmark.url.is_none() {
            return Err(AppError::Validation {
                message: "A bookmark needs a record identifier or a url".to_string(),
                field: Some("pi".to_string()),
            });
        }
        if bookmark.order.is_some() && bookmark.pi.is_none() {
            return Err(AppError::Validation {
                message: "A page order requires a record identifier".to_string(),
                field: Some("order".to_string()),
            });
        }
        if matches!(bookmark.order, Some(o) if o < 1) {
            return Err(AppError::Validation {
                message: "Page orders start at 1".to_string(),
                field: Some("order".to_string()),
            });
        }

        Ok(NewBookmark {
            title: if bookmark.title.is_empty() {
                bookmark.pi.clone().or_else(|| bookmark.url.clone()).unwrap_or_default()
            } else {
                bookmark.title.clone()
            },
            ..bookmark
        })
    }

    /// Same record, section and page, or the same url
    pub fn same_target(&self, other: &NewBookmark) -> bool {
        match (&self.pi, &other.pi) {
            (Some(a), Some(b)) => a == b && self.logid == other.logid && self.order == other.order,
            (None, None) => self.url == other.url,
            _ => false,
        }
    }
}

impl From<&Bookmark> for NewBookmark {
    fn from(b: &Bookmark) -> Self {
        NewBookmark {
            pi: b.pi.clone(),
            logid: b.logid.clone(),
            order: b.page_order,
            url: b.url.clone(),
            title: b.title.clone(),
            description: b.description.clone(),
        }
    }
}

/// 32 hex chars of randomness
pub fn generate_share_key() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

/// Check that a caller may modify a list
pub fn ensure_owner(list: &BookmarkList, user_id: uuid::Uuid) -> Result<()> {
    if list.is_owned_by(user_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden {
            message: format!("Bookmark list {} belongs to another user", list.id),
        })
    }
}

/// Search query matching the records bookmarked in a list; `None` when no bookmark has a PI
pub fn to_search_query<'a>(bookmarks: impl IntoIterator<Item = &'a NewBookmark>) -> Option<String> {
    let mut pis: Vec<&str> = Vec::new();
    for pi in bookmarks.into_iter().filter_map(|b| b.pi.as_deref()) {
        if !pis.contains(&pi) {
            pis.push(pi);
        }
    }
    if pis.is_empty() {
        return None;
    }
    let terms: Vec<String> = pis.into_iter().map(quoted).collect();
    Some(format!("{}:({})", fields::PI, terms.join(" OR ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(super) fn record(pi: &str) -> NewBookmark {
        NewBookmark {
            pi: Some(pi.to_string()),
            logid: None,
            order: None,
            url: None,
            title: format!("Record {}", pi),
            description: None,
        }
    }

    #[test]
    fn test_bookmark_needs_pi_or_url() {
        let empty = NewBookmark {
            pi: Some("  ".into()),
            url: None,
            ..record("x")
        };
        assert!(matches!(empty.validated(), Err(AppError::Validation { .. })));

        let url_only = NewBookmark {
            pi: None,
            url: Some("https://example.org/page".into()),
            title: String::new(),
            ..record("x")
        };
        let url_only = url_only.validated().unwrap();
        assert_eq!(url_only.title, "https://example.org/page");
    }

    #[test]
    fn test_order_requires_pi() {
        let bad = NewBookmark {
            pi: None,
            url: Some("https://example.org".into()),
            order: Some(3),
            ..record("x")
        };
        assert!(bad.validated().is_err());
        assert!(NewBookmark { order: Some(0), ..record("PPN1") }.validated().is_err());
        assert!(NewBookmark { order: Some(2), ..record("PPN1") }.validated().is_ok());
    }

    #[test]
    fn test_invalid_url_rejected() {
        let bad = NewBookmark {
            pi: None,
            url: Some("not a url".into()),
            ..record("x")
        };
        assert!(bad.validated().is_err());
    }

    #[test]
    fn test_share_key() {
        let key = generate_share_key();
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_share_key());
    }

    #[test]
    fn test_search_query() {
        let url = NewBookmark {
            pi: None,
            url: Some("https://example.org".into()),
            ..record("x")
        };
        let list = vec![record("PPN1"), url, record("PPN2"), record("PPN1")];
        assert_eq!(
            to_search_query(&list).as_deref(),
            Some("PI:(\"PPN1\" OR \"PPN2\")")
        );
        assert_eq!(to_search_query(&Vec::new()), None);
    }

    #[test]
    fn test_same_target() {
        let a = NewBookmark { order: Some(2), ..record("PPN1") };
        assert!(a.same_target(&NewBookmark { title: "other".into(), ..a.clone() }));
        assert!(!a.same_target(&NewBookmark { order: Some(3), ..a.clone() }));
    }
}
