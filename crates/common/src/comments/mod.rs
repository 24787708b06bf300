//! Page comments

use crate::auth::AuthContext;
use crate::db::models::Comment;
use crate::errors::{AppError, Result};
use regex_lite::Regex;
use std::sync::OnceLock;

/// Maximum comment length in characters, after sanitizing
pub const MAX_COMMENT_LENGTH: usize = 4000;

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->|</?[A-Za-z][^>]*>").expect("tag pattern is valid"))
}

/// Strip HTML tags and surrounding whitespace
pub fn sanitize_text(text: &str) -> String {
    tag_regex().replace_all(text, "").trim().to_string()
}

/// Sanitized comment text, or a validation error when empty or too long
pub fn validate_text(text: &str) -> Result<String> {
    let text = sanitize_text(text);
    if text.is_empty() {
        return Err(AppError::Validation {
            message: "Comment text must not be empty".to_string(),
            field: Some("text".to_string()),
        });
    }
    let length = text.chars().count();
    if length > MAX_COMMENT_LENGTH {
        return Err(AppError::Validation {
            message: format!(
                "Comment has {} characters, at most {} are allowed",
                length, MAX_COMMENT_LENGTH
            ),
            field: Some("text".to_string()),
        });
    }
    Ok(text)
}

/// Page orders start at 1
pub fn validate_target(pi: &str, page_order: i32) -> Result<()> {
    if pi.trim().is_empty() {
        return Err(AppError::validation("Comments need a record identifier"));
    }
    if page_order < 1 {
        return Err(AppError::Validation {
            message: format!("Invalid page order {}", page_order),
            field: Some("order".to_string()),
        });
    }
    Ok(())
}

/// Only the author or an administrator may edit or delete a comment
pub fn ensure_can_modify(comment: &Comment, auth: &AuthContext) -> Result<()> {
    auth.require_owner_or_admin(comment.owner_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_sanitize_text() {
        assert_eq!(sanitize_text("  <b>Nice</b> scan<br/> "), "Nice scan");
        assert_eq!(sanitize_text("<script>\nalert(1)</script>"), "alert(1)");
        assert_eq!(sanitize_text("a < b"), "a < b");
    }

    #[test]
    fn test_sanitize_keeps_comparisons() {
        assert_eq!(sanitize_text("1 < 2 and 3 > 2"), "1 < 2 and 3 > 2");
        assert_eq!(sanitize_text("x<y>z"), "xz");
        assert_eq!(sanitize_text("before<!-- hidden -->after"), "beforeafter");
    }

    #[test]
    fn test_validate_text() {
        assert!(validate_text("   ").is_err());
        assert!(validate_text("<p></p>").is_err());
        assert_eq!(validate_text(" ok ").unwrap(), "ok");
        assert!(validate_text(&"x".repeat(MAX_COMMENT_LENGTH)).is_ok());
        assert!(validate_text(&"ü".repeat(MAX_COMMENT_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_target() {
        assert!(validate_target("PPN1", 1).is_ok());
        assert!(validate_target("PPN1", 0).is_err());
        assert!(validate_target(" ", 1).is_err());
    }

    #[test]
    fn test_modify_permissions() {
        let owner = Uuid::new_v4();
        let comment = Comment {
            id: 1,
            pi: "PPN1".into(),
            page_order: 1,
            owner_id: owner,
            text: "hi".into(),
            date_created: chrono::Utc::now().into(),
            date_updated: None,
        };
        let other = AuthContext {
            user_id: Uuid::new_v4(),
            is_admin: false,
            request_id: "r".into(),
        };
        assert!(matches!(
            ensure_can_modify(&comment, &other),
            Err(AppError::Forbidden { .. })
        ));
        assert!(ensure_can_modify(&comment, &AuthContext { user_id: owner, ..other.clone() }).is_ok());
        assert!(ensure_can_modify(&comment, &AuthContext { is_admin: true, ..other }).is_ok());
    }
}
