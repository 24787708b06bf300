//! API handlers module

pub mod annotations;
pub mod bookmarks;
pub mod cms;
pub mod comments;
pub mod downloads;
pub mod ead;
pub mod health;
pub mod images;
pub mod maps;

use crate::AppState;
use viewer_common::{
    errors::{AppError, Result},
    iiif::PhysicalPage,
    search::SolrDocument,
};

/// Page document and the page built from it
pub(crate) async fn load_page(state: &AppState, pi: &str, order: u32) -> Result<(PhysicalPage, SolrDocument)> {
    let doc = state
        .search
        .page(pi, order)
        .await?
        .ok_or_else(|| AppError::not_found("page", format!("{}/{}", pi, order)))?;
    let page = PhysicalPage::from_doc(&doc)?;
    Ok((page, doc))
}

/// Page orders in paths are 1-based
pub(crate) fn page_order(order: u32) -> Result<i32> {
    if order == 0 {
        return Err(AppError::Validation {
            message: "Page orders start at 1".to_string(),
            field: Some("order".to_string()),
        });
    }
    i32::try_from(order).map_err(|_| AppError::validation(format!("Page order {} out of range", order)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_order() {
        assert_eq!(page_order(3).unwrap(), 3);
        assert!(page_order(0).is_err());
        assert!(page_order(u32::MAX).is_err());
    }
}
