//! CMS pages, including the migration of legacy record overview pages

use crate::db::models::CmsPage;
use crate::db::Repository;
use crate::errors::Result;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

/// Editable fields of a CMS page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CmsPageInput {
    #[validate(length(min = 1, max = 255))]
    pub title: String,

    #[validate(length(max = 100))]
    pub menu_title: Option<String>,

    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub published: bool,

    #[validate(length(min = 1))]
    pub related_pi: Option<String>,
}

impl CmsPageInput {
    /// Validate and trim
    pub fn validated(self) -> Result<Self> {
        let input = CmsPageInput {
            title: self.title.trim().to_string(),
            menu_title: self.menu_title.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()),
            related_pi: self.related_pi.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            ..self
        };
        input.validate()?;
        Ok(input)
    }

    /// Copy the input onto a stored page
    pub fn apply_to(self, mut page: CmsPage) -> CmsPage {
        page.title = self.title;
        page.menu_title = self.menu_title;
        page.content = self.content;
        page.published = self.published;
        page.related_pi = self.related_pi;
        page
    }
}

/// HTML of a migrated overview page: one section per non-empty legacy text
pub fn overview_page_content(description: Option<&str>, publication_text: Option<&str>) -> String {
    [("description", description), ("publication", publication_text)]
        .into_iter()
        .filter_map(|(class, text)| {
            let text = text?.trim();
            (!text.is_empty()).then(|| format!("<section class=\"overview-{}\">{}</section>", class, text))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turn a legacy overview page into a CMS page related to the record.
/// Returns `None` when the record already has a CMS page.
pub async fn migrate_overview_page(
    repo: &Repository,
    pi: &str,
    description: Option<&str>,
    publication_text: Option<&str>,
) -> Result<Option<CmsPage>> {
    if !repo.cms_pages_for_record(pi).await?.is_empty() {
        info!(pi = %pi, "Record already has a CMS page, skipping overview migration");
        return Ok(None);
    }

    let page = repo
        .create_cms_page(
            format!("Overview {}", pi),
            None,
            overview_page_content(description, publication_text),
            true,
            Some(pi.to_string()),
        )
        .await?;

    info!(pi = %pi, page_id = page.id, "Migrated overview page");
    Ok(Some(page))
}
