//! CMS page entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cms_pages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub menu_title: Option<String>,

    /// HTML content
    #[sea_orm(column_type = "Text")]
    pub content: String,

    pub published: bool,

    #[sea_orm(column_type = "Text", nullable)]
    pub related_pi: Option<String>,

    pub date_created: DateTimeWithTimeZone,

    pub date_updated: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
