//! Bookmark entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bookmarks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub list_id: i64,

    #[sea_orm(column_type = "Text", nullable)]
    pub pi: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub logid: Option<String>,

    pub page_order: Option<i32>,

    #[sea_orm(column_type = "Text", nullable)]
    pub url: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub date_added: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bookmark_list::Entity",
        from = "Column::ListId",
        to = "super::bookmark_list::Column::Id",
        on_delete = "Cascade"
    )]
    BookmarkList,
}

impl Related<super::bookmark_list::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BookmarkList.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
