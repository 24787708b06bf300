//! Bookmark list entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bookmark_lists")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub owner_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub is_public: bool,

    /// 32 hex chars; grants read access to anyone holding it
    #[sea_orm(column_type = "Text", unique)]
    pub share_key: String,

    pub date_created: DateTimeWithTimeZone,

    pub date_updated: DateTimeWithTimeZone,
}

impl Model {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }

    /// Readable by the owner, by anyone when public, or with the share key
    pub fn is_readable_by(&self, user_id: Option<Uuid>, share_key: Option<&str>) -> bool {
        self.is_public
            || user_id.map(|u| self.is_owned_by(u)).unwrap_or(false)
            || share_key.map(|k| k == self.share_key).unwrap_or(false)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id"
    )]
    Owner,

    #[sea_orm(has_many = "super::bookmark::Entity")]
    Bookmarks,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::bookmark::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookmarks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
