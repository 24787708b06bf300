//! User entity; owns bookmark lists, comments and annotations

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text", unique)]
    pub email: String,

    #[sea_orm(column_type = "Text")]
    pub display_name: String,

    /// Argon2 PHC string; absent for externally authenticated users
    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text", nullable)]
    pub password_hash: Option<String>,

    pub is_admin: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::bookmark_list::Entity")]
    BookmarkLists,

    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,
}

impl Related<super::bookmark_list::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BookmarkLists.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
