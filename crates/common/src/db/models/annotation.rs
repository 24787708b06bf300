//! Persistent (W3C web) annotation entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "annotations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "Text")]
    pub motivation: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub body: serde_json::Value,

    /// Canvas url, optionally with an `xywh` fragment, or a full target object
    #[sea_orm(column_type = "JsonBinary")]
    pub target: serde_json::Value,

    pub creator_id: Option<Uuid>,

    #[sea_orm(column_type = "Text")]
    pub target_pi: String,

    pub target_page: Option<i32>,

    pub date_created: DateTimeWithTimeZone,

    pub date_modified: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
