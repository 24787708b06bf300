//! Geo map entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "geo_maps")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// `manual` or `solr_query`
    #[sea_orm(column_type = "Text")]
    pub map_type: String,

    /// `{"zoom": .., "center": [lng, lat]}`
    #[sea_orm(column_type = "JsonBinary")]
    pub initial_view: serde_json::Value,

    pub date_created: DateTimeWithTimeZone,

    pub date_updated: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::feature_set::Entity")]
    FeatureSets,
}

impl Related<super::feature_set::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FeatureSets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
