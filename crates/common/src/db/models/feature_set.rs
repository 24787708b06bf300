//! Feature set entity: a group of map features, stored or query-driven

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "feature_sets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub map_id: i64,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    /// `manual` or `solr_query`
    #[sea_orm(column_type = "Text")]
    pub kind: String,

    /// GeoJSON features of manual sets
    #[sea_orm(column_type = "JsonBinary")]
    pub features: serde_json::Value,

    #[sea_orm(column_type = "Text", nullable)]
    pub query: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub marker: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::geo_map::Entity",
        from = "Column::MapId",
        to = "super::geo_map::Column::Id",
        on_delete = "Cascade"
    )]
    GeoMap,
}

impl Related<super::geo_map::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GeoMap.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
