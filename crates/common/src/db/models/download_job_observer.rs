//! Addresses notified when a download job finishes

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "download_job_observers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub job_id: i64,

    #[sea_orm(column_type = "Text")]
    pub email: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::download_job::Entity",
        from = "Column::JobId",
        to = "super::download_job::Column::Id",
        on_delete = "Cascade"
    )]
    DownloadJob,
}

impl Related<super::download_job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DownloadJob.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
