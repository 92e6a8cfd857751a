//! Diagnose report entity for SeaORM.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "diagnose_reports")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub start_time: DateTimeUtc,
    pub end_time: DateTimeUtc,
    /// Set together with `compare_end_time`, or not at all
    pub compare_start_time: Option<DateTimeUtc>,
    pub compare_end_time: Option<DateTimeUtc>,
    pub progress: i32,
    /// pending, running, completed, failed
    pub status: String,
    pub error_message: Option<String>,
    /// Serialized table set, written at most once
    #[sea_orm(column_type = "Text", nullable)]
    pub content: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
