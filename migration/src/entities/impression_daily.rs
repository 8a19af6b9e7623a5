//! 天级展示汇总实体

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "impression_daily")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub ad_id: i64,
    pub country: String,
    pub day: Date,
    pub placement: String,
    pub view_count: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
