//! 展示统计表迁移
//!
//! - impression_daily: 按 (ad_id, country, day, placement) 聚合的天级展示数
//! - impression_logs: 原始展示日志（可选，默认关闭）

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ImpressionDaily::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ImpressionDaily::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ImpressionDaily::AdId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ImpressionDaily::Country)
                            .string_len(8)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ImpressionDaily::Day).date().not_null())
                    .col(
                        ColumnDef::new(ImpressionDaily::Placement)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ImpressionDaily::ViewCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        // 唯一索引：upsert 的冲突目标
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_impression_daily_key")
                    .table(ImpressionDaily::Table)
                    .col(ImpressionDaily::AdId)
                    .col(ImpressionDaily::Country)
                    .col(ImpressionDaily::Day)
                    .col(ImpressionDaily::Placement)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_impression_daily_day")
                    .table(ImpressionDaily::Table)
                    .col(ImpressionDaily::Day)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ImpressionLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ImpressionLog::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ImpressionLog::AdId).big_integer().not_null())
                    .col(
                        ColumnDef::new(ImpressionLog::Identity)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ImpressionLog::ServedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ImpressionLog::TagOnPage)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ImpressionLog::Country)
                            .string_len(8)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ImpressionLog::Placement)
                            .string_len(16)
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_impression_logs_served_at")
                    .table(ImpressionLog::Table)
                    .col(ImpressionLog::ServedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_impression_logs_served_at").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ImpressionLog::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_impression_daily_day").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_impression_daily_key").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ImpressionDaily::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ImpressionDaily {
    #[sea_orm(iden = "impression_daily")]
    Table,
    Id,
    AdId,
    Country,
    Day,
    Placement,
    ViewCount,
}

#[derive(DeriveIden)]
enum ImpressionLog {
    #[sea_orm(iden = "impression_logs")]
    Table,
    Id,
    AdId,
    Identity,
    ServedAt,
    TagOnPage,
    Country,
    Placement,
}
