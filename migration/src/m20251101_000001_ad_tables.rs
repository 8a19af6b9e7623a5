//! 广告投放核心表
//!
//! - ads: 广告库存（由外部管理后台维护，投放引擎只读）
//! - visitor_profiles: 访客档案，day_start_ms 标记当前 24 小时计数周期
//! - visitor_ad_views: 访客 × 广告的周期内展示计数
//! - sync_mappings: 第三方同步 ID → 内部访客 ID

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 1. ads
        manager
            .create_table(
                Table::create()
                    .table(Ad::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Ad::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Ad::Name)
                            .string_len(255)
                            .not_null()
                            .default("unnamed"),
                    )
                    .col(ColumnDef::new(Ad::Size).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Ad::State)
                            .string_len(16)
                            .not_null()
                            .default("inactive"),
                    )
                    .col(
                        ColumnDef::new(Ad::PriceMicros)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Ad::FrequencyCap)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Ad::Tag).text().not_null())
                    .col(
                        ColumnDef::new(Ad::Deleted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Ad::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 候选查询：size + state + deleted，按 price 排序
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_ads_size_state_price")
                    .table(Ad::Table)
                    .col(Ad::Size)
                    .col(Ad::State)
                    .col(Ad::Deleted)
                    .col(Ad::PriceMicros)
                    .to_owned(),
            )
            .await?;

        // 2. visitor_profiles
        manager
            .create_table(
                Table::create()
                    .table(VisitorProfile::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VisitorProfile::Identity)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VisitorProfile::DayStartMs)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VisitorProfile::LastKnownIp)
                            .string_len(64)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(VisitorProfile::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 3. visitor_ad_views（复合主键：identity + ad_id）
        manager
            .create_table(
                Table::create()
                    .table(VisitorAdView::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VisitorAdView::Identity)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(VisitorAdView::AdId).big_integer().not_null())
                    .col(
                        ColumnDef::new(VisitorAdView::EpochStartMs)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VisitorAdView::ViewCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .primary_key(
                        Index::create()
                            .name("pk_visitor_ad_views")
                            .col(VisitorAdView::Identity)
                            .col(VisitorAdView::AdId),
                    )
                    .to_owned(),
            )
            .await?;

        // 4. sync_mappings
        manager
            .create_table(
                Table::create()
                    .table(SyncMapping::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncMapping::ExternalSyncId)
                            .string_len(255)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SyncMapping::Identity)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SyncMapping::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 反查：某访客关联了哪些外部 ID
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_sync_mappings_identity")
                    .table(SyncMapping::Table)
                    .col(SyncMapping::Identity)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_sync_mappings_identity").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SyncMapping::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VisitorAdView::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VisitorProfile::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_ads_size_state_price").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Ad::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Ad {
    #[sea_orm(iden = "ads")]
    Table,
    Id,
    Name,
    Size,
    State,
    PriceMicros,
    FrequencyCap,
    Tag,
    Deleted,
    CreatedAt,
}

#[derive(DeriveIden)]
enum VisitorProfile {
    #[sea_orm(iden = "visitor_profiles")]
    Table,
    Identity,
    DayStartMs,
    LastKnownIp,
    CreatedAt,
}

#[derive(DeriveIden)]
enum VisitorAdView {
    #[sea_orm(iden = "visitor_ad_views")]
    Table,
    Identity,
    AdId,
    EpochStartMs,
    ViewCount,
}

#[derive(DeriveIden)]
enum SyncMapping {
    #[sea_orm(iden = "sync_mappings")]
    Table,
    ExternalSyncId,
    Identity,
    CreatedAt,
}
