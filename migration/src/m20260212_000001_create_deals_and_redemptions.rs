use sea_orm_migration::prelude::*;
use sea_orm_migration::prelude::extension::postgres::Type;

#[derive(DeriveIden)]
enum Deals {
    Table,
    Id,
    VendorId,
    Title,
    Description,
    IsActive,
    StartsAt,
    EndsAt,
    ClaimWindowMinutes,
    MaxRedemptionsPerUser,
    MaxRedemptionsTotal,
    CooldownHours,
    IsPassLocked,
    Tier,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Redemptions {
    Table,
    Id,
    DealId,
    VendorId,
    UserId,
    Status,
    Code,
    IssuedAt,
    ExpiresAt,
    VerifiedAt,
    VoidedAt,
    VoidReason,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 兑换记录状态枚举（按钮模式的 redeemed 值在后续迁移中加入）
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("redemption_status"))
                    .values(vec![
                        Alias::new("issued"),
                        Alias::new("verified"),
                        Alias::new("expired"),
                        Alias::new("voided"),
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Deals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Deals::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Deals::VendorId).big_integer().not_null())
                    .col(ColumnDef::new(Deals::Title).string().not_null())
                    .col(ColumnDef::new(Deals::Description).text().null())
                    .col(
                        ColumnDef::new(Deals::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Deals::StartsAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Deals::EndsAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Deals::ClaimWindowMinutes)
                            .integer()
                            .not_null()
                            .default(15),
                    )
                    .col(
                        ColumnDef::new(Deals::MaxRedemptionsPerUser)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(Deals::MaxRedemptionsTotal).integer().null())
                    .col(
                        ColumnDef::new(Deals::CooldownHours)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Deals::IsPassLocked)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Deals::Tier).string().null())
                    .col(
                        ColumnDef::new(Deals::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Deals::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_deals_vendor_id")
                    .table(Deals::Table)
                    .col(Deals::VendorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_deals_active")
                    .table(Deals::Table)
                    .col(Deals::IsActive)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Redemptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Redemptions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Redemptions::DealId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Redemptions::VendorId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Redemptions::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Redemptions::Status)
                            .custom(Alias::new("redemption_status"))
                            .not_null(),
                    )
                    .col(ColumnDef::new(Redemptions::Code).string().null())
                    .col(
                        ColumnDef::new(Redemptions::IssuedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Redemptions::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Redemptions::VerifiedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Redemptions::VoidedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Redemptions::VoidReason).string().null())
                    .col(
                        ColumnDef::new(Redemptions::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Redemptions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_redemptions_code")
                    .table(Redemptions::Table)
                    .col(Redemptions::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_redemptions_deal_user")
                    .table(Redemptions::Table)
                    .col(Redemptions::DealId)
                    .col(Redemptions::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_redemptions_vendor_id")
                    .table(Redemptions::Table)
                    .col(Redemptions::VendorId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Redemptions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Deals::Table).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(Alias::new("redemption_status")).to_owned())
            .await
    }
}
