use sea_orm_migration::prelude::*;
use sea_orm_migration::prelude::extension::postgres::Type;

#[derive(DeriveIden)]
enum Deals {
    Table,
    CouponFlow,
    CodeReserveMinutes,
    ReservationTimeout,
}

#[derive(DeriveIden)]
enum DealCodes {
    Table,
    Id,
    DealId,
    Code,
    Status,
    ReservedBy,
    ReservedUntil,
    RedeemedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("deal_code_status"))
                    .values(vec![
                        Alias::new("available"),
                        Alias::new("reserved"),
                        Alias::new("redeemed"),
                        Alias::new("expired"),
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("coupon_flow"))
                    .values(vec![
                        Alias::new("free_static_code"),
                        Alias::new("pass_unique_code_pool"),
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("reservation_timeout"))
                    .values(vec![Alias::new("release"), Alias::new("retire")])
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Deals::Table)
                    .add_column(
                        ColumnDef::new(Deals::CouponFlow)
                            .custom(Alias::new("coupon_flow"))
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Deals::Table)
                    .add_column(
                        ColumnDef::new(Deals::CodeReserveMinutes)
                            .integer()
                            .not_null()
                            .default(30),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Deals::Table)
                    .add_column(
                        ColumnDef::new(Deals::ReservationTimeout)
                            .custom(Alias::new("reservation_timeout"))
                            .not_null()
                            .default("release"),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DealCodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DealCodes::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DealCodes::DealId).big_integer().not_null())
                    .col(ColumnDef::new(DealCodes::Code).string().not_null())
                    .col(
                        ColumnDef::new(DealCodes::Status)
                            .custom(Alias::new("deal_code_status"))
                            .not_null()
                            .default("available"),
                    )
                    .col(ColumnDef::new(DealCodes::ReservedBy).big_integer().null())
                    .col(
                        ColumnDef::new(DealCodes::ReservedUntil)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(DealCodes::RedeemedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(DealCodes::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(DealCodes::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_deal_codes_deal_code")
                    .table(DealCodes::Table)
                    .col(DealCodes::DealId)
                    .col(DealCodes::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 预留超时清扫按 (status, reserved_until) 扫描
        manager
            .create_index(
                Index::create()
                    .name("idx_deal_codes_status_reserved_until")
                    .table(DealCodes::Table)
                    .col(DealCodes::Status)
                    .col(DealCodes::ReservedUntil)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DealCodes::Table).to_owned())
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Deals::Table)
                    .drop_column(Deals::ReservationTimeout)
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Deals::Table)
                    .drop_column(Deals::CodeReserveMinutes)
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Deals::Table)
                    .drop_column(Deals::CouponFlow)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_type(
                Type::drop()
                    .name(Alias::new("reservation_timeout"))
                    .to_owned(),
            )
            .await?;
        manager
            .drop_type(Type::drop().name(Alias::new("coupon_flow")).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(Alias::new("deal_code_status")).to_owned())
            .await
    }
}
