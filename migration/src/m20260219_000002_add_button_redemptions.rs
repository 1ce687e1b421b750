use sea_orm_migration::prelude::*;
use sea_orm_migration::prelude::extension::postgres::Type;

#[derive(DeriveIden)]
enum Deals {
    Table,
    RedemptionFrequency,
    CustomRedemptionDays,
}

#[derive(DeriveIden)]
enum Redemptions {
    Table,
    RedeemedAt,
    Source,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 按钮模式：状态枚举补充 redeemed（Postgres 12+ 支持在事务内 ADD VALUE）
        manager
            .get_connection()
            .execute_unprepared(
                "ALTER TYPE redemption_status ADD VALUE IF NOT EXISTS 'redeemed'",
            )
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("redemption_frequency"))
                    .values(vec![
                        Alias::new("once"),
                        Alias::new("weekly"),
                        Alias::new("monthly"),
                        Alias::new("unlimited"),
                        Alias::new("custom"),
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Deals::Table)
                    .add_column(
                        ColumnDef::new(Deals::RedemptionFrequency)
                            .custom(Alias::new("redemption_frequency"))
                            .not_null()
                            .default("once"),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Deals::Table)
                    .add_column(
                        ColumnDef::new(Deals::CustomRedemptionDays)
                            .integer()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Redemptions::Table)
                    .add_column(
                        ColumnDef::new(Redemptions::RedeemedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Redemptions::Table)
                    .add_column(ColumnDef::new(Redemptions::Source).string().null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Redemptions::Table)
                    .drop_column(Redemptions::Source)
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Redemptions::Table)
                    .drop_column(Redemptions::RedeemedAt)
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Deals::Table)
                    .drop_column(Deals::CustomRedemptionDays)
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Deals::Table)
                    .drop_column(Deals::RedemptionFrequency)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_type(
                Type::drop()
                    .name(Alias::new("redemption_frequency"))
                    .to_owned(),
            )
            .await
    }
}
