use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 同一 (deal_id, user_id) 在任一时刻最多一条 issued 记录。
        // 应用层先查后插有竞态，最终一致性由这个部分唯一索引兜底；
        // 并发插入撞索引时业务侧按幂等补发处理。
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS uq_redemptions_single_issued \
                 ON redemptions (deal_id, user_id) WHERE status = 'issued'",
            )
            .await?;

        // 过期清扫按 (status, expires_at) 扫描
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_redemptions_status_expires_at \
                 ON redemptions (status, expires_at)",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP INDEX IF EXISTS idx_redemptions_status_expires_at")
            .await?;
        manager
            .get_connection()
            .execute_unprepared("DROP INDEX IF EXISTS uq_redemptions_single_issued")
            .await?;
        Ok(())
    }
}
