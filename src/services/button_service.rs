use crate::entities::{RedemptionStatus, deal_entity as deals, redemption_entity as redemptions};
use crate::error::{AppError, AppResult};
use crate::external::NotifierService;
use crate::models::{CanRedeemResponse, RedemptionResponse};
use crate::services::policy::PolicyService;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;

/// 按钮模式：无码、即时终态的兑换记录
#[derive(Clone)]
pub struct ButtonRedemptionService {
    pool: Arc<DatabaseConnection>,
    policy: PolicyService,
    notifier: NotifierService,
}

impl ButtonRedemptionService {
    pub fn new(
        pool: impl Into<Arc<DatabaseConnection>>,
        policy: PolicyService,
        notifier: NotifierService,
    ) -> Self {
        Self {
            pool: pool.into(),
            policy,
            notifier,
        }
    }

    /// 一步到位的兑换：检查全过即插入一条 redeemed 记录，
    /// 没有签发/核销两段
    pub async fn redeem(
        &self,
        deal_id: i64,
        user_id: i64,
        source: Option<String>,
    ) -> AppResult<RedemptionResponse> {
        self.redeem_at(deal_id, user_id, source, Utc::now()).await
    }

    async fn redeem_at(
        &self,
        deal_id: i64,
        user_id: i64,
        source: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<RedemptionResponse> {
        let deal = self.load_deal(deal_id).await?;
        self.check_redeemable(&deal, user_id, now).await?;

        let inserted = redemptions::ActiveModel {
            deal_id: Set(deal.id),
            vendor_id: Set(deal.vendor_id),
            user_id: Set(user_id),
            status: Set(RedemptionStatus::Redeemed),
            redeemed_at: Set(Some(now)),
            source: Set(source),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(self.pool.as_ref())
        .await?;

        self.notifier.notify("redemption.redeemed", &inserted);
        inserted.try_into()
    }

    /// 只读探测，与 redeem 同一套检查，供前端提前置灰按钮
    pub async fn can_redeem(&self, deal_id: i64, user_id: i64) -> AppResult<CanRedeemResponse> {
        let deal = self.load_deal(deal_id).await?;
        match self.check_redeemable(&deal, user_id, Utc::now()).await {
            Ok(()) => Ok(CanRedeemResponse {
                can_redeem: true,
                reason: None,
                message: None,
            }),
            Err(
                err @ (AppError::InactiveDeal
                | AppError::OutsideWindow
                | AppError::FrequencyWindowActive(_)
                | AppError::LimitExceeded(_)),
            ) => Ok(CanRedeemResponse {
                can_redeem: false,
                reason: Some(err.code().to_string()),
                message: Some(err.to_string()),
            }),
            Err(err) => Err(err),
        }
    }

    async fn load_deal(&self, deal_id: i64) -> AppResult<deals::Model> {
        deals::Entity::find_by_id(deal_id)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Deal not found".to_string()))
    }

    /// 检查顺序：激活 -> 可用窗口 -> 频率窗口 -> 全局上限
    async fn check_redeemable(
        &self,
        deal: &deals::Model,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        if !deal.is_active {
            return Err(AppError::InactiveDeal);
        }
        if let Some(starts_at) = deal.starts_at
            && now < starts_at
        {
            return Err(AppError::OutsideWindow);
        }
        if let Some(ends_at) = deal.ends_at
            && now > ends_at
        {
            return Err(AppError::OutsideWindow);
        }

        if self
            .policy
            .frequency_violation(self.pool.as_ref(), deal, user_id, now)
            .await?
        {
            return Err(AppError::FrequencyWindowActive(format!(
                "{} deal already redeemed within its window",
                deal.redemption_frequency
            )));
        }

        if let Some(total_cap) = deal.max_redemptions_total
            && total_cap > 0
        {
            let consumed = self.policy.total_consumed_count(self.pool.as_ref(), deal.id).await?;
            if consumed >= total_cap as u64 {
                return Err(AppError::LimitExceeded(
                    "deal redemption budget exhausted".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotifierConfig;
    use crate::entities::{RedemptionFrequency, ReservationTimeout};
    use crate::models::RedemptionState;
    use chrono::{Duration, TimeZone};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn service(pool: DatabaseConnection) -> ButtonRedemptionService {
        ButtonRedemptionService::new(
            pool,
            PolicyService::new(),
            NotifierService::new(NotifierConfig::default()),
        )
    }

    fn monday() -> DateTime<Utc> {
        // 2026-06-01 是周一
        Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap()
    }

    fn weekly_deal() -> deals::Model {
        deals::Model {
            id: 1,
            vendor_id: 100,
            title: "weekly special".to_string(),
            description: None,
            is_active: true,
            starts_at: None,
            ends_at: None,
            claim_window_minutes: 15,
            max_redemptions_per_user: 1,
            max_redemptions_total: None,
            cooldown_hours: 0,
            redemption_frequency: RedemptionFrequency::Weekly,
            custom_redemption_days: None,
            is_pass_locked: false,
            tier: None,
            coupon_flow: None,
            code_reserve_minutes: 30,
            reservation_timeout: ReservationTimeout::Release,
            created_at: None,
            updated_at: None,
        }
    }

    fn redeemed_row(redeemed_at: DateTime<Utc>) -> redemptions::Model {
        redemptions::Model {
            id: 5,
            deal_id: 1,
            vendor_id: 100,
            user_id: 1000,
            status: RedemptionStatus::Redeemed,
            code: None,
            issued_at: None,
            expires_at: None,
            verified_at: None,
            redeemed_at: Some(redeemed_at),
            voided_at: None,
            void_reason: None,
            source: Some("app".to_string()),
            created_at: Some(redeemed_at),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_redeem_inserts_terminal_record() {
        let pool = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![weekly_deal()]])
            // 频率检查：无历史
            .append_query_results([Vec::<redemptions::Model>::new()])
            // insert 的 RETURNING 行
            .append_query_results([vec![redeemed_row(monday())]])
            .into_connection();

        let resp = service(pool)
            .redeem_at(1, 1000, Some("app".to_string()), monday())
            .await
            .unwrap();
        assert!(matches!(resp.state, RedemptionState::Redeemed { .. }));
    }

    #[tokio::test]
    async fn test_weekly_redeem_blocked_midweek() {
        // 周一已兑换，周三再试应被频率窗口挡下
        let wednesday = monday() + Duration::days(2);
        let pool = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![weekly_deal()]])
            .append_query_results([vec![redeemed_row(monday())]])
            .into_connection();

        let err = service(pool)
            .redeem_at(1, 1000, None, wednesday)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::FrequencyWindowActive(_)));
    }

    #[tokio::test]
    async fn test_weekly_redeem_allowed_next_week() {
        // 八天后窗口已过，重新可兑换
        let next_monday = monday() + Duration::days(8);
        let pool = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![weekly_deal()]])
            .append_query_results([vec![redeemed_row(monday())]])
            .append_query_results([vec![redeemed_row(next_monday)]])
            .into_connection();

        let resp = service(pool)
            .redeem_at(1, 1000, None, next_monday)
            .await
            .unwrap();
        assert!(matches!(resp.state, RedemptionState::Redeemed { .. }));
    }

    #[tokio::test]
    async fn test_redeem_outside_window_fails_before_any_write() {
        let mut deal = weekly_deal();
        deal.starts_at = Some(monday() + Duration::days(1));

        let pool = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![deal]])
            .into_connection();

        let err = service(pool).redeem_at(1, 1000, None, monday()).await.unwrap_err();
        assert!(matches!(err, AppError::OutsideWindow));
    }

    #[tokio::test]
    async fn test_can_redeem_reports_reason_for_inactive_deal() {
        let mut deal = weekly_deal();
        deal.is_active = false;

        let pool = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![deal]])
            .into_connection();

        let resp = service(pool).can_redeem(1, 1000).await.unwrap();
        assert!(!resp.can_redeem);
        assert_eq!(resp.reason.as_deref(), Some("INACTIVE_DEAL"));
    }
}
