use crate::entities::{
    CouponFlow, DealCodeStatus, ReservationTimeout, deal_code_entity as deal_codes,
    deal_entity as deals,
};
use crate::error::{AppError, AppResult};
use crate::models::{ClaimCodeResponse, DealCodeResponse, MembershipFields, SeedCodesResponse};
use crate::services::access;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect,
    Set, SqlErr,
};
use std::collections::HashSet;
use std::sync::Arc;

/// 预留竞争的重试轮数与每轮候选数
const RESERVE_ROUNDS: usize = 3;
const RESERVE_CANDIDATES: u64 = 5;

/// 预生成券码池：静态共享码与一人一码两种外部优惠券流程
#[derive(Clone)]
pub struct DealCodePoolService {
    pool: Arc<DatabaseConnection>,
}

impl DealCodePoolService {
    pub fn new(pool: impl Into<Arc<DatabaseConnection>>) -> Self {
        Self { pool: pool.into() }
    }

    /// 商家灌入预生成券码
    pub async fn seed_codes(
        &self,
        deal_id: i64,
        vendor_id: i64,
        codes: Vec<String>,
    ) -> AppResult<SeedCodesResponse> {
        let deal = self.load_deal(deal_id).await?;
        if deal.vendor_id != vendor_id {
            return Err(AppError::Unauthorized(
                "Deal belongs to another vendor".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let cleaned: Vec<String> = codes
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .filter(|c| seen.insert(c.clone()))
            .collect();
        if cleaned.is_empty() {
            return Err(AppError::ValidationError("No codes provided".to_string()));
        }

        let now = Utc::now();
        let inserted = cleaned.len();
        let rows = cleaned.into_iter().map(|code| deal_codes::ActiveModel {
            deal_id: Set(deal.id),
            code: Set(code),
            status: Set(DealCodeStatus::Available),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        });

        match deal_codes::Entity::insert_many(rows).exec(self.pool.as_ref()).await {
            Ok(_) => Ok(SeedCodesResponse { inserted }),
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(AppError::ValidationError(
                    "One of the codes already exists for this deal".to_string(),
                ))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// 消费者领码。
    ///
    /// 先过访问评估器（会员锁定可短路）；静态共享码直接返回不做流转，
    /// 一人一码池用条件更新抢占一条 available 记录并绑定预留期。
    pub async fn claim(&self, deal_id: i64, user: &MembershipFields) -> AppResult<ClaimCodeResponse> {
        self.claim_at(deal_id, user, Utc::now()).await
    }

    async fn claim_at(
        &self,
        deal_id: i64,
        user: &MembershipFields,
        now: DateTime<Utc>,
    ) -> AppResult<ClaimCodeResponse> {
        let deal = self.load_deal(deal_id).await?;
        if !deal.is_active {
            return Err(AppError::InactiveDeal);
        }
        let Some(flow) = deal.coupon_flow.clone() else {
            return Err(AppError::ValidationError(
                "Deal has no coupon flow".to_string(),
            ));
        };
        if !access::can_access_deal(Some(user), &deal, now) {
            return Err(AppError::Unauthorized(
                "Membership pass required".to_string(),
            ));
        }

        match flow {
            CouponFlow::FreeStaticCode => {
                // 所有符合条件的用户拿到同一个码，不做状态流转
                let code = deal_codes::Entity::find()
                    .filter(deal_codes::Column::DealId.eq(deal.id))
                    .order_by(deal_codes::Column::Id, Order::Asc)
                    .one(self.pool.as_ref())
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound("No coupon code configured for deal".to_string())
                    })?;
                Ok(ClaimCodeResponse {
                    code: code.code,
                    flow,
                    reserved_until: None,
                })
            }
            CouponFlow::PassUniqueCodePool => {
                // 一人一码池是会员流程，无论优惠是否另行锁定
                if !access::has_active_membership(Some(user), now) {
                    return Err(AppError::Unauthorized(
                        "Membership pass required".to_string(),
                    ));
                }

                // 幂等：已有未过期预留直接补发
                if let Some(mine) = deal_codes::Entity::find()
                    .filter(deal_codes::Column::DealId.eq(deal.id))
                    .filter(deal_codes::Column::Status.eq(DealCodeStatus::Reserved))
                    .filter(deal_codes::Column::ReservedBy.eq(user.user_id))
                    .filter(deal_codes::Column::ReservedUntil.gt(now))
                    .one(self.pool.as_ref())
                    .await?
                {
                    return Ok(ClaimCodeResponse {
                        code: mine.code,
                        flow,
                        reserved_until: mine.reserved_until,
                    });
                }

                let reserved_until =
                    now + Duration::minutes(i64::from(deal.code_reserve_minutes.max(1)));
                self.reserve_one(deal.id, user.user_id, reserved_until, flow)
                    .await
            }
        }
    }

    /// 抢占一条 available 券码：逐个候选做条件更新，
    /// 全部输掉说明竞争激烈，重读候选再来，轮数有限
    async fn reserve_one(
        &self,
        deal_id: i64,
        user_id: i64,
        reserved_until: DateTime<Utc>,
        flow: CouponFlow,
    ) -> AppResult<ClaimCodeResponse> {
        for _ in 0..RESERVE_ROUNDS {
            let candidates = deal_codes::Entity::find()
                .filter(deal_codes::Column::DealId.eq(deal_id))
                .filter(deal_codes::Column::Status.eq(DealCodeStatus::Available))
                .order_by(deal_codes::Column::Id, Order::Asc)
                .limit(RESERVE_CANDIDATES)
                .all(self.pool.as_ref())
                .await?;

            if candidates.is_empty() {
                return Err(AppError::LimitExceeded(
                    "No coupon codes left in the pool".to_string(),
                ));
            }

            for candidate in candidates {
                let result = deal_codes::Entity::update_many()
                    .set(deal_codes::ActiveModel {
                        status: Set(DealCodeStatus::Reserved),
                        reserved_by: Set(Some(user_id)),
                        reserved_until: Set(Some(reserved_until)),
                        updated_at: Set(Some(Utc::now())),
                        ..Default::default()
                    })
                    .filter(deal_codes::Column::Id.eq(candidate.id))
                    .filter(deal_codes::Column::Status.eq(DealCodeStatus::Available))
                    .exec(self.pool.as_ref())
                    .await?;

                if result.rows_affected == 1 {
                    return Ok(ClaimCodeResponse {
                        code: candidate.code,
                        flow,
                        reserved_until: Some(reserved_until),
                    });
                }
            }
        }

        Err(AppError::LimitExceeded(
            "No coupon codes left in the pool".to_string(),
        ))
    }

    /// 商家把已预留的券码推进到 redeemed
    pub async fn redeem_code(&self, code: &str, vendor_id: i64) -> AppResult<DealCodeResponse> {
        self.redeem_code_at(code, vendor_id, Utc::now()).await
    }

    async fn redeem_code_at(
        &self,
        code: &str,
        vendor_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<DealCodeResponse> {
        let row = deal_codes::Entity::find()
            .filter(deal_codes::Column::Code.eq(code))
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Coupon code not found".to_string()))?;

        let deal = self.load_deal(row.deal_id).await?;
        if deal.vendor_id != vendor_id {
            return Err(AppError::Unauthorized(
                "Coupon belongs to another vendor".to_string(),
            ));
        }

        match row.status {
            DealCodeStatus::Redeemed => Err(AppError::AlreadyConsumed),
            DealCodeStatus::Expired => Err(AppError::Expired),
            DealCodeStatus::Available => Err(AppError::ValidationError(
                "Coupon code has not been claimed".to_string(),
            )),
            DealCodeStatus::Reserved => {
                let live = row.reserved_until.is_some_and(|u| u > now);
                if !live {
                    // 预留已超时：按交易策略先处置，再报告过期
                    self.expire_reservation(&row, deal.reservation_timeout, now)
                        .await?;
                    return Err(AppError::Expired);
                }

                let result = deal_codes::Entity::update_many()
                    .set(deal_codes::ActiveModel {
                        status: Set(DealCodeStatus::Redeemed),
                        redeemed_at: Set(Some(now)),
                        updated_at: Set(Some(now)),
                        ..Default::default()
                    })
                    .filter(deal_codes::Column::Id.eq(row.id))
                    .filter(deal_codes::Column::Status.eq(DealCodeStatus::Reserved))
                    .exec(self.pool.as_ref())
                    .await?;

                if result.rows_affected == 0 {
                    return Err(AppError::AlreadyConsumed);
                }

                let updated = deal_codes::Entity::find_by_id(row.id)
                    .one(self.pool.as_ref())
                    .await?
                    .ok_or_else(|| {
                        AppError::InternalError(format!(
                            "deal code {} vanished after redemption",
                            row.id
                        ))
                    })?;
                Ok(updated.into())
            }
        }
    }

    /// 预留超时清扫：release 策略回池复用，retire 策略直接作废
    pub async fn sweep_reservations(&self) -> AppResult<u64> {
        self.sweep_reservations_at(Utc::now()).await
    }

    async fn sweep_reservations_at(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let stale = deal_codes::Entity::find()
            .filter(deal_codes::Column::Status.eq(DealCodeStatus::Reserved))
            .filter(deal_codes::Column::ReservedUntil.lte(now))
            .all(self.pool.as_ref())
            .await?;
        if stale.is_empty() {
            return Ok(0);
        }

        let deal_ids: Vec<i64> = stale
            .iter()
            .map(|c| c.deal_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let retiring_deals: HashSet<i64> = deals::Entity::find()
            .filter(deals::Column::Id.is_in(deal_ids))
            .all(self.pool.as_ref())
            .await?
            .into_iter()
            .filter(|d| d.reservation_timeout == ReservationTimeout::Retire)
            .map(|d| d.id)
            .collect();

        let mut release_ids = Vec::new();
        let mut retire_ids = Vec::new();
        for code in &stale {
            if retiring_deals.contains(&code.deal_id) {
                retire_ids.push(code.id);
            } else {
                release_ids.push(code.id);
            }
        }

        let mut swept = 0;
        if !release_ids.is_empty() {
            let result = deal_codes::Entity::update_many()
                .set(deal_codes::ActiveModel {
                    status: Set(DealCodeStatus::Available),
                    reserved_by: Set(None),
                    reserved_until: Set(None),
                    updated_at: Set(Some(now)),
                    ..Default::default()
                })
                .filter(deal_codes::Column::Id.is_in(release_ids))
                .filter(deal_codes::Column::Status.eq(DealCodeStatus::Reserved))
                .exec(self.pool.as_ref())
                .await?;
            swept += result.rows_affected;
        }
        if !retire_ids.is_empty() {
            let result = deal_codes::Entity::update_many()
                .set(deal_codes::ActiveModel {
                    status: Set(DealCodeStatus::Expired),
                    updated_at: Set(Some(now)),
                    ..Default::default()
                })
                .filter(deal_codes::Column::Id.is_in(retire_ids))
                .filter(deal_codes::Column::Status.eq(DealCodeStatus::Reserved))
                .exec(self.pool.as_ref())
                .await?;
            swept += result.rows_affected;
        }

        Ok(swept)
    }

    async fn expire_reservation(
        &self,
        row: &deal_codes::Model,
        policy: ReservationTimeout,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let transition = match policy {
            ReservationTimeout::Release => deal_codes::ActiveModel {
                status: Set(DealCodeStatus::Available),
                reserved_by: Set(None),
                reserved_until: Set(None),
                updated_at: Set(Some(now)),
                ..Default::default()
            },
            ReservationTimeout::Retire => deal_codes::ActiveModel {
                status: Set(DealCodeStatus::Expired),
                updated_at: Set(Some(now)),
                ..Default::default()
            },
        };
        deal_codes::Entity::update_many()
            .set(transition)
            .filter(deal_codes::Column::Id.eq(row.id))
            .filter(deal_codes::Column::Status.eq(DealCodeStatus::Reserved))
            .exec(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn load_deal(&self, deal_id: i64) -> AppResult<deals::Model> {
        deals::Entity::find_by_id(deal_id)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Deal not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::RedemptionFrequency;
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn pool_deal(flow: Option<CouponFlow>, timeout: ReservationTimeout) -> deals::Model {
        deals::Model {
            id: 1,
            vendor_id: 100,
            title: "coupon deal".to_string(),
            description: None,
            is_active: true,
            starts_at: None,
            ends_at: None,
            claim_window_minutes: 15,
            max_redemptions_per_user: 1,
            max_redemptions_total: None,
            cooldown_hours: 0,
            redemption_frequency: RedemptionFrequency::Unlimited,
            custom_redemption_days: None,
            is_pass_locked: false,
            tier: None,
            coupon_flow: flow,
            code_reserve_minutes: 30,
            reservation_timeout: timeout,
            created_at: None,
            updated_at: None,
        }
    }

    fn available_code(id: i64, code: &str) -> deal_codes::Model {
        deal_codes::Model {
            id,
            deal_id: 1,
            code: code.to_string(),
            status: DealCodeStatus::Available,
            reserved_by: None,
            reserved_until: None,
            redeemed_at: None,
            created_at: Some(now()),
            updated_at: None,
        }
    }

    fn pass_member() -> MembershipFields {
        MembershipFields {
            user_id: 1000,
            is_pass_member: true,
            pass_expires_at: Some("2027-01-01T00:00:00Z".to_string()),
        }
    }

    #[tokio::test]
    async fn test_claim_reserves_first_available_code() {
        let pool = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![pool_deal(
                Some(CouponFlow::PassUniqueCodePool),
                ReservationTimeout::Release,
            )]])
            // 无既有预留
            .append_query_results([Vec::<deal_codes::Model>::new()])
            .append_query_results([vec![
                available_code(11, "POOL-A"),
                available_code(12, "POOL-B"),
            ]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let resp = DealCodePoolService::new(pool)
            .claim_at(1, &pass_member(), now())
            .await
            .unwrap();
        assert_eq!(resp.code, "POOL-A");
        assert!(resp.reserved_until.is_some());
    }

    #[tokio::test]
    async fn test_claim_falls_through_to_next_candidate_on_race() {
        // 第一条被并发请求抢走（条件更新打空），落到第二条
        let pool = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![pool_deal(
                Some(CouponFlow::PassUniqueCodePool),
                ReservationTimeout::Release,
            )]])
            .append_query_results([Vec::<deal_codes::Model>::new()])
            .append_query_results([vec![
                available_code(11, "POOL-A"),
                available_code(12, "POOL-B"),
            ]])
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .into_connection();

        let resp = DealCodePoolService::new(pool)
            .claim_at(1, &pass_member(), now())
            .await
            .unwrap();
        assert_eq!(resp.code, "POOL-B");
    }

    #[tokio::test]
    async fn test_claim_empty_pool_is_limit_exceeded() {
        let pool = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![pool_deal(
                Some(CouponFlow::PassUniqueCodePool),
                ReservationTimeout::Release,
            )]])
            .append_query_results([Vec::<deal_codes::Model>::new()])
            .append_query_results([Vec::<deal_codes::Model>::new()])
            .into_connection();

        let err = DealCodePoolService::new(pool)
            .claim_at(1, &pass_member(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LimitExceeded(_)));
    }

    #[tokio::test]
    async fn test_claim_pool_requires_active_pass() {
        let lapsed = MembershipFields {
            user_id: 1000,
            is_pass_member: true,
            pass_expires_at: Some("2026-01-01T00:00:00Z".to_string()),
        };
        let pool = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![pool_deal(
                Some(CouponFlow::PassUniqueCodePool),
                ReservationTimeout::Release,
            )]])
            .into_connection();

        let err = DealCodePoolService::new(pool)
            .claim_at(1, &lapsed, now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_claim_static_flow_returns_shared_code() {
        let pool = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![pool_deal(
                Some(CouponFlow::FreeStaticCode),
                ReservationTimeout::Release,
            )]])
            .append_query_results([vec![available_code(11, "SHARED10")]])
            .into_connection();

        let resp = DealCodePoolService::new(pool)
            .claim_at(1, &pass_member(), now())
            .await
            .unwrap();
        assert_eq!(resp.code, "SHARED10");
        assert!(resp.reserved_until.is_none());
    }

    #[tokio::test]
    async fn test_redeem_timed_out_reservation_reports_expired() {
        let mut reserved = available_code(11, "POOL-A");
        reserved.status = DealCodeStatus::Reserved;
        reserved.reserved_by = Some(1000);
        reserved.reserved_until = Some(now() - Duration::minutes(1));

        let pool = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![reserved]])
            .append_query_results([vec![pool_deal(
                Some(CouponFlow::PassUniqueCodePool),
                ReservationTimeout::Release,
            )]])
            // 超时处置的条件更新
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let err = DealCodePoolService::new(pool)
            .redeem_code_at("POOL-A", 100, now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Expired));
    }
}
