use crate::config::RedemptionConfig;
use crate::entities::{
    RedemptionStatus, deal_entity as deals, redemption_entity as redemptions,
};
use crate::error::{AppError, AppResult};
use crate::external::NotifierService;
use crate::models::{
    IssueCodeResponse, PaginatedResponse, PaginationParams, RedemptionQuery, RedemptionResponse,
};
use crate::services::policy::{PolicyService, evaluate_issue_policy};
use crate::utils::generate_redemption_code;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
    TransactionTrait,
};
use std::sync::Arc;

/// 时间锁码模式：签发、核销、作废与历史查询
#[derive(Clone)]
pub struct CodeRedemptionService {
    pool: Arc<DatabaseConnection>,
    policy: PolicyService,
    notifier: NotifierService,
    settings: RedemptionConfig,
}

impl CodeRedemptionService {
    pub fn new(
        pool: impl Into<Arc<DatabaseConnection>>,
        policy: PolicyService,
        notifier: NotifierService,
        settings: RedemptionConfig,
    ) -> Self {
        Self {
            pool: pool.into(),
            policy,
            notifier,
            settings,
        }
    }

    /// 为 (deal, user) 签发一个限时兑换码。
    ///
    /// 顺序：优惠必须激活 -> 幂等补发未过期的 issued 码 -> 个人上限 ->
    /// 冷却 -> 全局上限 -> 生成唯一码并落库。
    /// 检查在事务内进行；并发签发撞上部分唯一索引时回落到幂等补发。
    pub async fn issue_code(&self, deal_id: i64, user_id: i64) -> AppResult<IssueCodeResponse> {
        self.issue_code_at(deal_id, user_id, Utc::now()).await
    }

    async fn issue_code_at(
        &self,
        deal_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<IssueCodeResponse> {
        let deal = deals::Entity::find_by_id(deal_id)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Deal not found".to_string()))?;
        if !deal.is_active {
            return Err(AppError::InactiveDeal);
        }

        let txn = self.pool.begin().await?;

        // 幂等补发：同一用户重复请求返回同一个活跃码，不算错误
        if let Some(existing) = self
            .policy
            .active_issued_for(&txn, deal.id, user_id, now)
            .await?
        {
            txn.commit().await?;
            return issued_code_response(existing);
        }

        let snapshot = self.policy.limit_snapshot(&txn, deal.id, user_id).await?;
        evaluate_issue_policy(&deal, &snapshot, now)?;

        let code = self.generate_unique_code(&txn).await?;
        let expires_at = now + Duration::minutes(i64::from(deal.claim_window_minutes.max(1)));

        let inserted = redemptions::ActiveModel {
            deal_id: Set(deal.id),
            vendor_id: Set(deal.vendor_id),
            user_id: Set(user_id),
            status: Set(RedemptionStatus::Issued),
            code: Set(Some(code.clone())),
            issued_at: Set(Some(now)),
            expires_at: Set(Some(expires_at)),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&txn)
        .await;

        match inserted {
            Ok(_) => {
                txn.commit().await?;
                Ok(IssueCodeResponse { code, expires_at })
            }
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                // 并发签发：另一请求已先落库，按幂等补发返回对方的码
                txn.rollback().await.ok();
                match self
                    .policy
                    .active_issued_for(self.pool.as_ref(), deal.id, user_id, now)
                    .await?
                {
                    Some(existing) => issued_code_response(existing),
                    None => Err(AppError::InternalError(format!(
                        "concurrent issuance conflict for deal {} user {user_id}",
                        deal.id
                    ))),
                }
            }
            Err(err) => {
                txn.rollback().await.ok();
                Err(err.into())
            }
        }
    }

    /// 商家核销兑换码。
    ///
    /// `issued -> verified` 是一次带状态守卫的条件更新；
    /// 并发核销的输家得到 AlreadyConsumed，这是预期结局而非故障，
    /// 商家设备超时重试因此是安全的。
    pub async fn verify(&self, code: &str, vendor_id: i64) -> AppResult<RedemptionResponse> {
        self.verify_at(code, vendor_id, Utc::now()).await
    }

    async fn verify_at(
        &self,
        code: &str,
        vendor_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<RedemptionResponse> {
        let rec = redemptions::Entity::find()
            .filter(redemptions::Column::Code.eq(code))
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Redemption code not found".to_string()))?;

        if rec.vendor_id != vendor_id {
            return Err(AppError::Unauthorized(
                "Redemption belongs to another vendor".to_string(),
            ));
        }

        match rec.status {
            RedemptionStatus::Verified
            | RedemptionStatus::Redeemed
            | RedemptionStatus::Voided => Err(AppError::AlreadyConsumed),
            RedemptionStatus::Expired => Err(AppError::Expired),
            RedemptionStatus::Issued => {
                let live = rec.expires_at.is_some_and(|e| e > now);
                if !live {
                    // 惰性过期标记：幂等副作用，顺带把行推进到 expired
                    redemptions::Entity::update_many()
                        .set(redemptions::ActiveModel {
                            status: Set(RedemptionStatus::Expired),
                            updated_at: Set(Some(now)),
                            ..Default::default()
                        })
                        .filter(redemptions::Column::Id.eq(rec.id))
                        .filter(redemptions::Column::Status.eq(RedemptionStatus::Issued))
                        .exec(self.pool.as_ref())
                        .await?;
                    return Err(AppError::Expired);
                }

                // 唯一的并发正确性机制：status 仍为 issued 才允许翻转
                let result = redemptions::Entity::update_many()
                    .set(redemptions::ActiveModel {
                        status: Set(RedemptionStatus::Verified),
                        verified_at: Set(Some(now)),
                        updated_at: Set(Some(now)),
                        ..Default::default()
                    })
                    .filter(redemptions::Column::Id.eq(rec.id))
                    .filter(redemptions::Column::Status.eq(RedemptionStatus::Issued))
                    .exec(self.pool.as_ref())
                    .await?;

                if result.rows_affected == 0 {
                    return Err(AppError::AlreadyConsumed);
                }

                let updated = redemptions::Entity::find_by_id(rec.id)
                    .one(self.pool.as_ref())
                    .await?
                    .ok_or_else(|| {
                        AppError::InternalError(format!(
                            "redemption {} vanished after verification",
                            rec.id
                        ))
                    })?;
                self.notifier.notify("redemption.verified", &updated);
                updated.try_into()
            }
        }
    }

    /// 作废：商家/运营发起，幂等且无条件（已作废时为空操作）
    pub async fn void(
        &self,
        redemption_id: i64,
        vendor_id: i64,
        reason: Option<String>,
    ) -> AppResult<RedemptionResponse> {
        let rec = redemptions::Entity::find_by_id(redemption_id)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Redemption not found".to_string()))?;

        if rec.vendor_id != vendor_id {
            return Err(AppError::Unauthorized(
                "Redemption belongs to another vendor".to_string(),
            ));
        }

        if rec.status == RedemptionStatus::Voided {
            return rec.try_into();
        }

        let now = Utc::now();
        let mut am = rec.into_active_model();
        am.status = Set(RedemptionStatus::Voided);
        am.voided_at = Set(Some(now));
        am.void_reason = Set(reason);
        am.updated_at = Set(Some(now));
        let updated = am.update(self.pool.as_ref()).await?;
        updated.try_into()
    }

    pub async fn list_for_user(
        &self,
        user_id: i64,
        query: &RedemptionQuery,
    ) -> AppResult<PaginatedResponse<RedemptionResponse>> {
        self.list(redemptions::Column::UserId, user_id, query).await
    }

    pub async fn list_for_vendor(
        &self,
        vendor_id: i64,
        query: &RedemptionQuery,
    ) -> AppResult<PaginatedResponse<RedemptionResponse>> {
        self.list(redemptions::Column::VendorId, vendor_id, query)
            .await
    }

    async fn list(
        &self,
        owner_column: redemptions::Column,
        owner_id: i64,
        query: &RedemptionQuery,
    ) -> AppResult<PaginatedResponse<RedemptionResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);

        let mut base_query = redemptions::Entity::find().filter(owner_column.eq(owner_id));
        if let Some(status) = query.status.as_deref() {
            base_query = base_query.filter(redemptions::Column::Status.eq(parse_status(status)?));
        }

        let total = base_query.clone().count(self.pool.as_ref()).await? as i64;

        let rows = base_query
            .order_by(redemptions::Column::CreatedAt, Order::Desc)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(self.pool.as_ref())
            .await?;

        let items: Vec<RedemptionResponse> = rows
            .into_iter()
            .filter_map(|row| match RedemptionResponse::try_from(row) {
                Ok(resp) => Some(resp),
                Err(e) => {
                    // 遗留脏行不拖垮整页列表
                    log::warn!("Skipping malformed redemption row: {e}");
                    None
                }
            })
            .collect();

        Ok(PaginatedResponse::new(items, &params, total))
    }

    /// 过期清扫：把错过核销窗口的 issued 行批量推进到 expired。
    /// 核销路径已有惰性标记，这里只是让聚合计数和历史列表保持干净。
    pub async fn sweep_expired(&self) -> AppResult<u64> {
        let now = Utc::now();
        let result = redemptions::Entity::update_many()
            .set(redemptions::ActiveModel {
                status: Set(RedemptionStatus::Expired),
                updated_at: Set(Some(now)),
                ..Default::default()
            })
            .filter(redemptions::Column::Status.eq(RedemptionStatus::Issued))
            .filter(redemptions::Column::ExpiresAt.lte(now))
            .exec(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected)
    }

    /// 生成未占用的兑换码：每个长度档位尝试有限次，
    /// 碰撞耗尽则加宽一位重试，最终放弃并报错
    async fn generate_unique_code<C: ConnectionTrait>(&self, db: &C) -> AppResult<String> {
        let base_len = self.settings.code_length.max(4);
        let attempts = self.settings.code_attempts_per_length.max(1);

        for widen in 0..=self.settings.code_max_widening {
            let len = base_len + widen;
            for _ in 0..attempts {
                let code = generate_redemption_code(len);
                let taken = redemptions::Entity::find()
                    .filter(redemptions::Column::Code.eq(code.as_str()))
                    .count(db)
                    .await?;
                if taken == 0 {
                    return Ok(code);
                }
                log::warn!("Redemption code collision at length {len}, regenerating");
            }
        }

        Err(AppError::CodeGenerationExhausted)
    }
}

fn issued_code_response(rec: redemptions::Model) -> AppResult<IssueCodeResponse> {
    match (rec.code, rec.expires_at) {
        (Some(code), Some(expires_at)) => Ok(IssueCodeResponse { code, expires_at }),
        _ => Err(AppError::InternalError(format!(
            "issued redemption {} is missing code or expiry",
            rec.id
        ))),
    }
}

fn parse_status(raw: &str) -> AppResult<RedemptionStatus> {
    match raw {
        "issued" => Ok(RedemptionStatus::Issued),
        "verified" => Ok(RedemptionStatus::Verified),
        "redeemed" => Ok(RedemptionStatus::Redeemed),
        "expired" => Ok(RedemptionStatus::Expired),
        "voided" => Ok(RedemptionStatus::Voided),
        other => Err(AppError::ValidationError(format!(
            "Unknown redemption status: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotifierConfig;
    use crate::models::RedemptionState;
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn service(pool: DatabaseConnection) -> CodeRedemptionService {
        CodeRedemptionService::new(
            pool,
            PolicyService::new(),
            NotifierService::new(NotifierConfig::default()),
            RedemptionConfig::default(),
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn issued_row(expires_at: DateTime<Utc>) -> redemptions::Model {
        redemptions::Model {
            id: 7,
            deal_id: 1,
            vendor_id: 100,
            user_id: 1000,
            status: RedemptionStatus::Issued,
            code: Some("QXK7M2WF".to_string()),
            issued_at: Some(now() - Duration::minutes(5)),
            expires_at: Some(expires_at),
            verified_at: None,
            redeemed_at: None,
            voided_at: None,
            void_reason: None,
            source: None,
            created_at: Some(now() - Duration::minutes(5)),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_verify_flips_issued_to_verified() {
        let mut verified = issued_row(now() + Duration::minutes(5));
        verified.status = RedemptionStatus::Verified;
        verified.verified_at = Some(now());

        let pool = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![issued_row(now() + Duration::minutes(5))]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![verified]])
            .into_connection();

        let resp = service(pool).verify_at("QXK7M2WF", 100, now()).await.unwrap();
        assert!(matches!(resp.state, RedemptionState::Verified { .. }));
    }

    #[tokio::test]
    async fn test_verify_race_loser_gets_already_consumed() {
        // 条件更新没打中任何行：另一台设备已经核销
        let pool = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![issued_row(now() + Duration::minutes(5))]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let err = service(pool)
            .verify_at("QXK7M2WF", 100, now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyConsumed));
    }

    #[tokio::test]
    async fn test_verify_past_expiry_marks_expired() {
        let pool = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![issued_row(now() - Duration::minutes(1))]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let err = service(pool)
            .verify_at("QXK7M2WF", 100, now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Expired));
    }

    #[tokio::test]
    async fn test_verify_rejects_foreign_vendor() {
        let pool = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![issued_row(now() + Duration::minutes(5))]])
            .into_connection();

        let err = service(pool)
            .verify_at("QXK7M2WF", 999, now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_verify_unknown_code_is_not_found() {
        let pool = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<redemptions::Model>::new()])
            .into_connection();

        let err = service(pool)
            .verify_at("NOPE2345", 100, now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_void_is_idempotent_on_voided_rows() {
        let mut voided = issued_row(now() + Duration::minutes(5));
        voided.status = RedemptionStatus::Voided;
        voided.voided_at = Some(now() - Duration::minutes(1));
        voided.void_reason = Some("test".to_string());

        // 只有一次查询、没有写：重复作废是空操作
        let pool = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![voided]])
            .into_connection();

        let resp = service(pool).void(7, 100, None).await.unwrap();
        assert!(matches!(resp.state, RedemptionState::Voided { .. }));
    }
}
