use crate::entities::{RedemptionFrequency, deal_entity as deals};
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateDealRequest, DealQuery, DealResponse, MembershipFields, PaginatedResponse,
    PaginationParams, UpdateDealRequest,
};
use crate::services::access;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;

/// 商家侧的优惠管理（创建/编辑/查询）。
/// 兑换引擎对 deal 只读，聚合计数之外从不回写。
#[derive(Clone)]
pub struct DealService {
    pool: Arc<DatabaseConnection>,
}

impl DealService {
    pub fn new(pool: impl Into<Arc<DatabaseConnection>>) -> Self {
        Self { pool: pool.into() }
    }

    pub async fn create_deal(
        &self,
        vendor_id: i64,
        req: CreateDealRequest,
    ) -> AppResult<DealResponse> {
        validate_title(&req.title)?;
        validate_window(req.starts_at, req.ends_at)?;
        validate_frequency(&req.redemption_frequency, req.custom_redemption_days)?;
        if req.claim_window_minutes <= 0 {
            return Err(AppError::ValidationError(
                "claim_window_minutes must be positive".to_string(),
            ));
        }
        if req.max_redemptions_per_user <= 0 {
            return Err(AppError::ValidationError(
                "max_redemptions_per_user must be positive".to_string(),
            ));
        }
        if req.cooldown_hours < 0 {
            return Err(AppError::ValidationError(
                "cooldown_hours must not be negative".to_string(),
            ));
        }

        let now = Utc::now();
        let inserted = deals::ActiveModel {
            vendor_id: Set(vendor_id),
            title: Set(req.title),
            description: Set(req.description),
            is_active: Set(true),
            starts_at: Set(req.starts_at),
            ends_at: Set(req.ends_at),
            claim_window_minutes: Set(req.claim_window_minutes),
            max_redemptions_per_user: Set(req.max_redemptions_per_user),
            max_redemptions_total: Set(req.max_redemptions_total),
            cooldown_hours: Set(req.cooldown_hours),
            redemption_frequency: Set(req.redemption_frequency),
            custom_redemption_days: Set(req.custom_redemption_days),
            is_pass_locked: Set(req.is_pass_locked),
            tier: Set(None),
            coupon_flow: Set(req.coupon_flow),
            code_reserve_minutes: Set(req.code_reserve_minutes),
            reservation_timeout: Set(req.reservation_timeout),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(self.pool.as_ref())
        .await?;

        Ok(DealResponse::from_model(inserted, None))
    }

    pub async fn update_deal(
        &self,
        deal_id: i64,
        vendor_id: i64,
        req: UpdateDealRequest,
    ) -> AppResult<DealResponse> {
        let deal = self.load_deal(deal_id).await?;
        if deal.vendor_id != vendor_id {
            return Err(AppError::Unauthorized(
                "Deal belongs to another vendor".to_string(),
            ));
        }

        if let Some(title) = &req.title {
            validate_title(title)?;
        }
        let effective_frequency = req
            .redemption_frequency
            .clone()
            .unwrap_or_else(|| deal.redemption_frequency.clone());
        let effective_days = req.custom_redemption_days.or(deal.custom_redemption_days);
        validate_frequency(&effective_frequency, effective_days)?;
        validate_window(
            req.starts_at.or(deal.starts_at),
            req.ends_at.or(deal.ends_at),
        )?;

        let mut am = deal.into_active_model();
        if let Some(v) = req.title {
            am.title = Set(v);
        }
        if let Some(v) = req.description {
            am.description = Set(Some(v));
        }
        if let Some(v) = req.is_active {
            am.is_active = Set(v);
        }
        if let Some(v) = req.starts_at {
            am.starts_at = Set(Some(v));
        }
        if let Some(v) = req.ends_at {
            am.ends_at = Set(Some(v));
        }
        if let Some(v) = req.claim_window_minutes {
            if v <= 0 {
                return Err(AppError::ValidationError(
                    "claim_window_minutes must be positive".to_string(),
                ));
            }
            am.claim_window_minutes = Set(v);
        }
        if let Some(v) = req.max_redemptions_per_user {
            if v <= 0 {
                return Err(AppError::ValidationError(
                    "max_redemptions_per_user must be positive".to_string(),
                ));
            }
            am.max_redemptions_per_user = Set(v);
        }
        if let Some(v) = req.max_redemptions_total {
            am.max_redemptions_total = Set(Some(v));
        }
        if let Some(v) = req.cooldown_hours {
            if v < 0 {
                return Err(AppError::ValidationError(
                    "cooldown_hours must not be negative".to_string(),
                ));
            }
            am.cooldown_hours = Set(v);
        }
        if let Some(v) = req.redemption_frequency {
            am.redemption_frequency = Set(v);
        }
        if let Some(v) = req.custom_redemption_days {
            am.custom_redemption_days = Set(Some(v));
        }
        if let Some(v) = req.is_pass_locked {
            am.is_pass_locked = Set(v);
        }
        if let Some(v) = req.coupon_flow {
            am.coupon_flow = Set(Some(v));
        }
        if let Some(v) = req.code_reserve_minutes {
            am.code_reserve_minutes = Set(v);
        }
        if let Some(v) = req.reservation_timeout {
            am.reservation_timeout = Set(v);
        }
        am.updated_at = Set(Some(Utc::now()));

        let updated = am.update(self.pool.as_ref()).await?;
        Ok(DealResponse::from_model(updated, None))
    }

    pub async fn get_deal(
        &self,
        deal_id: i64,
        user: Option<&MembershipFields>,
    ) -> AppResult<DealResponse> {
        let deal = self.load_deal(deal_id).await?;
        let info = access::access_info(user, &deal, Utc::now());
        Ok(DealResponse::from_model(deal, Some(info)))
    }

    /// 公开列表：只露激活的优惠，逐条附上调用者的准入信息
    pub async fn list_active(
        &self,
        query: &DealQuery,
        user: Option<&MembershipFields>,
    ) -> AppResult<PaginatedResponse<DealResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);
        let now = Utc::now();

        let base_query = deals::Entity::find().filter(deals::Column::IsActive.eq(true));
        let total = base_query.clone().count(self.pool.as_ref()).await? as i64;

        let rows = base_query
            .order_by(deals::Column::CreatedAt, Order::Desc)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(self.pool.as_ref())
            .await?;

        let items = rows
            .into_iter()
            .map(|deal| {
                let info = access::access_info(user, &deal, now);
                DealResponse::from_model(deal, Some(info))
            })
            .collect();

        Ok(PaginatedResponse::new(items, &params, total))
    }

    async fn load_deal(&self, deal_id: i64) -> AppResult<deals::Model> {
        deals::Entity::find_by_id(deal_id)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Deal not found".to_string()))
    }
}

fn validate_title(title: &str) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::ValidationError("Title is required".to_string()));
    }
    Ok(())
}

fn validate_window(
    starts_at: Option<chrono::DateTime<Utc>>,
    ends_at: Option<chrono::DateTime<Utc>>,
) -> AppResult<()> {
    if let (Some(start), Some(end)) = (starts_at, ends_at)
        && end <= start
    {
        return Err(AppError::ValidationError(
            "ends_at must be after starts_at".to_string(),
        ));
    }
    Ok(())
}

fn validate_frequency(
    frequency: &RedemptionFrequency,
    custom_days: Option<i32>,
) -> AppResult<()> {
    if *frequency == RedemptionFrequency::Custom
        && !custom_days.is_some_and(|d| d > 0)
    {
        return Err(AppError::ValidationError(
            "custom frequency requires custom_redemption_days".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn service() -> DealService {
        DealService::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection())
    }

    fn base_request() -> CreateDealRequest {
        CreateDealRequest {
            title: "Lunch special".to_string(),
            description: None,
            starts_at: None,
            ends_at: None,
            claim_window_minutes: 15,
            max_redemptions_per_user: 1,
            max_redemptions_total: None,
            cooldown_hours: 0,
            redemption_frequency: RedemptionFrequency::Once,
            custom_redemption_days: None,
            is_pass_locked: false,
            coupon_flow: None,
            code_reserve_minutes: 30,
            reservation_timeout: crate::entities::ReservationTimeout::Release,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_blank_title() {
        let mut req = base_request();
        req.title = "   ".to_string();
        let err = service().create_deal(100, req).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_create_custom_frequency_requires_days() {
        let mut req = base_request();
        req.redemption_frequency = RedemptionFrequency::Custom;
        req.custom_redemption_days = None;
        let err = service().create_deal(100, req).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_inverted_window() {
        let mut req = base_request();
        req.starts_at = Some(Utc::now());
        req.ends_at = Some(Utc::now() - chrono::Duration::hours(1));
        let err = service().create_deal(100, req).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
