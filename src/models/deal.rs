use crate::entities::{CouponFlow, RedemptionFrequency, ReservationTimeout, deal_entity as deals};
use crate::models::AccessInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateDealRequest {
    #[schema(example = "Two-for-one espresso")]
    pub title: String,
    pub description: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    /// 签发码的有效窗口（分钟）
    #[serde(default = "default_claim_window")]
    pub claim_window_minutes: i32,
    #[serde(default = "default_per_user_cap")]
    pub max_redemptions_per_user: i32,
    pub max_redemptions_total: Option<i32>,
    #[serde(default)]
    pub cooldown_hours: i32,
    #[serde(default = "default_frequency")]
    pub redemption_frequency: RedemptionFrequency,
    pub custom_redemption_days: Option<i32>,
    #[serde(default)]
    pub is_pass_locked: bool,
    pub coupon_flow: Option<CouponFlow>,
    #[serde(default = "default_reserve_minutes")]
    pub code_reserve_minutes: i32,
    #[serde(default = "default_reservation_timeout")]
    pub reservation_timeout: ReservationTimeout,
}

fn default_claim_window() -> i32 {
    15
}

fn default_per_user_cap() -> i32 {
    1
}

fn default_frequency() -> RedemptionFrequency {
    RedemptionFrequency::Once
}

fn default_reserve_minutes() -> i32 {
    30
}

fn default_reservation_timeout() -> ReservationTimeout {
    ReservationTimeout::Release
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateDealRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub claim_window_minutes: Option<i32>,
    pub max_redemptions_per_user: Option<i32>,
    pub max_redemptions_total: Option<i32>,
    pub cooldown_hours: Option<i32>,
    pub redemption_frequency: Option<RedemptionFrequency>,
    pub custom_redemption_days: Option<i32>,
    pub is_pass_locked: Option<bool>,
    pub coupon_flow: Option<CouponFlow>,
    pub code_reserve_minutes: Option<i32>,
    pub reservation_timeout: Option<ReservationTimeout>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DealResponse {
    pub id: i64,
    pub vendor_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub claim_window_minutes: i32,
    pub max_redemptions_per_user: i32,
    pub max_redemptions_total: Option<i32>,
    pub cooldown_hours: i32,
    pub redemption_frequency: RedemptionFrequency,
    pub custom_redemption_days: Option<i32>,
    pub is_pass_locked: bool,
    pub coupon_flow: Option<CouponFlow>,
    pub created_at: Option<DateTime<Utc>>,
    /// 当前调用者对该优惠的可见性（用于前端文案）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<AccessInfo>,
}

impl DealResponse {
    pub fn from_model(deal: deals::Model, access: Option<AccessInfo>) -> Self {
        Self {
            id: deal.id,
            vendor_id: deal.vendor_id,
            title: deal.title,
            description: deal.description,
            is_active: deal.is_active,
            starts_at: deal.starts_at,
            ends_at: deal.ends_at,
            claim_window_minutes: deal.claim_window_minutes,
            max_redemptions_per_user: deal.max_redemptions_per_user,
            max_redemptions_total: deal.max_redemptions_total,
            cooldown_hours: deal.cooldown_hours,
            redemption_frequency: deal.redemption_frequency,
            custom_redemption_days: deal.custom_redemption_days,
            is_pass_locked: deal.is_pass_locked,
            coupon_flow: deal.coupon_flow,
            created_at: deal.created_at,
            access,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DealQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}
