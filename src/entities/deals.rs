use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 按钮模式的兑换频率策略
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "redemption_frequency"
)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionFrequency {
    #[sea_orm(string_value = "once")]
    Once,
    #[sea_orm(string_value = "weekly")]
    Weekly,
    #[sea_orm(string_value = "monthly")]
    Monthly,
    #[sea_orm(string_value = "unlimited")]
    Unlimited,
    #[sea_orm(string_value = "custom")]
    Custom,
}

impl std::fmt::Display for RedemptionFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedemptionFrequency::Once => write!(f, "once"),
            RedemptionFrequency::Weekly => write!(f, "weekly"),
            RedemptionFrequency::Monthly => write!(f, "monthly"),
            RedemptionFrequency::Unlimited => write!(f, "unlimited"),
            RedemptionFrequency::Custom => write!(f, "custom"),
        }
    }
}

/// 外部优惠券流程：共享静态码 / 会员专属一人一码池
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "coupon_flow")]
#[serde(rename_all = "snake_case")]
pub enum CouponFlow {
    #[sea_orm(string_value = "free_static_code")]
    FreeStaticCode,
    #[sea_orm(string_value = "pass_unique_code_pool")]
    PassUniqueCodePool,
}

impl std::fmt::Display for CouponFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CouponFlow::FreeStaticCode => write!(f, "free_static_code"),
            CouponFlow::PassUniqueCodePool => write!(f, "pass_unique_code_pool"),
        }
    }
}

/// 预留超时后的去向：回池可复用，或直接作废
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "reservation_timeout"
)]
#[serde(rename_all = "snake_case")]
pub enum ReservationTimeout {
    #[sea_orm(string_value = "release")]
    Release,
    #[sea_orm(string_value = "retire")]
    Retire,
}

impl std::fmt::Display for ReservationTimeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReservationTimeout::Release => write!(f, "release"),
            ReservationTimeout::Retire => write!(f, "retire"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "deals")]
pub struct Model {
    #[sea_orm(primary_key)]
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
    pub tier: Option<String>,
    pub coupon_flow: Option<CouponFlow>,
    pub code_reserve_minutes: i32,
    pub reservation_timeout: ReservationTimeout,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
