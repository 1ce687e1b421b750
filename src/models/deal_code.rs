use crate::entities::{CouponFlow, DealCodeStatus, deal_code_entity as deal_codes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SeedCodesRequest {
    /// 预生成的券码，逐个入池
    pub codes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SeedCodesResponse {
    pub inserted: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClaimCodeResponse {
    pub code: String,
    pub flow: CouponFlow,
    /// 一人一码池的预留截止时间；静态共享码无此字段
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DealCodeResponse {
    pub id: i64,
    pub deal_id: i64,
    pub code: String,
    pub status: DealCodeStatus,
    pub reserved_by: Option<i64>,
    pub reserved_until: Option<DateTime<Utc>>,
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl From<deal_codes::Model> for DealCodeResponse {
    fn from(code: deal_codes::Model) -> Self {
        Self {
            id: code.id,
            deal_id: code.deal_id,
            code: code.code,
            status: code.status,
            reserved_by: code.reserved_by,
            reserved_until: code.reserved_until,
            redeemed_at: code.redeemed_at,
        }
    }
}
