use crate::entities::{RedemptionStatus, redemption_entity as redemptions};
use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 兑换记录对外的标签化视图。
///
/// 表里两种模式（时间锁码 / 按钮）共存，遗留列大量可空；
/// 响应层不直接暴露平铺行，而是按记录种类收敛成带公共基底的变体，
/// 各变体只携带对该种类有意义的字段。
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RedemptionState {
    Issued {
        code: String,
        issued_at: Option<DateTime<Utc>>,
        expires_at: DateTime<Utc>,
    },
    Verified {
        code: String,
        issued_at: Option<DateTime<Utc>>,
        verified_at: Option<DateTime<Utc>>,
    },
    Redeemed {
        redeemed_at: Option<DateTime<Utc>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    Expired {
        code: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    },
    Voided {
        voided_at: Option<DateTime<Utc>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RedemptionResponse {
    pub id: i64,
    pub deal_id: i64,
    pub vendor_id: i64,
    pub user_id: i64,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub state: RedemptionState,
}

impl TryFrom<redemptions::Model> for RedemptionResponse {
    type Error = AppError;

    fn try_from(rec: redemptions::Model) -> Result<Self, Self::Error> {
        let state = match rec.status {
            RedemptionStatus::Issued => RedemptionState::Issued {
                code: rec.code.ok_or_else(|| {
                    AppError::InternalError(format!("issued redemption {} has no code", rec.id))
                })?,
                issued_at: rec.issued_at,
                expires_at: rec.expires_at.ok_or_else(|| {
                    AppError::InternalError(format!(
                        "issued redemption {} has no expiry",
                        rec.id
                    ))
                })?,
            },
            RedemptionStatus::Verified => RedemptionState::Verified {
                code: rec.code.ok_or_else(|| {
                    AppError::InternalError(format!("verified redemption {} has no code", rec.id))
                })?,
                issued_at: rec.issued_at,
                verified_at: rec.verified_at,
            },
            RedemptionStatus::Redeemed => RedemptionState::Redeemed {
                redeemed_at: rec.redeemed_at,
                source: rec.source,
            },
            RedemptionStatus::Expired => RedemptionState::Expired {
                code: rec.code,
                expires_at: rec.expires_at,
            },
            RedemptionStatus::Voided => RedemptionState::Voided {
                voided_at: rec.voided_at,
                reason: rec.void_reason,
            },
        };

        Ok(Self {
            id: rec.id,
            deal_id: rec.deal_id,
            vendor_id: rec.vendor_id,
            user_id: rec.user_id,
            created_at: rec.created_at,
            state,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IssueCodeResponse {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyRequest {
    #[schema(example = "7FQK2MXR")]
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VoidRequest {
    #[schema(example = "customer dispute")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ButtonRedeemRequest {
    /// 渠道标识，如 app / web / kiosk
    #[schema(example = "app")]
    pub source: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CanRedeemResponse {
    pub can_redeem: bool,
    /// 拒绝原因码（INACTIVE_DEAL / OUTSIDE_WINDOW / ...），可兑换时为空
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RedemptionQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// issued/verified/redeemed/expired/voided
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_row() -> redemptions::Model {
        redemptions::Model {
            id: 1,
            deal_id: 10,
            vendor_id: 100,
            user_id: 1000,
            status: RedemptionStatus::Issued,
            code: Some("ABCD2345".to_string()),
            issued_at: Some(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()),
            expires_at: Some(Utc.with_ymd_and_hms(2026, 3, 1, 12, 15, 0).unwrap()),
            verified_at: None,
            redeemed_at: None,
            voided_at: None,
            void_reason: None,
            source: None,
            created_at: Some(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()),
            updated_at: None,
        }
    }

    #[test]
    fn test_issued_row_maps_to_issued_state() {
        let resp = RedemptionResponse::try_from(base_row()).unwrap();
        match resp.state {
            RedemptionState::Issued { code, expires_at, .. } => {
                assert_eq!(code, "ABCD2345");
                assert_eq!(
                    expires_at,
                    Utc.with_ymd_and_hms(2026, 3, 1, 12, 15, 0).unwrap()
                );
            }
            other => panic!("expected issued state, got {other:?}"),
        }
    }

    #[test]
    fn test_issued_row_without_code_is_rejected() {
        let mut row = base_row();
        row.code = None;
        assert!(RedemptionResponse::try_from(row).is_err());
    }

    #[test]
    fn test_button_row_maps_to_redeemed_state() {
        let mut row = base_row();
        row.status = RedemptionStatus::Redeemed;
        row.code = None;
        row.issued_at = None;
        row.expires_at = None;
        row.redeemed_at = Some(Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap());
        row.source = Some("app".to_string());

        let resp = RedemptionResponse::try_from(row).unwrap();
        match resp.state {
            RedemptionState::Redeemed { redeemed_at, source } => {
                assert!(redeemed_at.is_some());
                assert_eq!(source.as_deref(), Some("app"));
            }
            other => panic!("expected redeemed state, got {other:?}"),
        }
    }

    #[test]
    fn test_voided_row_keeps_reason() {
        let mut row = base_row();
        row.status = RedemptionStatus::Voided;
        row.voided_at = Some(Utc.with_ymd_and_hms(2026, 3, 3, 8, 0, 0).unwrap());
        row.void_reason = Some("customer dispute".to_string());

        let resp = RedemptionResponse::try_from(row).unwrap();
        match resp.state {
            RedemptionState::Voided { reason, .. } => {
                assert_eq!(reason.as_deref(), Some("customer dispute"));
            }
            other => panic!("expected voided state, got {other:?}"),
        }
    }
}
