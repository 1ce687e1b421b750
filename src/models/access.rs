use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 身份子系统下发的会员字段（随令牌携带，引擎只读不写）。
/// `pass_expires_at` 保留原始字符串：来源可能过期或畸形，
/// 解析与判定统一由访问评估器完成。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipFields {
    pub user_id: i64,
    pub is_pass_member: bool,
    pub pass_expires_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    Public,
    MemberWithPass,
    LockedNoPass,
    LockedNoUser,
}

/// 仅用于前端文案，不参与任何准入判定
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccessInfo {
    pub allowed: bool,
    pub reason: AccessReason,
}
