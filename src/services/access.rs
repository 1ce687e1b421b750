//! 会员准入评估：纯函数，无共享状态，可并发调用。
//!
//! 身份子系统给出的会员字段可能过期、缺失甚至畸形，
//! 这里所有判定一律失败即拒绝（fail closed）。

use crate::entities::deal_entity as deals;
use crate::models::{AccessInfo, AccessReason, MembershipFields};
use chrono::{DateTime, Utc};

/// 会员通行证当前是否有效。
///
/// 仅当用户存在、`is_pass_member` 为真、`pass_expires_at` 存在、
/// 能按 RFC 3339 解析、且严格晚于 `now` 时为真。
pub fn has_active_membership(user: Option<&MembershipFields>, now: DateTime<Utc>) -> bool {
    let Some(user) = user else {
        return false;
    };
    if !user.is_pass_member {
        return false;
    }
    let Some(raw) = user.pass_expires_at.as_deref() else {
        return false;
    };
    match DateTime::parse_from_rfc3339(raw) {
        Ok(expires_at) => expires_at.with_timezone(&Utc) > now,
        Err(_) => false,
    }
}

/// 优惠是否会员锁定：显式开关优先，兼容旧数据的 tier 字段
pub fn is_membership_locked_deal(deal: &deals::Model) -> bool {
    if deal.is_pass_locked {
        return true;
    }
    matches!(
        deal.tier.as_deref().map(str::to_ascii_lowercase).as_deref(),
        Some("premium") | Some("member")
    )
}

pub fn can_access_deal(
    user: Option<&MembershipFields>,
    deal: &deals::Model,
    now: DateTime<Utc>,
) -> bool {
    if !is_membership_locked_deal(deal) {
        return true;
    }
    has_active_membership(user, now)
}

/// 带原因码的准入结果，仅用于前端文案，不做任何强制
pub fn access_info(
    user: Option<&MembershipFields>,
    deal: &deals::Model,
    now: DateTime<Utc>,
) -> AccessInfo {
    if !is_membership_locked_deal(deal) {
        return AccessInfo {
            allowed: true,
            reason: AccessReason::Public,
        };
    }
    if user.is_none() {
        return AccessInfo {
            allowed: false,
            reason: AccessReason::LockedNoUser,
        };
    }
    if has_active_membership(user, now) {
        AccessInfo {
            allowed: true,
            reason: AccessReason::MemberWithPass,
        }
    } else {
        AccessInfo {
            allowed: false,
            reason: AccessReason::LockedNoPass,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{RedemptionFrequency, ReservationTimeout};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn member(is_pass_member: bool, pass_expires_at: Option<&str>) -> MembershipFields {
        MembershipFields {
            user_id: 1,
            is_pass_member,
            pass_expires_at: pass_expires_at.map(str::to_string),
        }
    }

    fn deal(is_pass_locked: bool, tier: Option<&str>) -> deals::Model {
        deals::Model {
            id: 1,
            vendor_id: 1,
            title: "test deal".to_string(),
            description: None,
            is_active: true,
            starts_at: None,
            ends_at: None,
            claim_window_minutes: 15,
            max_redemptions_per_user: 1,
            max_redemptions_total: None,
            cooldown_hours: 0,
            redemption_frequency: RedemptionFrequency::Once,
            custom_redemption_days: None,
            is_pass_locked,
            tier: tier.map(str::to_string),
            coupon_flow: None,
            code_reserve_minutes: 30,
            reservation_timeout: ReservationTimeout::Release,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_membership_requires_all_conditions() {
        // 用户缺失
        assert!(!has_active_membership(None, now()));
        // 非会员
        assert!(!has_active_membership(
            Some(&member(false, Some("2027-01-01T00:00:00Z"))),
            now()
        ));
        // 缺过期时间
        assert!(!has_active_membership(Some(&member(true, None)), now()));
        // 畸形过期时间
        assert!(!has_active_membership(
            Some(&member(true, Some("not-a-date"))),
            now()
        ));
        // 已过期
        assert!(!has_active_membership(
            Some(&member(true, Some("2026-01-01T00:00:00Z"))),
            now()
        ));
        // 恰好等于 now 也不放行（严格晚于）
        assert!(!has_active_membership(
            Some(&member(true, Some("2026-06-01T12:00:00Z"))),
            now()
        ));
        // 全部满足
        assert!(has_active_membership(
            Some(&member(true, Some("2027-01-01T00:00:00Z"))),
            now()
        ));
    }

    #[test]
    fn test_membership_accepts_offset_timestamps() {
        // 带时区偏移的 RFC 3339 同样有效
        assert!(has_active_membership(
            Some(&member(true, Some("2027-01-01T08:00:00+08:00"))),
            now()
        ));
    }

    #[test]
    fn test_locked_deal_detection_with_legacy_tier() {
        assert!(is_membership_locked_deal(&deal(true, None)));
        assert!(is_membership_locked_deal(&deal(false, Some("premium"))));
        assert!(is_membership_locked_deal(&deal(false, Some("Member"))));
        assert!(!is_membership_locked_deal(&deal(false, Some("basic"))));
        assert!(!is_membership_locked_deal(&deal(false, None)));
    }

    #[test]
    fn test_unlocked_deal_is_accessible_to_anyone() {
        let d = deal(false, None);
        assert!(can_access_deal(None, &d, now()));
        assert!(can_access_deal(Some(&member(false, None)), &d, now()));
        assert_eq!(access_info(None, &d, now()).reason, AccessReason::Public);
    }

    #[test]
    fn test_locked_deal_gates_on_membership() {
        let d = deal(true, None);

        assert!(!can_access_deal(None, &d, now()));
        assert_eq!(
            access_info(None, &d, now()).reason,
            AccessReason::LockedNoUser
        );

        let lapsed = member(true, Some("2026-01-01T00:00:00Z"));
        assert!(!can_access_deal(Some(&lapsed), &d, now()));
        assert_eq!(
            access_info(Some(&lapsed), &d, now()).reason,
            AccessReason::LockedNoPass
        );

        let active = member(true, Some("2027-01-01T00:00:00Z"));
        assert!(can_access_deal(Some(&active), &d, now()));
        assert_eq!(
            access_info(Some(&active), &d, now()).reason,
            AccessReason::MemberWithPass
        );
    }
}
