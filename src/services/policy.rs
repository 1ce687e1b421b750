//! 限额与冷却策略引擎。
//!
//! 判定本身是无状态纯函数，作用在每次调用前新读出的历史快照上；
//! 这里的检查只做闸门，不保证并发下的原子性，最终写入的安全
//! 由签发事务与核销的条件更新兜底。

use crate::entities::{
    RedemptionFrequency, RedemptionStatus, deal_entity as deals, redemption_entity as redemptions,
};
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};

/// verified（码模式）与 redeemed（按钮模式）共同占用配额
const CONSUMED_STATUSES: [RedemptionStatus; 2] =
    [RedemptionStatus::Verified, RedemptionStatus::Redeemed];

/// 一次策略判定所需的历史快照
#[derive(Debug, Clone, Default)]
pub struct LimitSnapshot {
    pub user_consumed_count: u64,
    pub total_consumed_count: u64,
    pub last_consumed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyWindow {
    /// unlimited：不限制
    Unrestricted,
    /// once：终身一次
    Ever,
    /// weekly/monthly/custom：滑动窗口
    Within(Duration),
}

/// 频率策略到窗口的映射。
/// custom 档缺少有效天数时按终身一次处理（宁严勿宽）。
pub fn frequency_window(
    freq: &RedemptionFrequency,
    custom_days: Option<i32>,
) -> FrequencyWindow {
    match freq {
        RedemptionFrequency::Unlimited => FrequencyWindow::Unrestricted,
        RedemptionFrequency::Once => FrequencyWindow::Ever,
        RedemptionFrequency::Weekly => FrequencyWindow::Within(Duration::days(7)),
        RedemptionFrequency::Monthly => FrequencyWindow::Within(Duration::days(30)),
        RedemptionFrequency::Custom => match custom_days {
            Some(days) if days > 0 => FrequencyWindow::Within(Duration::days(i64::from(days))),
            _ => FrequencyWindow::Ever,
        },
    }
}

/// 最近一次消费是否落在频率窗口内
pub fn within_frequency_window(
    last_consumed_at: Option<DateTime<Utc>>,
    window: FrequencyWindow,
    now: DateTime<Utc>,
) -> bool {
    match window {
        FrequencyWindow::Unrestricted => false,
        FrequencyWindow::Ever => last_consumed_at.is_some(),
        FrequencyWindow::Within(span) => {
            last_consumed_at.is_some_and(|last| last > now - span)
        }
    }
}

/// 冷却剩余时长；无历史或窗口已过返回 None
pub fn cooldown_remaining(
    last_consumed_at: Option<DateTime<Utc>>,
    cooldown_hours: i32,
    now: DateTime<Utc>,
) -> Option<Duration> {
    if cooldown_hours <= 0 {
        return None;
    }
    let last = last_consumed_at?;
    let until = last + Duration::hours(i64::from(cooldown_hours));
    if until > now { Some(until - now) } else { None }
}

/// 签发前的限额判定，按 个人上限 -> 冷却 -> 全局上限 的顺序短路
pub fn evaluate_issue_policy(
    deal: &deals::Model,
    snapshot: &LimitSnapshot,
    now: DateTime<Utc>,
) -> AppResult<()> {
    // 个人上限缺省为 1
    let per_user_cap = if deal.max_redemptions_per_user > 0 {
        deal.max_redemptions_per_user as u64
    } else {
        1
    };
    if snapshot.user_consumed_count >= per_user_cap {
        return Err(AppError::LimitExceeded(format!(
            "per-user limit of {per_user_cap} reached"
        )));
    }

    if let Some(remaining) = cooldown_remaining(snapshot.last_consumed_at, deal.cooldown_hours, now)
    {
        let minutes = remaining.num_minutes().max(1);
        return Err(AppError::CooldownActive(format!(
            "try again in {minutes} minutes"
        )));
    }

    if let Some(total_cap) = deal.max_redemptions_total
        && total_cap > 0
        && snapshot.total_consumed_count >= total_cap as u64
    {
        return Err(AppError::LimitExceeded(
            "deal redemption budget exhausted".to_string(),
        ));
    }

    Ok(())
}

/// 历史查询层：每次判定前新读一份快照
#[derive(Clone, Default)]
pub struct PolicyService;

impl PolicyService {
    pub fn new() -> Self {
        Self
    }

    pub async fn user_consumed_count<C: ConnectionTrait>(
        &self,
        db: &C,
        deal_id: i64,
        user_id: i64,
    ) -> AppResult<u64> {
        let count = redemptions::Entity::find()
            .filter(redemptions::Column::DealId.eq(deal_id))
            .filter(redemptions::Column::UserId.eq(user_id))
            .filter(redemptions::Column::Status.is_in(CONSUMED_STATUSES))
            .count(db)
            .await?;
        Ok(count)
    }

    pub async fn total_consumed_count<C: ConnectionTrait>(
        &self,
        db: &C,
        deal_id: i64,
    ) -> AppResult<u64> {
        let count = redemptions::Entity::find()
            .filter(redemptions::Column::DealId.eq(deal_id))
            .filter(redemptions::Column::Status.is_in(CONSUMED_STATUSES))
            .count(db)
            .await?;
        Ok(count)
    }

    /// 最近一次消费时间（verified_at / redeemed_at，缺失回退 created_at）
    pub async fn last_consumed_at<C: ConnectionTrait>(
        &self,
        db: &C,
        deal_id: i64,
        user_id: i64,
    ) -> AppResult<Option<DateTime<Utc>>> {
        let rows = redemptions::Entity::find()
            .filter(redemptions::Column::DealId.eq(deal_id))
            .filter(redemptions::Column::UserId.eq(user_id))
            .filter(redemptions::Column::Status.is_in(CONSUMED_STATUSES))
            .all(db)
            .await?;

        Ok(rows
            .iter()
            .filter_map(|r| r.verified_at.or(r.redeemed_at).or(r.created_at))
            .max())
    }

    pub async fn limit_snapshot<C: ConnectionTrait>(
        &self,
        db: &C,
        deal_id: i64,
        user_id: i64,
    ) -> AppResult<LimitSnapshot> {
        Ok(LimitSnapshot {
            user_consumed_count: self.user_consumed_count(db, deal_id, user_id).await?,
            total_consumed_count: self.total_consumed_count(db, deal_id).await?,
            last_consumed_at: self.last_consumed_at(db, deal_id, user_id).await?,
        })
    }

    pub async fn frequency_violation<C: ConnectionTrait>(
        &self,
        db: &C,
        deal: &deals::Model,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let window = frequency_window(&deal.redemption_frequency, deal.custom_redemption_days);
        if window == FrequencyWindow::Unrestricted {
            return Ok(false);
        }
        let last = self.last_consumed_at(db, deal.id, user_id).await?;
        Ok(within_frequency_window(last, window, now))
    }

    /// (deal, user) 当前未过期的 issued 记录（幂等补发用）
    pub async fn active_issued_for<C: ConnectionTrait>(
        &self,
        db: &C,
        deal_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Option<redemptions::Model>> {
        let row = redemptions::Entity::find()
            .filter(redemptions::Column::DealId.eq(deal_id))
            .filter(redemptions::Column::UserId.eq(user_id))
            .filter(redemptions::Column::Status.eq(RedemptionStatus::Issued))
            .filter(redemptions::Column::ExpiresAt.gt(now))
            .one(db)
            .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ReservationTimeout;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn deal_with_limits(
        per_user: i32,
        total: Option<i32>,
        cooldown_hours: i32,
    ) -> deals::Model {
        deals::Model {
            id: 1,
            vendor_id: 1,
            title: "limits".to_string(),
            description: None,
            is_active: true,
            starts_at: None,
            ends_at: None,
            claim_window_minutes: 10,
            max_redemptions_per_user: per_user,
            max_redemptions_total: total,
            cooldown_hours,
            redemption_frequency: RedemptionFrequency::Unlimited,
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

    #[test]
    fn test_frequency_window_mapping() {
        assert_eq!(
            frequency_window(&RedemptionFrequency::Unlimited, None),
            FrequencyWindow::Unrestricted
        );
        assert_eq!(
            frequency_window(&RedemptionFrequency::Once, None),
            FrequencyWindow::Ever
        );
        assert_eq!(
            frequency_window(&RedemptionFrequency::Weekly, None),
            FrequencyWindow::Within(Duration::days(7))
        );
        assert_eq!(
            frequency_window(&RedemptionFrequency::Monthly, None),
            FrequencyWindow::Within(Duration::days(30))
        );
        assert_eq!(
            frequency_window(&RedemptionFrequency::Custom, Some(3)),
            FrequencyWindow::Within(Duration::days(3))
        );
        // custom 缺天数按终身一次兜底
        assert_eq!(
            frequency_window(&RedemptionFrequency::Custom, None),
            FrequencyWindow::Ever
        );
        assert_eq!(
            frequency_window(&RedemptionFrequency::Custom, Some(0)),
            FrequencyWindow::Ever
        );
    }

    #[test]
    fn test_weekly_window_blocks_midweek_allows_next_week() {
        // 周一兑换，周三再试被挡，八天后的周一可兑换
        let monday = Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap();
        let wednesday = Utc.with_ymd_and_hms(2026, 6, 3, 10, 0, 0).unwrap();
        let next_monday = Utc.with_ymd_and_hms(2026, 6, 9, 10, 0, 0).unwrap();
        let window = frequency_window(&RedemptionFrequency::Weekly, None);

        assert!(within_frequency_window(Some(monday), window, wednesday));
        assert!(!within_frequency_window(Some(monday), window, next_monday));
        assert!(!within_frequency_window(None, window, wednesday));
    }

    #[test]
    fn test_once_blocks_forever() {
        let window = frequency_window(&RedemptionFrequency::Once, None);
        let years_later = now() + Duration::days(365 * 10);
        assert!(within_frequency_window(Some(now()), window, years_later));
    }

    #[test]
    fn test_cooldown_remaining_boundaries() {
        // 168 小时冷却：100 小时处仍在冷却，168 小时处已结束
        let t0 = now();
        let remaining = cooldown_remaining(Some(t0), 168, t0 + Duration::hours(100));
        assert_eq!(remaining, Some(Duration::hours(68)));

        assert_eq!(cooldown_remaining(Some(t0), 168, t0 + Duration::hours(168)), None);
        assert_eq!(cooldown_remaining(None, 168, t0), None);
        assert_eq!(cooldown_remaining(Some(t0), 0, t0), None);
    }

    #[test]
    fn test_issue_policy_per_user_cap_defaults_to_one() {
        let deal = deal_with_limits(0, None, 0);
        let blocked = LimitSnapshot {
            user_consumed_count: 1,
            ..Default::default()
        };
        assert!(matches!(
            evaluate_issue_policy(&deal, &blocked, now()),
            Err(AppError::LimitExceeded(_))
        ));
        assert!(evaluate_issue_policy(&deal, &LimitSnapshot::default(), now()).is_ok());
    }

    #[test]
    fn test_issue_policy_global_cap_blocks_fresh_user() {
        // 全局上限 2 已用满：个人配额未用也拒绝
        let deal = deal_with_limits(1, Some(2), 0);
        let snapshot = LimitSnapshot {
            user_consumed_count: 0,
            total_consumed_count: 2,
            last_consumed_at: None,
        };
        assert!(matches!(
            evaluate_issue_policy(&deal, &snapshot, now()),
            Err(AppError::LimitExceeded(_))
        ));
    }

    #[test]
    fn test_issue_policy_cooldown_before_global_cap() {
        let deal = deal_with_limits(5, Some(10), 168);
        let snapshot = LimitSnapshot {
            user_consumed_count: 1,
            total_consumed_count: 1,
            last_consumed_at: Some(now() - Duration::hours(100)),
        };
        assert!(matches!(
            evaluate_issue_policy(&deal, &snapshot, now()),
            Err(AppError::CooldownActive(_))
        ));

        // 冷却期满即放行
        let snapshot = LimitSnapshot {
            last_consumed_at: Some(now() - Duration::hours(168)),
            user_consumed_count: 1,
            total_consumed_count: 1,
        };
        assert!(evaluate_issue_policy(&deal, &snapshot, now()).is_ok());
    }
}
