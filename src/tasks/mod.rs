//! Background scheduled tasks for the application.
//!
//! This module centralizes the recurring sweeps (expired issued codes and
//! timed-out pool reservations). Call `spawn_all` once during startup to
//! launch them.
//!
//! Expiry is already enforced lazily at verification time; the sweeps only
//! keep aggregate counts and pool states accurate between verifications.

use crate::services::{CodeRedemptionService, DealCodePoolService};

/// Spawn all background tasks.
///
/// Notes
/// - Each sweep is idempotent as implemented in its service and runs on its
///   own schedule.
/// - This function detaches tasks via `tokio::spawn`; it does not block.
pub fn spawn_all(
    code_service: CodeRedemptionService,
    pool_service: DealCodePoolService,
    sweep_interval_secs: u64,
) {
    let interval = std::time::Duration::from_secs(sweep_interval_secs.max(30));

    // 过期 issued 码清扫
    {
        let svc = code_service.clone();
        tokio::spawn(async move {
            loop {
                match svc.sweep_expired().await {
                    Ok(n) if n > 0 => log::info!("Expired redemption codes swept: {n}"),
                    Ok(_) => {}
                    Err(e) => log::error!("Failed to sweep expired redemptions: {e:?}"),
                }
                tokio::time::sleep(interval).await;
            }
        });
    }

    // 券码池预留超时清扫
    {
        let svc = pool_service.clone();
        tokio::spawn(async move {
            loop {
                match svc.sweep_reservations().await {
                    Ok(n) if n > 0 => log::info!("Timed-out code reservations swept: {n}"),
                    Ok(_) => {}
                    Err(e) => log::error!("Failed to sweep code reservations: {e:?}"),
                }
                tokio::time::sleep(interval).await;
            }
        });
    }
}
