use crate::config::NotifierConfig;
use crate::entities::redemption_entity as redemptions;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Serialize)]
struct RedemptionEvent {
    event_id: Uuid,
    event: &'static str,
    redemption_id: i64,
    deal_id: i64,
    vendor_id: i64,
    user_id: i64,
    occurred_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct NotifierService {
    client: Client,
    config: NotifierConfig,
}

impl NotifierService {
    pub fn new(config: NotifierConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }

    /// 核销/兑换成功后的旁路通知。
    /// 投递在独立任务里进行，失败只记日志，绝不影响已落库的兑换。
    pub fn notify(&self, event: &'static str, rec: &redemptions::Model) {
        let Some(url) = self.config.webhook_url.clone() else {
            log::debug!("Notifier disabled, skipping {event} for redemption {}", rec.id);
            return;
        };

        let payload = RedemptionEvent {
            event_id: Uuid::new_v4(),
            event,
            redemption_id: rec.id,
            deal_id: rec.deal_id,
            vendor_id: rec.vendor_id,
            user_id: rec.user_id,
            occurred_at: Utc::now(),
        };
        let client = self.client.clone();

        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {
                    log::info!(
                        "Notified {event} for redemption {} ({})",
                        payload.redemption_id,
                        payload.event_id
                    );
                }
                Ok(resp) => {
                    log::error!(
                        "Notification {event} for redemption {} rejected: HTTP {}",
                        payload.redemption_id,
                        resp.status()
                    );
                }
                Err(e) => {
                    log::error!(
                        "Failed to deliver {event} notification for redemption {}: {e}",
                        payload.redemption_id
                    );
                }
            }
        });
    }
}
