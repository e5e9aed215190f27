use crate::error::EngineError;
use alerter::{overdue_alert_message, MessageSink};
use chrono::{Local, NaiveDate};
use core_types::{NotifyResult, OverdueOrder};
use database::OrderStore;
use std::sync::Arc;

/// Sends one alert per run listing every order that expired since the last alert.
pub struct Notifier {
    store: Arc<dyn OrderStore>,
    sink: Arc<dyn MessageSink>,
}

impl Notifier {
    pub fn new(store: Arc<dyn OrderStore>, sink: Arc<dyn MessageSink>) -> Self {
        Self { store, sink }
    }

    pub async fn notify_expired(&self) -> Result<NotifyResult, EngineError> {
        self.notify_expired_on(Local::now().date_naive()).await
    }

    /// Marks and reports every expired, unnotified order, counting overdue days up to `today`.
    ///
    /// Each mark is committed before the message is sent. If sending fails the
    /// marks stay, so those orders are not reported again until the next reset.
    pub async fn notify_expired_on(&self, today: NaiveDate) -> Result<NotifyResult, EngineError> {
        let pending = self.store.unnotified_expired().await?;
        if pending.is_empty() {
            tracing::debug!("No newly expired deliveries.");
            return Ok(NotifyResult::default());
        }

        let mut overdue = Vec::with_capacity(pending.len());
        for order in pending {
            self.store.mark_notified(&order.order_id).await?;
            overdue.push(OverdueOrder {
                days_overdue: (today - order.delivery_date).num_days(),
                order_id: order.order_id,
            });
        }
        overdue.sort_by(|a, b| b.days_overdue.cmp(&a.days_overdue).then_with(|| a.order_id.cmp(&b.order_id)));

        let message = overdue_alert_message(&overdue);
        if let Err(e) = self.sink.send_html(&message).await {
            tracing::error!(error = ?e, marked = overdue.len(), "Failed to send overdue alert; orders stay marked.");
            return Err(EngineError::NotifySendFailed(e));
        }

        tracing::info!(notified = overdue.len(), "Sent overdue delivery alert.");
        Ok(NotifyResult { notified: overdue, message_sent: true })
    }
}

/// Clears `notification_sent` on every expired order so the next notify run
/// reports them again.
///
/// This is tied to expiry rather than to notification history: an expired
/// order that was never notified is simply left as it was.
pub async fn reset_notifications(store: &dyn OrderStore) -> Result<u64, EngineError> {
    let reset = store.reset_expired_notifications().await?;
    tracing::info!(reset, "Reset notification status of expired orders.");
    Ok(reset)
}
