use async_trait::async_trait;
use instrument::Symbol;
use rust_decimal::Decimal;

/// A user-visible event worth surfacing outside the structured logs: an executed or
/// rejected order, or a degraded-worker alert.
#[derive(Debug, Clone)]
pub enum Notification {
    OrderExecuted { symbol: Symbol, quantity: u64, price: Decimal },
    OrderRejected { symbol: Symbol, reason: String },
    WorkerDegraded { worker: &'static str, reason: String },
}

impl Notification {
    fn text(&self) -> String {
        match self {
            Notification::OrderExecuted { symbol, quantity, price } => {
                format!(":white_check_mark: filled {quantity} {symbol} @ {price}")
            }
            Notification::OrderRejected { symbol, reason } => {
                format!(":x: rejected {symbol}: {reason}")
            }
            Notification::WorkerDegraded { worker, reason } => {
                format!(":warning: {worker} degraded: {reason}")
            }
        }
    }
}

/// One method, implemented by a real sink and a logging fallback, per the ambient-stack's
/// notification requirement.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Posts to a Slack incoming webhook; used when `slack_webhook_url` is configured.
pub struct SlackWebhookSink {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackWebhookSink {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), webhook_url: webhook_url.into() }
    }
}

#[async_trait]
impl NotificationSink for SlackWebhookSink {
    async fn notify(&self, notification: Notification) {
        let body = serde_json::json!({ "text": notification.text() });
        if let Err(error) = self.client.post(&self.webhook_url).json(&body).send().await {
            tracing::warn!(%error, "failed to deliver slack notification");
        }
    }
}

/// Fallback sink used when notifications are disabled or no webhook is configured: emits a
/// structured log line instead of inventing a bespoke dashboard.
#[derive(Debug, Default)]
pub struct LoggingSink;

#[async_trait]
impl NotificationSink for LoggingSink {
    async fn notify(&self, notification: Notification) {
        match &notification {
            Notification::OrderExecuted { .. } => tracing::info!(text = %notification.text(), "notification"),
            Notification::OrderRejected { .. } => tracing::warn!(text = %notification.text(), "notification"),
            Notification::WorkerDegraded { .. } => tracing::error!(text = %notification.text(), "notification"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logging_sink_accepts_every_variant() {
        let sink = LoggingSink;
        sink.notify(Notification::OrderExecuted { symbol: Symbol::new("0700.HK"), quantity: 100, price: Decimal::ONE }).await;
        sink.notify(Notification::OrderRejected { symbol: Symbol::new("0700.HK"), reason: "test".to_string() }).await;
        sink.notify(Notification::WorkerDegraded { worker: "router", reason: "test".to_string() }).await;
    }
}
