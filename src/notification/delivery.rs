use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::{info, warn};

use super::Notification;
use crate::error::Result;

/// Fire-and-forget delivery of user notifications
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        info!(
            threshold = %notification.threshold_id,
            family = %notification.family,
            "{}: {}",
            notification.title(),
            notification.body()
        );
        Ok(())
    }
}

/// Posts notifications through `osascript display notification`
#[cfg(target_os = "macos")]
#[derive(Debug, Default, Clone, Copy)]
pub struct OsascriptNotifier;

#[cfg(target_os = "macos")]
#[async_trait]
impl Notifier for OsascriptNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        use crate::error::Error;

        let script = format!(
            "display notification \"{}\" with title \"{}\"",
            escape(&notification.body()),
            escape(&notification.title())
        );
        let output = tokio::process::Command::new("osascript").arg("-e").arg(script).output().await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::system(format!(
                "osascript exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

#[cfg(target_os = "macos")]
fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Delivers `notification` on a separate task; failures are logged and dropped
pub fn dispatch(notifier: &Arc<dyn Notifier>, notification: Notification) {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        if let Err(err) = notifier.notify(&notification).await {
            warn!(threshold = %notification.threshold_id, error = %err, "Notification delivery failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::metrics::MetricFamily,
        error::Error,
        notification::Comparison,
    };

    fn notification() -> Notification {
        Notification {
            threshold_id: "disk-full".into(),
            family: MetricFamily::Disk,
            field: "usage".into(),
            value: 93.26,
            comparison: Comparison::GreaterThanOrEqual,
            trigger: 90.0,
        }
    }

    #[test]
    fn test_notification_text() {
        let n = notification();
        assert_eq!(n.title(), "DISK alert");
        assert_eq!(n.body(), "usage is 93.3 (>= 90)");
    }

    #[tokio::test]
    async fn test_failed_delivery_is_swallowed() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = parking_lot::Mutex::new(Some(tx));
        let mut mock = MockNotifier::new();
        mock.expect_notify().times(1).returning(move |n| {
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send(n.threshold_id.clone());
            }
            Err(Error::permission_denied("notifications not authorized"))
        });
        let notifier: Arc<dyn Notifier> = Arc::new(mock);

        dispatch(&notifier, notification());
        assert_eq!(rx.await.unwrap(), "disk-full");
    }

    #[tokio::test]
    async fn test_log_notifier_succeeds() {
        assert!(LogNotifier.notify(&notification()).await.is_ok());
    }
}
