//! Notification collaborator

/// Receives user-facing messages from the session. Fire and forget.
pub trait Notifier: Send + Sync {
    fn show_error(&self, message: &str);

    fn show_information(&self, message: &str);
}

/// Routes notifications to the tracing subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn show_error(&self, message: &str) {
        tracing::error!("{}", message);
    }

    fn show_information(&self, message: &str) {
        tracing::info!("{}", message);
    }
}
