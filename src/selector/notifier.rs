use tracing::error;

/// Tells the user that something went wrong.
pub trait Notifier {
    fn notify_error(&self, message: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_error(&self, message: &str) {
        error!("{}", message);
    }
}
