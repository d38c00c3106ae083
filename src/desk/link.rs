use std::future::Future;

use thiserror::Error;

/// Transport failures. Everything else the desk does resolves to a plain
/// outcome, so this is the only error the core hands back to callers.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to write command to desk: {0}")]
    Write(String),

    #[error("failed to subscribe to height notifications: {0}")]
    Subscribe(String),

    #[error("desk link is disconnected")]
    Disconnected,
}

/// Callback invoked with every raw height notification payload
pub type NotificationHandler = Box<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// Bidirectional channel to the desk.
///
/// `send` must only resolve `Ok` once the desk acknowledged the write.
pub trait Link: Send + Sync {
    fn send(&self, frame: &[u8]) -> impl Future<Output = Result<(), LinkError>> + Send;

    fn subscribe(
        &self,
        handler: NotificationHandler,
    ) -> impl Future<Output = Result<Subscription, LinkError>> + Send;
}

/// Live notification subscription. Cancelled explicitly or on drop.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            log::debug!("Cancelling height notification subscription");
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
