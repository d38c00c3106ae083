//! In-memory [`Link`] used by the unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::link::{Link, LinkError, NotificationHandler, Subscription};

type SendHook = Box<dyn Fn(&[u8]) + Send + Sync>;

#[derive(Default)]
struct Inner {
    frames: Mutex<Vec<Vec<u8>>>,
    handler: Mutex<Option<Arc<NotificationHandler>>>,
    on_send: Mutex<Option<SendHook>>,
    fail_sends: Mutex<bool>,
}

#[derive(Clone, Default)]
pub struct MockLink {
    inner: Arc<Inner>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a notification payload to the current subscriber, if any
    pub fn push(&self, payload: &[u8]) {
        let handler = self.inner.handler.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler(payload);
        }
    }

    /// Frames acknowledged so far
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.inner.frames.lock().unwrap().clone()
    }

    pub fn fail_sends(&self, fail: bool) {
        *self.inner.fail_sends.lock().unwrap() = fail;
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.handler.lock().unwrap().is_some()
    }

    /// Run `hook` with every acknowledged frame
    pub fn on_send(&self, hook: impl Fn(&[u8]) + Send + Sync + 'static) {
        *self.inner.on_send.lock().unwrap() = Some(Box::new(hook));
    }

    /// Behave like a desk that reports the commanded height after `delay`
    pub fn arrive_after(&self, delay: Duration) {
        let link = self.clone();
        self.on_send(move |frame| {
            let height = u16::from_be_bytes([frame[3], frame[4]]);
            let link = link.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                link.push(format!("{:04}", height).as_bytes());
            });
        });
    }
}

impl Link for MockLink {
    async fn send(&self, frame: &[u8]) -> Result<(), LinkError> {
        if *self.inner.fail_sends.lock().unwrap() {
            return Err(LinkError::Write("mock link refused write".to_string()));
        }
        self.inner.frames.lock().unwrap().push(frame.to_vec());
        if let Some(hook) = self.inner.on_send.lock().unwrap().as_ref() {
            hook(frame);
        }
        Ok(())
    }

    async fn subscribe(&self, handler: NotificationHandler) -> Result<Subscription, LinkError> {
        *self.inner.handler.lock().unwrap() = Some(Arc::new(handler));
        let inner = Arc::clone(&self.inner);
        Ok(Subscription::new(move || {
            *inner.handler.lock().unwrap() = None;
        }))
    }
}
