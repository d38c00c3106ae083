use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{sleep_until, timeout_at, Instant};

use super::protocol::{decode_height, mm_to_cm};

/// Last height reported by the desk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Height {
    Unknown,
    Known(u16),
}

impl Height {
    pub fn mm(self) -> Option<u16> {
        match self {
            Self::Unknown => None,
            Self::Known(mm) => Some(mm),
        }
    }

    pub fn cm(self) -> Option<f32> {
        self.mm().map(mm_to_cm)
    }
}

impl std::fmt::Display for Height {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Known(mm) => write!(f, "{:.1} cm", mm_to_cm(*mm)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Updated,
    TimedOut,
}

/// Holds the latest telemetry for one desk session.
///
/// The notification task is the only writer. Every accepted reading marks the
/// value as changed for all [`HeightWatcher`]s, even when the height repeats.
#[derive(Clone)]
pub struct HeightTracker {
    tx: Arc<watch::Sender<Height>>,
}

impl HeightTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Height::Unknown);
        Self { tx: Arc::new(tx) }
    }

    /// Feed a raw notification payload. Returns whether it was accepted.
    pub fn accept(&self, payload: &[u8]) -> bool {
        match decode_height(payload) {
            Some(mm) => {
                log::debug!("Height update: {}mm", mm);
                self.tx.send_replace(Height::Known(mm));
                true
            }
            None => {
                log::trace!("Ignoring malformed height payload: {:02X?}", payload);
                false
            }
        }
    }

    pub fn current(&self) -> Height {
        *self.tx.borrow()
    }

    pub fn watch(&self) -> HeightWatcher {
        HeightWatcher {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for HeightTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Edge-triggered view of a [`HeightTracker`].
///
/// Call [`clear`](Self::clear) before [`wait_for_update`](Self::wait_for_update)
/// so an update landing in between is not lost.
pub struct HeightWatcher {
    rx: watch::Receiver<Height>,
}

impl HeightWatcher {
    pub fn clear(&mut self) {
        self.rx.borrow_and_update();
    }

    #[cfg(test)]
    pub fn has_update(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Block until the next accepted reading or `deadline`, whichever is first.
    pub async fn wait_for_update(&mut self, deadline: Instant) -> WaitOutcome {
        match timeout_at(deadline, self.rx.changed()).await {
            Ok(Ok(())) => WaitOutcome::Updated,
            Ok(Err(_)) => {
                // Tracker is gone; nothing can arrive before the deadline.
                sleep_until(deadline).await;
                WaitOutcome::TimedOut
            }
            Err(_) => WaitOutcome::TimedOut,
        }
    }
}
