use std::time::Duration;

use tokio::time::Instant;

use super::link::{Link, LinkError, Subscription};
use super::protocol::{clamp_height, cm_to_mm, encode_move};
use super::tracker::{Height, HeightTracker, HeightWatcher, WaitOutcome};

/// How long a move may take before it is reported as a timeout
pub const DEFAULT_MOVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum distance from the target that still counts as arrived
pub const DEFAULT_TOLERANCE_MM: u16 = 10;

#[derive(Debug, Clone, Copy)]
pub struct MoveOptions {
    pub timeout: Duration,
    pub tolerance_mm: u16,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_MOVE_TIMEOUT,
            tolerance_mm: DEFAULT_TOLERANCE_MM,
        }
    }
}

/// A desk reachable over `L`, with height telemetry wired in.
///
/// Moves take `&mut self`: a command and its wait loop must not interleave
/// with another move on the same desk.
pub struct Desk<L: Link> {
    link: L,
    tracker: HeightTracker,
    watcher: HeightWatcher,
    subscription: Option<Subscription>,
}

impl<L: Link> Desk<L> {
    /// Subscribe to height notifications on `link`
    pub async fn attach(link: L) -> Result<Self, LinkError> {
        let tracker = HeightTracker::new();
        let writer = tracker.clone();

        let subscription = link
            .subscribe(Box::new(move |payload| {
                writer.accept(payload);
            }))
            .await?;
        log::info!("Subscribed to height notifications");

        let watcher = tracker.watch();
        Ok(Self {
            link,
            tracker,
            watcher,
            subscription: Some(subscription),
        })
    }

    /// Last height reported by the desk
    pub fn height(&self) -> Height {
        self.tracker.current()
    }

    /// Move to `target_mm` and wait for the desk to report arrival.
    ///
    /// The target is clamped to the desk's range before it is sent and
    /// before arrival is checked. Exactly one command is written. Returns
    /// `Ok(false)` when no reading within tolerance arrives before the
    /// timeout; only a failed write is an error.
    pub async fn move_to(&mut self, target_mm: i64, options: MoveOptions) -> Result<bool, LinkError> {
        let target = clamp_height(target_mm);
        let frame = encode_move(i64::from(target));

        log::info!(
            "Moving desk to {}mm (timeout: {:?}, tolerance: {}mm)",
            target,
            options.timeout,
            options.tolerance_mm
        );
        log::info!("Sending command: {:02X?}", frame);
        self.link.send(&frame).await?;

        let deadline = Instant::now() + options.timeout;
        let mut updates = 0u32;

        while Instant::now() < deadline {
            self.watcher.clear();
            if self.watcher.wait_for_update(deadline).await == WaitOutcome::TimedOut {
                break;
            }
            updates += 1;

            if let Height::Known(current) = self.tracker.current() {
                let diff = current.abs_diff(target);
                log::debug!(
                    "Update #{}: current {}mm, target {}mm, diff {}mm",
                    updates,
                    current,
                    target,
                    diff
                );
                if diff <= options.tolerance_mm {
                    log::info!("Reached target height after {} updates: {}mm", updates, current);
                    return Ok(true);
                }
            }
        }

        log::warn!(
            "Timed out after {:?} waiting for {}mm (last height: {})",
            options.timeout,
            target,
            self.tracker.current()
        );
        Ok(false)
    }

    /// Move to a height given in centimeters (truncated to whole millimeters)
    pub async fn move_to_cm(&mut self, target_cm: f32, options: MoveOptions) -> Result<bool, LinkError> {
        self.move_to(cm_to_mm(target_cm), options).await
    }

    /// Stop listening for telemetry and hand the link back for teardown
    pub fn detach(mut self) -> L {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        self.link
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desk::mock::MockLink;
    use crate::desk::protocol::encode_move;

    fn options(timeout_secs: u64) -> MoveOptions {
        MoveOptions {
            timeout: Duration::from_secs(timeout_secs),
            tolerance_mm: DEFAULT_TOLERANCE_MM,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_tracks_telemetry() {
        let link = MockLink::new();
        let desk = Desk::attach(link.clone()).await.unwrap();

        assert!(link.is_subscribed());
        assert_eq!(desk.height(), Height::Unknown);

        link.push(b"0731");
        assert_eq!(desk.height(), Height::Known(731));

        link.push(b"garbage");
        assert_eq!(desk.height(), Height::Known(731));
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_reaches_target_with_single_command() {
        let link = MockLink::new();
        link.arrive_after(Duration::from_secs(3));
        let mut desk = Desk::attach(link.clone()).await.unwrap();

        let start = Instant::now();
        let reached = desk.move_to(1050, options(30)).await.unwrap();

        assert!(reached);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert_eq!(link.frames(), vec![encode_move(1050).to_vec()]);
        assert_eq!(desk.height(), Height::Known(1050));
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_times_out_at_deadline() {
        let link = MockLink::new();
        let mut desk = Desk::attach(link.clone()).await.unwrap();

        let start = Instant::now();
        let reached = desk.move_to(900, options(10)).await.unwrap();

        assert!(!reached);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(link.frames().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_keeps_waiting_while_out_of_tolerance() {
        let link = MockLink::new();
        let pusher = link.clone();
        link.on_send(move |_| {
            let pusher = pusher.clone();
            tokio::spawn(async move {
                for payload in [b"0800", b"0900", b"0985", b"0992"] {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    pusher.push(payload);
                }
            });
        });
        let mut desk = Desk::attach(link.clone()).await.unwrap();

        let start = Instant::now();
        let reached = desk.move_to(1000, options(30)).await.unwrap();

        assert!(reached);
        // 0985 is 15mm away, 0992 is within 10mm
        assert_eq!(start.elapsed(), Duration::from_secs(4));
        assert_eq!(link.frames().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_out_of_tolerance_updates_still_time_out() {
        let link = MockLink::new();
        let pusher = link.clone();
        link.on_send(move |_| {
            let pusher = pusher.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    pusher.push(b"0700");
                }
            });
        });
        let mut desk = Desk::attach(link.clone()).await.unwrap();

        let start = Instant::now();
        let reached = desk.move_to(1200, options(5)).await.unwrap();

        assert!(!reached);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_clamps_target_before_comparing() {
        let link = MockLink::new();
        link.arrive_after(Duration::from_secs(1));
        let mut desk = Desk::attach(link.clone()).await.unwrap();

        assert!(desk.move_to(9999, options(30)).await.unwrap());
        assert!(desk.move_to(1300, options(30)).await.unwrap());

        let frames = link.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], frames[1]);
        assert_eq!(desk.height(), Height::Known(1300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_send_failure_is_an_error() {
        let link = MockLink::new();
        link.fail_sends(true);
        let mut desk = Desk::attach(link.clone()).await.unwrap();

        let start = Instant::now();
        let result = desk.move_to(1000, options(30)).await;

        assert!(matches!(result, Err(LinkError::Write(_))));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(link.frames().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_to_cm_truncates() {
        let link = MockLink::new();
        link.arrive_after(Duration::from_millis(500));
        let mut desk = Desk::attach(link.clone()).await.unwrap();

        assert!(desk.move_to_cm(73.49, options(30)).await.unwrap());
        assert_eq!(link.frames(), vec![encode_move(734).to_vec()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detach_cancels_subscription() {
        let link = MockLink::new();
        let desk = Desk::attach(link.clone()).await.unwrap();
        assert!(link.is_subscribed());

        let returned = desk.detach();
        assert!(!returned.is_subscribed());
        assert!(!link.is_subscribed());
    }
}
