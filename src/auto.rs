//! Sit/stand alternation on a timer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;

use crate::desk::{Desk, Height, Link, LinkError, MoveOptions};
use crate::ui::Notifier;

/// Distance from a preset that still counts as being at it
pub const PRESET_PROXIMITY_CM: f32 = 2.0;

const TITLE: &str = "Desk";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Posture {
    Sit,
    Stand,
}

impl Posture {
    pub fn flipped(self) -> Self {
        match self {
            Self::Sit => Self::Stand,
            Self::Stand => Self::Sit,
        }
    }

    fn command(self) -> &'static str {
        match self {
            Self::Sit => "Sit down",
            Self::Stand => "Stand up",
        }
    }

    fn position(self) -> &'static str {
        match self {
            Self::Sit => "sitting",
            Self::Stand => "standing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Presets {
    pub sit_cm: f32,
    pub stand_cm: f32,
}

impl Presets {
    pub fn target_cm(&self, posture: Posture) -> f32 {
        match posture {
            Posture::Sit => self.sit_cm,
            Posture::Stand => self.stand_cm,
        }
    }

    /// Pick the first posture to move to, given where the desk is now.
    ///
    /// Near the stand preset the desk is taken as standing. Otherwise it is
    /// taken as being at whichever preset is closer. Without a reading we
    /// assume sitting, so the first move is to stand.
    pub fn first_target(&self, height: Height) -> Posture {
        let Some(cm) = height.cm() else {
            return Posture::Stand;
        };

        let to_sit = (cm - self.sit_cm).abs();
        let to_stand = (cm - self.stand_cm).abs();

        if to_stand < PRESET_PROXIMITY_CM {
            Posture::Sit
        } else if to_sit < PRESET_PROXIMITY_CM || to_sit < to_stand {
            Posture::Stand
        } else {
            Posture::Sit
        }
    }
}

/// Fires the [`StopSignal`]s created alongside it
#[derive(Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Cooperative cancellation shared by every wait in the scheduler
#[derive(Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once a stop was requested. Never resolves if every
    /// [`StopHandle`] is dropped without stopping.
    pub async fn stopped(&mut self) {
        if self.rx.wait_for(|stopped| *stopped).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub fn stop_signal() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx: Arc::new(tx) }, StopSignal { rx })
}

#[derive(Debug, Clone, Copy)]
pub struct AutoSettings {
    pub interval: Duration,
    pub countdown_secs: u64,
    pub move_options: MoveOptions,
}

/// What happened during one scheduler run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AutoSummary {
    pub reached: u32,
    pub timed_out: u32,
    pub skipped: u32,
}

/// Alternates a desk between the sit and stand presets
pub struct Alternator<N: Notifier> {
    presets: Presets,
    settings: AutoSettings,
    notifier: N,
    next: Posture,
}

impl<N: Notifier> Alternator<N> {
    pub fn new(presets: Presets, settings: AutoSettings, notifier: N) -> Self {
        Self {
            presets,
            settings,
            notifier,
            next: Posture::Stand,
        }
    }

    /// Posture the next non-skipped step will move to
    pub fn next_target(&self) -> Posture {
        self.next
    }

    /// Run until `stop` fires.
    ///
    /// A write failure ends the run with the error and leaves the next target
    /// untouched.
    pub async fn run<L: Link>(
        &mut self,
        desk: &mut Desk<L>,
        stop: &mut StopSignal,
    ) -> Result<AutoSummary, LinkError> {
        let mut summary = AutoSummary::default();

        self.next = self.presets.first_target(desk.height());
        let position = self.next.flipped().position();
        println!(
            "Currently {}. Alternating every {} min. Ctrl+C to stop.",
            position,
            self.settings.interval.as_secs() / 60
        );
        self.notifier
            .notify(TITLE, &format!("Started. Currently {}.", position))
            .await;

        loop {
            tokio::select! {
                biased;
                _ = stop.stopped() => break,
                _ = sleep(self.settings.interval) => {}
            }

            let target_cm = self.presets.target_cm(self.next);
            let command = self.next.command();
            let announcement = format!(
                "{}! Moving to {:.0} cm in {}s.",
                command, target_cm, self.settings.countdown_secs
            );

            let skipped = tokio::select! {
                biased;
                _ = stop.stopped() => break,
                skipped = self.notifier.countdown(TITLE, &announcement, self.settings.countdown_secs) => skipped,
            };

            if stop.is_stopped() {
                break;
            }
            if skipped {
                println!("  Skipped: {}", command);
                summary.skipped += 1;
                continue;
            }

            println!("{} -> {} cm", command, target_cm);
            let reached = match desk.move_to_cm(target_cm, self.settings.move_options).await {
                Ok(reached) => reached,
                Err(e) => {
                    log::error!("{} failed: {}", command, e);
                    self.notifier
                        .notify(TITLE, &format!("Move failed: {}", e))
                        .await;
                    return Err(e);
                }
            };

            let height = desk.height();
            if reached {
                summary.reached += 1;
                println!("  Reached: {}", height);
                self.notifier
                    .notify(TITLE, &format!("Reached {}.", height))
                    .await;
            } else {
                summary.timed_out += 1;
                println!("  Timeout: {}", height);
                self.notifier
                    .notify(TITLE, &format!("Moved to {}.", height))
                    .await;
            }

            self.next = self.next.flipped();
        }

        self.notifier.notify(TITLE, "Stopped.").await;
        println!("Stopped.");
        log::info!("Alternation stopped: {:?}", summary);
        Ok(summary)
    }
}
