use std::future::Future;
use std::time::Duration;

/// Extra time a countdown dialog gets before it is abandoned
const DIALOG_GRACE: Duration = Duration::from_secs(5);

/// How long a passive notification may take to be handed to the desktop
#[cfg(target_os = "macos")]
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Desktop notification surface used by the sit/stand scheduler
pub trait Notifier: Send + Sync {
    /// Show a passive notification. Resolves once it was handed to the
    /// desktop. Failures are logged, never returned.
    fn notify(&self, title: &str, message: &str) -> impl Future<Output = ()> + Send;

    /// Announce an upcoming action with a `seconds` long window to skip it.
    /// Resolves to `true` if the user skipped.
    fn countdown(
        &self,
        title: &str,
        message: &str,
        seconds: u64,
    ) -> impl Future<Output = bool> + Send;
}

/// Native notifications: notify-rust on Linux, osascript dialogs on macOS
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    async fn notify(&self, title: &str, message: &str) {
        show_notification(title, message).await;
    }

    async fn countdown(&self, title: &str, message: &str, seconds: u64) -> bool {
        let limit = dialog_limit(seconds);
        match tokio::time::timeout(limit, countdown_dialog(title, message, seconds)).await {
            Ok(skipped) => skipped,
            Err(_) => {
                log::warn!("Countdown dialog did not close within {:?}", limit);
                false
            }
        }
    }
}

/// Upper bound on a countdown dialog showing for `seconds`
fn dialog_limit(seconds: u64) -> Duration {
    Duration::from_secs(seconds).saturating_add(DIALOG_GRACE)
}

#[cfg(target_os = "linux")]
async fn show_notification(title: &str, message: &str) {
    use notify_rust::Notification;

    if let Err(e) = Notification::new()
        .summary(title)
        .body(message)
        .urgency(notify_rust::Urgency::Normal)
        .timeout(5000)
        .show()
    {
        log::error!("Failed to show notification: {}", e);
        println!("{}: {}", title, message);
    }
}

#[cfg(target_os = "linux")]
async fn countdown_dialog(title: &str, message: &str, seconds: u64) -> bool {
    use notify_rust::{Notification, Timeout};

    let title = title.to_string();
    let message = message.to_string();
    let millis = u32::try_from(seconds.saturating_mul(1000)).unwrap_or(u32::MAX);

    let dialog = tokio::task::spawn_blocking(move || {
        let handle = match Notification::new()
            .summary(&title)
            .body(&message)
            .action("skip", "Skip")
            .action("default", "OK")
            .timeout(Timeout::Milliseconds(millis))
            .show()
        {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("Failed to show countdown notification: {}", e);
                return false;
            }
        };

        let mut skipped = false;
        handle.wait_for_action(|action| skipped = action == "skip");
        skipped
    });

    dialog.await.unwrap_or_else(|e| {
        log::error!("Countdown notification task failed: {}", e);
        false
    })
}

#[cfg(target_os = "macos")]
async fn show_notification(title: &str, message: &str) {
    let script = format!(
        "display notification \"{}\" with title \"{}\"",
        escape_applescript(message),
        escape_applescript(title)
    );
    match tokio::time::timeout(NOTIFY_TIMEOUT, run_osascript(&script)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => log::error!("Failed to show notification: {}", e),
        Err(_) => log::warn!("osascript did not finish within {:?}", NOTIFY_TIMEOUT),
    }
}

#[cfg(target_os = "macos")]
async fn countdown_dialog(title: &str, message: &str, seconds: u64) -> bool {
    let script = format!(
        "display dialog \"{}\" with title \"{}\" buttons {{\"Skip\", \"OK\"}} \
         default button \"OK\" giving up after {}",
        escape_applescript(message),
        escape_applescript(title),
        seconds
    );
    match run_osascript(&script).await {
        Ok(stdout) => stdout.contains("Skip"),
        Err(e) => {
            log::error!("Failed to show countdown dialog: {}", e);
            false
        }
    }
}

#[cfg(target_os = "macos")]
async fn run_osascript(script: &str) -> std::io::Result<String> {
    let output = tokio::process::Command::new("osascript")
        .arg("-e")
        .arg(script)
        .kill_on_drop(true)
        .output()
        .await?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(any(target_os = "macos", test))]
fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
async fn show_notification(title: &str, message: &str) {
    println!("{}: {}", title, message);
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
async fn countdown_dialog(title: &str, message: &str, seconds: u64) -> bool {
    println!("{}: {}", title, message);
    tokio::time::sleep(Duration::from_secs(seconds)).await;
    false
}
