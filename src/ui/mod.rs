pub mod notify;

pub use notify::{DesktopNotifier, Notifier};
