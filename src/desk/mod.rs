pub mod bluetooth;
pub mod controller;
pub mod link;
#[cfg(test)]
pub mod mock;
pub mod protocol;
pub mod session;
pub mod tracker;

pub use controller::{Desk, MoveOptions};
pub use link::{Link, LinkError};
pub use session::Session;
pub use tracker::Height;
