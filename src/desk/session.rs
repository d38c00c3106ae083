use anyhow::{Context, Result};
use std::time::Duration;
use tokio::time::sleep;

use super::bluetooth::BleLink;
use super::controller::Desk;

/// Time allowed for the first height notification after subscribing
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// A connected desk with telemetry flowing.
///
/// Always finish with [`Session::close`], including on error paths.
pub struct Session {
    pub desk: Desk<BleLink>,
}

impl Session {
    pub async fn open(address: &str) -> Result<Self> {
        log::info!("Connecting to desk at address: {}", address);
        let link = BleLink::connect(address).await?;

        let desk = match Desk::attach(link.clone()).await {
            Ok(desk) => desk,
            Err(e) => {
                if let Err(close_err) = link.disconnect().await {
                    log::warn!("Disconnect after failed subscribe: {:#}", close_err);
                }
                return Err(e).context("Failed to start height notifications");
            }
        };

        sleep(SETTLE_DELAY).await;
        log::info!("Desk session ready, height: {}", desk.height());

        Ok(Self { desk })
    }

    /// Cancel the subscription and disconnect
    pub async fn close(self) {
        let link = self.desk.detach();
        if let Err(e) = link.disconnect().await {
            log::warn!("Failed to disconnect cleanly: {:#}", e);
        }
    }
}
