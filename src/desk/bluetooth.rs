use anyhow::{anyhow, Context, Result};
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use super::link::{Link, LinkError, NotificationHandler, Subscription};
use super::protocol::{
    CONTROL_CHARACTERISTIC_UUID, CONTROL_SERVICE_UUID, HEIGHT_CHARACTERISTIC_UUID,
};

const MAX_CONNECT_ATTEMPTS: u32 = 3;

/// Default time spent listening for advertisements
pub const DEFAULT_SCAN_SECS: u64 = 5;

async fn first_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No Bluetooth adapters found"))
}

async fn scan_peripherals(central: &Adapter, timeout_secs: u64) -> Result<Vec<Peripheral>> {
    log::info!("Starting BLE scan for desks ({}s)...", timeout_secs);
    central
        .start_scan(ScanFilter {
            services: vec![CONTROL_SERVICE_UUID],
        })
        .await?;

    sleep(Duration::from_secs(timeout_secs)).await;

    let peripherals = central.peripherals().await?;
    log::info!("Found {} BLE devices", peripherals.len());

    // Some platforms ignore the scan filter, so check the advertised services too
    let mut desks = Vec::new();
    for peripheral in peripherals {
        if let Ok(Some(properties)) = peripheral.properties().await {
            if properties.services.contains(&CONTROL_SERVICE_UUID) {
                log::info!(
                    "Found desk: {} ({:?})",
                    properties.address,
                    properties.local_name
                );
                desks.push(peripheral);
            }
        }
    }

    central.stop_scan().await?;
    Ok(desks)
}

/// Scan for desks and return their addresses
pub async fn scan(timeout_secs: u64) -> Result<Vec<String>> {
    let central = first_adapter().await?;
    let desks = scan_peripherals(&central, timeout_secs).await?;

    let mut addresses = Vec::with_capacity(desks.len());
    for desk in desks {
        if let Ok(Some(props)) = desk.properties().await {
            addresses.push(props.address.to_string());
        }
    }
    Ok(addresses)
}

/// [`Link`] over a connected BLE peripheral
#[derive(Clone)]
pub struct BleLink {
    peripheral: Peripheral,
    control_char: Characteristic,
    height_char: Characteristic,
}

impl BleLink {
    /// Find the desk at `address` and connect to it
    pub async fn connect(address: &str) -> Result<Self> {
        let central = first_adapter().await?;
        let desks = scan_peripherals(&central, DEFAULT_SCAN_SECS).await?;

        log::info!("Searching for desk with address: {}", address);
        let mut found_peripheral = None;
        for p in desks {
            match p.properties().await {
                Ok(Some(props)) => {
                    let p_addr = props.address.to_string();
                    log::debug!("Checking peripheral with address: {}", p_addr);
                    if p_addr.eq_ignore_ascii_case(address) {
                        found_peripheral = Some(p);
                        break;
                    }
                }
                Ok(None) => {
                    log::debug!("Peripheral has no properties");
                }
                Err(e) => {
                    log::debug!("Failed to get peripheral properties: {}", e);
                }
            }
        }

        let peripheral =
            found_peripheral.ok_or_else(|| anyhow!("Desk with address {} not found", address))?;

        // Let the BLE stack settle after scanning
        sleep(Duration::from_millis(1000)).await;

        let mut last_error = None;
        for attempt in 1..=MAX_CONNECT_ATTEMPTS {
            if attempt > 1 {
                log::warn!("Connection retry attempt {} of {}", attempt, MAX_CONNECT_ATTEMPTS);
                sleep(Duration::from_secs(2)).await;
            }

            match Self::connect_to_peripheral(peripheral.clone()).await {
                Ok(link) => {
                    log::info!("Connected on attempt {}", attempt);
                    return Ok(link);
                }
                Err(e) => {
                    log::error!("Connection attempt {} failed: {:#}", attempt, e);

                    if let Ok(true) = peripheral.is_connected().await {
                        let _ = peripheral.disconnect().await;
                        sleep(Duration::from_millis(500)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            anyhow!("Failed to connect to desk after {} attempts", MAX_CONNECT_ATTEMPTS)
        }))
    }

    async fn connect_to_peripheral(peripheral: Peripheral) -> Result<Self> {
        let is_connected = timeout(Duration::from_secs(5), peripheral.is_connected())
            .await
            .context("Timeout checking connection status")?
            .context("Failed to check connection status")?;

        if !is_connected {
            log::info!("Establishing Bluetooth connection...");
            timeout(Duration::from_secs(15), peripheral.connect())
                .await
                .context("Timeout connecting to desk (15s)")?
                .context("Failed to connect to desk")?;
        }

        timeout(Duration::from_secs(10), peripheral.discover_services())
            .await
            .context("Timeout discovering services (10s)")?
            .context("Failed to discover services")?;

        let chars = peripheral.characteristics();
        log::debug!("Found {} characteristics total", chars.len());

        let find = |uuid: uuid::Uuid| chars.iter().find(|c| c.uuid == uuid).cloned();

        let control_char = find(CONTROL_CHARACTERISTIC_UUID).ok_or_else(|| {
            log::error!(
                "Available characteristics: {:?}",
                chars.iter().map(|c| c.uuid).collect::<Vec<_>>()
            );
            anyhow!("Could not find control characteristic on desk")
        })?;
        let height_char = find(HEIGHT_CHARACTERISTIC_UUID)
            .ok_or_else(|| anyhow!("Could not find height characteristic on desk"))?;

        Ok(Self {
            peripheral,
            control_char,
            height_char,
        })
    }

    /// Disable notifications and drop the connection
    pub async fn disconnect(&self) -> Result<()> {
        if let Err(e) = self.peripheral.unsubscribe(&self.height_char).await {
            log::debug!("Unsubscribe failed during teardown: {}", e);
        }
        if self.peripheral.is_connected().await? {
            self.peripheral.disconnect().await?;
            log::info!("Disconnected from desk");
        }
        Ok(())
    }
}

impl Link for BleLink {
    async fn send(&self, frame: &[u8]) -> Result<(), LinkError> {
        self.peripheral
            .write(&self.control_char, frame, WriteType::WithResponse)
            .await
            .map_err(|e| match e {
                btleplug::Error::NotConnected => LinkError::Disconnected,
                other => LinkError::Write(other.to_string()),
            })
    }

    async fn subscribe(&self, handler: NotificationHandler) -> Result<Subscription, LinkError> {
        let mut notifications = self
            .peripheral
            .notifications()
            .await
            .map_err(|e| LinkError::Subscribe(e.to_string()))?;
        self.peripheral
            .subscribe(&self.height_char)
            .await
            .map_err(|e| LinkError::Subscribe(e.to_string()))?;

        let task = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid == HEIGHT_CHARACTERISTIC_UUID {
                    handler(&notification.value);
                }
            }
            log::debug!("Height notification stream ended");
        });

        Ok(Subscription::new(move || task.abort()))
    }
}
