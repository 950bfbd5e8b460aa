use std::sync::Mutex;
use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use futures::channel::mpsc::UnboundedSender;
use log::{debug, info, warn};
use tokio::spawn;
use tokio::time::{sleep, timeout, Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::device::constants::{SCAN_POLL_DELAY, WRITE_DEADLINE};
use crate::device::transport::Transport;
use crate::device::types::{CharacteristicDescriptor, ServiceDescriptor, TransportEvent};
use crate::error::TransportError;

#[derive(Debug, Clone)]
pub struct BtleOptions {
    pub scan_timeout: Duration,
    pub write_type: WriteType,
}

struct Link {
    peripheral: Peripheral,
    cancel: CancellationToken,
}

/// Transport backed by the platform bluetooth stack (via btleplug).
pub struct BtleTransport {
    options: BtleOptions,
    events: UnboundedSender<TransportEvent>,
    adapters: Mutex<Vec<Adapter>>,
    link: Mutex<Option<Link>>,
}

impl BtleTransport {
    pub fn new(events: UnboundedSender<TransportEvent>, options: BtleOptions) -> Self {
        BtleTransport {
            options,
            events,
            adapters: Mutex::new(Vec::new()),
            link: Mutex::new(None),
        }
    }

    fn emit(&self, event: TransportEvent) {
        emit(&self.events, event);
    }

    fn adapters(&self) -> Vec<Adapter> {
        self.adapters.lock().expect("Failed to lock adapters").clone()
    }

    fn connected_peripheral(&self) -> Option<Peripheral> {
        self.link
            .lock()
            .expect("Failed to lock link")
            .as_ref()
            .map(|link| link.peripheral.clone())
    }

    fn find_characteristic(&self, descriptor: &CharacteristicDescriptor) -> Option<(Peripheral, Characteristic)> {
        let peripheral = self.connected_peripheral()?;
        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == descriptor.uuid && c.service_uuid == descriptor.service_uuid)?;

        Some((peripheral, characteristic))
    }

    async fn find_peripheral(&self, adapters: &[Adapter], address: &str) -> Option<(Adapter, Peripheral)> {
        for adapter in adapters {
            let peripherals = match adapter.peripherals().await {
                Ok(v) => v,
                Err(err) => {
                    warn!("Failed to query BLE adapter for peripherals: {}", err);
                    continue;
                },
            };

            for peripheral in peripherals {
                // macOS does not expose addresses, there the platform id is used instead
                let matches = peripheral.address().to_string().eq_ignore_ascii_case(address)
                    || format!("{:?}", peripheral.id()).to_lowercase().contains(&address.to_lowercase());

                if matches {
                    if let Ok(Some(properties)) = peripheral.properties().await {
                        info!(
                            "Using peripheral {} {}",
                            properties.address,
                            properties.local_name.unwrap_or(String::from("NONE")),
                        );
                    }
                    return Some((adapter.clone(), peripheral));
                }
            }
        }

        None
    }

    async fn scan_for(&self, address: &str) -> Result<(Adapter, Peripheral), TransportError> {
        let adapters = self.adapters();
        if adapters.is_empty() {
            return Err(TransportError::NotInitialized);
        }

        for adapter in &adapters {
            info!("Scanning using adapter {}...", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
            adapter.start_scan(ScanFilter::default()).await?;
        }

        let deadline = Instant::now() + self.options.scan_timeout;
        let found = loop {
            if let Some(found) = self.find_peripheral(&adapters, address).await {
                break Some(found);
            }
            if Instant::now() >= deadline {
                break None;
            }
            sleep(Duration::from_millis(SCAN_POLL_DELAY)).await;
        };

        for adapter in &adapters {
            if let Err(err) = adapter.stop_scan().await {
                debug!("Failed to stop scanning: {}", err);
            }
        }

        found.ok_or_else(|| TransportError::PeripheralNotFound { address: address.to_string() })
    }
}

fn emit(events: &UnboundedSender<TransportEvent>, event: TransportEvent) {
    if let Err(err) = events.unbounded_send(event) {
        debug!("Transport event receiver is gone: {}", err);
    }
}

async fn forward_notifications(cancel: CancellationToken, peripheral: Peripheral, events: UnboundedSender<TransportEvent>) {
    let mut notification_stream = match peripheral.notifications().await {
        Ok(stream) => stream,
        Err(err) => {
            warn!("Failed to open notification stream: {}", err);
            return;
        },
    };

    'mainloop: loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break 'mainloop;
            },
            data = notification_stream.next() => match data {
                Some(data) => emit(&events, TransportEvent::DataAvailable(data.value)),
                None => break 'mainloop,
            },
        }
    }
}

async fn watch_disconnect(cancel: CancellationToken, adapter: Adapter, peripheral: Peripheral, events: UnboundedSender<TransportEvent>) {
    let mut central_events = match adapter.events().await {
        Ok(stream) => stream,
        Err(err) => {
            warn!("Failed to open adapter event stream: {}", err);
            return;
        },
    };
    let id = peripheral.id();

    'mainloop: loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break 'mainloop;
            },
            event = central_events.next() => match event {
                Some(CentralEvent::DeviceDisconnected(disconnected)) if disconnected == id => {
                    cancel.cancel();
                    emit(&events, TransportEvent::Disconnected);
                    break 'mainloop;
                },
                Some(_) => {},
                None => break 'mainloop,
            },
        }
    }
}

#[async_trait]
impl Transport for BtleTransport {
    async fn initialize(&self) -> Result<(), TransportError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        if adapters.is_empty() {
            return Err(TransportError::NoAdapter);
        }

        *self.adapters.lock().expect("Failed to lock adapters") = adapters;
        Ok(())
    }

    async fn connect(&self, address: &str) -> Result<bool, TransportError> {
        let (adapter, peripheral) = self.scan_for(address).await?;

        info!("Connecting to peripheral...");
        peripheral.connect().await?;

        let cancel = CancellationToken::new();
        spawn(forward_notifications(cancel.clone(), peripheral.clone(), self.events.clone()));
        spawn(watch_disconnect(cancel.clone(), adapter, peripheral.clone(), self.events.clone()));

        let previous = self
            .link
            .lock()
            .expect("Failed to lock link")
            .replace(Link { peripheral, cancel });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }

        self.emit(TransportEvent::Connected);
        Ok(true)
    }

    async fn disconnect(&self) {
        // a connect attempt that was abandoned while scanning leaves the scan running
        for adapter in self.adapters() {
            if let Err(err) = adapter.stop_scan().await {
                debug!("Failed to stop scanning: {}", err);
            }
        }

        let link = self.link.lock().expect("Failed to lock link").take();

        if let Some(link) = link {
            link.cancel.cancel();
            match timeout(Duration::from_millis(WRITE_DEADLINE), link.peripheral.disconnect()).await {
                Ok(Ok(())) => debug!("Disconnected"),
                Ok(Err(err)) => warn!("Failed to disconnect: {}", err),
                Err(_) => warn!("Disconnecting took too long"),
            }
        }
    }

    async fn discover_services(&self) -> Result<(), TransportError> {
        let peripheral = self.connected_peripheral().ok_or(TransportError::NotConnected)?;
        peripheral.discover_services().await?;

        let services = peripheral
            .services()
            .into_iter()
            .map(|service| ServiceDescriptor {
                uuid: service.uuid,
                characteristics: service
                    .characteristics
                    .iter()
                    .map(|c| CharacteristicDescriptor { uuid: c.uuid, service_uuid: c.service_uuid })
                    .collect(),
            })
            .collect();

        self.emit(TransportEvent::ServicesDiscovered(services));
        Ok(())
    }

    async fn write(&self, descriptor: &CharacteristicDescriptor, bytes: &[u8]) -> bool {
        let (peripheral, characteristic) = match self.find_characteristic(descriptor) {
            Some(found) => found,
            None => {
                warn!("Characteristic {} is not available", descriptor.uuid);
                return false;
            },
        };

        let fut = peripheral.write(&characteristic, bytes, self.options.write_type);

        tokio::select! {
            _ = sleep(Duration::from_millis(WRITE_DEADLINE)) => {
                warn!("Sending to characteristic {} took too long", descriptor.uuid);
                false
            }
            result = fut => match result {
                Ok(()) => true,
                Err(err) => {
                    warn!("Failed to send to characteristic {}: {:?}", descriptor.uuid, err);
                    false
                },
            }
        }
    }

    async fn set_notify(&self, descriptor: &CharacteristicDescriptor, enabled: bool) -> bool {
        let (peripheral, characteristic) = match self.find_characteristic(descriptor) {
            Some(found) => found,
            None => return false,
        };

        let result = if enabled {
            peripheral.subscribe(&characteristic).await
        } else {
            peripheral.unsubscribe(&characteristic).await
        };

        match result {
            Ok(()) => true,
            Err(err) => {
                warn!("Failed to set notifications on {}: {:?}", descriptor.uuid, err);
                false
            },
        }
    }
}
