use std::sync::Mutex;
use std::time::Duration;
use async_trait::async_trait;
use futures::channel::mpsc::UnboundedSender;
use tokio::time::{sleep, Instant};
use uuid::Uuid;

use crate::device::constants::{UART_RX_UUID, UART_SERVICE_UUID, UART_TX_UUID};
use crate::device::transport::Transport;
use crate::device::types::{CharacteristicDescriptor, ServiceDescriptor, TransportEvent};
use crate::error::TransportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub at: Instant,
    pub characteristic: Uuid,
    pub bytes: Vec<u8>,
}

/// Transport that answers connect and discovery requests with the matching events.
pub struct MockTransport {
    events: UnboundedSender<TransportEvent>,
    services: Vec<ServiceDescriptor>,
    fail_init: bool,
    fail_connect: bool,
    fail_writes: bool,
    connect_delay: Duration,
    write_delay: Duration,
    connects: Mutex<u32>,
    disconnects: Mutex<u32>,
    writes: Mutex<Vec<RecordedWrite>>,
    notifies: Mutex<Vec<(Uuid, bool)>>,
}

impl MockTransport {
    pub fn new(events: UnboundedSender<TransportEvent>) -> Self {
        MockTransport::with_services(events, vec![uart_service()])
    }

    pub fn with_services(events: UnboundedSender<TransportEvent>, services: Vec<ServiceDescriptor>) -> Self {
        MockTransport {
            events,
            services,
            fail_init: false,
            fail_connect: false,
            fail_writes: false,
            connect_delay: Duration::ZERO,
            write_delay: Duration::ZERO,
            connects: Mutex::new(0),
            disconnects: Mutex::new(0),
            writes: Mutex::new(Vec::new()),
            notifies: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_init(events: UnboundedSender<TransportEvent>) -> Self {
        MockTransport { fail_init: true, ..MockTransport::new(events) }
    }

    pub fn failing_connect(events: UnboundedSender<TransportEvent>) -> Self {
        MockTransport { fail_connect: true, ..MockTransport::new(events) }
    }

    /// Writes are recorded, but report failure.
    pub fn failing_writes(events: UnboundedSender<TransportEvent>) -> Self {
        MockTransport { fail_writes: true, ..MockTransport::new(events) }
    }

    /// Like a scan that takes a while to find the robot.
    pub fn with_connect_delay(self, connect_delay: Duration) -> Self {
        MockTransport { connect_delay, ..self }
    }

    /// Writes are recorded when they start, and complete after `write_delay`.
    pub fn with_write_delay(self, write_delay: Duration) -> Self {
        MockTransport { write_delay, ..self }
    }

    pub fn emit(&self, event: TransportEvent) {
        self.events.unbounded_send(event).unwrap();
    }

    pub fn connects(&self) -> u32 {
        *self.connects.lock().unwrap()
    }

    pub fn disconnects(&self) -> u32 {
        *self.disconnects.lock().unwrap()
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().unwrap().clone()
    }

    pub fn written_tokens(&self) -> Vec<String> {
        self.writes()
            .iter()
            .map(|write| String::from_utf8_lossy(&write.bytes).to_string())
            .collect()
    }

    pub fn notifies(&self) -> Vec<(Uuid, bool)> {
        self.notifies.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn initialize(&self) -> Result<(), TransportError> {
        if self.fail_init {
            return Err(TransportError::NoAdapter);
        }
        Ok(())
    }

    async fn connect(&self, address: &str) -> Result<bool, TransportError> {
        *self.connects.lock().unwrap() += 1;
        if !self.connect_delay.is_zero() {
            sleep(self.connect_delay).await;
        }
        if self.fail_connect {
            return Err(TransportError::PeripheralNotFound { address: address.to_string() });
        }

        self.emit(TransportEvent::Connected);
        Ok(true)
    }

    async fn disconnect(&self) {
        *self.disconnects.lock().unwrap() += 1;
    }

    async fn discover_services(&self) -> Result<(), TransportError> {
        self.emit(TransportEvent::ServicesDiscovered(self.services.clone()));
        Ok(())
    }

    async fn write(&self, characteristic: &CharacteristicDescriptor, bytes: &[u8]) -> bool {
        self.writes.lock().unwrap().push(RecordedWrite {
            at: Instant::now(),
            characteristic: characteristic.uuid,
            bytes: bytes.to_vec(),
        });
        if !self.write_delay.is_zero() {
            sleep(self.write_delay).await;
        }
        !self.fail_writes
    }

    async fn set_notify(&self, characteristic: &CharacteristicDescriptor, enabled: bool) -> bool {
        self.notifies.lock().unwrap().push((characteristic.uuid, enabled));
        true
    }
}

pub fn uart_service() -> ServiceDescriptor {
    ServiceDescriptor {
        uuid: UART_SERVICE_UUID,
        characteristics: vec![
            CharacteristicDescriptor { uuid: UART_TX_UUID, service_uuid: UART_SERVICE_UUID },
            CharacteristicDescriptor { uuid: UART_RX_UUID, service_uuid: UART_SERVICE_UUID },
        ],
    }
}

pub fn uart_service_without_tx() -> ServiceDescriptor {
    ServiceDescriptor {
        uuid: UART_SERVICE_UUID,
        characteristics: vec![
            CharacteristicDescriptor { uuid: UART_RX_UUID, service_uuid: UART_SERVICE_UUID },
        ],
    }
}
