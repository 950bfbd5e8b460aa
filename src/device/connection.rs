use std::sync::Arc;
use futures::channel::mpsc::UnboundedSender;
use log::{debug, error, info, warn};

use crate::device::attributes::lookup_uuid;
use crate::device::binder::{CharacteristicBinding, ServiceBinder};
use crate::device::command::CommandCode;
use crate::device::transport::Transport;
use crate::device::types::{
    CharacteristicDescriptor, ConnectionState, DeviceEvent, PeripheralHandle, ServiceDescriptor, TransportEvent,
};
use crate::error::DispatchError;

pub const CHARACTERISTIC_UNAVAILABLE_NOTICE: &str =
    "An error has occurred: the robot does not offer the command characteristic. The session must restart.";

/// Transport work that a state change asks for. It can take a long time (scanning, service
/// discovery), so the machine leaves running it to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    Connect(PeripheralHandle),
    DiscoverServices,
}

impl LinkAction {
    /// Runs the action to completion. Returns the event to feed back into the machine, if the
    /// transport will not report the outcome by itself.
    pub async fn run<T: Transport + ?Sized>(self, transport: &T) -> Option<TransportEvent> {
        match self {
            LinkAction::Connect(peripheral) => match transport.connect(peripheral.address()).await {
                Ok(true) => None,
                Ok(false) => Some(TransportEvent::ConnectFailed(format!("Connect request to {} was refused", peripheral))),
                Err(err) => Some(TransportEvent::ConnectFailed(format!("Connecting to {} failed: {}", peripheral, err))),
            },
            LinkAction::DiscoverServices => {
                if let Err(err) = transport.discover_services().await {
                    warn!("Service discovery failed: {}", err);
                }
                None
            },
        }
    }
}

/// A command that passed the dispatch checks, together with the characteristics it goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission {
    pub code: CommandCode,
    pub tx: CharacteristicDescriptor,
    pub rx: Option<CharacteristicDescriptor>,
}

impl Transmission {
    /// Writes the command to TX and (re-)enables notifications on RX. Returns the result of the
    /// write.
    pub async fn send<T: Transport + ?Sized>(&self, transport: &T) -> bool {
        debug!("Sending {}", self.code);
        let written = transport.write(&self.tx, &self.code.to_bytes()).await;
        if !written {
            warn!("Failed to send {}", self.code);
        }

        match &self.rx {
            Some(rx) => {
                if !transport.set_notify(rx, true).await {
                    warn!("Failed to enable notifications on RX");
                }
            },
            None => warn!("No RX characteristic to enable notifications on"),
        }

        written
    }
}

/// Tracks the connection to the robot. This is the only place where the connection state changes,
/// and every change is sent to the user interface.
pub struct ConnectionMachine<T: Transport> {
    transport: Arc<T>,
    peripheral: PeripheralHandle,
    state: ConnectionState,
    binder: ServiceBinder,
    senders: Vec<UnboundedSender<DeviceEvent>>,
    reported_unavailable: bool,
}

impl<T: Transport> ConnectionMachine<T> {
    pub fn new(transport: Arc<T>, peripheral: PeripheralHandle, senders: Vec<UnboundedSender<DeviceEvent>>) -> Self {
        ConnectionMachine {
            transport,
            peripheral,
            state: ConnectionState::Disconnected,
            binder: ServiceBinder::default(),
            senders,
            reported_unavailable: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn binding(&self) -> &CharacteristicBinding {
        self.binder.binding()
    }

    fn notify(&self, event: DeviceEvent) {
        for sender in &self.senders {
            if let Err(err) = sender.unbounded_send(event.clone()) {
                debug!("Device event receiver is gone: {:?}", err);
            }
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }

        info!("Connection state {:?} -> {:?}", self.state, state);
        self.state = state;
        self.notify(DeviceEvent::StateChange(state));
    }

    /// Does nothing unless disconnected, the current state is available from `state()`. Otherwise
    /// moves to Connecting and returns the connect request that the caller must run.
    pub fn connect(&mut self) -> Option<LinkAction> {
        if self.state != ConnectionState::Disconnected {
            debug!("Connect requested while {:?}; ignoring", self.state);
            return None;
        }

        self.set_state(ConnectionState::Connecting);
        info!("Connecting to {}...", self.peripheral);
        Some(LinkAction::Connect(self.peripheral.clone()))
    }

    pub async fn disconnect(&mut self) {
        if self.state != ConnectionState::Disconnected {
            info!("Disconnecting from {}", self.peripheral);
            self.transport.disconnect().await;
        }
        self.binder.clear();
        self.set_state(ConnectionState::Disconnected);
    }

    /// The transport could not be initialized. The session is over.
    pub fn fail(&mut self, reason: String) {
        error!("{}", reason);
        self.binder.clear();
        self.set_state(ConnectionState::Disconnected);
        self.notify(DeviceEvent::Fatal(reason));
    }

    pub fn handle_event(&mut self, event: TransportEvent) -> Option<LinkAction> {
        match event {
            TransportEvent::Connected => {
                if self.state != ConnectionState::Connecting {
                    debug!("Ignoring connected event while {:?}", self.state);
                    return None;
                }

                self.set_state(ConnectionState::Connected);
                info!("Connected; Discovering services...");
                return Some(LinkAction::DiscoverServices);
            },
            TransportEvent::ConnectFailed(reason) => {
                if self.state != ConnectionState::Connecting {
                    debug!("Ignoring failed connection attempt while {:?}: {}", self.state, reason);
                    return None;
                }

                warn!("{}", reason);
                self.set_state(ConnectionState::Disconnected);
            },
            TransportEvent::ServicesDiscovered(services) => {
                match self.state {
                    ConnectionState::Connected | ConnectionState::ServicesDiscovered => {
                        log_services(&services);
                        self.binder.bind(&services);
                        self.set_state(ConnectionState::ServicesDiscovered);
                    },
                    _ => debug!("Ignoring discovered services while {:?}", self.state),
                }
            },
            TransportEvent::Disconnected => {
                if self.state != ConnectionState::Disconnected {
                    warn!("Connection lost");
                }
                self.binder.clear();
                self.set_state(ConnectionState::Disconnected);
            },
            TransportEvent::DataAvailable(data) => {
                debug!("Received {} bytes", data.len());
                self.notify(DeviceEvent::Data(data));
            },
        }

        None
    }

    /// Checks that `code` can be sent right now. The first time the TX characteristic turns out
    /// to be missing, a fatal notice is sent to the user interface.
    pub fn prepare(&mut self, code: &CommandCode) -> Result<Transmission, DispatchError> {
        if self.state != ConnectionState::ServicesDiscovered {
            debug!("Dropping {}: {:?}", code, self.state);
            return Err(DispatchError::NotReady { state: self.state });
        }

        let CharacteristicBinding { tx, rx } = *self.binder.binding();
        match tx {
            Some(tx) => Ok(Transmission { code: *code, tx, rx }),
            None => {
                warn!("Dropping {}: no TX characteristic", code);
                if !self.reported_unavailable {
                    self.reported_unavailable = true;
                    self.notify(DeviceEvent::Fatal(CHARACTERISTIC_UNAVAILABLE_NOTICE.to_string()));
                }
                Err(DispatchError::CharacteristicUnavailable)
            },
        }
    }

    /// Writes `code` to TX and (re-)enables notifications on RX, waiting for the transport.
    ///
    /// Returns the result of the write, or an error if the command was dropped.
    pub async fn dispatch(&mut self, code: &CommandCode) -> Result<bool, DispatchError> {
        let transmission = self.prepare(code)?;
        Ok(transmission.send(self.transport.as_ref()).await)
    }
}

fn log_services(services: &[ServiceDescriptor]) {
    for service in services {
        info!("Service {} ({})", service.uuid, lookup_uuid(&service.uuid, "Unknown service"));
        for characteristic in &service.characteristics {
            info!(
                "  Characteristic {} ({})",
                characteristic.uuid,
                lookup_uuid(&characteristic.uuid, "Unknown characteristic"),
            );
        }
    }
}
