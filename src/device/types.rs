use std::fmt::{self, Display};
use uuid::Uuid;

/// The address (or platform id) of the robot, as chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralHandle(String);

impl PeripheralHandle {
    pub fn new(address: impl Into<String>) -> Self {
        PeripheralHandle(address.into())
    }

    pub fn address(&self) -> &str {
        &self.0
    }
}

impl Display for PeripheralHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    ServicesDiscovered,
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting…",
            ConnectionState::Connected => "Connected",
            ConnectionState::ServicesDiscovered => "Ready",
        };

        write!(f, "{}", result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicDescriptor {
    pub uuid: Uuid,
    pub service_uuid: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub uuid: Uuid,
    pub characteristics: Vec<CharacteristicDescriptor>,
}

/// Lifecycle events emitted by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    /// A connection attempt ended without a link
    ConnectFailed(String),
    Disconnected,
    ServicesDiscovered(Vec<ServiceDescriptor>),
    DataAvailable(Vec<u8>),
}

/// Events for the user interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Also means the data display should be cleared when the new state is Disconnected
    StateChange(ConnectionState),
    Data(Vec<u8>),
    /// The session can not continue and must be restarted
    Fatal(String),
}
