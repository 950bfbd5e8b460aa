use async_trait::async_trait;

use crate::device::types::CharacteristicDescriptor;
use crate::error::TransportError;

/// The platform bluetooth stack.
///
/// Lifecycle events (`TransportEvent`) are not returned from these methods; an implementation
/// pushes them into the channel it was constructed with, in the order they happen.
///
/// `connect`, `discover_services` and `write` may take as long as the radio needs (a scan can
/// last many seconds). Callers that must stay responsive run them on a separate task.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Acquire the bluetooth adapter. A failure here is fatal for the session.
    async fn initialize(&self) -> Result<(), TransportError>;

    /// Start connecting to `address`. Returns false if the connection attempt could not be started.
    /// `TransportEvent::Connected` follows once the link is up.
    async fn connect(&self, address: &str) -> Result<bool, TransportError>;

    async fn disconnect(&self);

    /// Results in `TransportEvent::ServicesDiscovered`.
    async fn discover_services(&self) -> Result<(), TransportError>;

    async fn write(&self, characteristic: &CharacteristicDescriptor, bytes: &[u8]) -> bool;

    async fn set_notify(&self, characteristic: &CharacteristicDescriptor, enabled: bool) -> bool;
}
