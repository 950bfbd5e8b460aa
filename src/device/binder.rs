use log::{debug, info};
use uuid::Uuid;

use crate::device::constants::{UART_RX_UUID, UART_TX_UUID};
use crate::device::types::{CharacteristicDescriptor, ServiceDescriptor};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacteristicBinding {
    pub tx: Option<CharacteristicDescriptor>,
    pub rx: Option<CharacteristicDescriptor>,
}

impl CharacteristicBinding {
    pub fn is_bound(&self) -> bool {
        self.tx.is_some() && self.rx.is_some()
    }
}

/// Locates the TX and RX characteristics in the result of service discovery.
#[derive(Debug)]
pub struct ServiceBinder {
    tx_uuid: Uuid,
    rx_uuid: Uuid,
    binding: CharacteristicBinding,
}

impl Default for ServiceBinder {
    fn default() -> Self {
        ServiceBinder::new(UART_TX_UUID, UART_RX_UUID)
    }
}

impl ServiceBinder {
    pub fn new(tx_uuid: Uuid, rx_uuid: Uuid) -> Self {
        ServiceBinder {
            tx_uuid,
            rx_uuid,
            binding: CharacteristicBinding::default(),
        }
    }

    pub fn binding(&self) -> &CharacteristicBinding {
        &self.binding
    }

    /// Fills the unbound slots with the first matching characteristic. Slots that are already bound
    /// are left alone, and a missing characteristic is not an error here: it is reported when a
    /// command is dispatched.
    pub fn bind(&mut self, services: &[ServiceDescriptor]) -> CharacteristicBinding {
        for service in services {
            for characteristic in &service.characteristics {
                if self.binding.tx.is_none() && characteristic.uuid == self.tx_uuid {
                    info!("Found TX characteristic in service {}", service.uuid);
                    self.binding.tx = Some(*characteristic);
                }

                if self.binding.rx.is_none() && characteristic.uuid == self.rx_uuid {
                    info!("Found RX characteristic in service {}", service.uuid);
                    self.binding.rx = Some(*characteristic);
                }
            }
        }

        if !self.binding.is_bound() {
            debug!("Binding incomplete after discovery: {:?}", self.binding);
        }

        self.binding
    }

    pub fn clear(&mut self) {
        self.binding = CharacteristicBinding::default();
    }
}
