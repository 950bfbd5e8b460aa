//! Human readable names for the GATT services and characteristics we know about.

use uuid::Uuid;

use crate::device::constants::{
    HM_10_RX_TX_CHARACTERISTIC, HM_10_SERIAL_SERVICE, UART_RX_CHARACTERISTIC, UART_SERVICE,
    UART_TX_CHARACTERISTIC, WELL_KNOWN_SPP, CLIENT_CHARACTERISTIC_CONFIG,
};

static ATTRIBUTES: &[(&str, &str)] = &[
    // services
    (HM_10_SERIAL_SERVICE, "HM 10 Serial"),
    ("00001800-0000-1000-8000-00805f9b34fb", "Device Information Service"),
    (UART_SERVICE, "UART Service"),
    (WELL_KNOWN_SPP, "Serial Port Profile"),
    // characteristics
    (HM_10_RX_TX_CHARACTERISTIC, "RX/TX data"),
    ("00002a29-0000-1000-8000-00805f9b34fb", "Manufacturer Name String"),
    (UART_TX_CHARACTERISTIC, "UART TX"),
    (UART_RX_CHARACTERISTIC, "UART RX"),
    (CLIENT_CHARACTERISTIC_CONFIG, "Client Characteristic Configuration"),
];

/// Returns the registered name for `uuid`, or `fallback` if there is none.
///
/// UUIDs are compared case-insensitively, so `0000FFE0-...` and `0000ffe0-...` resolve to the
/// same name.
pub fn lookup<'a>(uuid: &str, fallback: &'a str) -> &'a str {
    ATTRIBUTES
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(uuid))
        .map(|(_, name)| *name)
        .unwrap_or(fallback)
}

pub fn lookup_uuid<'a>(uuid: &Uuid, fallback: &'a str) -> &'a str {
    lookup(&uuid.to_string(), fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::constants::UART_TX_UUID;

    #[test]
    fn known_uuid_resolves() {
        assert_eq!(lookup("0000ffe0-0000-1000-8000-00805f9b34fb", "Unknown"), "HM 10 Serial");
        assert_eq!(lookup("00002a29-0000-1000-8000-00805f9b34fb", "Unknown"), "Manufacturer Name String");
    }

    #[test]
    fn unknown_uuid_falls_back() {
        assert_eq!(lookup("deadbeef-0000-0000-0000-000000000000", "Unknown"), "Unknown");
        assert_eq!(lookup("", "nothing"), "nothing");
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(lookup("0000FFE1-0000-1000-8000-00805F9B34FB", "Unknown"), "RX/TX data");
    }

    #[test]
    fn lookup_by_uuid() {
        assert_eq!(lookup_uuid(&UART_TX_UUID, "Unknown"), "UART TX");
    }

    #[test]
    fn lookup_from_many_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| lookup(HM_10_SERIAL_SERVICE, "Unknown")))
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), "HM 10 Serial");
        }
    }
}
