use std::time::Duration;
use uuid::Uuid;

/**
 * How long (milliseconds) a gate stays busy after a press command was written, and how long a
 * press command is deferred when its gate is busy.
 */
pub const PRESS_DELAY: u64 = 140;

/**
 * Same as PRESS_DELAY, for release commands. The firmware needs a little more time after a
 * release before it parses the next command reliably.
 */
pub const RELEASE_DELAY: u64 = 190;

/**
 * How long (milliseconds) a write to a characteristic may take.
 */
pub const WRITE_DEADLINE: u64 = 2000;

/**
 * How often (milliseconds) to look for the requested peripheral while scanning.
 */
pub const SCAN_POLL_DELAY: u64 = 250;

/**
 * How long (seconds) to scan for the requested peripheral before giving up, unless configured.
 */
pub const DEFAULT_SCAN_TIMEOUT: u64 = 30;

/**
 * The UUID of the Nordic UART service (as used by the Adafruit Bluefruit modules).
 */
pub const UART_SERVICE: &str = "6e400001-b5a3-f393-e0a9-e50e24dcca9e";

/**
 * The UUID of the characteristic that commands are written to.
 */
pub const UART_TX_CHARACTERISTIC: &str = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";

/**
 * The UUID of the characteristic that the robot sends notifications on.
 */
pub const UART_RX_CHARACTERISTIC: &str = "6e400003-b5a3-f393-e0a9-e50e24dcca9e";

pub const CLIENT_CHARACTERISTIC_CONFIG: &str = "00002902-0000-1000-8000-00805f9b34fb";
pub const HM_10_SERIAL_SERVICE: &str = "0000ffe0-0000-1000-8000-00805f9b34fb";
pub const HM_10_RX_TX_CHARACTERISTIC: &str = "0000ffe1-0000-1000-8000-00805f9b34fb";
pub const WELL_KNOWN_SPP: &str = "00001101-0000-1000-8000-00805f9b34fb";

pub const UART_SERVICE_UUID: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);
pub const UART_TX_UUID: Uuid = Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);
pub const UART_RX_UUID: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);

pub fn press_delay() -> Duration {
    Duration::from_millis(PRESS_DELAY)
}

pub fn release_delay() -> Duration {
    Duration::from_millis(RELEASE_DELAY)
}
