/// Fixed configuration for Parabeacon discovery.
///
/// Service UUIDs, the advertised product name, the Eddystone frame tags and
/// the storage bounds used by the session. Runtime overrides live in
/// [`crate::session::ScanConfig`]; everything here is compiled in.
use crate::scanner::Uuid;

/// Advertised name every accepted beacon must carry (exact match).
pub const EXPECTED_DEVICE_NAME: &str = "Parabeacon";

/// Display name for devices that never advertised one.
pub const UNKNOWN_DEVICE_NAME: &str = "[no name]";

/// Length of one discovery window in seconds.
pub const SCAN_DURATION_SECS: u64 = 5;

/// Eddystone service (16-bit 0xFEAA on the Bluetooth base UUID).
pub const EDDYSTONE_SERVICE_UUID: Uuid = Uuid::from_u16(0xFEAA);

/// Eddystone GATT configuration service, advertised while unlockable.
pub const EDDYSTONE_CONFIG_SERVICE_UUID: Uuid = Uuid([
    0xa3, 0xc8, 0x75, 0x00, 0x8e, 0xd3, 0x4b, 0xdf, 0x8a, 0x39, 0xa0, 0x1b, 0xeb, 0xed, 0xe2, 0x95,
]);

/// Parabeacon proprietary service, advertised by beacons that only broadcast.
///
/// Placeholder value: the vendor's real UUID is not known here. Replace it
/// before relying on this filter entry against real hardware.
pub const BEACON_SERVICE_UUID: Uuid = Uuid([
    0x7b, 0x3e, 0x00, 0x01, 0x5c, 0x2a, 0x4d, 0x1f, 0x9e, 0x6b, 0x2f, 0x8c, 0x41, 0xd0, 0x7a, 0x13,
]);

/// Scan filter set handed to the radio. An advertisement matching any entry
/// is delivered.
pub static SCAN_FILTER_UUIDS: &[Uuid] = &[
    EDDYSTONE_SERVICE_UUID,
    EDDYSTONE_CONFIG_SERVICE_UUID,
    BEACON_SERVICE_UUID,
];

/// Eddystone frame type bytes (first byte of the service data).
pub const UID_FRAME_TYPE: u8 = 0x00;
pub const URL_FRAME_TYPE: u8 = 0x10;
pub const TLM_FRAME_TYPE: u8 = 0x20;
pub const EID_FRAME_TYPE: u8 = 0x30;

/// Manufacturer company ID carrying the serial number in configuration mode.
pub const SERIAL_COMPANY_ID: u16 = 0x05B3;

/// Maximum devices tracked per session. Must be a power of two (index map).
pub const MAX_BEACONS: usize = 16;

/// Distinct UID (and, separately, URL) frames kept per device.
pub const MAX_FRAMES_PER_KIND: usize = 4;

/// Largest service-data payload retained (legacy advertising PDU limit).
pub const MAX_FRAME_LEN: usize = 31;

/// Devices whose advertisement and scan response are tracked until both
/// halves have been seen. Must be a power of two (index map).
pub const MAX_SIGHTINGS: usize = 32;

/// Scan errors remembered per session.
pub const MAX_SCAN_ERRORS: usize = 4;
