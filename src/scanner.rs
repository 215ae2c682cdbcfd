/// Radio-facing side of the scan engine.
///
/// The BLE stack is an external collaborator. It is driven through
/// [`BleRadio`] (start/stop) and reports back through
/// [`AdvertisementHandler`] (one call per received advertisement). Stacks
/// that only hand over raw advertising bytes can build a
/// [`RawAdvertisement`] with [`AdvParser`].
use core::fmt;

use heapless::Vec;

/// 128-bit service UUID in big-endian (textual) byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uuid(pub [u8; 16]);

/// Bluetooth base UUID: 00000000-0000-1000-8000-00805f9b34fb
const BLUETOOTH_BASE_UUID: [u8; 16] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0x80, 0x5f, 0x9b, 0x34, 0xfb,
];

impl Uuid {
    /// Expand a 32-bit SIG UUID onto the Bluetooth base UUID.
    pub const fn from_u32(short: u32) -> Self {
        let s = short.to_be_bytes();
        let mut b = BLUETOOTH_BASE_UUID;
        b[0] = s[0];
        b[1] = s[1];
        b[2] = s[2];
        b[3] = s[3];
        Self(b)
    }

    /// Expand a 16-bit SIG UUID onto the Bluetooth base UUID.
    pub const fn from_u16(short: u16) -> Self {
        Self::from_u32(short as u32)
    }

    /// Build from the little-endian byte order used on air.
    pub fn from_le_bytes(mut bytes: [u8; 16]) -> Self {
        bytes.reverse();
        Self(bytes)
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Service UUIDs kept per advertisement
pub const MAX_SERVICE_UUIDS: usize = 8;

/// Service-data entries kept per advertisement
pub const MAX_SERVICE_DATA: usize = 4;

/// Manufacturer-data entries kept per advertisement
pub const MAX_MANUFACTURER_DATA: usize = 2;

/// One received advertisement, borrowed from the radio's buffers.
///
/// Only valid for the duration of the handler call; anything retained must
/// be copied out.
#[derive(Debug, Clone)]
pub struct RawAdvertisement<'a> {
    pub mac: [u8; 6],
    pub name: Option<&'a str>,
    pub rssi: i32,
    /// Advertised service UUIDs (16/32-bit entries expanded to 128-bit)
    pub service_uuids: Vec<Uuid, MAX_SERVICE_UUIDS>,
    /// Service data keyed by service UUID
    pub service_data: Vec<(Uuid, &'a [u8]), MAX_SERVICE_DATA>,
    /// Manufacturer-specific data keyed by company ID (ID bytes stripped)
    pub manufacturer_data: Vec<(u16, &'a [u8]), MAX_MANUFACTURER_DATA>,
}

impl<'a> RawAdvertisement<'a> {
    pub fn new(mac: [u8; 6], rssi: i32) -> Self {
        Self {
            mac,
            name: None,
            rssi,
            service_uuids: Vec::new(),
            service_data: Vec::new(),
            manufacturer_data: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn with_service_uuid(mut self, uuid: Uuid) -> Self {
        let _ = self.service_uuids.push(uuid);
        self
    }

    pub fn with_service_data(mut self, uuid: Uuid, data: &'a [u8]) -> Self {
        let _ = self.service_data.push((uuid, data));
        self
    }

    pub fn with_manufacturer_data(mut self, company_id: u16, data: &'a [u8]) -> Self {
        let _ = self.manufacturer_data.push((company_id, data));
        self
    }

    /// Service data for `uuid`, if advertised.
    pub fn service_data(&self, uuid: &Uuid) -> Option<&'a [u8]> {
        self.service_data
            .iter()
            .find(|(u, _)| u == uuid)
            .map(|&(_, data)| data)
    }

    /// Manufacturer data for `company_id`, if advertised.
    pub fn manufacturer_data(&self, company_id: u16) -> Option<&'a [u8]> {
        self.manufacturer_data
            .iter()
            .find(|(id, _)| *id == company_id)
            .map(|&(_, data)| data)
    }

    /// True if `uuid` appears in the service list or keys service data.
    pub fn advertises(&self, uuid: &Uuid) -> bool {
        self.service_uuids.contains(uuid) || self.service_data.iter().any(|(u, _)| u == uuid)
    }
}

/// Parse BLE advertisement data (AD structures) into a [`RawAdvertisement`].
///
/// AD structure format: [length] [type] [data...]
/// Types we care about:
///   0x02/0x03 = Incomplete/Complete list of 16-bit service UUIDs
///   0x04/0x05 = Incomplete/Complete list of 32-bit service UUIDs
///   0x06/0x07 = Incomplete/Complete list of 128-bit service UUIDs
///   0x08/0x09 = Shortened/Complete local name
///   0x16      = Service data, 16-bit UUID
///   0x20      = Service data, 32-bit UUID
///   0x21      = Service data, 128-bit UUID
///   0xFF      = Manufacturer specific data (first 2 bytes = company ID, little-endian)
pub struct AdvParser;

impl AdvParser {
    /// Parse advertisement data bytes.
    ///
    /// Parsing stops at the first malformed structure; whatever was parsed
    /// before it is kept.
    pub fn parse<'a>(addr: &[u8; 6], rssi: i8, ad_data: &'a [u8]) -> RawAdvertisement<'a> {
        let mut adv = RawAdvertisement::new(*addr, rssi.into());

        let mut pos = 0;
        while pos < ad_data.len() {
            let len = ad_data[pos] as usize;
            if len == 0 || pos + 1 + len > ad_data.len() {
                break;
            }

            let ad_type = ad_data[pos + 1];
            let data = &ad_data[pos + 2..pos + 1 + len];

            match ad_type {
                0x02 | 0x03 => {
                    for c in data.chunks_exact(2) {
                        let _ = adv
                            .service_uuids
                            .push(Uuid::from_u16(u16::from_le_bytes([c[0], c[1]])));
                    }
                }
                0x04 | 0x05 => {
                    for c in data.chunks_exact(4) {
                        let _ = adv
                            .service_uuids
                            .push(Uuid::from_u32(u32::from_le_bytes([c[0], c[1], c[2], c[3]])));
                    }
                }
                0x06 | 0x07 => {
                    for c in data.chunks_exact(16) {
                        if let Ok(bytes) = <[u8; 16]>::try_from(c) {
                            let _ = adv.service_uuids.push(Uuid::from_le_bytes(bytes));
                        }
                    }
                }
                // A complete name wins over a shortened one
                0x08 | 0x09 => {
                    if let Ok(name) = core::str::from_utf8(data) {
                        if ad_type == 0x09 || adv.name.is_none() {
                            adv.name = Some(name);
                        }
                    }
                }
                0x16 if data.len() >= 2 => {
                    let uuid = Uuid::from_u16(u16::from_le_bytes([data[0], data[1]]));
                    let _ = adv.service_data.push((uuid, &data[2..]));
                }
                0x20 if data.len() >= 4 => {
                    let uuid =
                        Uuid::from_u32(u32::from_le_bytes([data[0], data[1], data[2], data[3]]));
                    let _ = adv.service_data.push((uuid, &data[4..]));
                }
                0x21 if data.len() >= 16 => {
                    if let Ok(bytes) = <[u8; 16]>::try_from(&data[..16]) {
                        let _ = adv
                            .service_data
                            .push((Uuid::from_le_bytes(bytes), &data[16..]));
                    }
                }
                0xFF if data.len() >= 2 => {
                    let company_id = u16::from_le_bytes([data[0], data[1]]);
                    let _ = adv.manufacturer_data.push((company_id, &data[2..]));
                }
                _ => {}
            }

            pos += 1 + len;
        }

        adv
    }
}

/// Scan failure reported by the radio. Never fatal to a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanErrorCode {
    AlreadyStarted,
    RegistrationFailed,
    FeatureUnsupported,
    InternalError,
    Unknown(i32),
}

impl ScanErrorCode {
    /// Map a host stack error code (Android `ScanCallback` numbering).
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => ScanErrorCode::AlreadyStarted,
            2 => ScanErrorCode::RegistrationFailed,
            3 => ScanErrorCode::InternalError,
            4 => ScanErrorCode::FeatureUnsupported,
            other => ScanErrorCode::Unknown(other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanErrorCode::AlreadyStarted => "already_started",
            ScanErrorCode::RegistrationFailed => "registration_failed",
            ScanErrorCode::FeatureUnsupported => "feature_unsupported",
            ScanErrorCode::InternalError => "internal_error",
            ScanErrorCode::Unknown(_) => "unknown",
        }
    }

    /// Whether the presentation layer should show a notice for this error.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, ScanErrorCode::RegistrationFailed)
    }

    /// Notice text for user-visible errors.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            ScanErrorCode::RegistrationFailed => {
                Some("Scan failed. Try to turn bluetooth OFF and ON again")
            }
            _ => None,
        }
    }
}

impl fmt::Display for ScanErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanErrorCode::Unknown(code) => write!(f, "unknown scan error {code}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Start/stop primitives of the host BLE stack.
///
/// Advertisements matching `filters` are delivered to whichever
/// [`AdvertisementHandler`] the stack was wired to, usually the
/// [`crate::session::ScanSession`].
pub trait BleRadio {
    fn start_scan(&self, filters: &[Uuid]) -> Result<(), ScanErrorCode>;

    /// Must be a no-op when no scan is running.
    fn stop_scan(&self);
}

/// Receiver of radio events. Called from driver threads; must not block.
pub trait AdvertisementHandler {
    fn on_advertisement(&self, adv: &RawAdvertisement<'_>);

    fn on_scan_failed(&self, code: ScanErrorCode);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::{EDDYSTONE_CONFIG_SERVICE_UUID, EDDYSTONE_SERVICE_UUID};

    const MAC: [u8; 6] = [0xC0, 0xFF, 0xEE, 0x00, 0x11, 0x22];

    // ── Uuid ────────────────────────────────────────────────────────

    #[test]
    fn uuid_from_u16_uses_base() {
        let mut s: heapless::String<37> = heapless::String::new();
        core::fmt::write(&mut s, format_args!("{}", Uuid::from_u16(0xFEAA))).unwrap();
        assert_eq!(s.as_str(), "0000feaa-0000-1000-8000-00805f9b34fb");
    }

    #[test]
    fn uuid_display_config_service() {
        let mut s: heapless::String<37> = heapless::String::new();
        core::fmt::write(&mut s, format_args!("{EDDYSTONE_CONFIG_SERVICE_UUID}")).unwrap();
        assert_eq!(s.as_str(), "a3c87500-8ed3-4bdf-8a39-a01bebede295");
    }

    #[test]
    fn uuid_from_le_bytes_reverses() {
        let mut le = EDDYSTONE_CONFIG_SERVICE_UUID.0;
        le.reverse();
        assert_eq!(Uuid::from_le_bytes(le), EDDYSTONE_CONFIG_SERVICE_UUID);
    }

    // ── AD parsing ──────────────────────────────────────────────────

    #[test]
    fn parse_eddystone_service_data() {
        let ad = [
            0x02, 0x01, 0x06, // flags
            0x03, 0x03, 0xAA, 0xFE, // complete 16-bit UUIDs: FEAA
            0x06, 0x16, 0xAA, 0xFE, 0x20, 0x00, 0x0B, // service data FEAA: TLM prefix
        ];
        let adv = AdvParser::parse(&MAC, -60, &ad);
        assert_eq!(adv.mac, MAC);
        assert_eq!(adv.rssi, -60);
        assert!(adv.advertises(&EDDYSTONE_SERVICE_UUID));
        assert_eq!(adv.service_data(&EDDYSTONE_SERVICE_UUID), Some(&[0x20, 0x00, 0x0B][..]));
    }

    #[test]
    fn parse_name_and_manufacturer_data() {
        let ad = [
            0x0B, 0x09, b'P', b'a', b'r', b'a', b'b', b'e', b'a', b'c', b'o', b'n',
            0x07, 0xFF, 0xB3, 0x05, 0xAA, 0x00, 0x00, 0x00,
        ];
        let adv = AdvParser::parse(&MAC, -70, &ad);
        assert_eq!(adv.name, Some("Parabeacon"));
        assert_eq!(adv.manufacturer_data(0x05B3), Some(&[0xAA, 0x00, 0x00, 0x00][..]));
        assert_eq!(adv.manufacturer_data(0x004C), None);
    }

    #[test]
    fn complete_name_wins_over_shortened() {
        let ad = [
            0x05, 0x09, b'F', b'u', b'l', b'l', //
            0x03, 0x08, b'F', b'u',
        ];
        let adv = AdvParser::parse(&MAC, 0, &ad);
        assert_eq!(adv.name, Some("Full"));
    }

    #[test]
    fn parse_128bit_service_data() {
        let mut ad = [0u8; 2 + 16 + 2];
        ad[0] = 19;
        ad[1] = 0x21;
        let mut le = EDDYSTONE_CONFIG_SERVICE_UUID.0;
        le.reverse();
        ad[2..18].copy_from_slice(&le);
        ad[18] = 0x01;
        ad[19] = 0x02;
        let adv = AdvParser::parse(&MAC, 0, &ad);
        assert!(adv.advertises(&EDDYSTONE_CONFIG_SERVICE_UUID));
        assert_eq!(
            adv.service_data(&EDDYSTONE_CONFIG_SERVICE_UUID),
            Some(&[0x01, 0x02][..])
        );
    }

    #[test]
    fn parse_128bit_uuid_list() {
        let mut ad = [0u8; 18];
        ad[0] = 17;
        ad[1] = 0x07;
        let mut le = EDDYSTONE_CONFIG_SERVICE_UUID.0;
        le.reverse();
        ad[2..18].copy_from_slice(&le);
        let adv = AdvParser::parse(&MAC, 0, &ad);
        assert_eq!(adv.service_uuids.as_slice(), &[EDDYSTONE_CONFIG_SERVICE_UUID]);
        assert_eq!(adv.service_data(&EDDYSTONE_CONFIG_SERVICE_UUID), None);
    }

    #[test]
    fn malformed_length_stops_parsing() {
        let ad = [
            0x03, 0x03, 0xAA, 0xFE, // ok
            0x09, 0x09, b'x', // claims 9 bytes, only 2 present
        ];
        let adv = AdvParser::parse(&MAC, 0, &ad);
        assert_eq!(adv.service_uuids.len(), 1);
        assert_eq!(adv.name, None);
    }

    #[test]
    fn zero_length_structure_stops_parsing() {
        let ad = [0x00, 0x03, 0x03, 0xAA, 0xFE];
        let adv = AdvParser::parse(&MAC, 0, &ad);
        assert!(adv.service_uuids.is_empty());
    }

    #[test]
    fn empty_advertisement() {
        let adv = AdvParser::parse(&MAC, -90, &[]);
        assert!(adv.name.is_none());
        assert!(adv.service_data.is_empty());
        assert!(adv.manufacturer_data.is_empty());
    }

    #[test]
    fn short_service_data_skipped() {
        let ad = [0x02, 0x16, 0xAA];
        let adv = AdvParser::parse(&MAC, 0, &ad);
        assert!(adv.service_data.is_empty());
    }

    #[test]
    fn invalid_utf8_name_ignored() {
        let ad = [0x03, 0x09, 0xFF, 0xFE];
        let adv = AdvParser::parse(&MAC, 0, &ad);
        assert!(adv.name.is_none());
    }

    // ── Scan error codes ────────────────────────────────────────────

    #[test]
    fn scan_error_codes_map() {
        assert_eq!(ScanErrorCode::from_code(1), ScanErrorCode::AlreadyStarted);
        assert_eq!(ScanErrorCode::from_code(2), ScanErrorCode::RegistrationFailed);
        assert_eq!(ScanErrorCode::from_code(3), ScanErrorCode::InternalError);
        assert_eq!(ScanErrorCode::from_code(4), ScanErrorCode::FeatureUnsupported);
        assert_eq!(ScanErrorCode::from_code(42), ScanErrorCode::Unknown(42));
    }

    #[test]
    fn only_registration_failure_is_user_visible() {
        assert!(ScanErrorCode::RegistrationFailed.is_user_visible());
        assert!(ScanErrorCode::RegistrationFailed.notice().is_some());
        for code in [
            ScanErrorCode::AlreadyStarted,
            ScanErrorCode::FeatureUnsupported,
            ScanErrorCode::InternalError,
            ScanErrorCode::Unknown(9),
        ] {
            assert!(!code.is_user_visible());
            assert!(code.notice().is_none());
        }
    }
}
