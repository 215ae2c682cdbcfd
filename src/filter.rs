/// Acceptance filter and routing for incoming advertisements.
///
/// The radio is asked to filter on service UUIDs, but not every stack
/// honours that, so the session re-checks here before touching any record.
/// Accepted advertisements are then classified into exactly one handling
/// path.
use crate::defaults::{
    EDDYSTONE_CONFIG_SERVICE_UUID, EDDYSTONE_SERVICE_UUID, EXPECTED_DEVICE_NAME,
    SCAN_FILTER_UUIDS, SERIAL_COMPANY_ID,
};
use crate::frame::is_eddystone_frame_type;
use crate::protocol::MacString;
use crate::scanner::{RawAdvertisement, Uuid};

/// Runtime filter configuration.
#[derive(Debug, Clone, Copy)]
pub struct FilterConfig {
    /// Exact advertised name an accepted device must carry
    pub device_name: &'static str,
    /// Service UUIDs handed to the radio; at least one must be advertised
    pub service_uuids: &'static [Uuid],
}

impl FilterConfig {
    pub const fn new() -> Self {
        Self {
            device_name: EXPECTED_DEVICE_NAME,
            service_uuids: SCAN_FILTER_UUIDS,
        }
    }

    /// Whether an advertisement belongs to this scan on its own, carrying
    /// both the expected name and a filtered service.
    pub fn accepts(&self, adv: &RawAdvertisement<'_>) -> bool {
        self.is_expected_name(adv.name) && self.advertises_filtered_service(adv)
    }

    pub fn is_expected_name(&self, name: Option<&str>) -> bool {
        name == Some(self.device_name)
    }

    pub fn advertises_filtered_service(&self, adv: &RawAdvertisement<'_>) -> bool {
        self.service_uuids.iter().any(|uuid| adv.advertises(uuid))
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Which update path an advertisement takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// Eddystone service data to decode as a frame
    Frame(&'a [u8]),
    /// Configuration mode: connectable, serial number in manufacturer data
    ConfigMode { serial_payload: Option<&'a [u8]> },
    /// Nothing beyond name and signal strength
    None,
}

/// Already-extracted view of one advertisement, consumed by
/// [`crate::record::BeaconRecord::apply`].
#[derive(Debug, Clone, Copy)]
pub struct AdvertisementView<'a> {
    pub mac: [u8; 6],
    pub name: Option<&'a str>,
    pub rssi: i32,
    pub route: Route<'a>,
}

impl<'a> AdvertisementView<'a> {
    /// Classify an advertisement.
    ///
    /// Eddystone service data takes precedence. Without it, a non-empty
    /// configuration-service payload led by an Eddystone frame type is
    /// decoded as a frame; any other non-empty configuration payload means
    /// configuration mode.
    pub fn classify(adv: &RawAdvertisement<'a>) -> Self {
        let route = match adv.service_data(&EDDYSTONE_SERVICE_UUID) {
            Some(data) if !data.is_empty() => Route::Frame(data),
            _ => match adv.service_data(&EDDYSTONE_CONFIG_SERVICE_UUID) {
                Some(data) if !data.is_empty() => {
                    if is_eddystone_frame_type(data[0]) {
                        Route::Frame(data)
                    } else {
                        Route::ConfigMode {
                            serial_payload: adv.manufacturer_data(SERIAL_COMPANY_ID),
                        }
                    }
                }
                _ => Route::None,
            },
        };

        Self {
            mac: adv.mac,
            name: adv.name,
            rssi: adv.rssi,
            route,
        }
    }
}

/// Format a 6-byte MAC address into "AA:BB:CC:DD:EE:FF" string
pub fn format_mac(mac: &[u8; 6], buf: &mut MacString) {
    use core::fmt::Write;
    let _ = write!(
        buf,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
}
