/// trouble-host bridge: feeds advertisement reports from the BLE stack
/// runner into an [`AdvertisementHandler`].
///
/// The runner calls `on_adv_reports` synchronously; each report is parsed in
/// place and handed on without copying the advertising data. Advertisements
/// and scan responses are forwarded alike, the session pairs them by address.
use trouble_host::prelude::*;

use crate::scanner::{AdvParser, AdvertisementHandler};

pub struct ReportBridge<'h, H: AdvertisementHandler> {
    handler: &'h H,
}

impl<'h, H: AdvertisementHandler> ReportBridge<'h, H> {
    pub const fn new(handler: &'h H) -> Self {
        Self { handler }
    }

    /// Parse one report and hand it to the handler. Reports whose address is
    /// not 6 bytes are skipped.
    pub fn forward(&self, addr: &[u8], rssi: i8, data: &[u8]) {
        let Ok(addr) = <&[u8; 6]>::try_from(addr) else {
            log::debug!("Skipping report with malformed address");
            return;
        };
        let adv = AdvParser::parse(addr, rssi, data);
        self.handler.on_advertisement(&adv);
    }
}

impl<H: AdvertisementHandler> EventHandler for ReportBridge<'_, H> {
    fn on_adv_reports(&self, mut it: LeAdvReportsIter<'_>) {
        while let Some(Ok(report)) = it.next() {
            self.forward(report.addr.raw(), report.rssi, report.data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use embassy_futures::block_on;
    use embassy_futures::join::join;
    use embassy_time::Duration;
    use heapless::Vec;

    use crate::defaults::EDDYSTONE_SERVICE_UUID;
    use crate::filter::FilterConfig;
    use crate::scanner::{BleRadio, RawAdvertisement, ScanErrorCode, Uuid};
    use crate::session::{ScanConfig, ScanSession};

    const MAC: [u8; 6] = [0xD0, 0x01, 0x02, 0x03, 0x04, 0x05];

    const TLM_PDU: [u8; 11] = [
        0x03, 0x03, 0xAA, 0xFE, // service list: FEAA
        0x06, 0x16, 0xAA, 0xFE, 0x20, 0x00, 0x0B, // service data: TLM prefix
    ];

    const NAME_RSP: [u8; 12] = [
        0x0B, 0x09, b'P', b'a', b'r', b'a', b'b', b'e', b'a', b'c', b'o', b'n',
    ];

    /// Handler that records what it was given
    #[derive(Default)]
    struct Collector {
        reports: RefCell<Vec<([u8; 6], i32, bool, bool), 4>>,
    }

    impl AdvertisementHandler for Collector {
        fn on_advertisement(&self, adv: &RawAdvertisement<'_>) {
            let entry = (
                adv.mac,
                adv.rssi,
                adv.name == Some("Parabeacon"),
                adv.service_data(&EDDYSTONE_SERVICE_UUID).is_some(),
            );
            let _ = self.reports.borrow_mut().push(entry);
        }

        fn on_scan_failed(&self, _code: ScanErrorCode) {}
    }

    struct IdleRadio;

    impl BleRadio for IdleRadio {
        fn start_scan(&self, _filters: &[Uuid]) -> Result<(), ScanErrorCode> {
            Ok(())
        }

        fn stop_scan(&self) {}
    }

    // ── Forwarding ──────────────────────────────────────────────────

    #[test]
    fn forwards_parsed_reports() {
        let collector = Collector::default();
        let bridge = ReportBridge::new(&collector);

        bridge.forward(&MAC, -61, &TLM_PDU);
        bridge.forward(&MAC, -63, &NAME_RSP);

        let reports = collector.reports.borrow();
        assert_eq!(reports.as_slice(), &[(MAC, -61, false, true), (MAC, -63, true, false)]);
    }

    #[test]
    fn malformed_address_skipped() {
        let collector = Collector::default();
        let bridge = ReportBridge::new(&collector);

        bridge.forward(&MAC[..5], -61, &TLM_PDU);
        bridge.forward(&[], -61, &TLM_PDU);

        assert!(collector.reports.borrow().is_empty());
    }

    #[test]
    fn bridge_into_session_finds_split_beacon() {
        let session = ScanSession::new(ScanConfig {
            scan_duration: Duration::from_millis(20),
            filter: FilterConfig::new(),
        });
        let bridge = ReportBridge::new(&session);

        let (results, ()) = block_on(join(session.scan(&IdleRadio), async {
            bridge.forward(&MAC, -61, &TLM_PDU);
            bridge.forward(&MAC, -63, &NAME_RSP);
        }));

        let results = results.unwrap();
        assert_eq!(results.beacons.len(), 1);
        assert_eq!(results.beacons[0].display_name.as_str(), "Parabeacon");
        assert_eq!(results.beacons[0].tlm_frame.as_deref(), Some(&[0x20, 0x00, 0x0B][..]));
    }
}
