/// Bounded-duration scan session.
///
/// A [`ScanSession`] runs one discovery window at a time: `scan()` starts the
/// radio, waits out the configured duration, stops the radio and resolves to
/// the beacons seen, in first-seen order. In between, the radio delivers
/// advertisements through the session's [`AdvertisementHandler`] impl, from
/// any thread.
///
/// A beacon whose advertisement is full carries its name only in the scan
/// response, which in turn lacks the service data. The session pairs the
/// two halves per address before applying the filter, keeping the frame
/// from a half that arrives first.
///
/// All session state sits behind one critical-section mutex, so
/// lookup-or-create of a record, its first-seen slot and every record update
/// happen as one unit. The final snapshot is taken under the same lock.
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Timer};
use heapless::index_map::FnvIndexMap;
use heapless::Vec;

use crate::defaults::{MAX_BEACONS, MAX_SCAN_ERRORS, MAX_SIGHTINGS, SCAN_DURATION_SECS};
use crate::filter::{AdvertisementView, FilterConfig, Route};
use crate::frame::FrameBuf;
use crate::record::{BeaconRecord, BeaconSnapshot};
use crate::scanner::{AdvertisementHandler, BleRadio, RawAdvertisement, ScanErrorCode};

/// Runtime scan configuration.
#[derive(Debug, Clone, Copy)]
pub struct ScanConfig {
    /// Length of the discovery window
    pub scan_duration: Duration,
    pub filter: FilterConfig,
}

impl ScanConfig {
    pub const fn new() -> Self {
        Self {
            scan_duration: Duration::from_secs(SCAN_DURATION_SECS),
            filter: FilterConfig::new(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Scanning,
    /// Window closed, radio being stopped; late events still land
    Stopping,
}

/// Outcome of one discovery window.
#[derive(Debug, Clone, Default)]
pub struct ScanResults {
    /// Beacons in first-seen order
    pub beacons: Vec<BeaconSnapshot, MAX_BEACONS>,
    /// Scan errors reported during the window, in arrival order
    pub errors: Vec<ScanErrorCode, MAX_SCAN_ERRORS>,
}

impl ScanResults {
    pub const fn new() -> Self {
        Self {
            beacons: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// First notice the presentation layer should show, if any.
    pub fn notice(&self) -> Option<&'static str> {
        self.errors.iter().find_map(|code| code.notice())
    }
}

/// Partial knowledge about an address not yet accepted
#[derive(Debug, Default)]
struct Sighting {
    /// Expected name seen in some report
    named: bool,
    /// Filtered service seen in some report
    advertises_service: bool,
    /// Latest frame from a report that could not be accepted yet
    frame: Option<FrameBuf>,
}

struct SessionInner {
    state: SessionState,
    /// Insertion order of the map is the first-seen order
    beacons: FnvIndexMap<[u8; 6], BeaconRecord, MAX_BEACONS>,
    sightings: FnvIndexMap<[u8; 6], Sighting, MAX_SIGHTINGS>,
    errors: Vec<ScanErrorCode, MAX_SCAN_ERRORS>,
}

impl SessionInner {
    const fn new() -> Self {
        Self {
            state: SessionState::Idle,
            beacons: FnvIndexMap::new(),
            sightings: FnvIndexMap::new(),
            errors: Vec::new(),
        }
    }

    /// Idle → Scanning. False if a scan is already running.
    fn begin(&mut self) -> bool {
        if self.state != SessionState::Idle {
            return false;
        }
        self.beacons.clear();
        self.sightings.clear();
        self.errors.clear();
        self.state = SessionState::Scanning;
        true
    }

    /// Filter one report and fold it into the table.
    ///
    /// A report naming another product is dropped. A report with the
    /// expected name and a filtered service is accepted directly, as is any
    /// report from an address already in the table. Anything else is one
    /// half of a split advertisement and waits in `sightings` for the other.
    fn observe(&mut self, filter: &FilterConfig, adv: &RawAdvertisement<'_>) {
        let named = filter.is_expected_name(adv.name);
        if !named && adv.name.is_some_and(|n| !n.is_empty()) {
            return;
        }
        let service = filter.advertises_filtered_service(adv);

        let mut view = AdvertisementView::classify(adv);
        if !named {
            view.name = Some(filter.device_name);
        }

        if (named && service) || self.beacons.contains_key(&adv.mac) {
            self.record(&view);
            return;
        }
        if !named && !service {
            return;
        }

        let Some(sighting) = self.sighting(adv.mac) else {
            log::debug!("Sighting table full ({} devices), dropping report", MAX_SIGHTINGS);
            return;
        };
        sighting.named |= named;
        sighting.advertises_service |= service;
        if !(sighting.named && sighting.advertises_service) {
            if let Route::Frame(payload) = view.route {
                sighting.frame = FrameBuf::from_slice(payload).ok();
            }
            return;
        }

        let held = sighting.frame.take();
        self.record(&view);
        if let Some(frame) = held {
            self.record(&AdvertisementView {
                mac: view.mac,
                name: None,
                rssi: view.rssi,
                route: Route::Frame(&frame),
            });
        }
    }

    fn sighting(&mut self, mac: [u8; 6]) -> Option<&mut Sighting> {
        if !self.sightings.contains_key(&mac) {
            self.sightings.insert(mac, Sighting::default()).ok()?;
        }
        self.sightings.get_mut(&mac)
    }

    fn record(&mut self, view: &AdvertisementView<'_>) {
        if let Some(record) = self.beacons.get_mut(&view.mac) {
            record.apply(view);
            return;
        }
        if self.beacons.len() >= MAX_BEACONS {
            log::warn!("Beacon table full ({} devices), ignoring new device", MAX_BEACONS);
            return;
        }

        let mut record = BeaconRecord::new(view);
        record.apply(view);
        if self.beacons.insert(view.mac, record).is_ok() {
            log::debug!("New beacon {:02X?} ({} dBm)", view.mac, view.rssi);
        }
    }

    fn results(&self) -> ScanResults {
        let mut results = ScanResults::new();
        for record in self.beacons.values() {
            let _ = results.beacons.push(record.snapshot());
        }
        results.errors = self.errors.clone();
        results
    }
}

pub struct ScanSession {
    config: ScanConfig,
    inner: Mutex<CriticalSectionRawMutex, RefCell<SessionInner>>,
}

impl ScanSession {
    pub const fn new(config: ScanConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(RefCell::new(SessionInner::new())),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.with(|inner| inner.state)
    }

    /// Devices seen so far in the current (or last) window.
    pub fn beacon_count(&self) -> usize {
        self.with(|inner| inner.beacons.len())
    }

    fn with<T>(&self, f: impl FnOnce(&mut SessionInner) -> T) -> T {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Run one discovery window on `radio`.
    ///
    /// Resolves to `None` straight away if a scan is already in progress on
    /// this session; the running scan is left untouched. Radio errors never
    /// end the window early; they are reported in [`ScanResults::errors`].
    ///
    /// Dropping the future before it resolves stops the radio and returns
    /// the session to idle.
    pub async fn scan<R: BleRadio + ?Sized>(&self, radio: &R) -> Option<ScanResults> {
        if !self.with(SessionInner::begin) {
            log::debug!("Scan already in progress, ignoring request");
            return None;
        }

        let mut guard = ScanGuard {
            session: self,
            radio,
            finished: false,
        };

        log::info!(
            "Scan started ({} ms window, {} service filters)",
            self.config.scan_duration.as_millis(),
            self.config.filter.service_uuids.len()
        );
        if let Err(code) = radio.start_scan(self.config.filter.service_uuids) {
            self.on_scan_failed(code);
        }

        Timer::after(self.config.scan_duration).await;

        Some(guard.finish())
    }
}

impl AdvertisementHandler for ScanSession {
    fn on_advertisement(&self, adv: &RawAdvertisement<'_>) {
        self.with(|inner| {
            if inner.state != SessionState::Idle {
                inner.observe(&self.config.filter, adv);
            }
        });
    }

    fn on_scan_failed(&self, code: ScanErrorCode) {
        if code.is_user_visible() {
            log::error!("Scan failed: {}", code);
        } else {
            log::warn!("Scan failed: {}", code);
        }
        self.with(|inner| {
            if inner.state != SessionState::Idle && inner.errors.push(code).is_err() {
                log::debug!("Scan error list full, dropping {}", code);
            }
        });
    }
}

/// Closes the window exactly once, on completion or when the scan future is
/// dropped.
struct ScanGuard<'s, R: BleRadio + ?Sized> {
    session: &'s ScanSession,
    radio: &'s R,
    finished: bool,
}

impl<R: BleRadio + ?Sized> ScanGuard<'_, R> {
    fn finish(&mut self) -> ScanResults {
        self.finished = true;
        self.session.with(|inner| inner.state = SessionState::Stopping);

        // Outside the lock: a stack may flush one last report while stopping
        self.radio.stop_scan();

        let results = self.session.with(|inner| {
            inner.state = SessionState::Idle;
            inner.results()
        });
        log::info!(
            "Scan complete: {} beacons, {} errors",
            results.beacons.len(),
            results.errors.len()
        );
        results
    }
}

impl<R: BleRadio + ?Sized> Drop for ScanGuard<'_, R> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        log::warn!("Scan abandoned before its window closed");
        self.radio.stop_scan();
        self.session.with(|inner| inner.state = SessionState::Idle);
    }
}
