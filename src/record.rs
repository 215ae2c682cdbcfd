/// Per-device aggregate of everything a scan learned about one beacon.
///
/// A record is created the first time an address is seen in a session and
/// is updated in place by every later advertisement from that address. UID
/// and URL frames accumulate (deduplicated by exact bytes); TLM and EID
/// frames keep only the latest payload.
use core::fmt::Write;

use heapless::Vec;

use crate::defaults::{MAX_FRAMES_PER_KIND, UNKNOWN_DEVICE_NAME};
use crate::filter::{format_mac, AdvertisementView, Route};
use crate::frame::{
    self, hex_string, DecodeError, EddystoneFrame, FrameBuf, InstanceString, NamespaceString,
};
use crate::protocol::{MacString, NameString, SerialString};

/// Ordered, deduplicated frame history for one frame kind
pub type FrameHistory = Vec<FrameBuf, MAX_FRAMES_PER_KIND>;

/// What a frame update did to the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameUpdate {
    Appended,
    Duplicate,
    Replaced,
    /// History already holds `MAX_FRAMES_PER_KIND` distinct frames
    Full,
}

#[derive(Debug, Clone)]
pub struct BeaconRecord {
    mac: [u8; 6],
    device_address: MacString,
    display_name: NameString,
    signal_strength: i32,
    connectable: bool,
    serial_number: Option<SerialString>,
    uid_frames: FrameHistory,
    namespace: Option<NamespaceString>,
    instance_id: Option<InstanceString>,
    url_frames: FrameHistory,
    tlm_frame: Option<FrameBuf>,
    eid_frame: Option<FrameBuf>,
}

impl BeaconRecord {
    /// New record for a first sighting. Call [`apply`](Self::apply) with the
    /// same view to take in its payload.
    pub fn new(view: &AdvertisementView<'_>) -> Self {
        let mut device_address = MacString::new();
        format_mac(&view.mac, &mut device_address);

        let mut display_name = NameString::new();
        let _ = display_name.push_str(UNKNOWN_DEVICE_NAME);

        Self {
            mac: view.mac,
            device_address,
            display_name,
            signal_strength: view.rssi,
            connectable: false,
            serial_number: None,
            uid_frames: Vec::new(),
            namespace: None,
            instance_id: None,
            url_frames: Vec::new(),
            tlm_frame: None,
            eid_frame: None,
        }
    }

    /// Fold one advertisement into the record. Decode failures are logged
    /// and leave the affected field untouched.
    pub fn apply(&mut self, view: &AdvertisementView<'_>) {
        self.signal_strength = view.rssi;
        if let Some(name) = view.name.filter(|n| !n.is_empty()) {
            self.set_name(name);
        }

        match view.route {
            Route::Frame(payload) => match self.apply_frame(payload) {
                Ok(FrameUpdate::Full) => log::warn!(
                    "{}: frame history full, dropping frame",
                    self.device_address
                ),
                Ok(_) => {}
                Err(e) => log::debug!("{}: {}", self.device_address, e),
            },
            Route::ConfigMode { serial_payload } => self.apply_config_mode(serial_payload),
            Route::None => {}
        }
    }

    fn set_name(&mut self, name: &str) {
        if self.display_name.as_str() == name {
            return;
        }
        self.display_name.clear();
        // Names longer than the buffer keep their leading characters
        for c in name.chars() {
            if self.display_name.push(c).is_err() {
                break;
            }
        }
    }

    fn apply_frame(&mut self, payload: &[u8]) -> Result<FrameUpdate, DecodeError> {
        let update = match frame::decode(payload)? {
            EddystoneFrame::Uid {
                namespace,
                instance,
                raw,
            } => {
                let update = append_unique(&mut self.uid_frames, raw);
                if update == FrameUpdate::Appended {
                    self.namespace = Some(hex_string(&namespace));
                    self.instance_id = Some(hex_string(&instance));
                }
                update
            }
            EddystoneFrame::Url { raw } => append_unique(&mut self.url_frames, raw),
            EddystoneFrame::Tlm { raw } => {
                self.tlm_frame = Some(raw);
                FrameUpdate::Replaced
            }
            EddystoneFrame::Eid { raw } => {
                self.eid_frame = Some(raw);
                FrameUpdate::Replaced
            }
        };
        Ok(update)
    }

    fn apply_config_mode(&mut self, serial_payload: Option<&[u8]>) {
        self.connectable = true;
        if self.serial_number.is_some() {
            return;
        }

        let Some(payload) = serial_payload else {
            log::debug!("{}: no serial number in manufacturer data", self.device_address);
            return;
        };
        match frame::decode_serial(payload) {
            Ok(serial) => {
                let mut s = SerialString::new();
                let _ = write!(s, "{serial}");
                log::debug!("{}: serial number {}", self.device_address, s);
                self.serial_number = Some(s);
            }
            Err(e) => log::debug!(
                "{}: unable to parse serial number: {}",
                self.device_address,
                e
            ),
        }
    }

    pub fn mac(&self) -> &[u8; 6] {
        &self.mac
    }

    pub fn device_address(&self) -> &str {
        &self.device_address
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn signal_strength(&self) -> i32 {
        self.signal_strength
    }

    pub fn connectable(&self) -> bool {
        self.connectable
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.instance_id.as_deref()
    }

    pub fn uid_frames(&self) -> &[FrameBuf] {
        &self.uid_frames
    }

    pub fn url_frames(&self) -> &[FrameBuf] {
        &self.url_frames
    }

    pub fn tlm_frame(&self) -> Option<&[u8]> {
        self.tlm_frame.as_deref()
    }

    pub fn eid_frame(&self) -> Option<&[u8]> {
        self.eid_frame.as_deref()
    }

    /// Immutable copy for consumers outside the session.
    pub fn snapshot(&self) -> BeaconSnapshot {
        BeaconSnapshot {
            device_address: self.device_address.clone(),
            display_name: self.display_name.clone(),
            signal_strength: self.signal_strength,
            connectable: self.connectable,
            serial_number: self.serial_number.clone(),
            namespace: self.namespace.clone(),
            instance_id: self.instance_id.clone(),
            uid_frames: self.uid_frames.clone(),
            url_frames: self.url_frames.clone(),
            tlm_frame: self.tlm_frame.clone(),
            eid_frame: self.eid_frame.clone(),
        }
    }
}

fn append_unique(history: &mut FrameHistory, raw: FrameBuf) -> FrameUpdate {
    if history.contains(&raw) {
        return FrameUpdate::Duplicate;
    }
    match history.push(raw) {
        Ok(()) => FrameUpdate::Appended,
        Err(_) => FrameUpdate::Full,
    }
}

/// A beacon as reported at the end of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconSnapshot {
    pub device_address: MacString,
    pub display_name: NameString,
    pub signal_strength: i32,
    pub connectable: bool,
    pub serial_number: Option<SerialString>,
    pub namespace: Option<NamespaceString>,
    pub instance_id: Option<InstanceString>,
    pub uid_frames: FrameHistory,
    pub url_frames: FrameHistory,
    pub tlm_frame: Option<FrameBuf>,
    pub eid_frame: Option<FrameBuf>,
}
