/// JSON message protocol for handing scan results to the presentation layer.
///
/// All messages are newline-delimited JSON (NDJSON).
/// Uses `heapless` types for no_std/no-alloc operation.
use heapless::{String, Vec};
use serde::Serialize;

use crate::frame::{InstanceString, NamespaceString};
use crate::record::BeaconSnapshot;
use crate::scanner::ScanErrorCode;
use crate::session::ScanResults;

/// Maximum length for MAC address strings ("AA:BB:CC:DD:EE:FF")
pub type MacString = String<18>;

/// Maximum length for device name strings
pub type NameString = String<33>;

/// Decimal u32 serial number
pub type SerialString = String<10>;

/// Messages sent to the presentation layer
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum DeviceMessage<'a> {
    /// One discovered beacon, in first-seen order
    #[serde(rename = "beacon")]
    Beacon {
        mac: &'a MacString,
        name: &'a NameString,
        rssi: i32,
        #[serde(skip_serializing_if = "Option::is_none")]
        serial: Option<&'a SerialString>,
        #[serde(skip_serializing_if = "Option::is_none")]
        namespace: Option<&'a NamespaceString>,
        #[serde(skip_serializing_if = "Option::is_none")]
        instance: Option<&'a InstanceString>,
        connectable: bool,
        /// Distinct UID frames seen
        uid: u8,
        /// Distinct URL frames seen
        url: u8,
        /// Whether a TLM frame was seen
        tlm: bool,
        /// Whether an EID frame was seen
        eid: bool,
    },
    /// End of a discovery window
    #[serde(rename = "scan_complete")]
    ScanComplete { count: u8 },
    /// Radio reported a scan error
    #[serde(rename = "scan_failed")]
    ScanFailed {
        code: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        notice: Option<&'static str>,
    },
}

impl<'a> From<&'a BeaconSnapshot> for DeviceMessage<'a> {
    fn from(b: &'a BeaconSnapshot) -> Self {
        DeviceMessage::Beacon {
            mac: &b.device_address,
            name: &b.display_name,
            rssi: b.signal_strength,
            serial: b.serial_number.as_ref(),
            namespace: b.namespace.as_ref(),
            instance: b.instance_id.as_ref(),
            connectable: b.connectable,
            uid: b.uid_frames.len() as u8,
            url: b.url_frames.len() as u8,
            tlm: b.tlm_frame.is_some(),
            eid: b.eid_frame.is_some(),
        }
    }
}

impl From<ScanErrorCode> for DeviceMessage<'static> {
    fn from(code: ScanErrorCode) -> Self {
        DeviceMessage::ScanFailed {
            code: code.as_str(),
            notice: code.notice(),
        }
    }
}

/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 256;

/// Buffer type for serialized JSON messages
pub type MsgBuffer = Vec<u8, MAX_MSG_LEN>;

/// Serialize a DeviceMessage to JSON bytes and write to the output buffer.
/// Returns the number of bytes written, or None if serialization failed.
pub fn serialize_message(msg: &DeviceMessage, buf: &mut [u8]) -> Option<usize> {
    match serde_json_core::to_slice(msg, buf) {
        Ok(len) => {
            // Append newline for NDJSON
            if len < buf.len() {
                buf[len] = b'\n';
                Some(len + 1)
            } else {
                Some(len)
            }
        }
        Err(_) => None,
    }
}

/// Serialize a DeviceMessage into an owned buffer.
pub fn to_buffer(msg: &DeviceMessage) -> Option<MsgBuffer> {
    let mut buf = MsgBuffer::new();
    buf.resize_default(MAX_MSG_LEN).ok()?;
    let len = serialize_message(msg, &mut buf)?;
    buf.truncate(len);
    Some(buf)
}

/// Emit a finished scan as NDJSON lines: scan errors, then one line per
/// beacon, then `scan_complete`. Returns the number of lines emitted.
pub fn emit_results(results: &ScanResults, mut sink: impl FnMut(&[u8])) -> usize {
    let mut lines = 0;
    let mut emit = |msg: &DeviceMessage| match to_buffer(msg) {
        Some(buf) => {
            sink(&buf);
            lines += 1;
        }
        None => log::warn!("Dropping message that does not fit {} bytes", MAX_MSG_LEN),
    };

    for &code in &results.errors {
        emit(&DeviceMessage::from(code));
    }
    for beacon in &results.beacons {
        emit(&DeviceMessage::from(beacon));
    }
    emit(&DeviceMessage::ScanComplete {
        count: results.beacons.len() as u8,
    });

    lines
}
