/// Eddystone frame decoding.
///
/// Service data for the Eddystone UUID starts with a frame type byte that
/// selects the layout of the rest of the payload. UID frames are split into
/// namespace and instance; URL, TLM and EID frames are kept as raw bytes.
///
/// Everything here is pure: no state, no allocation, callable from any
/// context.
use core::fmt::{self, Write};

use heapless::{String, Vec};

use crate::defaults::{EID_FRAME_TYPE, MAX_FRAME_LEN, TLM_FRAME_TYPE, UID_FRAME_TYPE, URL_FRAME_TYPE};

/// Owned copy of one service-data payload.
pub type FrameBuf = Vec<u8, MAX_FRAME_LEN>;

/// UID namespace as lowercase hex (10 bytes)
pub type NamespaceString = String<20>;

/// UID instance as lowercase hex (6 bytes)
pub type InstanceString = String<12>;

/// UID layout: [frame type] [tx power] [namespace: 10] [instance: 6] [rfu: 2]
pub const UID_NAMESPACE_OFFSET: usize = 2;
pub const UID_NAMESPACE_LEN: usize = 10;
pub const UID_INSTANCE_OFFSET: usize = UID_NAMESPACE_OFFSET + UID_NAMESPACE_LEN;
pub const UID_INSTANCE_LEN: usize = 6;

/// Shortest payload that still holds a complete namespace and instance.
pub const UID_MIN_LEN: usize = UID_INSTANCE_OFFSET + UID_INSTANCE_LEN;

/// A decoded Eddystone frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EddystoneFrame {
    Uid {
        namespace: [u8; UID_NAMESPACE_LEN],
        instance: [u8; UID_INSTANCE_LEN],
        raw: FrameBuf,
    },
    Url { raw: FrameBuf },
    Tlm { raw: FrameBuf },
    Eid { raw: FrameBuf },
}

impl EddystoneFrame {
    /// The undecoded service-data payload.
    pub fn raw(&self) -> &[u8] {
        match self {
            EddystoneFrame::Uid { raw, .. }
            | EddystoneFrame::Url { raw }
            | EddystoneFrame::Tlm { raw }
            | EddystoneFrame::Eid { raw } => raw,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EddystoneFrame::Uid { .. } => "uid",
            EddystoneFrame::Url { .. } => "url",
            EddystoneFrame::Tlm { .. } => "tlm",
            EddystoneFrame::Eid { .. } => "eid",
        }
    }
}

/// Why a payload could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Zero-length payload
    Empty,
    /// Payload too short for its frame layout
    Truncated,
    /// Leading byte is not an Eddystone frame type
    UnknownFrameType(u8),
    /// Payload longer than [`MAX_FRAME_LEN`]
    Oversized,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Empty => f.write_str("empty payload"),
            DecodeError::Truncated => f.write_str("truncated payload"),
            DecodeError::UnknownFrameType(b) => write!(f, "invalid frame type byte {b:02X}"),
            DecodeError::Oversized => write!(f, "payload exceeds {MAX_FRAME_LEN} bytes"),
        }
    }
}

/// True if `byte` is one of the four Eddystone frame type tags.
pub fn is_eddystone_frame_type(byte: u8) -> bool {
    matches!(
        byte,
        UID_FRAME_TYPE | URL_FRAME_TYPE | TLM_FRAME_TYPE | EID_FRAME_TYPE
    )
}

/// Decode an Eddystone service-data payload.
pub fn decode(service_data: &[u8]) -> Result<EddystoneFrame, DecodeError> {
    let &frame_type = service_data.first().ok_or(DecodeError::Empty)?;

    match frame_type {
        UID_FRAME_TYPE => {
            if service_data.len() < UID_MIN_LEN {
                return Err(DecodeError::Truncated);
            }
            let mut namespace = [0u8; UID_NAMESPACE_LEN];
            namespace.copy_from_slice(&service_data[UID_NAMESPACE_OFFSET..UID_INSTANCE_OFFSET]);
            let mut instance = [0u8; UID_INSTANCE_LEN];
            instance.copy_from_slice(&service_data[UID_INSTANCE_OFFSET..UID_MIN_LEN]);
            Ok(EddystoneFrame::Uid {
                namespace,
                instance,
                raw: copy_raw(service_data)?,
            })
        }
        URL_FRAME_TYPE => Ok(EddystoneFrame::Url {
            raw: copy_raw(service_data)?,
        }),
        TLM_FRAME_TYPE => Ok(EddystoneFrame::Tlm {
            raw: copy_raw(service_data)?,
        }),
        EID_FRAME_TYPE => Ok(EddystoneFrame::Eid {
            raw: copy_raw(service_data)?,
        }),
        other => Err(DecodeError::UnknownFrameType(other)),
    }
}

/// Read the configuration-mode serial number: a little-endian u32 at the
/// start of the manufacturer payload. Trailing bytes are ignored.
pub fn decode_serial(manufacturer_payload: &[u8]) -> Result<u32, DecodeError> {
    let bytes: [u8; 4] = manufacturer_payload
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(DecodeError::Truncated)?;
    Ok(u32::from_le_bytes(bytes))
}

/// Render bytes as lowercase hex into a fixed-capacity string.
///
/// Bytes that do not fit in `N` are dropped.
pub fn hex_string<const N: usize>(bytes: &[u8]) -> String<N> {
    let mut s = String::new();
    for b in bytes {
        if write!(s, "{b:02x}").is_err() {
            break;
        }
    }
    s
}

fn copy_raw(payload: &[u8]) -> Result<FrameBuf, DecodeError> {
    FrameBuf::from_slice(payload).map_err(|_| DecodeError::Oversized)
}
