use std::fmt;

pub use windows_core::GUID;

use crate::error::{Error, Result};

pub const NULL: GUID = GUID::from_u128(0);

pub fn is_null(guid: &GUID) -> bool {
    *guid == NULL
}

/// Accepts `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`, optionally in braces.
pub fn parse(s: &str) -> Result<GUID> {
    let inner = s
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(s);

    GUID::try_from(inner).map_err(|_| Error::InvalidData(format!("invalid guid: {s}")))
}

/// Registry style `{XXXXXXXX-...}` rendering.
pub struct Braced<'a>(pub &'a GUID);

impl fmt::Display for Braced<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{:?}}}", self.0)
    }
}

pub fn braced(guid: &GUID) -> Braced<'_> {
    Braced(guid)
}

/* DEVPROP_TYPE_GUID payloads are the in-memory layout */
pub fn from_le_bytes(bytes: &[u8]) -> Option<GUID> {
    let bytes: &[u8; 16] = bytes.try_into().ok()?;
    let mut data4 = [0u8; 8];
    data4.copy_from_slice(&bytes[8..]);
    Some(GUID {
        data1: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        data2: u16::from_le_bytes([bytes[4], bytes[5]]),
        data3: u16::from_le_bytes([bytes[6], bytes[7]]),
        data4,
    })
}

pub fn to_le_bytes(guid: &GUID) -> [u8; 16] {
    let mut bytes = [0u8; 16];
    bytes[0..4].copy_from_slice(&guid.data1.to_le_bytes());
    bytes[4..6].copy_from_slice(&guid.data2.to_le_bytes());
    bytes[6..8].copy_from_slice(&guid.data3.to_le_bytes());
    bytes[8..].copy_from_slice(&guid.data4);
    bytes
}
