use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::constants;
use crate::error::{Error, Result};
use crate::guid::{self, GUID};
use crate::strings::{split_multi_sz_le, string_from_utf16le, to_multi_sz_le, to_utf16le};

/// Identifies one property of a device or device interface (`DEVPROPKEY`).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PropertyKey {
    pub fmtid: GUID,
    pub pid: u32,
}

impl PropertyKey {
    pub const fn new(fmtid: GUID, pid: u32) -> PropertyKey {
        PropertyKey { fmtid, pid }
    }

    pub fn name(&self) -> Option<&'static str> {
        constants::property_key_name(self)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{} {}", guid::braced(&self.fmtid), self.pid),
        }
    }
}

impl FromStr for PropertyKey {
    type Err = Error;

    /// Accepts a well-known name (`DEVPKEY_Device_FriendlyName`, prefix
    /// optional) or `{fmtid} pid`.
    fn from_str(s: &str) -> Result<Self> {
        if let Some(key) = constants::property_key_from_name(s) {
            return Ok(key);
        }

        let (fmtid, pid) = s
            .trim()
            .rsplit_once([' ', ','])
            .ok_or_else(|| Error::InvalidData(format!("unknown property key: {s}")))?;
        let pid = pid
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::InvalidData(format!("invalid property id: {pid}")))?;

        Ok(PropertyKey::new(guid::parse(fmtid.trim())?, pid))
    }
}

/// Type tag of a property value (`DEVPROPTYPE`).
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PropertyType(pub u32);

impl PropertyType {
    pub const EMPTY: PropertyType = PropertyType(0x00);
    pub const NULL: PropertyType = PropertyType(0x01);
    pub const SBYTE: PropertyType = PropertyType(0x02);
    pub const BYTE: PropertyType = PropertyType(0x03);
    pub const INT16: PropertyType = PropertyType(0x04);
    pub const UINT16: PropertyType = PropertyType(0x05);
    pub const INT32: PropertyType = PropertyType(0x06);
    pub const UINT32: PropertyType = PropertyType(0x07);
    pub const INT64: PropertyType = PropertyType(0x08);
    pub const UINT64: PropertyType = PropertyType(0x09);
    pub const FILETIME: PropertyType = PropertyType(0x10);
    pub const GUID: PropertyType = PropertyType(0x0D);
    pub const BOOLEAN: PropertyType = PropertyType(0x11);
    pub const STRING: PropertyType = PropertyType(0x12);
    pub const DEVPROPKEY: PropertyType = PropertyType(0x15);
    pub const DEVPROPTYPE: PropertyType = PropertyType(0x16);
    pub const ERROR: PropertyType = PropertyType(0x17);
    pub const NTSTATUS: PropertyType = PropertyType(0x18);

    pub const TYPEMOD_ARRAY: u32 = 0x1000;
    pub const TYPEMOD_LIST: u32 = 0x2000;
    const MASK_TYPE: u32 = 0x0FFF;

    pub const BINARY: PropertyType = PropertyType(Self::TYPEMOD_ARRAY | Self::BYTE.0);
    pub const STRING_LIST: PropertyType = PropertyType(Self::TYPEMOD_LIST | Self::STRING.0);

    pub fn base(&self) -> PropertyType {
        PropertyType(self.0 & Self::MASK_TYPE)
    }

    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            PropertyType::EMPTY => "EMPTY",
            PropertyType::NULL => "NULL",
            PropertyType::SBYTE => "SBYTE",
            PropertyType::BYTE => "BYTE",
            PropertyType::INT16 => "INT16",
            PropertyType::UINT16 => "UINT16",
            PropertyType::INT32 => "INT32",
            PropertyType::UINT32 => "UINT32",
            PropertyType::INT64 => "INT64",
            PropertyType::UINT64 => "UINT64",
            PropertyType::FILETIME => "FILETIME",
            PropertyType::GUID => "GUID",
            PropertyType::BOOLEAN => "BOOLEAN",
            PropertyType::STRING => "STRING",
            PropertyType::DEVPROPKEY => "DEVPROPKEY",
            PropertyType::DEVPROPTYPE => "DEVPROPTYPE",
            PropertyType::ERROR => "ERROR",
            PropertyType::NTSTATUS => "NTSTATUS",
            PropertyType::BINARY => "BINARY",
            PropertyType::STRING_LIST => "STRING_LIST",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "0x{:X} {}", self.0, name),
            None => write!(f, "0x{:X}", self.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Empty,
    String(String),
    StringList(Vec<String>),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Boolean(bool),
    Guid(GUID),
    Binary(Vec<u8>),
    Other {
        property_type: PropertyType,
        data: Vec<u8>,
    },
}

const DEVPROP_TRUE: u8 = 0xFF;
const DEVPROP_FALSE: u8 = 0x00;

impl PropertyValue {
    /// Raw representation as stored by the Configuration Manager.
    pub fn encode(&self) -> (PropertyType, Vec<u8>) {
        match self {
            PropertyValue::Empty => (PropertyType::EMPTY, Vec::new()),
            PropertyValue::String(value) => (PropertyType::STRING, to_utf16le(value)),
            PropertyValue::StringList(values) => (PropertyType::STRING_LIST, to_multi_sz_le(values)),
            PropertyValue::Int32(value) => (PropertyType::INT32, value.to_le_bytes().into()),
            PropertyValue::UInt32(value) => (PropertyType::UINT32, value.to_le_bytes().into()),
            PropertyValue::Int64(value) => (PropertyType::INT64, value.to_le_bytes().into()),
            PropertyValue::UInt64(value) => (PropertyType::UINT64, value.to_le_bytes().into()),
            PropertyValue::Boolean(value) => (
                PropertyType::BOOLEAN,
                vec![if *value { DEVPROP_TRUE } else { DEVPROP_FALSE }],
            ),
            PropertyValue::Guid(value) => (PropertyType::GUID, guid::to_le_bytes(value).into()),
            PropertyValue::Binary(data) => (PropertyType::BINARY, data.clone()),
            PropertyValue::Other {
                property_type,
                data,
            } => (*property_type, data.clone()),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Empty => f.write_str("<empty>"),
            PropertyValue::String(value) => f.write_str(value),
            PropertyValue::StringList(values) => write!(f, "{}", values.join("; ")),
            PropertyValue::Int32(value) => write!(f, "{value}"),
            PropertyValue::UInt32(value) => write!(f, "{value} (0x{value:X})"),
            PropertyValue::Int64(value) => write!(f, "{value}"),
            PropertyValue::UInt64(value) => write!(f, "{value}"),
            PropertyValue::Boolean(value) => write!(f, "{value}"),
            PropertyValue::Guid(value) => write!(f, "{}", guid::braced(value)),
            PropertyValue::Binary(data) => write!(f, "{data:02x?}"),
            PropertyValue::Other {
                property_type,
                data,
            } => write!(f, "[{property_type}] {data:02x?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyBuffer {
    pub property_type: PropertyType,
    pub data: Vec<u8>,
}

impl PropertyBuffer {
    pub fn new(property_type: PropertyType, data: Vec<u8>) -> PropertyBuffer {
        PropertyBuffer {
            property_type,
            data,
        }
    }

    fn expect_type(&self, expected: PropertyType) -> Result<()> {
        if self.property_type != expected {
            return Err(Error::TypeMismatch {
                expected,
                actual: self.property_type,
            });
        }
        Ok(())
    }

    fn fixed<const N: usize>(&self) -> Result<[u8; N]> {
        self.data.as_slice().try_into().map_err(|_| {
            Error::InvalidData(format!(
                "expected {N} bytes for {}, got {}",
                self.property_type,
                self.data.len()
            ))
        })
    }

    pub fn as_string(&self) -> Result<String> {
        self.expect_type(PropertyType::STRING)?;
        string_from_utf16le(&self.data)
            .ok_or_else(|| Error::InvalidData("unterminated string property".into()))
    }

    pub fn as_string_list(&self) -> Result<Vec<String>> {
        self.expect_type(PropertyType::STRING_LIST)?;
        Ok(split_multi_sz_le(&self.data))
    }

    pub fn as_guid(&self) -> Result<GUID> {
        self.expect_type(PropertyType::GUID)?;
        guid::from_le_bytes(&self.data)
            .ok_or_else(|| Error::InvalidData(format!("bad guid length {}", self.data.len())))
    }

    /// Accepts both 32 bit integer tags; drivers are not consistent about
    /// signedness for values such as bus numbers.
    pub fn as_u32(&self) -> Result<u32> {
        match self.property_type {
            PropertyType::UINT32 => Ok(u32::from_le_bytes(self.fixed()?)),
            PropertyType::INT32 => Ok(i32::from_le_bytes(self.fixed()?) as u32),
            actual => Err(Error::TypeMismatch {
                expected: PropertyType::UINT32,
                actual,
            }),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        self.expect_type(PropertyType::BOOLEAN)?;
        let [value] = self.fixed::<1>()?;
        Ok(value != DEVPROP_FALSE)
    }

    pub fn decode(&self) -> Result<PropertyValue> {
        let value = match self.property_type {
            PropertyType::EMPTY => PropertyValue::Empty,
            PropertyType::STRING => PropertyValue::String(self.as_string()?),
            PropertyType::STRING_LIST => PropertyValue::StringList(self.as_string_list()?),
            PropertyType::INT32 => PropertyValue::Int32(i32::from_le_bytes(self.fixed()?)),
            PropertyType::UINT32 => PropertyValue::UInt32(u32::from_le_bytes(self.fixed()?)),
            PropertyType::INT64 => PropertyValue::Int64(i64::from_le_bytes(self.fixed()?)),
            PropertyType::UINT64 => PropertyValue::UInt64(u64::from_le_bytes(self.fixed()?)),
            PropertyType::BOOLEAN => PropertyValue::Boolean(self.as_bool()?),
            PropertyType::GUID => PropertyValue::Guid(self.as_guid()?),
            PropertyType::BINARY => PropertyValue::Binary(self.data.clone()),
            property_type => PropertyValue::Other {
                property_type,
                data: self.data.clone(),
            },
        };
        Ok(value)
    }
}

impl From<PropertyValue> for PropertyBuffer {
    fn from(value: PropertyValue) -> Self {
        let (property_type, data) = value.encode();
        PropertyBuffer::new(property_type, data)
    }
}

/// Runs a buffer based property query, growing the buffer while the
/// platform reports `BufferTooSmall`.
pub fn query_with<F>(mut query: F) -> Result<PropertyBuffer>
where
    F: FnMut(&mut [u8]) -> Result<(PropertyType, usize)>,
{
    let mut data = Vec::new();
    loop {
        match query(&mut data) {
            Ok((property_type, size)) => {
                data.truncate(size);
                return Ok(PropertyBuffer::new(property_type, data));
            }
            Err(Error::BufferTooSmall { required_size }) => {
                let required_size = required_size as usize;
                if required_size <= data.len() {
                    return Err(Error::InvalidData(format!(
                        "required size {required_size} does not exceed buffer of {}",
                        data.len()
                    )));
                }
                debug!("Growing property buffer to {required_size} bytes");
                data.resize(required_size, 0);
            }
            Err(err) => return Err(err),
        }
    }
}
