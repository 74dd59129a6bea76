use std::fmt;

use thiserror::Error;

use crate::property::PropertyType;

/// Status code returned by the Configuration Manager (`CONFIGRET`).
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ConfigRet(pub u32);

impl ConfigRet {
    pub const SUCCESS: ConfigRet = ConfigRet(0x00);
    pub const OUT_OF_MEMORY: ConfigRet = ConfigRet(0x02);
    pub const INVALID_POINTER: ConfigRet = ConfigRet(0x03);
    pub const INVALID_FLAG: ConfigRet = ConfigRet(0x04);
    pub const INVALID_DEVNODE: ConfigRet = ConfigRet(0x05);
    pub const NO_SUCH_DEVNODE: ConfigRet = ConfigRet(0x0D);
    pub const FAILURE: ConfigRet = ConfigRet(0x13);
    pub const BUFFER_SMALL: ConfigRet = ConfigRet(0x1A);
    pub const REGISTRY_ERROR: ConfigRet = ConfigRet(0x1D);
    pub const INVALID_DEVICE_ID: ConfigRet = ConfigRet(0x1E);
    pub const INVALID_DATA: ConfigRet = ConfigRet(0x1F);
    pub const NO_SUCH_VALUE: ConfigRet = ConfigRet(0x25);
    pub const ACCESS_DENIED: ConfigRet = ConfigRet(0x33);
    pub const NO_SUCH_DEVICE_INTERFACE: ConfigRet = ConfigRet(0x37);

    pub fn is_success(&self) -> bool {
        *self == ConfigRet::SUCCESS
    }

    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            ConfigRet::SUCCESS => "CR_SUCCESS",
            ConfigRet::OUT_OF_MEMORY => "CR_OUT_OF_MEMORY",
            ConfigRet::INVALID_POINTER => "CR_INVALID_POINTER",
            ConfigRet::INVALID_FLAG => "CR_INVALID_FLAG",
            ConfigRet::INVALID_DEVNODE => "CR_INVALID_DEVNODE",
            ConfigRet::NO_SUCH_DEVNODE => "CR_NO_SUCH_DEVNODE",
            ConfigRet::FAILURE => "CR_FAILURE",
            ConfigRet::BUFFER_SMALL => "CR_BUFFER_SMALL",
            ConfigRet::REGISTRY_ERROR => "CR_REGISTRY_ERROR",
            ConfigRet::INVALID_DEVICE_ID => "CR_INVALID_DEVICE_ID",
            ConfigRet::INVALID_DATA => "CR_INVALID_DATA",
            ConfigRet::NO_SUCH_VALUE => "CR_NO_SUCH_VALUE",
            ConfigRet::ACCESS_DENIED => "CR_ACCESS_DENIED",
            ConfigRet::NO_SUCH_DEVICE_INTERFACE => "CR_NO_SUCH_DEVICE_INTERFACE",
            _ => return None,
        };
        Some(name)
    }

    /// Maps a status from a call that produces no data.
    ///
    /// `CR_BUFFER_SMALL` is reported as a platform error here because the
    /// required size is only known to calls that take a buffer.
    pub fn ok(self) -> Result<()> {
        match self {
            ConfigRet::SUCCESS => Ok(()),
            ConfigRet::NO_SUCH_VALUE => Err(Error::PropertyNotFound),
            code => Err(Error::Platform { code }),
        }
    }
}

impl fmt::Display for ConfigRet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "0x{:X} {}", self.0, name),
            None => write!(f, "0x{:X}", self.0),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration manager call failed (CONFIGRET {code})")]
    Platform { code: ConfigRet },

    #[error("property buffer too small ({required_size} bytes required)")]
    BufferTooSmall { required_size: u32 },

    #[error("property not found")]
    PropertyNotFound,

    #[error("property type mismatch (got {actual}, expected {expected})")]
    TypeMismatch {
        expected: PropertyType,
        actual: PropertyType,
    },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("no class guid known for {0}")]
    UnsupportedClass(String),
}

impl Error {
    pub fn platform(code: ConfigRet) -> Error {
        Error::Platform { code }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_ret_display() {
        assert_eq!(ConfigRet::BUFFER_SMALL.to_string(), "0x1A CR_BUFFER_SMALL");
        assert_eq!(ConfigRet(0x99).to_string(), "0x99");
    }

    #[test]
    fn config_ret_ok() {
        assert!(ConfigRet::SUCCESS.ok().is_ok());
        assert!(matches!(
            ConfigRet::NO_SUCH_VALUE.ok(),
            Err(Error::PropertyNotFound)
        ));
        assert!(matches!(
            ConfigRet::INVALID_DATA.ok(),
            Err(Error::Platform {
                code: ConfigRet::INVALID_DATA
            })
        ));
    }
}
