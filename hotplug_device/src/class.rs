use std::fmt;

use crate::constants::*;
use crate::guid::GUID;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Unknown,
    Hid,
    Printer,
    Usb,
    DiskDrive,
}

impl DeviceClass {
    pub const KNOWN: [DeviceClass; 4] = [
        DeviceClass::Hid,
        DeviceClass::Printer,
        DeviceClass::Usb,
        DeviceClass::DiskDrive,
    ];

    pub fn guid(&self) -> Option<GUID> {
        match self {
            DeviceClass::Unknown => None,
            DeviceClass::Hid => Some(GUID_DEVCLASS_HIDCLASS),
            DeviceClass::Printer => Some(GUID_DEVCLASS_PRINTER),
            DeviceClass::Usb => Some(GUID_DEVCLASS_USB),
            DeviceClass::DiskDrive => Some(GUID_DEVCLASS_DISKDRIVE),
        }
    }

    pub fn from_guid(guid: &GUID) -> DeviceClass {
        DeviceClass::KNOWN
            .into_iter()
            .find(|class| class.guid().as_ref() == Some(guid))
            .unwrap_or(DeviceClass::Unknown)
    }

    /// Interface class that announces devices of this class.
    pub fn interface_class(&self) -> Option<InterfaceClass> {
        match self {
            DeviceClass::Unknown => None,
            DeviceClass::Hid => Some(InterfaceClass::Hid),
            DeviceClass::Printer => Some(InterfaceClass::Printer),
            DeviceClass::Usb => Some(InterfaceClass::UsbDevice),
            DeviceClass::DiskDrive => Some(InterfaceClass::Disk),
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceClass::Unknown => "unknown",
            DeviceClass::Hid => "hid",
            DeviceClass::Printer => "printer",
            DeviceClass::Usb => "usb",
            DeviceClass::DiskDrive => "disk",
        };
        f.write_str(name)
    }
}

/// Device interface class, the unit notifications are filtered on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum InterfaceClass {
    Hid,
    Printer,
    UsbDevice,
    Disk,
}

impl InterfaceClass {
    pub const ALL: [InterfaceClass; 4] = [
        InterfaceClass::Hid,
        InterfaceClass::Printer,
        InterfaceClass::UsbDevice,
        InterfaceClass::Disk,
    ];

    pub fn guid(&self) -> GUID {
        match self {
            InterfaceClass::Hid => GUID_DEVINTERFACE_HID,
            InterfaceClass::Printer => GUID_DEVINTERFACE_USBPRINT,
            InterfaceClass::UsbDevice => GUID_DEVINTERFACE_USB_DEVICE,
            InterfaceClass::Disk => GUID_DEVINTERFACE_DISK,
        }
    }

    pub fn from_guid(guid: &GUID) -> Option<InterfaceClass> {
        InterfaceClass::ALL
            .into_iter()
            .find(|class| class.guid() == *guid)
    }
}

impl fmt::Display for InterfaceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterfaceClass::Hid => "hid",
            InterfaceClass::Printer => "printer",
            InterfaceClass::UsbDevice => "usb-device",
            InterfaceClass::Disk => "disk",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Bus {
    Unknown,
    Usb,
}

impl Bus {
    /// Maps a PnP enumerator name (`DEVPKEY_Device_EnumeratorName`).
    pub fn from_enumerator(name: &str) -> Bus {
        match name.to_ascii_uppercase().as_str() {
            "USB" | "USBSTOR" | "USBPRINT" => Bus::Usb,
            _ => Bus::Unknown,
        }
    }
}

impl fmt::Display for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bus::Unknown => f.write_str("unknown"),
            Bus::Usb => f.write_str("usb"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_class_guid_mapping() {
        for class in DeviceClass::KNOWN {
            assert_eq!(DeviceClass::from_guid(&class.guid().unwrap()), class);
        }
        assert_eq!(DeviceClass::from_guid(&GUID_DEVINTERFACE_HID), DeviceClass::Unknown);
        assert_eq!(DeviceClass::Unknown.guid(), None);
    }

    #[test]
    fn interface_class_guid_mapping() {
        for class in InterfaceClass::ALL {
            assert_eq!(InterfaceClass::from_guid(&class.guid()), Some(class));
        }
        assert_eq!(InterfaceClass::from_guid(&GUID_DEVCLASS_HIDCLASS), None);
    }

    #[test]
    fn bus_from_enumerator() {
        assert_eq!(Bus::from_enumerator("USB"), Bus::Usb);
        assert_eq!(Bus::from_enumerator("usbstor"), Bus::Usb);
        assert_eq!(Bus::from_enumerator("HID"), Bus::Unknown);
    }
}
