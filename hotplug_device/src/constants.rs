//! Every GUID used by the crate is defined here and nowhere else.

use crate::guid::GUID;
use crate::property::PropertyKey;

/* a45c254e-df1c-4efd-8020-67d146a850e0 */
pub const DEVPKEY_DEVICE_FMTID: GUID = GUID {
    data1: 0xa45c254e,
    data2: 0xdf1c,
    data3: 0x4efd,
    data4: [0x80, 0x20, 0x67, 0xd1, 0x46, 0xa8, 0x50, 0xe0],
};

/* 78c34fc8-104a-4aca-9ea4-524d52996e57 */
pub const DEVPKEY_DEVICE_INSTANCE_FMTID: GUID = GUID {
    data1: 0x78c34fc8,
    data2: 0x104a,
    data3: 0x4aca,
    data4: [0x9e, 0xa4, 0x52, 0x4d, 0x52, 0x99, 0x6e, 0x57],
};

/* 4340a6c5-93fa-4706-972c-7b648008a5a7 */
pub const DEVPKEY_DEVICE_RELATIONS_FMTID: GUID = GUID {
    data1: 0x4340a6c5,
    data2: 0x93fa,
    data3: 0x4706,
    data4: [0x97, 0x2c, 0x7b, 0x64, 0x80, 0x08, 0xa5, 0xa7],
};

/* 8c7ed206-3f8a-4827-b3ab-ae9e1faefc6c */
pub const DEVPKEY_DEVICE_CONTAINER_FMTID: GUID = GUID {
    data1: 0x8c7ed206,
    data2: 0x3f8a,
    data3: 0x4827,
    data4: [0xb3, 0xab, 0xae, 0x9e, 0x1f, 0xae, 0xfc, 0x6c],
};

/* 026e516e-b814-414b-83cd-856d6fef4822 */
pub const DEVPKEY_DEVICE_INTERFACE_FMTID: GUID = GUID {
    data1: 0x026e516e,
    data2: 0xb814,
    data3: 0x414b,
    data4: [0x83, 0xcd, 0x85, 0x6d, 0x6f, 0xef, 0x48, 0x22],
};

/* b725f130-47ef-101a-a5f1-02608c9eebac */
pub const DEVPKEY_NAME_FMTID: GUID = GUID {
    data1: 0xb725f130,
    data2: 0x47ef,
    data3: 0x101a,
    data4: [0xa5, 0xf1, 0x02, 0x60, 0x8c, 0x9e, 0xeb, 0xac],
};

pub const DEVPKEY_NAME: PropertyKey = PropertyKey::new(DEVPKEY_NAME_FMTID, 10);

pub const DEVPKEY_DEVICE_DEVICE_DESC: PropertyKey = PropertyKey::new(DEVPKEY_DEVICE_FMTID, 2);
pub const DEVPKEY_DEVICE_HARDWARE_IDS: PropertyKey = PropertyKey::new(DEVPKEY_DEVICE_FMTID, 3);
pub const DEVPKEY_DEVICE_COMPATIBLE_IDS: PropertyKey = PropertyKey::new(DEVPKEY_DEVICE_FMTID, 4);
pub const DEVPKEY_DEVICE_SERVICE: PropertyKey = PropertyKey::new(DEVPKEY_DEVICE_FMTID, 6);
pub const DEVPKEY_DEVICE_CLASS: PropertyKey = PropertyKey::new(DEVPKEY_DEVICE_FMTID, 9);
pub const DEVPKEY_DEVICE_CLASS_GUID: PropertyKey = PropertyKey::new(DEVPKEY_DEVICE_FMTID, 10);
pub const DEVPKEY_DEVICE_DRIVER: PropertyKey = PropertyKey::new(DEVPKEY_DEVICE_FMTID, 11);
pub const DEVPKEY_DEVICE_MANUFACTURER: PropertyKey = PropertyKey::new(DEVPKEY_DEVICE_FMTID, 13);
pub const DEVPKEY_DEVICE_FRIENDLY_NAME: PropertyKey = PropertyKey::new(DEVPKEY_DEVICE_FMTID, 14);
pub const DEVPKEY_DEVICE_LOCATION_INFO: PropertyKey = PropertyKey::new(DEVPKEY_DEVICE_FMTID, 15);
pub const DEVPKEY_DEVICE_PDO_NAME: PropertyKey = PropertyKey::new(DEVPKEY_DEVICE_FMTID, 16);
pub const DEVPKEY_DEVICE_BUS_NUMBER: PropertyKey = PropertyKey::new(DEVPKEY_DEVICE_FMTID, 23);
pub const DEVPKEY_DEVICE_ENUMERATOR_NAME: PropertyKey = PropertyKey::new(DEVPKEY_DEVICE_FMTID, 24);
pub const DEVPKEY_DEVICE_ADDRESS: PropertyKey = PropertyKey::new(DEVPKEY_DEVICE_FMTID, 30);

pub const DEVPKEY_DEVICE_INSTANCE_ID: PropertyKey =
    PropertyKey::new(DEVPKEY_DEVICE_INSTANCE_FMTID, 256);

pub const DEVPKEY_DEVICE_PARENT: PropertyKey = PropertyKey::new(DEVPKEY_DEVICE_RELATIONS_FMTID, 8);
pub const DEVPKEY_DEVICE_CHILDREN: PropertyKey =
    PropertyKey::new(DEVPKEY_DEVICE_RELATIONS_FMTID, 9);

pub const DEVPKEY_DEVICE_CONTAINER_ID: PropertyKey =
    PropertyKey::new(DEVPKEY_DEVICE_CONTAINER_FMTID, 2);

pub const DEVPKEY_DEVICE_INTERFACE_FRIENDLY_NAME: PropertyKey =
    PropertyKey::new(DEVPKEY_DEVICE_INTERFACE_FMTID, 2);
pub const DEVPKEY_DEVICE_INTERFACE_ENABLED: PropertyKey =
    PropertyKey::new(DEVPKEY_DEVICE_INTERFACE_FMTID, 3);
pub const DEVPKEY_DEVICE_INTERFACE_CLASS_GUID: PropertyKey =
    PropertyKey::new(DEVPKEY_DEVICE_INTERFACE_FMTID, 4);

/// Well-known property keys and their `devpkey.h` names.
pub const PROPERTY_KEYS: &[(&str, PropertyKey)] = &[
    ("DEVPKEY_NAME", DEVPKEY_NAME),
    ("DEVPKEY_Device_DeviceDesc", DEVPKEY_DEVICE_DEVICE_DESC),
    ("DEVPKEY_Device_HardwareIds", DEVPKEY_DEVICE_HARDWARE_IDS),
    ("DEVPKEY_Device_CompatibleIds", DEVPKEY_DEVICE_COMPATIBLE_IDS),
    ("DEVPKEY_Device_Service", DEVPKEY_DEVICE_SERVICE),
    ("DEVPKEY_Device_Class", DEVPKEY_DEVICE_CLASS),
    ("DEVPKEY_Device_ClassGuid", DEVPKEY_DEVICE_CLASS_GUID),
    ("DEVPKEY_Device_Driver", DEVPKEY_DEVICE_DRIVER),
    ("DEVPKEY_Device_Manufacturer", DEVPKEY_DEVICE_MANUFACTURER),
    ("DEVPKEY_Device_FriendlyName", DEVPKEY_DEVICE_FRIENDLY_NAME),
    ("DEVPKEY_Device_LocationInfo", DEVPKEY_DEVICE_LOCATION_INFO),
    ("DEVPKEY_Device_PDOName", DEVPKEY_DEVICE_PDO_NAME),
    ("DEVPKEY_Device_BusNumber", DEVPKEY_DEVICE_BUS_NUMBER),
    ("DEVPKEY_Device_EnumeratorName", DEVPKEY_DEVICE_ENUMERATOR_NAME),
    ("DEVPKEY_Device_Address", DEVPKEY_DEVICE_ADDRESS),
    ("DEVPKEY_Device_InstanceId", DEVPKEY_DEVICE_INSTANCE_ID),
    ("DEVPKEY_Device_Parent", DEVPKEY_DEVICE_PARENT),
    ("DEVPKEY_Device_Children", DEVPKEY_DEVICE_CHILDREN),
    ("DEVPKEY_Device_ContainerId", DEVPKEY_DEVICE_CONTAINER_ID),
    ("DEVPKEY_DeviceInterface_FriendlyName", DEVPKEY_DEVICE_INTERFACE_FRIENDLY_NAME),
    ("DEVPKEY_DeviceInterface_Enabled", DEVPKEY_DEVICE_INTERFACE_ENABLED),
    ("DEVPKEY_DeviceInterface_ClassGuid", DEVPKEY_DEVICE_INTERFACE_CLASS_GUID),
];

pub fn property_key_name(key: &PropertyKey) -> Option<&'static str> {
    PROPERTY_KEYS
        .iter()
        .find(|(_, candidate)| candidate == key)
        .map(|(name, _)| *name)
}

/// Case insensitive lookup; the `DEVPKEY_` prefix may be omitted.
pub fn property_key_from_name(name: &str) -> Option<PropertyKey> {
    let name = name.trim();
    PROPERTY_KEYS
        .iter()
        .find(|(candidate, _)| {
            candidate.eq_ignore_ascii_case(name)
                || candidate
                    .strip_prefix("DEVPKEY_")
                    .is_some_and(|short| short.eq_ignore_ascii_case(name))
        })
        .map(|(_, key)| *key)
}

/* 4d1e55b2-f16f-11cf-88cb-001111000030 */
pub const GUID_DEVINTERFACE_HID: GUID = GUID {
    data1: 0x4d1e55b2,
    data2: 0xf16f,
    data3: 0x11cf,
    data4: [0x88, 0xcb, 0x00, 0x11, 0x11, 0x00, 0x00, 0x30],
};

/* 28d78fad-5a12-11d1-ae5b-0000f803a8c2 */
pub const GUID_DEVINTERFACE_USBPRINT: GUID = GUID {
    data1: 0x28d78fad,
    data2: 0x5a12,
    data3: 0x11d1,
    data4: [0xae, 0x5b, 0x00, 0x00, 0xf8, 0x03, 0xa8, 0xc2],
};

/* a5dcbf10-6530-11d2-901f-00c04fb951ed */
pub const GUID_DEVINTERFACE_USB_DEVICE: GUID = GUID {
    data1: 0xa5dcbf10,
    data2: 0x6530,
    data3: 0x11d2,
    data4: [0x90, 0x1f, 0x00, 0xc0, 0x4f, 0xb9, 0x51, 0xed],
};

/* 53f56307-b6bf-11d0-94f2-00a0c91efb8b */
pub const GUID_DEVINTERFACE_DISK: GUID = GUID {
    data1: 0x53f56307,
    data2: 0xb6bf,
    data3: 0x11d0,
    data4: [0x94, 0xf2, 0x00, 0xa0, 0xc9, 0x1e, 0xfb, 0x8b],
};

/* 745a17a0-74d3-11d0-b6fe-00a0c90f57da */
pub const GUID_DEVCLASS_HIDCLASS: GUID = GUID {
    data1: 0x745a17a0,
    data2: 0x74d3,
    data3: 0x11d0,
    data4: [0xb6, 0xfe, 0x00, 0xa0, 0xc9, 0x0f, 0x57, 0xda],
};

/* 4d36e979-e325-11ce-bfc1-08002be10318 */
pub const GUID_DEVCLASS_PRINTER: GUID = GUID {
    data1: 0x4d36e979,
    data2: 0xe325,
    data3: 0x11ce,
    data4: [0xbf, 0xc1, 0x08, 0x00, 0x2b, 0xe1, 0x03, 0x18],
};

/* 36fc9e60-c465-11cf-8056-444553540000 */
pub const GUID_DEVCLASS_USB: GUID = GUID {
    data1: 0x36fc9e60,
    data2: 0xc465,
    data3: 0x11cf,
    data4: [0x80, 0x56, 0x44, 0x45, 0x53, 0x54, 0x00, 0x00],
};

/* 4d36e967-e325-11ce-bfc1-08002be10318 */
pub const GUID_DEVCLASS_DISKDRIVE: GUID = GUID {
    data1: 0x4d36e967,
    data2: 0xe325,
    data3: 0x11ce,
    data4: [0xbf, 0xc1, 0x08, 0x00, 0x2b, 0xe1, 0x03, 0x18],
};

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn property_keys_are_unique() {
        let names: HashSet<_> = PROPERTY_KEYS.iter().map(|(name, _)| *name).collect();
        let keys: HashSet<_> = PROPERTY_KEYS.iter().map(|(_, key)| *key).collect();

        assert_eq!(names.len(), PROPERTY_KEYS.len());
        assert_eq!(keys.len(), PROPERTY_KEYS.len());
    }

    #[test]
    fn class_guids_are_unique() {
        let guids = [
            GUID_DEVINTERFACE_HID,
            GUID_DEVINTERFACE_USBPRINT,
            GUID_DEVINTERFACE_USB_DEVICE,
            GUID_DEVINTERFACE_DISK,
            GUID_DEVCLASS_HIDCLASS,
            GUID_DEVCLASS_PRINTER,
            GUID_DEVCLASS_USB,
            GUID_DEVCLASS_DISKDRIVE,
        ];
        let unique: HashSet<_> = guids.iter().collect();

        assert_eq!(unique.len(), guids.len());
    }

    #[test]
    fn well_known_values() {
        assert_eq!(
            GUID_DEVINTERFACE_HID.to_string(),
            "{4d1e55b2-f16f-11cf-88cb-001111000030}"
        );
        assert_eq!(
            DEVPKEY_DEVICE_INSTANCE_ID.fmtid.to_string(),
            "{78c34fc8-104a-4aca-9ea4-524d52996e57}"
        );
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(
            property_key_from_name("devpkey_device_busnumber"),
            Some(DEVPKEY_DEVICE_BUS_NUMBER)
        );
        assert_eq!(
            property_key_from_name("DeviceInterface_Enabled"),
            Some(DEVPKEY_DEVICE_INTERFACE_ENABLED)
        );
        assert_eq!(property_key_name(&DEVPKEY_DEVICE_ADDRESS), Some("DEVPKEY_Device_Address"));
        assert_eq!(property_key_from_name("Device_Bogus"), None);
    }
}
