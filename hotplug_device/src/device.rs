use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, OnceLock};

use log::debug;
use regex::Regex;

use crate::class::{Bus, DeviceClass, InterfaceClass};
use crate::constants::*;
use crate::error::{Error, Result};
use crate::guid::{self, GUID};
use crate::platform::{
    ConfigManager, DevInst, query_devnode_property, query_interface_property,
};
use crate::property::{PropertyBuffer, PropertyKey};

/* ENUMERATOR\PARAMS[\...] */
static HARDWARE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\\]+\\([^\\]+)").unwrap());
/* KEY_VALUE */
static PARAM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([A-Za-z]+)_(.+)$").unwrap());

/* cycles in a broken tree */
const MAX_TREE_DEPTH: usize = 64;

/// Collects `KEY_VALUE` parameters (`VID_05E0&PID_1900`) from hardware ids.
/// The first id that defines a key wins.
pub fn parse_hardware_ids<S: AsRef<str>>(ids: &[S]) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for id in ids {
        let Some(captures) = HARDWARE_ID_RE.captures(id.as_ref()) else {
            continue;
        };

        for param in captures[1].split('&') {
            if let Some(param) = PARAM_RE.captures(param) {
                params
                    .entry(param[1].to_ascii_uppercase())
                    .or_insert_with(|| param[2].to_string());
            }
        }
    }
    params
}

pub struct Device {
    pub path: String,
    pub class: DeviceClass,
    class_guid: GUID,
    devinst: DevInst,
    manager: Arc<dyn ConfigManager>,
    hardware_ids: OnceLock<HashMap<String, String>>,
    compatible_ids: OnceLock<HashMap<String, String>>,
}

impl Device {
    pub fn from_devinst(manager: Arc<dyn ConfigManager>, devinst: DevInst) -> Result<Device> {
        let path = query_devnode_property(manager.as_ref(), devinst, &DEVPKEY_DEVICE_INSTANCE_ID)?
            .as_string()?;

        let class_guid =
            match query_devnode_property(manager.as_ref(), devinst, &DEVPKEY_DEVICE_CLASS_GUID) {
                Ok(buffer) => buffer.as_guid()?,
                Err(Error::PropertyNotFound) => guid::NULL,
                Err(err) => return Err(err),
            };

        Ok(Device {
            path,
            class: DeviceClass::from_guid(&class_guid),
            class_guid,
            devinst,
            manager,
            hardware_ids: OnceLock::new(),
            compatible_ids: OnceLock::new(),
        })
    }

    pub fn from_instance_id(manager: Arc<dyn ConfigManager>, instance_id: &str) -> Result<Device> {
        let devinst = manager.locate_devnode(instance_id)?;
        Device::from_devinst(manager, devinst)
    }

    pub fn class_guid(&self) -> GUID {
        self.class_guid
    }

    pub fn devinst(&self) -> DevInst {
        self.devinst
    }

    pub fn property(&self, key: &PropertyKey) -> Result<PropertyBuffer> {
        query_devnode_property(self.manager.as_ref(), self.devinst, key)
    }

    pub fn property_keys(&self) -> Result<Vec<PropertyKey>> {
        self.manager.get_devnode_property_keys(self.devinst)
    }

    pub fn parent(&self) -> Result<Device> {
        let parent = self.manager.get_parent(self.devinst)?;
        Device::from_devinst(self.manager.clone(), parent)
    }

    pub fn up(&self, class: DeviceClass) -> Result<Device> {
        let target = class
            .guid()
            .ok_or_else(|| Error::UnsupportedClass(class.to_string()))?;

        let mut devinst = self.devinst;
        for _ in 0..MAX_TREE_DEPTH {
            devinst = self.manager.get_parent(devinst)?;

            let class_guid =
                match query_devnode_property(self.manager.as_ref(), devinst, &DEVPKEY_DEVICE_CLASS_GUID) {
                    Ok(buffer) => buffer.as_guid()?,
                    Err(Error::PropertyNotFound) => continue,
                    Err(err) => return Err(err),
                };

            if class_guid == target {
                return Device::from_devinst(self.manager.clone(), devinst);
            }
        }

        Err(Error::InvalidData(format!(
            "no {class} ancestor within {MAX_TREE_DEPTH} levels of {}",
            self.path
        )))
    }

    /// Bus of the first node, walking towards the root, whose enumerator
    /// is a known bus.
    pub fn bus(&self) -> Result<Bus> {
        let mut devinst = self.devinst;
        for _ in 0..MAX_TREE_DEPTH {
            match query_devnode_property(self.manager.as_ref(), devinst, &DEVPKEY_DEVICE_ENUMERATOR_NAME) {
                Ok(buffer) => {
                    let bus = Bus::from_enumerator(&buffer.as_string()?);
                    if bus != Bus::Unknown {
                        return Ok(bus);
                    }
                }
                Err(Error::PropertyNotFound) => (),
                Err(err) => return Err(err),
            }

            devinst = match self.manager.get_parent(devinst) {
                Ok(parent) => parent,
                Err(_) => break,
            };
        }
        Ok(Bus::Unknown)
    }

    /// Bus specific number distinguishing busses of the same type.
    pub fn bus_number(&self) -> Result<u32> {
        self.property(&DEVPKEY_DEVICE_BUS_NUMBER)?.as_u32()
    }

    /// Address on the parent bus; meaning depends on the bus.
    pub fn address(&self) -> Result<u32> {
        self.property(&DEVPKEY_DEVICE_ADDRESS)?.as_u32()
    }

    fn cached_ids<'a>(
        &self,
        cache: &'a OnceLock<HashMap<String, String>>,
        key: &PropertyKey,
    ) -> Result<&'a HashMap<String, String>> {
        if let Some(ids) = cache.get() {
            return Ok(ids);
        }

        let ids = self.property(key)?.as_string_list()?;
        let params = parse_hardware_ids(ids.as_slice());
        Ok(cache.get_or_init(|| params))
    }

    pub fn hardware_ids(&self) -> Result<&HashMap<String, String>> {
        self.cached_ids(&self.hardware_ids, &DEVPKEY_DEVICE_HARDWARE_IDS)
    }

    /// Parameters of the CompatibleIds, such as `CLASS` and `SUBCLASS`.
    pub fn compatible_ids(&self) -> Result<&HashMap<String, String>> {
        self.cached_ids(&self.compatible_ids, &DEVPKEY_DEVICE_COMPATIBLE_IDS)
    }

    pub fn hardware_id(&self, key: &str) -> Result<&str> {
        self.hardware_ids()?
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| Error::InvalidData(format!("HardwareIds has no {key} parameter")))
    }

    fn hardware_id_hex(&self, key: &str) -> Result<u16> {
        let value = self.hardware_id(key)?;
        u16::from_str_radix(value, 16)
            .map_err(|_| Error::InvalidData(format!("{key} is not hexadecimal: {value}")))
    }

    pub fn vendor_id(&self) -> Result<u16> {
        self.hardware_id_hex("VID")
    }

    pub fn product_id(&self) -> Result<u16> {
        self.hardware_id_hex("PID")
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("path", &self.path)
            .field("class", &self.class)
            .field("class_guid", &self.class_guid)
            .field("devinst", &self.devinst)
            .finish()
    }
}

#[derive(Debug)]
pub struct DeviceInterface {
    pub path: String,
    pub class: Option<InterfaceClass>,
    pub class_guid: GUID,
    pub device: Device,
}

impl DeviceInterface {
    /// Resolves the device node exposing the interface `path`.
    pub fn resolve(
        manager: Arc<dyn ConfigManager>,
        class_guid: GUID,
        path: String,
    ) -> Result<DeviceInterface> {
        let instance_id =
            query_interface_property(manager.as_ref(), &path, &DEVPKEY_DEVICE_INSTANCE_ID)?
                .as_string()?;
        debug!("Interface {} belongs to {}", path, instance_id);

        let device = Device::from_instance_id(manager, &instance_id)?;

        Ok(DeviceInterface {
            path,
            class: InterfaceClass::from_guid(&class_guid),
            class_guid,
            device,
        })
    }

    pub fn property(&self, key: &PropertyKey) -> Result<PropertyBuffer> {
        query_interface_property(self.device.manager.as_ref(), &self.path, key)
    }

    pub fn property_keys(&self) -> Result<Vec<PropertyKey>> {
        self.device
            .manager
            .get_device_interface_property_keys(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertyValue;
    use crate::simulated::SimulatedConfigManager;

    const HID_PATH: &str =
        "\\\\?\\HID#VID_05E0&PID_1900&MI_00#9&f8684bc&0&0000";

    fn tree() -> (Arc<SimulatedConfigManager>, DevInst, DevInst) {
        let simulated = Arc::new(SimulatedConfigManager::new());
        let hub = simulated.add_devnode("USB\\ROOT_HUB30\\4&1", Some(GUID_DEVCLASS_USB), None);
        let composite = simulated.add_devnode(
            "USB\\VID_05E0&PID_1900&MI_00\\8&2",
            Some(GUID_DEVCLASS_USB),
            Some(hub),
        );
        simulated.set_devnode_property(composite, DEVPKEY_DEVICE_BUS_NUMBER, PropertyValue::UInt32(1));
        simulated.set_devnode_property(composite, DEVPKEY_DEVICE_ADDRESS, PropertyValue::UInt32(4));

        let hid = simulated.add_devnode(
            "HID\\VID_05E0&PID_1900&MI_00\\9&F8684BC&0&0000",
            Some(GUID_DEVCLASS_HIDCLASS),
            Some(composite),
        );
        simulated.set_devnode_property(
            hid,
            DEVPKEY_DEVICE_HARDWARE_IDS,
            PropertyValue::StringList(vec![
                "HID\\VID_05E0&PID_1900&REV_0100&MI_00".into(),
                "HID\\VID_05E0&PID_1900&MI_00".into(),
                "HID_DEVICE".into(),
            ]),
        );
        simulated.set_devnode_property(
            composite,
            DEVPKEY_DEVICE_COMPATIBLE_IDS,
            PropertyValue::StringList(vec![
                "USB\\Class_03&SubClass_01&Prot_02".into(),
                "USB\\Class_03&SubClass_01".into(),
                "USB\\Class_03".into(),
            ]),
        );
        simulated.add_interface(HID_PATH, GUID_DEVINTERFACE_HID, hid);

        (simulated, composite, hid)
    }

    #[test]
    fn parse_ids() {
        let params = parse_hardware_ids(&[
            "USB\\VID_05E0&PID_1900&REV_0100",
            "USB\\VID_FFFF&PID_0000",
            "USB\\Class_03&SubClass_01",
            "HID_DEVICE",
        ]);

        assert_eq!(params.get("VID").map(String::as_str), Some("05E0"));
        assert_eq!(params.get("PID").map(String::as_str), Some("1900"));
        assert_eq!(params.get("REV").map(String::as_str), Some("0100"));
        assert_eq!(params.get("CLASS").map(String::as_str), Some("03"));
        assert_eq!(params.get("SUBCLASS").map(String::as_str), Some("01"));
        assert_eq!(params.len(), 5);
    }

    #[test]
    fn resolve_interface() {
        let (simulated, _, hid) = tree();

        let interface =
            DeviceInterface::resolve(simulated.clone(), GUID_DEVINTERFACE_HID, HID_PATH.into())
                .unwrap();

        assert_eq!(interface.class, Some(InterfaceClass::Hid));
        assert_eq!(interface.device.devinst(), hid);
        assert_eq!(interface.device.class, DeviceClass::Hid);
        assert_eq!(
            interface.device.path,
            "HID\\VID_05E0&PID_1900&MI_00\\9&F8684BC&0&0000"
        );
        assert_eq!(interface.device.vendor_id().unwrap(), 0x05E0);
        assert_eq!(interface.device.product_id().unwrap(), 0x1900);
        assert!(
            interface
                .property_keys()
                .unwrap()
                .contains(&DEVPKEY_DEVICE_INSTANCE_ID)
        );
    }

    #[test]
    fn walk_up_to_usb_device() {
        let (simulated, composite, hid) = tree();
        let device = Device::from_devinst(simulated.clone(), hid).unwrap();

        let usb = device.up(DeviceClass::Usb).unwrap();
        assert_eq!(usb.devinst(), composite);
        assert_eq!(usb.bus_number().unwrap(), 1);
        assert_eq!(usb.address().unwrap(), 4);

        assert_eq!(device.parent().unwrap().devinst(), composite);
        assert_eq!(device.bus().unwrap(), Bus::Usb);
        assert!(device.bus_number().is_err());

        assert!(matches!(
            device.up(DeviceClass::Unknown),
            Err(Error::UnsupportedClass(_))
        ));
        assert!(matches!(
            device.up(DeviceClass::Printer),
            Err(Error::Platform { .. })
        ));
    }

    #[test]
    fn device_without_hardware_ids() {
        let (simulated, composite, _) = tree();
        let device = Device::from_devinst(simulated, composite).unwrap();

        assert!(matches!(device.vendor_id(), Err(Error::PropertyNotFound)));
    }

    #[test]
    fn compatible_ids_are_parsed_and_cached() {
        let (simulated, composite, hid) = tree();
        let device = Device::from_devinst(simulated.clone(), composite).unwrap();

        let ids = device.compatible_ids().unwrap();
        assert_eq!(ids.get("CLASS").map(String::as_str), Some("03"));
        assert_eq!(ids.get("SUBCLASS").map(String::as_str), Some("01"));
        assert_eq!(ids.get("PROT").map(String::as_str), Some("02"));

        simulated.set_devnode_property(
            composite,
            DEVPKEY_DEVICE_COMPATIBLE_IDS,
            PropertyValue::StringList(vec!["USB\\Class_08".into()]),
        );
        assert_eq!(
            device.compatible_ids().unwrap().get("CLASS").map(String::as_str),
            Some("03")
        );

        let hid = Device::from_devinst(simulated, hid).unwrap();
        assert!(matches!(hid.compatible_ids(), Err(Error::PropertyNotFound)));
    }

    #[test]
    fn devnode_property_keys() {
        let (simulated, composite, _) = tree();
        let device = Device::from_devinst(simulated, composite).unwrap();

        let keys = device.property_keys().unwrap();
        assert!(keys.contains(&DEVPKEY_DEVICE_BUS_NUMBER));
        assert!(keys.contains(&DEVPKEY_DEVICE_COMPATIBLE_IDS));
        assert!(!keys.contains(&DEVPKEY_DEVICE_HARDWARE_IDS));
    }
}
