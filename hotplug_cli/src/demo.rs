//! Device tree served by the simulated backend.

use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use hotplug_device::constants::*;
use hotplug_device::guid::{GUID, braced};
use hotplug_device::{PropertyValue, Result, SimulatedConfigManager};
use log::info;

fn interface_path(device: &str, class_guid: &GUID) -> String {
    format!("\\\\?\\{device}#{}", braced(class_guid))
}

pub struct DemoTree {
    pub manager: Arc<SimulatedConfigManager>,
    pub mouse: String,
    pub printer: String,
    pub disk: String,
}

fn hardware_ids(ids: &[&str]) -> PropertyValue {
    PropertyValue::StringList(ids.iter().map(|id| id.to_string()).collect())
}

pub fn seed() -> DemoTree {
    let manager = Arc::new(SimulatedConfigManager::new());

    let root_hub = manager.add_devnode("USB\\ROOT_HUB30\\4&1", Some(GUID_DEVCLASS_USB), None);

    let receiver = manager.add_devnode(
        "USB\\VID_046D&PID_C52B\\5&2",
        Some(GUID_DEVCLASS_USB),
        Some(root_hub),
    );
    manager.set_devnode_property(receiver, DEVPKEY_DEVICE_BUS_NUMBER, PropertyValue::UInt32(1));
    manager.set_devnode_property(receiver, DEVPKEY_DEVICE_ADDRESS, PropertyValue::UInt32(3));
    let mouse_node = manager.add_devnode(
        "HID\\VID_046D&PID_C52B&MI_00\\7&1",
        Some(GUID_DEVCLASS_HIDCLASS),
        Some(receiver),
    );
    manager.set_devnode_property(
        mouse_node,
        DEVPKEY_DEVICE_HARDWARE_IDS,
        hardware_ids(&[
            "HID\\VID_046D&PID_C52B&REV_1211&MI_00",
            "HID\\VID_046D&PID_C52B&MI_00",
        ]),
    );
    manager.set_devnode_property(
        mouse_node,
        DEVPKEY_DEVICE_FRIENDLY_NAME,
        PropertyValue::String("HID-compliant mouse".into()),
    );
    let mouse = interface_path("HID#VID_046D&PID_C52B&MI_00#7&1", &GUID_DEVINTERFACE_HID);
    manager.add_interface(&mouse, GUID_DEVINTERFACE_HID, mouse_node);

    let printer_node = manager.add_devnode(
        "USB\\VID_04B8&PID_0005\\X4Y9",
        Some(GUID_DEVCLASS_PRINTER),
        Some(root_hub),
    );
    manager.set_devnode_property(
        printer_node,
        DEVPKEY_DEVICE_HARDWARE_IDS,
        hardware_ids(&["USB\\VID_04B8&PID_0005&REV_0100", "USB\\VID_04B8&PID_0005"]),
    );
    manager.set_devnode_property(printer_node, DEVPKEY_DEVICE_BUS_NUMBER, PropertyValue::UInt32(1));
    manager.set_devnode_property(printer_node, DEVPKEY_DEVICE_ADDRESS, PropertyValue::UInt32(5));
    let printer = interface_path("USB#VID_04B8&PID_0005#X4Y9", &GUID_DEVINTERFACE_USBPRINT);
    manager.add_interface(&printer, GUID_DEVINTERFACE_USBPRINT, printer_node);

    let stick = manager.add_devnode(
        "USB\\VID_0781&PID_5581\\4C530001",
        Some(GUID_DEVCLASS_USB),
        Some(root_hub),
    );
    let disk_node = manager.add_devnode(
        "USBSTOR\\DISK&VEN_SANDISK&PROD_ULTRA\\4C530001&0",
        Some(GUID_DEVCLASS_DISKDRIVE),
        Some(stick),
    );
    manager.set_devnode_property(
        disk_node,
        DEVPKEY_DEVICE_FRIENDLY_NAME,
        PropertyValue::String("SanDisk Ultra USB Device".into()),
    );
    let disk = interface_path(
        "USBSTOR#Disk&Ven_SanDisk&Prod_Ultra#4C530001&0",
        &GUID_DEVINTERFACE_DISK,
    );
    manager.add_interface(&disk, GUID_DEVINTERFACE_DISK, disk_node);
    manager.set_interface_property(
        &disk,
        DEVPKEY_DEVICE_INTERFACE_FRIENDLY_NAME,
        PropertyValue::String("SanDisk Ultra".into()),
    );

    DemoTree {
        manager,
        mouse,
        printer,
        disk,
    }
}

/// Unplugs and replugs the demo devices.
pub fn play(tree: &DemoTree, pause: Duration) -> Result<()> {
    for path in [&tree.disk, &tree.printer, &tree.mouse] {
        info!("Unplugging {}", path);
        tree.manager.remove(path)?;
        sleep(pause);
    }

    for path in [&tree.mouse, &tree.printer, &tree.disk] {
        info!("Plugging {}", path);
        tree.manager.arrive(path)?;
        sleep(pause);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use hotplug_device::{Bus, DeviceInterface, ListenerConfig, enumerate};

    #[test]
    fn seeded_devices_resolve() {
        let tree = seed();
        let found = Arc::new(Mutex::new(Vec::new()));
        let sink = found.clone();
        let config = ListenerConfig {
            arrive_callback: Some(Box::new(move |interface: DeviceInterface| {
                let device = &interface.device;
                sink.lock().unwrap().push((
                    interface.path.clone(),
                    device.class,
                    device.bus().unwrap(),
                ));
            })),
            ..Default::default()
        };

        enumerate(tree.manager.clone(), &config).unwrap();

        let found = found.lock().unwrap();
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|(_, _, bus)| *bus == Bus::Usb));
        assert!(found.iter().any(|(path, _, _)| *path == tree.disk));
    }

    #[test]
    fn mouse_ids() {
        let tree = seed();
        let interface = DeviceInterface::resolve(
            tree.manager.clone(),
            GUID_DEVINTERFACE_HID,
            tree.mouse.clone(),
        )
        .unwrap();

        assert_eq!(interface.device.vendor_id().unwrap(), 0x046d);
        assert_eq!(interface.device.product_id().unwrap(), 0xc52b);
        let receiver = interface.device.parent().unwrap();
        assert_eq!(receiver.bus_number().unwrap(), 1);
        assert_eq!(receiver.address().unwrap(), 3);
    }
}
