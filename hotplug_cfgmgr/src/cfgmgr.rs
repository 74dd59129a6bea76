use std::collections::HashMap;
use std::ffi::c_void;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr::addr_of;
use std::sync::{Arc, Mutex, MutexGuard};

use hotplug_device::error::{ConfigRet, Error, Result};
use hotplug_device::guid::GUID;
use hotplug_device::platform::{
    ConfigManager, DevInst, NotifyEvent, NotifyFilter, NotifySink, RegistrationToken,
};
use hotplug_device::property::{PropertyKey, PropertyType};
use hotplug_device::strings::split_multi_sz;
use log::{debug, error, info, warn};
use widestring::{U16CStr, U16CString};

use crate::bindings::*;

fn check(ret: CONFIGRET) -> Result<()> {
    ConfigRet(ret.0).ok()
}

fn to_devpropkey(key: &PropertyKey) -> DEVPROPKEY {
    DEVPROPKEY {
        fmtid: key.fmtid,
        pid: key.pid,
    }
}

fn from_devpropkey(key: &DEVPROPKEY) -> PropertyKey {
    PropertyKey::new(key.fmtid, key.pid)
}

/// Runs a `*_Property_Keys` call until the key array is large enough.
fn read_property_keys(
    mut call: impl FnMut(Option<*mut DEVPROPKEY>, &mut u32) -> CONFIGRET,
) -> Result<Vec<PropertyKey>> {
    let mut keys: Vec<DEVPROPKEY> = Vec::new();

    loop {
        let mut count = keys.len() as u32;
        let data = (!keys.is_empty()).then_some(keys.as_mut_ptr());
        let ret = call(data, &mut count);

        if ret == CR_BUFFER_SMALL && count as usize > keys.len() {
            keys.resize(count as usize, DEVPROPKEY::default());
            continue;
        }
        check(ret)?;

        keys.truncate(count as usize);
        return Ok(keys.iter().map(from_devpropkey).collect());
    }
}

fn to_wide(value: &str) -> Result<U16CString> {
    U16CString::from_str(value)
        .map_err(|_| Error::InvalidData(format!("string contains nul: {value:?}")))
}

/// Reads a NUL-terminated string stored inline at the end of an event record.
unsafe fn inline_string(first: *const u16) -> String {
    unsafe { U16CStr::from_ptr_str(first) }.to_string_lossy()
}

unsafe fn translate_event(
    action: CM_NOTIFY_ACTION,
    data: &CM_NOTIFY_EVENT_DATA,
) -> Option<NotifyEvent> {
    let event = match action {
        CM_NOTIFY_ACTION_DEVICEINTERFACEARRIVAL | CM_NOTIFY_ACTION_DEVICEINTERFACEREMOVAL => {
            let interface = unsafe { &data.u.DeviceInterface };
            let class_guid = interface.ClassGuid;
            let interface =
                unsafe { inline_string(addr_of!(interface.SymbolicLink) as *const u16) };

            if action == CM_NOTIFY_ACTION_DEVICEINTERFACEARRIVAL {
                NotifyEvent::InterfaceArrival {
                    class_guid,
                    interface,
                }
            } else {
                NotifyEvent::InterfaceRemoval {
                    class_guid,
                    interface,
                }
            }
        }
        CM_NOTIFY_ACTION_DEVICEQUERYREMOVE => NotifyEvent::DeviceQueryRemove,
        CM_NOTIFY_ACTION_DEVICEQUERYREMOVEFAILED => NotifyEvent::DeviceQueryRemoveFailed,
        CM_NOTIFY_ACTION_DEVICEREMOVEPENDING => NotifyEvent::DeviceRemovePending,
        CM_NOTIFY_ACTION_DEVICEREMOVECOMPLETE => NotifyEvent::DeviceRemoveComplete,
        CM_NOTIFY_ACTION_DEVICECUSTOMEVENT => NotifyEvent::DeviceCustom {
            event_guid: unsafe { data.u.DeviceHandle.EventGuid },
        },
        CM_NOTIFY_ACTION_DEVICEINSTANCEENUMERATED
        | CM_NOTIFY_ACTION_DEVICEINSTANCESTARTED
        | CM_NOTIFY_ACTION_DEVICEINSTANCEREMOVED => {
            let instance = unsafe { &data.u.DeviceInstance };
            let instance_id =
                unsafe { inline_string(addr_of!(instance.InstanceId) as *const u16) };

            match action {
                CM_NOTIFY_ACTION_DEVICEINSTANCEENUMERATED => {
                    NotifyEvent::InstanceEnumerated { instance_id }
                }
                CM_NOTIFY_ACTION_DEVICEINSTANCESTARTED => {
                    NotifyEvent::InstanceStarted { instance_id }
                }
                _ => NotifyEvent::InstanceRemoved { instance_id },
            }
        }
        _ => return None,
    };
    Some(event)
}

/* context is the Arc<dyn NotifySink> boxed in CfgMgrConfigManager::registrations */
unsafe extern "system" fn notify_callback(
    _notify: HCMNOTIFICATION,
    context: *const c_void,
    action: CM_NOTIFY_ACTION,
    event_data: *const CM_NOTIFY_EVENT_DATA,
    _event_data_size: u32,
) -> u32 {
    if context.is_null() || event_data.is_null() {
        return ERROR_SUCCESS.0;
    }

    let sink = unsafe { &*(context as *const Arc<dyn NotifySink>) };
    let data = unsafe { &*event_data };

    let result = catch_unwind(AssertUnwindSafe(|| {
        match unsafe { translate_event(action, data) } {
            Some(event) => sink.notify(event),
            None => debug!("Ignoring notification action {}", action.0),
        }
    }));
    if result.is_err() {
        error!("Notification sink panicked");
    }

    ERROR_SUCCESS.0
}

/// [`ConfigManager`] over the Windows Configuration Manager (CfgMgr32).
#[derive(Default)]
pub struct CfgMgrConfigManager {
    registrations: Mutex<HashMap<usize, Box<Arc<dyn NotifySink>>>>,
}

impl CfgMgrConfigManager {
    pub fn new() -> CfgMgrConfigManager {
        info!("Using CfgMgr32 configuration manager");
        CfgMgrConfigManager::default()
    }

    fn registrations(&self) -> MutexGuard<'_, HashMap<usize, Box<Arc<dyn NotifySink>>>> {
        self.registrations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn build_filter(filter: &NotifyFilter) -> Result<CM_NOTIFY_FILTER> {
        let mut raw = CM_NOTIFY_FILTER {
            cbSize: size_of::<CM_NOTIFY_FILTER>() as u32,
            ..Default::default()
        };

        match filter {
            NotifyFilter::InterfaceClass(class_guid) => {
                raw.FilterType = CM_NOTIFY_FILTER_TYPE_DEVICEINTERFACE;
                unsafe { raw.u.DeviceInterface.ClassGuid = *class_guid };
            }
            NotifyFilter::AllInterfaceClasses => {
                raw.FilterType = CM_NOTIFY_FILTER_TYPE_DEVICEINTERFACE;
                raw.Flags = CM_NOTIFY_FILTER_FLAG_ALL_INTERFACE_CLASSES;
            }
            NotifyFilter::DeviceInstance(instance_id) => {
                let wide = to_wide(instance_id)?;
                let wide = wide.as_slice_with_nul();

                let mut buffer = [0u16; 200];
                if wide.len() > buffer.len() {
                    return Err(Error::InvalidData(format!(
                        "instance id too long: {instance_id}"
                    )));
                }
                buffer[..wide.len()].copy_from_slice(wide);

                raw.FilterType = CM_NOTIFY_FILTER_TYPE_DEVICEINSTANCE;
                unsafe { raw.u.DeviceInstance.InstanceId = buffer };
            }
        }
        Ok(raw)
    }
}

impl ConfigManager for CfgMgrConfigManager {
    fn register_notification(
        &self,
        filter: &NotifyFilter,
        sink: Arc<dyn NotifySink>,
    ) -> Result<RegistrationToken> {
        let raw = CfgMgrConfigManager::build_filter(filter)?;

        /* heap address stays put when the box moves into the map */
        let context = Box::new(sink);
        let context_ptr = &*context as *const Arc<dyn NotifySink> as *const c_void;

        let mut notify = HCMNOTIFICATION::default();
        check(unsafe {
            CM_Register_Notification(&raw, Some(context_ptr), Some(notify_callback), &mut notify)
        })?;

        let token = notify.0 as usize;
        self.registrations().insert(token, context);
        Ok(RegistrationToken(token))
    }

    fn unregister_notification(&self, token: RegistrationToken) -> Result<()> {
        if !self.registrations().contains_key(&token.0) {
            return Err(Error::platform(ConfigRet::INVALID_POINTER));
        }

        /* blocks until running callbacks return */
        check(unsafe { CM_Unregister_Notification(HCMNOTIFICATION(token.0 as _)) })?;

        if self.registrations().remove(&token.0).is_none() {
            warn!("Registration {:?} vanished during unregister", token);
        }
        Ok(())
    }

    fn get_device_interface_property(
        &self,
        interface: &str,
        key: &PropertyKey,
        buffer: &mut [u8],
    ) -> Result<(PropertyType, usize)> {
        let interface = to_wide(interface)?;
        let key = to_devpropkey(key);
        let mut property_type = DEVPROPTYPE::default();
        let mut size = buffer.len() as u32;
        let data = (!buffer.is_empty()).then_some(buffer.as_mut_ptr());

        let ret = unsafe {
            CM_Get_Device_Interface_PropertyW(
                PCWSTR(interface.as_ptr()),
                &key,
                &mut property_type,
                data,
                &mut size,
                0,
            )
        };
        if ret == CR_BUFFER_SMALL {
            return Err(Error::BufferTooSmall {
                required_size: size,
            });
        }
        check(ret)?;

        Ok((PropertyType(property_type.0), size as usize))
    }

    fn get_device_interface_property_keys(&self, interface: &str) -> Result<Vec<PropertyKey>> {
        let interface = to_wide(interface)?;
        read_property_keys(|data, count| unsafe {
            CM_Get_Device_Interface_Property_KeysW(PCWSTR(interface.as_ptr()), data, count, 0)
        })
    }

    fn get_device_interface_list(&self, class_guid: &GUID) -> Result<Vec<String>> {
        /* the list can grow between the two calls */
        loop {
            let mut len = 0u32;
            check(unsafe {
                CM_Get_Device_Interface_List_SizeW(
                    &mut len,
                    class_guid,
                    PCWSTR::null(),
                    CM_GET_DEVICE_INTERFACE_LIST_PRESENT,
                )
            })?;

            let mut list = vec![0u16; len as usize];
            let ret = unsafe {
                CM_Get_Device_Interface_ListW(
                    class_guid,
                    PCWSTR::null(),
                    &mut list,
                    CM_GET_DEVICE_INTERFACE_LIST_PRESENT,
                )
            };
            if ret == CR_BUFFER_SMALL {
                debug!("Interface list grew, retrying");
                continue;
            }
            check(ret)?;

            return Ok(split_multi_sz(&list));
        }
    }

    fn locate_devnode(&self, instance_id: &str) -> Result<DevInst> {
        let instance_id = to_wide(instance_id)?;
        let mut devinst = 0u32;
        check(unsafe {
            CM_Locate_DevNodeW(
                &mut devinst,
                PCWSTR(instance_id.as_ptr()),
                CM_LOCATE_DEVNODE_NORMAL,
            )
        })?;
        Ok(devinst)
    }

    fn get_devnode_property(
        &self,
        devinst: DevInst,
        key: &PropertyKey,
        buffer: &mut [u8],
    ) -> Result<(PropertyType, usize)> {
        let key = to_devpropkey(key);
        let mut property_type = DEVPROPTYPE::default();
        let mut size = buffer.len() as u32;
        let data = (!buffer.is_empty()).then_some(buffer.as_mut_ptr());

        let ret = unsafe {
            CM_Get_DevNode_PropertyW(devinst, &key, &mut property_type, data, &mut size, 0)
        };
        if ret == CR_BUFFER_SMALL {
            return Err(Error::BufferTooSmall {
                required_size: size,
            });
        }
        check(ret)?;

        Ok((PropertyType(property_type.0), size as usize))
    }

    fn get_devnode_property_keys(&self, devinst: DevInst) -> Result<Vec<PropertyKey>> {
        read_property_keys(|data, count| unsafe {
            CM_Get_DevNode_Property_Keys(devinst, data, count, 0)
        })
    }

    fn get_parent(&self, devinst: DevInst) -> Result<DevInst> {
        let mut parent = 0u32;
        check(unsafe { CM_Get_Parent(&mut parent, devinst, 0) })?;
        Ok(parent)
    }
}

impl Drop for CfgMgrConfigManager {
    fn drop(&mut self) {
        let tokens: Vec<usize> = self.registrations().keys().copied().collect();
        for token in tokens {
            warn!("Releasing leaked notification registration {:#x}", token);
            if let Err(err) = self.unregister_notification(RegistrationToken(token)) {
                warn!("Failed to unregister notification: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotplug_device::constants::*;

    #[test]
    fn property_key_conversion() {
        let key = to_devpropkey(&DEVPKEY_DEVICE_INSTANCE_ID);
        assert_eq!(key.pid, 256);
        assert_eq!(from_devpropkey(&key), DEVPKEY_DEVICE_INSTANCE_ID);
    }

    #[test]
    fn long_instance_id_rejected() {
        let filter = NotifyFilter::DeviceInstance("X".repeat(200));
        assert!(matches!(
            CfgMgrConfigManager::build_filter(&filter),
            Err(Error::InvalidData(_))
        ));
    }

    fn present_interface(manager: &CfgMgrConfigManager) -> Option<String> {
        [GUID_DEVINTERFACE_HID, GUID_DEVINTERFACE_DISK]
            .iter()
            .flat_map(|class_guid| manager.get_device_interface_list(class_guid).unwrap())
            .next()
    }

    #[test]
    fn missing_property_is_not_found() {
        let manager = CfgMgrConfigManager::new();
        let Some(interface) = present_interface(&manager) else {
            eprintln!("skipped: no HID or disk interface present");
            return;
        };
        let interface = interface.as_str();

        let missing = PropertyKey::new(DEVPKEY_DEVICE_FMTID, 0xfff0);
        let mut buffer = [0u8; 16];
        assert!(matches!(
            manager.get_device_interface_property(interface, &missing, &mut buffer),
            Err(Error::PropertyNotFound)
        ));
    }

    #[test]
    fn devnode_keys_include_instance_id() {
        let manager = CfgMgrConfigManager::new();
        let Some(interface) = present_interface(&manager) else {
            eprintln!("skipped: no HID or disk interface present");
            return;
        };

        let instance_id =
            hotplug_device::query_interface_property(&manager, &interface, &DEVPKEY_DEVICE_INSTANCE_ID)
                .unwrap()
                .as_string()
                .unwrap();
        let devinst = manager.locate_devnode(&instance_id).unwrap();
        let keys = manager.get_devnode_property_keys(devinst).unwrap();
        assert!(keys.contains(&DEVPKEY_DEVICE_INSTANCE_ID));
    }
}
