use std::sync::Arc;

use crate::error::Result;
use crate::guid::GUID;
use crate::property::{PropertyBuffer, PropertyKey, PropertyType, query_with};

/// Device instance handle (`DEVINST`).
pub type DevInst = u32;

/// Selects which events a registration receives (`CM_NOTIFY_FILTER`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyFilter {
    InterfaceClass(GUID),
    AllInterfaceClasses,
    DeviceInstance(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyEvent {
    InterfaceArrival { class_guid: GUID, interface: String },
    InterfaceRemoval { class_guid: GUID, interface: String },
    DeviceQueryRemove,
    DeviceQueryRemoveFailed,
    DeviceRemovePending,
    DeviceRemoveComplete,
    DeviceCustom { event_guid: GUID },
    InstanceEnumerated { instance_id: String },
    InstanceStarted { instance_id: String },
    InstanceRemoved { instance_id: String },
}

/// Receiver of events for one registration.
///
/// Called on a thread owned by the platform, possibly concurrently with any
/// other host thread. Implementations must return promptly.
pub trait NotifySink: Send + Sync {
    fn notify(&self, event: NotifyEvent);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationToken(pub usize);

/// Configuration Manager operations used by this crate.
///
/// Property reads write at most `buffer.len()` bytes. When the value does not
/// fit nothing is written and `Error::BufferTooSmall` reports the size needed.
pub trait ConfigManager: Send + Sync {
    fn register_notification(
        &self,
        filter: &NotifyFilter,
        sink: Arc<dyn NotifySink>,
    ) -> Result<RegistrationToken>;

    /// Returns once no further callbacks will be made for `token`.
    fn unregister_notification(&self, token: RegistrationToken) -> Result<()>;

    fn get_device_interface_property(
        &self,
        interface: &str,
        key: &PropertyKey,
        buffer: &mut [u8],
    ) -> Result<(PropertyType, usize)>;

    fn get_device_interface_property_keys(&self, interface: &str) -> Result<Vec<PropertyKey>>;

    /// Present interfaces of the given interface class.
    fn get_device_interface_list(&self, class_guid: &GUID) -> Result<Vec<String>>;

    fn locate_devnode(&self, instance_id: &str) -> Result<DevInst>;

    fn get_devnode_property(
        &self,
        devinst: DevInst,
        key: &PropertyKey,
        buffer: &mut [u8],
    ) -> Result<(PropertyType, usize)>;

    fn get_devnode_property_keys(&self, devinst: DevInst) -> Result<Vec<PropertyKey>>;

    fn get_parent(&self, devinst: DevInst) -> Result<DevInst>;
}

pub fn query_interface_property(
    manager: &dyn ConfigManager,
    interface: &str,
    key: &PropertyKey,
) -> Result<PropertyBuffer> {
    query_with(|buffer| manager.get_device_interface_property(interface, key, buffer))
}

pub fn query_devnode_property(
    manager: &dyn ConfigManager,
    devinst: DevInst,
    key: &PropertyKey,
) -> Result<PropertyBuffer> {
    query_with(|buffer| manager.get_devnode_property(devinst, key, buffer))
}
