use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use log::{debug, error, info};

use crate::constants::*;
use crate::error::{ConfigRet, Error, Result};
use crate::guid::{self, GUID};
use crate::platform::{
    ConfigManager, DevInst, NotifyEvent, NotifyFilter, NotifySink, RegistrationToken,
};
use crate::property::{PropertyBuffer, PropertyKey, PropertyType, PropertyValue};

struct SimDevNode {
    parent: Option<DevInst>,
    properties: HashMap<PropertyKey, PropertyBuffer>,
}

struct SimInterface {
    class_guid: GUID,
    present: bool,
    properties: HashMap<PropertyKey, PropertyBuffer>,
}

struct Subscription {
    filter: NotifyFilter,
    sink: Arc<dyn NotifySink>,
    active: Arc<Mutex<bool>>,
}

#[derive(Default)]
struct SimState {
    next_token: usize,
    subscriptions: BTreeMap<usize, Subscription>,
    devnodes: HashMap<DevInst, SimDevNode>,
    instance_ids: HashMap<String, DevInst>,
    interfaces: BTreeMap<String, SimInterface>,
}

/// In-memory device tree implementing [`ConfigManager`].
#[derive(Default)]
pub struct SimulatedConfigManager {
    state: Mutex<SimState>,
}

fn copy_property(
    property: Option<&PropertyBuffer>,
    buffer: &mut [u8],
) -> Result<(PropertyType, usize)> {
    let property = property.ok_or(Error::PropertyNotFound)?;
    let size = property.data.len();
    if buffer.len() < size {
        return Err(Error::BufferTooSmall {
            required_size: size as u32,
        });
    }

    buffer[..size].copy_from_slice(&property.data);
    Ok((property.property_type, size))
}

fn sorted_keys(properties: &HashMap<PropertyKey, PropertyBuffer>) -> Vec<PropertyKey> {
    let mut keys: Vec<PropertyKey> = properties.keys().copied().collect();
    keys.sort_by_key(|key| (key.fmtid.to_u128(), key.pid));
    keys
}

impl SimulatedConfigManager {
    pub fn new() -> SimulatedConfigManager {
        info!("Creating simulated configuration manager");
        SimulatedConfigManager::default()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscription_count(&self) -> usize {
        self.state().subscriptions.len()
    }

    pub fn add_devnode(
        &self,
        instance_id: &str,
        class_guid: Option<GUID>,
        parent: Option<DevInst>,
    ) -> DevInst {
        let mut state = self.state();
        let devinst = state.devnodes.len() as DevInst + 1;

        let mut properties = HashMap::new();
        properties.insert(
            DEVPKEY_DEVICE_INSTANCE_ID,
            PropertyValue::String(instance_id.into()).into(),
        );
        if let Some(class_guid) = class_guid {
            properties.insert(
                DEVPKEY_DEVICE_CLASS_GUID,
                PropertyValue::Guid(class_guid).into(),
            );
        }
        if let Some((enumerator, _)) = instance_id.split_once('\\') {
            properties.insert(
                DEVPKEY_DEVICE_ENUMERATOR_NAME,
                PropertyValue::String(enumerator.into()).into(),
            );
        }

        state
            .devnodes
            .insert(devinst, SimDevNode { parent, properties });
        state
            .instance_ids
            .insert(instance_id.to_ascii_uppercase(), devinst);
        devinst
    }

    pub fn set_devnode_property(&self, devinst: DevInst, key: PropertyKey, value: PropertyValue) {
        if let Some(devnode) = self.state().devnodes.get_mut(&devinst) {
            devnode.properties.insert(key, value.into());
        }
    }

    /// Adds a present interface exposed by `devinst`. No event is raised.
    pub fn add_interface(&self, path: &str, class_guid: GUID, devinst: DevInst) {
        let mut state = self.state();
        let instance_id = state
            .devnodes
            .get(&devinst)
            .and_then(|devnode| devnode.properties.get(&DEVPKEY_DEVICE_INSTANCE_ID))
            .cloned();

        let mut properties = HashMap::new();
        if let Some(instance_id) = instance_id {
            properties.insert(DEVPKEY_DEVICE_INSTANCE_ID, instance_id);
        }
        properties.insert(
            DEVPKEY_DEVICE_INTERFACE_CLASS_GUID,
            PropertyValue::Guid(class_guid).into(),
        );
        properties.insert(
            DEVPKEY_DEVICE_INTERFACE_ENABLED,
            PropertyValue::Boolean(true).into(),
        );

        state.interfaces.insert(
            path.into(),
            SimInterface {
                class_guid,
                present: true,
                properties,
            },
        );
    }

    pub fn set_interface_property(&self, path: &str, key: PropertyKey, value: PropertyValue) {
        if let Some(interface) = self.state().interfaces.get_mut(path) {
            interface.properties.insert(key, value.into());
        }
    }

    /// Marks `path` present and raises an arrival event.
    pub fn arrive(&self, path: &str) -> Result<()> {
        let class_guid = self.set_present(path, true)?;
        self.deliver(NotifyEvent::InterfaceArrival {
            class_guid,
            interface: path.into(),
        });
        Ok(())
    }

    /// Marks `path` absent and raises a removal event.
    pub fn remove(&self, path: &str) -> Result<()> {
        let class_guid = self.set_present(path, false)?;
        self.deliver(NotifyEvent::InterfaceRemoval {
            class_guid,
            interface: path.into(),
        });
        Ok(())
    }

    fn set_present(&self, path: &str, present: bool) -> Result<GUID> {
        let mut state = self.state();
        let interface = state
            .interfaces
            .get_mut(path)
            .ok_or(Error::platform(ConfigRet::NO_SUCH_DEVICE_INTERFACE))?;
        interface.present = present;
        Ok(interface.class_guid)
    }

    fn deliver(&self, event: NotifyEvent) {
        let class_guid = match &event {
            NotifyEvent::InterfaceArrival { class_guid, .. }
            | NotifyEvent::InterfaceRemoval { class_guid, .. } => *class_guid,
            _ => return,
        };

        let sinks: Vec<(Arc<dyn NotifySink>, Arc<Mutex<bool>>)> = self
            .state()
            .subscriptions
            .values()
            .filter(|subscription| match &subscription.filter {
                NotifyFilter::InterfaceClass(filter_guid) => *filter_guid == class_guid,
                NotifyFilter::AllInterfaceClasses => true,
                NotifyFilter::DeviceInstance(_) => false,
            })
            .map(|subscription| (subscription.sink.clone(), subscription.active.clone()))
            .collect();

        debug!("Delivering {:?} to {} subscriptions", event, sinks.len());
        let worker = thread::spawn(move || {
            for (sink, active) in sinks {
                // held across the callback so unregister waits for it
                let active = active.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                if *active {
                    sink.notify(event.clone());
                }
            }
        });

        if worker.join().is_err() {
            error!("Notification callback panicked");
        }
    }
}

impl ConfigManager for SimulatedConfigManager {
    fn register_notification(
        &self,
        filter: &NotifyFilter,
        sink: Arc<dyn NotifySink>,
    ) -> Result<RegistrationToken> {
        let valid = match filter {
            NotifyFilter::InterfaceClass(class_guid) => !guid::is_null(class_guid),
            NotifyFilter::AllInterfaceClasses => true,
            NotifyFilter::DeviceInstance(instance_id) => !instance_id.is_empty(),
        };
        if !valid {
            return Err(Error::platform(ConfigRet::INVALID_DATA));
        }

        let mut state = self.state();
        state.next_token += 1;
        let token = state.next_token;
        state.subscriptions.insert(
            token,
            Subscription {
                filter: filter.clone(),
                sink,
                active: Arc::new(Mutex::new(true)),
            },
        );
        Ok(RegistrationToken(token))
    }

    fn unregister_notification(&self, token: RegistrationToken) -> Result<()> {
        let subscription = self
            .state()
            .subscriptions
            .remove(&token.0)
            .ok_or(Error::platform(ConfigRet::INVALID_POINTER))?;

        *subscription
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = false;
        Ok(())
    }

    fn get_device_interface_property(
        &self,
        interface: &str,
        key: &PropertyKey,
        buffer: &mut [u8],
    ) -> Result<(PropertyType, usize)> {
        let state = self.state();
        let interface = state
            .interfaces
            .get(interface)
            .ok_or(Error::platform(ConfigRet::NO_SUCH_DEVICE_INTERFACE))?;
        copy_property(interface.properties.get(key), buffer)
    }

    fn get_device_interface_property_keys(&self, interface: &str) -> Result<Vec<PropertyKey>> {
        let state = self.state();
        let interface = state
            .interfaces
            .get(interface)
            .ok_or(Error::platform(ConfigRet::NO_SUCH_DEVICE_INTERFACE))?;

        Ok(sorted_keys(&interface.properties))
    }

    fn get_device_interface_list(&self, class_guid: &GUID) -> Result<Vec<String>> {
        Ok(self
            .state()
            .interfaces
            .iter()
            .filter(|(_, interface)| interface.present && interface.class_guid == *class_guid)
            .map(|(path, _)| path.clone())
            .collect())
    }

    fn locate_devnode(&self, instance_id: &str) -> Result<DevInst> {
        self.state()
            .instance_ids
            .get(&instance_id.to_ascii_uppercase())
            .copied()
            .ok_or(Error::platform(ConfigRet::NO_SUCH_DEVNODE))
    }

    fn get_devnode_property(
        &self,
        devinst: DevInst,
        key: &PropertyKey,
        buffer: &mut [u8],
    ) -> Result<(PropertyType, usize)> {
        let state = self.state();
        let devnode = state
            .devnodes
            .get(&devinst)
            .ok_or(Error::platform(ConfigRet::INVALID_DEVNODE))?;
        copy_property(devnode.properties.get(key), buffer)
    }

    fn get_devnode_property_keys(&self, devinst: DevInst) -> Result<Vec<PropertyKey>> {
        let state = self.state();
        let devnode = state
            .devnodes
            .get(&devinst)
            .ok_or(Error::platform(ConfigRet::INVALID_DEVNODE))?;
        Ok(sorted_keys(&devnode.properties))
    }

    fn get_parent(&self, devinst: DevInst) -> Result<DevInst> {
        let state = self.state();
        let devnode = state
            .devnodes
            .get(&devinst)
            .ok_or(Error::platform(ConfigRet::INVALID_DEVNODE))?;
        devnode
            .parent
            .ok_or(Error::platform(ConfigRet::NO_SUCH_DEVNODE))
    }
}
