pub mod class;
pub mod constants;
pub mod device;
pub mod error;
pub mod guid;
pub mod listener;
pub mod notify;
pub mod platform;
pub mod property;
pub mod simulated;
pub mod strings;

pub use class::{Bus, DeviceClass, InterfaceClass};
pub use device::{Device, DeviceInterface};
pub use error::{ConfigRet, Error, Result};
pub use guid::GUID;
pub use listener::{Listener, ListenerConfig, RemovedInterface, enumerate};
pub use notify::NotificationHandle;
pub use platform::{
    ConfigManager, DevInst, NotifyEvent, NotifyFilter, NotifySink, RegistrationToken,
    query_devnode_property, query_interface_property,
};
pub use property::{PropertyBuffer, PropertyKey, PropertyType, PropertyValue};
pub use simulated::SimulatedConfigManager;

