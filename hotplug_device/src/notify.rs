use std::fmt;
use std::sync::Arc;

use log::{debug, warn};

use crate::error::{ConfigRet, Error, Result};
use crate::platform::{ConfigManager, NotifyEvent, NotifyFilter, NotifySink, RegistrationToken};

struct ContextSink<C, F> {
    context: Arc<C>,
    callback: F,
}

impl<C, F> NotifySink for ContextSink<C, F>
where
    C: Send + Sync,
    F: Fn(&Arc<C>, NotifyEvent) + Send + Sync,
{
    fn notify(&self, event: NotifyEvent) {
        (self.callback)(&self.context, event)
    }
}

/// An active notification registration.
///
/// Released by [`NotificationHandle::unregister`] or on drop. Once released
/// the handle stays released; further `unregister` calls fail.
pub struct NotificationHandle {
    manager: Arc<dyn ConfigManager>,
    token: Option<RegistrationToken>,
}

impl NotificationHandle {
    /// Registers `callback` for events matching `filter`. The callback gets
    /// `context` back unchanged and runs on a platform thread.
    pub fn register<C, F>(
        manager: Arc<dyn ConfigManager>,
        filter: &NotifyFilter,
        context: Arc<C>,
        callback: F,
    ) -> Result<NotificationHandle>
    where
        C: Send + Sync + 'static,
        F: Fn(&Arc<C>, NotifyEvent) + Send + Sync + 'static,
    {
        let sink = Arc::new(ContextSink { context, callback });
        NotificationHandle::register_sink(manager, filter, sink)
    }

    pub fn register_sink(
        manager: Arc<dyn ConfigManager>,
        filter: &NotifyFilter,
        sink: Arc<dyn NotifySink>,
    ) -> Result<NotificationHandle> {
        let token = manager.register_notification(filter, sink)?;
        debug!("Registered notification {:?} for {:?}", token, filter);

        Ok(NotificationHandle {
            manager,
            token: Some(token),
        })
    }

    pub fn is_registered(&self) -> bool {
        self.token.is_some()
    }

    pub fn unregister(&mut self) -> Result<()> {
        let token = self
            .token
            .take()
            .ok_or(Error::platform(ConfigRet::INVALID_POINTER))?;

        debug!("Unregistering notification {:?}", token);
        self.manager.unregister_notification(token)
    }
}

impl Drop for NotificationHandle {
    fn drop(&mut self) {
        if self.is_registered() {
            if let Err(err) = self.unregister() {
                warn!("Failed to unregister notification: {}", err);
            }
        }
    }
}

impl fmt::Debug for NotificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationHandle")
            .field("token", &self.token)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::constants::*;
    use crate::simulated::SimulatedConfigManager;

    struct Recorder {
        events: Mutex<Vec<(usize, NotifyEvent)>>,
    }

    fn recorder() -> Arc<Recorder> {
        Arc::new(Recorder {
            events: Mutex::new(Vec::new()),
        })
    }

    fn record(context: &Arc<Recorder>, event: NotifyEvent) {
        let address = Arc::as_ptr(context) as usize;
        context.events.lock().unwrap().push((address, event));
    }

    #[test]
    fn register_then_unregister_leaves_no_subscription() {
        let simulated = Arc::new(SimulatedConfigManager::new());

        for filter in [
            NotifyFilter::InterfaceClass(GUID_DEVINTERFACE_DISK),
            NotifyFilter::InterfaceClass(GUID_DEVINTERFACE_HID),
            NotifyFilter::AllInterfaceClasses,
            NotifyFilter::DeviceInstance("USB\\VID_0781&PID_5581\\4C530001".into()),
        ] {
            let mut handle =
                NotificationHandle::register(simulated.clone(), &filter, recorder(), record)
                    .unwrap();
            assert_eq!(simulated.subscription_count(), 1);

            handle.unregister().unwrap();
            assert!(!handle.is_registered());
            assert_eq!(simulated.subscription_count(), 0);
        }
    }

    #[test]
    fn second_unregister_fails() {
        let simulated = Arc::new(SimulatedConfigManager::new());
        let mut handle = NotificationHandle::register(
            simulated.clone(),
            &NotifyFilter::AllInterfaceClasses,
            recorder(),
            record,
        )
        .unwrap();

        handle.unregister().unwrap();
        assert!(matches!(
            handle.unregister(),
            Err(Error::Platform {
                code: ConfigRet::INVALID_POINTER
            })
        ));
        assert_eq!(simulated.subscription_count(), 0);
    }

    #[test]
    fn drop_unregisters() {
        let simulated = Arc::new(SimulatedConfigManager::new());
        let handle = NotificationHandle::register(
            simulated.clone(),
            &NotifyFilter::AllInterfaceClasses,
            recorder(),
            record,
        )
        .unwrap();
        assert_eq!(simulated.subscription_count(), 1);

        drop(handle);
        assert_eq!(simulated.subscription_count(), 0);
    }

    #[test]
    fn rejected_filter_is_platform_error() {
        let simulated = Arc::new(SimulatedConfigManager::new());
        let result = NotificationHandle::register(
            simulated.clone(),
            &NotifyFilter::InterfaceClass(crate::guid::NULL),
            recorder(),
            record,
        );

        assert!(matches!(
            result,
            Err(Error::Platform {
                code: ConfigRet::INVALID_DATA
            })
        ));
        assert_eq!(simulated.subscription_count(), 0);
    }

    #[test]
    fn usb_storage_arrival_reaches_callback_once() {
        let simulated = Arc::new(SimulatedConfigManager::new());
        let usb = simulated.add_devnode(
            "USB\\VID_0781&PID_5581\\4C530001",
            Some(GUID_DEVCLASS_USB),
            None,
        );
        let disk = simulated.add_devnode(
            "USBSTOR\\DISK&VEN_SANDISK&PROD_ULTRA\\4C530001&0",
            Some(GUID_DEVCLASS_DISKDRIVE),
            Some(usb),
        );
        let path = "\\\\?\\USBSTOR#Disk&Ven_SanDisk&Prod_Ultra#4C530001&0";
        simulated.add_interface(path, GUID_DEVINTERFACE_DISK, disk);

        let context = recorder();
        let mut handle = NotificationHandle::register(
            simulated.clone(),
            &NotifyFilter::InterfaceClass(GUID_DEVINTERFACE_DISK),
            context.clone(),
            record,
        )
        .unwrap();

        simulated.arrive(path).unwrap();
        handle.unregister().unwrap();

        /* nothing is delivered after unregister */
        simulated.arrive(path).unwrap();

        let events = context.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![(
                Arc::as_ptr(&context) as usize,
                NotifyEvent::InterfaceArrival {
                    class_guid: GUID_DEVINTERFACE_DISK,
                    interface: path.into(),
                }
            )]
        );
    }

    #[test]
    fn filter_excludes_other_classes() {
        let simulated = Arc::new(SimulatedConfigManager::new());
        let devinst = simulated.add_devnode("HID\\VID_046D&PID_C52B\\7&1", None, None);
        simulated.add_interface("\\\\?\\HID#mouse", GUID_DEVINTERFACE_HID, devinst);

        let context = recorder();
        let _handle = NotificationHandle::register(
            simulated.clone(),
            &NotifyFilter::InterfaceClass(GUID_DEVINTERFACE_DISK),
            context.clone(),
            record,
        )
        .unwrap();

        simulated.arrive("\\\\?\\HID#mouse").unwrap();
        assert!(context.events.lock().unwrap().is_empty());
    }
}
