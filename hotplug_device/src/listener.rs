use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::class::{Bus, DeviceClass, InterfaceClass};
use crate::device::{Device, DeviceInterface};
use crate::error::Result;
use crate::guid::GUID;
use crate::notify::NotificationHandle;
use crate::platform::{ConfigManager, NotifyEvent, NotifyFilter, NotifySink};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 10;

pub type ArriveCallback = Box<dyn Fn(DeviceInterface) + Send>;
pub type RemoveCallback = Box<dyn Fn(RemovedInterface) + Send>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedInterface {
    pub path: String,
    pub class: Option<InterfaceClass>,
    pub class_guid: GUID,
}

pub struct ListenerConfig {
    pub arrive_callback: Option<ArriveCallback>,
    pub remove_callback: Option<RemoveCallback>,
    /// Empty means every known class.
    pub only_classes: Vec<DeviceClass>,
    pub only_busses: Vec<Bus>,
    pub channel_capacity: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        ListenerConfig {
            arrive_callback: None,
            remove_callback: None,
            only_classes: Vec::new(),
            only_busses: Vec::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl fmt::Debug for ListenerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerConfig")
            .field("only_classes", &self.only_classes)
            .field("only_busses", &self.only_busses)
            .field("channel_capacity", &self.channel_capacity)
            .finish_non_exhaustive()
    }
}

impl ListenerConfig {
    fn interface_classes(&self) -> Vec<InterfaceClass> {
        if self.only_classes.is_empty() {
            return InterfaceClass::ALL.to_vec();
        }

        let mut classes = Vec::new();
        for class in self.only_classes.iter().filter_map(DeviceClass::interface_class) {
            if !classes.contains(&class) {
                classes.push(class);
            }
        }
        classes
    }

    fn accepts(&self, device: &Device) -> bool {
        if !self.only_classes.is_empty() && !self.only_classes.contains(&device.class) {
            debug!("Ignoring {} of class {}", device.path, device.class);
            return false;
        }

        if self.only_busses.is_empty() {
            return true;
        }

        match device.bus() {
            Ok(bus) if self.only_busses.contains(&bus) => true,
            Ok(bus) => {
                debug!("Ignoring {} on bus {}", device.path, bus);
                false
            }
            Err(err) => {
                debug!("Failed to get bus of {}: {}", device.path, err);
                false
            }
        }
    }
}

fn handle_arrive(
    manager: &Arc<dyn ConfigManager>,
    config: &ListenerConfig,
    class_guid: GUID,
    path: String,
) {
    let interface = match DeviceInterface::resolve(manager.clone(), class_guid, path.clone()) {
        Ok(interface) => interface,
        Err(err) => {
            debug!("Skipping interface {}: {}", path, err);
            return;
        }
    };

    if !config.accepts(&interface.device) {
        return;
    }

    if let Some(callback) = &config.arrive_callback {
        callback(interface);
    }
}

fn handle_event(manager: &Arc<dyn ConfigManager>, config: &ListenerConfig, event: NotifyEvent) {
    match event {
        NotifyEvent::InterfaceArrival {
            class_guid,
            interface,
        } => {
            debug!("Interface arrived: {}", interface);
            handle_arrive(manager, config, class_guid, interface);
        }
        NotifyEvent::InterfaceRemoval {
            class_guid,
            interface,
        } => {
            debug!("Interface removed: {}", interface);
            if let Some(callback) = &config.remove_callback {
                callback(RemovedInterface {
                    path: interface,
                    class: InterfaceClass::from_guid(&class_guid),
                    class_guid,
                });
            }
        }
        event => debug!("Ignoring {:?}", event),
    }
}

#[derive(Debug)]
enum PumpMessage {
    Event(NotifyEvent),
    Stop,
}

// blocks the platform thread while the channel is full
struct ChannelSink {
    sender: SyncSender<PumpMessage>,
}

impl NotifySink for ChannelSink {
    fn notify(&self, event: NotifyEvent) {
        if let Err(err) = self.sender.send(PumpMessage::Event(event)) {
            warn!("Dropping event, listener is closed: {:?}", err.0);
        }
    }
}

fn event_pump(
    manager: Arc<dyn ConfigManager>,
    config: ListenerConfig,
    receiver: Receiver<PumpMessage>,
    closed: Arc<AtomicBool>,
) {
    debug!("Event pump started");
    for message in receiver {
        match message {
            PumpMessage::Event(event) if closed.load(Ordering::SeqCst) => {
                debug!("Discarding {:?}, listener is closed", event)
            }
            PumpMessage::Event(event) => handle_event(&manager, &config, event),
            PumpMessage::Stop => break,
        }
    }
    debug!("Event pump stopped");
}

struct AutoDropHandle(Option<JoinHandle<()>>);

impl AutoDropHandle {
    fn is_current(&self) -> bool {
        self.0
            .as_ref()
            .is_some_and(|handle| handle.thread().id() == thread::current().id())
    }

    fn detach(&mut self) {
        self.0.take();
    }

    fn join(&mut self) {
        let Some(handle) = self.0.take() else {
            return;
        };

        debug!("Joining event pump");
        if handle.join().is_err() {
            error!("Event pump panicked");
        }
        debug!("Event pump joined");
    }
}

impl Drop for AutoDropHandle {
    fn drop(&mut self) {
        self.join();
    }
}

/// Relays device interface arrivals and removals to the callbacks of a
/// [`ListenerConfig`] until closed or dropped.
pub struct Listener {
    handles: Vec<NotificationHandle>,
    stop: Option<SyncSender<PumpMessage>>,
    closed: Arc<AtomicBool>,
    pump: AutoDropHandle,
}

fn unregister_all(handles: Vec<NotificationHandle>) -> Result<()> {
    let mut result = Ok(());
    for mut handle in handles {
        if let Err(err) = handle.unregister() {
            warn!("Failed to unregister notification: {}", err);
            if result.is_ok() {
                result = Err(err);
            }
        }
    }
    result
}

fn stop_pump(stop: Option<SyncSender<PumpMessage>>) {
    let Some(stop) = stop else {
        return;
    };
    if stop.send(PumpMessage::Stop).is_err() {
        debug!("Event pump already stopped");
    }
}

impl Listener {
    pub fn listen(manager: Arc<dyn ConfigManager>, config: ListenerConfig) -> Result<Listener> {
        let classes = config.interface_classes();
        debug!("Listening for {:?} with {:?}", classes, config);

        let (sender, receiver) = sync_channel(config.channel_capacity);
        let closed = Arc::new(AtomicBool::new(false));
        let pump_manager = manager.clone();
        let pump_closed = closed.clone();
        let pump =
            thread::spawn(move || event_pump(pump_manager, config, receiver, pump_closed));

        let mut listener = Listener {
            handles: Vec::new(),
            stop: Some(sender.clone()),
            closed,
            pump: AutoDropHandle(Some(pump)),
        };

        let sink: Arc<dyn NotifySink> = Arc::new(ChannelSink { sender });
        for class in classes {
            let filter = NotifyFilter::InterfaceClass(class.guid());
            let handle = NotificationHandle::register_sink(manager.clone(), &filter, sink.clone())?;
            listener.handles.push(handle);
        }

        info!("Listening on {} interface classes", listener.handles.len());
        Ok(listener)
    }

    /// Unregisters all notifications, then waits until queued events have
    /// been handed to the callbacks.
    ///
    /// From inside a callback, returns at once instead: queued events are
    /// discarded and the notifications are unregistered on another thread.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        let handles: Vec<NotificationHandle> = self.handles.drain(..).collect();
        let stop = self.stop.take();

        if self.pump.is_current() {
            // unregistering waits on platform callbacks blocked on the channel
            // that only this thread drains
            debug!("Listener closed from its own callback");
            self.closed.store(true, Ordering::SeqCst);
            self.pump.detach();
            thread::spawn(move || {
                if let Err(err) = unregister_all(handles) {
                    warn!("Failed to close listener: {}", err);
                }
                stop_pump(stop);
            });
            return Ok(());
        }

        let result = unregister_all(handles);
        stop_pump(stop);
        self.pump.join();
        result
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!("Failed to close listener: {}", err);
        }
    }
}

/// Calls the arrive callback for every matching interface already present.
pub fn enumerate(manager: Arc<dyn ConfigManager>, config: &ListenerConfig) -> Result<()> {
    for class in config.interface_classes() {
        let paths = manager.get_device_interface_list(&class.guid())?;
        debug!("Found {} {} interfaces", paths.len(), class);

        for path in paths {
            handle_arrive(&manager, config, class.guid(), path);
        }
    }
    Ok(())
}
