use std::io::{self, BufRead};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use hotplug_device::guid::braced;
use hotplug_device::{
    Bus, ConfigManager, DeviceClass, DeviceInterface, Listener, ListenerConfig, PropertyKey,
    RemovedInterface, enumerate, query_interface_property,
};
use log::{LevelFilter, error, info};

mod demo;
mod logger;

use demo::DemoTree;
use logger::StderrLogger;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Windows Configuration Manager
    Cfgmgr,
    /// In-memory demo device tree
    Simulated,
}

fn default_backend() -> Backend {
    if cfg!(windows) {
        Backend::Cfgmgr
    } else {
        Backend::Simulated
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ClassArg {
    Hid,
    Printer,
    Usb,
    Disk,
}

impl From<ClassArg> for DeviceClass {
    fn from(class: ClassArg) -> DeviceClass {
        match class {
            ClassArg::Hid => DeviceClass::Hid,
            ClassArg::Printer => DeviceClass::Printer,
            ClassArg::Usb => DeviceClass::Usb,
            ClassArg::Disk => DeviceClass::DiskDrive,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum BusArg {
    Usb,
}

impl From<BusArg> for Bus {
    fn from(bus: BusArg) -> Bus {
        match bus {
            BusArg::Usb => Bus::Usb,
        }
    }
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Only report devices of this class, repeatable
    #[arg(long = "class", value_enum)]
    classes: Vec<ClassArg>,

    /// Only report devices on this bus, repeatable
    #[arg(long = "bus", value_enum)]
    busses: Vec<BusArg>,
}

impl FilterArgs {
    fn config(&self) -> ListenerConfig {
        ListenerConfig {
            arrive_callback: Some(Box::new(print_arrival)),
            remove_callback: Some(Box::new(print_removal)),
            only_classes: self.classes.iter().copied().map(DeviceClass::from).collect(),
            only_busses: self.busses.iter().copied().map(Bus::from).collect(),
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report device interfaces as they arrive and leave
    Watch {
        #[command(flatten)]
        filter: FilterArgs,

        /// Stop after this many seconds instead of waiting for enter
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// List present device interfaces
    Enumerate {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Read one property of a device interface
    Property {
        interface: String,
        /// Well-known name (DEVPKEY_Device_FriendlyName) or "{fmtid} pid"
        key: PropertyKey,
    },
    /// List the property keys set on a device interface or device node
    Keys {
        #[arg(required_unless_present = "devnode")]
        interface: Option<String>,

        /// Device instance id, lists the keys of its device node instead
        #[arg(long, conflicts_with = "interface")]
        devnode: Option<String>,
    },
}

#[derive(Parser, Debug)]
#[command(version, about = "Watch and query device interfaces")]
struct Cli {
    #[arg(long, value_enum, default_value_t = default_backend())]
    backend: Backend,

    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Command,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Device(#[from] hotplug_device::Error),

    #[error("backend {0:?} is not available on this platform")]
    Unavailable(Backend),

    #[error("either an interface or --devnode is required")]
    MissingTarget,

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn print_arrival(interface: DeviceInterface) {
    let device = &interface.device;
    let mut line = format!("+ {} [{}]", interface.path, device.class);

    if let Ok(bus) = device.bus() {
        line.push_str(&format!(" bus={bus}"));
    }
    if let (Ok(vendor_id), Ok(product_id)) = (device.vendor_id(), device.product_id()) {
        line.push_str(&format!(" {vendor_id:04x}:{product_id:04x}"));
    }
    println!("{line}");
}

fn print_removal(removed: RemovedInterface) {
    match removed.class {
        Some(class) => println!("- {} [{}]", removed.path, class),
        None => println!("- {} [{}]", removed.path, braced(&removed.class_guid)),
    }
}

struct Session {
    manager: Arc<dyn ConfigManager>,
    demo: Option<DemoTree>,
}

#[cfg(windows)]
fn cfgmgr() -> Result<Arc<dyn ConfigManager>, CliError> {
    Ok(Arc::new(hotplug_cfgmgr::CfgMgrConfigManager::new()))
}

#[cfg(not(windows))]
fn cfgmgr() -> Result<Arc<dyn ConfigManager>, CliError> {
    Err(CliError::Unavailable(Backend::Cfgmgr))
}

fn open(backend: Backend) -> Result<Session, CliError> {
    match backend {
        Backend::Cfgmgr => Ok(Session {
            manager: cfgmgr()?,
            demo: None,
        }),
        Backend::Simulated => {
            let tree = demo::seed();
            Ok(Session {
                manager: tree.manager.clone(),
                demo: Some(tree),
            })
        }
    }
}

fn watch(session: &Session, filter: &FilterArgs, seconds: Option<u64>) -> Result<(), CliError> {
    let listener = Listener::listen(session.manager.clone(), filter.config())?;

    if let Some(tree) = &session.demo {
        demo::play(tree, Duration::from_millis(200))?;
    }

    match seconds {
        Some(seconds) => sleep(Duration::from_secs(seconds)),
        None => {
            info!("Press enter to stop");
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
        }
    }

    listener.close()?;
    Ok(())
}

fn property_keys(
    manager: &dyn ConfigManager,
    interface: Option<&str>,
    devnode: Option<&str>,
) -> Result<Vec<PropertyKey>, CliError> {
    let keys = match (interface, devnode) {
        (_, Some(instance_id)) => {
            let devinst = manager.locate_devnode(instance_id)?;
            manager.get_devnode_property_keys(devinst)?
        }
        (Some(interface), None) => manager.get_device_interface_property_keys(interface)?,
        (None, None) => return Err(CliError::MissingTarget),
    };
    Ok(keys)
}

fn run(cli: Cli) -> Result<(), CliError> {
    let session = open(cli.backend)?;

    match &cli.command {
        Command::Watch { filter, seconds } => watch(&session, filter, *seconds)?,
        Command::Enumerate { filter } => enumerate(session.manager.clone(), &filter.config())?,
        Command::Property { interface, key } => {
            let buffer = query_interface_property(session.manager.as_ref(), interface, key)?;
            println!("{} ({}) = {}", key, buffer.property_type, buffer.decode()?);
        }
        Command::Keys { interface, devnode } => {
            let keys = property_keys(
                session.manager.as_ref(),
                interface.as_deref(),
                devnode.as_deref(),
            )?;
            for key in keys {
                println!("{key}");
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    StderrLogger::init(cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotplug_device::constants::{DEVPKEY_DEVICE_FRIENDLY_NAME, DEVPKEY_DEVICE_INSTANCE_ID};

    #[test]
    fn parse_watch_filters() {
        let cli = Cli::try_parse_from([
            "hotplug", "--backend", "simulated", "watch", "--class", "hid", "--class", "disk",
            "--bus", "usb", "--seconds", "3",
        ])
        .unwrap();

        assert_eq!(cli.backend, Backend::Simulated);
        let Command::Watch { filter, seconds } = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(seconds, Some(3));

        let config = filter.config();
        assert_eq!(config.only_classes, vec![DeviceClass::Hid, DeviceClass::DiskDrive]);
        assert_eq!(config.only_busses, vec![Bus::Usb]);
        assert_eq!(config.channel_capacity, 10);
    }

    #[test]
    fn parse_property_key() {
        let cli = Cli::try_parse_from([
            "hotplug",
            "--log-level",
            "debug",
            "property",
            "\\\\?\\HID#mouse",
            "DEVPKEY_Device_FriendlyName",
        ])
        .unwrap();

        assert_eq!(cli.log_level, LevelFilter::Debug);
        let Command::Property { interface, key } = cli.command else {
            panic!("expected property");
        };
        assert_eq!(interface, "\\\\?\\HID#mouse");
        assert_eq!(key, DEVPKEY_DEVICE_FRIENDLY_NAME);
    }

    #[test]
    fn unknown_class_rejected() {
        assert!(Cli::try_parse_from(["hotplug", "enumerate", "--class", "modem"]).is_err());
    }

    #[test]
    fn simulated_keys() {
        let session = open(Backend::Simulated).unwrap();
        let disk = session.demo.as_ref().unwrap().disk.clone();
        let run = Cli {
            backend: Backend::Simulated,
            log_level: LevelFilter::Off,
            command: Command::Keys {
                interface: Some(disk),
                devnode: None,
            },
        };
        assert!(super::run(run).is_ok());
    }

    #[test]
    fn devnode_keys() {
        let cli = Cli::try_parse_from([
            "hotplug",
            "keys",
            "--devnode",
            "USBSTOR\\DISK&VEN_SANDISK&PROD_ULTRA\\4C530001&0",
        ])
        .unwrap();
        let Command::Keys { interface, devnode } = cli.command else {
            panic!("expected keys");
        };
        assert_eq!(interface, None);

        let session = open(Backend::Simulated).unwrap();
        let keys = property_keys(session.manager.as_ref(), None, devnode.as_deref()).unwrap();
        assert!(keys.contains(&DEVPKEY_DEVICE_FRIENDLY_NAME));
        assert!(keys.contains(&DEVPKEY_DEVICE_INSTANCE_ID));

        assert!(matches!(
            property_keys(session.manager.as_ref(), None, None),
            Err(CliError::MissingTarget)
        ));
    }

    #[test]
    fn keys_needs_exactly_one_target() {
        assert!(Cli::try_parse_from(["hotplug", "keys"]).is_err());
        assert!(
            Cli::try_parse_from(["hotplug", "keys", "\\\\?\\HID#mouse", "--devnode", "HID\\1"])
                .is_err()
        );
    }
}
