#![cfg(windows)]

pub mod bindings;
pub mod cfgmgr;

pub use cfgmgr::CfgMgrConfigManager;
