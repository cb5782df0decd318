#[cfg(feature = "cli")]
pub mod app;
pub mod checks;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::Cli;

pub use core::catalog::{AntaCatalog, AntaTestDefinition};
pub use core::device::{AsyncEosDevice, DeviceSettings, Proto};
pub use core::inventory::AntaInventory;
pub use core::result_manager::ResultManager;
pub use core::runner::{run, RunOptions};
pub use core::storage::LocalStorage;
pub use utils::error::{AntaError, Result};
