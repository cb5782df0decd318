pub mod catalog;
pub mod device;
pub mod exec;
pub mod executor;
pub mod inventory;
pub mod reporter;
pub mod result_manager;
pub mod runner;
pub mod storage;

pub use crate::domain::ports::{AntaTest, EosDevice, Storage};
pub use crate::utils::error::Result;
