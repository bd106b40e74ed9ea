//! File-backed implementations of the Huddle storage and configuration ports.

pub mod config_service;
pub mod durable_store;
pub mod paths;
pub mod storage;

pub use crate::config_service::ConfigService;
pub use crate::durable_store::{InMemoryDurableStore, TomlDurableStore};
pub use crate::paths::{HuddlePaths, PathError};
