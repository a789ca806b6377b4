pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{AdminConfig, CliConfig};

pub use config::cli::LocalStorage;

pub use config::toml_config::RosterConfig;
pub use core::allocator::WeeklyAllocator;
pub use core::ingest::{DuplicateStrategy, RosterIngestor};
pub use core::store::RosterStore;
pub use utils::error::{Result, RosterError};
