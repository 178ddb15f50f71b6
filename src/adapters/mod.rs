//! Concrete implementations of the ports.

pub mod csv_adapter;
pub mod file_config_adapter;
#[cfg(feature = "hyperliquid")]
pub mod hyperliquid_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
