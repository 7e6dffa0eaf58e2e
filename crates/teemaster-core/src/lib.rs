//! teemaster-core — shared types, configuration, and wire formats.
//! All other TeeMaster crates depend on this one.

pub mod config;
pub mod entry;
pub mod wire;

pub use config::MasterConfig;
pub use entry::{AddressFamily, Entry, ListedServer, Token};
