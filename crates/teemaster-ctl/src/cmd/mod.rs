//! CLI command modules.

pub mod http;
pub mod probe;
pub mod servers;
