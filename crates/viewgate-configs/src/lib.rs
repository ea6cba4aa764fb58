//! viewgate-configs
//!
//! Server configuration types and loader for the viewgate gateway.

pub mod config;

pub use config::defaults;
pub use config::*;
