//! Tenable API model types.

mod asset;
mod audit_log;
mod export;

pub use asset::*;
pub use audit_log::*;
pub use export::*;
