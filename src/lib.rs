//! meshswitch firmware library.
//!
//! A Generic OnOff mesh node: the OnOff Server/Client model engine and the
//! provisioning and key-binding controller, behind port traits so the
//! logic runs unchanged on the host.  All ESP-IDF-specific code is guarded
//! by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod pins;
pub mod scheduler;

pub mod adapters;
pub mod drivers;

#[cfg(target_os = "espidf")]
mod esp_link_shims;

pub use error::Error;
