//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the business rules for the OnOff node: the
//! Generic OnOff Server/Client engine, self-provisioning and key binding,
//! and the event dispatcher tying them together.  All interaction with the
//! mesh stack and hardware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod onoff;
pub mod ports;
pub mod provisioning;
pub mod service;
