//! GPIO drivers and one-shot hardware initialisation.

pub mod button;
pub mod hw_init;
pub mod led;
