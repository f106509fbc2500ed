//! Output adapter: bridges an `embedded-hal` pin to [`OutputPort`].
//!
//! The OnOff engine only knows "on" and "off"; this adapter maps them to
//! pin levels (optionally inverted for active-low wiring) and logs pin
//! errors instead of propagating them, since a failed GPIO write has no
//! meaningful recovery inside a mesh message handler.

use embedded_hal::digital::{Error as _, OutputPin, PinState};
use log::{debug, error};

use crate::app::ports::OutputPort;

pub struct PinOutput<P: OutputPin> {
    pin: P,
    active_low: bool,
}

impl<P: OutputPin> PinOutput<P> {
    pub fn new(pin: P) -> Self {
        Self { pin, active_low: false }
    }

    /// For outputs wired to sink current (LED to VCC).
    pub fn active_low(pin: P) -> Self {
        Self { pin, active_low: true }
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }
}

impl<P: OutputPin> OutputPort for PinOutput<P> {
    fn set_output(&mut self, on: bool) {
        let level = PinState::from(on != self.active_low);
        debug!("output: {} (pin {:?})", if on { "on" } else { "off" }, level);
        if let Err(e) = self.pin.set_state(level) {
            error!("output: pin write failed: {:?}", e.kind());
        }
    }
}
