//! GPIO output pin for the OnOff LED.
//!
//! Implements `embedded_hal::digital::OutputPin` so the
//! [`PinOutput`](crate::adapters::output::PinOutput) adapter can drive any
//! pin type; this one writes through ESP-IDF `gpio_set_level` on target and
//! only records the level in the simulator.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};

use super::hw_init;

/// Error from the ESP-IDF GPIO layer (raw `esp_err_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioError(pub i32);

impl embedded_hal::digital::Error for GpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

pub struct GpioLed {
    gpio: i32,
    level: bool,
}

impl GpioLed {
    /// The pin must already be configured as an output
    /// (see [`hw_init::init_peripherals`]).
    pub fn new(gpio: i32) -> Self {
        Self { gpio, level: false }
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }

    /// Last level written.
    pub fn is_on(&self) -> bool {
        self.level
    }

    fn write(&mut self, high: bool) -> Result<(), GpioError> {
        hw_init::gpio_write(self.gpio, high).map_err(GpioError)?;
        self.level = high;
        Ok(())
    }
}

impl ErrorType for GpioLed {
    type Error = GpioError;
}

impl OutputPin for GpioLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}

/// A pin that exists only in memory, for tests and fuzzing.
#[derive(Debug, Default)]
pub struct MemoryPin {
    pub level: bool,
    pub writes: usize,
}

impl ErrorType for MemoryPin {
    type Error = Infallible;
}

impl OutputPin for MemoryPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level = false;
        self.writes += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level = true;
        self.writes += 1;
        Ok(())
    }
}
