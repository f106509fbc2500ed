//! GPIO pin assignments for the node board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Defaults match the common ESP32 DevKitC wiring
//! (on-board LED on GPIO 2, BOOT button on GPIO 0).

// ---------------------------------------------------------------------------
// OnOff output
// ---------------------------------------------------------------------------

/// Digital output driven by the Generic OnOff Server.  Active HIGH.
pub const LED_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// User input
// ---------------------------------------------------------------------------

/// Momentary push-button, active LOW with internal pull-up.
pub const BUTTON_GPIO: i32 = 0;
