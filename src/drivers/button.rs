//! ISR-debounced push-button driver.
//!
//! ## Hardware
//!
//! Active-low momentary switch with pull-up.  GPIO fires on falling edge;
//! the ISR records the raw timestamp into an atomic and raises an edge
//! flag, and the `tick()`
//! method (called from the event loop) runs the debounce state machine.
//!
//! A press is reported once the button has been held for the debounce
//! window.  Further edges inside that window are contact bounce and are
//! absorbed.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Raw ISR timestamp (milliseconds since boot, truncated to u32).
/// Written by the ISR, read by the event loop.
static BUTTON_ISR_TIMESTAMP: AtomicU32 = AtomicU32::new(0);

/// Set by the ISR, cleared by the event loop once the edge is seen.
static BUTTON_EDGE: AtomicBool = AtomicBool::new(false);

/// Button events emitted after debouncing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Pressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DebounceState {
    Idle,
    DebounceWait { since_ms: u32 },
}

pub struct ButtonDriver {
    gpio: i32,
    debounce_ms: u32,
    state: DebounceState,
}

impl ButtonDriver {
    pub fn new(gpio: i32, debounce_ms: u32) -> Self {
        Self {
            gpio,
            debounce_ms,
            state: DebounceState::Idle,
        }
    }

    /// GPIO pin this button is attached to.
    pub fn gpio(&self) -> i32 {
        self.gpio
    }

    /// Call from the event loop.  `now_ms` is the current monotonic time
    /// in milliseconds.  Returns a debounced press, if any.
    pub fn tick(&mut self, now_ms: u32) -> Option<ButtonEvent> {
        let new_edge = BUTTON_EDGE.swap(false, Ordering::AcqRel);
        let isr_ms = BUTTON_ISR_TIMESTAMP.load(Ordering::Acquire);

        match self.state {
            DebounceState::Idle => {
                if new_edge {
                    self.state = DebounceState::DebounceWait { since_ms: isr_ms };
                }
                None
            }
            DebounceState::DebounceWait { since_ms } => {
                if now_ms.wrapping_sub(since_ms) < self.debounce_ms {
                    return None;
                }
                self.state = DebounceState::Idle;
                Self::is_pressed_hw(self.gpio).then_some(ButtonEvent::Pressed)
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn is_pressed_hw(gpio: i32) -> bool {
        !crate::drivers::hw_init::gpio_read(gpio)
    }

    // The simulator has no level to sample; an edge is a press.
    #[cfg(not(target_os = "espidf"))]
    fn is_pressed_hw(_gpio: i32) -> bool {
        true
    }
}

/// ISR handler. Register this on the button GPIO falling edge.
/// Safe to call from interrupt context (lock-free atomic store).
/// The simulator calls it directly to inject a press.
pub fn button_isr_handler(now_ms: u32) {
    BUTTON_ISR_TIMESTAMP.store(now_ms, Ordering::Release);
    BUTTON_EDGE.store(true, Ordering::Release);
}
