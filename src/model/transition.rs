//! Generic Transition Time codec.
//!
//! ```text
//!   bit  7   6   5   4   3   2   1   0
//!      ┌───────┬───────────────────────┐
//!      │  res  │     number of steps   │
//!      └───────┴───────────────────────┘
//!   res: 0 = 100 ms, 1 = 1 s, 2 = 10 s, 3 = 10 min
//!   steps: 0..=62, 0x3F = unknown / indefinite
//! ```
//!
//! The largest exact duration is 62 × 10 min (10 h 20 min).

/// Step value reserved for "unknown / indefinite".
pub const STEPS_UNKNOWN: u8 = 0x3F;

/// Largest step count usable for a finite duration.
pub const MAX_STEPS: u32 = 62;

/// Milliseconds per step for each resolution selector.
const RESOLUTION_MS: [u32; 4] = [100, 1_000, 10_000, 600_000];

/// A decoded transition duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionTime {
    /// Finite duration in milliseconds.
    Millis(u32),
    /// Unknown or longer than the encoding can express.
    Indefinite,
}

impl TransitionTime {
    /// An immediate (zero-length) transition.
    pub const IMMEDIATE: Self = Self::Millis(0);

    /// Largest duration representable exactly.
    pub const MAX_MS: u32 = MAX_STEPS * RESOLUTION_MS[3];

    /// Decode a Transition Time byte.
    pub fn decode(byte: u8) -> Self {
        let resolution = (byte >> 6) as usize;
        let steps = byte & STEPS_UNKNOWN;
        if steps == STEPS_UNKNOWN {
            return Self::Indefinite;
        }
        Self::Millis(steps as u32 * RESOLUTION_MS[resolution])
    }

    /// Encode using the finest resolution that fits in 62 steps.
    ///
    /// Durations that are not a whole number of steps round up.  Anything
    /// past [`MAX_MS`](Self::MAX_MS) encodes as unknown.
    pub fn encode(self) -> u8 {
        let Self::Millis(ms) = self else {
            return STEPS_UNKNOWN;
        };
        for (i, res) in RESOLUTION_MS.iter().enumerate() {
            let steps = ms.div_ceil(*res);
            if steps <= MAX_STEPS {
                return (steps as u8) | ((i as u8) << 6);
            }
        }
        STEPS_UNKNOWN
    }

    /// Finite milliseconds, or `None` for [`Indefinite`](Self::Indefinite).
    pub fn as_millis(self) -> Option<u32> {
        match self {
            Self::Millis(ms) => Some(ms),
            Self::Indefinite => None,
        }
    }

    pub fn is_immediate(self) -> bool {
        self == Self::IMMEDIATE
    }
}

impl core::fmt::Display for TransitionTime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Millis(ms) => write!(f, "{} ms", ms),
            Self::Indefinite => write!(f, "indefinite"),
        }
    }
}
