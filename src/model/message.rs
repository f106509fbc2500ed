//! Generic OnOff payload codecs.
//!
//! Standard layouts:
//! ```text
//!   Set / Set Unack:  value(1) tid(1) [transition(1) delay(1)]
//!   Status:           present(1) [target(1) remaining(1)]
//! ```
//!
//! ## Source-address extension (non-standard)
//!
//! Some deployments append the sender's own unicast address so that a node
//! can recognise its own broadcast when the bearer loops it back.  When
//! [`Layout::with_source`] is in effect, a 2-byte little-endian address is
//! inserted right after the mandatory fields:
//!
//! ```text
//!   Set / Set Unack:  value(1) tid(1) src(2) [transition(1) delay(1)]
//!   Status:           present(1) src(2) [target(1) remaining(1)]
//! ```
//!
//! Nodes that do not enable the extension reject these longer payloads,
//! so every node in a network must agree on the setting.

use heapless::Vec;

use super::MAX_ACCESS_PAYLOAD;
use super::transition::TransitionTime;
use crate::error::DecodeError;

/// Delay field unit in milliseconds.
pub const DELAY_UNIT_MS: u32 = 5;

/// Encoded payload buffer.
pub type Payload = Vec<u8, MAX_ACCESS_PAYLOAD>;

/// Which payload layout is on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Layout {
    /// Carry the 2-byte source-address extension.
    pub with_source: bool,
}

impl Layout {
    pub const STANDARD: Self = Self { with_source: false };
    pub const WITH_SOURCE: Self = Self { with_source: true };

    fn source_len(self) -> usize {
        if self.with_source { 2 } else { 0 }
    }
}

/// Optional transition parameters of a Set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionParams {
    pub transition: TransitionTime,
    /// Start delay in 5 ms units.
    pub delay: u8,
}

impl TransitionParams {
    pub fn delay_ms(&self) -> u32 {
        self.delay as u32 * DELAY_UNIT_MS
    }
}

/// Decoded Generic OnOff Set / Set Unacknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetMessage {
    pub value: bool,
    pub tid: u8,
    /// Embedded sender address (source-address extension only).
    pub source: Option<u16>,
    pub params: Option<TransitionParams>,
}

impl SetMessage {
    pub fn decode(payload: &[u8], layout: Layout) -> Result<Self, DecodeError> {
        let base = 2 + layout.source_len();
        if payload.len() < base {
            return Err(DecodeError::TooShort {
                expected: base,
                actual: payload.len(),
            });
        }
        if payload.len() != base && payload.len() != base + 2 {
            return Err(DecodeError::BadLength(payload.len()));
        }

        let value = decode_onoff(payload[0])?;
        let tid = payload[1];
        let source = layout
            .with_source
            .then(|| u16::from_le_bytes([payload[2], payload[3]]));

        let params = if payload.len() == base + 2 {
            let transition = TransitionTime::decode(payload[base]);
            if transition == TransitionTime::Indefinite {
                return Err(DecodeError::ProhibitedTransition);
            }
            Some(TransitionParams {
                transition,
                delay: payload[base + 1],
            })
        } else {
            None
        };

        Ok(Self {
            value,
            tid,
            source,
            params,
        })
    }

    /// Encode for `layout`.  With the extension enabled, a missing `source`
    /// is written as the unassigned address.
    pub fn encode(&self, layout: Layout) -> Payload {
        let mut out = Payload::new();
        // Capacity (11) exceeds the longest layout (6), pushes cannot fail.
        let _ = out.push(self.value as u8);
        let _ = out.push(self.tid);
        if layout.with_source {
            let _ = out.extend_from_slice(&self.source.unwrap_or(0).to_le_bytes());
        }
        if let Some(p) = self.params {
            let _ = out.push(p.transition.encode());
            let _ = out.push(p.delay);
        }
        out
    }

    /// Transition duration requested by this Set (zero when absent).
    pub fn transition(&self) -> TransitionTime {
        self.params
            .map_or(TransitionTime::IMMEDIATE, |p| p.transition)
    }

    /// Start delay in milliseconds (zero when absent).
    pub fn delay_ms(&self) -> u32 {
        self.params.map_or(0, |p| p.delay_ms())
    }
}

/// Decoded Generic OnOff Status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMessage {
    pub present: bool,
    /// Embedded sender address (source-address extension only).
    pub source: Option<u16>,
    /// `(target, remaining)` while a transition is outstanding.
    pub target: Option<(bool, TransitionTime)>,
}

impl StatusMessage {
    pub fn decode(payload: &[u8], layout: Layout) -> Result<Self, DecodeError> {
        let base = 1 + layout.source_len();
        if payload.len() < base {
            return Err(DecodeError::TooShort {
                expected: base,
                actual: payload.len(),
            });
        }
        if payload.len() != base && payload.len() != base + 2 {
            return Err(DecodeError::BadLength(payload.len()));
        }

        let present = decode_onoff(payload[0])?;
        let source = layout
            .with_source
            .then(|| u16::from_le_bytes([payload[1], payload[2]]));
        let target = if payload.len() == base + 2 {
            Some((
                decode_onoff(payload[base])?,
                TransitionTime::decode(payload[base + 1]),
            ))
        } else {
            None
        };

        Ok(Self {
            present,
            source,
            target,
        })
    }

    /// Encode for `layout`.  The reply shape is distinguished by length
    /// only: no target means the short form.
    pub fn encode(&self, layout: Layout) -> Payload {
        let mut out = Payload::new();
        let _ = out.push(self.present as u8);
        if layout.with_source {
            let _ = out.extend_from_slice(&self.source.unwrap_or(0).to_le_bytes());
        }
        if let Some((target, remaining)) = self.target {
            let _ = out.push(target as u8);
            let _ = out.push(remaining.encode());
        }
        out
    }
}

fn decode_onoff(raw: u8) -> Result<bool, DecodeError> {
    match raw {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(DecodeError::InvalidValue(other)),
    }
}

/// Display helper matching the log format used throughout the firmware.
pub fn onoff_str(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}
