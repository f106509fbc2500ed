//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production) or to
//! `env_logger` in the host simulator.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::model::message::onoff_str;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { value } => {
                info!("START | output={}", onoff_str(*value));
            }
            AppEvent::OutputChanged(on) => {
                info!("ONOFF | output={}", onoff_str(*on));
            }
            AppEvent::SetAccepted { value, tid, src, transition, delay_ms } => {
                info!(
                    "ONOFF | set={} tid={} src=0x{:04x} | transition={} delay={}ms",
                    onoff_str(*value),
                    tid,
                    src,
                    transition,
                    delay_ms,
                );
            }
            AppEvent::SetIgnored { src, tid, outcome } => {
                info!("ONOFF | ignored tid={} src=0x{:04x} | {:?}", tid, src, outcome);
            }
            AppEvent::StatusReceived { src, status } => match status.target {
                Some((target, remaining)) => info!(
                    "ONOFF | status src=0x{:04x} | {} -> {} ({})",
                    src,
                    onoff_str(status.present),
                    onoff_str(target),
                    remaining,
                ),
                None => info!("ONOFF | status src=0x{:04x} | {}", src, onoff_str(status.present)),
            },
            AppEvent::SetSent { value, tid } => {
                info!("SEND  | set_unack={} tid={}", onoff_str(*value), tid);
            }
            AppEvent::Provisioned { address } => {
                info!("PROV  | provisioned addr=0x{:04x}", address);
            }
            AppEvent::Restored { address } => {
                info!("PROV  | restored addr=0x{:04x}", address);
            }
            AppEvent::ProvisioningFailed(e) => {
                warn!("PROV  | failed: {}", e);
            }
            AppEvent::SendFailed(e) => {
                warn!("SEND  | failed: {}", e);
            }
            AppEvent::Unprovisioned => {
                info!("PROV  | reset, unprovisioned");
            }
            AppEvent::Attention(on) => {
                info!("HLTH  | attention {}", onoff_str(*on));
            }
            AppEvent::OobNumber(number) => {
                info!("PROV  | OOB Number: {}", number);
            }
        }
    }
}
