//! meshswitch firmware: main entry point.
//!
//! Hexagonal architecture with a single-consumer event loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  LoopbackMesh     PinOutput<GpioLed>  NvsAdapter  Esp32Time    │
//! │  (MeshTransport)  (OutputPort)        (Config+NVS) (Clock)     │
//! │  MacUniqueId      LogEventSink        ButtonDriver             │
//! │  (UniqueIdPort)   (EventSink)         (ISR debounce)           │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              NodeService (pure logic)                  │    │
//! │  │  OnOff Server · OnOff Client · Provisioning            │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Mailbox (embassy-sync channel) · OneShotTimer deadline        │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! On the host the same loop runs as a simulator; see
//! [`adapters::console`](meshswitch::adapters::console) for its commands.
#![deny(unused_must_use)]

use anyhow::Result;
use log::{info, warn};

use meshswitch::adapters::device_id::{self, MacUniqueId};
use meshswitch::adapters::log_sink::LogEventSink;
use meshswitch::adapters::loopback_mesh::LoopbackMesh;
use meshswitch::adapters::nvs::NvsAdapter;
use meshswitch::adapters::output::PinOutput;
use meshswitch::adapters::time::Esp32TimeAdapter;
use meshswitch::app::ports::{Clock, ConfigPort};
use meshswitch::app::provisioning::DeviceIdentity;
use meshswitch::app::service::NodeService;
use meshswitch::config::NodeConfig;
use meshswitch::drivers::button::{ButtonDriver, ButtonEvent};
use meshswitch::drivers::led::GpioLed;
use meshswitch::events::{NODE_MAILBOX, NodeEvent};
use meshswitch::{drivers, pins};

fn main() -> Result<()> {
    // ── 1. Runtime bootstrap ──────────────────────────────────
    init_logging()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  meshswitch v{}                    ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 1b. Initialise hardware peripherals ───────────────────
    drivers::hw_init::init_peripherals()?;
    if let Err(e) = drivers::hw_init::init_isr_service() {
        log::error!("ISR service init failed: {}, button disabled", e);
    }

    // ── 2. Storage and config ─────────────────────────────────
    let mut nvs = open_storage()?;
    let config = load_config(&nvs);

    // ── 3. Identity ───────────────────────────────────────────
    match device_id::read_mac() {
        Ok(mac) => info!("Hostname: {}", device_id::hostname(&mac)),
        Err(e) => warn!("MAC unavailable ({})", e),
    }
    let identity = DeviceIdentity::read(&mut MacUniqueId::new());

    // ── 4. Adapters ───────────────────────────────────────────
    let clock = Esp32TimeAdapter::new();
    let mut led = PinOutput::new(GpioLed::new(pins::LED_GPIO));
    let mut sink = LogEventSink::new();
    let mut button = ButtonDriver::new(pins::BUTTON_GPIO, config.button_debounce_ms);
    let mut mesh = LoopbackMesh::load(&nvs);
    mesh.set_device_uuid(identity.uuid);
    let mailbox = &NODE_MAILBOX;

    // ── 5. Node service ───────────────────────────────────────
    let mut node = NodeService::new(&config, identity);
    node.start(&mut led, &mut sink);
    mesh.announce_ready(mailbox);

    #[cfg(not(target_os = "espidf"))]
    let mut console = sim::Console::spawn();

    info!("Node ready. Entering event loop.");

    // ── 6. Event loop ─────────────────────────────────────────
    loop {
        let now = clock.uptime_ms();

        if let Some(ButtonEvent::Pressed) = button.tick(now as u32) {
            mailbox.post(NodeEvent::ButtonPressed);
        }

        #[cfg(not(target_os = "espidf"))]
        if console.poll(now, &config, &mut node, &mut mesh, &mut sink) == sim::Flow::Quit {
            break;
        }

        node.step(mailbox, now, &mut mesh, &mut led, &mut sink);

        // Looped-back frames are handled on the next pass.
        mesh.deliver(mailbox);

        if let Err(e) = mesh.persist(&mut nvs) {
            warn!("mesh: persisting provisioning record failed: {}", e);
        }

        let mut sleep_ms = u64::from(config.idle_poll_ms);
        if let Some(deadline) = node.next_deadline() {
            sleep_ms = sleep_ms.min(deadline.saturating_sub(clock.uptime_ms()));
        }
        if mailbox.is_empty() && sleep_ms > 0 {
            std::thread::sleep(std::time::Duration::from_millis(sleep_ms));
        }
    }

    info!("Event loop stopped");
    Ok(())
}

fn init_logging() -> Result<()> {
    #[cfg(target_os = "espidf")]
    {
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;
    }

    #[cfg(not(target_os = "espidf"))]
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    Ok(())
}

fn open_storage() -> Result<NvsAdapter> {
    #[cfg(not(target_os = "espidf"))]
    if let Ok(path) = std::env::var("MESHSWITCH_STATE") {
        return Ok(NvsAdapter::open_file(path)?);
    }
    Ok(NvsAdapter::new()?)
}

fn load_config(nvs: &NvsAdapter) -> NodeConfig {
    #[cfg(not(target_os = "espidf"))]
    if let Ok(path) = std::env::var("MESHSWITCH_CONFIG") {
        match std::fs::read_to_string(&path) {
            Ok(text) => match NodeConfig::from_json(&text) {
                Ok(cfg) => {
                    info!("Config loaded from {}", path);
                    return cfg;
                }
                Err(e) => warn!("Config file {} rejected ({}), falling back", path, e),
            },
            Err(e) => warn!("Config file {} unreadable ({}), falling back", path, e),
        }
    }

    match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            NodeConfig::default()
        }
    }
}

// ── Host simulator console ────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod sim {
    use std::io::BufRead;
    use std::sync::mpsc::{self, Receiver, TryRecvError};

    use log::{info, warn};

    use meshswitch::adapters::console::{ConsoleCommand, parse_line};
    use meshswitch::adapters::log_sink::LogEventSink;
    use meshswitch::adapters::loopback_mesh::{LoopbackMesh, MAX_PDU};
    use meshswitch::app::commands::NodeCommand;
    use meshswitch::app::service::NodeService;
    use meshswitch::config::NodeConfig;
    use meshswitch::drivers::button::button_isr_handler;
    use meshswitch::events::NODE_MAILBOX;
    use meshswitch::model::message::{DELAY_UNIT_MS, SetMessage, TransitionParams, onoff_str};
    use meshswitch::model::opcode::{Opcode, encode_access};
    use meshswitch::model::transition::TransitionTime;
    use meshswitch::model::{ADDR_ALL_NODES, APP_KEY_INDEX};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Flow {
        Continue,
        Quit,
    }

    pub struct Console {
        lines: Receiver<String>,
        remote_tid: u8,
    }

    impl Console {
        /// Read stdin on a helper thread so the event loop never blocks.
        pub fn spawn() -> Self {
            let (tx, rx) = mpsc::channel();
            std::thread::spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });
            info!("console: type 'press', 'set on', 'get 0x0001', 'show' or 'quit'");
            Self { lines: rx, remote_tid: 0 }
        }

        pub fn poll(
            &mut self,
            now: u64,
            config: &NodeConfig,
            node: &mut NodeService,
            mesh: &mut LoopbackMesh,
            sink: &mut LogEventSink,
        ) -> Flow {
            loop {
                let line = match self.lines.try_recv() {
                    Ok(line) => line,
                    Err(TryRecvError::Empty) => return Flow::Continue,
                    // stdin closed: keep running headless.
                    Err(TryRecvError::Disconnected) => return Flow::Continue,
                };
                if line.trim().is_empty() {
                    continue;
                }
                let cmd = match parse_line(&line) {
                    Ok(cmd) => cmd,
                    Err(e) => {
                        warn!("console: {}", e);
                        continue;
                    }
                };
                if self.execute(cmd, now, config, node, mesh, sink) == Flow::Quit {
                    return Flow::Quit;
                }
            }
        }

        fn execute(
            &mut self,
            cmd: ConsoleCommand,
            now: u64,
            config: &NodeConfig,
            node: &mut NodeService,
            mesh: &mut LoopbackMesh,
            sink: &mut LogEventSink,
        ) -> Flow {
            let mailbox = &NODE_MAILBOX;
            match cmd {
                ConsoleCommand::Press => button_isr_handler(now as u32),
                ConsoleCommand::RemoteSet { value, src, ack, transition_ms, delay_ms } => {
                    let params = (transition_ms.is_some() || delay_ms > 0).then(|| TransitionParams {
                        transition: TransitionTime::Millis(transition_ms.unwrap_or(0)),
                        delay: (delay_ms / DELAY_UNIT_MS).min(u32::from(u8::MAX)) as u8,
                    });
                    let set = SetMessage {
                        value,
                        tid: self.remote_tid,
                        source: Some(src),
                        params,
                    };
                    self.remote_tid = self.remote_tid.wrapping_add(1);
                    let opcode = if ack { Opcode::Set } else { Opcode::SetUnacknowledged };
                    let mut pdu = [0u8; MAX_PDU];
                    let payload = set.encode(config.layout());
                    let Some(len) = encode_access(opcode.value(), &payload, &mut pdu) else {
                        return Flow::Continue;
                    };
                    let dst = node.address().unwrap_or(ADDR_ALL_NODES);
                    if !mesh.inject(mailbox, src, dst, APP_KEY_INDEX, &pdu[..len]) {
                        warn!("console: node cannot receive yet (unprovisioned?)");
                    }
                }
                ConsoleCommand::Query { dst } => {
                    node.handle_command(NodeCommand::QueryStatus { dst }, now, mesh, sink);
                }
                ConsoleCommand::Assist { address } => {
                    if let Err(e) =
                        mesh.provision_external(mailbox, &config.net_key, &config.app_key, address)
                    {
                        warn!("console: external provisioning failed: {}", e);
                    }
                }
                ConsoleCommand::Reset => {
                    node.handle_command(NodeCommand::FactoryReset, now, mesh, sink);
                }
                ConsoleCommand::Show => {
                    let state = node.server().state();
                    info!(
                        "node: addr={} bound={} value={} present={} phase={:?}",
                        node.address().map_or("-".to_string(), |a| format!("0x{:04x}", a)),
                        node.is_bound(),
                        onoff_str(state.value),
                        onoff_str(state.present()),
                        state.phase(),
                    );
                }
                ConsoleCommand::Quit => return Flow::Quit,
            }
            Flow::Continue
        }
    }
}
