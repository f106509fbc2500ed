//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements         | Connects to                     |
//! |-----------------|--------------------|---------------------------------|
//! | `loopback_mesh` | MeshTransport      | In-process mesh stack + outbox  |
//! | `output`        | OutputPort         | Any `embedded-hal` OutputPin    |
//! | `device_id`     | UniqueIdPort       | ESP32 eFuse MAC                 |
//! | `time`          | Clock              | ESP32 system timer              |
//! | `log_sink`      | EventSink          | Serial log output               |
//! | `nvs`           | ConfigPort         | NVS / in-memory store           |
//! |                 | StoragePort        |                                 |
//! | `console`       | -                  | Simulator stdin (host only)     |

#[cfg(not(target_os = "espidf"))]
pub mod console;
pub mod device_id;
pub mod log_sink;
pub mod loopback_mesh;
pub mod nvs;
pub mod output;
pub mod time;
