//! Inbound commands to the node service.
//!
//! These represent actions requested by a local operator (serial console,
//! simulator stdin) that the [`NodeService`](super::service::NodeService)
//! interprets and acts upon.  Mesh traffic does not come through here; it
//! arrives as [`NodeEvent`](crate::events::NodeEvent)s.

/// Commands that local adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCommand {
    /// Same as a button press: provision if needed, otherwise toggle.
    Toggle,

    /// Ask `dst` for its OnOff state through the client model.
    QueryStatus { dst: u16 },

    /// Wipe provisioning data and unbind both models.
    FactoryReset,
}
