//! Network endpoints that move frames between two scene instances.
//!
//! DESIGN
//! ======
//! A connector is configured with a [`Role`], started, and stopped. Inbound
//! frames queue inside the connector until the scene thread drains them with
//! [`Connector::poll`]; outbound frames are handed over with
//! [`Connector::push`] and never waited on.
//!
//! Only objects registered as outgoing may be pushed. A frame for any other
//! object is refused, so a session cannot leak objects it does not mirror.
//!
//! LIFECYCLE
//! =========
//! 1. `Unconfigured` → `configure(role)` → `Configured`
//! 2. `start()` → `Started` (exchanges frames once a peer is present)
//! 3. `stop()` → `Configured` (idempotent, reconfigurable)
//!
//! | Implementation      | Transport                                  |
//! |---------------------|--------------------------------------------|
//! | `LoopbackConnector` | in-process channel pair                    |
//! | `TcpConnector`      | length-prefixed protobuf frames over TCP   |

pub mod loopback;
pub mod tcp;

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

use std::collections::HashSet;
use std::fmt;

use frames::Frame;
use scene::ObjectId;

use crate::error::ErrorCode;

pub use loopback::LoopbackConnector;
pub use tcp::TcpConnector;

/// Default port for both roles.
pub const DEFAULT_PORT: u16 = 18944;

/// Which end of the link this connector plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Listen on `port` and accept one peer.
    Server { port: u16 },
    /// Connect to `host:port`.
    Client { host: String, port: u16 },
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server { port } => write!(f, "server:{port}"),
            Self::Client { host, port } => write!(f, "client:{host}:{port}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Unconfigured,
    Configured,
    Started,
}

/// Link status as seen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Not started, or the link has ended.
    Off,
    /// Started but no peer yet.
    Waiting,
    /// Exchanging frames with a peer.
    On,
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("connector has no role; configure it as server or client first")]
    Unconfigured,
    #[error("connector is started; stop it before reconfiguring")]
    Busy,
    #[error("failed to listen on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

impl ErrorCode for ConnectorError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Unconfigured => "E_CONNECTOR_UNCONFIGURED",
            Self::Busy => "E_CONNECTOR_BUSY",
            Self::Bind { .. } => "E_CONNECTOR_BIND",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Bind { .. })
    }
}

/// One network endpoint.
pub trait Connector: Send {
    /// Set the role. Fails while started.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Busy`] when the connector is started.
    fn configure(&mut self, role: Role) -> Result<(), ConnectorError>;

    fn role(&self) -> Option<&Role>;

    fn lifecycle(&self) -> Lifecycle;

    fn status(&self) -> ConnectionStatus;

    /// Begin exchanging frames. Starting a started connector is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::Unconfigured`] without a role, or a
    /// transport error when the endpoint cannot be opened.
    fn start(&mut self) -> Result<(), ConnectorError>;

    /// End delivery. Idempotent.
    fn stop(&mut self);

    /// Allow frames for `id` to be pushed.
    fn register_outgoing(&mut self, id: ObjectId);

    fn unregister_outgoing(&mut self, id: ObjectId);

    fn is_outgoing(&self, id: ObjectId) -> bool;

    /// Hand the frame of object `id` to the transport. Returns `false` when
    /// it was dropped: `id` is not registered as outgoing, or there is no
    /// live link.
    fn push(&mut self, id: ObjectId, frame: Frame) -> bool;

    /// Take every frame received since the last poll.
    fn poll(&mut self) -> Vec<Frame>;
}

/// Bookkeeping shared by connector implementations.
#[derive(Debug, Default)]
pub(crate) struct ConnectorCore {
    role: Option<Role>,
    started: bool,
    outgoing: HashSet<ObjectId>,
}

impl ConnectorCore {
    pub(crate) fn with_role(role: Role) -> Self {
        Self { role: Some(role), ..Self::default() }
    }

    pub(crate) fn configure(&mut self, role: Role) -> Result<(), ConnectorError> {
        if self.started {
            return Err(ConnectorError::Busy);
        }
        self.role = Some(role);
        Ok(())
    }

    pub(crate) fn role(&self) -> Option<&Role> {
        self.role.as_ref()
    }

    /// Role required to start.
    pub(crate) fn startable_role(&self) -> Result<Role, ConnectorError> {
        self.role.clone().ok_or(ConnectorError::Unconfigured)
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        match (&self.role, self.started) {
            (_, true) => Lifecycle::Started,
            (Some(_), false) => Lifecycle::Configured,
            (None, false) => Lifecycle::Unconfigured,
        }
    }

    pub(crate) fn is_started(&self) -> bool {
        self.started
    }

    pub(crate) fn set_started(&mut self, started: bool) {
        self.started = started;
    }

    pub(crate) fn register(&mut self, id: ObjectId) {
        self.outgoing.insert(id);
    }

    pub(crate) fn unregister(&mut self, id: ObjectId) {
        self.outgoing.remove(&id);
    }

    pub(crate) fn is_outgoing(&self, id: ObjectId) -> bool {
        self.outgoing.contains(&id)
    }
}
