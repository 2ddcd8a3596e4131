//! In-process connector pair.
//!
//! Two ends share a pair of unbounded channels. A frame pushed on one end is
//! delivered to the other only while both ends are started, which mirrors a
//! TCP link where nothing flows until both sides are up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use frames::Frame;
use scene::ObjectId;
use tokio::sync::mpsc;
use tracing::debug;

use super::{ConnectionStatus, Connector, ConnectorCore, ConnectorError, DEFAULT_PORT, Lifecycle, Role};

pub struct LoopbackConnector {
    core: ConnectorCore,
    tx: mpsc::UnboundedSender<Frame>,
    rx: mpsc::UnboundedReceiver<Frame>,
    started: Arc<AtomicBool>,
    peer_started: Arc<AtomicBool>,
}

impl LoopbackConnector {
    /// Create two linked ends, configured as server and client.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        let a_started = Arc::new(AtomicBool::new(false));
        let b_started = Arc::new(AtomicBool::new(false));
        let server = Self {
            core: ConnectorCore::with_role(Role::Server { port: DEFAULT_PORT }),
            tx: a_tx,
            rx: a_rx,
            started: Arc::clone(&a_started),
            peer_started: Arc::clone(&b_started),
        };
        let client = Self {
            core: ConnectorCore::with_role(Role::Client { host: "loopback".into(), port: DEFAULT_PORT }),
            tx: b_tx,
            rx: b_rx,
            started: b_started,
            peer_started: a_started,
        };
        (server, client)
    }

    fn discard_pending(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }
}

impl Connector for LoopbackConnector {
    fn configure(&mut self, role: Role) -> Result<(), ConnectorError> {
        self.core.configure(role)
    }

    fn role(&self) -> Option<&Role> {
        self.core.role()
    }

    fn lifecycle(&self) -> Lifecycle {
        self.core.lifecycle()
    }

    fn status(&self) -> ConnectionStatus {
        match (self.started.load(Ordering::Acquire), self.peer_started.load(Ordering::Acquire)) {
            (false, _) => ConnectionStatus::Off,
            (true, false) => ConnectionStatus::Waiting,
            (true, true) => ConnectionStatus::On,
        }
    }

    fn start(&mut self) -> Result<(), ConnectorError> {
        let role = self.core.startable_role()?;
        if self.core.is_started() {
            return Ok(());
        }
        self.core.set_started(true);
        self.started.store(true, Ordering::Release);
        debug!(%role, "connector: loopback started");
        Ok(())
    }

    fn stop(&mut self) {
        if !self.core.is_started() {
            return;
        }
        self.core.set_started(false);
        self.started.store(false, Ordering::Release);
        self.discard_pending();
        debug!("connector: loopback stopped");
    }

    fn register_outgoing(&mut self, id: ObjectId) {
        self.core.register(id);
    }

    fn unregister_outgoing(&mut self, id: ObjectId) {
        self.core.unregister(id);
    }

    fn is_outgoing(&self, id: ObjectId) -> bool {
        self.core.is_outgoing(id)
    }

    fn push(&mut self, id: ObjectId, frame: Frame) -> bool {
        if !self.core.is_outgoing(id) {
            debug!(%id, name = %frame.device_name, "connector: object not outgoing, frame refused");
            return false;
        }
        if self.status() != ConnectionStatus::On {
            debug!(name = %frame.device_name, "connector: no peer, frame dropped");
            return false;
        }
        self.tx.send(frame).is_ok()
    }

    fn poll(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            frames.push(frame);
        }
        if !self.core.is_started() {
            frames.clear();
        }
        frames
    }
}
