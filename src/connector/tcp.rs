//! TCP connector: one peer, length-prefixed protobuf frames.
//!
//! DESIGN
//! ======
//! Socket I/O runs on a tokio task; the connector itself is driven from the
//! scene thread. Two unbounded channels bridge the two sides: pushes go in
//! through `outgoing`, received frames come out through `incoming` and wait
//! there until `poll()`.
//!
//! Each frame on the socket is a big-endian `u32` byte length followed by
//! the protobuf-encoded frame. A frame that fails to decode is skipped; a
//! length above [`MAX_FRAME_BYTES`] ends the link.

#[cfg(test)]
#[path = "tcp_test.rs"]
mod tests;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use frames::{Frame, decode_frame, encode_frame};
use scene::ObjectId;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{ConnectionStatus, Connector, ConnectorCore, ConnectorError, Lifecycle, Role};

/// Largest accepted frame on the socket.
pub const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
enum LinkError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame of {0} bytes exceeds limit")]
    TooLarge(usize),
}

struct Link {
    task: JoinHandle<()>,
    outgoing: mpsc::UnboundedSender<Frame>,
    incoming: mpsc::UnboundedReceiver<Frame>,
    connected: Arc<AtomicBool>,
    local_addr: Option<SocketAddr>,
}

pub struct TcpConnector {
    core: ConnectorCore,
    runtime: Handle,
    link: Option<Link>,
}

impl TcpConnector {
    /// Create an unconfigured connector whose socket tasks run on `runtime`.
    #[must_use]
    pub fn new(runtime: Handle) -> Self {
        Self { core: ConnectorCore::default(), runtime, link: None }
    }

    /// Bound address of a started server.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.link.as_ref().and_then(|link| link.local_addr)
    }
}

impl Connector for TcpConnector {
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
        match &self.link {
            None => ConnectionStatus::Off,
            Some(link) if link.connected.load(Ordering::Acquire) => ConnectionStatus::On,
            Some(link) if link.task.is_finished() => ConnectionStatus::Off,
            Some(_) => ConnectionStatus::Waiting,
        }
    }

    fn start(&mut self) -> Result<(), ConnectorError> {
        let role = self.core.startable_role()?;
        if self.core.is_started() {
            return Ok(());
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));

        let (task, local_addr) = match &role {
            Role::Server { port } => {
                let port = *port;
                let listener = std::net::TcpListener::bind(("0.0.0.0", port))
                    .and_then(|listener| listener.set_nonblocking(true).map(|()| listener))
                    .map_err(|source| ConnectorError::Bind { port, source })?;
                let local_addr = listener.local_addr().map_err(|source| ConnectorError::Bind { port, source })?;
                let task = self.runtime.spawn(serve(listener, out_rx, in_tx, Arc::clone(&connected)));
                (task, Some(local_addr))
            }
            Role::Client { host, port } => {
                let task = self
                    .runtime
                    .spawn(connect(host.clone(), *port, out_rx, in_tx, Arc::clone(&connected)));
                (task, None)
            }
        };

        self.link = Some(Link { task, outgoing: out_tx, incoming: in_rx, connected, local_addr });
        self.core.set_started(true);
        info!(%role, "connector: started");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(link) = self.link.take() {
            link.task.abort();
            link.connected.store(false, Ordering::Release);
            info!("connector: stopped");
        }
        self.core.set_started(false);
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
            debug!(name = %frame.device_name, "connector: not connected, frame dropped");
            return false;
        }
        self.link.as_ref().is_some_and(|link| link.outgoing.send(frame).is_ok())
    }

    fn poll(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        if let Some(link) = self.link.as_mut() {
            while let Ok(frame) = link.incoming.try_recv() {
                frames.push(frame);
            }
        }
        frames
    }
}

impl Drop for TcpConnector {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            link.task.abort();
        }
    }
}

// =============================================================================
// SOCKET TASKS
// =============================================================================

async fn serve(
    listener: std::net::TcpListener,
    out_rx: mpsc::UnboundedReceiver<Frame>,
    in_tx: mpsc::UnboundedSender<Frame>,
    connected: Arc<AtomicBool>,
) {
    let listener = match TcpListener::from_std(listener) {
        Ok(listener) => listener,
        Err(e) => {
            warn!(error = %e, "connector: listener setup failed");
            return;
        }
    };
    match listener.accept().await {
        Ok((stream, peer)) => {
            info!(%peer, "connector: peer connected");
            run_link(stream, out_rx, in_tx, connected).await;
        }
        Err(e) => warn!(error = %e, "connector: accept failed"),
    }
}

async fn connect(
    host: String,
    port: u16,
    out_rx: mpsc::UnboundedReceiver<Frame>,
    in_tx: mpsc::UnboundedSender<Frame>,
    connected: Arc<AtomicBool>,
) {
    match TcpStream::connect((host.as_str(), port)).await {
        Ok(stream) => {
            info!(%host, port, "connector: connected to server");
            run_link(stream, out_rx, in_tx, connected).await;
        }
        Err(e) => warn!(%host, port, error = %e, "connector: connect failed"),
    }
}

async fn run_link(
    stream: TcpStream,
    mut out_rx: mpsc::UnboundedReceiver<Frame>,
    in_tx: mpsc::UnboundedSender<Frame>,
    connected: Arc<AtomicBool>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "connector: set_nodelay failed");
    }
    let (reader, writer) = stream.into_split();
    connected.store(true, Ordering::Release);

    let result = tokio::select! {
        r = read_loop(reader, &in_tx) => r,
        w = write_loop(writer, &mut out_rx) => w,
    };

    connected.store(false, Ordering::Release);
    match result {
        Ok(()) => info!("connector: link closed"),
        Err(e) => warn!(error = %e, "connector: link failed"),
    }
}

async fn read_loop(mut reader: OwnedReadHalf, in_tx: &mpsc::UnboundedSender<Frame>) -> Result<(), LinkError> {
    loop {
        let len = match reader.read_u32().await {
            Ok(len) => len,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if len > MAX_FRAME_BYTES {
            return Err(LinkError::TooLarge(len as usize));
        }
        let mut buf = vec![0u8; len as usize];
        reader.read_exact(&mut buf).await?;
        match decode_frame(&buf) {
            Ok(frame) => {
                if in_tx.send(frame).is_err() {
                    return Ok(());
                }
            }
            Err(e) => warn!(error = %e, "connector: undecodable frame skipped"),
        }
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    out_rx: &mut mpsc::UnboundedReceiver<Frame>,
) -> Result<(), LinkError> {
    while let Some(frame) = out_rx.recv().await {
        let bytes = encode_frame(&frame);
        let len = u32::try_from(bytes.len()).map_err(|_| LinkError::TooLarge(bytes.len()))?;
        if len > MAX_FRAME_BYTES {
            return Err(LinkError::TooLarge(bytes.len()));
        }
        writer.write_u32(len).await?;
        writer.write_all(&bytes).await?;
    }
    Ok(())
}
