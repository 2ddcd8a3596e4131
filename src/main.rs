//! Demo host: an in-memory scene mirrored to one peer over TCP.
//!
//! Reads commands from stdin; anything that is not a command is sent as a
//! chat line. Received chat lines are printed as they arrive.
//!
//! | Command         | Effect                                        |
//! |-----------------|-----------------------------------------------|
//! | `/mesh NAME`    | create a triangle mesh                        |
//! | `/sync NAME`    | add the named object to the session           |
//! | `/unsync NAME`  | remove the named object from the session      |
//! | `/scene`        | print visible objects as JSON                 |
//! | `/history`      | print the chat history as JSON                |
//! | `/status`       | print the connection status                   |
//! | `/quit`         | tear down and exit                            |

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use scene::{Geometry, ObjectKind, Provenance, Scene, SceneObject};
use scenesync::config::{HOST_VAR, NAME_VAR, PORT_VAR, ROLE_VAR};
use scenesync::{
    Chat, Collaboration, ConfigError, Connector, ConnectorConfig, ConnectorError, ErrorCode, Session, TcpConnector,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
enum HostError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Connector(#[from] ConnectorError),
    #[error("stdin failed: {0}")]
    Stdin(#[from] std::io::Error),
    #[error("session {0} disappeared")]
    SessionGone(Uuid),
}

impl ErrorCode for HostError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.error_code(),
            Self::Connector(e) => e.error_code(),
            Self::Stdin(_) => "E_STDIN",
            Self::SessionGone(_) => "E_SESSION_GONE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Connector(e) if e.retryable())
    }
}

#[derive(Parser, Debug)]
#[command(name = "scenesync", about = "Mirror an in-memory scene with a collaborating peer")]
struct Cli {
    /// `server` or `client`.
    #[arg(long, env = "SCENESYNC_ROLE")]
    role: Option<String>,

    #[arg(long, env = "SCENESYNC_HOST")]
    host: Option<String>,

    #[arg(long, env = "SCENESYNC_PORT")]
    port: Option<String>,

    #[arg(long, env = "SCENESYNC_NAME")]
    name: Option<String>,

    /// Pump interval in milliseconds.
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,
}

impl Cli {
    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            ROLE_VAR => self.role.clone(),
            HOST_VAR => self.host.clone(),
            PORT_VAR => self.port.clone(),
            NAME_VAR => self.name.clone(),
            _ => None,
        }
    }
}

struct Host {
    scene: Scene,
    collab: Collaboration,
    session_id: Uuid,
    chat: Chat,
}

impl Host {
    fn session(&mut self) -> Result<&mut Session, HostError> {
        self.collab.session_mut(self.session_id).ok_or(HostError::SessionGone(self.session_id))
    }

    /// Handle one stdin line. Returns `false` to exit.
    fn handle_line(&mut self, line: &str) -> Result<bool, HostError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(true);
        }
        let (command, arg) = line.split_once(' ').map_or((line, ""), |(c, a)| (c, a.trim()));
        match command {
            "/quit" => return Ok(false),
            "/status" => {
                let status = self.session()?.connector().map(Connector::status);
                println!("{status:?}");
            }
            "/scene" => {
                let visible: Vec<&SceneObject> = self.scene.visible_objects().collect();
                match serde_json::to_string_pretty(&visible) {
                    Ok(json) => println!("{json}"),
                    Err(e) => warn!(error = %e, "host: scene dump failed"),
                }
            }
            "/history" => match serde_json::to_string_pretty(self.chat.history()) {
                Ok(json) => println!("{json}"),
                Err(e) => warn!(error = %e, "host: history dump failed"),
            },
            "/mesh" if !arg.is_empty() => {
                let id = self.scene.create_object(ObjectKind::Mesh, arg, Provenance::Local);
                let geometry = Geometry {
                    points: vec![[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0]],
                    polygons: vec![vec![0, 1, 2]],
                };
                self.scene.set_geometry(id, geometry, Provenance::Local);
                info!(name = arg, %id, "host: mesh created");
            }
            "/sync" | "/unsync" if !arg.is_empty() => {
                let Some(id) = self.scene.get_by_name(arg).map(|obj| obj.id) else {
                    println!("no object named {arg}");
                    return Ok(true);
                };
                let Self { scene, collab, session_id, .. } = self;
                let session = collab.session_mut(*session_id).ok_or(HostError::SessionGone(*session_id))?;
                if command == "/unsync" {
                    session.remove_from_sync(scene, id);
                } else if let Err(e) = session.add_to_sync(scene, id) {
                    warn!(code = e.error_code(), error = %e, "host: sync failed");
                }
            }
            _ if command.starts_with('/') => println!("unknown command {command}"),
            _ => {
                let Self { scene, collab, session_id, chat } = self;
                let session = collab.session_mut(*session_id).ok_or(HostError::SessionGone(*session_id))?;
                match chat.send(scene, session, line) {
                    Ok(sent) => println!("{sent}"),
                    Err(e) => warn!(code = e.error_code(), error = %e, "host: chat send failed"),
                }
            }
        }
        Ok(true)
    }

    fn tick(&mut self) {
        let report = self.collab.pump(&mut self.scene);
        if report.connected_sessions > 0 {
            info!(frames = report.frames_pushed, "host: peer connected");
        }
        for line in self.chat.observe(&self.scene, &report.events) {
            println!("{line}");
        }
    }
}

async fn run(cli: Cli) -> Result<(), HostError> {
    let config = ConnectorConfig::from_lookup(|key| cli.lookup(key))?;

    let mut collab = Collaboration::new();
    let session_id = collab.create_session(config.name.as_str());
    let mut host = Host { scene: Scene::new(), collab, session_id, chat: Chat::new(config.chat_name()) };

    let connector = host.session()?.connector_or_insert_with(|| Box::new(TcpConnector::new(Handle::current())));
    connector.configure(config.role.clone())?;
    connector.start()?;
    info!(role = %config.role, name = %config.name, "scenesync: started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_millis(cli.tick_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !host.handle_line(&line)? {
                    break;
                }
            }
            _ = ticker.tick() => host.tick(),
        }
    }

    host.collab.shutdown(&mut host.scene);
    info!("scenesync: stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.error_code(), retryable = e.retryable(), error = %e, "scenesync: exiting");
            ExitCode::FAILURE
        }
    }
}
