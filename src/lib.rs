//! Scene synchronization bridge between two collaborating instances.
//!
//! A [`Session`] mirrors a chosen set of scene objects to a peer over a
//! [`Connector`]. Objects travel as one of three native payloads; whatever
//! those cannot carry rides along as an attribute record in a hidden
//! free-text shadow object.
//!
//! | Module          | Responsibility                                       |
//! |-----------------|------------------------------------------------------|
//! | `codec`         | Object to frame and frame to object                  |
//! | `record`        | Single-tag attribute record text                     |
//! | `shadow`        | Record classes, shadow naming, style/annotation data |
//! | `references`    | Owner/shadow links, transform mappings               |
//! | `resolve`       | Incoming name to local object                        |
//! | `connector`     | Connector trait, loopback and TCP endpoints          |
//! | `session`       | Synchronization set, push and receive                |
//! | `collaboration` | Session registry and the per-tick pump               |
//! | `chat`          | Plain-text messages over a session                   |
//! | `config`        | Connector configuration from the environment         |
//! | `error`         | Grepable error codes                                 |

pub mod chat;
pub mod codec;
pub mod collaboration;
pub mod config;
pub mod connector;
pub mod error;
pub mod record;
pub mod references;
pub mod resolve;
pub mod session;
pub mod shadow;

pub use chat::{Chat, ChatLine, Direction};
pub use collaboration::{Collaboration, PumpReport};
pub use config::{ConfigError, ConnectorConfig};
pub use connector::{ConnectionStatus, Connector, ConnectorError, Lifecycle, LoopbackConnector, Role, TcpConnector};
pub use error::ErrorCode;
pub use session::{Session, SyncError};
