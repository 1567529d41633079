//! Replica side of the replication handshake.
//!
//! A replica connects to its master and walks a fixed sequence:
//!
//! ```text
//! Disconnected -> Connected -> PingSent -> AwaitPong -> ReplconfSent
//!     -> PsyncSent -> AwaitFullresync -> Synced
//! ```
//!
//! The stage only moves forward once the step it names has succeeded, so a
//! handshake that fails stays in the stage where it broke off. Failures are
//! not retried.

use bytes::Bytes;
use thiserror::Error;
use tokio::{
    io::{self, AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tracing::{debug, info, warn};

use crate::{
    input::{CommandReadError, RespStream},
    rdb,
    resp::RespValue,
    server::MasterAddress,
};

/// Capability announced to the master with `REPLCONF capa`.
pub const REPLICA_CAPABILITY: &str = "psync2";

const REPL_ID_LENGTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    Disconnected,
    Connected,
    PingSent,
    AwaitPong,
    ReplconfSent,
    PsyncSent,
    AwaitFullresync,
    Synced,
}

#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("failed to connect to master at {address}: {source}")]
    Connect { address: String, source: io::Error },
    #[error("failed to write to master during {stage:?}: {source}")]
    Io {
        stage: HandshakeStage,
        source: io::Error,
    },
    #[error("failed to read from master during {stage:?}: {source}")]
    Read {
        stage: HandshakeStage,
        source: CommandReadError,
    },
    #[error("unexpected reply from master during {stage:?}: {reply:?}")]
    UnexpectedReply {
        stage: HandshakeStage,
        reply: RespValue,
    },
    #[error("invalid FULLRESYNC header: {0}")]
    InvalidFullResync(String),
}

/// What the master handed over at the end of a successful handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct FullResync {
    pub replication_id: String,
    pub offset: u64,
    pub snapshot: Bytes,
}

impl FullResync {
    /// Parses a `FULLRESYNC <replid> <offset>` header line.
    ///
    /// The replication id is taken as an opaque token. One that does not look
    /// like a generated id is logged and accepted.
    pub fn parse_header(header: &str) -> Result<(String, u64), HandshakeError> {
        let invalid = || HandshakeError::InvalidFullResync(header.to_string());

        let mut parts = header.split(' ');
        let (Some("FULLRESYNC"), Some(replication_id), Some(offset), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        if replication_id.is_empty() {
            return Err(invalid());
        }

        let offset = offset.parse::<u64>().map_err(|_| invalid())?;

        if !is_valid_repl_id(replication_id) {
            warn!(replication_id, "master sent an unusual replication id");
        }

        Ok((replication_id.to_string(), offset))
    }
}

/// A replication id is 40 ASCII alphanumeric characters.
pub fn is_valid_repl_id(replication_id: &str) -> bool {
    replication_id.len() == REPL_ID_LENGTH
        && replication_id.bytes().all(|byte| byte.is_ascii_alphanumeric())
}

#[derive(Debug)]
pub struct Handshake {
    master: MasterAddress,
    listening_port: u16,
    stage: HandshakeStage,
}

impl Handshake {
    pub fn new(master: MasterAddress, listening_port: u16) -> Self {
        Self {
            master,
            listening_port,
            stage: HandshakeStage::Disconnected,
        }
    }

    pub fn stage(&self) -> HandshakeStage {
        self.stage
    }

    pub fn master(&self) -> &MasterAddress {
        &self.master
    }

    /// Opens the connection to the master.
    pub async fn connect(&mut self) -> Result<RespStream<TcpStream>, HandshakeError> {
        let address = self.master.to_string();

        let stream = TcpStream::connect(&address)
            .await
            .map_err(|source| HandshakeError::Connect {
                address: address.clone(),
                source,
            })?;

        self.advance(HandshakeStage::Connected);
        Ok(RespStream::new(stream))
    }

    /// Connects and runs the whole handshake, returning the open link to the
    /// master together with the resync it sent.
    pub async fn run(&mut self) -> Result<(RespStream<TcpStream>, FullResync), HandshakeError> {
        let mut stream = self.connect().await?;
        let full_resync = self.perform(&mut stream).await?;

        Ok((stream, full_resync))
    }

    /// Drives the handshake over an already connected stream.
    pub async fn perform<S>(&mut self, stream: &mut RespStream<S>) -> Result<FullResync, HandshakeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if self.stage == HandshakeStage::Disconnected {
            self.advance(HandshakeStage::Connected);
        }

        self.send(stream, &["PING"]).await?;
        self.advance(HandshakeStage::PingSent);

        self.advance(HandshakeStage::AwaitPong);
        self.expect_simple_string(stream, "PONG").await?;

        let listening_port = self.listening_port.to_string();
        self.send(stream, &["REPLCONF", "listening-port", &listening_port])
            .await?;
        self.advance(HandshakeStage::ReplconfSent);
        self.expect_simple_string(stream, "OK").await?;

        self.send(stream, &["REPLCONF", "capa", REPLICA_CAPABILITY])
            .await?;
        self.expect_simple_string(stream, "OK").await?;

        self.send(stream, &["PSYNC", "?", "-1"]).await?;
        self.advance(HandshakeStage::PsyncSent);

        self.advance(HandshakeStage::AwaitFullresync);
        let header = match self.read_reply(stream).await? {
            RespValue::SimpleString(header) => header,
            reply => {
                return Err(HandshakeError::UnexpectedReply {
                    stage: self.stage,
                    reply,
                });
            }
        };
        let (replication_id, offset) = FullResync::parse_header(&header)?;

        let snapshot = stream
            .read_snapshot()
            .await
            .map_err(|source| HandshakeError::Read {
                stage: self.stage,
                source,
            })?;

        if !rdb::is_rdb_payload(&snapshot) {
            warn!(master = %self.master, "snapshot from master is not an RDB file");
        }

        self.advance(HandshakeStage::Synced);
        info!(
            master = %self.master,
            replication_id = %replication_id,
            offset,
            snapshot_bytes = snapshot.len(),
            "replication handshake completed"
        );

        Ok(FullResync {
            replication_id,
            offset,
            snapshot,
        })
    }

    fn advance(&mut self, stage: HandshakeStage) {
        debug!(master = %self.master, from = ?self.stage, to = ?stage, "handshake stage");
        self.stage = stage;
    }

    async fn send<S>(&self, stream: &mut RespStream<S>, parts: &[&str]) -> Result<(), HandshakeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        stream
            .write_value(&RespValue::command(parts))
            .await
            .map_err(|source| HandshakeError::Io {
                stage: self.stage,
                source,
            })
    }

    async fn read_reply<S>(&self, stream: &mut RespStream<S>) -> Result<RespValue, HandshakeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        stream
            .read_value()
            .await
            .map_err(|source| HandshakeError::Read {
                stage: self.stage,
                source,
            })
    }

    async fn expect_simple_string<S>(
        &self,
        stream: &mut RespStream<S>,
        expected: &str,
    ) -> Result<(), HandshakeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self.read_reply(stream).await? {
            RespValue::SimpleString(reply) if reply == expected => Ok(()),
            reply => Err(HandshakeError::UnexpectedReply {
                stage: self.stage,
                reply,
            }),
        }
    }
}
