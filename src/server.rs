use std::{fmt, future::Future, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use rand::{Rng, distributions::Alphanumeric};
use thiserror::Error;
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
    select,
    sync::{Semaphore, watch},
    task::JoinSet,
};
use tracing::{debug, info, warn};

use crate::{
    connection::{handle_client_connection, run_replication},
    handshake::Handshake,
    key_value_store::KeyValueStore,
    resp::RespValue,
};

pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_MAX_CLIENTS: usize = 10_000;

const REPL_ID_LENGTH: usize = 40;

#[derive(Error, Debug, PartialEq)]
pub enum CliError {
    #[error("Invalid command line flag")]
    InvalidCommandLineFlag,
    #[error("Invalid command line flag value")]
    InvalidCommandLineFlagValue,
}

/// Where a replica finds its master.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterAddress {
    pub host: String,
    pub port: u16,
}

impl MasterAddress {
    /// Parses the `--replicaof` value, `"<host> <port>"`.
    pub fn parse(value: &str) -> Result<Self, CliError> {
        let mut parts = value.split_whitespace();

        let (Some(host), Some(port), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(CliError::InvalidCommandLineFlagValue);
        };

        Ok(Self {
            host: host.to_string(),
            port: parse_port(port)?,
        })
    }
}

impl fmt::Display for MasterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedisRole {
    Master { repl_id: String, repl_offset: u64 },
    Replica(MasterAddress),
}

impl RedisRole {
    pub fn master() -> Self {
        RedisRole::Master {
            repl_id: generate_repl_id(),
            repl_offset: 0,
        }
    }

    pub fn as_string(&self) -> &'static str {
        match self {
            RedisRole::Master { .. } => "master",
            RedisRole::Replica(_) => "slave",
        }
    }

    pub fn is_replica(&self) -> bool {
        matches!(self, RedisRole::Replica(_))
    }
}

fn generate_repl_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REPL_ID_LENGTH)
        .map(char::from)
        .collect()
}

fn parse_port(value: &str) -> Result<u16, CliError> {
    let port = value
        .parse::<u16>()
        .map_err(|_| CliError::InvalidCommandLineFlagValue)?;

    if port == 0 {
        return Err(CliError::InvalidCommandLineFlagValue);
    }

    Ok(port)
}

#[derive(Debug)]
pub struct RedisServer {
    pub port: u16,
    pub role: RedisRole,
    pub max_clients: usize,
}

impl RedisServer {
    /// Builds the server configuration from the process arguments.
    ///
    /// The first item is the program name and is skipped.
    pub fn new<I: IntoIterator<Item = String>>(command_line_args: I) -> Result<Self, CliError> {
        let mut iter = command_line_args.into_iter().skip(1);
        let mut port: Option<u16> = None;
        let mut master: Option<MasterAddress> = None;
        let mut max_clients: Option<usize> = None;

        while let Some(arg) = iter.next() {
            let Some(value) = iter.next() else {
                return Err(match arg.as_str() {
                    "--port" | "--replicaof" | "--maxclients" => {
                        CliError::InvalidCommandLineFlagValue
                    }
                    _ => CliError::InvalidCommandLineFlag,
                });
            };

            match arg.as_str() {
                "--port" => port = Some(parse_port(&value)?),
                "--replicaof" => master = Some(MasterAddress::parse(&value)?),
                "--maxclients" => {
                    let limit = value
                        .parse::<usize>()
                        .map_err(|_| CliError::InvalidCommandLineFlagValue)?;

                    if limit == 0 {
                        return Err(CliError::InvalidCommandLineFlagValue);
                    }

                    max_clients = Some(limit);
                }
                _ => return Err(CliError::InvalidCommandLineFlag),
            }
        }

        Ok(RedisServer {
            port: port.unwrap_or(DEFAULT_PORT),
            role: match master {
                Some(master) => RedisRole::Replica(master),
                None => RedisRole::master(),
            },
            max_clients: max_clients.unwrap_or(DEFAULT_MAX_CLIENTS),
        })
    }

    /// Binds the configured port and serves until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let address = format!("127.0.0.1:{}", self.port);
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("failed to bind {}", address))?;

        self.serve(listener, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }

    /// Accepts connections on `listener` until `shutdown` resolves, then waits
    /// for every connection worker to finish.
    ///
    /// A replica also starts its handshake with the master here, on a worker
    /// of its own.
    pub async fn serve<F>(mut self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.port = listener
            .local_addr()
            .context("failed to read listener address")?
            .port();
        info!(port = self.port, role = self.role.as_string(), "server listening");

        let server = Arc::new(self);
        let store = Arc::new(KeyValueStore::new());
        let connection_slots = Arc::new(Semaphore::new(server.max_clients));
        let (shutdown_sender, shutdown_receiver) = watch::channel(false);
        let mut workers = JoinSet::new();

        let replication = match &server.role {
            RedisRole::Replica(master) => {
                let handshake = Handshake::new(master.clone(), server.port);
                Some(tokio::spawn(run_replication(
                    handshake,
                    shutdown_receiver.clone(),
                )))
            }
            RedisRole::Master { .. } => None,
        };

        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("server shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    let (stream, peer) = match accept_result {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            warn!(error = ?err, "failed to accept connection");
                            continue;
                        }
                    };

                    let Ok(permit) = Arc::clone(&connection_slots).try_acquire_owned() else {
                        reject_client(stream, peer).await;
                        continue;
                    };

                    let server = Arc::clone(&server);
                    let store = Arc::clone(&store);
                    let shutdown_receiver = shutdown_receiver.clone();

                    workers.spawn(async move {
                        handle_client_connection(
                            stream,
                            peer.to_string(),
                            server,
                            store,
                            shutdown_receiver,
                        )
                        .await;
                        drop(permit);
                    });
                }
                Some(result) = workers.join_next(), if !workers.is_empty() => {
                    if let Err(err) = result {
                        warn!(error = ?err, "connection worker failed");
                    }
                }
            }
        }

        let _ = shutdown_sender.send(true);

        if let Some(replication) = replication {
            replication.abort();
        }

        while let Some(result) = workers.join_next().await {
            if let Err(err) = result {
                warn!(error = ?err, "connection worker failed");
            }
        }

        info!("server stopped");
        Ok(())
    }
}

async fn reject_client(mut stream: TcpStream, peer: SocketAddr) {
    warn!(client = %peer, "max number of clients reached");

    let reply = RespValue::Error("ERR max number of clients reached".to_string()).encode();
    if let Err(err) = stream.write_all(&reply).await {
        debug!(client = %peer, error = ?err, "failed to reject client");
    }
}
