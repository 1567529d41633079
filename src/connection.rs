use std::sync::Arc;

use bytes::Bytes;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    select,
    sync::watch,
};
use tracing::{debug, info, warn};

use crate::{
    commands::{CommandHandler, CommandResult},
    handshake::Handshake,
    input::{CommandReadError, RespStream},
    key_value_store::KeyValueStore,
    rdb::stream_rdb_file,
    server::RedisServer,
    session::ClientSession,
};

/// Serves one client until it disconnects or the server shuts down.
///
/// Requests are answered strictly in the order they arrive. A request that
/// fails to decode or to execute gets an error reply and the connection
/// stays open; an I/O failure ends it without a reply.
pub async fn handle_client_connection<S>(
    stream: S,
    client_address: String,
    server: Arc<RedisServer>,
    store: Arc<KeyValueStore>,
    mut shutdown: watch::Receiver<bool>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = RespStream::new(stream);
    let mut session = ClientSession::new(client_address);
    debug!(client = %session.client_address, "client connected");

    loop {
        let read_result = select! {
            result = stream.read_command() => result,
            _ = shutdown.changed() => break,
        };

        let arguments = match read_result {
            Ok(Some(arguments)) => arguments,
            Ok(None) => break,
            Err(CommandReadError::RespParseError(err)) => {
                debug!(client = %session.client_address, error = %err, "malformed request");
                if let Err(err) = stream.write_value(&err.as_resp()).await {
                    debug!(client = %session.client_address, error = ?err, "failed to write error reply");
                    break;
                }
                continue;
            }
            Err(err) => {
                debug!(client = %session.client_address, error = %err, "failed to read request");
                break;
            }
        };

        if let Err(err) = execute_command(&mut stream, arguments, &server, &mut session, &store).await
        {
            debug!(client = %session.client_address, error = ?err, "failed to write reply");
            break;
        }
    }

    debug!(client = %session.client_address, "client disconnected");
}

async fn execute_command<S>(
    stream: &mut RespStream<S>,
    arguments: Vec<Bytes>,
    server: &RedisServer,
    session: &mut ClientSession,
    store: &KeyValueStore,
) -> tokio::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let command_handler = match CommandHandler::new(arguments) {
        Ok(handler) => handler,
        Err(err) => return stream.write_value(&err.as_resp()).await,
    };

    let command_result = match command_handler
        .handle_command(server, session, store)
        .await
    {
        Ok(result) => result,
        Err(err) => return stream.write_value(&err.as_resp()).await,
    };

    match command_result {
        CommandResult::Response(reply) => stream.write_value(&reply).await,
        CommandResult::Sync(header) => {
            stream.write_value(&header).await?;
            stream_rdb_file(&session.client_address, stream).await
        }
    }
}

/// Runs the replica side of replication: the handshake, then the open link
/// to the master until either end goes away.
pub async fn run_replication(mut handshake: Handshake, shutdown: watch::Receiver<bool>) {
    match handshake.run().await {
        Ok((stream, _full_resync)) => {
            handle_master_link(stream, handshake.master().to_string(), shutdown).await;
        }
        Err(err) => {
            warn!(
                master = %handshake.master(),
                stage = ?handshake.stage(),
                error = %err,
                "replication handshake failed"
            );
        }
    }
}

/// Keeps the link to the master open after the handshake.
///
/// Write propagation is not implemented, so whatever the master sends is
/// read and dropped.
pub async fn handle_master_link<S>(
    mut stream: RespStream<S>,
    master_address: String,
    mut shutdown: watch::Receiver<bool>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let read_result = select! {
            result = stream.discard_input() => result,
            _ = shutdown.changed() => break,
        };

        match read_result {
            Ok(0) => {
                info!(master = %master_address, "master closed the replication link");
                break;
            }
            Ok(discarded) => {
                debug!(master = %master_address, bytes = discarded, "discarded data from master");
            }
            Err(err) => {
                warn!(master = %master_address, error = %err, "replication link failed");
                break;
            }
        }
    }
}
