//! PSYNC, the last step of the replication handshake.
//!
//! The master always answers with a full resynchronization. The snapshot
//! itself is written by the connection once the `FULLRESYNC` line is out.

use bytes::Bytes;
use tracing::info;

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    resp::RespValue,
    server::{RedisRole, RedisServer},
};

/// Represents the parsed arguments for the PSYNC command.
///
/// A replica syncing for the first time sends `? -1`. Partial resync is not
/// offered, so the values are only kept for logging.
pub struct PsyncArguments {
    /// The replication ID the replica asks for (`?` when it has none)
    requested_repl_id: String,
    /// The offset the replica asks to resume from
    requested_offset: String,
}

impl PsyncArguments {
    pub fn parse(arguments: &[Bytes]) -> Self {
        let describe = |index: usize| {
            arguments
                .get(index)
                .map(|argument| String::from_utf8_lossy(argument).into_owned())
                .unwrap_or_default()
        };

        Self {
            requested_repl_id: describe(0),
            requested_offset: describe(1),
        }
    }
}

/// Handles the PSYNC command.
///
/// # Returns
///
/// * `Ok(CommandResult::Sync)` - `+FULLRESYNC <repl_id> <offset>`, to be followed by the snapshot
/// * `Err(CommandError::MasterOnlyCommand)` - If this server is a replica
pub fn psync(server: &RedisServer, arguments: &[Bytes]) -> Result<CommandResult, CommandError> {
    let RedisRole::Master {
        repl_id,
        repl_offset,
    } = &server.role
    else {
        return Err(CommandError::MasterOnlyCommand("PSYNC"));
    };

    let psync_arguments = PsyncArguments::parse(arguments);
    info!(
        requested_repl_id = %psync_arguments.requested_repl_id,
        requested_offset = %psync_arguments.requested_offset,
        "starting full resynchronization"
    );

    Ok(CommandResult::Sync(RespValue::SimpleString(format!(
        "FULLRESYNC {} {}",
        repl_id, repl_offset
    ))))
}
