use bytes::Bytes;

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    resp::RespValue,
    server::{RedisRole, RedisServer},
};

/// INFO takes an optional section name. Only the replication section exists,
/// so every name falls back to it.
pub struct InfoArguments;

impl InfoArguments {
    pub fn parse(arguments: &[Bytes]) -> Result<Self, CommandError> {
        if arguments.len() > 1 {
            return Err(CommandError::WrongNumberOfArguments("info"));
        }

        Ok(Self)
    }
}

/// Handles the INFO command.
///
/// Replies with the replication section as one bulk string whose lines are
/// `field:value` pairs separated by CRLF.
///
/// ```ignore
/// // INFO replication (on a master)
/// // Returns: "role:master\r\nmaster_replid:<40 chars>\r\nmaster_repl_offset:0"
/// ```
pub fn info(server: &RedisServer, arguments: &[Bytes]) -> Result<CommandResult, CommandError> {
    InfoArguments::parse(arguments)?;

    let mut replication = vec![format!("role:{}", server.role.as_string())];

    match &server.role {
        RedisRole::Master {
            repl_id,
            repl_offset,
        } => {
            replication.push(format!("master_replid:{}", repl_id));
            replication.push(format!("master_repl_offset:{}", repl_offset));
        }
        RedisRole::Replica(master) => {
            replication.push(format!("master_host:{}", master.host));
            replication.push(format!("master_port:{}", master.port));
        }
    }

    Ok(CommandResult::Response(RespValue::BulkString(Bytes::from(
        replication.join("\r\n"),
    ))))
}
