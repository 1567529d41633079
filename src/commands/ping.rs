use bytes::Bytes;

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    resp::RespValue,
};

pub struct PingArguments {
    message: Option<Bytes>,
}

impl PingArguments {
    pub fn parse(arguments: &[Bytes]) -> Result<Self, CommandError> {
        match arguments {
            [] => Ok(Self { message: None }),
            [message] => Ok(Self {
                message: Some(message.clone()),
            }),
            _ => Err(CommandError::WrongNumberOfArguments("ping")),
        }
    }
}

/// Handles the PING command.
///
/// Without an argument the reply is `+PONG`. A message is echoed back as a
/// simple string, unless it contains a line break or is not valid UTF-8, in
/// which case it goes out as a bulk string so the reply stays well framed.
pub fn ping(arguments: &[Bytes]) -> Result<CommandResult, CommandError> {
    let ping_arguments = PingArguments::parse(arguments)?;

    let Some(message) = ping_arguments.message else {
        return Ok(CommandResult::Response(RespValue::SimpleString(
            "PONG".to_string(),
        )));
    };

    let reply = match std::str::from_utf8(&message) {
        Ok(text) if !text.contains(['\r', '\n']) => RespValue::SimpleString(text.to_string()),
        _ => RespValue::BulkString(message),
    };

    Ok(CommandResult::Response(reply))
}
