use bytes::Bytes;

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    resp::RespValue,
};

pub struct EchoArguments {
    message: Bytes,
}

impl EchoArguments {
    pub fn parse(arguments: &[Bytes]) -> Result<Self, CommandError> {
        let [message] = arguments else {
            return Err(CommandError::WrongNumberOfArguments("echo"));
        };

        Ok(Self {
            message: message.clone(),
        })
    }
}

/// Handles the ECHO command by returning its argument as a bulk string.
///
/// ```ignore
/// // ECHO "hello world"
/// let result = echo(&[Bytes::from("hello world")]);
/// // Returns: "$11\r\nhello world\r\n"
/// ```
pub fn echo(arguments: &[Bytes]) -> Result<CommandResult, CommandError> {
    let echo_arguments = EchoArguments::parse(arguments)?;

    Ok(CommandResult::Response(RespValue::BulkString(
        echo_arguments.message,
    )))
}
