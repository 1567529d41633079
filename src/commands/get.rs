use bytes::Bytes;

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    key_value_store::KeyValueStore,
    resp::RespValue,
};

pub struct GetArguments {
    key: Bytes,
}

impl GetArguments {
    pub fn parse(arguments: &[Bytes]) -> Result<Self, CommandError> {
        let [key] = arguments else {
            return Err(CommandError::WrongNumberOfArguments("get"));
        };

        Ok(Self { key: key.clone() })
    }
}

/// Handles the GET command.
///
/// Replies with the stored value as a bulk string, or a null bulk string when
/// the key does not exist or has expired. An expired key is evicted here.
pub async fn get(
    store: &KeyValueStore,
    arguments: &[Bytes],
) -> Result<CommandResult, CommandError> {
    let get_arguments = GetArguments::parse(arguments)?;

    let reply = match store.get(&get_arguments.key).await {
        Some(value) => RespValue::BulkString(value),
        None => RespValue::NullBulkString,
    };

    Ok(CommandResult::Response(reply))
}
