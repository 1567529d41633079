use bytes::Bytes;

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    key_value_store::KeyValueStore,
    resp::RespValue,
};

pub struct DelArguments {
    keys: Vec<Bytes>,
}

impl DelArguments {
    pub fn parse(arguments: &[Bytes]) -> Result<Self, CommandError> {
        if arguments.is_empty() {
            return Err(CommandError::WrongNumberOfArguments("del"));
        }

        Ok(Self {
            keys: arguments.to_vec(),
        })
    }
}

/// Handles the DEL command, replying with the number of keys removed.
pub async fn del(
    store: &KeyValueStore,
    arguments: &[Bytes],
) -> Result<CommandResult, CommandError> {
    let del_arguments = DelArguments::parse(arguments)?;

    let removed = store.del(&del_arguments.keys).await;

    Ok(CommandResult::Response(RespValue::Integer(removed as i64)))
}
