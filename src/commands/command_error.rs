use thiserror::Error;

use crate::resp::RespValue;

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("malformed command")]
    MalformedCommand,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("wrong number of arguments for '{0}' command")]
    WrongNumberOfArguments(&'static str),
    #[error("syntax error, unsupported option '{0}'")]
    UnsupportedSetOption(String),
    #[error("value is not an integer or out of range")]
    InvalidInteger,
    #[error("invalid expire time in 'set' command")]
    InvalidExpireTime,
    #[error("Unrecognized REPLCONF option: {0}")]
    UnrecognizedReplconfOption(String),
    #[error("invalid listening-port value")]
    InvalidListeningPort,
    #[error("You can't write against a read only replica.")]
    ReadOnlyReplica,
    #[error("{0} is only served by a master")]
    MasterOnlyCommand(&'static str),
}

impl CommandError {
    pub fn as_resp(&self) -> RespValue {
        match self {
            CommandError::ReadOnlyReplica => RespValue::Error(format!("READONLY {}", self)),
            _ => RespValue::Error(format!("ERR {}", self)),
        }
    }
}
