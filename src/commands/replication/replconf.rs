//! REPLCONF, sent by a replica during the handshake to announce how it can
//! be reached and what it supports.

use bytes::Bytes;
use tracing::info;

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    resp::RespValue,
    server::RedisServer,
    session::ClientSession,
};

#[derive(Debug, PartialEq)]
enum ReplconfOption {
    ListeningPort(u16),
    Capability(String),
}

/// Represents the parsed arguments for the REPLCONF command.
///
/// Arguments come in `<option> <value>` pairs and several pairs may be sent
/// in one command.
pub struct ReplconfArguments {
    options: Vec<ReplconfOption>,
}

impl ReplconfArguments {
    /// Parses and validates arguments for the REPLCONF command.
    ///
    /// # Returns
    ///
    /// * `Ok(ReplconfArguments)` - Successfully parsed arguments
    /// * `Err(CommandError::WrongNumberOfArguments)` - If there are no arguments or an option lacks its value
    /// * `Err(CommandError::InvalidListeningPort)` - If `listening-port` is not a port number in 1..=65535
    /// * `Err(CommandError::UnrecognizedReplconfOption)` - If the option is neither `listening-port` nor `capa`
    pub fn parse(arguments: &[Bytes]) -> Result<Self, CommandError> {
        if arguments.len() < 2 || arguments.len() % 2 != 0 {
            return Err(CommandError::WrongNumberOfArguments("replconf"));
        }

        let options = arguments
            .chunks_exact(2)
            .map(|pair| parse_option(&pair[0], &pair[1]))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { options })
    }
}

fn parse_option(option: &[u8], value: &[u8]) -> Result<ReplconfOption, CommandError> {
    if option.eq_ignore_ascii_case(b"listening-port") {
        let port = std::str::from_utf8(value)
            .ok()
            .and_then(|text| text.parse::<u16>().ok())
            .filter(|port| *port != 0)
            .ok_or(CommandError::InvalidListeningPort)?;

        return Ok(ReplconfOption::ListeningPort(port));
    }

    if option.eq_ignore_ascii_case(b"capa") {
        return Ok(ReplconfOption::Capability(
            String::from_utf8_lossy(value).into_owned(),
        ));
    }

    Err(CommandError::UnrecognizedReplconfOption(
        String::from_utf8_lossy(option).into_owned(),
    ))
}

/// Handles the REPLCONF command.
///
/// Records the announced listening port and capabilities on the client's
/// session and replies `+OK`. Only a master serves this command.
///
/// ```ignore
/// // REPLCONF listening-port 6380
/// let result = replconf(&server, &mut session, &[Bytes::from("listening-port"), Bytes::from("6380")]);
/// // Returns: Ok(CommandResult::Response(+OK)), session.listening_port == Some(6380)
/// ```
pub fn replconf(
    server: &RedisServer,
    session: &mut ClientSession,
    arguments: &[Bytes],
) -> Result<CommandResult, CommandError> {
    if server.role.is_replica() {
        return Err(CommandError::MasterOnlyCommand("REPLCONF"));
    }

    let replconf_arguments = ReplconfArguments::parse(arguments)?;

    for option in replconf_arguments.options {
        match option {
            ReplconfOption::ListeningPort(port) => {
                info!(
                    client = %session.client_address,
                    port,
                    "replica announced listening port"
                );
                session.listening_port = Some(port);
            }
            ReplconfOption::Capability(capability) => {
                if !session.capabilities.contains(&capability) {
                    session.capabilities.push(capability);
                }
            }
        }
    }

    Ok(CommandResult::Response(RespValue::SimpleString(
        "OK".to_string(),
    )))
}
