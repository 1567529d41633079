use std::time::Duration;

use bytes::Bytes;

use crate::{
    commands::{command_error::CommandError, command_handler::CommandResult},
    key_value_store::KeyValueStore,
    resp::RespValue,
};

/// Represents the parsed arguments for the SET command
pub struct SetArguments {
    /// The key under which the value is stored
    key: Bytes,
    /// The value to be stored under the given key
    value: Bytes,
    /// Time to live, counted from the moment the command runs
    ttl: Option<Duration>,
}

impl SetArguments {
    /// Parses command arguments into a SetArguments structure.
    ///
    /// Two forms are accepted:
    ///   - `[key, value]` - stores a persistent value
    ///   - `[key, value, "PX", milliseconds]` - stores a value that expires
    ///
    /// The option keyword is matched case-insensitively.
    ///
    /// # Returns
    ///
    /// * `Ok(SetArguments)` - Successfully parsed arguments
    /// * `Err(CommandError::WrongNumberOfArguments)` - If the number of arguments is not 2 or 4
    /// * `Err(CommandError::UnsupportedSetOption)` - If the option is not "PX"
    /// * `Err(CommandError::InvalidInteger)` - If the expiration is not a decimal integer
    /// * `Err(CommandError::InvalidExpireTime)` - If the expiration is zero or negative
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let result = SetArguments::parse(&[
    ///     Bytes::from("mykey"),
    ///     Bytes::from("hello"),
    ///     Bytes::from("px"),
    ///     Bytes::from("1000"),
    /// ]);
    /// // Returns: Ok(SetArguments { key: "mykey", value: "hello", ttl: Some(1s) })
    ///
    /// let result = SetArguments::parse(&[
    ///     Bytes::from("mykey"),
    ///     Bytes::from("hello"),
    ///     Bytes::from("EX"),
    ///     Bytes::from("10"),
    /// ]);
    /// // Returns: Err(CommandError::UnsupportedSetOption("EX"))
    /// ```
    pub fn parse(arguments: &[Bytes]) -> Result<Self, CommandError> {
        let (key, value, ttl) = match arguments {
            [key, value] => (key, value, None),
            [key, value, option, milliseconds] => {
                if !option.eq_ignore_ascii_case(b"px") {
                    return Err(CommandError::UnsupportedSetOption(
                        String::from_utf8_lossy(option).into_owned(),
                    ));
                }

                (key, value, Some(parse_milliseconds(milliseconds)?))
            }
            _ => return Err(CommandError::WrongNumberOfArguments("set")),
        };

        Ok(Self {
            key: key.clone(),
            value: value.clone(),
            ttl,
        })
    }
}

fn parse_milliseconds(argument: &[u8]) -> Result<Duration, CommandError> {
    let milliseconds = std::str::from_utf8(argument)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or(CommandError::InvalidInteger)?;

    if milliseconds <= 0 {
        return Err(CommandError::InvalidExpireTime);
    }

    Ok(Duration::from_millis(milliseconds as u64))
}

/// Handles the SET command.
///
/// Stores the value under the key, replacing any previous value and expiry,
/// and replies `+OK`.
pub async fn set(
    store: &KeyValueStore,
    arguments: &[Bytes],
) -> Result<CommandResult, CommandError> {
    let set_arguments = SetArguments::parse(arguments)?;

    store
        .set(set_arguments.key, set_arguments.value, set_arguments.ttl)
        .await;

    Ok(CommandResult::Response(RespValue::SimpleString(
        "OK".to_string(),
    )))
}
