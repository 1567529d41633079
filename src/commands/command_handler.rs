use bytes::Bytes;

use crate::{
    commands::{
        command_error::CommandError,
        del::del,
        echo::echo,
        get::get,
        info::info,
        ping::ping,
        replication::{psync, replconf},
        set::set,
    },
    key_value_store::KeyValueStore,
    resp::RespValue,
    server::RedisServer,
    session::ClientSession,
};

#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// A single reply to write back to the client.
    Response(RespValue),
    /// A `FULLRESYNC` reply that must be followed by the snapshot.
    Sync(RespValue),
}

/// A request decoded from the wire, with its name normalised to upper case.
#[derive(Debug, PartialEq, Clone)]
pub struct CommandHandler {
    pub name: String,
    pub arguments: Vec<Bytes>,
}

impl CommandHandler {
    pub fn new(mut parts: Vec<Bytes>) -> Result<Self, CommandError> {
        if parts.is_empty() {
            return Err(CommandError::MalformedCommand);
        }

        let arguments = parts.split_off(1);
        let name = String::from_utf8_lossy(&parts[0]).to_ascii_uppercase();

        Ok(Self { name, arguments })
    }

    /// Commands that modify the keyspace.
    pub fn is_write_command(&self) -> bool {
        matches!(self.name.as_str(), "SET" | "DEL")
    }

    pub async fn handle_command(
        &self,
        server: &RedisServer,
        session: &mut ClientSession,
        store: &KeyValueStore,
    ) -> Result<CommandResult, CommandError> {
        if self.is_write_command() && server.role.is_replica() {
            return Err(CommandError::ReadOnlyReplica);
        }

        match self.name.as_str() {
            "PING" => ping(&self.arguments),
            "ECHO" => echo(&self.arguments),
            "SET" => set(store, &self.arguments).await,
            "GET" => get(store, &self.arguments).await,
            "DEL" => del(store, &self.arguments).await,
            "INFO" => info(server, &self.arguments),
            "REPLCONF" => replconf(server, session, &self.arguments),
            "PSYNC" => psync(server, &self.arguments),
            _ => Err(CommandError::UnknownCommand(self.name.clone())),
        }
    }
}
