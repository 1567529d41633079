/// Per-connection state the dispatcher may record while serving a client.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ClientSession {
    pub client_address: String,
    /// Port a replica announced with `REPLCONF listening-port`.
    pub listening_port: Option<u16>,
    /// Capabilities a replica announced with `REPLCONF capa`.
    pub capabilities: Vec<String>,
}

impl ClientSession {
    pub fn new(client_address: impl Into<String>) -> Self {
        Self {
            client_address: client_address.into(),
            ..Self::default()
        }
    }
}
