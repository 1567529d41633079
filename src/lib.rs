//! An in-memory Redis-compatible key-value server.
//!
//! The server speaks the Redis Serialization Protocol (RESP) and supports a
//! small command set:
//!
//! - Key-value operations with optional millisecond expiry (GET, SET, DEL)
//! - Server commands (PING, ECHO, INFO)
//! - The master side of the replication handshake (REPLCONF, PSYNC)
//!
//! Started with `--replicaof`, a server runs as a read-only replica and
//! performs the handshake against its master on startup. Every client is
//! served by its own task.

pub mod commands;
pub mod connection;
pub mod handshake;
pub mod input;
pub mod key_value_store;
pub mod rdb;
pub mod resp;
pub mod server;
pub mod session;
