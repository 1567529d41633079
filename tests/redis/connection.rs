use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use redis_replica::{
    connection::{handle_client_connection, handle_master_link},
    input::RespStream,
    rdb::EMPTY_RDB,
    resp::RespValue,
};
use tokio::{
    io::{duplex, AsyncWriteExt, DuplexStream},
    sync::watch,
    task::JoinHandle,
    time::timeout,
};

use crate::test_utils::{TestEnv, TestUtils, MASTER_REPL_ID};

/// Spawns a connection worker for `env` and hands back the client end.
fn spawn_connection(
    env: &TestEnv,
) -> (DuplexStream, watch::Sender<bool>, JoinHandle<()>) {
    let (client, server_side) = duplex(4096);
    let (shutdown_sender, shutdown_receiver) = watch::channel(false);

    let server = Arc::clone(&env.server);
    let store = Arc::clone(&env.store);
    let handle = tokio::spawn(async move {
        handle_client_connection(
            server_side,
            TestUtils::client_address(41844),
            server,
            store,
            shutdown_receiver,
        )
        .await;
    });

    (client, shutdown_sender, handle)
}

#[tokio::test]
async fn test_handle_client_connection_basic_commands() {
    let env = TestEnv::new_master_server();
    let (mut client, _shutdown, handle) = spawn_connection(&env);

    TestUtils::send_command_and_receive(
        &mut client,
        TestUtils::ping_command(),
        TestUtils::expected_simple_string("PONG"),
    )
    .await;
    TestUtils::send_command_and_receive(
        &mut client,
        TestUtils::set_command("test_key", "test_value"),
        TestUtils::expected_simple_string("OK"),
    )
    .await;
    TestUtils::send_command_and_receive(
        &mut client,
        TestUtils::get_command("test_key"),
        TestUtils::expected_bulk_string("test_value"),
    )
    .await;
    TestUtils::send_command_and_receive(
        &mut client,
        TestUtils::del_command(&["test_key", "missing"]),
        TestUtils::expected_integer(1),
    )
    .await;

    drop(client);
    timeout(Duration::from_secs(2), handle)
        .await
        .expect("connection worker did not exit")
        .unwrap();
}

#[tokio::test]
async fn test_handle_client_connection_pipelined_commands() {
    let env = TestEnv::new_master_server();
    let (mut client, _shutdown, _handle) = spawn_connection(&env);

    let mut request = Vec::new();
    for command in [
        TestUtils::set_command("grape", "mango"),
        TestUtils::get_command("grape"),
        TestUtils::echo_command("done"),
    ] {
        request.extend_from_slice(&TestUtils::encode_command(&command));
    }

    client.write_all(&request).await.unwrap();

    assert_eq!(
        TestUtils::read_replies(&mut client, 3).await,
        vec![
            TestUtils::expected_simple_string("OK"),
            TestUtils::expected_bulk_string("mango"),
            TestUtils::expected_bulk_string("done"),
        ]
    );
}

#[tokio::test]
async fn test_handle_client_connection_split_frame() {
    let env = TestEnv::new_master_server();
    let (mut client, _shutdown, _handle) = spawn_connection(&env);

    client.write_all(b"*2\r\n$4\r\nEC").await.unwrap();
    client.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let reply = TestUtils::send_and_receive(&mut client, b"HO\r\n$5\r\nhello\r\n").await;
    assert_eq!(reply, TestUtils::expected_bulk_string("hello"));
}

#[tokio::test]
async fn test_handle_client_connection_errors_keep_connection_open() {
    let env = TestEnv::new_master_server();
    let (mut client, _shutdown, _handle) = spawn_connection(&env);

    let test_cases: Vec<(&[u8], RespValue)> = vec![
        (
            b"PING\r\n",
            RespValue::Error("ERR Protocol error: expected '*', got 'P'".to_string()),
        ),
        (b"*0\r\n", RespValue::Error("ERR malformed command".to_string())),
        (
            b"*1\r\n$7\r\nCOMMAND\r\n",
            RespValue::Error("ERR unknown command 'COMMAND'".to_string()),
        ),
        (
            b"*1\r\n$3\r\nGET\r\n",
            RespValue::Error("ERR wrong number of arguments for 'get' command".to_string()),
        ),
    ];

    for (request, expected) in test_cases {
        assert_eq!(TestUtils::send_and_receive(&mut client, request).await, expected);
    }

    TestUtils::send_command_and_receive(
        &mut client,
        TestUtils::ping_command(),
        TestUtils::expected_simple_string("PONG"),
    )
    .await;
}

#[tokio::test]
async fn test_handle_client_connection_psync_sends_snapshot() {
    let env = TestEnv::new_master_server();
    let (client, _shutdown, _handle) = spawn_connection(&env);
    let mut client = RespStream::new(client);

    for command in [
        TestUtils::replconf_command("listening-port", "6380"),
        TestUtils::replconf_command("capa", "psync2"),
    ] {
        client
            .write_value(&RespValue::Array(
                command.into_iter().map(RespValue::BulkString).collect(),
            ))
            .await
            .unwrap();
        assert_eq!(
            client.read_value().await,
            Ok(TestUtils::expected_simple_string("OK"))
        );
    }

    client
        .write_value(&RespValue::command(&["PSYNC", "?", "-1"]))
        .await
        .unwrap();

    assert_eq!(
        client.read_value().await,
        Ok(RespValue::SimpleString(format!(
            "FULLRESYNC {} 0",
            MASTER_REPL_ID
        )))
    );
    assert_eq!(
        client.read_snapshot().await,
        Ok(Bytes::from_static(EMPTY_RDB))
    );

    client
        .write_value(&RespValue::command(&["PING"]))
        .await
        .unwrap();
    assert_eq!(
        client.read_value().await,
        Ok(TestUtils::expected_simple_string("PONG"))
    );
}

#[tokio::test]
async fn test_handle_client_connection_on_replica() {
    let env = TestEnv::new_replica_server(6380);
    let (mut client, _shutdown, _handle) = spawn_connection(&env);

    TestUtils::send_command_and_receive(
        &mut client,
        TestUtils::set_command("grape", "mango"),
        RespValue::Error("READONLY You can't write against a read only replica.".to_string()),
    )
    .await;
    TestUtils::send_command_and_receive(
        &mut client,
        TestUtils::get_command("grape"),
        TestUtils::expected_null(),
    )
    .await;
}

#[tokio::test]
async fn test_handle_client_connection_stops_on_shutdown() {
    let env = TestEnv::new_master_server();
    let (mut client, shutdown, handle) = spawn_connection(&env);

    TestUtils::send_command_and_receive(
        &mut client,
        TestUtils::ping_command(),
        TestUtils::expected_simple_string("PONG"),
    )
    .await;

    shutdown.send(true).unwrap();
    timeout(Duration::from_secs(2), handle)
        .await
        .expect("connection worker ignored shutdown")
        .unwrap();
}

#[tokio::test]
async fn test_handle_master_link_drains_until_close() {
    let (mut master, replica_side) = duplex(1024);
    let (_shutdown_sender, shutdown_receiver) = watch::channel(false);

    let handle = tokio::spawn(handle_master_link(
        RespStream::new(replica_side),
        "127.0.0.1:6379".to_string(),
        shutdown_receiver,
    ));

    master
        .write_all(&TestUtils::encode_command(&TestUtils::set_command(
            "grape", "mango",
        )))
        .await
        .unwrap();
    master.flush().await.unwrap();
    drop(master);

    timeout(Duration::from_secs(2), handle)
        .await
        .expect("master link did not close")
        .unwrap();
}
