use redis_replica::commands::CommandError;

use crate::test_utils::{TestEnv, TestUtils};

#[tokio::test]
async fn test_handle_replconf_command() {
    let mut env = TestEnv::new_master_server();

    env.exec_command_ok(
        TestUtils::replconf_command("listening-port", "6380"),
        TestUtils::expected_simple_string("OK"),
    )
    .await;
    env.exec_command_ok(
        TestUtils::replconf_command("capa", "psync2"),
        TestUtils::expected_simple_string("OK"),
    )
    .await;

    assert_eq!(env.session.listening_port, Some(6380));
    assert_eq!(env.session.capabilities, vec!["psync2".to_string()]);
}

#[tokio::test]
async fn test_handle_replconf_command_multiple_options() {
    let mut env = TestEnv::new_master_server();

    env.exec_command_ok(
        TestUtils::command(&[
            "REPLCONF",
            "LISTENING-PORT",
            "7000",
            "capa",
            "eof",
            "capa",
            "psync2",
        ]),
        TestUtils::expected_simple_string("OK"),
    )
    .await;

    assert_eq!(env.session.listening_port, Some(7000));
    assert_eq!(
        env.session.capabilities,
        vec!["eof".to_string(), "psync2".to_string()]
    );
}

#[tokio::test]
async fn test_handle_replconf_command_invalid() {
    let mut env = TestEnv::new_master_server();

    let test_cases = vec![
        (
            TestUtils::command(&["REPLCONF"]),
            CommandError::WrongNumberOfArguments("replconf"),
        ),
        (
            TestUtils::command(&["REPLCONF", "listening-port"]),
            CommandError::WrongNumberOfArguments("replconf"),
        ),
        (
            TestUtils::replconf_command("listening-port", "port"),
            CommandError::InvalidListeningPort,
        ),
        (
            TestUtils::replconf_command("listening-port", "65536"),
            CommandError::InvalidListeningPort,
        ),
        (
            TestUtils::replconf_command("ip-address", "10.0.0.1"),
            CommandError::UnrecognizedReplconfOption("ip-address".to_string()),
        ),
    ];

    for (command, expected_error) in test_cases {
        env.exec_command_err(command, expected_error).await;
    }

    assert_eq!(env.session.listening_port, None);
}

#[tokio::test]
async fn test_handle_replconf_command_on_replica() {
    let mut env = TestEnv::new_replica_server(6380);

    env.exec_command_err(
        TestUtils::replconf_command("listening-port", "6381"),
        CommandError::MasterOnlyCommand("REPLCONF"),
    )
    .await;
}
