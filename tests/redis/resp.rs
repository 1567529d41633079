use bytes::{Bytes, BytesMut};
use redis_replica::resp::{
    decode_command, decode_snapshot, encode_snapshot, parse_command, RespError, RespValue,
};

fn arguments(parts: &[&str]) -> Vec<Bytes> {
    parts
        .iter()
        .map(|part| Bytes::copy_from_slice(part.as_bytes()))
        .collect()
}

#[test]
fn test_parse_command() {
    let test_cases = vec![
        ("*1\r\n$4\r\nPING\r\n", Ok(arguments(&["PING"]))),
        (
            "*3\r\n$3\r\nSET\r\n$5\r\ngrape\r\n$5\r\nmango\r\n",
            Ok(arguments(&["SET", "grape", "mango"])),
        ),
        (
            "*2\r\n$4\r\nECHO\r\n$7\r\nab\r\ncde\r\n",
            Ok(arguments(&["ECHO", "ab\r\ncde"])),
        ),
        ("*2\r\n$4\r\nECHO\r\n$0\r\n\r\n", Ok(arguments(&["ECHO", ""]))),
        ("*0\r\n", Ok(Vec::new())),
        ("*-1\r\n", Ok(Vec::new())),
        ("*2\r\n$3\r\nGET\r\n", Err(RespError::Truncated)),
        ("+PING\r\n", Err(RespError::ExpectedArray('+'))),
        ("*1\r\n:1\r\n", Err(RespError::ExpectedBulkString(':'))),
        ("*1\r\n$-1\r\n", Err(RespError::InvalidBulkLength)),
        ("*1\r\n$+4\r\nPING\r\n", Err(RespError::InvalidBulkLength)),
        ("*1\r\n$4\r\nPINGXX", Err(RespError::UnterminatedBulkString)),
        ("*1\r\n$536870913\r\n", Err(RespError::InvalidBulkLength)),
        ("*1048577\r\n", Err(RespError::InvalidMultibulkLength)),
    ];

    for (input, expected) in test_cases {
        assert_eq!(parse_command(input.as_bytes()), expected, "input: {:?}", input);
    }
}

#[test]
fn test_decode_command_byte_by_byte() {
    let frame = b"*3\r\n$3\r\nSET\r\n$5\r\ngrape\r\n$5\r\nmango\r\n";
    let mut buffer = BytesMut::new();

    for (index, byte) in frame.iter().enumerate() {
        buffer.extend_from_slice(&[*byte]);
        let decoded = decode_command(&mut buffer).unwrap();

        if index + 1 < frame.len() {
            assert_eq!(decoded, None, "decoded early at byte {}", index);
            assert_eq!(buffer.len(), index + 1);
        } else {
            assert_eq!(decoded, Some(arguments(&["SET", "grape", "mango"])));
        }
    }

    assert!(buffer.is_empty());
}

#[test]
fn test_decode_command_keeps_trailing_bytes() {
    let mut buffer = BytesMut::from(&b"*1\r\n$4\r\nPING\r\n*2\r\n$4\r\nEC"[..]);

    assert_eq!(
        decode_command(&mut buffer),
        Ok(Some(arguments(&["PING"])))
    );
    assert_eq!(&buffer[..], b"*2\r\n$4\r\nEC");
    assert_eq!(decode_command(&mut buffer), Ok(None));

    buffer.extend_from_slice(b"HO\r\n$3\r\nhey\r\n");
    assert_eq!(
        decode_command(&mut buffer),
        Ok(Some(arguments(&["ECHO", "hey"])))
    );
    assert!(buffer.is_empty());
}

#[test]
fn test_encode_values() {
    let test_cases = vec![
        (RespValue::SimpleString("OK".to_string()), "+OK\r\n"),
        (
            RespValue::Error("ERR unknown command 'FOO'".to_string()),
            "-ERR unknown command 'FOO'\r\n",
        ),
        (RespValue::Integer(2), ":2\r\n"),
        (RespValue::Integer(-7), ":-7\r\n"),
        (RespValue::BulkString(Bytes::from("mango")), "$5\r\nmango\r\n"),
        (RespValue::BulkString(Bytes::new()), "$0\r\n\r\n"),
        (RespValue::NullBulkString, "$-1\r\n"),
        (
            RespValue::command(&["REPLCONF", "capa", "psync2"]),
            "*3\r\n$8\r\nREPLCONF\r\n$4\r\ncapa\r\n$6\r\npsync2\r\n",
        ),
    ];

    for (value, expected) in test_cases {
        assert_eq!(value.encode(), Bytes::from(expected));
    }
}

#[test]
fn test_decode_replies() {
    let test_cases = vec![
        ("+PONG\r\n", RespValue::SimpleString("PONG".to_string())),
        ("-ERR nope\r\n", RespValue::Error("ERR nope".to_string())),
        (":42\r\n", RespValue::Integer(42)),
        ("$5\r\nmango\r\n", RespValue::BulkString(Bytes::from("mango"))),
        ("$-1\r\n", RespValue::NullBulkString),
        (
            "*2\r\n+OK\r\n:1\r\n",
            RespValue::Array(vec![
                RespValue::SimpleString("OK".to_string()),
                RespValue::Integer(1),
            ]),
        ),
    ];

    for (input, expected) in test_cases {
        let mut buffer = BytesMut::from(input.as_bytes());
        assert_eq!(RespValue::decode(&mut buffer), Ok(Some(expected)));
        assert!(buffer.is_empty(), "input: {:?}", input);
    }
}

#[test]
fn test_decode_reply_errors() {
    let test_cases = vec![
        ("!oops\r\n", RespError::UnknownRespType('!')),
        (":12a\r\n", RespError::FailedToParseInteger),
        ("$3\r\nabcd\r\n", RespError::UnterminatedBulkString),
    ];

    for (input, expected) in test_cases {
        let mut buffer = BytesMut::from(input.as_bytes());
        assert_eq!(RespValue::decode(&mut buffer), Err(expected));
    }
}

#[test]
fn test_snapshot_framing() {
    let mut buffer = BytesMut::new();
    encode_snapshot(b"REDIS0011", &mut buffer);
    assert_eq!(&buffer[..], b"$9\r\nREDIS0011");

    buffer.extend_from_slice(b"+OK\r\n");
    assert_eq!(
        decode_snapshot(&mut buffer),
        Ok(Some(Bytes::from("REDIS0011")))
    );
    assert_eq!(&buffer[..], b"+OK\r\n");

    let mut partial = BytesMut::from(&b"$9\r\nREDIS"[..]);
    assert_eq!(decode_snapshot(&mut partial), Ok(None));
    assert_eq!(partial.len(), 9);
}

#[test]
fn test_protocol_error_reply() {
    assert_eq!(
        RespError::ExpectedArray('P').as_resp(),
        RespValue::Error("ERR Protocol error: expected '*', got 'P'".to_string())
    );
}
