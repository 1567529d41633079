//! Buffered RESP reading and writing over a byte stream.
//!
//! [`RespStream`] owns the per-connection accumulation buffer. Bytes read from
//! the socket are appended to it and decoded frame by frame, so partial frames
//! survive until the rest arrives and pipelined frames are handed out one at a
//! time in arrival order.

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

use crate::resp::{self, CommandDecoder, RespError, RespValue};

const INITIAL_BUFFER_CAPACITY: usize = 4096;

/// Errors that can occur while reading frames from a stream.
#[derive(Error, Debug, PartialEq)]
pub enum CommandReadError {
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Connection closed in the middle of a frame")]
    TruncatedFrame,
    #[error("RESP parse error: {0}")]
    RespParseError(#[from] RespError),
}

impl From<io::Error> for CommandReadError {
    fn from(err: io::Error) -> Self {
        CommandReadError::IoError(err.to_string())
    }
}

/// A stream that speaks RESP in both directions.
#[derive(Debug)]
pub struct RespStream<S> {
    stream: BufWriter<S>,
    buffer: BytesMut,
    decoder: CommandDecoder,
}

impl<S> RespStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            decoder: CommandDecoder::new(),
        }
    }

    /// Reads the next request frame.
    ///
    /// Returns `Ok(None)` when the peer closed the connection cleanly between
    /// frames. A malformed frame discards everything buffered so far, since
    /// there is no reliable way to find where the next frame starts.
    pub async fn read_command(&mut self) -> Result<Option<Vec<Bytes>>, CommandReadError> {
        loop {
            match self.decoder.decode(&mut self.buffer) {
                Ok(Some(arguments)) => return Ok(Some(arguments)),
                Ok(None) => {}
                Err(err) => {
                    self.buffer.clear();
                    return Err(CommandReadError::RespParseError(err));
                }
            }

            if self.fill_buffer().await? == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(CommandReadError::TruncatedFrame);
            }
        }
    }

    /// Reads the next reply of any RESP type.
    pub async fn read_value(&mut self) -> Result<RespValue, CommandReadError> {
        loop {
            if let Some(value) = RespValue::decode(&mut self.buffer)? {
                return Ok(value);
            }

            self.fill_or_fail().await?;
        }
    }

    /// Reads the snapshot body that follows a `FULLRESYNC` reply.
    pub async fn read_snapshot(&mut self) -> Result<Bytes, CommandReadError> {
        loop {
            if let Some(snapshot) = resp::decode_snapshot(&mut self.buffer)? {
                return Ok(snapshot);
            }

            self.fill_or_fail().await?;
        }
    }

    /// Throws away whatever the peer sends next and reports how many bytes
    /// were dropped. `Ok(0)` means the peer closed the connection.
    pub async fn discard_input(&mut self) -> Result<usize, CommandReadError> {
        self.decoder.reset();

        if !self.buffer.is_empty() {
            let discarded = self.buffer.len();
            self.buffer.clear();
            return Ok(discarded);
        }

        let discarded = self.fill_buffer().await?;
        self.buffer.clear();
        Ok(discarded)
    }

    pub async fn write_value(&mut self, value: &RespValue) -> io::Result<()> {
        self.stream.write_all(&value.encode()).await?;
        self.stream.flush().await
    }

    /// Sends a snapshot body framed as `$<len>\r\n<payload>`.
    pub async fn write_snapshot(&mut self, payload: &[u8]) -> io::Result<()> {
        let mut frame = BytesMut::with_capacity(payload.len() + 16);
        resp::encode_snapshot(payload, &mut frame);

        self.stream.write_all(&frame).await?;
        self.stream.flush().await
    }

    async fn fill_buffer(&mut self) -> Result<usize, CommandReadError> {
        Ok(self.stream.read_buf(&mut self.buffer).await?)
    }

    async fn fill_or_fail(&mut self) -> Result<(), CommandReadError> {
        if self.fill_buffer().await? == 0 {
            if self.buffer.is_empty() {
                return Err(CommandReadError::ConnectionClosed);
            }
            return Err(CommandReadError::TruncatedFrame);
        }

        Ok(())
    }
}
