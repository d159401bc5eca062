//! Line-oriented transport to the meter.
//!
//! The device session consumes the serial port through the [`LineSource`]
//! trait so tests can inject scripted sources. The real implementation,
//! [`SerialLineSource`], owns the port exclusively from open to drop —
//! opening a device that is already in use fails fast, and the handle is
//! released on every exit path by normal drop semantics.

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// Transport failures, split by where they can occur.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The device could not be opened (missing, busy, permissions).
    /// Fatal for the attempt; the supervisor retries after its delay.
    #[error("failed to open serial device: {0}")]
    Open(#[from] tokio_serial::Error),

    /// The stream failed mid-read. Ends the current session.
    #[error("serial read failed: {0}")]
    Read(#[from] std::io::Error),
}

/// A source of newline-delimited records.
#[async_trait]
pub trait LineSource: Send {
    /// Yields the next line without its terminator, `Ok(None)` on end of
    /// stream. Blocks until a full line is available or the stream errors.
    async fn next_line(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}

/// Line source backed by a serial port.
pub struct SerialLineSource {
    reader: BufReader<SerialStream>,
    buf: Vec<u8>,
}

impl SerialLineSource {
    /// Opens the device exclusively at the given baud rate.
    pub fn open(path: &str, baud: u32) -> Result<Self, TransportError> {
        let stream = tokio_serial::new(path, baud).open_native_async()?;
        Ok(Self {
            reader: BufReader::new(stream),
            buf: Vec::with_capacity(512),
        })
    }
}

#[async_trait]
impl LineSource for SerialLineSource {
    async fn next_line(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }
        // The meter terminates records with CRLF.
        while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
            self.buf.pop();
        }
        Ok(Some(self.buf.clone()))
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted line sources for session and supervisor tests.

    use std::collections::VecDeque;

    use super::*;

    /// Yields a fixed sequence of lines, then an end-of-stream or an error.
    pub struct ScriptedSource {
        lines: VecDeque<Vec<u8>>,
        /// Error to return after the lines are exhausted; `None` means a
        /// clean end of stream.
        final_error: Option<std::io::Error>,
    }

    impl ScriptedSource {
        pub fn new<I, L>(lines: I) -> Self
        where
            I: IntoIterator<Item = L>,
            L: Into<Vec<u8>>,
        {
            Self {
                lines: lines.into_iter().map(Into::into).collect(),
                final_error: None,
            }
        }

        pub fn failing_after<I, L>(lines: I) -> Self
        where
            I: IntoIterator<Item = L>,
            L: Into<Vec<u8>>,
        {
            Self {
                lines: lines.into_iter().map(Into::into).collect(),
                final_error: Some(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "device unplugged",
                )),
            }
        }
    }

    #[async_trait]
    impl LineSource for ScriptedSource {
        async fn next_line(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
            match self.lines.pop_front() {
                Some(line) => Ok(Some(line)),
                None => match self.final_error.take() {
                    Some(err) => Err(TransportError::Read(err)),
                    None => Ok(None),
                },
            }
        }
    }

    /// Never yields; used to exercise cancellation mid-read.
    pub struct PendingSource;

    #[async_trait]
    impl LineSource for PendingSource {
        async fn next_line(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
            std::future::pending().await
        }
    }
}
