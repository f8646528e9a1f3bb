//! Line-oriented transport over a half-duplex byte channel.
//!
//! The [`Transport`] trait is the seam between the transaction layer and the
//! physical UART. [`LineTransport`] implements it over any tokio
//! `AsyncRead + AsyncWrite` port (a `tokio_serial::SerialStream` in
//! production, an in-memory mock in tests).

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::{DEFAULT_DRAIN_WINDOW, MAX_LINE_LENGTH};
use crate::error::{LoRaError, Result};

/// Upper bound on bytes discarded by one drain, so a chattering line cannot
/// stall the caller forever.
const MAX_DRAIN_BYTES: usize = 4 * MAX_LINE_LENGTH;

/// Byte channel to the module.
///
/// Implementations never retry; retry policy belongs to the caller.
#[async_trait]
pub trait Transport: Send {
    /// Write all bytes to the line.
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read one newline-terminated line, returned without its `\r\n`.
    ///
    /// Fails with [`LoRaError::Timeout`] if no complete line arrives within
    /// `timeout`, or [`LoRaError::SerialPortError`] on a channel fault.
    async fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>>;

    /// Discard buffered and in-flight input until the line goes quiet.
    /// Returns the number of bytes dropped.
    async fn drain(&mut self) -> Result<usize>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data).await
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        (**self).read_line(timeout).await
    }

    async fn drain(&mut self) -> Result<usize> {
        (**self).drain().await
    }
}

/// Anything the line transport can run on.
pub trait SerialIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> SerialIo for T {}

/// [`Transport`] that frames `\n`-terminated lines on top of a byte port.
pub struct LineTransport<P: SerialIo> {
    port: P,
    buffer: BytesMut,
    drain_window: Duration,
}

impl<P: SerialIo> LineTransport<P> {
    pub fn new(port: P) -> Self {
        LineTransport {
            port,
            buffer: BytesMut::with_capacity(256),
            drain_window: DEFAULT_DRAIN_WINDOW,
        }
    }

    /// Quiet period that ends a drain.
    pub fn with_drain_window(mut self, window: Duration) -> Self {
        self.drain_window = window;
        self
    }

    /// Bytes received but not yet returned as a line.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn into_inner(self) -> P {
        self.port
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line = self.buffer.split_to(pos + 1);
        line.truncate(pos);
        if line.last() == Some(&b'\r') {
            line.truncate(pos - 1);
        }
        Some(line.to_vec())
    }

    async fn next_line(&mut self) -> Result<Vec<u8>> {
        loop {
            if let Some(line) = self.take_line() {
                return Ok(line);
            }
            if self.buffer.len() > MAX_LINE_LENGTH {
                let len = self.buffer.len();
                self.buffer.clear();
                return Err(LoRaError::Decode(format!(
                    "no line terminator within {len} bytes"
                )));
            }
            let n = self.port.read_buf(&mut self.buffer).await?;
            if n == 0 {
                return Err(LoRaError::SerialPortError("serial line closed".into()));
            }
        }
    }
}

#[async_trait]
impl<P: SerialIo> Transport for LineTransport<P> {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        log::trace!("serial write {} bytes", data.len());
        self.port.write_all(data).await?;
        self.port.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        // read_buf is cancel safe: a partial line stays buffered for drain().
        match tokio::time::timeout(timeout, self.next_line()).await {
            Ok(result) => result,
            Err(_) => Err(LoRaError::Timeout),
        }
    }

    async fn drain(&mut self) -> Result<usize> {
        let mut discarded = self.buffer.len();
        self.buffer.clear();

        while discarded < MAX_DRAIN_BYTES {
            match tokio::time::timeout(self.drain_window, self.port.read_buf(&mut self.buffer)).await
            {
                Err(_) | Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    discarded += n;
                    self.buffer.clear();
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }
        Ok(discarded)
    }
}
