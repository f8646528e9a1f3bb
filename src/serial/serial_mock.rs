//! Mock serial implementations for testing
//!
//! [`MockSerialPort`] stands in for the UART below [`LineTransport`]
//! (byte level). [`MockTransport`] stands in for the whole [`Transport`]
//! (line level) and replays a script of replies while recording every write,
//! so tests can assert exactly what reached the line and how many reads were
//! attempted.
//!
//! [`LineTransport`]: crate::serial::transport::LineTransport

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::error::{LoRaError, Result};
use crate::serial::transport::Transport;

/// Mock serial port that simulates bidirectional communication
///
/// Reads stay pending while nothing is queued, like an idle UART, so
/// timeouts behave as they would on real hardware.
#[derive(Clone, Default)]
pub struct MockSerialPort {
    /// Data written to the port (outgoing)
    pub tx_buffer: Arc<Mutex<Vec<u8>>>,
    /// Data to be read from the port (incoming)
    pub rx_buffer: Arc<Mutex<VecDeque<u8>>>,
    /// Simulated errors
    pub next_error: Arc<Mutex<Option<io::Error>>>,
    closed: Arc<Mutex<bool>>,
    reader: Arc<Mutex<Option<Waker>>>,
}

impl MockSerialPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue data to be read from the port
    pub fn queue_rx_data(&self, data: &[u8]) {
        self.rx_buffer.lock().unwrap().extend(data);
        self.wake_reader();
    }

    /// Queue one response line with its `\r\n` terminator
    pub fn queue_line(&self, line: &str) {
        self.queue_rx_data(format!("{line}\r\n").as_bytes());
    }

    /// Get data that was written to the port
    pub fn get_tx_data(&self) -> Vec<u8> {
        self.tx_buffer.lock().unwrap().clone()
    }

    /// Clear all buffers
    pub fn clear(&self) {
        self.tx_buffer.lock().unwrap().clear();
        self.rx_buffer.lock().unwrap().clear();
    }

    /// Set an error to be returned on the next operation
    pub fn set_next_error(&self, error: io::Error) {
        *self.next_error.lock().unwrap() = Some(error);
    }

    /// Simulate the device going away: pending reads see end-of-stream.
    pub fn close(&self) {
        *self.closed.lock().unwrap() = true;
        self.wake_reader();
    }

    fn wake_reader(&self) {
        if let Some(waker) = self.reader.lock().unwrap().take() {
            waker.wake();
        }
    }
}

impl AsyncRead for MockSerialPort {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Poll::Ready(Err(error));
        }

        let mut rx = self.rx_buffer.lock().unwrap();
        if rx.is_empty() {
            if *self.closed.lock().unwrap() {
                return Poll::Ready(Ok(()));
            }
            *self.reader.lock().unwrap() = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let available = rx.len().min(buf.remaining());
        let data: Vec<u8> = rx.drain(..available).collect();
        buf.put_slice(&data);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockSerialPort {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Poll::Ready(Err(error));
        }

        self.tx_buffer.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// One scripted event on the mock line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// A response line, given without terminator.
    Line(Vec<u8>),
    /// Nothing arrives: the read times out.
    Silence,
    /// A reply that arrives after its command already timed out. A drain
    /// discards it; a plain read returns it as if it were fresh.
    Late(Vec<u8>),
    /// The channel faults.
    IoError(String),
}

#[derive(Default)]
struct MockState {
    script: VecDeque<MockReply>,
    fallback: Option<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    reads: usize,
    drains: usize,
    write_error: Option<String>,
}

/// Scripted [`Transport`] that records every write.
///
/// Cloning shares the script and the records, so a test can keep one clone
/// while the executor owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that answers every read with the same line.
    pub fn always(line: &str) -> Self {
        let mock = Self::new();
        mock.state.lock().unwrap().fallback = Some(line.as_bytes().to_vec());
        mock
    }

    pub fn push(&self, reply: MockReply) -> &Self {
        self.state.lock().unwrap().script.push_back(reply);
        self
    }

    pub fn push_line(&self, line: &str) -> &Self {
        self.push(MockReply::Line(line.as_bytes().to_vec()))
    }

    /// Fail the next write with an I/O error.
    pub fn fail_next_write(&self, message: &str) {
        self.state.lock().unwrap().write_error = Some(message.to_string());
    }

    /// Raw bytes of every write, terminators included.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Every write as text with the `\r\n` terminator removed.
    pub fn written_lines(&self) -> Vec<String> {
        self.writes()
            .iter()
            .map(|w| {
                let text = String::from_utf8_lossy(w);
                text.strip_suffix("\r\n").unwrap_or(&text).to_string()
            })
            .collect()
    }

    pub fn read_count(&self) -> usize {
        self.state.lock().unwrap().reads
    }

    pub fn drain_count(&self) -> usize {
        self.state.lock().unwrap().drains
    }

    /// Scripted replies not consumed yet.
    pub fn remaining(&self) -> usize {
        self.state.lock().unwrap().script.len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.write_error.take() {
            return Err(LoRaError::SerialPortError(message));
        }
        state.writes.push(data.to_vec());
        Ok(())
    }

    async fn read_line(&mut self, _timeout: Duration) -> Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        match state.script.pop_front() {
            Some(MockReply::Line(line)) | Some(MockReply::Late(line)) => Ok(line),
            Some(MockReply::Silence) => Err(LoRaError::Timeout),
            Some(MockReply::IoError(message)) => Err(LoRaError::SerialPortError(message)),
            None => state.fallback.clone().ok_or(LoRaError::Timeout),
        }
    }

    async fn drain(&mut self) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        state.drains += 1;
        let mut discarded = 0;
        while let Some(MockReply::Late(line)) = state.script.front() {
            discarded += line.len() + 2;
            state.script.pop_front();
        }
        Ok(discarded)
    }
}
