//! # Command/Response Transactions
//!
//! The [`TransactionExecutor`] owns the transport and runs one exchange at
//! a time: write the command line with its `\r\n`, read exactly one line
//! back, classify it. The RN2483 protocol has no request identifiers, so a
//! response can only be matched to the request that immediately preceded
//! it. The async mutex around the transport is held across the whole
//! write-then-read pair for that reason.
//!
//! After a timeout, a channel fault or an overlong line the line is marked
//! stale: a late reply (or the rest of a line) may still be on its way. The
//! next transaction drains the line before writing so that reply is not
//! mistaken for its own.
//!
//! Some commands (`mac join`) answer `ok` and then a second line much later.
//! [`TransactionExecutor::execute_deferred`] remembers that a line is owed;
//! the next transaction waits for it and logs it before writing.

use std::fmt;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::command::{Command, CommandId};
use crate::constants::{
    ACK_TOKEN, DEFAULT_COMMAND_TIMEOUT, DEVICE_ERROR_TOKENS, ERROR_PREFIX, LINE_TERMINATOR,
};
use crate::error::{LoRaError, Result};
use crate::serial::transport::Transport;
use crate::util::logging::{log_line_in, log_line_out, LogThrottle};

/// How a response line was classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseKind {
    /// The acknowledgement token.
    Ack,
    /// A device-reported failure with its reason text.
    Err(String),
    /// A value-bearing line (version string, voltage, received data...).
    Data(String),
}

/// Tokens used to classify response lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseTokens {
    /// Compared case-insensitively against the whole line.
    pub ack: String,
    /// A line starting with this is an error; the rest is the reason.
    pub error_prefix: String,
    /// Lines equal to one of these are errors; the word is the reason.
    pub error_words: Vec<String>,
}

impl Default for ResponseTokens {
    fn default() -> Self {
        ResponseTokens {
            ack: ACK_TOKEN.to_string(),
            error_prefix: ERROR_PREFIX.to_string(),
            error_words: DEVICE_ERROR_TOKENS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl ResponseTokens {
    pub fn classify(&self, line: &str) -> ResponseKind {
        if line.eq_ignore_ascii_case(&self.ack) {
            return ResponseKind::Ack;
        }
        if let Some(rest) = line.strip_prefix(self.error_prefix.as_str()) {
            let reason = rest
                .trim_start_matches(|c: char| c == ':' || c.is_whitespace())
                .trim_end();
            return ResponseKind::Err(reason.to_string());
        }
        if self.error_words.iter().any(|w| w == line) {
            return ResponseKind::Err(line.to_string());
        }
        ResponseKind::Data(line.to_string())
    }
}

/// One response line with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    raw: String,
    kind: ResponseKind,
}

impl Response {
    pub fn new(raw: String, tokens: &ResponseTokens) -> Self {
        let kind = tokens.classify(&raw);
        Response { raw, kind }
    }

    /// The line as received, terminator stripped.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> &ResponseKind {
        &self.kind
    }

    pub fn into_kind(self) -> ResponseKind {
        self.kind
    }

    pub fn is_ack(&self) -> bool {
        self.kind == ResponseKind::Ack
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Protocol-level settings shared by the executor and the device facade.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    pub tokens: ResponseTokens,
    /// Deadline for a single command/response exchange.
    pub command_timeout: Duration,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            tokens: ResponseTokens::default(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

struct Channel {
    transport: Box<dyn Transport>,
    stale: bool,
    /// A second reply still owed by an acknowledged command, and how long to wait for it.
    deferred: Option<(CommandId, Duration)>,
    drain_warnings: LogThrottle,
}

impl Channel {
    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            // An overlong line was cut short; its tail is still arriving.
            if e.is_transport_failure() || matches!(e, LoRaError::Decode(_)) {
                self.stale = true;
            }
        }
        result
    }

    async fn settle(&mut self, tokens: &ResponseTokens) {
        let Some((id, wait)) = self.deferred.take() else {
            return;
        };
        match self.receive(wait, tokens).await {
            Ok(response) => match response.kind() {
                ResponseKind::Err(reason) => log::warn!("{id} finished with {reason}"),
                _ => log::info!("{id} finished with {response}"),
            },
            Err(e) => log::debug!("no final reply to {id}: {e}"),
        }
    }

    async fn resync(&mut self) -> Result<()> {
        let dropped = self.transport.drain().await?;
        self.stale = false;
        if dropped > 0 && self.drain_warnings.allow() {
            log::warn!("discarded {dropped} stale bytes before next command");
        }
        Ok(())
    }

    async fn exchange(
        &mut self,
        command: &Command,
        timeout: Duration,
        tokens: &ResponseTokens,
    ) -> Result<Response> {
        self.settle(tokens).await;
        if self.stale {
            self.resync().await?;
        }

        let mut bytes = command.to_bytes();
        bytes.extend_from_slice(LINE_TERMINATOR);
        log_line_out(command.display_line());
        let written = self.transport.write(&bytes).await;
        self.track(written)?;

        self.receive(timeout, tokens).await
    }

    async fn receive(&mut self, timeout: Duration, tokens: &ResponseTokens) -> Result<Response> {
        let read = self.transport.read_line(timeout).await;
        let raw = self.track(read)?;
        let text = String::from_utf8(raw)
            .map_err(|e| LoRaError::Decode(format!("response is not valid text: {e}")))?;
        let text = text.trim_end_matches(['\r', '\n']).to_string();
        log_line_in(&text);
        Ok(Response::new(text, tokens))
    }
}

/// Serializes command/response exchanges on one transport.
pub struct TransactionExecutor {
    channel: Mutex<Channel>,
    tokens: ResponseTokens,
}

impl TransactionExecutor {
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self::with_tokens(transport, ResponseTokens::default())
    }

    pub fn with_tokens<T: Transport + 'static>(transport: T, tokens: ResponseTokens) -> Self {
        TransactionExecutor {
            channel: Mutex::new(Channel {
                transport: Box::new(transport),
                stale: false,
                deferred: None,
                drain_warnings: LogThrottle::new(1000, 5),
            }),
            tokens,
        }
    }

    pub fn tokens(&self) -> &ResponseTokens {
        &self.tokens
    }

    /// Write `command` and read one response line within `timeout`.
    ///
    /// `Timeout` and I/O errors are returned as-is and never retried. A
    /// device error token is a successful exchange carrying
    /// [`ResponseKind::Err`].
    pub async fn execute(&self, command: &Command, timeout: Duration) -> Result<Response> {
        let mut channel = self.channel.lock().await;
        channel.exchange(command, timeout, &self.tokens).await
    }

    /// Like [`execute`](Self::execute), then, if the module acknowledged,
    /// wait up to `followup_timeout` for one more line without releasing
    /// the line in between.
    pub async fn execute_with_followup(
        &self,
        command: &Command,
        timeout: Duration,
        followup_timeout: Duration,
    ) -> Result<(Response, Option<Response>)> {
        let mut channel = self.channel.lock().await;
        let reply = channel.exchange(command, timeout, &self.tokens).await?;
        if !reply.is_ack() {
            return Ok((reply, None));
        }
        let followup = channel.receive(followup_timeout, &self.tokens).await?;
        Ok((reply, Some(followup)))
    }

    /// Like [`execute`](Self::execute), for commands that send a second line
    /// on their own schedule after `ok`. The lock is released once `ok` is
    /// read; the next transaction first waits up to `followup_timeout` for the
    /// owed line and discards it, so it never answers the wrong command.
    pub async fn execute_deferred(
        &self,
        command: &Command,
        timeout: Duration,
        followup_timeout: Duration,
    ) -> Result<Response> {
        let mut channel = self.channel.lock().await;
        let reply = channel.exchange(command, timeout, &self.tokens).await?;
        if reply.is_ack() {
            channel.deferred = Some((command.id(), followup_timeout));
        }
        Ok(reply)
    }

    /// Whether a second reply is still owed by an earlier command.
    pub async fn has_deferred_reply(&self) -> bool {
        self.channel.lock().await.deferred.is_some()
    }

    /// Whether the next exchange will drain the line first.
    pub async fn is_stale(&self) -> bool {
        self.channel.lock().await.stale
    }
}
