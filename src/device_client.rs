//! # RN2483 Device Client
//!
//! The [`DeviceClient`] is the main entry point for talking to an RN2483.
//! Each method resolves a catalog entry, binds and validates its arguments,
//! runs one exchange through the shared [`TransactionExecutor`] and maps the
//! response to a typed result.
//!
//! Queries return the module's data line as text. Actions expect the `ok`
//! token; an error token becomes [`LoRaError::DeviceRejected`]. Radio
//! operations always pause the LoRaWAN MAC first, since the module refuses
//! raw radio commands while the MAC is running.
//!
//! `radio tx`, `mac tx` and `mac join` answer twice: `ok` when the command is
//! accepted, then a final status line. Transmissions wait for the status
//! line; `join` returns on `ok` and leaves the status line to be consumed by
//! the next exchange.
//!
//! Nothing is cached and nothing is retried: every call is a fresh
//! exchange with the module.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::command::{Args, Command, CommandCatalog, CommandId};
use crate::constants::{
    DEFAULT_COMMAND_TIMEOUT, DEFAULT_FOLLOWUP_TIMEOUT, MAC_RX_PREFIX, MAC_TX_OK, PIN_NAMES,
    RADIO_RX_PREFIX, RADIO_TX_OK,
};
use crate::error::{LoRaError, Result};
use crate::join::JoinMode;
use crate::serial::{open_serial, SerialConfig};
use crate::transaction::{ProtocolConfig, Response, ResponseKind, TransactionExecutor};
use crate::util::hex::{decode_hex, encode_hex_upper};

/// A digital pin of the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pin {
    /// `GPIO0` to `GPIO13`.
    Gpio(u8),
    UartCts,
    UartRts,
    Test0,
    Test1,
}

impl Pin {
    /// Every pin the module exposes to `sys set pindig`.
    pub fn all() -> Vec<Pin> {
        PIN_NAMES.iter().filter_map(|name| name.parse().ok()).collect()
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pin::Gpio(n) => write!(f, "GPIO{n}"),
            Pin::UartCts => f.write_str("UART_CTS"),
            Pin::UartRts => f.write_str("UART_RTS"),
            Pin::Test0 => f.write_str("TEST0"),
            Pin::Test1 => f.write_str("TEST1"),
        }
    }
}

impl FromStr for Pin {
    type Err = LoRaError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.to_ascii_uppercase();
        let pin = match upper.as_str() {
            "UART_CTS" => Pin::UartCts,
            "UART_RTS" => Pin::UartRts,
            "TEST0" => Pin::Test0,
            "TEST1" => Pin::Test1,
            other => other
                .strip_prefix("GPIO")
                .and_then(|n| n.parse::<u8>().ok())
                .map(Pin::Gpio)
                .ok_or_else(|| LoRaError::InvalidArgument {
                    command: CommandId::SysSetPin.name().to_string(),
                    placeholder: "pin".to_string(),
                    reason: format!("'{s}' is not a pin name"),
                })?,
        };
        Ok(pin)
    }
}

/// Output level of a digital pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinLevel {
    Low,
    High,
}

impl From<bool> for PinLevel {
    fn from(high: bool) -> Self {
        if high {
            PinLevel::High
        } else {
            PinLevel::Low
        }
    }
}

impl fmt::Display for PinLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PinLevel::Low => "0",
            PinLevel::High => "1",
        })
    }
}

/// A LoRaWAN downlink delivered after a confirmed uplink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downlink {
    pub port: u8,
    pub payload: Vec<u8>,
}

/// Typed facade over the RN2483 command set.
#[derive(Clone)]
pub struct DeviceClient {
    catalog: Arc<CommandCatalog>,
    executor: Arc<TransactionExecutor>,
    timeout: Duration,
    followup_timeout: Duration,
}

impl DeviceClient {
    pub fn new(catalog: Arc<CommandCatalog>, executor: Arc<TransactionExecutor>) -> Self {
        DeviceClient {
            catalog,
            executor,
            timeout: DEFAULT_COMMAND_TIMEOUT,
            followup_timeout: DEFAULT_FOLLOWUP_TIMEOUT,
        }
    }

    /// Open the serial port and build a client over the standard catalog.
    pub fn open(serial: &SerialConfig, protocol: ProtocolConfig) -> Result<Self> {
        let transport = open_serial(serial)?;
        let executor = TransactionExecutor::with_tokens(transport, protocol.tokens);
        Ok(DeviceClient::new(CommandCatalog::standard(), Arc::new(executor))
            .with_timeout(protocol.command_timeout))
    }

    /// Deadline for each exchange.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Deadline for the final status line of a transmission or join.
    pub fn with_followup_timeout(mut self, timeout: Duration) -> Self {
        self.followup_timeout = timeout;
        self
    }

    pub fn followup_timeout(&self) -> Duration {
        self.followup_timeout
    }

    pub fn executor(&self) -> &Arc<TransactionExecutor> {
        &self.executor
    }

    fn command(&self, id: CommandId, args: Args) -> Result<Command> {
        Command::bind(self.catalog.lookup(id)?, args)
    }

    /// Run any catalog command and return the raw classified response.
    pub async fn transact(&self, id: CommandId, args: Args) -> Result<Response> {
        let command = self.command(id, args)?;
        self.executor.execute(&command, self.timeout).await
    }

    async fn query(&self, id: CommandId) -> Result<String> {
        let response = self.transact(id, Args::new()).await?;
        match response.kind() {
            ResponseKind::Data(payload) => Ok(payload.clone()),
            _ => Err(unexpected(id, "data", &response)),
        }
    }

    async fn action(&self, id: CommandId, args: Args) -> Result<()> {
        let response = self.transact(id, args).await?;
        match response.kind() {
            ResponseKind::Ack => Ok(()),
            ResponseKind::Err(reason) => Err(LoRaError::DeviceRejected(reason.clone())),
            ResponseKind::Data(_) => Err(unexpected(id, "ok", &response)),
        }
    }

    // ------------------------------------------------------------------
    // System queries
    // ------------------------------------------------------------------

    /// Firmware version string, e.g. `RN2483 1.0.5 Oct 31 2018 15:06:52`.
    pub async fn version(&self) -> Result<String> {
        self.query(CommandId::SysVersion).await
    }

    /// Supply voltage in millivolts, as reported.
    pub async fn voltage(&self) -> Result<String> {
        self.query(CommandId::SysVoltage).await
    }

    /// Preprogrammed EUI-64 of the module.
    pub async fn hardware_eui(&self) -> Result<String> {
        self.query(CommandId::SysHardwareEui).await
    }

    /// SNR of the last received radio packet, in dB.
    pub async fn signal_to_noise_ratio(&self) -> Result<String> {
        self.query(CommandId::RadioGetSnr).await
    }

    pub async fn device_address(&self) -> Result<String> {
        self.query(CommandId::MacGetDevAddr).await
    }

    pub async fn device_eui(&self) -> Result<String> {
        self.query(CommandId::MacGetDevEui).await
    }

    pub async fn app_eui(&self) -> Result<String> {
        self.query(CommandId::MacGetAppEui).await
    }

    /// MAC status register as a hex string.
    pub async fn mac_status(&self) -> Result<String> {
        self.query(CommandId::MacGetStatus).await
    }

    // ------------------------------------------------------------------
    // System actions
    // ------------------------------------------------------------------

    pub async fn reset(&self) -> Result<()> {
        self.action(CommandId::SysReset, Args::new()).await
    }

    /// Restore factory defaults, erasing stored keys and settings.
    pub async fn factory_reset(&self) -> Result<()> {
        self.action(CommandId::SysFactoryReset, Args::new()).await
    }

    /// Put the module to sleep for `duration_ms` (100 to 4294967296).
    /// The module answers once it wakes, so the client timeout must exceed
    /// the sleep duration.
    pub async fn sleep(&self, duration_ms: u64) -> Result<()> {
        self.action(CommandId::SysSleep, Args::new().with("ms", duration_ms))
            .await
    }

    pub async fn set_pin(&self, pin: Pin, level: PinLevel) -> Result<()> {
        self.action(
            CommandId::SysSetPin,
            Args::new().with("pin", pin).with("state", level),
        )
        .await
    }

    // ------------------------------------------------------------------
    // MAC configuration
    // ------------------------------------------------------------------

    pub async fn set_network_session_key(&self, key: &str) -> Result<()> {
        self.action(CommandId::MacSetNwkSKey, Args::new().with("key", key))
            .await
    }

    pub async fn set_app_session_key(&self, key: &str) -> Result<()> {
        self.action(CommandId::MacSetAppSKey, Args::new().with("key", key))
            .await
    }

    pub async fn set_app_key(&self, key: &str) -> Result<()> {
        self.action(CommandId::MacSetAppKey, Args::new().with("key", key))
            .await
    }

    pub async fn set_app_eui(&self, eui: &str) -> Result<()> {
        self.action(CommandId::MacSetAppEui, Args::new().with("eui", eui))
            .await
    }

    pub async fn set_device_eui(&self, eui: &str) -> Result<()> {
        self.action(CommandId::MacSetDevEui, Args::new().with("eui", eui))
            .await
    }

    pub async fn set_device_address(&self, address: &str) -> Result<()> {
        self.action(
            CommandId::MacSetDevAddr,
            Args::new().with("address", address),
        )
        .await
    }

    pub async fn set_adaptive_data_rate(&self, enabled: bool) -> Result<()> {
        let state = if enabled { "on" } else { "off" };
        self.action(CommandId::MacSetAdr, Args::new().with("state", state))
            .await
    }

    /// Transmit power index, 0 (highest) to 5 on the 868 MHz band.
    pub async fn set_power_index(&self, index: u8) -> Result<()> {
        self.action(
            CommandId::MacSetPowerIndex,
            Args::new().with("index", index),
        )
        .await
    }

    pub async fn set_data_rate(&self, rate: u8) -> Result<()> {
        self.action(CommandId::MacSetDataRate, Args::new().with("rate", rate))
            .await
    }

    /// Persist the MAC configuration to the module's EEPROM.
    pub async fn save(&self) -> Result<()> {
        self.action(CommandId::MacSave, Args::new()).await
    }

    /// Ask the module to join. `Ok` means the request was accepted; the
    /// network's answer (`accepted` or `denied`) arrives later and is taken
    /// off the line, and logged, by the next exchange.
    pub async fn join(&self, mode: JoinMode) -> Result<()> {
        let command = self.command(CommandId::MacJoin, Args::new().with("mode", mode))?;
        let response = self
            .executor
            .execute_deferred(&command, self.timeout, self.followup_timeout)
            .await?;
        match response.kind() {
            ResponseKind::Ack => Ok(()),
            ResponseKind::Err(reason) => Err(LoRaError::DeviceRejected(reason.clone())),
            ResponseKind::Data(_) => Err(unexpected(CommandId::MacJoin, "ok", &response)),
        }
    }

    /// Pause the LoRaWAN stack. Returns how long, in milliseconds, the MAC
    /// can stay paused without disturbing its schedule.
    pub async fn pause_mac(&self) -> Result<u64> {
        let response = self.transact(CommandId::MacPause, Args::new()).await?;
        match response.kind() {
            ResponseKind::Data(window) => window
                .trim()
                .parse()
                .map_err(|_| unexpected(CommandId::MacPause, "pause window in ms", &response)),
            ResponseKind::Err(reason) => Err(LoRaError::DeviceRejected(reason.clone())),
            ResponseKind::Ack => Err(unexpected(CommandId::MacPause, "pause window in ms", &response)),
        }
    }

    pub async fn resume_mac(&self) -> Result<()> {
        self.action(CommandId::MacResume, Args::new()).await
    }

    /// Leave continuous receive mode.
    pub async fn stop_receive(&self) -> Result<()> {
        self.action(CommandId::RadioRxStop, Args::new()).await
    }

    // ------------------------------------------------------------------
    // Data path
    // ------------------------------------------------------------------

    /// Transmit `payload` as a raw LoRa frame: `mac pause`, then `radio tx`.
    /// Returns once the module reports `radio_tx_ok`.
    pub async fn send(&self, payload: &[u8]) -> Result<()> {
        let tx = self.command(
            CommandId::RadioTx,
            Args::new().with("data", encode_hex_upper(payload)),
        )?;
        self.pause_mac().await?;

        let (reply, status) = self
            .executor
            .execute_with_followup(&tx, self.timeout, self.followup_timeout)
            .await?;
        let status = accepted_for_transmission(CommandId::RadioTx, reply, status)?;
        match status.kind() {
            ResponseKind::Data(line) if line == RADIO_TX_OK => Ok(()),
            ResponseKind::Err(reason) => Err(LoRaError::TransmissionFailed(reason.clone())),
            _ => Err(unexpected(CommandId::RadioTx, RADIO_TX_OK, &status)),
        }
    }

    /// Send a confirmed LoRaWAN uplink on `port` (1 to 223) and wait for the
    /// outcome. A downlink received in the RX windows is returned.
    pub async fn transmit_confirmed(&self, port: u8, payload: &[u8]) -> Result<Option<Downlink>> {
        let tx = self.command(
            CommandId::MacTxConfirmed,
            Args::new()
                .with("port", port)
                .with("data", encode_hex_upper(payload)),
        )?;
        let (reply, status) = self
            .executor
            .execute_with_followup(&tx, self.timeout, self.followup_timeout)
            .await?;
        let status = accepted_for_transmission(CommandId::MacTxConfirmed, reply, status)?;
        match status.kind() {
            ResponseKind::Data(line) if line == MAC_TX_OK => Ok(None),
            ResponseKind::Data(line) if line.starts_with(MAC_RX_PREFIX) => {
                parse_downlink(line).map(Some)
            }
            ResponseKind::Err(reason) => Err(LoRaError::TransmissionFailed(reason.clone())),
            _ => Err(unexpected(CommandId::MacTxConfirmed, MAC_TX_OK, &status)),
        }
    }

    /// Listen for one raw LoRa frame for up to `timeout`.
    ///
    /// Pauses the MAC, arms continuous receive with `radio rx 0`, then waits
    /// for the `radio_rx <hex>` line and returns its decoded payload. If
    /// nothing arrives, listening is stopped with `radio rxstop` before
    /// `Timeout` is returned.
    pub async fn receive(&self, timeout: Duration) -> Result<Vec<u8>> {
        let rx = self.command(CommandId::RadioRx, Args::new().with("size", 0))?;
        self.pause_mac().await?;

        let (reply, followup) = match self
            .executor
            .execute_with_followup(&rx, self.timeout, timeout)
            .await
        {
            Ok(result) => result,
            Err(LoRaError::Timeout) => {
                if let Err(e) = self.stop_receive().await {
                    log::warn!("radio left in receive mode: {e}");
                }
                return Err(LoRaError::Timeout);
            }
            Err(e) => return Err(e),
        };
        match (reply.kind(), followup) {
            (ResponseKind::Ack, Some(line)) => decode_received(line),
            (ResponseKind::Err(reason), _) => Err(LoRaError::ReceptionFailed(reason.clone())),
            _ => Err(unexpected(CommandId::RadioRx, "ok", &reply)),
        }
    }
}

fn unexpected(id: CommandId, expected: &'static str, response: &Response) -> LoRaError {
    LoRaError::UnexpectedResponse {
        command: id.name().to_string(),
        expected,
        response: response.raw().to_string(),
    }
}

/// Check the first reply of a two-line transmission and hand back the status line.
fn accepted_for_transmission(
    id: CommandId,
    reply: Response,
    status: Option<Response>,
) -> Result<Response> {
    match (reply.kind(), status) {
        (ResponseKind::Ack, Some(status)) => Ok(status),
        (ResponseKind::Err(reason), _) => Err(LoRaError::TransmissionFailed(reason.clone())),
        _ => Err(unexpected(id, "ok", &reply)),
    }
}

/// `mac_rx <port> [<hex>]`
fn parse_downlink(line: &str) -> Result<Downlink> {
    let malformed = || LoRaError::Decode(format!("malformed downlink '{line}'"));
    let mut fields = line.split_whitespace().skip(1);
    let port = fields
        .next()
        .and_then(|p| p.parse::<u8>().ok())
        .ok_or_else(malformed)?;
    let payload = match fields.next() {
        Some(hex) => decode_hex(hex).map_err(|e| LoRaError::Decode(format!("downlink payload: {e}")))?,
        None => Vec::new(),
    };
    Ok(Downlink { port, payload })
}

fn decode_received(line: Response) -> Result<Vec<u8>> {
    match line.kind() {
        ResponseKind::Data(text) => {
            let hex = text
                .strip_prefix(RADIO_RX_PREFIX)
                .ok_or_else(|| unexpected(CommandId::RadioRx, "radio_rx", &line))?;
            decode_hex(hex.trim()).map_err(|e| LoRaError::Decode(format!("received payload: {e}")))
        }
        ResponseKind::Err(reason) => Err(LoRaError::ReceptionFailed(reason.clone())),
        ResponseKind::Ack => Err(unexpected(CommandId::RadioRx, "radio_rx", &line)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::serial_mock::{MockReply, MockTransport};

    fn client(mock: &MockTransport) -> DeviceClient {
        let executor = Arc::new(TransactionExecutor::new(mock.clone()));
        DeviceClient::new(CommandCatalog::standard(), executor)
            .with_timeout(Duration::from_millis(50))
    }

    #[test]
    fn test_pin_names_round_trip() {
        let pins = Pin::all();
        assert_eq!(pins.len(), PIN_NAMES.len());
        for (pin, name) in pins.iter().zip(PIN_NAMES) {
            assert_eq!(pin.to_string(), *name);
        }
        assert_eq!("gpio10".parse::<Pin>().unwrap(), Pin::Gpio(10));
        assert!("GPIOX".parse::<Pin>().is_err());
    }

    #[tokio::test]
    async fn test_version_strips_terminator() {
        let mock = MockTransport::new();
        mock.push_line("2.1.3");
        assert_eq!(client(&mock).version().await.unwrap(), "2.1.3");
        assert_eq!(mock.written_lines(), vec!["sys get ver"]);
    }

    #[tokio::test]
    async fn test_query_rejects_ack() {
        let mock = MockTransport::new();
        mock.push_line("ok");
        let err = client(&mock).voltage().await.unwrap_err();
        assert!(matches!(err, LoRaError::UnexpectedResponse { .. }));
    }

    #[tokio::test]
    async fn test_query_rejects_error_token() {
        let mock = MockTransport::new();
        mock.push_line("invalid_param");
        let err = client(&mock).hardware_eui().await.unwrap_err();
        assert!(matches!(err, LoRaError::UnexpectedResponse { .. }));
    }

    #[tokio::test]
    async fn test_action_maps_device_error() {
        let mock = MockTransport::new();
        mock.push_line("ERROR keys_not_init");
        let err = client(&mock).save().await.unwrap_err();
        assert!(matches!(err, LoRaError::DeviceRejected(ref r) if r == "keys_not_init"));
    }

    #[tokio::test]
    async fn test_action_rejects_data() {
        let mock = MockTransport::new();
        mock.push_line("RN2483 1.0.5");
        let err = client(&mock).reset().await.unwrap_err();
        assert!(matches!(
            err,
            LoRaError::UnexpectedResponse { expected: "ok", .. }
        ));
    }

    #[tokio::test]
    async fn test_pause_mac_parses_window() {
        let mock = MockTransport::new();
        mock.push_line("4294967245");
        assert_eq!(client(&mock).pause_mac().await.unwrap(), 4_294_967_245);
    }

    #[tokio::test]
    async fn test_send_pauses_then_transmits_hex() {
        let mock = MockTransport::new();
        mock.push_line("4294967245")
            .push_line("ok")
            .push_line("radio_tx_ok");
        client(&mock).send(b"AB").await.unwrap();
        assert_eq!(mock.written_lines(), vec!["mac pause", "radio tx 4142"]);
    }

    #[tokio::test]
    async fn test_send_reports_transmission_failure() {
        let mock = MockTransport::new();
        mock.push_line("4294967245").push_line("busy");
        let err = client(&mock).send(b"AB").await.unwrap_err();
        assert!(matches!(err, LoRaError::TransmissionFailed(ref r) if r == "busy"));
    }

    #[tokio::test]
    async fn test_send_reports_late_radio_error() {
        let mock = MockTransport::new();
        mock.push_line("4294967245")
            .push_line("ok")
            .push_line("radio_err")
            .push_line("2.1.3");
        let c = client(&mock);

        let err = c.send(b"AB").await.unwrap_err();
        assert!(matches!(err, LoRaError::TransmissionFailed(ref r) if r == "radio_err"));
        assert_eq!(c.version().await.unwrap(), "2.1.3");
    }

    #[tokio::test]
    async fn test_send_without_status_line_times_out() {
        let mock = MockTransport::new();
        mock.push_line("4294967245")
            .push_line("ok")
            .push(MockReply::Silence);
        let c = client(&mock);

        assert!(matches!(c.send(b"AB").await, Err(LoRaError::Timeout)));
        assert!(c.executor().is_stale().await);
    }

    #[tokio::test]
    async fn test_send_rejects_empty_payload_before_io() {
        let mock = MockTransport::new();
        let err = client(&mock).send(b"").await.unwrap_err();
        assert!(matches!(err, LoRaError::InvalidArgument { .. }));
        assert!(mock.writes().is_empty());
    }

    #[tokio::test]
    async fn test_receive_decodes_payload() {
        let mock = MockTransport::new();
        mock.push_line("4294967245")
            .push_line("ok")
            .push_line("radio_rx  48656C6C6F");
        let payload = client(&mock)
            .receive(Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(payload, b"Hello".to_vec());
        assert_eq!(mock.written_lines(), vec!["mac pause", "radio rx 0"]);
    }

    #[tokio::test]
    async fn test_receive_times_out() {
        let mock = MockTransport::new();
        mock.push_line("4294967245")
            .push_line("ok")
            .push(MockReply::Silence)
            .push_line("ok");
        let err = client(&mock)
            .receive(Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, LoRaError::Timeout));
        assert_eq!(
            mock.written_lines(),
            vec!["mac pause", "radio rx 0", "radio rxstop"]
        );
        assert_eq!(mock.remaining(), 0);
    }

    #[tokio::test]
    async fn test_receive_radio_error() {
        let mock = MockTransport::new();
        mock.push_line("4294967245").push_line("ok").push_line("radio_err");
        let err = client(&mock)
            .receive(Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, LoRaError::ReceptionFailed(ref r) if r == "radio_err"));
    }

    #[tokio::test]
    async fn test_transmit_confirmed() {
        let mock = MockTransport::new();
        mock.push_line("ok").push_line("mac_tx_ok");
        let downlink = client(&mock)
            .transmit_confirmed(1, &[0x01, 0xFF])
            .await
            .unwrap();
        assert_eq!(downlink, None);
        assert_eq!(mock.written_lines(), vec!["mac tx cnf 1 01FF"]);
    }

    #[tokio::test]
    async fn test_transmit_confirmed_returns_downlink() {
        let mock = MockTransport::new();
        mock.push_line("ok").push_line("mac_rx 2 CAFE");
        let downlink = client(&mock)
            .transmit_confirmed(1, &[0x01])
            .await
            .unwrap();
        assert_eq!(
            downlink,
            Some(Downlink {
                port: 2,
                payload: vec![0xCA, 0xFE],
            })
        );
    }

    #[tokio::test]
    async fn test_transmit_confirmed_mac_error() {
        let mock = MockTransport::new();
        mock.push_line("ok").push_line("mac_err").push_line("3300");
        let c = client(&mock);

        let err = c.transmit_confirmed(1, &[0x01]).await.unwrap_err();
        assert!(matches!(err, LoRaError::TransmissionFailed(ref r) if r == "mac_err"));
        assert_eq!(c.voltage().await.unwrap(), "3300");
    }

    #[tokio::test]
    async fn test_join_status_line_does_not_answer_next_query() {
        let mock = MockTransport::new();
        mock.push_line("ok").push_line("accepted").push_line("2.1.3");
        let c = client(&mock);

        c.join(JoinMode::Otaa).await.unwrap();
        assert!(c.executor().has_deferred_reply().await);
        assert_eq!(c.version().await.unwrap(), "2.1.3");
        assert_eq!(mock.written_lines(), vec!["mac join otaa", "sys get ver"]);
    }

    #[test]
    fn test_parse_downlink_without_payload() {
        assert_eq!(
            parse_downlink("mac_rx 5").unwrap(),
            Downlink {
                port: 5,
                payload: vec![],
            }
        );
        assert!(parse_downlink("mac_rx x AB").is_err());
    }

    #[tokio::test]
    async fn test_transmit_confirmed_rejects_port_zero() {
        let mock = MockTransport::new();
        let err = client(&mock)
            .transmit_confirmed(0, &[0x01])
            .await
            .unwrap_err();
        assert!(matches!(err, LoRaError::InvalidArgument { .. }));
        assert!(mock.writes().is_empty());
    }

    #[tokio::test]
    async fn test_setters_render_expected_lines() {
        let mock = MockTransport::always("ok");
        let c = client(&mock);
        c.set_adaptive_data_rate(false).await.unwrap();
        c.set_power_index(5).await.unwrap();
        c.set_data_rate(0).await.unwrap();
        c.join(JoinMode::Otaa).await.unwrap();
        c.sleep(1000).await.unwrap();
        assert_eq!(
            mock.written_lines(),
            vec![
                "mac set adr off",
                "mac set pwridx 5",
                "mac set dr 0",
                "mac join otaa",
                "sys sleep 1000",
            ]
        );
    }

    #[tokio::test]
    async fn test_power_index_out_of_range() {
        let mock = MockTransport::always("ok");
        let err = client(&mock).set_power_index(6).await.unwrap_err();
        assert!(matches!(err, LoRaError::InvalidArgument { .. }));
        assert!(mock.writes().is_empty());
    }
}
