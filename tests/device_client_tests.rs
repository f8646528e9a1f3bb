//! End-to-end tests of `DeviceClient` against scripted transports.

use std::sync::Arc;
use std::time::Duration;

use rn2483::command::CommandCatalog;
use rn2483::error::LoRaError;
use rn2483::serial::{LineTransport, MockReply, MockSerialPort, MockTransport};
use rn2483::{DeviceClient, JoinMode, Pin, PinLevel, TransactionExecutor};

fn client(mock: &MockTransport) -> DeviceClient {
    DeviceClient::new(
        CommandCatalog::standard(),
        Arc::new(TransactionExecutor::new(mock.clone())),
    )
    .with_timeout(Duration::from_millis(100))
}

/// Tests `set_pin` for every pin and both levels.
#[tokio::test]
async fn test_set_pin_all_pins_and_levels() {
    let mock = MockTransport::always("ok");
    let client = client(&mock);

    let mut expected = Vec::new();
    for pin in Pin::all() {
        for level in [PinLevel::Low, PinLevel::High] {
            client.set_pin(pin, level).await.unwrap();
            expected.push(format!("sys set pindig {pin} {level}"));
        }
    }

    assert_eq!(Pin::all().len(), 18);
    assert_eq!(mock.written_lines(), expected);
    assert_eq!(mock.read_count(), expected.len());
}

/// Tests that `set_pin` surfaces a device refusal.
#[tokio::test]
async fn test_set_pin_rejected() {
    let mock = MockTransport::new();
    mock.push_line("invalid_param");
    let err = client(&mock)
        .set_pin(Pin::Gpio(3), PinLevel::High)
        .await
        .unwrap_err();
    assert!(matches!(err, LoRaError::DeviceRejected(ref r) if r == "invalid_param"));
}

/// Tests that each `version()` call is its own transaction.
#[tokio::test]
async fn test_version_is_not_cached() {
    let mock = MockTransport::new();
    mock.push_line("2.1.3").push_line("2.1.3");
    let client = client(&mock);

    assert_eq!(client.version().await.unwrap(), "2.1.3");
    assert_eq!(client.version().await.unwrap(), "2.1.3");
    assert_eq!(mock.written_lines(), vec!["sys get ver", "sys get ver"]);
    assert_eq!(mock.read_count(), 2);
}

/// Tests that a timeout is reported once and nothing else is read.
#[tokio::test]
async fn test_timeout_stops_reading() {
    let mock = MockTransport::new();
    mock.push(MockReply::Silence)
        .push(MockReply::Late(b"RN2483 1.0.5".to_vec()));
    let client = client(&mock);

    let err = client.voltage().await.unwrap_err();
    assert!(matches!(err, LoRaError::Timeout));
    assert_eq!(mock.read_count(), 1);
    assert_eq!(mock.drain_count(), 0);
    assert_eq!(mock.remaining(), 1);
}

/// Tests that the next call after a timeout drains the late reply first.
#[tokio::test]
async fn test_late_reply_is_not_taken_as_next_response() {
    let mock = MockTransport::new();
    mock.push(MockReply::Silence)
        .push(MockReply::Late(b"3300".to_vec()))
        .push_line("2.1.3");
    let client = client(&mock);

    assert!(client.voltage().await.is_err());
    assert!(client.executor().is_stale().await);

    assert_eq!(client.version().await.unwrap(), "2.1.3");
    assert_eq!(mock.drain_count(), 1);
    assert!(!client.executor().is_stale().await);
}

/// Tests that `send(b"AB")` writes `radio tx 4142` after pausing the MAC.
#[tokio::test]
async fn test_send_renders_hex_payload() {
    let mock = MockTransport::new();
    mock.push_line("4294967245")
        .push_line("ok")
        .push_line("radio_tx_ok");
    client(&mock).send(b"AB").await.unwrap();

    let writes = mock.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0], b"mac pause\r\n".to_vec());
    assert_eq!(writes[1], b"radio tx 4142\r\n".to_vec());
}

/// Tests that a failed pause stops the transmission.
#[tokio::test]
async fn test_send_stops_when_pause_rejected() {
    let mock = MockTransport::new();
    mock.push_line("busy");
    let err = client(&mock).send(b"AB").await.unwrap_err();
    assert!(matches!(err, LoRaError::DeviceRejected(ref r) if r == "busy"));
    assert_eq!(mock.written_lines(), vec!["mac pause"]);
}

/// Tests that a write fault is reported as a serial error.
#[tokio::test]
async fn test_write_failure() {
    let mock = MockTransport::new();
    mock.fail_next_write("device unplugged");
    let err = client(&mock).reset().await.unwrap_err();
    assert!(matches!(err, LoRaError::SerialPortError(_)));
    assert_eq!(mock.read_count(), 0);
}

/// Tests that concurrent callers never interleave their exchanges.
#[tokio::test]
async fn test_shared_client_serializes_calls() {
    let mock = MockTransport::always("ok");
    let client = client(&mock);

    let mut tasks = Vec::new();
    for n in 0..8u8 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            client.set_data_rate(n % 8).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(mock.writes().len(), 8);
    assert_eq!(mock.read_count(), 8);
}

/// Tests the full stack down to the byte-level mock port.
#[tokio::test]
async fn test_client_over_line_transport() {
    let port = MockSerialPort::new();
    port.queue_line("RN2483 1.0.5 Oct 31 2018 15:06:52");
    let executor = TransactionExecutor::new(LineTransport::new(port.clone()));
    let client = DeviceClient::new(CommandCatalog::standard(), Arc::new(executor))
        .with_timeout(Duration::from_millis(100));

    assert_eq!(
        client.version().await.unwrap(),
        "RN2483 1.0.5 Oct 31 2018 15:06:52"
    );
    assert_eq!(port.get_tx_data(), b"sys get ver\r\n".to_vec());
}

/// Tests that an idle port times out instead of hanging.
#[tokio::test]
async fn test_line_transport_timeout() {
    let port = MockSerialPort::new();
    let executor = TransactionExecutor::new(LineTransport::new(port));
    let client = DeviceClient::new(CommandCatalog::standard(), Arc::new(executor))
        .with_timeout(Duration::from_millis(20));

    assert!(matches!(client.hardware_eui().await, Err(LoRaError::Timeout)));
}

/// Tests that the status line after `radio tx` is not returned to the next query.
#[tokio::test]
async fn test_send_status_line_is_consumed() {
    let mock = MockTransport::new();
    mock.push_line("4294967245")
        .push_line("ok")
        .push_line("radio_tx_ok")
        .push_line("RN2483 1.0.5");
    let client = client(&mock);

    client.send(b"AB").await.unwrap();
    assert_eq!(client.version().await.unwrap(), "RN2483 1.0.5");
}

/// Tests that the `accepted` line after an OTAA join is not returned to the next query.
#[tokio::test]
async fn test_join_status_line_is_consumed() {
    let mock = MockTransport::new();
    mock.push_line("ok")
        .push_line("accepted")
        .push_line("RN2483 1.0.5");
    let client = client(&mock);

    client.join(JoinMode::Otaa).await.unwrap();
    assert_eq!(client.version().await.unwrap(), "RN2483 1.0.5");
    assert_eq!(mock.written_lines(), vec!["mac join otaa", "sys get ver"]);
}

/// Tests that the tail of an overlong line is drained before the next command.
#[tokio::test]
async fn test_overlong_line_tail_is_drained() {
    let port = MockSerialPort::new();
    let transport =
        LineTransport::new(port.clone()).with_drain_window(Duration::from_millis(100));
    let client = DeviceClient::new(
        CommandCatalog::standard(),
        Arc::new(TransactionExecutor::new(transport)),
    )
    .with_timeout(Duration::from_secs(1));

    let uart = port.clone();
    let feeder = tokio::spawn(async move {
        for _ in 0..11 {
            uart.queue_rx_data(&[b'A'; 100]);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        uart.queue_rx_data(b"AAAAAAAAAA\r\n");
    });

    let err = client.voltage().await.unwrap_err();
    assert!(matches!(err, LoRaError::Decode(_)));
    assert!(client.executor().is_stale().await);

    let uart = port.clone();
    let responder = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        uart.queue_line("2.1.3");
    });

    assert_eq!(client.version().await.unwrap(), "2.1.3");
    feeder.await.unwrap();
    responder.await.unwrap();
}
