use pretty_assertions::assert_eq;
use crossbeam_channel::Receiver;
use serline_core::mock::MockBackend;
use serline_core::{
    RawPortInfo, SendMode, SerialError, SerialEvent, SerialManager, Stats, TransportErrorKind,
};

const PORT: &str = "/dev/ttyUSB0";

fn events(rx: &Receiver<SerialEvent>) -> Vec<SerialEvent> {
    rx.try_iter().collect()
}

fn lines(events: &[SerialEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            SerialEvent::LineReceived(text) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

fn error_events(events: &[SerialEvent]) -> Vec<SerialError> {
    events
        .iter()
        .filter_map(|e| match e {
            SerialEvent::Error(err) => Some(err.clone()),
            _ => None,
        })
        .collect()
}

fn open_manager() -> (MockBackend, SerialManager<MockBackend>, Receiver<SerialEvent>) {
    let device = MockBackend::with_ports(&[PORT]);
    let mut manager = SerialManager::new(device.clone());
    manager.open(PORT, 115_200).expect("mock port opens");
    let rx = manager.subscribe();
    (device, manager, rx)
}

#[test]
fn open_resets_counters() {
    let (device, mut manager, _rx) = open_manager();
    manager.send("hello", SendMode::Text).unwrap();
    device.feed(b"abc\n");
    manager.handle_bytes_available();
    manager.handle_error(TransportErrorKind::Timeout, "write timed out");
    assert_eq!(manager.stats(), Stats { rx_bytes: 4, tx_bytes: 5, errors: 1 });

    manager.open(PORT, 9600).unwrap();
    assert_eq!(manager.stats(), Stats::default());
    assert_eq!(device.opens().len(), 2);
    assert!(device.is_open());
}

#[test]
fn failed_open_keeps_counters_and_reports() {
    let (device, mut manager, rx) = open_manager();
    manager.send("12345", SendMode::Text).unwrap();
    events(&rx);

    device.fail_open(Some("Permission denied"));
    let err = manager.open(PORT, 9600).unwrap_err();
    assert_eq!(err, SerialError::open_failure(TransportErrorKind::Open, "Permission denied"));
    assert!(!manager.is_connected());
    assert!(!device.is_open(), "previous handle is closed before reopening");
    assert_eq!(manager.stats(), Stats { rx_bytes: 0, tx_bytes: 5, errors: 1 });
    assert_eq!(
        events(&rx),
        vec![
            SerialEvent::StatsChanged(Stats { rx_bytes: 0, tx_bytes: 5, errors: 1 }),
            SerialEvent::Error(err),
            SerialEvent::ConnectionChanged(false),
        ]
    );

    manager.close();
    assert_eq!(manager.stats().tx_bytes, 5);
    assert_eq!(manager.stats().errors, 1);
}

#[test]
fn failed_open_counts_one_error() {
    let device = MockBackend::with_ports(&[PORT]);
    let mut manager = SerialManager::new(device.clone());
    device.fail_open(Some("Input/output error"));

    assert!(manager.open(PORT, 9600).is_err());
    assert_eq!(manager.stats().errors, 1);
    assert!(manager.open(PORT, 9600).is_err());
    assert_eq!(manager.stats().errors, 2, "failed opens never reset the counters");

    device.fail_open(None);
    manager.open(PORT, 9600).unwrap();
    assert_eq!(manager.stats(), Stats::default());
}

#[test]
fn open_failure_carries_the_device_kind() {
    let device = MockBackend::with_ports(&[PORT]);
    let mut manager = SerialManager::new(device.clone());
    let rx = manager.subscribe();

    assert!(matches!(
        manager.open("COM9", 9600),
        Err(SerialError::OpenFailure { kind: TransportErrorKind::DeviceNotFound, .. })
    ));

    device.fail_open_with(TransportErrorKind::Unknown, Some("driver said no"));
    let err = manager.open(PORT, 9600).unwrap_err();
    assert_eq!(err, SerialError::open_failure(TransportErrorKind::Unknown, "driver said no"));
    assert_eq!(error_events(&events(&rx)).len(), 2);
    assert_eq!(manager.stats().errors, 2);
}

#[test]
fn open_unknown_port_fails() {
    let mut manager = SerialManager::new(MockBackend::with_ports(&[PORT]));
    assert!(matches!(manager.open("COM9", 9600), Err(SerialError::OpenFailure { .. })));
    assert!(!manager.is_connected());
}

#[test]
fn send_when_closed_fails_without_writing() {
    let device = MockBackend::with_ports(&[PORT]);
    let mut manager = SerialManager::new(device.clone());
    let rx = manager.subscribe();

    for mode in [SendMode::Text, SendMode::Hex] {
        assert_eq!(manager.send("01 02", mode), Err(SerialError::not_open()));
    }
    assert_eq!(manager.stats().tx_bytes, 0);
    assert!(device.written().is_empty());
    assert_eq!(error_events(&events(&rx)).len(), 2);
}

#[test]
fn hex_send_decodes_pairs() {
    let (device, mut manager, _rx) = open_manager();
    assert_eq!(manager.send("01 03 00 00 00 02", SendMode::Hex), Ok(6));
    assert_eq!(device.written(), vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x02]);
    assert_eq!(manager.stats().tx_bytes, 6);
}

#[test]
fn blank_hex_send_is_silent() {
    let (device, mut manager, rx) = open_manager();
    assert_eq!(manager.send("", SendMode::Hex), Ok(0));
    assert_eq!(manager.send("   ", SendMode::Hex), Ok(0));
    assert!(device.written().is_empty());
    assert!(events(&rx).is_empty());
}

#[test]
fn odd_hex_send_fails_without_writing() {
    let (device, mut manager, rx) = open_manager();
    let err = manager.send("0", SendMode::Hex).unwrap_err();
    assert_eq!(err, SerialError::HexDecode(hex::FromHexError::OddLength));
    assert!(device.written().is_empty());
    assert_eq!(manager.stats().tx_bytes, 0);
    assert_eq!(error_events(&events(&rx)), vec![err]);

    assert!(matches!(manager.send("zz", SendMode::Hex), Err(SerialError::HexDecode(_))));
    assert!(device.written().is_empty());
}

#[test]
fn text_send_writes_utf8() {
    let (device, mut manager, rx) = open_manager();
    assert_eq!(manager.send("hello", SendMode::Text), Ok(5));
    assert_eq!(device.written(), vec![0x68, 0x65, 0x6c, 0x6c, 0x6f]);
    assert_eq!(
        events(&rx),
        vec![SerialEvent::StatsChanged(Stats { tx_bytes: 5, ..Stats::default() })]
    );
}

#[test]
fn short_write_counts_only_accepted_bytes() {
    let (device, mut manager, _rx) = open_manager();
    device.set_write_capacity(Some(3));
    assert_eq!(manager.send("hello", SendMode::Text), Ok(3));
    assert_eq!(manager.stats().tx_bytes, 3);
    assert_eq!(device.written(), b"hel");
}

#[test]
fn lines_split_across_reads() {
    let (device, mut manager, rx) = open_manager();

    device.feed(b"AB\nCD");
    assert_eq!(manager.handle_bytes_available(), 5);
    assert_eq!(lines(&events(&rx)), vec!["AB\n"]);
    assert_eq!(manager.pending_bytes(), b"CD");

    device.feed(b"EF\n");
    manager.handle_bytes_available();
    assert_eq!(lines(&events(&rx)), vec!["CDEF\n"]);
    assert!(manager.pending_bytes().is_empty());
    assert_eq!(manager.stats().rx_bytes, 8);
}

#[test]
fn unterminated_bytes_stay_buffered() {
    let (device, mut manager, rx) = open_manager();
    device.feed(b"no newline yet");
    manager.poll();

    let seen = events(&rx);
    assert!(lines(&seen).is_empty());
    assert_eq!(manager.pending_bytes(), b"no newline yet");
    assert_eq!(manager.stats().rx_bytes, 14);
}

#[test]
fn malformed_utf8_still_yields_a_line() {
    let (device, mut manager, rx) = open_manager();
    device.feed(b"T=\xff\xfe\n");
    manager.poll();
    assert_eq!(lines(&events(&rx)), vec!["T=\u{FFFD}\u{FFFD}\n"]);
}

#[test]
fn close_discards_partial_line() {
    let (device, mut manager, rx) = open_manager();
    device.feed(b"half");
    manager.poll();
    manager.close();
    assert!(manager.pending_bytes().is_empty());
    assert!(!device.is_open());
    assert_eq!(events(&rx).last(), Some(&SerialEvent::ConnectionChanged(false)));
}

#[test]
fn close_when_closed_still_notifies() {
    let mut manager = SerialManager::new(MockBackend::new());
    let rx = manager.subscribe();
    manager.close();
    manager.close();
    assert_eq!(
        events(&rx),
        vec![SerialEvent::ConnectionChanged(false), SerialEvent::ConnectionChanged(false)]
    );
}

#[test]
fn each_error_notification_counts_once() {
    let (_device, mut manager, rx) = open_manager();

    manager.handle_error(TransportErrorKind::NoError, "");
    assert_eq!(manager.stats().errors, 0);
    assert!(events(&rx).is_empty());

    manager.handle_error(TransportErrorKind::Resource, "device disconnected");
    manager.handle_error(TransportErrorKind::Read, "parity error");
    assert_eq!(manager.stats().errors, 2);
    assert_eq!(
        error_events(&events(&rx)),
        vec![
            SerialError::Transport {
                kind: TransportErrorKind::Resource,
                message: "device disconnected".into(),
            },
            SerialError::Transport {
                kind: TransportErrorKind::Read,
                message: "parity error".into(),
            },
        ]
    );
    assert!(manager.is_connected(), "errors never close the port");
}

#[test]
fn enumerate_with_no_ports() {
    let mut manager = SerialManager::new(MockBackend::new());
    assert!(manager.refresh_ports().is_empty());
    assert!(manager.port_names().is_empty());
}

#[test]
fn enumerate_builds_labels() {
    let device = MockBackend::new();
    let mut manager = SerialManager::new(device.clone());
    let rx = manager.subscribe();
    device.set_ports(vec![
        RawPortInfo {
            name: "COM3".into(),
            description: Some("USB-SERIAL CH340".into()),
            manufacturer: Some("wch.cn".into()),
        },
        RawPortInfo {
            name: "COM4".into(),
            description: None,
            manufacturer: Some("FTDI".into()),
        },
        RawPortInfo {
            name: "COM5".into(),
            ..Default::default()
        },
    ]);

    manager.refresh_ports();
    assert_eq!(manager.port_names(), vec!["COM3", "COM4", "COM5"]);
    assert_eq!(
        manager.port_labels(),
        vec!["USB-SERIAL CH340 (wch.cn)", "FTDI", "unknown device"]
    );
    assert_eq!(events(&rx).last(), Some(&SerialEvent::PortListChanged));
}
