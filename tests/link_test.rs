//! End-to-end behaviour of the link against the virtual modem

use cellular_core::{
    HandshakePolicy, LinkConfig, LinkError, LinkHandle, Reply, Status, Transport, TransportError,
    VirtualModem,
};
use mockall::mock;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn fast() -> LinkConfig {
    LinkConfig::default()
        .with_settle(Duration::ZERO, Duration::ZERO)
        .with_exchange_timeout(Duration::from_millis(200))
}

fn connect(modem: &VirtualModem) -> LinkHandle {
    LinkHandle::new(Box::new(modem.clone()), fast()).expect("handshake")
}

#[test]
fn test_at_yields_exact_ok() {
    let modem = VirtualModem::new();
    let link = connect(&modem);

    let ex = link.send_command("AT");
    assert_eq!(ex.status, Status::Success);
    assert_eq!(ex.response_text(), "\r\nOK\r\n");
}

#[test]
fn test_cme_error_is_device_error() {
    let modem = VirtualModem::new().with_reply("AT+X", Reply::CmeError("10".into()));
    let link = connect(&modem);

    let ex = link.send_command("AT+X");
    assert_eq!(ex.status, Status::DeviceError);
    assert_eq!(ex.response_text(), "\r\n+CME ERROR: 10\r\n");
}

#[test]
fn test_cme_error_followed_by_ok_is_still_device_error() {
    let modem = VirtualModem::new()
        .with_chunk_size(4)
        .with_reply("AT+CPIN?", Reply::Raw(b"\r\n+CME ERROR: 10\r\n\r\nOK\r\n".to_vec()));
    let link = connect(&modem);

    let ex = link.send_command("AT+CPIN?");
    assert_eq!(ex.status, Status::DeviceError);
    assert_eq!(ex.cme_error_code().as_deref(), Some("10"));
}

#[test]
fn test_single_byte_chunks_reassemble() {
    let modem = VirtualModem::new()
        .with_chunk_size(1)
        .with_reply("AT+CSQ", Reply::Lines(vec!["+CSQ: 21,0".into()]));
    let link = connect(&modem);

    let ex = link.send_command("AT+CSQ");
    assert!(ex.is_success());
    assert_eq!(ex.response_text(), "\r\n+CSQ: 21,0\r\n\r\nOK\r\n");
}

#[test]
fn test_timeout_bounded_and_keeps_partial_bytes() {
    let port_interval = Duration::from_millis(50);
    let modem = VirtualModem::new()
        .with_read_timeout(port_interval)
        .with_reply("AT+CCLK?", Reply::Raw(b"\r\n+CCLK: \"24/01".to_vec()));
    let link = connect(&modem);

    let started = Instant::now();
    let ex = link.send_command("AT+CCLK?");
    let took = started.elapsed();

    assert_eq!(ex.status, Status::Timeout);
    assert_eq!(ex.response_text(), "\r\n+CCLK: \"24/01");
    assert!(ex.elapsed >= Duration::from_millis(200));
    assert!(took < Duration::from_millis(200) + port_interval + Duration::from_millis(100));
}

#[test]
fn test_concurrent_commands_never_interleave() {
    let modem = VirtualModem::new()
        .with_chunk_size(3)
        .with_latency(Duration::from_millis(2))
        .with_read_timeout(Duration::from_millis(1));
    let link = Arc::new(connect(&modem));
    // The handshake discards the primed ATE0 reply on purpose.
    let baseline = modem.interleavings();

    let workers: Vec<_> = (0..6)
        .map(|n| {
            let link = Arc::clone(&link);
            thread::spawn(move || {
                for _ in 0..8 {
                    let ex = link.send_command("AT");
                    assert!(ex.is_success(), "worker {n}: {:?}", ex.status);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(modem.interleavings(), baseline);
    assert_eq!(link.stats().successes, 48);

    // After the handshake every exchange is exactly "\r" + "AT\r" on the wire.
    let wire = modem.written();
    let handshake = b"\r\nATE0\r\rATE0\r";
    assert!(wire.starts_with(handshake));
    assert_eq!(&wire[handshake.len()..], b"\rAT\r".repeat(48).as_slice());
}

#[test]
fn test_close_twice() {
    let modem = VirtualModem::new();
    let link = connect(&modem);

    link.close().unwrap();
    link.close().unwrap();
    drop(link);
    assert_eq!(modem.close_count(), 1);
}

#[test]
fn test_close_after_failed_command() {
    let modem = VirtualModem::new();
    let link = connect(&modem);

    modem.hang_up();
    let ex = link.send_command("AT+CSQ");
    assert_eq!(ex.status, Status::TransportError);
    assert!(matches!(
        ex.into_result(),
        Err(LinkError::Transport { source: TransportError::Disconnected, .. })
    ));

    link.close().unwrap();
    assert!(link.is_closed());
    assert_eq!(modem.close_count(), 1);
}

#[test]
fn test_ping_failure_is_link_down() {
    let modem = VirtualModem::new();
    let link = connect(&modem);
    link.ping().unwrap();

    modem.set_silent(true);
    match link.ping() {
        Err(e @ LinkError::LinkDown { status: Status::Timeout, .. }) => assert!(e.is_link_failure()),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_device_error_is_not_link_failure() {
    let modem = VirtualModem::new();
    let link = connect(&modem);

    let err = link.send_command("AT+NOPE").into_result().unwrap_err();
    assert!(matches!(err, LinkError::Device { .. }));
    assert!(!err.is_link_failure());
}

#[test]
fn test_handshake_disables_echo() {
    let modem = VirtualModem::new();
    assert!(modem.echo_enabled());
    let _link = connect(&modem);
    assert!(!modem.echo_enabled());
    assert_eq!(modem.commands(), vec!["ATE0".to_string(), "ATE0".to_string()]);
}

mock! {
    Port {}

    impl Transport for Port {
        fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
        fn clear_input(&mut self) -> Result<(), TransportError>;
        fn clear_output(&mut self) -> Result<(), TransportError>;
        fn close(&mut self) -> Result<(), TransportError>;
        fn connection_info(&self) -> String;
    }
}

#[test]
fn test_write_failure_surfaces_without_reading() {
    let mut port = MockPort::new();
    // Once for the handshake, once for the exchange.
    port.expect_clear_input().times(2).returning(|| Ok(()));
    port.expect_clear_output().times(1).returning(|| Ok(()));
    port.expect_write_all()
        .withf(|data| !data.starts_with(b"AT+CSQ"))
        .returning(|_| Ok(()));
    port.expect_write_all()
        .withf(|data| data.starts_with(b"AT+CSQ"))
        .times(1)
        .returning(|_| {
            Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "unplugged",
            )))
        });
    port.expect_read().never();
    port.expect_connection_info().returning(|| "mock".to_string());
    port.expect_close().times(1).returning(|| Ok(()));

    let config = fast().with_handshake(HandshakePolicy::Prime);
    let link = LinkHandle::new(Box::new(port), config).unwrap();

    let ex = link.send_command("AT+CSQ");
    assert_eq!(ex.status, Status::TransportError);
    assert!(ex.response.is_empty());
    assert!(matches!(ex.fault, Some(TransportError::Io(_))));
    link.close().unwrap();
}

#[test]
fn test_failed_close_keeps_handshake_error() {
    let mut port = MockPort::new();
    port.expect_clear_input().times(1).returning(|| Ok(()));
    port.expect_clear_output().times(1).returning(|| Ok(()));
    port.expect_write_all()
        .times(1)
        .returning(|_| Err(TransportError::Disconnected));
    port.expect_read().never();
    port.expect_close()
        .times(1)
        .returning(|| Err(TransportError::NotConnected));

    let config = fast().with_handshake(HandshakePolicy::Prime);
    match LinkHandle::new(Box::new(port), config) {
        Err(LinkError::Handshake(inner)) => {
            assert!(matches!(
                *inner,
                LinkError::Transport { source: TransportError::Disconnected, .. }
            ));
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("handshake should fail"),
    }
}
