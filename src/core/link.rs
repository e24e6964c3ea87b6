//! Link handle: the entry point callers use to talk to a modem
//!
//! The handle owns its transport exclusively. Every exchange runs under a
//! single mutex, so command N's writes and reads finish before command N+1
//! touches the wire. The lock is released with `unlock_fair`, which hands it
//! to the longest-waiting caller, so contending callers are served in arrival
//! order.

use super::error::LinkError;
use super::handshake::bring_up;
use super::session::{execute, Exchange, LinkConfig, Status};
use super::transport::{SerialConfig, SerialTransport, Transport, TransportError};
use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::{info, warn};

/// Liveness check command
pub const PING: &str = "AT";

/// Exchange counters for a link
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Exchanges attempted
    pub exchanges: u64,
    /// Exchanges that ended with `OK`
    pub successes: u64,
    /// Exchanges rejected by the modem
    pub device_errors: u64,
    /// Exchanges that hit the deadline
    pub timeouts: u64,
    /// Exchanges that failed at the byte-stream level
    pub transport_errors: u64,
    /// Response bytes received
    pub bytes_received: u64,
}

impl LinkStats {
    fn record(&mut self, exchange: &Exchange) {
        self.exchanges += 1;
        self.bytes_received += exchange.response.len() as u64;
        match exchange.status {
            Status::Success => self.successes += 1,
            Status::DeviceError => self.device_errors += 1,
            Status::Timeout => self.timeouts += 1,
            Status::TransportError => self.transport_errors += 1,
        }
    }
}

/// Serialized access to one modem
pub struct LinkHandle {
    transport: Mutex<Option<Box<dyn Transport>>>,
    config: LinkConfig,
    info: String,
    stats: RwLock<LinkStats>,
}

impl LinkHandle {
    /// Open a serial device and bring the modem up
    pub fn open(serial: SerialConfig, config: LinkConfig) -> Result<Self, LinkError> {
        let transport = SerialTransport::open(serial)?;
        Self::new(Box::new(transport), config)
    }

    /// Take ownership of an open transport and bring the modem up.
    ///
    /// The transport is closed again if the handshake fails.
    pub fn new(mut transport: Box<dyn Transport>, config: LinkConfig) -> Result<Self, LinkError> {
        if let Err(e) = bring_up(transport.as_mut(), &config) {
            if let Err(close_err) = transport.close() {
                warn!(error = %close_err, "close after failed handshake failed");
            }
            return Err(e);
        }
        let info = transport.connection_info();
        Ok(Self {
            transport: Mutex::new(Some(transport)),
            config,
            info,
            stats: RwLock::new(LinkStats::default()),
        })
    }

    /// Send one command and wait for its complete response
    pub fn send_command(&self, command: &str) -> Exchange {
        let mut guard = self.transport.lock();
        let exchange = match guard.as_mut() {
            Some(transport) => execute(transport.as_mut(), command, &self.config),
            None => Exchange::failed(command, TransportError::NotConnected),
        };
        MutexGuard::unlock_fair(guard);

        self.stats.write().record(&exchange);
        exchange
    }

    /// Check that the modem answers `AT` with `OK`
    pub fn ping(&self) -> Result<(), LinkError> {
        let exchange = self.send_command(PING);
        if exchange.is_success() {
            Ok(())
        } else {
            Err(LinkError::LinkDown {
                status: exchange.status,
                response: exchange.response_text(),
            })
        }
    }

    /// Release the transport. Further calls do nothing.
    pub fn close(&self) -> Result<(), TransportError> {
        let taken = self.transport.lock().take();
        match taken {
            Some(mut transport) => {
                info!(endpoint = %self.info, "closing link");
                transport.close()
            }
            None => Ok(()),
        }
    }

    /// Whether `close` has run
    pub fn is_closed(&self) -> bool {
        self.transport.lock().is_none()
    }

    /// Description of the underlying endpoint
    pub fn connection_info(&self) -> &str {
        &self.info
    }

    /// Settings this link runs with
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Snapshot of the exchange counters
    pub fn stats(&self) -> LinkStats {
        self.stats.read().clone()
    }
}

impl Drop for LinkHandle {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "close on drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::HandshakePolicy;
    use crate::core::simulator::VirtualModem;
    use std::time::Duration;

    fn fast() -> LinkConfig {
        LinkConfig::default()
            .with_settle(Duration::ZERO, Duration::ZERO)
            .with_exchange_timeout(Duration::from_millis(150))
    }

    #[test]
    fn test_link_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LinkHandle>();
    }

    #[test]
    fn test_ping_and_stats() {
        let modem = VirtualModem::new();
        let link = LinkHandle::new(Box::new(modem.clone()), fast()).unwrap();
        assert!(!modem.echo_enabled());

        link.ping().unwrap();
        let ex = link.send_command("AT+FOO");
        assert_eq!(ex.status, Status::DeviceError);

        let stats = link.stats();
        assert_eq!(stats.exchanges, 2);
        assert_eq!(stats.successes, 1);
        assert_eq!(stats.device_errors, 1);
    }

    #[test]
    fn test_send_after_close() {
        let modem = VirtualModem::new();
        let link = LinkHandle::new(Box::new(modem.clone()), fast()).unwrap();
        link.close().unwrap();
        assert!(link.is_closed());

        let ex = link.send_command("AT");
        assert_eq!(ex.status, Status::TransportError);
        assert!(matches!(ex.fault, Some(TransportError::NotConnected)));
        assert!(matches!(link.ping(), Err(LinkError::LinkDown { status: Status::TransportError, .. })));
    }

    #[test]
    fn test_prime_policy_skips_verification() {
        let modem = VirtualModem::new().silent();
        let config = fast().with_handshake(HandshakePolicy::Prime);
        let link = LinkHandle::new(Box::new(modem.clone()), config).unwrap();
        assert_eq!(modem.written(), b"\r\nATE0\r");
        assert!(!link.is_closed());
    }

    #[test]
    fn test_verify_policy_fails_on_silent_modem() {
        let modem = VirtualModem::new().silent();
        let result = LinkHandle::new(Box::new(modem.clone()), fast());
        match result {
            Err(LinkError::Handshake(inner)) => {
                assert!(matches!(*inner, LinkError::Timeout { .. }));
            }
            _ => panic!("expected handshake failure"),
        }
        assert_eq!(modem.close_count(), 1);
    }
}
