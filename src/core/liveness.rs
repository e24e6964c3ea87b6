//! Background liveness monitor
//!
//! Pings the modem on a fixed interval from its own thread. The first failed
//! ping is reported once over a channel and the monitor stops, leaving the
//! decision to restart or give up to whoever listens.

use super::error::LinkError;
use super::link::LinkHandle;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error};

/// Liveness monitor settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Run the monitor at all
    pub enabled: bool,
    /// Seconds between pings
    pub interval_secs: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
        }
    }
}

impl LivenessConfig {
    /// Ping interval
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Handle to a running monitor thread
pub struct LivenessMonitor {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl LivenessMonitor {
    /// Start pinging `link` every `interval`. The first ping goes out
    /// immediately. A failure is sent on `failures` and ends the monitor.
    pub fn spawn(
        link: Arc<LinkHandle>,
        interval: Duration,
        failures: Sender<LinkError>,
    ) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let thread = thread::Builder::new()
            .name("liveness".into())
            .spawn(move || run(&link, interval, &stop_rx, &failures))?;
        Ok(Self {
            stop_tx,
            thread: Some(thread),
        })
    }

    /// Stop the monitor and wait for its thread
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for LivenessMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(link: &LinkHandle, interval: Duration, stop: &Receiver<()>, failures: &Sender<LinkError>) {
    loop {
        match link.ping() {
            Ok(()) => debug!("liveness ping ok"),
            Err(e) => {
                error!(error = %e, "liveness check failed");
                let _ = failures.send(e);
                return;
            }
        }
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::{LinkConfig, Status};
    use crate::core::simulator::VirtualModem;

    fn link(modem: &VirtualModem) -> Arc<LinkHandle> {
        let config = LinkConfig::default()
            .with_settle(Duration::ZERO, Duration::ZERO)
            .with_exchange_timeout(Duration::from_millis(80));
        Arc::new(LinkHandle::new(Box::new(modem.clone()), config).unwrap())
    }

    #[test]
    fn test_reports_dead_modem_once() {
        let modem = VirtualModem::new();
        let link = link(&modem);
        let (tx, rx) = crossbeam_channel::unbounded();
        let monitor = LivenessMonitor::spawn(link, Duration::from_millis(20), tx).unwrap();

        modem.set_silent(true);
        let err = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(err, LinkError::LinkDown { status: Status::Timeout, .. }));
        assert!(err.is_link_failure());

        monitor.stop();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stop_healthy_monitor() {
        let modem = VirtualModem::new();
        let link = link(&modem);
        let (tx, rx) = crossbeam_channel::unbounded();
        let monitor = LivenessMonitor::spawn(link.clone(), Duration::from_secs(60), tx).unwrap();

        while link.stats().exchanges == 0 {
            thread::sleep(Duration::from_millis(5));
        }
        monitor.stop();
        assert!(rx.try_recv().is_err());
        assert_eq!(link.stats().successes, 1);
    }
}
