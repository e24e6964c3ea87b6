//! Virtual modem
//!
//! An in-process [`Transport`] that behaves like a GSM modem in command mode:
//! it echoes input while echo is on, answers `AT`, `ATE0` and `ATE1`, rejects
//! unknown commands with `ERROR`, and replays scripted replies. Clones share
//! state, so a test can keep one clone and hand the other to a link.

use super::accumulator::{ERROR_TERMINATOR, OK_TERMINATOR};
use super::transport::{Transport, TransportError};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Scripted answer to a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Bare `OK`
    Ok,
    /// Information lines followed by `OK`
    Lines(Vec<String>),
    /// Bare `ERROR`
    Error,
    /// `+CME ERROR: <code>` with no trailing terminator
    CmeError(String),
    /// Exact bytes
    Raw(Vec<u8>),
    /// Nothing at all
    Silent,
}

impl Reply {
    fn render(&self) -> Vec<u8> {
        match self {
            Self::Ok => OK_TERMINATOR.to_vec(),
            Self::Lines(lines) => {
                let mut out = Vec::new();
                for line in lines {
                    out.extend_from_slice(b"\r\n");
                    out.extend_from_slice(line.as_bytes());
                    out.extend_from_slice(b"\r\n");
                }
                out.extend_from_slice(OK_TERMINATOR);
                out
            }
            Self::Error => ERROR_TERMINATOR.to_vec(),
            Self::CmeError(code) => format!("\r\n+CME ERROR: {code}\r\n").into_bytes(),
            Self::Raw(bytes) => bytes.clone(),
            Self::Silent => Vec::new(),
        }
    }
}

struct Pending {
    ready_at: Instant,
    data: VecDeque<u8>,
    ends_reply: bool,
}

struct ModemState {
    open: bool,
    echo: bool,
    silent: bool,
    hung_up: bool,
    line: Vec<u8>,
    outgoing: VecDeque<Pending>,
    replies: HashMap<String, Reply>,
    chunk_size: usize,
    read_timeout: Duration,
    latency: Duration,
    written: Vec<u8>,
    commands: Vec<String>,
    close_count: usize,
    in_flight: bool,
    interleavings: usize,
}

impl Default for ModemState {
    fn default() -> Self {
        Self {
            open: true,
            echo: true,
            silent: false,
            hung_up: false,
            line: Vec::new(),
            outgoing: VecDeque::new(),
            replies: HashMap::new(),
            chunk_size: 64,
            read_timeout: Duration::from_millis(10),
            latency: Duration::ZERO,
            written: Vec::new(),
            commands: Vec::new(),
            close_count: 0,
            in_flight: false,
            interleavings: 0,
        }
    }
}

impl ModemState {
    fn queue(&mut self, data: Vec<u8>, delay: Duration, ends_reply: bool) {
        if data.is_empty() {
            return;
        }
        self.outgoing.push_back(Pending {
            ready_at: Instant::now() + delay,
            data: data.into(),
            ends_reply,
        });
    }

    fn handle_line(&mut self, raw: &[u8]) {
        let text = String::from_utf8_lossy(raw);
        let command = text.trim_matches(|c: char| c.is_whitespace()).to_string();
        if self.silent {
            return;
        }
        if self.echo {
            let mut echoed = raw.to_vec();
            echoed.push(b'\r');
            self.queue(echoed, Duration::ZERO, false);
        }
        if command.is_empty() {
            return;
        }
        if self.in_flight {
            self.interleavings += 1;
        }
        self.commands.push(command.clone());

        let key = command.to_uppercase();
        let reply = match self.replies.get(&key) {
            Some(reply) => reply.clone(),
            None => match key.as_str() {
                "ATE0" => {
                    self.echo = false;
                    Reply::Ok
                }
                "ATE1" => {
                    self.echo = true;
                    Reply::Ok
                }
                "AT" => Reply::Ok,
                _ => Reply::Error,
            },
        };
        let rendered = reply.render();
        if !rendered.is_empty() {
            self.in_flight = true;
            let latency = self.latency;
            self.queue(rendered, latency, true);
        }
    }
}

/// In-process modem emulation
#[derive(Clone, Default)]
pub struct VirtualModem {
    state: Arc<Mutex<ModemState>>,
}

impl VirtualModem {
    /// A responsive modem with echo on
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `command` (case-insensitive) with `reply`
    #[must_use]
    pub fn with_reply(self, command: &str, reply: Reply) -> Self {
        self.state
            .lock()
            .replies
            .insert(command.trim().to_uppercase(), reply);
        self
    }

    /// Deliver at most `size` bytes per read
    #[must_use]
    pub fn with_chunk_size(self, size: usize) -> Self {
        self.state.lock().chunk_size = size.max(1);
        self
    }

    /// Port-level wait when nothing is available
    #[must_use]
    pub fn with_read_timeout(self, timeout: Duration) -> Self {
        self.state.lock().read_timeout = timeout;
        self
    }

    /// Delay between receiving a command and its reply becoming readable
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state.lock().latency = latency;
        self
    }

    /// Start with echo off
    #[must_use]
    pub fn without_echo(self) -> Self {
        self.state.lock().echo = false;
        self
    }

    /// A modem that never answers
    #[must_use]
    pub fn silent(self) -> Self {
        self.set_silent(true);
        self
    }

    /// Stop or resume answering
    pub fn set_silent(&self, silent: bool) {
        self.state.lock().silent = silent;
    }

    /// Make every following read fail as if the device went away
    pub fn hang_up(&self) {
        self.state.lock().hung_up = true;
    }

    /// Whether echo is currently on
    pub fn echo_enabled(&self) -> bool {
        self.state.lock().echo
    }

    /// Every byte written so far
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    /// Non-empty command lines received, in order
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    /// Number of `close` calls that released the device
    pub fn close_count(&self) -> usize {
        self.state.lock().close_count
    }

    /// Times a command arrived, or the input was cleared, while the previous
    /// reply was still unread
    pub fn interleavings(&self) -> usize {
        self.state.lock().interleavings
    }
}

impl Transport for VirtualModem {
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(TransportError::NotConnected);
        }
        state.written.extend_from_slice(data);
        for &byte in data {
            if byte == b'\r' {
                let line = std::mem::take(&mut state.line);
                state.handle_line(&line);
            } else {
                state.line.push(byte);
            }
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let wait = {
            let mut state = self.state.lock();
            if !state.open {
                return Err(TransportError::NotConnected);
            }
            if state.hung_up {
                return Err(TransportError::Disconnected);
            }
            let now = Instant::now();
            let limit = buf.len().min(state.chunk_size);
            let mut n = 0;
            while n < limit {
                let Some(front) = state.outgoing.front_mut() else { break };
                if front.ready_at > now {
                    break;
                }
                while n < limit {
                    match front.data.pop_front() {
                        Some(byte) => {
                            buf[n] = byte;
                            n += 1;
                        }
                        None => break,
                    }
                }
                if front.data.is_empty() {
                    let ends_reply = front.ends_reply;
                    state.outgoing.pop_front();
                    if ends_reply {
                        state.in_flight = false;
                    }
                }
            }
            if n > 0 {
                return Ok(n);
            }
            match state.outgoing.front() {
                Some(front) => state.read_timeout.min(front.ready_at.saturating_duration_since(now)),
                None => state.read_timeout,
            }
        };
        thread::sleep(wait);
        Ok(0)
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(TransportError::NotConnected);
        }
        if state.in_flight {
            state.interleavings += 1;
            state.in_flight = false;
        }
        state.outgoing.clear();
        Ok(())
    }

    fn clear_output(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(TransportError::NotConnected);
        }
        state.line.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.open {
            state.open = false;
            state.close_count += 1;
        }
        Ok(())
    }

    fn connection_info(&self) -> String {
        "virtual modem".to_string()
    }
}
