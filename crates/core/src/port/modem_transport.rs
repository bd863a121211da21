// Modem Transport Port
// Byte-level access to the serial link of an AT-command modem

use async_trait::async_trait;
use thiserror::Error;

/// Serial I/O faults
///
/// Never escapes the driver: mapped to "not delivered" or a handshake fault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Could not open serial port {port}: {reason}")]
    Open { port: String, reason: String },

    #[error("Serial write failed: {0}")]
    Write(String),

    #[error("Serial read failed: {0}")]
    Read(String),
}

/// Exclusive handle on one modem's serial line
///
/// The driver owns the transport for the whole invocation; nothing else may
/// write to the same device concurrently.
#[async_trait]
pub trait ModemTransport: Send {
    /// Write and flush the given bytes
    async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Return whatever bytes are buffered right now (possibly none), without blocking
    async fn read_available(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Discard unread inbound bytes
    async fn clear_input(&mut self) -> Result<(), TransportError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    pub const OK: &str = "\r\nOK\r\n";
    pub const ERROR: &str = "\r\nERROR\r\n";
    pub const PROMPT: &str = "\r\n> ";
    const CTRL_Z: u8 = 0x1A;
    const ESC: u8 = 0x1B;

    /// Shared view of everything written to a `ScriptedModem`
    #[derive(Clone, Default)]
    pub struct Transcript(Arc<Mutex<Vec<String>>>);

    impl Transcript {
        pub fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }

        pub fn count(&self, entry: &str) -> usize {
            self.0.lock().unwrap().iter().filter(|e| *e == entry).count()
        }

        fn record(&self, entry: String) {
            self.0.lock().unwrap().push(entry);
        }
    }

    /// Simulated modem answering commands from scripted replies
    ///
    /// - exact rules take precedence over prefix rules
    /// - a rule with several replies hands them out in order, repeating the last
    /// - an empty reply means silence
    /// - unknown commands answer `ERROR`
    /// - SMS bodies (terminated by Ctrl-Z) are recorded as `<body:...>`
    /// - ESC discards the current line and any pending submission (`<esc>`)
    pub struct ScriptedModem {
        exact: HashMap<String, VecDeque<String>>,
        prefix: Vec<(String, String)>,
        payload_replies: VecDeque<String>,
        next_reference: u32,
        line: Vec<u8>,
        awaiting_payload: bool,
        pending: VecDeque<u8>,
        broken: bool,
        transcript: Transcript,
    }

    impl ScriptedModem {
        pub fn new() -> Self {
            Self {
                exact: HashMap::new(),
                prefix: Vec::new(),
                payload_replies: VecDeque::new(),
                next_reference: 1,
                line: Vec::new(),
                awaiting_payload: false,
                pending: VecDeque::new(),
                broken: false,
                transcript: Transcript::default(),
            }
        }

        /// A healthy modem: no PIN, text mode accepted, every send acknowledged
        pub fn compliant() -> Self {
            Self::new()
                .on("AT", OK)
                .on("ATE0", OK)
                .on("AT+CMEE=2", OK)
                .on("AT+CPIN?", "\r\n+CPIN: READY\r\n\r\nOK\r\n")
                .on("AT+CREG?", "\r\n+CREG: 0,1\r\n\r\nOK\r\n")
                .on("AT+COPS?", "\r\n+COPS: 0,0,\"Carrier\",7\r\n\r\nOK\r\n")
                .on("AT+CMGF=1", OK)
                .on("AT+CSCS=\"GSM\"", OK)
                .on("AT+CSMP=17,167,0,0", OK)
                .on_prefix("AT+CMGS=", PROMPT)
        }

        /// A modem whose serial line fails on every write
        pub fn broken() -> Self {
            let mut modem = Self::new();
            modem.broken = true;
            modem
        }

        pub fn on(self, command: &str, reply: &str) -> Self {
            self.on_seq(command, &[reply])
        }

        pub fn on_seq(mut self, command: &str, replies: &[&str]) -> Self {
            self.exact.insert(
                command.to_string(),
                replies.iter().map(|r| r.to_string()).collect(),
            );
            self
        }

        pub fn on_prefix(mut self, prefix: &str, reply: &str) -> Self {
            self.prefix.insert(0, (prefix.to_string(), reply.to_string()));
            self
        }

        /// Replies to successive SMS bodies (default: `+CMGS: <n>` then `OK`)
        pub fn on_payload(mut self, reply: &str) -> Self {
            self.payload_replies.push_back(reply.to_string());
            self
        }

        pub fn transcript(&self) -> Transcript {
            self.transcript.clone()
        }

        fn reply_for(&mut self, command: &str) -> String {
            if let Some(queue) = self.exact.get_mut(command) {
                return if queue.len() > 1 {
                    queue.pop_front().unwrap_or_default()
                } else {
                    queue.front().cloned().unwrap_or_default()
                };
            }
            self.prefix
                .iter()
                .find(|(p, _)| command.starts_with(p.as_str()))
                .map(|(_, reply)| reply.clone())
                .unwrap_or_else(|| ERROR.to_string())
        }

        fn accept(&mut self, byte: u8) {
            if byte == ESC {
                self.line.clear();
                self.awaiting_payload = false;
                self.transcript.record("<esc>".to_string());
                return;
            }
            if self.awaiting_payload {
                if byte == CTRL_Z {
                    let body = String::from_utf8_lossy(&self.line).to_string();
                    self.line.clear();
                    self.awaiting_payload = false;
                    self.transcript.record(format!("<body:{}>", body));

                    let reply = self.payload_replies.pop_front().unwrap_or_else(|| {
                        let reference = self.next_reference;
                        self.next_reference += 1;
                        format!("\r\n+CMGS: {}\r\n\r\nOK\r\n", reference)
                    });
                    self.pending.extend(reply.bytes());
                } else {
                    self.line.push(byte);
                }
                return;
            }

            match byte {
                b'\r' => {
                    let command = String::from_utf8_lossy(&self.line).trim().to_string();
                    self.line.clear();
                    self.transcript.record(command.clone());

                    let reply = self.reply_for(&command);
                    if command.starts_with("AT+CMGS=") && reply.contains('>') {
                        self.awaiting_payload = true;
                    }
                    self.pending.extend(reply.bytes());
                }
                b'\n' => {}
                other => self.line.push(other),
            }
        }
    }

    impl Default for ScriptedModem {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ModemTransport for ScriptedModem {
        async fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
            if self.broken {
                return Err(TransportError::Write("device disconnected".to_string()));
            }
            for &byte in bytes {
                self.accept(byte);
            }
            Ok(())
        }

        async fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
            if self.broken {
                return Err(TransportError::Read("device disconnected".to_string()));
            }
            Ok(self.pending.drain(..).collect())
        }

        async fn clear_input(&mut self) -> Result<(), TransportError> {
            self.pending.clear();
            Ok(())
        }
    }
}
