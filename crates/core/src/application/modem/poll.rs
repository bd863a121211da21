// Bounded read-until poll over a modem transport

use std::time::Duration;
use tokio::time::Instant;

use super::protocol::ERROR_TOKEN;
use crate::application::shutdown::ShutdownToken;
use crate::port::{ModemTransport, TransportError};

/// Why a poll stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// One of the wanted tokens appeared (carries the token)
    Matched(String),
    /// An error token appeared (`ERROR`, `+CME ERROR`, `+CMS ERROR`)
    Error,
    TimedOut,
    /// The session's shutdown token fired
    Cancelled,
    Transport(TransportError),
}

/// Poll outcome plus every byte received so far, decoded lossily
#[derive(Debug, Clone)]
pub struct PollResult {
    pub outcome: PollOutcome,
    pub text: String,
}

impl PollResult {
    pub fn transport(error: TransportError) -> Self {
        Self {
            text: error.to_string(),
            outcome: PollOutcome::Transport(error),
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self.outcome, PollOutcome::Matched(_))
    }

    pub fn is_cancelled(&self) -> bool {
        self.outcome == PollOutcome::Cancelled
    }
}

/// Accumulate inbound text until a wanted token, an error token, the timeout
/// or shutdown, whichever comes first
///
/// Clears nothing before reading. The error token wins when both are present.
pub async fn read_until<T>(
    transport: &mut T,
    wanted: &[&str],
    timeout: Duration,
    poll_interval: Duration,
    shutdown: &mut ShutdownToken,
) -> PollResult
where
    T: ModemTransport + ?Sized,
{
    let deadline = Instant::now() + timeout;
    let mut buffer: Vec<u8> = Vec::new();

    loop {
        match transport.read_available().await {
            Ok(bytes) => buffer.extend_from_slice(&bytes),
            Err(e) => {
                let mut result = PollResult::transport(e);
                if !buffer.is_empty() {
                    result.text = String::from_utf8_lossy(&buffer).to_string();
                }
                return result;
            }
        }

        let text = String::from_utf8_lossy(&buffer);
        let outcome = if text.contains(ERROR_TOKEN) {
            Some(PollOutcome::Error)
        } else {
            wanted
                .iter()
                .find(|token| text.contains(*token))
                .map(|token| PollOutcome::Matched(token.to_string()))
        };
        if let Some(outcome) = outcome {
            return PollResult {
                outcome,
                text: text.to_string(),
            };
        }

        let now = Instant::now();
        if now >= deadline {
            return PollResult {
                outcome: PollOutcome::TimedOut,
                text: text.to_string(),
            };
        }

        let pause = poll_interval.min(deadline - now);
        if !shutdown.sleep(pause).await {
            return PollResult {
                outcome: PollOutcome::Cancelled,
                text: String::from_utf8_lossy(&buffer).to_string(),
            };
        }
    }
}
