// Modem Protocol Driver - one AT-command session over an exclusive serial link

mod batch;
pub mod poll;
pub mod protocol;

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::application::shutdown::ShutdownToken;
use crate::domain::{exit_code, ModemState, SmsSendOutcome};
use crate::port::ModemTransport;
use crate::settings::ModemTimings;
use poll::{read_until, PollResult};
use protocol::collapse;

/// Setup stage at which a session became unusable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultStage {
    /// No `OK` to `AT` after every handshake attempt
    Handshake,
    /// SIM asks for a PIN and none is configured
    PinMissing,
    PinRejected,
    /// SIM never reported `READY` after the PIN was accepted
    PinTimeout,
    TextMode,
    /// Shutdown requested while the session was being prepared
    Interrupted,
}

impl FaultStage {
    /// Process exit code of the SMS sender for this fault
    pub fn exit_code(&self) -> i32 {
        match self {
            FaultStage::Handshake => exit_code::MODEM_UNRESPONSIVE,
            FaultStage::PinMissing | FaultStage::PinRejected | FaultStage::PinTimeout => {
                exit_code::PIN_FAILURE
            }
            FaultStage::TextMode => exit_code::TEXT_MODE,
            FaultStage::Interrupted => exit_code::INTERRUPTED,
        }
    }
}

impl std::fmt::Display for FaultStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FaultStage::Handshake => "modem unresponsive",
            FaultStage::PinMissing => "SIM PIN required but not configured",
            FaultStage::PinRejected => "SIM PIN rejected",
            FaultStage::PinTimeout => "SIM not ready",
            FaultStage::TextMode => "text mode rejected",
            FaultStage::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

/// Fatal session setup failure; ends the invocation, never the process
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage}: {detail}")]
pub struct ProtocolFault {
    pub stage: FaultStage,
    pub detail: String,
    /// Raw modem text that led to the fault
    pub response: String,
}

impl ProtocolFault {
    fn new(stage: FaultStage, detail: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            stage,
            detail: detail.into(),
            response: response.into(),
        }
    }

    fn interrupted(response: impl Into<String>) -> Self {
        Self::new(FaultStage::Interrupted, "shutdown requested", response)
    }
}

/// Stateful AT-command session
///
/// State flow: `Disconnected -> Handshaking -> (PinRequired) -> Ready`, any
/// setup failure ends in `Faulted`. A `Ready` session moves through
/// `Sending` for each message and returns to `Ready` whatever the outcome.
pub struct ModemSession<T: ModemTransport> {
    transport: T,
    timings: ModemTimings,
    shutdown: ShutdownToken,
    state: ModemState,
    pin_required: bool,
}

impl<T: ModemTransport> ModemSession<T> {
    /// Wrap an already opened transport
    pub fn new(transport: T, timings: ModemTimings, shutdown: ShutdownToken) -> Self {
        Self {
            transport,
            timings,
            shutdown,
            state: ModemState::Disconnected,
            pin_required: false,
        }
    }

    pub fn state(&self) -> ModemState {
        self.state
    }

    /// Whether the SIM asked for a PIN during setup
    pub fn pin_required(&self) -> bool {
        self.pin_required
    }

    /// Handshake, configure, unlock the SIM and enter text mode
    pub async fn prepare(&mut self, pin: Option<&str>) -> Result<(), ProtocolFault> {
        self.state = ModemState::Handshaking;
        match self.bring_up(pin).await {
            Ok(()) => {
                self.state = ModemState::Ready;
                info!(pin_required = self.pin_required, "Modem ready");
                Ok(())
            }
            Err(fault) => {
                self.state = ModemState::Faulted;
                error!(
                    stage = ?fault.stage,
                    detail = %fault.detail,
                    response = %collapse(&fault.response),
                    "Modem setup failed"
                );
                Err(fault)
            }
        }
    }

    async fn bring_up(&mut self, pin: Option<&str>) -> Result<(), ProtocolFault> {
        if self.shutdown.is_shutdown() {
            return Err(ProtocolFault::interrupted(""));
        }
        self.handshake().await?;
        self.configure().await?;
        self.unlock_sim(pin).await?;
        self.check_network().await?;
        self.enter_text_mode().await
    }

    async fn handshake(&mut self) -> Result<(), ProtocolFault> {
        let attempts = self.timings.handshake_attempts.max(1);
        let mut last = String::new();
        for attempt in 1..=attempts {
            let reply = self
                .send_command(protocol::HANDSHAKE, protocol::OK, self.timings.command_timeout())
                .await;
            if reply.is_match() {
                debug!(attempt, "Modem answered handshake");
                return Ok(());
            }
            if reply.is_cancelled() {
                return Err(ProtocolFault::interrupted(reply.text));
            }
            warn!(attempt, attempts, response = %collapse(&reply.text), "No OK to AT");
            last = reply.text;

            if attempt < attempts && !self.shutdown.sleep(self.timings.handshake_backoff(attempt)).await {
                return Err(ProtocolFault::interrupted(last));
            }
        }
        Err(ProtocolFault::new(
            FaultStage::Handshake,
            format!("no OK to AT after {} attempts; check power and port", attempts),
            last,
        ))
    }

    /// Echo off and verbose errors; failures only logged
    async fn configure(&mut self) -> Result<(), ProtocolFault> {
        for command in [protocol::ECHO_OFF, protocol::VERBOSE_ERRORS] {
            self.best_effort(command, self.timings.command_timeout()).await?;
        }
        Ok(())
    }

    async fn unlock_sim(&mut self, pin: Option<&str>) -> Result<(), ProtocolFault> {
        let reply = self
            .send_command(protocol::PIN_QUERY, protocol::OK, self.timings.pin_query_timeout())
            .await;
        if reply.is_cancelled() {
            return Err(ProtocolFault::interrupted(reply.text));
        }
        if !reply.text.contains(protocol::SIM_PIN) {
            return Ok(());
        }

        self.pin_required = true;
        self.state = ModemState::PinRequired;
        let Some(pin) = pin else {
            return Err(ProtocolFault::new(
                FaultStage::PinMissing,
                "set modem.sim_pin",
                reply.text,
            ));
        };

        info!("SIM requires PIN; submitting");
        let reply = self
            .send_command(&protocol::submit_pin(pin), protocol::OK, self.timings.pin_submit_timeout())
            .await;
        if reply.is_cancelled() {
            return Err(ProtocolFault::interrupted(reply.text));
        }
        if !reply.is_match() {
            return Err(ProtocolFault::new(FaultStage::PinRejected, "PIN not accepted", reply.text));
        }

        let mut last = String::new();
        for attempt in 1..=self.timings.pin_ready_attempts {
            if !self.shutdown.sleep(self.timings.pin_ready_delay()).await {
                return Err(ProtocolFault::interrupted(last));
            }
            let reply = self
                .send_command(protocol::PIN_QUERY, protocol::OK, self.timings.command_timeout())
                .await;
            if reply.is_cancelled() {
                return Err(ProtocolFault::interrupted(reply.text));
            }
            if reply.text.contains(protocol::SIM_READY) {
                debug!(attempt, "SIM ready");
                return Ok(());
            }
            last = reply.text;
        }
        Err(ProtocolFault::new(
            FaultStage::PinTimeout,
            format!(
                "SIM did not become READY after {} checks",
                self.timings.pin_ready_attempts
            ),
            last,
        ))
    }

    /// Registration and operator are logged, never fatal
    async fn check_network(&mut self) -> Result<(), ProtocolFault> {
        let reg = self
            .best_effort(protocol::REGISTRATION_QUERY, self.timings.command_timeout())
            .await?;
        match protocol::parse_registration(&reg.text) {
            Some(status) if status.is_registered() => info!(status = %status, "Network registration"),
            Some(status) => warn!(status = %status, "Modem not registered on a network"),
            None => warn!(response = %collapse(&reg.text), "Registration status unavailable"),
        }

        let ops = self
            .best_effort(protocol::OPERATOR_QUERY, self.timings.operator_query_timeout())
            .await?;
        if let Some(operator) = protocol::parse_operator(&ops.text) {
            info!(operator = %operator, "Network operator");
        }
        Ok(())
    }

    async fn enter_text_mode(&mut self) -> Result<(), ProtocolFault> {
        let reply = self
            .send_command(protocol::TEXT_MODE, protocol::OK, self.timings.command_timeout())
            .await;
        if reply.is_cancelled() {
            return Err(ProtocolFault::interrupted(reply.text));
        }
        if !reply.is_match() {
            return Err(ProtocolFault::new(
                FaultStage::TextMode,
                "AT+CMGF=1 failed",
                reply.text,
            ));
        }
        for command in [protocol::GSM_CHARSET, protocol::TEXT_PARAMETERS] {
            self.best_effort(command, self.timings.command_timeout()).await?;
        }
        Ok(())
    }

    /// Send one SMS; never fails the session
    pub async fn send(&mut self, recipient: &str, message: &str) -> SmsSendOutcome {
        if self.state != ModemState::Ready {
            warn!(recipient, state = %self.state, "Send refused: modem not ready");
            return SmsSendOutcome::failed(recipient, format!("modem not ready ({})", self.state));
        }
        if let Err(reason) = protocol::validate_recipient(recipient) {
            error!(recipient, reason = %reason, "Invalid recipient");
            return SmsSendOutcome::failed(recipient, reason);
        }

        info!(recipient, "Sending SMS");
        self.state = ModemState::Sending;
        let outcome = self.submit(recipient, message).await;
        self.state = ModemState::Ready;

        if outcome.delivered {
            info!(
                recipient,
                reference = outcome.message_reference.as_deref().unwrap_or("?"),
                "SMS sent"
            );
        } else {
            error!(recipient, response = %collapse(&outcome.raw_response), "SMS not delivered");
        }
        outcome
    }

    async fn submit(&mut self, recipient: &str, message: &str) -> SmsSendOutcome {
        let prompt = self
            .send_command(
                &protocol::submit_message(recipient),
                protocol::PROMPT,
                self.timings.prompt_timeout(),
            )
            .await;
        if !prompt.is_match() {
            // Abort a submission the modem may still be waiting on
            if let Err(e) = self.transport.write(&[protocol::ESC]).await {
                debug!(error = %e, "Could not abort pending submission");
            }
            return SmsSendOutcome::failed(recipient, prompt.text);
        }

        if let Err(e) = self.transport.write(&protocol::encode_payload(message)).await {
            return SmsSendOutcome::failed(recipient, e.to_string());
        }

        let ack = read_until(
            &mut self.transport,
            &[protocol::OK],
            self.timings.ack_timeout(),
            self.timings.poll_interval(),
            &mut self.shutdown,
        )
        .await;
        debug!(outcome = ?ack.outcome, response = %collapse(&ack.text), "<<< message body");

        let reference = protocol::parse_message_reference(&ack.text);
        let delivered = ack.is_match() && reference.is_some();
        SmsSendOutcome {
            recipient: recipient.to_string(),
            delivered,
            raw_response: ack.text,
            message_reference: if delivered { reference } else { None },
        }
    }

    /// Optional step: only shutdown is fatal
    async fn best_effort(&mut self, command: &str, timeout: Duration) -> Result<PollResult, ProtocolFault> {
        let reply = self.send_command(command, protocol::OK, timeout).await;
        if reply.is_cancelled() {
            return Err(ProtocolFault::interrupted(reply.text));
        }
        if !reply.is_match() {
            warn!(command, response = %collapse(&reply.text), "Optional modem command failed");
        }
        Ok(reply)
    }

    /// Clear pending input, write `command\r` and wait for `expect`
    async fn send_command(&mut self, command: &str, expect: &str, timeout: Duration) -> PollResult {
        debug!(">>> {}", command);
        if let Err(e) = self.transport.clear_input().await {
            return PollResult::transport(e);
        }
        let line = format!("{}\r", command);
        if let Err(e) = self.transport.write(line.as_bytes()).await {
            return PollResult::transport(e);
        }
        let reply = read_until(
            &mut self.transport,
            &[expect],
            timeout,
            self.timings.poll_interval(),
            &mut self.shutdown,
        )
        .await;
        debug!(outcome = ?reply.outcome, "<<< {}", collapse(&reply.text));
        reply
    }
}
