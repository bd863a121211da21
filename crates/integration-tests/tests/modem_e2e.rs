//! SMS sender flow: settings file to modem session to batch report
//!
//! The serial line is replaced by the scripted modem; everything above the
//! transport is the production path the `smsgw send` command takes.

use std::path::PathBuf;
use std::time::Duration;

use smsgw_core::application::{shutdown_channel, FaultStage, ModemSession, ShutdownToken};
use smsgw_core::domain::{exit_code, BatchClassification, ModemState};
use smsgw_core::port::modem_transport::mocks::{ScriptedModem, OK};
use smsgw_core::settings::SmsSenderSettings;
use smsgw_infra_system::load_sms_settings;

const PIN_PROMPT: &str = "\r\n+CPIN: SIM PIN\r\n\r\nOK\r\n";
const PIN_READY: &str = "\r\n+CPIN: READY\r\n\r\nOK\r\n";

const SMS_TOML: &str = r#"
[modem]
port = "/dev/ttyUSB2"
sim_pin = "4321"

[sms]
phone_numbers = ["+15550100", "+15550101", "+15550102"]
delay_between_sends_ms = 2000

[sms.messages]
alert_power = "Power outage detected at the cabin"
clear = "Power restored"
"#;

fn load(dir: &tempfile::TempDir) -> SmsSenderSettings {
    let path: PathBuf = dir.path().join("sms.toml");
    std::fs::write(&path, SMS_TOML).unwrap();
    load_sms_settings(&path).unwrap()
}

fn pin_locked_modem() -> ScriptedModem {
    ScriptedModem::compliant()
        .on_seq("AT+CPIN?", &[PIN_PROMPT, PIN_READY])
        .on("AT+CPIN=\"4321\"", OK)
}

/// Property: configured PIN, recipients and message flow through to the modem
#[tokio::test(start_paused = true)]
async fn test_configured_batch_delivers_to_every_recipient() {
    let dir = tempfile::tempdir().unwrap();
    let settings = load(&dir);
    let body = settings.sms.message("alert_power").unwrap().to_string();

    let modem = pin_locked_modem().on_payload("\r\n+CMGS: 42\r\n\r\nOK\r\n");
    let transcript = modem.transcript();
    let mut session = ModemSession::new(modem, settings.modem.timings.clone(), ShutdownToken::never());

    session.prepare(settings.modem.pin()).await.unwrap();
    assert!(session.pin_required());
    assert_eq!(session.state(), ModemState::Ready);

    let started = tokio::time::Instant::now();
    let report = session
        .send_batch(
            &settings.sms.recipients(),
            &body,
            settings.sms.delay_between_sends(),
        )
        .await;

    assert_eq!(report.delivered(), 3);
    assert_eq!(report.classification(), BatchClassification::FullSuccess);
    assert_eq!(report.exit_code(), exit_code::SUCCESS);
    assert_eq!(report.outcomes[0].message_reference.as_deref(), Some("42"));
    // Two gaps between three recipients
    assert!(started.elapsed() >= Duration::from_secs(4));

    let entries = transcript.entries();
    assert_eq!(transcript.count("AT+CPIN=\"4321\""), 1);
    assert_eq!(
        transcript.count("<body:Power outage detected at the cabin>"),
        3
    );
    let submissions: Vec<&String> = entries.iter().filter(|e| e.starts_with("AT+CMGS=")).collect();
    assert_eq!(
        submissions,
        vec![
            "AT+CMGS=\"+15550100\"",
            "AT+CMGS=\"+15550101\"",
            "AT+CMGS=\"+15550102\"",
        ]
    );
    println!("✅ {} of {} delivered", report.delivered(), report.total());
}

/// Property: every body rejected by the network means exit 8
#[tokio::test(start_paused = true)]
async fn test_all_rejected_is_none_delivered() {
    let dir = tempfile::tempdir().unwrap();
    let settings = load(&dir);

    let modem = pin_locked_modem()
        .on_payload("\r\n+CMS ERROR: 38\r\n")
        .on_payload("\r\n+CMS ERROR: 38\r\n")
        .on_payload("\r\n+CMS ERROR: 38\r\n");
    let mut session = ModemSession::new(modem, settings.modem.timings.clone(), ShutdownToken::never());
    session.prepare(settings.modem.pin()).await.unwrap();

    let report = session
        .send_batch(&settings.sms.recipients(), "Power restored", Duration::ZERO)
        .await;

    assert_eq!(report.delivered(), 0);
    assert_eq!(report.classification(), BatchClassification::TotalFailure);
    assert_eq!(report.exit_code(), exit_code::NONE_DELIVERED);
    assert!(report.outcomes.iter().all(|o| o.raw_response.contains("+CMS ERROR")));
}

/// Property: a silent acknowledgement fails only that recipient
#[tokio::test(start_paused = true)]
async fn test_silent_ack_is_partial_delivery() {
    let dir = tempfile::tempdir().unwrap();
    let settings = load(&dir);

    let modem = pin_locked_modem()
        .on_payload("\r\n+CMGS: 7\r\n\r\nOK\r\n")
        .on_payload("")
        .on_payload("\r\n+CMGS: 9\r\n\r\nOK\r\n");
    let mut session = ModemSession::new(modem, settings.modem.timings.clone(), ShutdownToken::never());
    session.prepare(settings.modem.pin()).await.unwrap();

    let report = session
        .send_batch(&settings.sms.recipients(), "Power restored", Duration::ZERO)
        .await;

    let delivered: Vec<bool> = report.outcomes.iter().map(|o| o.delivered).collect();
    assert_eq!(delivered, vec![true, false, true]);
    assert_eq!(report.exit_code(), exit_code::PARTIAL_DELIVERY);
}

/// Property: a PIN-locked SIM without a configured PIN exits 4 before sending
#[tokio::test(start_paused = true)]
async fn test_missing_pin_is_pin_failure() {
    let modem = ScriptedModem::compliant().on("AT+CPIN?", PIN_PROMPT);
    let transcript = modem.transcript();
    let mut session = ModemSession::new(modem, Default::default(), ShutdownToken::never());

    let fault = session.prepare(None).await.unwrap_err();

    assert_eq!(fault.stage, FaultStage::PinMissing);
    assert_eq!(fault.stage.exit_code(), exit_code::PIN_FAILURE);
    assert_eq!(session.state(), ModemState::Faulted);
    assert_eq!(transcript.count("AT+CMGF=1"), 0);
}

/// Property: a modem that never answers AT exits 3
#[tokio::test(start_paused = true)]
async fn test_unresponsive_modem() {
    let modem = ScriptedModem::new().on("AT", "");
    let mut session = ModemSession::new(modem, Default::default(), ShutdownToken::never());

    let fault = session.prepare(None).await.unwrap_err();

    assert_eq!(fault.stage, FaultStage::Handshake);
    assert_eq!(fault.stage.exit_code(), exit_code::MODEM_UNRESPONSIVE);
}

/// Property: a shutdown request during the inter-send delay stops the batch
#[tokio::test(start_paused = true)]
async fn test_shutdown_signal_stops_batch() {
    let dir = tempfile::tempdir().unwrap();
    let settings = load(&dir);
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    let modem = pin_locked_modem();
    let transcript = modem.transcript();
    let mut session = ModemSession::new(modem, settings.modem.timings.clone(), shutdown_rx);
    session.prepare(settings.modem.pin()).await.unwrap();

    let signaller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        shutdown_tx.shutdown();
    });
    let report = session
        .send_batch(
            &settings.sms.recipients(),
            "Power restored",
            Duration::from_secs(10),
        )
        .await;
    signaller.await.unwrap();

    let delivered: Vec<bool> = report.outcomes.iter().map(|o| o.delivered).collect();
    assert_eq!(delivered, vec![true, false, false]);
    assert!(report.interrupted);
    assert_eq!(report.exit_code(), exit_code::PARTIAL_DELIVERY);
    assert_eq!(transcript.count("<body:Power restored>"), 1);
}

/// Property: non-ASCII text is substituted, never sent raw
#[tokio::test(start_paused = true)]
async fn test_non_ascii_body_is_substituted() {
    let modem = ScriptedModem::compliant();
    let transcript = modem.transcript();
    let mut session = ModemSession::new(modem, Default::default(), ShutdownToken::never());
    session.prepare(None).await.unwrap();

    let outcome = session.send("+15550100", "Stromausfall ü").await;

    assert!(outcome.delivered);
    assert_eq!(transcript.count("<body:Stromausfall ?>"), 1);
}
