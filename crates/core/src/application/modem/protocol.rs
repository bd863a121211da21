// AT command vocabulary: command builders and response parsers

pub const OK: &str = "OK";
/// Also covers `+CME ERROR` and `+CMS ERROR`
pub const ERROR_TOKEN: &str = "ERROR";
pub const PROMPT: &str = ">";
pub const SIM_PIN: &str = "SIM PIN";
pub const SIM_READY: &str = "READY";

pub const CTRL_Z: u8 = 0x1A;
pub const ESC: u8 = 0x1B;

pub const HANDSHAKE: &str = "AT";
pub const ECHO_OFF: &str = "ATE0";
pub const VERBOSE_ERRORS: &str = "AT+CMEE=2";
pub const PIN_QUERY: &str = "AT+CPIN?";
pub const REGISTRATION_QUERY: &str = "AT+CREG?";
pub const OPERATOR_QUERY: &str = "AT+COPS?";
pub const TEXT_MODE: &str = "AT+CMGF=1";
pub const GSM_CHARSET: &str = "AT+CSCS=\"GSM\"";
pub const TEXT_PARAMETERS: &str = "AT+CSMP=17,167,0,0";

pub fn submit_pin(pin: &str) -> String {
    format!("AT+CPIN=\"{}\"", pin)
}

pub fn submit_message(recipient: &str) -> String {
    format!("AT+CMGS=\"{}\"", recipient)
}

/// Recipients are interpolated into a quoted AT argument
pub fn validate_recipient(recipient: &str) -> Result<(), String> {
    if recipient.trim().is_empty() {
        return Err("empty recipient".to_string());
    }
    if recipient.chars().any(|c| c == '"' || c.is_control()) {
        return Err(format!("recipient contains forbidden characters: {:?}", recipient));
    }
    Ok(())
}

/// SMS body bytes: ASCII only, control bytes that end or abort a
/// submission replaced by `?`, terminated by Ctrl-Z
pub fn encode_payload(message: &str) -> Vec<u8> {
    let mut bytes: Vec<u8> = message
        .chars()
        .map(|c| {
            if c.is_ascii() && c as u8 != CTRL_Z && c as u8 != ESC {
                c as u8
            } else {
                b'?'
            }
        })
        .collect();
    bytes.push(CTRL_Z);
    bytes
}

/// Extract `<n>` from `+CMGS: <n>`
pub fn parse_message_reference(text: &str) -> Option<String> {
    let start = text.find("+CMGS:")? + "+CMGS:".len();
    let digits: String = text[start..]
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Network registration status reported by `+CREG: <n>,<stat>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    NotRegistered,
    Home,
    Searching,
    Denied,
    Unknown,
    Roaming,
    Other(u8),
}

impl Registration {
    pub fn is_registered(&self) -> bool {
        matches!(self, Registration::Home | Registration::Roaming)
    }
}

impl std::fmt::Display for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Registration::NotRegistered => write!(f, "not registered"),
            Registration::Home => write!(f, "registered (home)"),
            Registration::Searching => write!(f, "searching"),
            Registration::Denied => write!(f, "registration denied"),
            Registration::Unknown => write!(f, "unknown"),
            Registration::Roaming => write!(f, "registered (roaming)"),
            Registration::Other(code) => write!(f, "status {}", code),
        }
    }
}

pub fn parse_registration(text: &str) -> Option<Registration> {
    let start = text.find("+CREG:")? + "+CREG:".len();
    let line = text[start..].lines().next()?;
    let mut fields = line.split(',').map(str::trim);
    let first = fields.next()?;
    // Unsolicited form carries only <stat>
    let stat = fields.next().unwrap_or(first);
    let code: u8 = stat.parse().ok()?;
    Some(match code {
        0 => Registration::NotRegistered,
        1 => Registration::Home,
        2 => Registration::Searching,
        3 => Registration::Denied,
        4 => Registration::Unknown,
        5 => Registration::Roaming,
        other => Registration::Other(other),
    })
}

/// Operator name from `+COPS: <mode>,<format>,"<oper>"[,<act>]`
pub fn parse_operator(text: &str) -> Option<String> {
    let start = text.find("+COPS:")? + "+COPS:".len();
    let line = text[start..].lines().next()?;
    let open = line.find('"')?;
    let rest = &line[open + 1..];
    let close = rest.find('"')?;
    Some(rest[..close].to_string())
}

/// One-line rendering of a modem response for logs
pub fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_reference() {
        assert_eq!(
            parse_message_reference("\r\n+CMGS: 42\r\n\r\nOK\r\n"),
            Some("42".to_string())
        );
        assert_eq!(parse_message_reference("+CMGS:7"), Some("7".to_string()));
        assert_eq!(parse_message_reference("\r\nOK\r\n"), None);
        assert_eq!(parse_message_reference("+CMGS: \r\nOK"), None);
    }

    #[test]
    fn test_payload_is_ascii_with_ctrl_z() {
        assert_eq!(encode_payload("Power out"), b"Power out\x1A".to_vec());
        assert_eq!(encode_payload("Strøm ute"), b"Str?m ute\x1A".to_vec());
        assert_eq!(encode_payload("a\x1Ab\x1B"), b"a?b?\x1A".to_vec());
    }

    #[test]
    fn test_recipient_validation() {
        assert!(validate_recipient("+15550100").is_ok());
        assert!(validate_recipient("").is_err());
        assert!(validate_recipient("+1\"; AT+CFUN=0").is_err());
        assert!(validate_recipient("+1555\r0100").is_err());
    }

    #[test]
    fn test_registration() {
        assert_eq!(parse_registration("\r\n+CREG: 0,1\r\n\r\nOK"), Some(Registration::Home));
        assert_eq!(parse_registration("+CREG: 0,5"), Some(Registration::Roaming));
        assert_eq!(parse_registration("+CREG: 2"), Some(Registration::Searching));
        assert_eq!(parse_registration("OK"), None);
        assert!(!Registration::Denied.is_registered());
    }

    #[test]
    fn test_operator() {
        assert_eq!(
            parse_operator("\r\n+COPS: 0,0,\"Carrier\",7\r\n\r\nOK"),
            Some("Carrier".to_string())
        );
        assert_eq!(parse_operator("+COPS: 0"), None);
    }

    #[test]
    fn test_collapse() {
        assert_eq!(collapse("\r\n+CPIN: READY\r\n\r\nOK\r\n"), "+CPIN: READY OK");
    }
}
