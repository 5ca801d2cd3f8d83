//! Decoding of Zephyr read-back responses
//!
//! Legacy settings come back as the AT command the unit replays on boot.
//! New-style settings come back as a hex dump of the EEPROM field: the string,
//! a NUL terminator, then `0xFF` padding.

use std::sync::OnceLock;

use regex::Regex;

fn apn_command() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^AT\+CSTT=(".*",".*",".*")"#).expect("valid APN pattern"))
}

fn server_command() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^AT\+CIPSTART="TCP","(.*)",".*""#).expect("valid server pattern")
    })
}

/// Drop the one-character status prefix of a QN/QE response
pub fn strip_status(response: &str) -> &str {
    let mut chars = response.chars();
    chars.next();
    chars.as_str()
}

/// Decode a NUL-terminated string from an EEPROM hex dump
///
/// Bytes map one-to-one onto chars. The field may be empty.
pub fn decode_nt_hex(hex_dump: &str) -> Result<String, hex::FromHexError> {
    let bytes = hex::decode(hex_dump.trim())?;
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    Ok(bytes[..end].iter().map(|&b| char::from(b)).collect())
}

/// Extract `"apn","user","password"` from an `AT+CSTT=` command
pub fn parse_apn_command(command: &str) -> Option<&str> {
    apn_command()
        .captures(command)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Extract the host from an `AT+CIPSTART="TCP",...` command
pub fn parse_server_command(command: &str) -> Option<&str> {
    server_command()
        .captures(command)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// The new APN field carries two trailing characters after the whitelisted
/// `"apn","user","password"` form; drop them for comparison.
pub fn trim_apn_suffix(apn: &str) -> &str {
    match apn.char_indices().rev().nth(1) {
        Some((index, _)) => &apn[..index],
        None => "",
    }
}
