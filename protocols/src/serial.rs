use anyhow::bail;
use encoding_rs::GBK;

/// `GS I 68`: ask for the printer's serial number.
pub const SERIAL_NUMBER_QUERY: &[u8] = &[0x1D, 0x49, 0x44];

/// Decodes a serial-number reply.
///
/// Chinese firmware answers in GBK; anything GBK can't decode cleanly is read
/// as UTF-8 instead. Framing bytes (`_` header, NUL terminator) and whitespace
/// are stripped.
pub fn decode_serial_number(reply: &[u8]) -> anyhow::Result<String> {
    let (decoded, _, had_errors) = GBK.decode(reply);
    let text: String = if had_errors {
        String::from_utf8_lossy(reply).into_owned()
    } else {
        decoded.into_owned()
    };

    let serial: &str = text
        .trim_matches(|c: char| c == '\0' || c == '_' || c.is_whitespace() || c.is_control());

    if serial.is_empty() {
        bail!("printer returned an empty serial number");
    }

    Ok(serial.to_string())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
