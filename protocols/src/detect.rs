use posprobe_common::printer::PrinterLanguage;

/// ZPL host identification.
pub const ZPL_HOST_ID: &[u8] = b"~HI\r\n";
/// ESC/POS `GS I` extended status query.
pub const ESC_POS_STATUS: &[u8] = &[0x1D, 0x49, 0x43, 0x00];
/// Vendor identification query, replies with a firmware banner.
pub const VENDOR_ID: &[u8] = &[0x1B, 0x69, 0x01];

/// Used when no payload gets an answer, or the answer names nothing we know.
pub const FALLBACK_LANGUAGE: PrinterLanguage = PrinterLanguage::Esc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    ZplHostId,
    EscPosStatus,
    VendorId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageProbe {
    pub kind: ProbeKind,
    pub payload: &'static [u8],
}

/// ZPL goes first: ESC/POS printers ignore `~HI`, while a ZPL printer may
/// answer the ESC/POS status query with something ambiguous.
pub const PROBE_ORDER: [LanguageProbe; 3] = [
    LanguageProbe {
        kind: ProbeKind::ZplHostId,
        payload: ZPL_HOST_ID,
    },
    LanguageProbe {
        kind: ProbeKind::EscPosStatus,
        payload: ESC_POS_STATUS,
    },
    LanguageProbe {
        kind: ProbeKind::VendorId,
        payload: VENDOR_ID,
    },
];

impl LanguageProbe {
    /// Language implied by `reply`, or `None` if the printer stayed silent.
    pub fn classify(&self, reply: &[u8]) -> Option<PrinterLanguage> {
        if reply.is_empty() {
            return None;
        }

        match self.kind {
            ProbeKind::ZplHostId => Some(PrinterLanguage::Zpl),
            ProbeKind::EscPosStatus => Some(PrinterLanguage::Esc),
            ProbeKind::VendorId => Some(classify_banner(reply)),
        }
    }
}

fn classify_banner(reply: &[u8]) -> PrinterLanguage {
    let text: String = String::from_utf8_lossy(reply).to_ascii_uppercase();
    if text.contains("ZPL") {
        PrinterLanguage::Zpl
    } else if text.contains("ESC") {
        PrinterLanguage::Esc
    } else {
        FALLBACK_LANGUAGE
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
