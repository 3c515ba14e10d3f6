use std::fmt;

/// `DLE EOT 2`: real-time offline-cause status.
pub const OFFLINE_STATUS_QUERY: &[u8] = &[0x10, 0x04, 0x02];
/// ZPL host status request.
pub const ZPL_HOST_STATUS_QUERY: &[u8] = b"~HS\r\n";

const COVER_OPEN: u8 = 1 << 2;
const FEED_BUTTON: u8 = 1 << 3;
const PAPER_END: u8 = 1 << 5;
const ERROR: u8 = 1 << 6;
/// Bits 1 and 4 are always set and bits 0 and 7 always clear in a status byte.
const FIXED_MASK: u8 = 0b1001_0011;
const FIXED_BITS: u8 = 0b0001_0010;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Normal,
    CoverOpen,
    PaperEmpty,
    FeedButtonPressed,
    PrinterError,
    Unknown,
    Disconnected,
    Timeout,
}

impl StatusKind {
    pub fn code(&self) -> i32 {
        match self {
            StatusKind::Normal => 0,
            StatusKind::CoverOpen => 1,
            StatusKind::PaperEmpty => 2,
            StatusKind::FeedButtonPressed => 3,
            StatusKind::PrinterError => 4,
            StatusKind::Unknown => -1,
            StatusKind::Disconnected => -3,
            StatusKind::Timeout => -4,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            StatusKind::Normal => "Normal status",
            StatusKind::CoverOpen => "Cover open",
            StatusKind::PaperEmpty => "Paper empty",
            StatusKind::FeedButtonPressed => "Press the paper feed button",
            StatusKind::PrinterError => "Printer error",
            StatusKind::Unknown => "Unknown status",
            StatusKind::Disconnected => "Printer disconnected",
            StatusKind::Timeout => "Status request timed out",
        }
    }

    /// Codes below zero and explicit error states are failures.
    pub fn is_ok(&self) -> bool {
        self.code() >= 0 && *self != StatusKind::PrinterError
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrinterStatus {
    pub kind: StatusKind,
    pub raw: Option<u8>,
}

impl PrinterStatus {
    pub fn new(kind: StatusKind) -> Self {
        Self { kind, raw: None }
    }

    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    pub fn message(&self) -> &'static str {
        self.kind.message()
    }
}

impl fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

/// Decodes the first byte of a `DLE EOT 2` reply.
///
/// When several conditions are flagged the most actionable one wins: an
/// error beats an open cover, which beats paper-out, which beats the feed
/// button.
pub fn decode_offline_status(reply: &[u8]) -> PrinterStatus {
    let Some(&byte) = reply.first() else {
        return PrinterStatus::new(StatusKind::Timeout);
    };

    let kind: StatusKind = if byte & FIXED_MASK != FIXED_BITS {
        StatusKind::Unknown
    } else if byte & ERROR != 0 {
        StatusKind::PrinterError
    } else if byte & COVER_OPEN != 0 {
        StatusKind::CoverOpen
    } else if byte & PAPER_END != 0 {
        StatusKind::PaperEmpty
    } else if byte & FEED_BUTTON != 0 {
        StatusKind::FeedButtonPressed
    } else {
        StatusKind::Normal
    };

    PrinterStatus { kind, raw: Some(byte) }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
