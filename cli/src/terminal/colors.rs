use colored::Color;

pub const PRIMARY: Color = Color::BrightGreen;
pub const SECONDARY: Color = Color::Green;
pub const ACCENT: Color = Color::BrightYellow;
pub const SEPARATOR: Color = Color::BrightBlack;
pub const TEXT_DEFAULT: Color = Color::White;

pub const IPV4_ADDR: Color = Color::BrightBlue;
pub const MAC_ADDR: Color = Color::Yellow;
pub const USB_ID: Color = Color::Cyan;
pub const LANGUAGE: Color = Color::BrightMagenta;

pub const STATUS_OK: Color = Color::BrightGreen;
pub const STATUS_BAD: Color = Color::BrightRed;
