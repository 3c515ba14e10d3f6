//! Byte-level pieces of the printer protocols: identification payloads,
//! status and serial-number decoding, and the command-set seam used by the
//! printer service.

pub mod commands;
pub mod detect;
pub mod serial;
pub mod status;

pub use commands::{Bitmap, CommandSet, EscPosCommands};
