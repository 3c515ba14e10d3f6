use anyhow::bail;
use posprobe_common::validation::NetworkSettings;

use crate::serial::SERIAL_NUMBER_QUERY;
use crate::status::OFFLINE_STATUS_QUERY;

/// A 1-bit raster, row-major, `true` meaning a printed dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub dots: Vec<bool>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32, dots: Vec<bool>) -> anyhow::Result<Self> {
        let expected: usize = width as usize * height as usize;
        if dots.len() != expected {
            bail!("bitmap {width}x{height} needs {expected} dots, got {}", dots.len());
        }
        Ok(Self { width, height, dots })
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn bytes_per_row(&self) -> usize {
        (self.width as usize).div_ceil(8)
    }

    /// Rows packed MSB-first, padded to whole bytes.
    pub fn packed_rows(&self) -> Vec<u8> {
        let row_bytes: usize = self.bytes_per_row();
        let mut packed: Vec<u8> = vec![0u8; row_bytes * self.height as usize];

        for (i, dot) in self.dots.iter().enumerate() {
            if !*dot {
                continue;
            }
            let x: usize = i % self.width as usize;
            let y: usize = i / self.width as usize;
            packed[y * row_bytes + x / 8] |= 0x80 >> (x % 8);
        }

        packed
    }
}

/// Byte sequences for the handful of commands the printer service issues.
///
/// Anything beyond these (text layout, barcodes, label formats) is the
/// caller's business and goes through raw printing.
pub trait CommandSet: Send + Sync {
    fn initialize(&self) -> Vec<u8>;

    fn raster(&self, bitmap: &Bitmap) -> Vec<u8>;

    /// Feed past the tear bar and partially cut.
    fn cut(&self) -> Vec<u8>;

    fn drawer_pulse(&self) -> Vec<u8>;

    fn status_query(&self) -> &'static [u8] {
        OFFLINE_STATUS_QUERY
    }

    fn serial_query(&self) -> &'static [u8] {
        SERIAL_NUMBER_QUERY
    }

    /// Vendor command that rewrites the printer's IP configuration.
    fn set_network(&self, _settings: &NetworkSettings) -> anyhow::Result<Vec<u8>> {
        bail!("this command set cannot change network settings")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EscPosCommands;

impl CommandSet for EscPosCommands {
    fn initialize(&self) -> Vec<u8> {
        vec![0x1B, 0x40]
    }

    fn raster(&self, bitmap: &Bitmap) -> Vec<u8> {
        let x_bytes: u16 = bitmap.bytes_per_row() as u16;
        let y_dots: u16 = bitmap.height as u16;
        let mut buf: Vec<u8> = Vec::with_capacity(8 + bitmap.bytes_per_row() * bitmap.height as usize);

        // GS v 0, normal density
        buf.extend_from_slice(&[0x1D, 0x76, 0x30, 0x00]);
        buf.extend_from_slice(&x_bytes.to_le_bytes());
        buf.extend_from_slice(&y_dots.to_le_bytes());
        buf.extend_from_slice(&bitmap.packed_rows());
        buf
    }

    fn cut(&self) -> Vec<u8> {
        vec![0x1D, 0x56, 0x42, 0x01]
    }

    fn drawer_pulse(&self) -> Vec<u8> {
        vec![0x1B, 0x70, 0x00, 25, 250]
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
