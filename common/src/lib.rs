//! Shared model, configuration and address handling for the posprobe workspace.

pub mod config;
pub mod error;
pub mod network;
pub mod printer;
pub mod validation;

pub use error::{PrinterError, PrinterResult};
