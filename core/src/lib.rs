//! # posprobe core
//!
//! Discovery phases, the connection manager, language detection and the
//! [`service::PrinterService`] facade that ties them together.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod connection;
pub mod detector;
pub mod discovery;
pub mod render;
pub mod resolve;
pub mod scanner;
pub mod sdk;
pub mod service;
pub mod tcp;
pub mod usb;
pub mod watcher;

/// Locks a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
