//! Single-assignment guard bridging callback APIs to futures.
//!
//! Vendor listeners may fire more than once (a late `FAIL` after `SUCCESS`,
//! duplicate read callbacks). A [`Resolver`] accepts the first value and
//! silently drops every later one, so the awaiting side sees exactly one
//! outcome.

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::lock;

pub struct Resolver<T> {
    slot: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> Resolver<T> {
    pub fn new() -> (Arc<Self>, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel::<T>();
        let resolver = Arc::new(Self {
            slot: Mutex::new(Some(tx)),
        });
        (resolver, rx)
    }

    /// Returns `true` only for the call that settled the guard.
    pub fn resolve(&self, value: T) -> bool {
        let sender: Option<oneshot::Sender<T>> = lock(&self.slot).take();
        match sender {
            Some(tx) => {
                // The receiver may already have given up (timeout); that still counts as settled.
                let _ = tx.send(value);
                true
            }
            None => false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        lock(&self.slot).is_none()
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
