//! # Language Detection
//!
//! Asks a printer which command language it speaks by sending the
//! identification payloads in [`PROBE_ORDER`] one at a time. The first reply
//! that classifies wins; a printer that answers nothing is taken for ESC/POS.

use std::time::Duration;

use posprobe_common::config::{Config, RetryPolicy};
use posprobe_common::printer::{DeviceIdentity, PrinterLanguage};
use posprobe_protocols::detect::{FALLBACK_LANGUAGE, LanguageProbe, PROBE_ORDER};
use tracing::{debug, trace, warn};

use crate::connection::ConnectionManager;
use crate::sdk::{self, DeviceConnection};

pub struct LanguageDetector {
    attempt_timeout: Duration,
    retry: RetryPolicy,
}

impl LanguageDetector {
    pub fn new(config: &Config) -> Self {
        Self {
            attempt_timeout: config.detection_timeout,
            retry: config.detection_retry,
        }
    }

    /// Runs the probe sequence over an already connected handle.
    pub async fn detect(&self, connection: &dyn DeviceConnection) -> PrinterLanguage {
        for probe in PROBE_ORDER {
            if let Some(language) = self.attempt(connection, &probe).await {
                debug!(kind = ?probe.kind, %language, "language identified");
                return language;
            }
        }

        debug!(fallback = %FALLBACK_LANGUAGE, "no identification reply");
        FALLBACK_LANGUAGE
    }

    /// Opens a transient connection to `identity` and detects over it.
    /// Anything that prevents connecting yields `Unknown`.
    pub async fn detect_identity(&self, manager: &ConnectionManager, identity: &DeviceIdentity) -> PrinterLanguage {
        let detected = manager
            .execute_with_retry(identity, self.retry, |handle| async move {
                Ok(self.detect(handle.as_ref()).await)
            })
            .await;

        match detected {
            Ok(language) => language,
            Err(e) => {
                warn!(%identity, error = %e, "language detection could not connect");
                PrinterLanguage::Unknown
            }
        }
    }

    async fn attempt(&self, connection: &dyn DeviceConnection, probe: &LanguageProbe) -> Option<PrinterLanguage> {
        match sdk::request(connection, probe.payload, self.attempt_timeout).await {
            Ok(Some(reply)) => probe.classify(&reply),
            Ok(None) => {
                trace!(kind = ?probe.kind, "no reply");
                None
            }
            Err(e) => {
                trace!(kind = ?probe.kind, error = %e, "probe not sent");
                None
            }
        }
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
