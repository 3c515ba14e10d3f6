use std::time::Duration;

/// Tunables for discovery and connection handling.
///
/// Nothing here is persisted; the CLI fills it in from flags and library users
/// start from [`Config::default`].
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// TCP port probed on every host of every local subnet.
    pub probe_port: u16,
    /// Connect timeout of a single port probe.
    pub probe_timeout: Duration,
    /// Upper bound on concurrently connecting probes.
    pub max_concurrent_probes: usize,
    /// Hard limit on the vendor broadcast search.
    pub broadcast_window: Duration,
    /// How often the broadcast primitive's `is_searching` flag is polled.
    pub broadcast_poll_interval: Duration,
    /// Wait for a reply to one language identification payload.
    pub detection_timeout: Duration,
    /// Wait for the vendor connect listener to report a terminal event.
    pub connect_timeout: Duration,
    pub retry: RetryPolicy,
    /// Retry schedule used by transient connections opened for language detection.
    pub detection_retry: RetryPolicy,
    pub drawer: DrawerPolicy,
    /// Delay before retrying an HTML render that produced nothing.
    pub render_settle_delay: Duration,
    /// Limit for the vendor UDP network-configuration primitive.
    pub broadcast_config_timeout: Duration,
    /// Time given to a printer to apply new network settings before closing.
    pub network_settings_delay: Duration,
    /// Interval between USB bus snapshots when watching for attach/detach.
    pub usb_watch_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            probe_port: 9100,
            probe_timeout: Duration::from_millis(300),
            max_concurrent_probes: 100,
            broadcast_window: Duration::from_secs(5),
            broadcast_poll_interval: Duration::from_millis(200),
            detection_timeout: Duration::from_millis(1_500),
            connect_timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
            detection_retry: RetryPolicy::single_attempt(),
            drawer: DrawerPolicy::default(),
            render_settle_delay: Duration::from_secs(2),
            broadcast_config_timeout: Duration::from_secs(10),
            network_settings_delay: Duration::from_secs(1),
            usb_watch_interval: Duration::from_secs(1),
        }
    }
}

/// Bounded retry with exponential backoff.
///
/// `delay_before(n)` is the pause before attempt `n` (1-based); the first
/// attempt never waits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent: i32 = (attempt - 2).min(30) as i32;
        let scaled: f64 = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        Duration::from_secs_f64(scaled).min(self.max_delay)
    }

    /// Delays between consecutive attempts, in order.
    pub fn schedule(&self) -> Vec<Duration> {
        (2..=self.attempts()).map(|attempt| self.delay_before(attempt)).collect()
    }
}

/// Pulse sequence used to kick a cash drawer.
///
/// Drawers wired to slow solenoids sometimes miss a single pulse, so the
/// pulse is repeated with a growing gap: `base_gap + step * i`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawerPolicy {
    pub pulses: u32,
    pub base_gap: Duration,
    pub step: Duration,
}

impl Default for DrawerPolicy {
    fn default() -> Self {
        Self {
            pulses: 4,
            base_gap: Duration::from_millis(120),
            step: Duration::from_millis(80),
        }
    }
}

impl DrawerPolicy {
    pub fn single() -> Self {
        Self {
            pulses: 1,
            ..Self::default()
        }
    }

    pub fn gap_after(&self, pulse: u32) -> Duration {
        self.base_gap + self.step * pulse
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
