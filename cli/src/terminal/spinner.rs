use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::terminal::colors;

static ACTIVE: Mutex<Option<ProgressBar>> = Mutex::new(None);

fn active() -> MutexGuard<'static, Option<ProgressBar>> {
    ACTIVE.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Spinner shown while a long operation runs. Cleared on drop.
pub struct SpinnerGuard {
    spinner: ProgressBar,
}

impl Drop for SpinnerGuard {
    fn drop(&mut self) {
        self.spinner.finish_and_clear();
        active().take();
    }
}

pub fn start(message: &str) -> SpinnerGuard {
    let spinner: ProgressBar = ProgressBar::new_spinner();
    let style: ProgressStyle = ProgressStyle::with_template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&[
            "▁▁▁▁▁",
            "▁▂▂▂▁",
            "▁▄▂▄▁",
            "▂▄▆▄▂",
            "▄▆█▆▄",
            "▂▄▆▄▂",
            "▁▄▂▄▁",
            "▁▂▂▂▁",
        ]);
    spinner.set_style(style);
    spinner.set_message(message.color(colors::TEXT_DEFAULT).to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));

    *active() = Some(spinner.clone());
    SpinnerGuard { spinner }
}

pub fn report_discovery_progress(count: usize) {
    if let Some(spinner) = active().as_ref() {
        spinner.set_message(
            format!(
                "Identified {} so far... (Ctrl+C to stop early)",
                format!("{count} printers").green().bold()
            )
            .color(colors::TEXT_DEFAULT)
            .to_string(),
        );
    }
}

/// Log writer that keeps output above a running spinner.
pub struct SpinnerWriter;

impl Write for SpinnerWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let spinner: Option<ProgressBar> = active().clone();
        match spinner {
            Some(spinner) => spinner.suspend(|| io::stdout().write_all(buf))?,
            None => io::stdout().write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}
