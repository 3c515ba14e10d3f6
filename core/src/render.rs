//! HTML to raster rendering seam.

use std::time::Duration;

use async_trait::async_trait;
use posprobe_common::error::{PrinterError, PrinterResult};
use posprobe_protocols::Bitmap;
use tracing::warn;

/// Renders HTML into a 1-bit raster `width` dots wide.
///
/// `Ok(None)` means the renderer finished without producing anything, which
/// happens when it is asked before its page has settled.
#[async_trait]
pub trait HtmlRenderer: Send + Sync {
    async fn render(&self, html: &str, width: u32) -> anyhow::Result<Option<Bitmap>>;
}

/// Renders once, and once more after `settle_delay` if the first pass came back empty.
pub async fn render_with_retry(
    renderer: &dyn HtmlRenderer,
    html: &str,
    width: u32,
    settle_delay: Duration,
) -> PrinterResult<Bitmap> {
    if let Some(bitmap) = render_once(renderer, html, width).await? {
        return Ok(bitmap);
    }

    warn!(?settle_delay, "render produced no bitmap, retrying");
    tokio::time::sleep(settle_delay).await;

    render_once(renderer, html, width)
        .await?
        .ok_or_else(|| PrinterError::Render("renderer produced an empty bitmap twice".into()))
}

async fn render_once(renderer: &dyn HtmlRenderer, html: &str, width: u32) -> PrinterResult<Option<Bitmap>> {
    let rendered: Option<Bitmap> = renderer
        .render(html, width)
        .await
        .map_err(|e| PrinterError::Render(format!("{e:#}")))?;
    Ok(rendered.filter(|bitmap| !bitmap.is_empty()))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
