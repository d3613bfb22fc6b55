//! The rendering-surface channel.
//!
//! The surface (an embedded browser) drives the core through two callback
//! families: page-lifecycle events and script-evaluation results. Both are
//! modeled explicitly here: events as a plain enum delivered on one serial
//! stream, evaluations as fire-and-forget requests answered on a single-shot
//! channel. The login driver tags every probe with its navigation epoch so a
//! result that arrives after the surface has moved on can be discarded
//! instead of acted upon.

pub mod cdp;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Error)]
pub enum SurfaceError {
    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    #[error("surface is gone")]
    Gone,
}

/// Page-lifecycle events, delivered serially on one logical stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    LoadStarted,
    LoadFinished,
    LoadError { reason: String },
}

/// Single-shot carrier for one evaluation result. Dropping the receiver
/// cancels interest; the surface side must tolerate a gone receiver.
pub type ProbeReceiver = oneshot::Receiver<Result<serde_json::Value, SurfaceError>>;

/// A host-provided rendering surface.
#[async_trait]
pub trait Surface: Send + Sync {
    /// Request script evaluation. Fire-and-forget: returns immediately; the
    /// result (or an error) arrives on the receiver exactly once.
    fn evaluate(&self, js: String) -> ProbeReceiver;

    /// Replace the surface's document with locally synthesized HTML.
    /// Synthetic documents use absolute same-origin URLs throughout, so no
    /// base-URL contract is required of the surface.
    async fn load_html(&self, html: String) -> anyhow::Result<()>;

    /// Navigate the surface to a URL.
    async fn navigate(&self, url: String) -> anyhow::Result<()>;

    /// Reload the currently displayed page in place.
    async fn reload(&self) -> anyhow::Result<()>;
}
