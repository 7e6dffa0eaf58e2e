//! Debounced publisher.
//!
//! Registrations ask for a publish through a single-slot channel. While one
//! request is pending further requests are dropped, and the publisher waits
//! out the debounce window before writing, so a burst of registrations costs
//! one cache write instead of one detached task each.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::federation::Federation;

/// Handle used to request a publish. Cheap to clone.
#[derive(Clone)]
pub struct Publisher {
    tx: mpsc::Sender<()>,
}

impl Publisher {
    /// A publisher handle and the receiving end for `publish_loop`.
    pub fn channel() -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    /// Ask for a publish. Never blocks; a request already pending absorbs
    /// this one.
    pub fn request(&self) {
        match self.tx.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => {}
            Err(mpsc::error::TrySendError::Closed(())) => {
                tracing::warn!("publisher stopped, listing will not be republished");
            }
        }
    }
}

/// Serve publish requests until every `Publisher` handle is dropped.
pub async fn publish_loop(mut rx: mpsc::Receiver<()>, federation: Federation, debounce: Duration) {
    tracing::info!(
        key = federation.identifier(),
        debounce_ms = debounce.as_millis() as u64,
        "publisher starting"
    );

    while rx.recv().await.is_some() {
        tokio::time::sleep(debounce).await;
        // Anything that arrived during the window is covered by this publish.
        while rx.try_recv().is_ok() {}

        if let Err(e) = federation.publish().await {
            tracing::warn!(error = %e, "failed to publish listing");
        }
    }

    tracing::debug!("publisher exiting");
}
