//! services/api/src/adapters/notifier.rs
//!
//! A `Notifier` that records each notice as a structured log event instead of
//! sending mail. Delivery channels plug in behind the same port.

use async_trait::async_trait;
use panchakarma_core::ports::{Notifier, PortResult};
use panchakarma_core::Notice;
use tracing::info;

#[derive(Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &Notice) -> PortResult<()> {
        info!(
            kind = notice.kind.as_str(),
            recipient = %notice.recipient_id,
            session = %notice.session_id,
            subject = %notice.subject,
            "📧 Notice queued: {}",
            notice.body
        );
        Ok(())
    }
}
