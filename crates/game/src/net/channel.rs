use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use super::protocol::{InboundEvent, OutboundEvent};

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel is closed")]
    Closed,
    #[error("failed to open channel to {url}: {reason}")]
    Open { url: String, reason: String },
}

/// Outbound half of a session channel.
pub trait Channel: Send {
    fn emit(&mut self, event: OutboundEvent) -> Result<(), ChannelError>;

    /// Closes the channel. Calling it more than once has no further effect.
    fn close(&mut self);
}

/// An open channel plus the stream of events it delivers.
pub struct ChannelHandle {
    pub channel: Box<dyn Channel>,
    pub events: mpsc::UnboundedReceiver<InboundEvent>,
}

#[async_trait]
pub trait Connector {
    async fn open(&self, url: &Url) -> Result<ChannelHandle, ChannelError>;
}
