// BroadcastChannelManager: fan-out of published seam outputs
// Single Responsibility: Broadcast channel lifecycle and subscription

use tokio::sync::broadcast;

use crate::pipeline::SeamOutput;

/// Default buffer: a few seconds of outputs at typical profile rates
pub const DEFAULT_SEAM_CHANNEL_CAPACITY: usize = 100;

/// Owns the seam output broadcast channel
///
/// Every processed sample is published here. Subscribers that fall behind
/// lose the oldest outputs (lagged receivers); publishing never blocks.
pub struct BroadcastChannelManager {
    seam: broadcast::Sender<SeamOutput>,
}

impl BroadcastChannelManager {
    pub fn new(capacity: usize) -> Self {
        let (seam, _) = broadcast::channel(capacity.max(1));
        Self { seam }
    }

    /// Publish one output
    ///
    /// # Returns
    /// Number of subscribers that received it (0 when nobody listens)
    pub fn publish_seam(&self, output: SeamOutput) -> usize {
        self.seam.send(output).unwrap_or(0)
    }

    /// Subscribe to seam outputs published from now on
    pub fn subscribe_seam(&self) -> broadcast::Receiver<SeamOutput> {
        self.seam.subscribe()
    }

    /// Sender clone for publishers living on other threads
    pub fn seam_sender(&self) -> broadcast::Sender<SeamOutput> {
        self.seam.clone()
    }

    pub fn seam_subscriber_count(&self) -> usize {
        self.seam.receiver_count()
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new(DEFAULT_SEAM_CHANNEL_CAPACITY)
    }
}
