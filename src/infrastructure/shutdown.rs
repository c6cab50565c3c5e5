use tokio::sync::broadcast;

pub trait Shutdown {
    fn subscribe(&self) -> broadcast::Receiver<()>;
}

/// Fan-out of a single shutdown signal to every long-running task.
#[derive(Clone)]
pub struct ShutdownChannel {
    shutdown: broadcast::Sender<()>,
}

impl Default for ShutdownChannel {
    fn default() -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self { shutdown }
    }
}

impl ShutdownChannel {
    /// Signals every subscriber. Without subscribers there is nothing to stop.
    pub fn trigger(&self) {
        if self.shutdown.send(()).is_err() {
            tracing::debug!("Shutdown triggered with no running tasks");
        }
    }
}

impl Shutdown for ShutdownChannel {
    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }
}
