//! One-shot termination signal shared between a component and its background tasks.

use tokio::sync::watch;

/// Broadcast shutdown flag.
///
/// Once triggered it stays triggered; every pending and future `wait()` resolves.
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender,
        }
    }

    /// Triggers the signal.
    pub fn shutdown(&self) {
        self.sender.send_replace(true);
    }

    /// Returns true once the signal has been triggered.
    pub fn is_terminated(&self) -> bool {
        *self.sender.borrow()
    }

    /// Returns a future resolving when the signal is triggered.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut receiver = self.sender.subscribe();
        async move {
            while !*receiver.borrow_and_update() {
                if receiver.changed().await.is_err() {
                    break;
                }
            }
        }
    }
}
