use crate::application::ports::connectivity::ConnectivityGate;
use tokio::sync::watch;

/// Connectivity gate backed by a watch channel. The host shell's network
/// monitor feeds transitions in via `set_online`.
pub struct WatchConnectivityGate {
    tx: watch::Sender<bool>,
}

impl WatchConnectivityGate {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _) = watch::channel(initially_online);
        Self { tx }
    }

    pub fn set_online(&self, online: bool) {
        // send_replace never fails; the sender keeps the channel alive.
        self.tx.send_replace(online);
    }
}

impl ConnectivityGate for WatchConnectivityGate {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
