use tokio::sync::watch;

/// Online/offline signal owned by the host shell's connectivity monitor.
pub trait ConnectivityGate: Send + Sync {
    fn is_online(&self) -> bool;

    /// Receiver that observes every online/offline transition.
    fn subscribe(&self) -> watch::Receiver<bool>;
}
