pub mod connectivity;
pub mod local_store;
pub mod outbox;
pub mod sync_state;
pub mod transport;
