//! Shared record types and the per-instance durable store.

pub mod defs;
pub mod state;

pub use defs::{DiscussionEntry, ExternalId, ItemDetail, NewRecord, Record, StoreStats, StyleProfile};
pub use state::RecordStore;
