// File: `crates/rcrdt-store/src/lib.rs`
pub mod store;

pub use store::{Key, LocalStore, SubscriberId, WatcherId};
