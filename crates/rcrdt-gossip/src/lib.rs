// File: `crates/rcrdt-gossip/src/lib.rs`
pub mod engine;
pub mod message;

pub use engine::{build_status, handle_status, pick_peer};
pub use message::GossipMessage;
