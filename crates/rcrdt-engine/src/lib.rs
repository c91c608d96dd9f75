//! Per-node replication engine: read/write coordinators, the update
//! pipeline, gossip and pruning ticks, and the client command surface, all
//! sitting on top of `rcrdt-store`'s local store and `rcrdt-cluster`'s
//! membership/pruning state.
//!
//! # Quick start
//!
//! ```rust
//! use rcrdt_engine::{Client, ClientConfig, Engine, EngineConfig};
//! use rcrdt_engine::network::{MemoryTransport, PeerId};
//! use rcrdt_core::NodeId;
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let engine = Arc::new(Engine::new(
//!     NodeId::new("node-a", 1),
//!     EngineConfig::builder("store").build(),
//!     MemoryTransport::new(PeerId::new("node-a")),
//! ));
//! let client = Client::new(engine, ClientConfig::default());
//! client.get_keys().await;
//! # }
//! ```

pub mod client;
pub mod config;
pub mod consistency;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod network;
pub mod pending;
pub mod pipeline;
pub mod stats;

pub use client::{Client, ClientConfig, ClientConfigBuilder};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use consistency::Consistency;
pub use engine::{ClientCommand, ClientReply, Engine};
pub use error::{EngineError, Result};
pub use network::{MemoryTransport, Message, NetworkTransport, Peer, PeerId};
pub use stats::{EngineStats, EngineStatsSnapshot};

/// Convenience imports for wiring up an engine and its client.
pub mod prelude {
    pub use crate::client::{Client, ClientConfig};
    pub use crate::config::EngineConfig;
    pub use crate::consistency::Consistency;
    pub use crate::engine::Engine;
    pub use crate::error::EngineError;
    pub use crate::network::{MemoryTransport, NetworkTransport, PeerId};
}
