//! Node identity types shared by every layer of the engine.
//!
//! A `NodeAddr` names a network location; it can be reused if a process
//! restarts at the same address. A `NodeId` additionally carries an
//! incarnation number so that a restarted process is never confused with
//! its earlier self — this is what lets the pruning controller distinguish
//! "this node left and a fresh one took its address" from "this node is
//! still the one we remember".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address-only identity. Reused across restarts at the same location.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeAddr(pub String);

impl NodeAddr {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address plus incarnation. Never reused: a node that restarts gets a new
/// `NodeId` even though its `NodeAddr` is unchanged.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub addr: NodeAddr,
    pub incarnation: u64,
}

impl NodeId {
    pub fn new(addr: impl Into<String>, incarnation: u64) -> Self {
        Self {
            addr: NodeAddr::new(addr),
            incarnation,
        }
    }

    pub fn from_addr(addr: NodeAddr, incarnation: u64) -> Self {
        Self { addr, incarnation }
    }

    pub fn addr(&self) -> &NodeAddr {
        &self.addr
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.addr, self.incarnation)
    }
}
