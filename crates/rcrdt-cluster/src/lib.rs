//! Membership adapter and the three-phase removed-node pruning controller.
//!
//! The reachability clock lives here: a plain counter advanced by the
//! membership adapter only while the cluster is fully reachable, consumed by
//! the pruning controller to gate dissemination windows.

pub mod membership;
pub mod pruning;

pub use membership::{Membership, MembershipEvent};
pub use pruning::PruningController;
