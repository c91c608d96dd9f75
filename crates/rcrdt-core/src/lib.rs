// File: `crates/rcrdt-core/src/lib.rs`
pub mod crdt;
pub mod gcounter;
pub mod gset;
pub mod ids;
pub mod lwwregister;
pub mod orset;
pub mod pncounter;
pub mod value;

pub use crdt::{Crdt, RemovedNodePruning, Shape};
pub use gcounter::GCounter;
pub use gset::GSet;
pub use ids::{NodeAddr, NodeId};
pub use lwwregister::LwwRegister;
pub use orset::OrSet;
pub use pncounter::PnCounter;
pub use value::CrdtValue;
