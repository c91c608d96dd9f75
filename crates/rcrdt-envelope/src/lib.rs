// File: `crates/rcrdt-envelope/src/lib.rs`
pub mod digest;
pub mod entry;
pub mod envelope;
pub mod pruning;

pub use digest::Sha1Digest;
pub use entry::Entry;
pub use envelope::Envelope;
pub use pruning::{Phase, PruningState};
