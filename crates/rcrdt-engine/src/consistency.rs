//! Consistency levels shared by the read and write coordinators.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Consistency {
    One,
    Two,
    Three,
    From(usize),
    Quorum,
    All,
}

impl Consistency {
    /// Number of distinct replies (including the local copy) required to
    /// satisfy this level, given `peer_count` known peers (excluding self).
    /// `Quorum` with fewer than three known peers fails fast rather than
    /// silently degrading to `All`.
    pub fn threshold(&self, peer_count: usize) -> Result<usize> {
        match self {
            Consistency::One => Ok(1),
            Consistency::Two => Ok(2),
            Consistency::Three => Ok(3),
            Consistency::From(n) => Ok(*n),
            Consistency::Quorum => {
                if peer_count < 3 {
                    return Err(EngineError::InvalidUsage(
                        "quorum requires at least 3 known peers".to_string(),
                    ));
                }
                Ok(peer_count / 2 + 1)
            }
            Consistency::All => Ok(peer_count + 1),
        }
    }

    pub fn is_local_only(&self, peer_count: usize) -> bool {
        matches!(self.threshold(peer_count), Ok(t) if t <= 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_below_three_peers_fails_fast() {
        assert!(Consistency::Quorum.threshold(2).is_err());
    }

    #[test]
    fn quorum_rounds_down_then_adds_one() {
        assert_eq!(Consistency::Quorum.threshold(4).unwrap(), 3);
        assert_eq!(Consistency::Quorum.threshold(5).unwrap(), 3);
    }

    #[test]
    fn one_is_local_only() {
        assert!(Consistency::One.is_local_only(5));
        assert!(!Consistency::Three.is_local_only(5));
    }
}
