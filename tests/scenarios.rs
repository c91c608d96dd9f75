//! `cargo test`-discoverable wrapping of the seed scenarios S1-S6.
//!
//! Each scenario already returns a `ScenarioResult` describing pass/fail and
//! a reason; these tests just assert `passed` so a regression fails the
//! build instead of only showing up in the scenario runner's printed
//! summary.

use rcrdt::scenarios;

#[tokio::test]
async fn s1_local_round_trip() {
    let result = scenarios::s1_local_round_trip().await;
    assert!(result.passed, "{}", result.detail);
}

#[tokio::test]
async fn s2_two_node_convergence() {
    let result = scenarios::s2_two_node_convergence().await;
    assert!(result.passed, "{}", result.detail);
}

#[tokio::test]
async fn s3_conflicting_type_rejected() {
    let result = scenarios::s3_conflicting_type_rejected().await;
    assert!(result.passed, "{}", result.detail);
}

#[tokio::test]
async fn s4_read_repair() {
    let result = scenarios::s4_read_repair().await;
    assert!(result.passed, "{}", result.detail);
}

#[tokio::test]
async fn s5_delete_finality() {
    let result = scenarios::s5_delete_finality().await;
    assert!(result.passed, "{}", result.detail);
}

#[tokio::test]
async fn s6_pruning_lifecycle() {
    let result = scenarios::s6_pruning_lifecycle().await;
    assert!(result.passed, "{}", result.detail);
}
