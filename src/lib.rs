//! Library surface shared by the scenario runner binary and its
//! `tests/` integration suite.

pub mod scenarios;
