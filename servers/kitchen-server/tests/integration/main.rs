//! Integration tests over the in-memory store.

// The shared helpers live under tests/common/; the module is named `support`
// so paths starting with `common::` keep resolving to the common crate.
#[path = "../common/mod.rs"]
mod support;

mod bridge_tests;
mod http_tests;
mod scheduler_tests;
