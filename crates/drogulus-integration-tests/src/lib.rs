//! Integration test crate for the Kademlia DHT.
//!
//! This crate has no library code — it only contains integration tests
//! that exercise end-to-end node flows across multiple workspace crates.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p drogulus-integration-tests -- --ignored
//! ```
