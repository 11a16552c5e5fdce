//! # motor-testing
//!
//! Test infrastructure for motor driver development.
//!
//! This crate provides a mock in-memory mongod implementing the
//! `motor-sync` boundary traits, so pool and client behavior can be tested
//! hermetically: no Docker, no sockets, but real timeout timing and real
//! blocking-worker execution.
//!
//! ## Features
//!
//! - In-memory databases, collections, and server-side cursors
//! - Handshake/query latency injection honoring `connectTimeoutMS` and
//!   `socketTimeoutMS`
//! - Reachability toggling and eventual-consistency windows for dropped
//!   databases
//! - Counters for handshakes and cursor kills
//! - `copydb` user table for credentialed copies
//! - Test fixtures (tracing setup, sample data)
//!
//! ## Example
//!
//! ```rust,ignore
//! use motor_testing::{MockMongod, fixtures};
//!
//! #[tokio::test]
//! async fn test_with_mock() {
//!     fixtures::init_tracing();
//!     let server = MockMongod::builder()
//!         .with_collection("motor_test", "coll", fixtures::sample_docs(200))
//!         .build();
//!
//!     // Hand server.driver() to the client under test...
//!     assert_eq!(server.connects(), 1);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod fixtures;
pub mod mock_server;

pub use mock_server::{
    AUTH_FAILED, CURSOR_NOT_FOUND, MockDriver, MockMongod, MockMongodBuilder, NO_SUCH_COMMAND,
    NS_NOT_FOUND,
};
