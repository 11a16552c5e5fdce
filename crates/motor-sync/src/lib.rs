//! # motor-sync
//!
//! The synchronous driver boundary for the rust-motor-driver project.
//!
//! The async facade in `motor-client` does not speak the MongoDB wire
//! protocol. Handshakes, BSON framing, authentication, and cursor
//! bookkeeping on the wire all live behind the [`SyncDriver`] and
//! [`SyncConnection`] traits defined here, which an embedding implements
//! with a real blocking driver (or, in tests, an in-memory one). The facade
//! orchestrates calls across this boundary without stalling an async
//! runtime.
//!
//! This crate also owns the types shared by every layer:
//!
//! - [`ServerAddress`] and [`Namespace`] for addressing
//! - [`ConnectOptions`], [`FindSpec`], and [`CursorBatch`] for the
//!   boundary call signatures
//! - the [`Error`] taxonomy every operation resolves with

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod address;
pub mod driver;
pub mod error;
pub mod namespace;

pub use address::{DEFAULT_PORT, ServerAddress};
pub use driver::{ConnectOptions, Credential, CursorBatch, FindSpec, SyncConnection, SyncDriver};
pub use error::{Error, Result};
pub use namespace::{Namespace, validate_database_name};

// The document value types used across every crate in the workspace come
// from `bson`; re-exported so downstream crates name a single source.
pub use bson::{Bson, Document, doc};
