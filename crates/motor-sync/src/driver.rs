//! Traits implemented by the wrapped synchronous driver.
//!
//! Everything here blocks the calling thread. The async layers never call
//! these methods directly on a runtime thread; they go through the
//! executor in `motor-client`, which runs them on a blocking worker and
//! resolves a future with the outcome.

use std::time::Duration;

use bson::Document;

use crate::address::ServerAddress;
use crate::error::Result;
use crate::namespace::Namespace;

/// Options applied when establishing a physical connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// Bounds the handshake only. Name resolution and time spent queued
    /// for a pool slot are not charged against it.
    pub connect_timeout: Option<Duration>,
    /// Per-I/O deadline applied to every operation on the resulting
    /// connection, independently of any other connection.
    pub socket_timeout: Option<Duration>,
}

/// Server-side options for an initial query.
#[derive(Debug, Clone, Default)]
pub struct FindSpec {
    /// Documents per batch. `None` lets the server choose.
    pub batch_size: Option<u32>,
    /// Hard cap on the number of documents returned across all batches.
    pub limit: Option<u64>,
}

/// One batch of documents pulled from a server-side cursor.
#[derive(Debug, Clone, Default)]
pub struct CursorBatch {
    /// Server-assigned cursor id. `0` means the server holds no further
    /// state for this cursor.
    pub id: i64,
    /// Documents in this batch, in server order.
    pub docs: Vec<Document>,
}

impl CursorBatch {
    /// Check whether the server has exhausted this cursor.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.id == 0
    }
}

/// Credentials forwarded to the driver for a database copy.
///
/// The nonce exchange and digest computation against the source server are
/// the driver's concern; the facade only validates that both halves were
/// supplied together.
#[derive(Debug, Clone)]
pub struct Credential {
    /// User name on the source database.
    pub username: String,
    /// Password for `username`.
    pub password: String,
}

/// Factory for physical connections.
///
/// Implementations are shared across threads by the pool and must hand out
/// independent connections.
pub trait SyncDriver: Send + Sync + 'static {
    /// Establish one physical connection to `address`.
    ///
    /// Blocks until the transport is connected and the handshake is done.
    /// The handshake must complete within `options.connect_timeout` when
    /// set, failing with [`crate::Error::Timeout`] otherwise.
    fn connect(
        &self,
        address: &ServerAddress,
        options: &ConnectOptions,
    ) -> Result<Box<dyn SyncConnection>>;
}

/// One physical connection to a server.
///
/// All methods block and observe the `socket_timeout` the connection was
/// established with. After a method returns a connection failure the
/// connection is not required to be usable again; the pool discards it.
pub trait SyncConnection: Send + 'static {
    /// Run the initial query for `filter` and return the first batch.
    fn find(&mut self, ns: &Namespace, filter: &Document, spec: &FindSpec) -> Result<CursorBatch>;

    /// Pull the next batch from a live cursor.
    fn get_more(
        &mut self,
        ns: &Namespace,
        cursor_id: i64,
        batch_size: Option<u32>,
    ) -> Result<CursorBatch>;

    /// Ask the server to discard a live cursor.
    fn kill_cursor(&mut self, ns: &Namespace, cursor_id: i64) -> Result<()>;

    /// Insert `docs` into `ns`.
    fn insert(&mut self, ns: &Namespace, docs: Vec<Document>) -> Result<()>;

    /// Run a database command and return the server's reply document.
    ///
    /// Implementations convert a non-`ok` reply into
    /// [`crate::Error::Operation`]; callers never inspect `ok` themselves.
    fn run_command(&mut self, db: &str, command: Document) -> Result<Document>;

    /// Copy database `from` into `to` on the server, authenticating
    /// against the source with `credential` when supplied.
    fn copy_database(
        &mut self,
        from: &str,
        to: &str,
        credential: Option<&Credential>,
    ) -> Result<()>;
}
