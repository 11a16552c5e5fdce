//! Mock in-memory mongod for unit testing.
//!
//! This module provides a mock server implementation of the synchronous
//! driver boundary so the async layers can be tested without a real
//! database instance. State lives in plain memory; "connections" are
//! handles onto it that honor the timeout semantics of the real boundary:
//! a handshake slower than `connectTimeoutMS` or a query slower than
//! `socketTimeoutMS` fails with the timeout flavor of connection failure
//! after sleeping the full deadline.
//!
//! ## Example
//!
//! ```rust,ignore
//! use motor_testing::MockMongod;
//!
//! let server = MockMongod::builder()
//!     .with_collection("motor_test", "coll", docs)
//!     .build();
//!
//! let driver = server.driver();
//! // Hand the driver to a pool or client under test...
//! assert_eq!(server.connects(), 1);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use motor_sync::{
    Bson, ConnectOptions, Credential, CursorBatch, Document, Error, FindSpec, Namespace, Result,
    ServerAddress, SyncConnection, SyncDriver, doc,
};

/// Server error code for authentication failures.
pub const AUTH_FAILED: i32 = 18;
/// Server error code for a dropped collection that never existed.
pub const NS_NOT_FOUND: i32 = 26;
/// Server error code for a get-more against a dead cursor.
pub const CURSOR_NOT_FOUND: i32 = 43;
/// Server error code for an unrecognized command.
pub const NO_SUCH_COMMAND: i32 = 59;

type Collections = HashMap<String, Vec<Document>>;

struct OpenCursor {
    ns: Namespace,
    remaining: VecDeque<Document>,
    batch_size: Option<u32>,
}

struct ServerState {
    address: ServerAddress,
    reachable: AtomicBool,
    connect_delay: Mutex<Option<Duration>>,
    query_latency: Mutex<Option<Duration>>,
    databases: Mutex<HashMap<String, Collections>>,
    cursors: Mutex<HashMap<i64, OpenCursor>>,
    next_cursor_id: AtomicI64,
    /// `(db, username)` to password, for `copydb` authentication.
    users: Mutex<HashMap<(String, String), String>>,
    /// Databases that keep appearing in `listDatabases` for a number of
    /// calls after being dropped, simulating eventual consistency.
    linger_config: Mutex<HashMap<String, u32>>,
    lingering: Mutex<HashMap<String, u32>>,
    connects: AtomicUsize,
    killed: Mutex<Vec<i64>>,
}

impl ServerState {
    fn open_cursor(
        &self,
        ns: &Namespace,
        docs: Vec<Document>,
        batch_size: Option<u32>,
    ) -> CursorBatch {
        let mut remaining: VecDeque<Document> = docs.into();
        let take = effective_batch(batch_size, remaining.len());
        let first: Vec<Document> = remaining.drain(..take.min(remaining.len())).collect();
        if remaining.is_empty() {
            return CursorBatch { id: 0, docs: first };
        }
        let id = self.next_cursor_id.fetch_add(1, Ordering::SeqCst);
        self.cursors.lock().insert(
            id,
            OpenCursor {
                ns: ns.clone(),
                remaining,
                batch_size,
            },
        );
        CursorBatch { id, docs: first }
    }

    fn list_databases(&self) -> Result<Document> {
        let mut names: Vec<String> = self.databases.lock().keys().cloned().collect();
        {
            let mut lingering = self.lingering.lock();
            for (name, polls) in lingering.iter_mut() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
                *polls = polls.saturating_sub(1);
            }
            lingering.retain(|_, polls| *polls > 0);
        }
        names.sort();
        let databases: Vec<Bson> = names
            .into_iter()
            .map(|name| Bson::Document(doc! { "name": name, "sizeOnDisk": 1_i64, "empty": false }))
            .collect();
        Ok(doc! { "ok": 1, "databases": databases })
    }

    fn drop_database(&self, name: &str) -> Result<Document> {
        let existed = self.databases.lock().remove(name).is_some();
        if existed {
            if let Some(polls) = self.linger_config.lock().get(name) {
                self.lingering.lock().insert(name.to_string(), *polls);
            }
        }
        debug!(db = name, existed, "mock database dropped");
        Ok(doc! { "ok": 1, "dropped": name })
    }
}

/// `batchSize: 0` asks for the server default, which here is everything.
fn effective_batch(batch_size: Option<u32>, remaining: usize) -> usize {
    match batch_size {
        Some(0) | None => remaining,
        Some(b) => b as usize,
    }
}

fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, value)| doc.get(key) == Some(value))
}

/// Builder for [`MockMongod`].
pub struct MockMongodBuilder {
    address: ServerAddress,
    databases: HashMap<String, Collections>,
    users: HashMap<(String, String), String>,
    connect_delay: Option<Duration>,
    query_latency: Option<Duration>,
}

impl MockMongodBuilder {
    /// Create a builder listening on the default test address.
    #[must_use]
    pub fn new() -> Self {
        Self {
            address: ServerAddress::Tcp {
                host: "localhost".into(),
                port: motor_sync::DEFAULT_PORT,
            },
            databases: HashMap::new(),
            users: HashMap::new(),
            connect_delay: None,
            query_latency: None,
        }
    }

    /// Set the address the mock accepts connections for.
    ///
    /// Connections to any other address are refused, exactly like a real
    /// server that is not listening there.
    #[must_use]
    pub fn with_address(mut self, address: ServerAddress) -> Self {
        self.address = address;
        self
    }

    /// Seed a collection with documents.
    #[must_use]
    pub fn with_collection(
        mut self,
        db: impl Into<String>,
        coll: impl Into<String>,
        docs: Vec<Document>,
    ) -> Self {
        self.databases
            .entry(db.into())
            .or_default()
            .insert(coll.into(), docs);
        self
    }

    /// Register a user for `copydb` authentication against `db`.
    #[must_use]
    pub fn with_user(
        mut self,
        db: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.users
            .insert((db.into(), username.into()), password.into());
        self
    }

    /// Delay every handshake by `delay`.
    #[must_use]
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// Delay every query (find, get-more, count) by `latency`.
    #[must_use]
    pub fn with_query_latency(mut self, latency: Duration) -> Self {
        self.query_latency = Some(latency);
        self
    }

    /// Build the mock server.
    #[must_use]
    pub fn build(self) -> MockMongod {
        MockMongod {
            state: Arc::new(ServerState {
                address: self.address,
                reachable: AtomicBool::new(true),
                connect_delay: Mutex::new(self.connect_delay),
                query_latency: Mutex::new(self.query_latency),
                databases: Mutex::new(self.databases),
                cursors: Mutex::new(HashMap::new()),
                next_cursor_id: AtomicI64::new(1),
                users: Mutex::new(self.users),
                linger_config: Mutex::new(HashMap::new()),
                lingering: Mutex::new(HashMap::new()),
                connects: AtomicUsize::new(0),
                killed: Mutex::new(Vec::new()),
            }),
        }
    }
}

impl Default for MockMongodBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Mock in-memory mongod.
///
/// The handle owns the server state; [`MockMongod::driver`] hands out
/// [`MockDriver`] values sharing it, which is what goes to the code under
/// test. All knobs and counters stay usable while connections exist.
pub struct MockMongod {
    state: Arc<ServerState>,
}

impl MockMongod {
    /// Create a builder.
    #[must_use]
    pub fn builder() -> MockMongodBuilder {
        MockMongodBuilder::new()
    }

    /// Create a mock with no seeded data on the default test address.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// The address this mock accepts connections for.
    #[must_use]
    pub fn address(&self) -> &ServerAddress {
        &self.state.address
    }

    /// A `mongodb://` URI for this mock's address.
    #[must_use]
    pub fn uri(&self) -> String {
        format!("mongodb://{}", self.state.address)
    }

    /// A driver handle to give to the code under test.
    #[must_use]
    pub fn driver(&self) -> MockDriver {
        MockDriver {
            state: Arc::clone(&self.state),
        }
    }

    /// Seed a collection after construction.
    pub fn seed(&self, db: impl Into<String>, coll: impl Into<String>, docs: Vec<Document>) {
        self.state
            .databases
            .lock()
            .entry(db.into())
            .or_default()
            .insert(coll.into(), docs);
    }

    /// Register a user for `copydb` authentication against `db`.
    pub fn add_user(
        &self,
        db: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) {
        self.state
            .users
            .lock()
            .insert((db.into(), username.into()), password.into());
    }

    /// Make the server accept or refuse new handshakes.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Change the handshake delay.
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        *self.state.connect_delay.lock() = delay;
    }

    /// Change the query latency.
    pub fn set_query_latency(&self, latency: Option<Duration>) {
        *self.state.query_latency.lock() = latency;
    }

    /// Keep `db` visible in `listDatabases` for `polls` calls after it is
    /// dropped, simulating a server-side eventual-consistency window.
    pub fn linger_dropped(&self, db: impl Into<String>, polls: u32) {
        self.state.linger_config.lock().insert(db.into(), polls);
    }

    /// Number of handshake attempts observed, including refused ones.
    #[must_use]
    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Cursor ids the server was asked to kill, in order.
    #[must_use]
    pub fn killed_cursors(&self) -> Vec<i64> {
        self.state.killed.lock().clone()
    }

    /// Number of cursors currently held open by the server.
    #[must_use]
    pub fn open_cursors(&self) -> usize {
        self.state.cursors.lock().len()
    }

    /// Documents currently stored in `db.coll`.
    #[must_use]
    pub fn documents(&self, db: &str, coll: &str) -> Vec<Document> {
        self.state
            .databases
            .lock()
            .get(db)
            .and_then(|colls| colls.get(coll))
            .cloned()
            .unwrap_or_default()
    }

    /// Check whether `db` exists, ignoring any lingering window.
    #[must_use]
    pub fn database_exists(&self, db: &str) -> bool {
        self.state.databases.lock().contains_key(db)
    }
}

impl Default for MockMongod {
    fn default() -> Self {
        Self::new()
    }
}

/// Driver half of the mock, implementing the boundary factory trait.
#[derive(Clone)]
pub struct MockDriver {
    state: Arc<ServerState>,
}

impl SyncDriver for MockDriver {
    fn connect(
        &self,
        address: &ServerAddress,
        options: &ConnectOptions,
    ) -> Result<Box<dyn SyncConnection>> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        if !self.state.reachable.load(Ordering::SeqCst) {
            return Err(Error::Connection(format!("connection refused by {address}")));
        }
        if *address != self.state.address {
            return Err(Error::Connection(format!("no server listening at {address}")));
        }
        let delay = *self.state.connect_delay.lock();
        if let Some(delay) = delay {
            match options.connect_timeout {
                Some(timeout) if delay > timeout => {
                    thread::sleep(timeout);
                    return Err(Error::Timeout(format!(
                        "handshake did not complete within {timeout:?} (connectTimeoutMS)"
                    )));
                }
                _ => thread::sleep(delay),
            }
        }
        debug!(address = %address, "mock connection established");
        Ok(Box::new(MockConnection {
            state: Arc::clone(&self.state),
            socket_timeout: options.socket_timeout,
        }))
    }
}

struct MockConnection {
    state: Arc<ServerState>,
    socket_timeout: Option<Duration>,
}

impl MockConnection {
    /// Sleep like a slow server would; fail with a timeout once the
    /// configured per-I/O deadline is shorter than the injected latency.
    fn simulate_query_latency(&self) -> Result<()> {
        let latency = *self.state.query_latency.lock();
        let Some(latency) = latency else {
            return Ok(());
        };
        match self.socket_timeout {
            Some(timeout) if latency > timeout => {
                thread::sleep(timeout);
                Err(Error::Timeout(format!(
                    "no server response within {timeout:?} (socketTimeoutMS)"
                )))
            }
            _ => {
                thread::sleep(latency);
                Ok(())
            }
        }
    }
}

impl SyncConnection for MockConnection {
    fn find(&mut self, ns: &Namespace, filter: &Document, spec: &FindSpec) -> Result<CursorBatch> {
        self.simulate_query_latency()?;
        let mut docs: Vec<Document> = {
            let databases = self.state.databases.lock();
            databases
                .get(&ns.db)
                .and_then(|colls| colls.get(&ns.coll))
                .map(|coll| {
                    coll.iter()
                        .filter(|doc| matches_filter(doc, filter))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };
        if let Some(limit) = spec.limit {
            docs.truncate(limit as usize);
        }
        Ok(self.state.open_cursor(ns, docs, spec.batch_size))
    }

    fn get_more(
        &mut self,
        ns: &Namespace,
        cursor_id: i64,
        batch_size: Option<u32>,
    ) -> Result<CursorBatch> {
        self.simulate_query_latency()?;
        let mut cursors = self.state.cursors.lock();
        let Some(cursor) = cursors.get_mut(&cursor_id) else {
            return Err(Error::Operation {
                code: Some(CURSOR_NOT_FOUND),
                message: format!("cursor id {cursor_id} not found"),
            });
        };
        if cursor.ns != *ns {
            return Err(Error::Operation {
                code: Some(CURSOR_NOT_FOUND),
                message: format!("cursor id {cursor_id} belongs to {}", cursor.ns),
            });
        }
        let take = effective_batch(batch_size.or(cursor.batch_size), cursor.remaining.len());
        let docs: Vec<Document> = cursor
            .remaining
            .drain(..take.min(cursor.remaining.len()))
            .collect();
        if cursor.remaining.is_empty() {
            cursors.remove(&cursor_id);
            Ok(CursorBatch { id: 0, docs })
        } else {
            Ok(CursorBatch { id: cursor_id, docs })
        }
    }

    fn kill_cursor(&mut self, _ns: &Namespace, cursor_id: i64) -> Result<()> {
        self.state.cursors.lock().remove(&cursor_id);
        self.state.killed.lock().push(cursor_id);
        debug!(cursor_id, "mock cursor killed");
        Ok(())
    }

    fn insert(&mut self, ns: &Namespace, docs: Vec<Document>) -> Result<()> {
        let mut databases = self.state.databases.lock();
        databases
            .entry(ns.db.clone())
            .or_default()
            .entry(ns.coll.clone())
            .or_default()
            .extend(docs);
        Ok(())
    }

    fn run_command(&mut self, db: &str, command: Document) -> Result<Document> {
        let Some((name, arg)) = command.iter().next() else {
            return Err(Error::InvalidArgument("empty command document".into()));
        };
        match name.as_str() {
            "listDatabases" => self.state.list_databases(),
            "dropDatabase" => self.state.drop_database(db),
            "ping" => Ok(doc! { "ok": 1 }),
            "count" => {
                self.simulate_query_latency()?;
                let Bson::String(coll) = arg else {
                    return Err(Error::InvalidArgument(
                        "count expects a collection name".into(),
                    ));
                };
                let empty = Document::new();
                let query = command.get_document("query").unwrap_or(&empty);
                let n = {
                    let databases = self.state.databases.lock();
                    databases
                        .get(db)
                        .and_then(|colls| colls.get(coll))
                        .map(|coll| {
                            coll.iter().filter(|doc| matches_filter(doc, query)).count()
                        })
                        .unwrap_or(0)
                };
                Ok(doc! { "ok": 1, "n": n as i64 })
            }
            "drop" => {
                let Bson::String(coll) = arg else {
                    return Err(Error::InvalidArgument(
                        "drop expects a collection name".into(),
                    ));
                };
                let removed = {
                    let mut databases = self.state.databases.lock();
                    databases
                        .get_mut(db)
                        .and_then(|colls| colls.remove(coll))
                        .is_some()
                };
                if removed {
                    Ok(doc! { "ok": 1, "ns": format!("{db}.{coll}") })
                } else {
                    Err(Error::Operation {
                        code: Some(NS_NOT_FOUND),
                        message: "ns not found".into(),
                    })
                }
            }
            other => Err(Error::Operation {
                code: Some(NO_SUCH_COMMAND),
                message: format!("no such command: '{other}'"),
            }),
        }
    }

    fn copy_database(
        &mut self,
        from: &str,
        to: &str,
        credential: Option<&Credential>,
    ) -> Result<()> {
        if let Some(cred) = credential {
            let authenticated = self
                .state
                .users
                .lock()
                .get(&(from.to_string(), cred.username.clone()))
                .is_some_and(|password| *password == cred.password);
            if !authenticated {
                return Err(Error::Operation {
                    code: Some(AUTH_FAILED),
                    message: format!("auth failed for user {:?} on {from}", cred.username),
                });
            }
        }
        let mut databases = self.state.databases.lock();
        let Some(source) = databases.get(from).cloned() else {
            return Err(Error::Operation {
                code: None,
                message: format!("source database {from} does not exist"),
            });
        };
        databases.insert(to.to_string(), source);
        debug!(from, to, "mock database copied");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn connect(server: &MockMongod) -> Box<dyn SyncConnection> {
        server
            .driver()
            .connect(server.address(), &ConnectOptions::default())
            .unwrap()
    }

    #[test]
    fn find_splits_batches_and_get_more_drains() {
        let docs: Vec<Document> = (0..10).map(|i| doc! { "_id": i }).collect();
        let server = MockMongod::builder()
            .with_collection("db", "coll", docs)
            .build();
        let mut conn = connect(&server);
        let ns = Namespace::new("db", "coll");

        let spec = FindSpec {
            batch_size: Some(4),
            limit: None,
        };
        let first = conn.find(&ns, &Document::new(), &spec).unwrap();
        assert_eq!(first.docs.len(), 4);
        assert_ne!(first.id, 0);

        let second = conn.get_more(&ns, first.id, None).unwrap();
        assert_eq!(second.docs.len(), 4);
        assert_eq!(second.id, first.id);

        let last = conn.get_more(&ns, first.id, None).unwrap();
        assert_eq!(last.docs.len(), 2);
        assert_eq!(last.id, 0);
        assert_eq!(server.open_cursors(), 0);
    }

    #[test]
    fn refused_when_address_does_not_match() {
        let server = MockMongod::new();
        let err = server
            .driver()
            .connect(
                &ServerAddress::Tcp {
                    host: "elsewhere".into(),
                    port: 4242,
                },
                &ConnectOptions::default(),
            )
            // The success value is an opaque trait object; discard it so
            // the error can be unwrapped.
            .map(|_| ())
            .unwrap_err();
        assert!(err.is_connection_failure());
        assert_eq!(server.connects(), 1);
    }

    #[test]
    fn lingering_database_fades_from_listings() {
        let server = MockMongod::builder()
            .with_collection("doomed", "c", vec![doc! { "x": 1 }])
            .build();
        server.linger_dropped("doomed", 2);
        let mut conn = connect(&server);

        conn.run_command("doomed", doc! { "dropDatabase": 1 }).unwrap();
        assert!(!server.database_exists("doomed"));

        let listed = |conn: &mut Box<dyn SyncConnection>| {
            let reply = conn.run_command("admin", doc! { "listDatabases": 1 }).unwrap();
            reply
                .get_array("databases")
                .unwrap()
                .iter()
                .filter_map(|entry| entry.as_document())
                .filter_map(|entry| entry.get_str("name").ok())
                .any(|name| name == "doomed")
        };
        assert!(listed(&mut conn));
        assert!(listed(&mut conn));
        assert!(!listed(&mut conn));
    }

    #[test]
    fn copydb_checks_credentials() {
        let server = MockMongod::builder()
            .with_collection("src", "c", vec![doc! { "x": 1 }])
            .with_user("src", "mike", "password")
            .build();
        let mut conn = connect(&server);

        let cred = Credential {
            username: "mike".into(),
            password: "wrong".into(),
        };
        let err = conn.copy_database("src", "dst", Some(&cred)).unwrap_err();
        assert_eq!(err.code(), Some(AUTH_FAILED));
        assert!(!server.database_exists("dst"));

        let cred = Credential {
            username: "mike".into(),
            password: "password".into(),
        };
        conn.copy_database("src", "dst", Some(&cred)).unwrap();
        assert_eq!(server.documents("dst", "c"), vec![doc! { "x": 1 }]);
    }
}
