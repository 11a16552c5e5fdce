//! Async client facade over the synchronous driver.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tokio::time;
use tracing::{debug, info};

use motor_driver_pool::{Pool, PoolStatus};
use motor_sync::{
    Credential, Document, Error, Result, ServerAddress, SyncDriver, doc, validate_database_name,
};

use crate::config::ClientOptions;
use crate::database::{AsDatabaseName, MotorDatabase};
use crate::executor::OperationExecutor;

/// How long [`MotorClient::drop_database`] keeps polling for the dropped
/// name to leave the server's listing.
const DROP_VERIFY_BUDGET: Duration = Duration::from_secs(10);

/// Interval between those polls.
const DROP_VERIFY_INTERVAL: Duration = Duration::from_millis(100);

type ConnectFuture = Shared<BoxFuture<'static, Result<()>>>;

/// Connection lifecycle of a client.
///
/// One mutex guards the whole machine; late callers attach to the shared
/// in-flight future instead of starting a second handshake.
enum ConnectState {
    /// No attempt yet; the first operation starts one.
    Unconnected,
    /// A handshake is in flight; every caller awaits this same future.
    Connecting(ConnectFuture),
    /// A pooled connection has been established and validated.
    Connected,
    /// The last attempt failed; the next operation retries.
    Failed(Error),
    /// Closed by the user. Terminal.
    Closed,
}

/// Asynchronous MongoDB client facade.
///
/// Wraps a blocking driver (anything implementing
/// [`motor_sync::SyncDriver`]) behind an async API: operations check
/// connections out of a bounded pool and run the blocking calls on worker
/// threads, so the runtime's own threads are never stalled by network
/// latency.
///
/// Connecting is lazy. A freshly built client has touched nothing on the
/// network; the first operation (or an explicit [`MotorClient::open`])
/// establishes connectivity, and concurrent first operations share a
/// single handshake.
///
/// Cheap to clone; clones share the pool and connection state.
///
/// # Example
///
/// ```rust,ignore
/// use motor_client::{ClientOptions, MotorClient};
///
/// let options = ClientOptions::parse("mongodb://localhost:27017/?maxPoolSize=20")?;
/// let client = MotorClient::new(driver, options)?;
///
/// let collection = client.database("app").collection("events");
/// collection.insert_one(doc! { "kind": "started" }).await?;
///
/// let mut cursor = collection.find(doc! {});
/// while cursor.fetch_next().await? {
///     let event = cursor.next_object();
///     // ...
/// }
/// ```
#[derive(Clone)]
pub struct MotorClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    options: ClientOptions,
    executor: OperationExecutor,
    state: Mutex<ConnectState>,
}

impl MotorClient {
    /// Create a client for the given driver and options.
    ///
    /// Validation is synchronous and happens here: a bad `max_pool_size`
    /// or address fails immediately, with no connection attempt made.
    pub fn new(driver: Arc<dyn SyncDriver>, options: ClientOptions) -> Result<Self> {
        options.validate()?;
        let pool = Pool::new(driver, options.address.clone(), options.pool_config())
            .map_err(Error::from)?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                options,
                executor: OperationExecutor::new(pool),
                state: Mutex::new(ConnectState::Unconnected),
            }),
        })
    }

    /// Create a client from a `mongodb://` connection string.
    pub fn with_uri_str(driver: Arc<dyn SyncDriver>, uri: impl AsRef<str>) -> Result<Self> {
        Self::new(driver, ClientOptions::parse(uri)?)
    }

    /// The options this client was built with.
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Address of the server this client talks to.
    #[must_use]
    pub fn address(&self) -> &ServerAddress {
        &self.inner.options.address
    }

    /// Occupancy snapshot of the connection pool.
    #[must_use]
    pub fn pool_status(&self) -> PoolStatus {
        self.inner.executor.pool().status()
    }

    pub(crate) fn executor(&self) -> &OperationExecutor {
        &self.inner.executor
    }

    /// Establish connectivity explicitly.
    ///
    /// Idempotent and single-flight: an already-open client resolves
    /// immediately without a second handshake, concurrent callers attach
    /// to the one in-flight attempt, and a client whose last attempt
    /// failed retries. Resolves to the client itself so it can be chained.
    pub async fn open(&self) -> Result<Self> {
        self.ensure_connected().await?;
        Ok(self.clone())
    }

    /// Queue on the shared connect attempt, starting one if none is in
    /// flight. Every operation path funnels through here, which is what
    /// makes lazy connecting safe: operations issued before connectivity
    /// exists all wait on the same future and none are dropped.
    pub(crate) async fn ensure_connected(&self) -> Result<()> {
        let connect = {
            let mut state = self.inner.state.lock();
            match &*state {
                ConnectState::Connected => return Ok(()),
                ConnectState::Closed => return Err(Error::NotConnected),
                ConnectState::Connecting(shared) => shared.clone(),
                ConnectState::Unconnected => {
                    let shared = self.spawn_connect();
                    *state = ConnectState::Connecting(shared.clone());
                    shared
                }
                ConnectState::Failed(err) => {
                    debug!(previous_error = %err, "retrying connect after earlier failure");
                    let shared = self.spawn_connect();
                    *state = ConnectState::Connecting(shared.clone());
                    shared
                }
            }
        };
        connect.await
    }

    /// Drive one handshake on a spawned task so the attempt completes and
    /// records its outcome even if every waiting caller is cancelled.
    fn spawn_connect(&self) -> ConnectFuture {
        let client = self.clone();
        let task = tokio::spawn(async move {
            let result = client.establish().await;
            let mut state = client.inner.state.lock();
            // close() may have won while the handshake ran; never demote
            // a terminal state.
            if matches!(&*state, ConnectState::Connecting(_)) {
                *state = match &result {
                    Ok(()) => ConnectState::Connected,
                    Err(err) => ConnectState::Failed(err.clone()),
                };
            }
            result
        });
        async move {
            match task.await {
                Ok(result) => result,
                Err(join) => Err(Error::Internal(format!("connect task failed: {join}"))),
            }
        }
        .boxed()
        .shared()
    }

    /// Validate connectivity by establishing one pooled connection.
    async fn establish(&self) -> Result<()> {
        let address = &self.inner.options.address;
        debug!(address = %address, "establishing connection");
        let started = Instant::now();
        let conn = self
            .inner
            .executor
            .pool()
            .acquire()
            .await
            .map_err(Error::from)?;
        info!(
            address = %address,
            conn_id = conn.id(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "connected"
        );
        // Straight back to the idle set for the first real operation.
        drop(conn);
        Ok(())
    }

    /// Close the client, releasing all pooled connections.
    ///
    /// Terminal: operations issued afterwards, including
    /// [`MotorClient::open`], fail with [`Error::NotConnected`] rather
    /// than hang.
    pub fn close(&self) {
        *self.inner.state.lock() = ConnectState::Closed;
        self.inner.executor.pool().close();
        info!(address = %self.inner.options.address, "client closed");
    }

    /// Alias for [`MotorClient::close`], matching the wrapped driver's
    /// vocabulary.
    pub fn disconnect(&self) {
        self.close();
    }

    /// Handle to database `name`.
    #[must_use]
    pub fn database(&self, name: impl Into<String>) -> MotorDatabase {
        MotorDatabase::new(self.clone(), name)
    }

    /// Names of the databases on the server.
    pub async fn database_names(&self) -> Result<Vec<String>> {
        let reply = self.run_command_on("admin", doc! { "listDatabases": 1 }).await?;
        let databases = reply.get_array("databases").map_err(|_| {
            Error::InvalidResponse("listDatabases reply missing 'databases' array".into())
        })?;
        let mut names = Vec::with_capacity(databases.len());
        for entry in databases {
            let name = entry
                .as_document()
                .and_then(|entry| entry.get_str("name").ok())
                .ok_or_else(|| {
                    Error::InvalidResponse("listDatabases entry missing 'name'".into())
                })?;
            names.push(name.to_string());
        }
        Ok(names)
    }

    /// Run `command` against `db` through the pool, connecting first if
    /// nothing has yet.
    pub(crate) async fn run_command_on(&self, db: &str, command: Document) -> Result<Document> {
        self.ensure_connected().await?;
        let db = db.to_string();
        self.inner
            .executor
            .execute(move |conn| conn.run_command(&db, command))
            .await
    }

    /// Copy database `from` to `to` on the server.
    ///
    /// `to` must be a legal database name; copies into an existing
    /// database merge on the server's terms. Concurrent copies from the
    /// same source are safe.
    pub async fn copy_database(&self, from: &str, to: &str) -> Result<()> {
        self.copy_database_with_options(from, to, CopyDatabaseOptions::new())
            .await
    }

    /// [`MotorClient::copy_database`] with source credentials.
    ///
    /// Argument shape is validated before any network call: supplying only
    /// one half of the username/password pair is an invalid argument, and
    /// an illegal `to` name is rejected with
    /// [`Error::InvalidName`].
    pub async fn copy_database_with_options(
        &self,
        from: &str,
        to: &str,
        options: CopyDatabaseOptions,
    ) -> Result<()> {
        let credential = options.into_credential()?;
        validate_database_name(to)?;
        self.ensure_connected().await?;
        info!(from, to, authenticated = credential.is_some(), "copying database");
        let from = from.to_string();
        let to = to.to_string();
        self.inner
            .executor
            .execute(move |conn| conn.copy_database(&from, &to, credential.as_ref()))
            .await
    }

    /// Drop a database, by name or by handle.
    ///
    /// The server's listing can trail the drop, so after issuing it this
    /// polls [`MotorClient::database_names`] until the name is gone. A
    /// name still listed when the verification window closes is reported
    /// as an operation failure rather than silently ignored.
    pub async fn drop_database(&self, db: impl AsDatabaseName) -> Result<()> {
        let name = db.as_database_name().to_string();
        self.run_command_on(&name, doc! { "dropDatabase": 1 }).await?;
        let deadline = Instant::now() + DROP_VERIFY_BUDGET;
        loop {
            let names = self.database_names().await?;
            if !names.iter().any(|listed| *listed == name) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::Operation {
                    code: None,
                    message: format!(
                        "database {name:?} still listed {DROP_VERIFY_BUDGET:?} after dropDatabase"
                    ),
                });
            }
            debug!(db = %name, "dropped database still listed, retrying");
            time::sleep(DROP_VERIFY_INTERVAL).await;
        }
    }
}

impl fmt::Debug for MotorClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.inner.state.lock() {
            ConnectState::Unconnected => "unconnected",
            ConnectState::Connecting(_) => "connecting",
            ConnectState::Connected => "connected",
            ConnectState::Failed(_) => "failed",
            ConnectState::Closed => "closed",
        };
        f.debug_struct("MotorClient")
            .field("address", &self.inner.options.address)
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

/// Optional settings for [`MotorClient::copy_database_with_options`].
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct CopyDatabaseOptions {
    /// User name on the source database.
    pub username: Option<String>,
    /// Password for `username`.
    pub password: Option<String>,
}

impl CopyDatabaseOptions {
    /// Options with no credentials.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Authenticate against the source database as `username`.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Password for the source-database user.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Collapse into the boundary credential, rejecting half-supplied
    /// pairs before anything touches the network.
    fn into_credential(self) -> Result<Option<Credential>> {
        match (self.username, self.password) {
            (Some(username), Some(password)) => Ok(Some(Credential { username, password })),
            (None, None) => Ok(None),
            _ => Err(Error::InvalidArgument(
                "username and password must be supplied together".into(),
            )),
        }
    }
}
