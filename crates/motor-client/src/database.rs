//! Database handles.

use std::fmt;

use motor_sync::{Document, Result};

use crate::client::MotorClient;
use crate::collection::MotorCollection;

/// Handle to one database on a [`MotorClient`].
///
/// Cheap to clone and inert: holding a handle implies no network state,
/// and operations through it connect lazily like every other operation.
#[derive(Clone)]
pub struct MotorDatabase {
    client: MotorClient,
    name: String,
}

impl MotorDatabase {
    pub(crate) fn new(client: MotorClient, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
        }
    }

    /// Name of this database.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The client this handle came from.
    #[must_use]
    pub fn client(&self) -> &MotorClient {
        &self.client
    }

    /// Handle to a collection in this database.
    #[must_use]
    pub fn collection(&self, name: impl Into<String>) -> MotorCollection {
        MotorCollection::new(self.client.clone(), &self.name, name)
    }

    /// Run a raw command against this database and return the reply.
    pub async fn run_command(&self, command: Document) -> Result<Document> {
        self.client.run_command_on(&self.name, command).await
    }

    /// Drop this database.
    ///
    /// Equivalent to passing the handle to
    /// [`MotorClient::drop_database`].
    pub async fn drop(&self) -> Result<()> {
        self.client.drop_database(self.name.as_str()).await
    }
}

impl fmt::Debug for MotorDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotorDatabase")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Types that name a database for [`MotorClient::drop_database`]: literal
/// names and database handles obtained from the client.
pub trait AsDatabaseName {
    /// The database name to operate on.
    fn as_database_name(&self) -> &str;
}

impl AsDatabaseName for &str {
    fn as_database_name(&self) -> &str {
        self
    }
}

impl AsDatabaseName for String {
    fn as_database_name(&self) -> &str {
        self.as_str()
    }
}

impl AsDatabaseName for &String {
    fn as_database_name(&self) -> &str {
        self.as_str()
    }
}

impl AsDatabaseName for MotorDatabase {
    fn as_database_name(&self) -> &str {
        self.name()
    }
}

impl AsDatabaseName for &MotorDatabase {
    fn as_database_name(&self) -> &str {
        self.name()
    }
}
