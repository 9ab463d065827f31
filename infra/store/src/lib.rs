//! # Store
//!
//! Bridge persistence on [SurrealDB](https://surrealdb.com) through the `any` engine
//! (`mem://`, `rocksdb://`, `ws://`, `http://`).
//!
//! [`DiscordStore::new`] only records the connection settings; nothing is opened
//! until [`Store::init`] runs. Init is attempted once and any failure is returned
//! to the caller as-is.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mxd_store::{DiscordStore, Store};
//!
//! let store = DiscordStore::new(config.database.clone());
//! store.init().await?;
//! let entries = store.entries_by_matrix_id("!room:example.org").await?;
//! ```

mod error;
mod schema;

pub use error::{StoreError, StoreErrorExt};

use futures::FutureExt;
use futures::future::BoxFuture;
use mxd_appservice::{AppserviceStorage, TransportError};
use mxd_domain::config::DatabaseConfig;
use mxd_domain::room::RoomEntry;
use schema::RoomEntryRow;
use std::future::Future;
use std::sync::OnceLock;
use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect};
use surrealdb::opt::auth::Root;
use tracing::{debug, info, instrument};

/// Persistence used while routing events.
pub trait Store: Send + Sync + 'static {
    /// Opens the backing database and prepares its tables.
    fn init(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Every room entry bridged to the Matrix room `room_id`.
    fn entries_by_matrix_id(
        &self,
        room_id: &str,
    ) -> impl Future<Output = Result<Vec<RoomEntry>, StoreError>> + Send;
}

/// `SurrealDB`-backed store for room links and completed transactions.
#[derive(Debug)]
pub struct DiscordStore {
    settings: DatabaseConfig,
    instance: OnceLock<Surreal<Any>>,
}

impl DiscordStore {
    #[must_use]
    pub const fn new(settings: DatabaseConfig) -> Self {
        Self { settings, instance: OnceLock::new() }
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.instance.get().is_some()
    }

    fn db(&self) -> Result<&Surreal<Any>, StoreError> {
        self.instance.get().ok_or(StoreError::NotInitialized { context: None })
    }

    /// Links a Matrix room to a remote channel.
    ///
    /// # Errors
    /// [`StoreError::NotInitialized`] before `init`, otherwise query failures.
    pub async fn insert_entry(&self, entry: &RoomEntry) -> Result<(), StoreError> {
        self.db()?
            .query(schema::INSERT_ENTRY)
            .bind(("entry", RoomEntryRow::from(entry)))
            .await
            .context("Inserting room entry")?
            .check()
            .map_err(surrealdb::Error::from)?;
        Ok(())
    }

    /// # Errors
    /// [`StoreError::NotInitialized`] before `init`, otherwise query failures.
    pub async fn is_transaction_completed(&self, txn_id: &str) -> Result<bool, StoreError> {
        let found = self
            .db()?
            .query(schema::SELECT_TRANSACTION)
            .bind(("txn_id", txn_id.to_owned()))
            .await
            .context("Looking up transaction")?
            .take::<Vec<String>>(0)
            .context("Decoding transaction ids")?;
        Ok(!found.is_empty())
    }

    /// Records `txn_id` as processed; recording it twice is a no-op.
    ///
    /// # Errors
    /// [`StoreError::NotInitialized`] before `init`, otherwise query failures.
    pub async fn set_transaction_completed(&self, txn_id: &str) -> Result<(), StoreError> {
        if self.is_transaction_completed(txn_id).await? {
            return Ok(());
        }
        self.db()?
            .query(schema::INSERT_TRANSACTION)
            .bind(("txn_id", txn_id.to_owned()))
            .await
            .context("Recording transaction")?
            .check()
            .map_err(surrealdb::Error::from)?;
        Ok(())
    }

    async fn open(&self) -> Result<Surreal<Any>, StoreError> {
        let DatabaseConfig { url, namespace, database, credentials, .. } = &self.settings;
        if url.trim().is_empty() {
            return Err(StoreError::Validation { message: "URL is required".into(), context: None });
        }
        if namespace.trim().is_empty() || database.trim().is_empty() {
            return Err(StoreError::Validation {
                message: "Namespace and database are required".into(),
                context: Some(url.clone().into()),
            });
        }

        let instance = connect(url.as_str()).await.map_err(|e| StoreError::Connection {
            message: e.to_string().into(),
            context: Some(format!("Initializing engine {url}").into()),
        })?;

        instance.health().await.map_err(|e| StoreError::Connection {
            message: e.to_string().into(),
            context: Some(url.clone().into()),
        })?;

        if let Some(credentials) = credentials {
            instance
                .signin(Root {
                    username: credentials.username.clone(),
                    password: credentials.password.clone(),
                })
                .await
                .map_err(|e| StoreError::Auth {
                    message: e.to_string().into(),
                    context: Some(url.clone().into()),
                })?;
        }

        instance.use_ns(namespace).use_db(database).await.context("Activating session")?;
        instance
            .query(schema::DEFINE_TABLES)
            .await
            .context("Defining tables")?
            .check()
            .map_err(surrealdb::Error::from)?;

        Ok(instance)
    }
}

impl Store for DiscordStore {
    #[instrument(
        skip(self),
        fields(
            url = %self.settings.url,
            ns = %self.settings.namespace,
            db = %self.settings.database,
        )
    )]
    async fn init(&self) -> Result<(), StoreError> {
        if self.is_initialized() {
            debug!("Store already initialized");
            return Ok(());
        }

        let instance = self.open().await?;
        let version =
            instance.version().await.map_or_else(|_| "unknown".to_owned(), |v| v.to_string());

        self.instance.set(instance).map_err(|_| StoreError::Internal {
            message: "Store was initialized concurrently".into(),
            context: None,
        })?;

        info!(
            %version,
            tables = ?[schema::ROOM_ENTRY_TABLE, schema::TRANSACTION_TABLE],
            "SurrealDB store ready"
        );
        Ok(())
    }

    async fn entries_by_matrix_id(&self, room_id: &str) -> Result<Vec<RoomEntry>, StoreError> {
        let rows = self
            .db()?
            .query(schema::SELECT_BY_MATRIX_ID)
            .bind(("matrix_id", room_id.to_owned()))
            .await
            .context("Querying room entries")?
            .take::<Vec<RoomEntryRow>>(0)
            .context("Decoding room entries")?;
        Ok(rows.into_iter().map(RoomEntry::from).collect())
    }
}

impl AppserviceStorage for DiscordStore {
    fn is_transaction_completed<'a>(
        &'a self,
        txn_id: &'a str,
    ) -> BoxFuture<'a, Result<bool, TransportError>> {
        async move { Self::is_transaction_completed(self, txn_id).await.map_err(storage_error) }
            .boxed()
    }

    fn set_transaction_completed<'a>(
        &'a self,
        txn_id: &'a str,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        async move { Self::set_transaction_completed(self, txn_id).await.map_err(storage_error) }
            .boxed()
    }
}

fn storage_error(err: StoreError) -> TransportError {
    TransportError::Storage { message: err.to_string().into(), context: None }
}
