use crate::error::TransportError;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;

/// Persistence the listener needs: which transactions were already processed.
pub trait AppserviceStorage: Send + Sync + fmt::Debug {
    fn is_transaction_completed<'a>(
        &'a self,
        txn_id: &'a str,
    ) -> BoxFuture<'a, Result<bool, TransportError>>;

    fn set_transaction_completed<'a>(
        &'a self,
        txn_id: &'a str,
    ) -> BoxFuture<'a, Result<(), TransportError>>;
}

/// Process-local storage; completed transactions are forgotten on restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    completed: RwLock<HashSet<String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AppserviceStorage for MemoryStorage {
    fn is_transaction_completed<'a>(
        &'a self,
        txn_id: &'a str,
    ) -> BoxFuture<'a, Result<bool, TransportError>> {
        let completed = self.completed.read().contains(txn_id);
        async move { Ok(completed) }.boxed()
    }

    fn set_transaction_completed<'a>(
        &'a self,
        txn_id: &'a str,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        self.completed.write().insert(txn_id.to_owned());
        async { Ok(()) }.boxed()
    }
}
