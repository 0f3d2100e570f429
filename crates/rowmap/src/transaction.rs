//! Transaction scoping over a dedicated pooled connection.
//!
//! A scope checks one connection out of the pool for its whole lifetime and
//! must be ended through [`Adapter::end_transaction`] on every path, or the
//! pool leaks the connection.

use std::sync::Arc;

use asupersync::{Cx, Outcome};
use rowmap_core::{AdapterContext, Error, Executor, ExecutorPool, Record, Value};
use rowmap_query::{FindOptions, FindResult, UpdateSpec};

use crate::adapter::Adapter;

/// An open transaction: the parent's context bound to one exclusive
/// connection. Exposes the same operations as the adapter.
pub struct TransactionScope<P: ExecutorPool> {
    pub(crate) conn: P::Conn,
    ctx: Arc<AdapterContext>,
}

impl<P: ExecutorPool> Adapter<P> {
    /// Check a connection out of the pool and open a transaction on it.
    /// The connection is returned to the pool if BEGIN fails.
    pub async fn begin_transaction(&self, cx: &Cx) -> Outcome<TransactionScope<P>, Error> {
        let conn = match self.pool.acquire(cx).await {
            Outcome::Ok(conn) => conn,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        match conn.execute(cx, "BEGIN", &[]).await {
            Outcome::Ok(_) => {}
            Outcome::Err(e) => {
                self.pool.release(conn);
                return Outcome::Err(e);
            }
            Outcome::Cancelled(r) => {
                self.pool.release(conn);
                return Outcome::Cancelled(r);
            }
            Outcome::Panicked(p) => {
                self.pool.release(conn);
                return Outcome::Panicked(p);
            }
        }
        tracing::debug!("transaction started");

        Outcome::Ok(TransactionScope {
            conn,
            ctx: Arc::clone(&self.ctx),
        })
    }

    /// Close a transaction: COMMIT when no triggering error is given,
    /// ROLLBACK otherwise. The connection goes back to the pool on every
    /// path. A failing COMMIT or ROLLBACK supersedes the triggering error.
    pub async fn end_transaction(
        &self,
        cx: &Cx,
        scope: TransactionScope<P>,
        triggering_error: Option<Error>,
    ) -> Outcome<(), Error> {
        let statement = if triggering_error.is_some() {
            "ROLLBACK"
        } else {
            "COMMIT"
        };
        tracing::debug!(statement, "transaction ending");

        let result = scope.conn.execute(cx, statement, &[]).await;
        self.pool.release(scope.conn);

        match result {
            Outcome::Ok(_) => match triggering_error {
                None => Outcome::Ok(()),
                Some(e) => Outcome::Err(e),
            },
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }
}

impl<P: ExecutorPool> TransactionScope<P> {
    /// Find within the transaction.
    pub async fn find(
        &self,
        cx: &Cx,
        type_name: &str,
        ids: Option<&[Value]>,
        options: &FindOptions,
    ) -> Outcome<FindResult, Error> {
        rowmap_query::find(cx, &self.conn, &self.ctx, type_name, ids, options).await
    }

    /// Create within the transaction.
    pub async fn create(
        &self,
        cx: &Cx,
        type_name: &str,
        records: Vec<Record>,
    ) -> Outcome<Vec<Record>, Error> {
        rowmap_query::create(cx, &self.conn, &self.ctx, type_name, records).await
    }

    /// Update within the transaction.
    pub async fn update(
        &self,
        cx: &Cx,
        type_name: &str,
        updates: &[UpdateSpec],
    ) -> Outcome<u64, Error> {
        rowmap_query::update(cx, &self.conn, &self.ctx, type_name, updates).await
    }

    /// Delete within the transaction.
    pub async fn delete(
        &self,
        cx: &Cx,
        type_name: &str,
        ids: Option<&[Value]>,
    ) -> Outcome<u64, Error> {
        rowmap_query::delete(cx, &self.conn, &self.ctx, type_name, ids).await
    }
}
