//! The opaque statement-executor boundary.
//!
//! The transport (driver, pool, wire protocol) lives outside this layer.
//! Everything the translation layer needs from it is the ability to run one
//! parameterized statement and get rows or an affected-row count back.

use std::future::Future;

use asupersync::{Cx, Outcome};

use crate::error::Error;
use crate::row::Row;
use crate::value::Value;

/// Executes parameterized statements against the storage backend.
///
/// DDL and transaction-control statements (`BEGIN`, `COMMIT`, `ROLLBACK`,
/// `CREATE TABLE IF NOT EXISTS`, `ALTER TABLE ... ADD COLUMN`) go through
/// [`Executor::execute`] with an empty parameter list.
pub trait Executor: Send + Sync {
    /// Run a statement and return its result rows.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Run a statement and return the number of affected rows.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;
}

/// A pool of executors from which a dedicated connection can be checked out
/// for the lifetime of a transaction scope.
pub trait ExecutorPool: Executor {
    /// A single dedicated connection.
    type Conn: Executor + Send;

    /// Check out a dedicated connection.
    fn acquire(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Conn, Error>> + Send;

    /// Return a dedicated connection to the pool.
    fn release(&self, conn: Self::Conn);

    /// Close the pool and all idle connections.
    fn close(&self, cx: &Cx) -> impl Future<Output = Outcome<(), Error>> + Send;
}
