//! The adapter facade: configuration, connect-time reconciliation, and the
//! CRUD surface.

use std::sync::Arc;

use asupersync::{Cx, Outcome};
use rowmap_core::{
    AdapterContext, AdapterOptions, Error, ExecutorPool, KeyConfig, KeyGeneration,
    PrimaryKeyDecl, Record, RecordSchema, Value,
};
use rowmap_query::{FindOptions, FindResult, UpdateSpec};

/// Builder for an [`Adapter`]. The record-type schema is required up front;
/// everything else has a default. `connect` fails with a configuration
/// error when no pool was supplied.
#[derive(Debug)]
pub struct AdapterBuilder<P> {
    schema: RecordSchema,
    keys: KeyConfig,
    options: AdapterOptions,
    pool: Option<P>,
}

impl<P: ExecutorPool> AdapterBuilder<P> {
    /// Start configuring an adapter over the given schema.
    pub fn new(schema: RecordSchema) -> Self {
        Self {
            schema,
            keys: KeyConfig::default(),
            options: AdapterOptions::default(),
            pool: None,
        }
    }

    /// Use custom schema-description key names.
    #[must_use]
    pub fn keys(mut self, keys: KeyConfig) -> Self {
        self.keys = keys;
        self
    }

    /// Map a record type to a different physical table name.
    #[must_use]
    pub fn table_name(mut self, type_name: impl Into<String>, table: impl Into<String>) -> Self {
        self.options.type_map.insert(type_name.into(), table.into());
        self
    }

    /// Declare the primary-key column type.
    #[must_use]
    pub fn primary_key(mut self, declaration: PrimaryKeyDecl) -> Self {
        self.options.primary_key = declaration;
        self
    }

    /// Enable `REFERENCES … ON DELETE SET NULL` constraints on singular
    /// link columns.
    #[must_use]
    pub fn use_foreign_keys(mut self, enabled: bool) -> Self {
        self.options.use_foreign_keys = enabled;
        self
    }

    /// Choose how primary keys are assigned to records created without one.
    #[must_use]
    pub fn key_generation(mut self, generation: KeyGeneration) -> Self {
        self.options.key_generation = generation;
        self
    }

    /// Merge a raw filter fragment verbatim into every find's WHERE clause.
    #[must_use]
    pub fn raw_condition(mut self, condition: impl Into<String>) -> Self {
        self.options.raw_condition = Some(condition.into());
        self
    }

    /// Supply the connection pool.
    #[must_use]
    pub fn pool(mut self, pool: P) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Validate the configuration, reconcile the physical schema, and
    /// return the connected adapter. Reconciliation failures are fatal.
    pub async fn connect(self, cx: &Cx) -> Outcome<Adapter<P>, Error> {
        let Some(pool) = self.pool else {
            return Outcome::Err(Error::configuration("a connection pool is required"));
        };
        let ctx = Arc::new(AdapterContext {
            schema: self.schema,
            keys: self.keys,
            options: self.options,
        });

        match rowmap_schema::reconcile(cx, &pool, &ctx).await {
            Outcome::Ok(()) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
        tracing::info!(types = ctx.schema.type_names().count(), "adapter connected");

        Outcome::Ok(Adapter { pool, ctx })
    }
}

/// A connected adapter. Operations outside a transaction scope run on the
/// shared pool; see [`crate::TransactionScope`] for atomic multi-statement
/// use.
#[derive(Debug)]
pub struct Adapter<P: ExecutorPool> {
    pub(crate) pool: P,
    pub(crate) ctx: Arc<AdapterContext>,
}

impl<P: ExecutorPool> Adapter<P> {
    /// The immutable context shared by every operation.
    pub fn context(&self) -> &AdapterContext {
        &self.ctx
    }

    /// Close the underlying pool.
    pub async fn disconnect(&self, cx: &Cx) -> Outcome<(), Error> {
        tracing::info!("adapter disconnecting");
        self.pool.close(cx).await
    }

    /// Find records of a type, optionally restricted to an id list. The
    /// result carries the filter-wide total alongside the page of records.
    #[tracing::instrument(level = "debug", skip_all, fields(type_name))]
    pub async fn find(
        &self,
        cx: &Cx,
        type_name: &str,
        ids: Option<&[Value]>,
        options: &FindOptions,
    ) -> Outcome<FindResult, Error> {
        rowmap_query::find(cx, &self.pool, &self.ctx, type_name, ids, options).await
    }

    /// Insert a batch of records, returning them with assigned primary
    /// keys.
    #[tracing::instrument(level = "debug", skip_all, fields(type_name))]
    pub async fn create(
        &self,
        cx: &Cx,
        type_name: &str,
        records: Vec<Record>,
    ) -> Outcome<Vec<Record>, Error> {
        rowmap_query::create(cx, &self.pool, &self.ctx, type_name, records).await
    }

    /// Apply sparse per-record updates, returning the summed affected-row
    /// count.
    #[tracing::instrument(level = "debug", skip_all, fields(type_name))]
    pub async fn update(
        &self,
        cx: &Cx,
        type_name: &str,
        updates: &[UpdateSpec],
    ) -> Outcome<u64, Error> {
        rowmap_query::update(cx, &self.pool, &self.ctx, type_name, updates).await
    }

    /// Delete records by id list, or all records of the type.
    #[tracing::instrument(level = "debug", skip_all, fields(type_name))]
    pub async fn delete(
        &self,
        cx: &Cx,
        type_name: &str,
        ids: Option<&[Value]>,
    ) -> Outcome<u64, Error> {
        rowmap_query::delete(cx, &self.pool, &self.ctx, type_name, ids).await
    }
}
