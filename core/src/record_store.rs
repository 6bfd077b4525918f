//! Record store trait and related types.
//!
//! The record store is the persistence boundary of the back-office: a
//! table-oriented store of JSON records with equality filtering, ordering,
//! one-level embedding of a referenced record and atomic batches of writes.
//!
//! # Design
//!
//! Records are `serde_json` objects keyed by column name. Typed domain
//! structs convert to and from records with [`to_record`] and
//! [`from_record`], so the trait itself stays free of domain types.
//!
//! Every multi-record operation the back-office performs (promoting an
//! inquiry, marking an invoice paid, replacing invoice items) goes through
//! [`RecordStore::transact`], which applies a batch of [`Mutation`]s
//! all-or-nothing.
//!
//! # Implementations
//!
//! - `PostgresRecordStore` (in `backline-postgres`): Production implementation
//! - `InMemoryRecordStore` (in `backline-testing`): Fast, deterministic testing
//!
//! # Example
//!
//! ```no_run
//! use backline_core::record_store::{Filter, Order, Query, RecordStore, RecordStoreError};
//!
//! async fn latest_payments(store: &dyn RecordStore) -> Result<usize, RecordStoreError> {
//!     let rows = store
//!         .select(
//!             Query::table("payments")
//!                 .filter(Filter::eq("status", "completed"))
//!                 .order_by(Order::desc("payment_date")),
//!         )
//!         .await?;
//!     Ok(rows.len())
//! }
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// A stored row: column name to JSON value.
pub type Record = serde_json::Map<String, Value>;

/// Boxed future returned by every [`RecordStore`] method.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RecordStoreError>> + Send + 'a>>;

/// Errors that can occur during record store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordStoreError {
    /// A write would leave a dangling reference, or a delete hit a row that is
    /// still referenced under a restricting foreign key.
    #[error("Foreign key violation on {table}: {constraint}")]
    ForeignKeyViolation {
        /// Table the write was issued against.
        table: String,
        /// Constraint (or referencing table) that rejected the write.
        constraint: String,
    },

    /// A write would duplicate a unique column.
    #[error("Unique violation on {table}: {constraint}")]
    UniqueViolation {
        /// Table the write was issued against.
        table: String,
        /// Constraint (or column) that rejected the write.
        constraint: String,
    },

    /// A guarded update inside a batch matched no row; the batch was rolled back.
    #[error("Precondition failed on {table}")]
    PreconditionFailed {
        /// Table the guarded update targeted.
        table: String,
    },

    /// The query referenced an unknown table or an invalid identifier.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Database connection error.
    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Equality-style predicate on one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Column equals value.
    Eq(String, Value),
    /// Column differs from value (`NULL` counts as different).
    Neq(String, Value),
    /// Column is `NULL` or absent.
    IsNull(String),
}

impl Filter {
    /// `column = value`
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(column.into(), value.into())
    }

    /// `column IS DISTINCT FROM value`
    pub fn neq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Neq(column.into(), value.into())
    }

    /// `column IS NULL`
    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull(column.into())
    }

    /// Column this filter inspects.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Eq(column, _) | Self::Neq(column, _) | Self::IsNull(column) => column,
        }
    }

    /// Evaluate the filter against an in-memory record.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        let value = record.get(self.column()).unwrap_or(&Value::Null);
        match self {
            Self::Eq(_, expected) => value == expected,
            Self::Neq(_, expected) => value != expected,
            Self::IsNull(_) => value.is_null(),
        }
    }
}

/// Sort key for a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Column to sort on.
    pub column: String,
    /// Ascending when true.
    pub ascending: bool,
    /// Place `NULL` values before all others when true.
    pub nulls_first: bool,
}

impl Order {
    /// Ascending, nulls last.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
            nulls_first: false,
        }
    }

    /// Descending, nulls last.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
            nulls_first: false,
        }
    }
}

/// Embed a referenced row into each result.
///
/// For every result row, the row of `table` whose `id` equals the result's
/// `foreign_key` column is projected to `columns` and stored under the key
/// `table`. A missing or `NULL` reference embeds `NULL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    /// Referenced table, also the key the embedded object is stored under.
    pub table: String,
    /// Column on the queried table holding the referenced id.
    pub foreign_key: String,
    /// Columns of the referenced row to include.
    pub columns: Vec<String>,
}

impl Embed {
    /// Build an embed of `columns` from `table` through `foreign_key`.
    pub fn new(table: impl Into<String>, foreign_key: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            table: table.into(),
            foreign_key: foreign_key.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
        }
    }
}

/// A read against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Table to read.
    pub table: String,
    /// Conjunction of predicates.
    pub filters: Vec<Filter>,
    /// Sort keys, most significant first.
    pub order: Vec<Order>,
    /// Maximum number of rows.
    pub limit: Option<usize>,
    /// Referenced rows to embed.
    pub embeds: Vec<Embed>,
}

impl Query {
    /// Start a query over `table`.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            embeds: Vec::new(),
        }
    }

    /// Add a predicate.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add a sort key.
    #[must_use]
    pub fn order_by(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    /// Cap the number of rows.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Embed a referenced row.
    #[must_use]
    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }
}

/// A single write.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Insert rows. Missing `id` and `created_at` columns are filled by the store.
    Insert {
        /// Target table.
        table: String,
        /// Rows to insert.
        rows: Vec<Record>,
    },
    /// Overwrite the columns in `patch` on every row matching `filters`.
    Update {
        /// Target table.
        table: String,
        /// Columns to set.
        patch: Record,
        /// Rows to touch.
        filters: Vec<Filter>,
        /// Abort with [`RecordStoreError::PreconditionFailed`] when nothing matches.
        require_match: bool,
    },
    /// Delete every row matching `filters`.
    Delete {
        /// Target table.
        table: String,
        /// Rows to delete.
        filters: Vec<Filter>,
    },
}

impl Mutation {
    /// Insert one row.
    pub fn insert(table: impl Into<String>, row: Record) -> Self {
        Self::Insert {
            table: table.into(),
            rows: vec![row],
        }
    }

    /// Unguarded update.
    pub fn update(table: impl Into<String>, patch: Record, filters: Vec<Filter>) -> Self {
        Self::Update {
            table: table.into(),
            patch,
            filters,
            require_match: false,
        }
    }

    /// Update that fails the whole batch if no row matches.
    pub fn guarded_update(table: impl Into<String>, patch: Record, filters: Vec<Filter>) -> Self {
        Self::Update {
            table: table.into(),
            patch,
            filters,
            require_match: true,
        }
    }

    /// Delete matching rows.
    pub fn delete(table: impl Into<String>, filters: Vec<Filter>) -> Self {
        Self::Delete {
            table: table.into(),
            filters,
        }
    }

    /// Table this mutation writes.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::Insert { table, .. } | Self::Update { table, .. } | Self::Delete { table, .. } => {
                table
            },
        }
    }
}

/// Record store abstraction.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to be shared across request
/// handlers and captured by reducer effects.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// to enable trait object usage (`Arc<dyn RecordStore>`).
pub trait RecordStore: Send + Sync {
    /// Read rows.
    ///
    /// # Errors
    ///
    /// - `InvalidQuery`: Unknown table or column identifier
    /// - `DatabaseError`: Backend failure
    fn select(&self, query: Query) -> StoreFuture<'_, Vec<Record>>;

    /// Apply one write and return the rows it inserted, updated or deleted.
    ///
    /// # Errors
    ///
    /// - `ForeignKeyViolation` / `UniqueViolation`: Integrity constraint rejected the write
    /// - `PreconditionFailed`: Guarded update matched nothing
    /// - `DatabaseError`: Backend failure
    fn execute(&self, mutation: Mutation) -> StoreFuture<'_, Vec<Record>>;

    /// Apply a batch of writes atomically.
    ///
    /// Either every mutation is applied, or none is. Returns the affected rows of
    /// each mutation in order.
    ///
    /// # Errors
    ///
    /// The first error raised by any mutation; the batch is rolled back.
    fn transact(&self, mutations: Vec<Mutation>) -> StoreFuture<'_, Vec<Vec<Record>>>;

    /// Cheap connectivity check used by the readiness endpoint.
    ///
    /// # Errors
    ///
    /// `DatabaseError` when the backend is unreachable.
    fn ping(&self) -> StoreFuture<'_, ()>;

    /// Insert one row and return it as stored.
    ///
    /// # Errors
    ///
    /// See [`RecordStore::execute`].
    fn insert(&self, table: &str, row: Record) -> StoreFuture<'_, Record> {
        let table = table.to_string();
        let pending = self.execute(Mutation::insert(table.clone(), row));
        Box::pin(async move {
            pending.await?.into_iter().next().ok_or_else(|| {
                RecordStoreError::DatabaseError(format!("insert into {table} returned no row"))
            })
        })
    }

    /// Update matching rows and return them.
    ///
    /// # Errors
    ///
    /// See [`RecordStore::execute`].
    fn update(&self, table: &str, patch: Record, filters: Vec<Filter>) -> StoreFuture<'_, Vec<Record>> {
        self.execute(Mutation::update(table, patch, filters))
    }

    /// Delete matching rows and return them.
    ///
    /// # Errors
    ///
    /// See [`RecordStore::execute`].
    fn delete(&self, table: &str, filters: Vec<Filter>) -> StoreFuture<'_, Vec<Record>> {
        self.execute(Mutation::delete(table, filters))
    }
}

/// Convert a serializable value into a record.
///
/// # Errors
///
/// `SerializationError` if the value does not serialize to a JSON object.
pub fn to_record<T: Serialize>(value: &T) -> Result<Record, RecordStoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(RecordStoreError::SerializationError(format!(
            "expected an object, got {other}"
        ))),
        Err(e) => Err(RecordStoreError::SerializationError(e.to_string())),
    }
}

/// Decode a record into a typed value.
///
/// # Errors
///
/// `SerializationError` if the record does not match `T`.
pub fn from_record<T: DeserializeOwned>(record: Record) -> Result<T, RecordStoreError> {
    serde_json::from_value(Value::Object(record))
        .map_err(|e| RecordStoreError::SerializationError(e.to_string()))
}

/// Decode every record of a result set.
///
/// # Errors
///
/// `SerializationError` on the first record that does not match `T`.
pub fn from_records<T: DeserializeOwned>(records: Vec<Record>) -> Result<Vec<T>, RecordStoreError> {
    records.into_iter().map(from_record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    #[test]
    fn filters_match_like_sql() {
        let row = record(json!({"state": "inquiry", "event_date": null}));

        assert!(Filter::eq("state", "inquiry").matches(&row));
        assert!(!Filter::eq("state", "approved").matches(&row));
        assert!(Filter::neq("state", "approved").matches(&row));
        assert!(Filter::is_null("event_date").matches(&row));
        assert!(Filter::is_null("missing").matches(&row));
        assert!(Filter::neq("missing", "x").matches(&row));
    }

    #[test]
    fn query_builder_accumulates_clauses() {
        let query = Query::table("payments")
            .filter(Filter::eq("status", "completed"))
            .order_by(Order::desc("payment_date"))
            .embed(Embed::new("contacts", "contact_id", &["first_name", "email"]))
            .limit(5);

        assert_eq!(query.table, "payments");
        assert_eq!(query.filters.len(), 1);
        assert!(!query.order[0].ascending);
        assert_eq!(query.embeds[0].columns, vec!["first_name", "email"]);
        assert_eq!(query.limit, Some(5));
    }

    #[test]
    fn to_record_rejects_non_objects() {
        assert!(matches!(
            to_record(&42),
            Err(RecordStoreError::SerializationError(_))
        ));
        let map = to_record(&json!({"a": 1})).unwrap_or_default();
        assert_eq!(map.get("a"), Some(&json!(1)));
    }

    #[test]
    fn foreign_key_error_display() {
        let error = RecordStoreError::ForeignKeyViolation {
            table: "contacts".into(),
            constraint: "payments_contact_id_fkey".into(),
        };
        let display = format!("{error}");
        assert!(display.contains("contacts"));
        assert!(display.contains("payments_contact_id_fkey"));
    }
}
