//! `PostgreSQL` record store implementation for Backline.
//!
//! This crate provides a `PostgreSQL`-based implementation of the `RecordStore`
//! trait from `backline-core`. Rows travel as `jsonb`: reads project each row
//! with `to_jsonb`, writes expand a JSON object with `jsonb_populate_record`,
//! so one code path serves every table of the back-office schema.
//!
//! - Equality filters, ordering with explicit null placement, row limits
//! - One-level embedding of a referenced row
//! - Atomic batches in a single transaction
//! - Integrity errors mapped to `RecordStoreError` by SQLSTATE
//!
//! # Example
//!
//! ```ignore
//! use backline_postgres::PostgresRecordStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresRecordStore::connect("postgres://localhost/backline", 10, 30).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

use backline_core::record_store::{
    Filter, Mutation, Query, Record, RecordStore, RecordStoreError, StoreFuture,
};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};
use std::fmt::Write as _;
use std::time::Duration;

/// SQLSTATE for `foreign_key_violation`.
const FOREIGN_KEY_VIOLATION: &str = "23503";
/// SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// `PostgreSQL`-backed record store.
#[derive(Clone, Debug)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    /// Connect a pool to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::DatabaseError`] if the pool cannot connect.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> Result<Self, RecordStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| RecordStoreError::DatabaseError(e.to_string()))?;
        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the back-office schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`RecordStoreError::DatabaseError`] if migration fails.
    pub async fn migrate(&self) -> Result<(), RecordStoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RecordStoreError::DatabaseError(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn run_batch(&self, mutations: Vec<Mutation>) -> Result<Vec<Vec<Record>>, RecordStoreError> {
        let size = mutations.len();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RecordStoreError::DatabaseError(e.to_string()))?;

        let mut outcomes = Vec::with_capacity(size);
        for mutation in mutations {
            let table = mutation.table().to_string();
            match apply(&mut tx, mutation).await {
                Ok(rows) => outcomes.push(rows),
                Err(error) => {
                    // Dropping the transaction rolls it back.
                    tracing::debug!(table = %table, error = %error, "Record store batch rolled back");
                    metrics::counter!("record_store.batches.rolled_back").increment(1);
                    return Err(error);
                },
            }
        }

        tx.commit()
            .await
            .map_err(|e| RecordStoreError::DatabaseError(e.to_string()))?;
        metrics::counter!("record_store.mutations", "backend" => "postgres")
            .increment(u64::try_from(size).unwrap_or(u64::MAX));
        Ok(outcomes)
    }
}

impl RecordStore for PostgresRecordStore {
    fn select(&self, query: Query) -> StoreFuture<'_, Vec<Record>> {
        Box::pin(async move {
            let (sql, binds) = select_sql(&query)?;
            let mut statement = sqlx::query_scalar::<_, Json<Value>>(&sql);
            for value in binds {
                statement = statement.bind(Json(value));
            }
            let rows = statement
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_error(&query.table, e))?;
            metrics::counter!("record_store.selects", "table" => query.table.clone()).increment(1);
            Ok(rows.into_iter().filter_map(into_record).collect())
        })
    }

    fn execute(&self, mutation: Mutation) -> StoreFuture<'_, Vec<Record>> {
        Box::pin(async move {
            let mut outcomes = self.run_batch(vec![mutation]).await?;
            Ok(outcomes.pop().unwrap_or_default())
        })
    }

    fn transact(&self, mutations: Vec<Mutation>) -> StoreFuture<'_, Vec<Vec<Record>>> {
        Box::pin(self.run_batch(mutations))
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| RecordStoreError::DatabaseError(e.to_string()))?;
            Ok(())
        })
    }
}

async fn apply(
    tx: &mut Transaction<'static, Postgres>,
    mutation: Mutation,
) -> Result<Vec<Record>, RecordStoreError> {
    match mutation {
        Mutation::Insert { table, rows } => {
            let mut inserted = Vec::with_capacity(rows.len());
            for row in rows {
                let sql = insert_sql(&table, &row)?;
                let stored = sqlx::query_scalar::<_, Json<Value>>(&sql)
                    .bind(Json(Value::Object(row)))
                    .fetch_one(&mut **tx)
                    .await
                    .map_err(|e| map_error(&table, e))?;
                inserted.extend(into_record(stored));
            }
            Ok(inserted)
        },
        Mutation::Update {
            table,
            patch,
            filters,
            require_match,
        } => {
            let (sql, binds) = update_sql(&table, &patch, &filters)?;
            let mut statement = sqlx::query_scalar::<_, Json<Value>>(&sql);
            if !patch.is_empty() {
                statement = statement.bind(Json(Value::Object(patch)));
            }
            for value in binds {
                statement = statement.bind(Json(value));
            }
            let rows = statement
                .fetch_all(&mut **tx)
                .await
                .map_err(|e| map_error(&table, e))?;
            if rows.is_empty() && require_match {
                return Err(RecordStoreError::PreconditionFailed { table });
            }
            Ok(rows.into_iter().filter_map(into_record).collect())
        },
        Mutation::Delete { table, filters } => {
            let (sql, binds) = delete_sql(&table, &filters)?;
            let mut statement = sqlx::query_scalar::<_, Json<Value>>(&sql);
            for value in binds {
                statement = statement.bind(Json(value));
            }
            let rows = statement
                .fetch_all(&mut **tx)
                .await
                .map_err(|e| map_error(&table, e))?;
            Ok(rows.into_iter().filter_map(into_record).collect())
        },
    }
}

fn into_record(Json(value): Json<Value>) -> Option<Record> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn map_error(table: &str, error: sqlx::Error) -> RecordStoreError {
    if let sqlx::Error::Database(db) = &error {
        let constraint = db.constraint().unwrap_or_default().to_string();
        match db.code().as_deref() {
            Some(FOREIGN_KEY_VIOLATION) => {
                return RecordStoreError::ForeignKeyViolation {
                    table: table.to_string(),
                    constraint,
                };
            },
            Some(UNIQUE_VIOLATION) => {
                return RecordStoreError::UniqueViolation {
                    table: table.to_string(),
                    constraint,
                };
            },
            _ => {},
        }
    }
    tracing::error!(table, error = %error, "Record store query failed");
    RecordStoreError::DatabaseError(error.to_string())
}

/// Accept only plain lower-case SQL identifiers.
fn ident(name: &str) -> Result<&str, RecordStoreError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        Ok(name)
    } else {
        Err(RecordStoreError::InvalidQuery(format!(
            "invalid identifier: {name:?}"
        )))
    }
}

/// Render `WHERE` predicates; parameters are numbered from `first_param`.
fn where_clause(
    filters: &[Filter],
    first_param: usize,
) -> Result<(String, Vec<Value>), RecordStoreError> {
    if filters.is_empty() {
        return Ok((String::new(), Vec::new()));
    }
    let mut binds = Vec::new();
    let mut predicates = Vec::with_capacity(filters.len());
    for filter in filters {
        let column = ident(filter.column())?;
        match filter {
            Filter::Eq(_, value) => {
                binds.push(value.clone());
                let n = first_param + binds.len() - 1;
                predicates.push(format!("(to_jsonb(t) -> '{column}') = ${n}"));
            },
            Filter::Neq(_, value) => {
                binds.push(value.clone());
                let n = first_param + binds.len() - 1;
                predicates.push(format!(
                    "(to_jsonb(t) -> '{column}') IS DISTINCT FROM ${n}"
                ));
            },
            Filter::IsNull(_) => predicates.push(format!("t.{column} IS NULL")),
        }
    }
    Ok((format!(" WHERE {}", predicates.join(" AND ")), binds))
}

fn select_sql(query: &Query) -> Result<(String, Vec<Value>), RecordStoreError> {
    let table = ident(&query.table)?;
    let mut projection = String::from("to_jsonb(t)");
    for embed in &query.embeds {
        let embedded = ident(&embed.table)?;
        let foreign_key = ident(&embed.foreign_key)?;
        let mut fields = Vec::with_capacity(embed.columns.len());
        for column in &embed.columns {
            let column = ident(column)?;
            fields.push(format!("'{column}', e.{column}"));
        }
        let _ = write!(
            projection,
            " || jsonb_build_object('{embedded}', (SELECT jsonb_build_object({}) FROM {embedded} AS e WHERE e.id = t.{foreign_key}))",
            fields.join(", ")
        );
    }

    let (filter_sql, binds) = where_clause(&query.filters, 1)?;
    let mut sql = format!("SELECT {projection} FROM {table} AS t{filter_sql}");

    if !query.order.is_empty() {
        let mut keys = Vec::with_capacity(query.order.len());
        for order in &query.order {
            keys.push(format!(
                "t.{} {} {}",
                ident(&order.column)?,
                if order.ascending { "ASC" } else { "DESC" },
                if order.nulls_first { "NULLS FIRST" } else { "NULLS LAST" },
            ));
        }
        let _ = write!(sql, " ORDER BY {}", keys.join(", "));
    }
    if let Some(limit) = query.limit {
        let _ = write!(sql, " LIMIT {limit}");
    }
    Ok((sql, binds))
}

fn insert_sql(table: &str, row: &Record) -> Result<String, RecordStoreError> {
    let table = ident(table)?;
    if row.is_empty() {
        return Ok(format!(
            "INSERT INTO {table} AS t DEFAULT VALUES RETURNING to_jsonb(t)"
        ));
    }
    let columns = row
        .keys()
        .map(|c| ident(c))
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");
    Ok(format!(
        "INSERT INTO {table} AS t ({columns}) SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1) RETURNING to_jsonb(t)"
    ))
}

fn update_sql(
    table: &str,
    patch: &Record,
    filters: &[Filter],
) -> Result<(String, Vec<Value>), RecordStoreError> {
    let table = ident(table)?;
    if patch.is_empty() {
        let (filter_sql, binds) = where_clause(filters, 1)?;
        return Ok((format!("SELECT to_jsonb(t) FROM {table} AS t{filter_sql}"), binds));
    }
    let assignments = patch
        .keys()
        .map(|c| ident(c).map(|c| format!("{c} = p.{c}")))
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");
    let (filter_sql, binds) = where_clause(filters, 2)?;
    Ok((
        format!(
            "UPDATE {table} AS t SET {assignments} FROM jsonb_populate_record(NULL::{table}, $1) AS p{filter_sql} RETURNING to_jsonb(t)"
        ),
        binds,
    ))
}

fn delete_sql(table: &str, filters: &[Filter]) -> Result<(String, Vec<Value>), RecordStoreError> {
    let table = ident(table)?;
    let (filter_sql, binds) = where_clause(filters, 1)?;
    Ok((
        format!("DELETE FROM {table} AS t{filter_sql} RETURNING to_jsonb(t)"),
        binds,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use backline_core::record_store::{Embed, Order};
    use serde_json::json;

    #[test]
    fn identifiers_are_validated() {
        assert!(ident("payment_date").is_ok());
        assert!(ident("contacts; DROP TABLE x").is_err());
        assert!(ident("Bookings").is_err());
        assert!(ident("").is_err());
    }

    #[test]
    fn select_renders_filters_order_and_embed() {
        let query = Query::table("payments")
            .filter(Filter::eq("status", "completed"))
            .filter(Filter::is_null("invoice_id"))
            .order_by(Order::desc("payment_date"))
            .embed(Embed::new("contacts", "contact_id", &["email"]))
            .limit(10);

        let (sql, binds) = select_sql(&query).unwrap();
        assert!(sql.contains("FROM payments AS t"));
        assert!(sql.contains("(to_jsonb(t) -> 'status') = $1"));
        assert!(sql.contains("t.invoice_id IS NULL"));
        assert!(sql.contains("ORDER BY t.payment_date DESC NULLS LAST"));
        assert!(sql.contains("jsonb_build_object('email', e.email)"));
        assert!(sql.ends_with("LIMIT 10"));
        assert_eq!(binds, vec![json!("completed")]);
    }

    #[test]
    fn update_numbers_filter_params_after_patch() {
        let mut patch = Record::new();
        patch.insert("status".into(), json!("paid"));
        let (sql, binds) = update_sql(
            "invoices",
            &patch,
            &[Filter::eq("id", "abc"), Filter::neq("status", "paid")],
        )
        .unwrap();
        assert!(sql.contains("SET status = p.status"));
        assert!(sql.contains("= $2"));
        assert!(sql.contains("IS DISTINCT FROM $3"));
        assert_eq!(binds.len(), 2);
    }

    #[test]
    fn insert_lists_record_columns() {
        let mut row = Record::new();
        row.insert("first_name".into(), json!("Jo"));
        row.insert("email".into(), json!("jo@x.com"));
        let sql = insert_sql("contacts", &row).unwrap();
        assert!(sql.contains("(email, first_name)") || sql.contains("(first_name, email)"));
        assert!(sql.contains("jsonb_populate_record(NULL::contacts, $1)"));
    }

    #[test]
    fn delete_without_filters_has_no_where() {
        let (sql, binds) = delete_sql("invoice_items", &[]).unwrap();
        assert_eq!(sql, "DELETE FROM invoice_items AS t RETURNING to_jsonb(t)");
        assert!(binds.is_empty());
    }
}
