//! In-memory record store for tests
//!
//! Provides a fast, deterministic [`RecordStore`] that honours the same
//! integrity rules as the Postgres schema:
//! - [`Schema`]: declares tables, unique columns and foreign keys
//! - [`InMemoryRecordStore`]: `HashMap`-backed storage with atomic batches

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only happens after a test already panicked

use backline_core::record_store::{
    Filter, Mutation, Query, Record, RecordStore, RecordStoreError, StoreFuture,
};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// What happens to referencing rows when a referenced row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    /// Reject the delete.
    Restrict,
    /// Delete the referencing rows too.
    Cascade,
    /// Clear the referencing column.
    SetNull,
}

/// A reference from `column` to the `id` of another table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Referencing column.
    pub column: String,
    /// Referenced table.
    pub references: String,
    /// Delete behaviour.
    pub on_delete: OnDelete,
}

/// Declaration of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Columns whose non-null values must be unique.
    pub unique: Vec<String>,
    /// Outgoing references.
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    /// Declare a table with no constraints.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Require non-null values of `column` to be unique.
    #[must_use]
    pub fn unique(mut self, column: impl Into<String>) -> Self {
        self.unique.push(column.into());
        self
    }

    /// Reference `table.id` from `column`.
    #[must_use]
    pub fn references(mut self, column: impl Into<String>, table: impl Into<String>, on_delete: OnDelete) -> Self {
        self.foreign_keys.push(ForeignKey {
            column: column.into(),
            references: table.into(),
            on_delete,
        });
        self
    }
}

/// The set of tables an [`InMemoryRecordStore`] accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    tables: Vec<TableSchema>,
}

impl Schema {
    /// Empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table.
    #[must_use]
    pub fn table(mut self, table: TableSchema) -> Self {
        self.tables.push(table);
        self
    }

    fn get(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Tables holding a foreign key into `table`, with that key.
    fn referencing(&self, table: &str) -> Vec<(String, ForeignKey)> {
        self.tables
            .iter()
            .flat_map(|t| {
                t.foreign_keys
                    .iter()
                    .filter(|fk| fk.references == table)
                    .map(|fk| (t.name.clone(), fk.clone()))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    rows: HashMap<String, Vec<Record>>,
    last_created_at: Option<DateTime<Utc>>,
}

/// In-memory record store for fast, deterministic testing.
///
/// Every write (single or batched) is applied to a copy of the data and
/// committed only if it succeeds, so a failing batch leaves no trace.
///
/// # Example
///
/// ```
/// use backline_testing::{InMemoryRecordStore, Schema, TableSchema};
/// use backline_core::record_store::{Query, RecordStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryRecordStore::new(Schema::new().table(TableSchema::new("contacts")));
/// let mut row = serde_json::Map::new();
/// row.insert("email".into(), "jo@x.com".into());
/// store.insert("contacts", row).await?;
/// assert_eq!(store.select(Query::table("contacts")).await?.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryRecordStore {
    schema: Arc<Schema>,
    data: Arc<RwLock<Tables>>,
    unavailable: Arc<RwLock<bool>>,
}

impl InMemoryRecordStore {
    /// Create an empty store for `schema`.
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        let rows = schema
            .tables
            .iter()
            .map(|t| (t.name.clone(), Vec::new()))
            .collect();
        Self {
            schema: Arc::new(schema),
            data: Arc::new(RwLock::new(Tables {
                rows,
                last_created_at: None,
            })),
            unavailable: Arc::new(RwLock::new(false)),
        }
    }

    /// Make every subsequent call fail with `DatabaseError` (or recover).
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().unwrap() = unavailable;
    }

    /// Snapshot of a table's rows in insertion order.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.data
            .read()
            .unwrap()
            .rows
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of rows in a table.
    #[must_use]
    pub fn count(&self, table: &str) -> usize {
        self.data
            .read()
            .unwrap()
            .rows
            .get(table)
            .map_or(0, Vec::len)
    }

    fn check_available(&self) -> Result<(), RecordStoreError> {
        if *self.unavailable.read().unwrap() {
            return Err(RecordStoreError::DatabaseError(
                "in-memory store marked unavailable".into(),
            ));
        }
        Ok(())
    }

    fn run_select(&self, query: &Query) -> Result<Vec<Record>, RecordStoreError> {
        self.check_available()?;
        let data = self.data.read().unwrap();
        let rows = data
            .rows
            .get(&query.table)
            .ok_or_else(|| RecordStoreError::InvalidQuery(format!("unknown table {}", query.table)))?;

        let mut result: Vec<Record> = rows
            .iter()
            .filter(|row| query.filters.iter().all(|f| f.matches(row)))
            .cloned()
            .collect();

        result.sort_by(|a, b| {
            for order in &query.order {
                let left = a.get(&order.column).unwrap_or(&Value::Null);
                let right = b.get(&order.column).unwrap_or(&Value::Null);
                let ordering = match (left.is_null(), right.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) if order.nulls_first => Ordering::Less,
                    (true, false) => Ordering::Greater,
                    (false, true) if order.nulls_first => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) if order.ascending => compare_values(left, right),
                    (false, false) => compare_values(right, left),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        if let Some(limit) = query.limit {
            result.truncate(limit);
        }

        for embed in &query.embeds {
            let referenced = data.rows.get(&embed.table).ok_or_else(|| {
                RecordStoreError::InvalidQuery(format!("unknown table {}", embed.table))
            })?;
            for row in &mut result {
                let key = row.get(&embed.foreign_key).cloned().unwrap_or(Value::Null);
                let embedded = referenced
                    .iter()
                    .find(|r| !key.is_null() && r.get("id") == Some(&key))
                    .map_or(Value::Null, |r| {
                        Value::Object(
                            embed
                                .columns
                                .iter()
                                .map(|c| (c.clone(), r.get(c).cloned().unwrap_or(Value::Null)))
                                .collect(),
                        )
                    });
                row.insert(embed.table.clone(), embedded);
            }
        }

        Ok(result)
    }

    fn run_batch(&self, mutations: Vec<Mutation>) -> Result<Vec<Vec<Record>>, RecordStoreError> {
        self.check_available()?;
        let mut data = self.data.write().unwrap();
        let mut working = data.clone();
        let mut outcomes = Vec::with_capacity(mutations.len());
        for mutation in mutations {
            outcomes.push(self.apply(&mut working, mutation)?);
        }
        *data = working;
        Ok(outcomes)
    }

    fn apply(&self, tables: &mut Tables, mutation: Mutation) -> Result<Vec<Record>, RecordStoreError> {
        match mutation {
            Mutation::Insert { table, rows } => {
                self.table_schema(&table)?;
                let mut inserted = Vec::with_capacity(rows.len());
                for mut row in rows {
                    if row.get("id").is_none_or(Value::is_null) {
                        row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
                    }
                    if row.get("created_at").is_none_or(Value::is_null) {
                        let at = next_timestamp(tables);
                        row.insert(
                            "created_at".into(),
                            Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true)),
                        );
                    }
                    self.check_row(tables, &table, &row, None)?;
                    tables.rows.entry(table.clone()).or_default().push(row.clone());
                    inserted.push(row);
                }
                Ok(inserted)
            },
            Mutation::Update {
                table,
                patch,
                filters,
                require_match,
            } => {
                self.table_schema(&table)?;
                let indices = matching(tables, &table, &filters);
                if indices.is_empty() && require_match {
                    return Err(RecordStoreError::PreconditionFailed { table });
                }
                let mut updated = Vec::with_capacity(indices.len());
                for index in indices {
                    let mut row = tables.rows[&table][index].clone();
                    for (column, value) in &patch {
                        row.insert(column.clone(), value.clone());
                    }
                    self.check_row(tables, &table, &row, Some(index))?;
                    if let Some(rows) = tables.rows.get_mut(&table) {
                        rows[index] = row.clone();
                    }
                    updated.push(row);
                }
                Ok(updated)
            },
            Mutation::Delete { table, filters } => {
                self.table_schema(&table)?;
                let ids: Vec<Value> = matching(tables, &table, &filters)
                    .into_iter()
                    .filter_map(|i| tables.rows[&table][i].get("id").cloned())
                    .collect();
                let mut deleted = Vec::with_capacity(ids.len());
                for id in ids {
                    deleted.extend(self.delete_row(tables, &table, &id)?);
                }
                Ok(deleted)
            },
        }
    }

    fn delete_row(&self, tables: &mut Tables, table: &str, id: &Value) -> Result<Vec<Record>, RecordStoreError> {
        for (referencing_table, fk) in self.schema.referencing(table) {
            let by_id = [Filter::Eq(fk.column.clone(), id.clone())];
            let dependents = matching(tables, &referencing_table, &by_id);
            if dependents.is_empty() {
                continue;
            }
            match fk.on_delete {
                OnDelete::Restrict => {
                    return Err(RecordStoreError::ForeignKeyViolation {
                        table: table.to_string(),
                        constraint: format!("{referencing_table}_{}_fkey", fk.column),
                    });
                },
                OnDelete::Cascade => {
                    let dependent_ids: Vec<Value> = dependents
                        .into_iter()
                        .filter_map(|i| tables.rows[&referencing_table][i].get("id").cloned())
                        .collect();
                    for dependent in dependent_ids {
                        self.delete_row(tables, &referencing_table, &dependent)?;
                    }
                },
                OnDelete::SetNull => {
                    if let Some(rows) = tables.rows.get_mut(&referencing_table) {
                        for index in dependents {
                            rows[index].insert(fk.column.clone(), Value::Null);
                        }
                    }
                },
            }
        }

        let rows = tables.rows.entry(table.to_string()).or_default();
        let mut removed = Vec::new();
        rows.retain(|row| {
            if row.get("id") == Some(id) {
                removed.push(row.clone());
                false
            } else {
                true
            }
        });
        Ok(removed)
    }

    fn table_schema(&self, table: &str) -> Result<&TableSchema, RecordStoreError> {
        self.schema
            .get(table)
            .ok_or_else(|| RecordStoreError::InvalidQuery(format!("unknown table {table}")))
    }

    fn check_row(
        &self,
        tables: &Tables,
        table: &str,
        row: &Record,
        own_index: Option<usize>,
    ) -> Result<(), RecordStoreError> {
        let schema = self.table_schema(table)?;
        let existing = tables.rows.get(table).map(Vec::as_slice).unwrap_or_default();

        let mut unique_columns = vec!["id".to_string()];
        unique_columns.extend(schema.unique.iter().cloned());
        for column in &unique_columns {
            let Some(value) = row.get(column).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = existing
                .iter()
                .enumerate()
                .any(|(i, other)| Some(i) != own_index && other.get(column) == Some(value));
            if clash {
                return Err(RecordStoreError::UniqueViolation {
                    table: table.to_string(),
                    constraint: format!("{table}_{column}_key"),
                });
            }
        }

        for fk in &schema.foreign_keys {
            let Some(value) = row.get(&fk.column).filter(|v| !v.is_null()) else {
                continue;
            };
            let exists = tables
                .rows
                .get(&fk.references)
                .is_some_and(|rows| rows.iter().any(|r| r.get("id") == Some(value)));
            if !exists {
                return Err(RecordStoreError::ForeignKeyViolation {
                    table: table.to_string(),
                    constraint: format!("{table}_{}_fkey", fk.column),
                });
            }
        }
        Ok(())
    }
}

fn matching(tables: &Tables, table: &str, filters: &[Filter]) -> Vec<usize> {
    tables
        .rows
        .get(table)
        .map(|rows| {
            rows.iter()
                .enumerate()
                .filter(|(_, row)| filters.iter().all(|f| f.matches(row)))
                .map(|(i, _)| i)
                .collect()
        })
        .unwrap_or_default()
}

/// Strictly increasing creation timestamps so `created_at` ordering is stable.
fn next_timestamp(tables: &mut Tables) -> DateTime<Utc> {
    let now = Utc::now();
    let at = match tables.last_created_at {
        Some(last) if now <= last => last + Duration::microseconds(1),
        _ => now,
    };
    tables.last_created_at = Some(at);
    at
}

/// Total order over JSON scalars: numbers numerically, strings lexically.
fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => left.to_string().cmp(&right.to_string()),
    }
}

impl RecordStore for InMemoryRecordStore {
    fn select(&self, query: Query) -> StoreFuture<'_, Vec<Record>> {
        Box::pin(async move { self.run_select(&query) })
    }

    fn execute(&self, mutation: Mutation) -> StoreFuture<'_, Vec<Record>> {
        Box::pin(async move {
            let mut outcomes = self.run_batch(vec![mutation])?;
            Ok(outcomes.pop().unwrap_or_default())
        })
    }

    fn transact(&self, mutations: Vec<Mutation>) -> StoreFuture<'_, Vec<Vec<Record>>> {
        Box::pin(async move { self.run_batch(mutations) })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.check_available() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backline_core::record_store::{Embed, Order};
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => Record::new(),
        }
    }

    fn schema() -> Schema {
        Schema::new()
            .table(TableSchema::new("contacts"))
            .table(
                TableSchema::new("invoices")
                    .unique("invoice_number")
                    .references("contact_id", "contacts", OnDelete::Restrict),
            )
            .table(TableSchema::new("invoice_items").references(
                "invoice_id",
                "invoices",
                OnDelete::Cascade,
            ))
            .table(
                TableSchema::new("payments")
                    .unique("invoice_id")
                    .references("contact_id", "contacts", OnDelete::Restrict)
                    .references("invoice_id", "invoices", OnDelete::SetNull),
            )
    }

    #[tokio::test]
    async fn insert_fills_id_and_created_at() {
        let store = InMemoryRecordStore::new(schema());
        let row = store
            .insert("contacts", record(json!({"first_name": "Jo"})))
            .await
            .unwrap();
        assert!(row.get("id").unwrap().is_string());
        assert!(row.get("created_at").unwrap().is_string());
    }

    #[tokio::test]
    async fn restrict_blocks_delete_of_referenced_row() {
        let store = InMemoryRecordStore::new(schema());
        let contact = store.insert("contacts", record(json!({}))).await.unwrap();
        let id = contact["id"].clone();
        store
            .insert("payments", record(json!({"contact_id": id})))
            .await
            .unwrap();

        let err = store
            .delete("contacts", vec![Filter::Eq("id".into(), id)])
            .await
            .unwrap_err();
        assert!(matches!(err, RecordStoreError::ForeignKeyViolation { .. }));
        assert_eq!(store.count("contacts"), 1);
    }

    #[tokio::test]
    async fn cascade_and_set_null_follow_delete() {
        let store = InMemoryRecordStore::new(schema());
        let contact = store.insert("contacts", record(json!({}))).await.unwrap();
        let invoice = store
            .insert(
                "invoices",
                record(json!({"contact_id": contact["id"], "invoice_number": "INV-1"})),
            )
            .await
            .unwrap();
        store
            .insert("invoice_items", record(json!({"invoice_id": invoice["id"]})))
            .await
            .unwrap();
        store
            .insert(
                "payments",
                record(json!({"contact_id": contact["id"], "invoice_id": invoice["id"]})),
            )
            .await
            .unwrap();

        store
            .delete("invoices", vec![Filter::Eq("id".into(), invoice["id"].clone())])
            .await
            .unwrap();

        assert_eq!(store.count("invoice_items"), 0);
        assert_eq!(store.rows("payments")[0]["invoice_id"], Value::Null);
    }

    #[tokio::test]
    async fn unknown_reference_is_rejected() {
        let store = InMemoryRecordStore::new(schema());
        let err = store
            .insert("payments", record(json!({"contact_id": "nope"})))
            .await
            .unwrap_err();
        assert!(matches!(err, RecordStoreError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn failed_batch_leaves_no_trace() {
        let store = InMemoryRecordStore::new(schema());
        let contact = store.insert("contacts", record(json!({}))).await.unwrap();

        let err = store
            .transact(vec![
                Mutation::insert(
                    "invoices",
                    record(json!({"contact_id": contact["id"], "invoice_number": "INV-1"})),
                ),
                Mutation::guarded_update(
                    "contacts",
                    record(json!({"first_name": "x"})),
                    vec![Filter::eq("id", "missing")],
                ),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, RecordStoreError::PreconditionFailed { .. }));
        assert_eq!(store.count("invoices"), 0);
    }

    #[tokio::test]
    async fn unique_columns_ignore_nulls() {
        let store = InMemoryRecordStore::new(schema());
        let contact = store.insert("contacts", record(json!({}))).await.unwrap();
        for _ in 0..2 {
            store
                .insert(
                    "payments",
                    record(json!({"contact_id": contact["id"], "invoice_id": null})),
                )
                .await
                .unwrap();
        }
        store
            .insert(
                "invoices",
                record(json!({"contact_id": contact["id"], "invoice_number": "INV-1"})),
            )
            .await
            .unwrap();
        let err = store
            .insert(
                "invoices",
                record(json!({"contact_id": contact["id"], "invoice_number": "INV-1"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RecordStoreError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn select_orders_with_nulls_last_and_embeds() {
        let store = InMemoryRecordStore::new(schema());
        let contact = store
            .insert("contacts", record(json!({"first_name": "Jo", "email": "jo@x.com"})))
            .await
            .unwrap();
        for date in [json!("2025-03-01"), json!(null), json!("2025-01-01")] {
            store
                .insert(
                    "payments",
                    record(json!({"contact_id": contact["id"], "payment_date": date})),
                )
                .await
                .unwrap();
        }

        let rows = store
            .select(
                Query::table("payments")
                    .order_by(Order::asc("payment_date"))
                    .embed(Embed::new("contacts", "contact_id", &["email"])),
            )
            .await
            .unwrap();

        let dates: Vec<Value> = rows.iter().map(|r| r["payment_date"].clone()).collect();
        assert_eq!(dates, vec![json!("2025-01-01"), json!("2025-03-01"), json!(null)]);
        assert_eq!(rows[0]["contacts"]["email"], json!("jo@x.com"));
    }

    #[tokio::test]
    async fn unavailable_store_fails_everything() {
        let store = InMemoryRecordStore::new(schema());
        store.set_unavailable(true);
        assert!(store.ping().await.is_err());
        assert!(store.select(Query::table("contacts")).await.is_err());
        store.set_unavailable(false);
        assert!(store.ping().await.is_ok());
    }
}
