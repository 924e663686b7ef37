use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::GroupCount,
    query::{Condition, Direction, Filter, Sort, text_of},
};

/// A stored record: a JSON object whose top-level keys are the model's camelCase fields.
pub type Document = Value;

/// Collection
///
/// The three document collections the service persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Emails,
    Policies,
    Users,
}

impl Collection {
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Emails => "emails",
            Collection::Policies => "policies",
            Collection::Users => "users",
        }
    }

    /// Fields backed by a unique index.
    pub fn unique_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Emails => &[],
            Collection::Policies => &["policyNumber"],
            Collection::Users => &["email"],
        }
    }
}

/// DocumentStore Trait
///
/// The persistence contract every service is written against: create/find/count/group/
/// update/remove over JSON documents with filter + sort + skip + limit semantics.
///
/// `Send + Sync + async_trait` keep `Arc<dyn DocumentStore>` usable across axum tasks.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fails with `StoreError::UniqueViolation` if a unique field collides.
    async fn insert(&self, collection: Collection, id: Uuid, doc: Document) -> Result<(), StoreError>;

    async fn find_by_id(&self, collection: Collection, id: Uuid) -> Result<Option<Document>, StoreError>;

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>, StoreError>;

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError>;

    /// Ordered slice of the matching documents. Documents lacking the sort field come last
    /// ascending and first descending. Ties have a fixed order, so consecutive windows never
    /// overlap or skip a document.
    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        sort: &Sort,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Document>, StoreError>;

    /// Overwrites a document. Returns false if `id` does not exist.
    async fn replace(&self, collection: Collection, id: Uuid, doc: Document) -> Result<bool, StoreError>;

    /// Returns false if `id` does not exist.
    async fn remove(&self, collection: Collection, id: Uuid) -> Result<bool, StoreError>;

    /// Counts documents per distinct textual value of `field`, largest group first.
    async fn group_count(&self, collection: Collection, field: &str) -> Result<Vec<GroupCount>, StoreError>;
}

/// StoreState
///
/// The shared handle to the persistence layer held in `AppState`.
pub type StoreState = Arc<dyn DocumentStore>;

// --- PostgreSQL ---

/// PostgresStore
///
/// One table per collection, `(id UUID PRIMARY KEY, data JSONB)`. Filters compile to
/// `data ->> field` comparisons with every field name and value bound as a parameter.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled migrations (tables and indexes).
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    for (i, condition) in filter.conditions().iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        match condition {
            Condition::Eq { field, value } => {
                builder.push("data ->> ");
                builder.push_bind(field.clone());
                builder.push(" = ");
                builder.push_bind(value.clone());
            }
            Condition::AnyOf { field, values } => {
                builder.push("data ->> ");
                builder.push_bind(field.clone());
                builder.push(" = ANY(");
                builder.push_bind(values.clone());
                builder.push(")");
            }
        }
    }
}

fn map_write_error(collection: Collection, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let field = collection.unique_fields().first().copied().unwrap_or("id");
            return StoreError::UniqueViolation(field.to_string());
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn insert(&self, collection: Collection, id: Uuid, doc: Document) -> Result<(), StoreError> {
        let sql = format!("INSERT INTO {} (id, data) VALUES ($1, $2)", collection.table());
        sqlx::query(&sql)
            .bind(id)
            .bind(Json(doc))
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(collection, e))?;
        Ok(())
    }

    async fn find_by_id(&self, collection: Collection, id: Uuid) -> Result<Option<Document>, StoreError> {
        let sql = format!("SELECT data FROM {} WHERE id = $1", collection.table());
        let row = sqlx::query_scalar::<_, Json<Value>>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|Json(doc)| doc))
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT data FROM {}", collection.table()));
        push_filter(&mut builder, filter);
        builder.push(" LIMIT 1");
        let row = builder
            .build_query_scalar::<Json<Value>>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|Json(doc)| doc))
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {}", collection.table()));
        push_filter(&mut builder, filter);
        let total: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(total.max(0) as u64)
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        sort: &Sort,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Document>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT data FROM {}", collection.table()));
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY data -> ");
        builder.push_bind(sort.field.clone());
        builder.push(" ");
        builder.push(sort.direction.as_sql());
        // Equal sort keys would otherwise come back in arbitrary order per page.
        builder.push(", id ASC OFFSET ");
        builder.push_bind(i64::try_from(skip).unwrap_or(i64::MAX));
        builder.push(" LIMIT ");
        builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));

        let rows = builder
            .build_query_scalar::<Json<Value>>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|Json(doc)| doc).collect())
    }

    async fn replace(&self, collection: Collection, id: Uuid, doc: Document) -> Result<bool, StoreError> {
        let sql = format!("UPDATE {} SET data = $2 WHERE id = $1", collection.table());
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(Json(doc))
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(collection, e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, collection: Collection, id: Uuid) -> Result<bool, StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", collection.table());
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn group_count(&self, collection: Collection, field: &str) -> Result<Vec<GroupCount>, StoreError> {
        let sql = format!(
            "SELECT data ->> $1 AS value, COUNT(*) AS count FROM {} GROUP BY 1 ORDER BY 2 DESC, 1 ASC",
            collection.table()
        );
        let rows = sqlx::query_as::<_, (Option<String>, i64)>(&sql)
            .bind(field)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(value, count)| GroupCount { value, count: count.max(0) as u64 })
            .collect())
    }
}

// --- In-Memory ---

/// MemoryStore
///
/// In-process `DocumentStore` used for local runs (`STORE_BACKEND=memory`) and tests.
/// Mirrors the Postgres semantics: textual equality, unique fields, jsonb-style ordering.
/// Insertion order is kept so equal sort keys stay stable.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<(Uuid, Document)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn unique_collision(
    collection: Collection,
    docs: &[(Uuid, Document)],
    id: Uuid,
    doc: &Document,
) -> Option<StoreError> {
    for field in collection.unique_fields() {
        let Some(candidate) = doc.get(*field).and_then(text_of) else {
            continue;
        };
        let taken = docs.iter().any(|(other_id, other)| {
            *other_id != id && other.get(*field).and_then(text_of).as_deref() == Some(candidate.as_str())
        });
        if taken {
            return Some(StoreError::UniqueViolation(field.to_string()));
        }
    }
    None
}

/// Rank of a JSON type in jsonb ordering: null < string < number < boolean < array < object.
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Missing keys sort after every present value (SQL NULL).
fn compare_keys(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => compare_values(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: Collection, id: Uuid, doc: Document) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        if let Some(err) = unique_collision(collection, docs, id, &doc) {
            return Err(err);
        }
        docs.push((id, doc));
        Ok(())
    }

    async fn find_by_id(&self, collection: Collection, id: Uuid) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|(doc_id, _)| *doc_id == id))
            .map(|(_, doc)| doc.clone()))
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|(_, doc)| filter.matches(doc)))
            .map(|(_, doc)| doc.clone()))
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|docs| docs.iter().filter(|(_, doc)| filter.matches(doc)).count() as u64)
            .unwrap_or(0))
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        sort: &Sort,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(&collection) else {
            return Ok(vec![]);
        };
        let mut matched: Vec<&Document> = docs
            .iter()
            .filter(|(_, doc)| filter.matches(doc))
            .map(|(_, doc)| doc)
            .collect();
        // `sort_by` is stable, so ties keep insertion order.
        matched.sort_by(|a, b| {
            let ord = compare_keys(a.get(&sort.field), b.get(&sort.field));
            match sort.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            }
        });
        Ok(matched
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn replace(&self, collection: Collection, id: Uuid, doc: Document) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        if let Some(err) = unique_collision(collection, docs, id, &doc) {
            return Err(err);
        }
        match docs.iter_mut().find(|(doc_id, _)| *doc_id == id) {
            Some(slot) => {
                slot.1 = doc;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, collection: Collection, id: Uuid) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(&collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|(doc_id, _)| *doc_id != id);
        Ok(docs.len() < before)
    }

    async fn group_count(&self, collection: Collection, field: &str) -> Result<Vec<GroupCount>, StoreError> {
        let collections = self.collections.read().await;
        let mut counts: HashMap<Option<String>, u64> = HashMap::new();
        if let Some(docs) = collections.get(&collection) {
            for (_, doc) in docs {
                *counts.entry(doc.get(field).and_then(text_of)).or_default() += 1;
            }
        }
        let mut groups: Vec<GroupCount> = counts
            .into_iter()
            .map(|(value, count)| GroupCount { value, count })
            .collect();
        // Same order as the SQL: count desc, then value asc with the null group last.
        groups.sort_by(|a, b| {
            b.count.cmp(&a.count).then_with(|| match (&a.value, &b.value) {
                (Some(x), Some(y)) => x.cmp(y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
        });
        Ok(groups)
    }
}
