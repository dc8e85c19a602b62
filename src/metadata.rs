//! Metadata store access.
//!
//! The store is a remote table of file records owned by someone else. We only
//! ever read from it, with one query shape: select some columns, optionally
//! narrowed by equality and set-membership predicates. [`SelectQuery`] is that
//! shape; [`MetadataStore`] is anything that can answer it.
//!
//! Two backends:
//!
//! - [`PostgrestStore`] speaks the PostgREST dialect exposed by Supabase
//!   projects (`/rest/v1/<table>?select=..&col=eq.v&id=in.(1,2)`).
//! - `InMemoryStore` evaluates the same queries over rows held in memory
//!   and counts how often it was asked. Only built for tests or with the
//!   `test-util` feature.
//!
//! [`FileCatalog`] sits on top and knows about the `file_metadata` table.

#[cfg(any(test, feature = "test-util"))]
use std::collections::HashMap;
use std::sync::Arc;
#[cfg(any(test, feature = "test-util"))]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StoreError, error_chain};

/// A single row as returned by the store: column name to value.
pub type Row = serde_json::Map<String, Value>;

/// Table holding one row per uploaded file.
pub const DEFAULT_METADATA_TABLE: &str = "file_metadata";

const STORE_TIMEOUT: Duration = Duration::from_secs(30);
const STORE_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Row predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { column: String, value: Value },
    In { column: String, values: Vec<Value> },
}

impl Filter {
    fn matches(&self, row: &Row) -> bool {
        match self {
            Filter::Eq { column, value } => row
                .get(column)
                .is_some_and(|cell| values_equal(cell, value)),
            Filter::In { column, values } => row
                .get(column)
                .is_some_and(|cell| values.iter().any(|v| values_equal(cell, v))),
        }
    }

    fn to_postgrest(&self) -> (String, String) {
        match self {
            Filter::Eq { column, value } => (column.clone(), format!("eq.{}", render_value(value))),
            Filter::In { column, values } => {
                let items: Vec<String> = values.iter().map(render_list_item).collect();
                (column.clone(), format!("in.({})", items.join(",")))
            }
        }
    }
}

/// `select <columns> from <table> where <filters...> [limit n]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: String,
    /// Empty means every column.
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub limit: Option<usize>,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filters: Vec::new(),
            limit: None,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn is_in<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filters.push(Filter::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The `select=` clause: `*` or a comma separated column list.
    pub fn select_clause(&self) -> String {
        if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(",")
        }
    }

    /// Query-string pairs for a PostgREST request, unencoded.
    pub fn postgrest_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.filters.len() + 2);
        params.push(("select".to_string(), self.select_clause()));
        params.extend(self.filters.iter().map(Filter::to_postgrest));
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }

    fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    fn project(&self, row: &Row) -> Row {
        if self.columns.is_empty() {
            return row.clone();
        }
        self.columns
            .iter()
            .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
            .collect()
    }
}

// Store rows come back as JSON; an integer id may arrive as 18 or 18.0
// depending on the column type.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// Values inside `in.(...)` must be double quoted when they contain
// PostgREST's reserved characters.
fn render_list_item(value: &Value) -> String {
    let raw = render_value(value);
    let reserved = |c: char| matches!(c, ',' | '.' | ':' | '(' | ')' | '"' | '\\') || c.is_whitespace();
    if value.is_string() && raw.chars().any(reserved) {
        format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        raw
    }
}

/// Anything that can answer a [`SelectQuery`].
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, StoreError>;
}

/// PostgREST client for a Supabase project.
#[derive(Clone)]
pub struct PostgrestStore {
    client: reqwest::Client,
    rest_url: String,
    api_key: String,
}

impl PostgrestStore {
    /// `project_url` is the project root (e.g. `https://abc.supabase.co`);
    /// `/rest/v1` is appended.
    pub fn new(project_url: &str, api_key: impl Into<String>) -> Result<Self, StoreError> {
        let parsed = reqwest::Url::parse(project_url)
            .map_err(|e| StoreError::InvalidConfig(format!("{project_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(StoreError::InvalidConfig(format!(
                "{project_url}: expected an http(s) url with a host"
            )));
        }

        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(StoreError::InvalidConfig("api key is empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(STORE_TIMEOUT)
            .connect_timeout(STORE_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| StoreError::InvalidConfig(error_chain(&e)))?;

        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            api_key,
        })
    }

    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }
}

impl std::fmt::Debug for PostgrestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestStore")
            .field("rest_url", &self.rest_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl MetadataStore for PostgrestStore {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, StoreError> {
        let url = format!("{}/{}", self.rest_url, query.table);
        let params = query.postgrest_params();
        tracing::debug!(table = %query.table, ?params, "querying metadata store");

        let response = self
            .client
            .get(&url)
            .query(&params)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| StoreError::Transport(error_chain(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {}>", error_chain(&e)));
            tracing::warn!(table = %query.table, status = status.as_u16(), "metadata store rejected query");
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Vec<Row>>()
            .await
            .map_err(|e| StoreError::Decode(error_chain(&e)))
    }
}

/// Rows held in memory, keyed by table name.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: HashMap<String, Vec<Row>>,
    failure: Option<String>,
    queries: AtomicUsize,
}

#[cfg(any(test, feature = "test-util"))]
impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, table: impl Into<String>, rows: Vec<Row>) -> Self {
        self.tables.entry(table.into()).or_default().extend(rows);
        self
    }

    /// Adds every object in a JSON array as a row; anything else is skipped.
    pub fn with_json_rows(self, table: impl Into<String>, rows: Value) -> Self {
        let rows = match rows {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(row) => Some(row),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        self.with_rows(table, rows)
    }

    /// A store whose every query fails with a transport error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Number of queries received so far, failed ones included.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl MetadataStore for InMemoryStore {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(StoreError::Transport(message.clone()));
        }

        let rows = self
            .tables
            .get(&query.table)
            .ok_or_else(|| StoreError::Status {
                status: 404,
                body: format!("relation \"{}\" does not exist", query.table),
            })?;

        Ok(rows
            .iter()
            .filter(|row| query.matches(row))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|row| query.project(row))
            .collect())
    }
}

/// One row of the `file_metadata` table, restricted to the columns this
/// service reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadataRecord {
    pub id: i64,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub processed_file_location: Option<String>,
}

impl TryFrom<Row> for FileMetadataRecord {
    type Error = StoreError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        serde_json::from_value(Value::Object(row)).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

/// File-record queries against one metadata table.
#[derive(Clone)]
pub struct FileCatalog {
    store: Arc<dyn MetadataStore>,
    table: String,
}

impl FileCatalog {
    pub fn new(store: Arc<dyn MetadataStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// All columns of every record, narrowed to one `file_type` when given.
    /// An empty filter counts as no filter.
    pub async fn search(&self, file_type: Option<&str>) -> Result<Vec<Row>, StoreError> {
        let mut query = SelectQuery::new(self.table.as_str());
        if let Some(file_type) = file_type.filter(|t| !t.is_empty()) {
            query = query.eq("file_type", file_type);
        }
        self.store.select(&query).await
    }

    /// `id` and `processed_file_location` for each of `ids` that exists.
    pub async fn locate(&self, ids: &[i64]) -> Result<Vec<FileMetadataRecord>, StoreError> {
        let query = SelectQuery::new(self.table.as_str())
            .columns(["id", "processed_file_location"])
            .is_in("id", ids.iter().copied());
        self.store
            .select(&query)
            .await?
            .into_iter()
            .map(FileMetadataRecord::try_from)
            .collect()
    }

    /// Cheapest query that proves the table is reachable.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let query = SelectQuery::new(self.table.as_str()).columns(["id"]).limit(1);
        self.store.select(&query).await.map(|_| ())
    }
}
