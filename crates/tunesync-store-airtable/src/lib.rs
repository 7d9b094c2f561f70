// # Airtable Record Store
//
// RecordStore implementation over the Airtable REST API (v0).
//
// ## Behavior
//
// - One HTTP request per call, except paginated reads and batched writes
// - Semantic field names are translated to Airtable column names and back
// - Bulk creates and updates are split into batches of 10 (the API limit)
// - No retries, no caching, no background tasks
// - Dry-run mode: reads go to the API, writes are only logged
//
// ## Security Requirements
//
// - The API key NEVER appears in logs or Debug output
// - The API key MUST be provided via environment variables only
//
// ## API Reference
//
// - List records:   GET    `/v0/{base}/{table}?filterByFormula=...&offset=...`
// - Create records: POST   `/v0/{base}/{table}`
// - Update record:  PATCH  `/v0/{base}/{table}/{id}`
// - Update records: PATCH  `/v0/{base}/{table}`

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tunesync_core::config::StoreConfig;
use tunesync_core::schema::Table;
use tunesync_core::traits::{RecordStore, RecordStoreFactory, Sort, SortDirection};
use tunesync_core::{Error, Fields, Record, RecordId, Result};

/// Airtable API base URL
const AIRTABLE_API_BASE: &str = "https://api.airtable.com/v0";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Records per create/update request
const MAX_BATCH: usize = 10;

/// Airtable-backed record store
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the store will:
/// - Perform all list requests
/// - Log the intended create/update payloads
/// - Return placeholder ids for creates
/// - **NOT** modify the base
///
/// # Security
///
/// The Debug implementation does NOT expose the API key.
pub struct AirtableStore {
    /// Airtable API key or personal access token
    /// ⚠️ NEVER log this value
    api_key: String,

    /// Base id (e.g. "appXXXXXXXXXXXXXX")
    base_id: String,

    /// API root, without trailing slash
    api_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, read but never write
    dry_run: bool,

    /// Counter for placeholder ids handed out in dry-run mode
    dry_run_ids: AtomicU64,
}

impl std::fmt::Debug for AirtableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirtableStore")
            .field("api_key", &"<REDACTED>")
            .field("base_id", &self.base_id)
            .field("api_url", &self.api_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl AirtableStore {
    /// Create a new Airtable store
    ///
    /// # Parameters
    ///
    /// - `api_key`: Airtable API key with read/write access to the base
    /// - `base_id`: Base id
    /// - `api_url`: API root override (defaults to the public API)
    /// - `dry_run`: If true, perform reads but skip writes
    pub fn new(
        api_key: impl Into<String>,
        base_id: impl Into<String>,
        api_url: Option<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let api_key = api_key.into();
        let base_id = base_id.into();

        if api_key.is_empty() {
            return Err(Error::config("Airtable API key cannot be empty"));
        }
        if base_id.is_empty() {
            return Err(Error::config("Airtable base id cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::upstream("airtable", format!("Failed to build HTTP client: {}", e)))?;

        let api_url = api_url
            .unwrap_or_else(|| AIRTABLE_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            api_key,
            base_id,
            api_url,
            client,
            dry_run,
            dry_run_ids: AtomicU64::new(0),
        })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/{}/{}", self.api_url, self.base_id, table.name())
    }

    /// Send a request and decode the JSON body, mapping HTTP failures
    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<Value> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| Error::upstream("airtable", format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status.as_u16(), &error_text, what));
        }

        response
            .json()
            .await
            .map_err(|e| Error::upstream("airtable", format!("Failed to parse response: {}", e)))
    }

    /// List records, following `offset` until the last page
    async fn list(&self, table: Table, formula: Option<String>, sort: &[Sort]) -> Result<Vec<Record>> {
        let mut params = sort_params(table, sort);
        if let Some(formula) = formula {
            params.push(("filterByFormula".to_string(), formula));
        }

        let mut records = Vec::new();
        let mut offset: Option<String> = None;
        loop {
            let mut query = params.clone();
            if let Some(offset) = &offset {
                query.push(("offset".to_string(), offset.clone()));
            }

            let request = self.client.get(self.table_url(table)).query(&query);
            let page = self.send(request, &format!("list {table}")).await?;

            let rows = page["records"].as_array().ok_or_else(|| {
                Error::upstream("airtable", "Invalid response format: records is not an array")
            })?;
            for row in rows {
                records.push(record_from_json(table, row)?);
            }

            match page["offset"].as_str() {
                Some(next) => offset = Some(next.to_string()),
                None => break,
            }
        }

        tracing::debug!(table = %table, count = records.len(), "listed records");
        Ok(records)
    }

    fn placeholder_id(&self) -> RecordId {
        let n = self.dry_run_ids.fetch_add(1, Ordering::Relaxed) + 1;
        RecordId::new(format!("recDryRun{:08}", n))
    }
}

#[async_trait]
impl RecordStore for AirtableStore {
    async fn create(&self, table: Table, fields: Fields) -> Result<RecordId> {
        let payload = json!({ "fields": to_columns(table, fields) });

        if self.dry_run {
            tracing::info!("[DRY-RUN] Would create {} record: {}", table, payload);
            return Ok(self.placeholder_id());
        }

        let request = self.client.post(self.table_url(table)).json(&payload);
        let created = self.send(request, &format!("create {table}")).await?;
        let record = record_from_json(table, &created)?;
        tracing::debug!(table = %table, id = %record.id, "created record");
        Ok(record.id)
    }

    async fn update(&self, table: Table, id: &RecordId, updates: Fields) -> Result<RecordId> {
        let payload = json!({ "fields": to_columns(table, updates) });

        if self.dry_run {
            tracing::info!("[DRY-RUN] Would update {} record {}: {}", table, id, payload);
            return Ok(id.clone());
        }

        let url = format!("{}/{}", self.table_url(table), id);
        let request = self.client.patch(url).json(&payload);
        let updated = self.send(request, &format!("update {table} {id}")).await?;
        Ok(record_from_json(table, &updated)?.id)
    }

    async fn get_by_attribute(
        &self,
        table: Table,
        attribute: &str,
        value: &str,
        sort: &[Sort],
    ) -> Result<Vec<Record>> {
        let column = column_name(table, attribute);
        self.list(table, Some(equals_formula(column, value)), sort).await
    }

    async fn get_all(&self, table: Table, filter: Option<&str>, sort: &[Sort]) -> Result<Vec<Record>> {
        let formula = filter
            .filter(|f| !f.trim().is_empty())
            .map(str::to_string);
        self.list(table, formula, sort).await
    }

    async fn create_many(&self, table: Table, records: Vec<Fields>) -> Result<Vec<RecordId>> {
        let mut ids = Vec::with_capacity(records.len());
        let rows: Vec<Value> = records
            .into_iter()
            .map(|fields| json!({ "fields": to_columns(table, fields) }))
            .collect();

        for batch in rows.chunks(MAX_BATCH) {
            let payload = json!({ "records": batch });

            if self.dry_run {
                tracing::info!("[DRY-RUN] Would create {} {} records: {}", batch.len(), table, payload);
                ids.extend(batch.iter().map(|_| self.placeholder_id()));
                continue;
            }

            let request = self.client.post(self.table_url(table)).json(&payload);
            let created = self.send(request, &format!("create {table} batch")).await?;
            ids.extend(records_from_batch(table, &created)?.into_iter().map(|r| r.id));
        }

        tracing::debug!(table = %table, count = ids.len(), "created records");
        Ok(ids)
    }

    async fn update_many(&self, table: Table, updates: Vec<(RecordId, Fields)>) -> Result<Vec<RecordId>> {
        let mut ids = Vec::with_capacity(updates.len());
        let rows: Vec<Value> = updates
            .into_iter()
            .map(|(id, fields)| json!({ "id": id, "fields": to_columns(table, fields) }))
            .collect();

        for batch in rows.chunks(MAX_BATCH) {
            let payload = json!({ "records": batch });

            if self.dry_run {
                tracing::info!("[DRY-RUN] Would update {} {} records: {}", batch.len(), table, payload);
                ids.extend(
                    batch
                        .iter()
                        .filter_map(|row| row["id"].as_str())
                        .map(RecordId::from),
                );
                continue;
            }

            let request = self.client.patch(self.table_url(table)).json(&payload);
            let updated = self.send(request, &format!("update {table} batch")).await?;
            ids.extend(records_from_batch(table, &updated)?.into_iter().map(|r| r.id));
        }

        tracing::debug!(table = %table, count = ids.len(), "updated records");
        Ok(ids)
    }

    fn store_name(&self) -> &'static str {
        "airtable"
    }
}

/// Map an HTTP failure status to an error
fn status_error(status: u16, body: &str, what: &str) -> Error {
    match status {
        401 | 403 => Error::upstream(
            "airtable",
            format!("Authentication failed: Invalid API key or insufficient permissions. Status: {}", status),
        ),
        404 => Error::not_found(format!("Airtable {}: base or table not found", what)),
        422 => Error::invalid_input(format!("Airtable rejected {}: {}", what, body)),
        429 => Error::upstream(
            "airtable",
            format!("Rate limit exceeded. Please retry later. Status: {}", status),
        ),
        500..=599 => Error::upstream(
            "airtable",
            format!("Airtable server error (transient): {} - {}", status, body),
        ),
        _ => Error::upstream("airtable", format!("{} failed: {} - {}", what, status, body)),
    }
}

/// Column name for a semantic field; unknown fields pass through unchanged
fn column_name(table: Table, field: &str) -> &str {
    table.column(field).map_or(field, |c| c.name)
}

/// Semantic field name for a column; unknown columns pass through unchanged
fn field_name(table: Table, column: &str) -> &str {
    table.column_by_name(column).map_or(column, |c| c.field)
}

fn to_columns(table: Table, fields: Fields) -> Fields {
    fields
        .into_iter()
        .map(|(field, value)| (column_name(table, &field).to_string(), value))
        .collect()
}

fn from_columns(table: Table, columns: &serde_json::Map<String, Value>) -> Fields {
    columns
        .iter()
        .map(|(column, value)| (field_name(table, column).to_string(), value.clone()))
        .collect()
}

/// Decode one `{id, fields}` object
fn record_from_json(table: Table, row: &Value) -> Result<Record> {
    let id = row["id"]
        .as_str()
        .ok_or_else(|| Error::upstream("airtable", "Invalid response format: record.id is not a string"))?;
    let fields = row["fields"]
        .as_object()
        .map(|columns| from_columns(table, columns))
        .unwrap_or_default();
    Ok(Record::new(id, fields))
}

fn records_from_batch(table: Table, body: &Value) -> Result<Vec<Record>> {
    body["records"]
        .as_array()
        .ok_or_else(|| Error::upstream("airtable", "Invalid response format: records is not an array"))?
        .iter()
        .map(|row| record_from_json(table, row))
        .collect()
}

/// `{Column}='value'` with the value escaped for a formula string literal
fn equals_formula(column: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("{{{}}}='{}'", column, escaped)
}

fn sort_params(table: Table, sort: &[Sort]) -> Vec<(String, String)> {
    sort.iter()
        .enumerate()
        .flat_map(|(i, key)| {
            let direction = match key.direction {
                SortDirection::Asc => "asc",
                SortDirection::Desc => "desc",
            };
            [
                (format!("sort[{i}][field]"), column_name(table, &key.field).to_string()),
                (format!("sort[{i}][direction]"), direction.to_string()),
            ]
        })
        .collect()
}

/// Factory for creating Airtable stores
pub struct AirtableStoreFactory;

#[async_trait]
impl RecordStoreFactory for AirtableStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Box<dyn RecordStore>> {
        match config {
            StoreConfig::Airtable {
                api_key,
                base_id,
                api_url,
            } => {
                let dry_run = std::env::var("TUNESYNC_MODE")
                    .unwrap_or_default()
                    .to_lowercase()
                    == "dry-run";

                if dry_run {
                    tracing::warn!("Airtable store running in DRY-RUN mode - no changes will be made");
                }

                Ok(Box::new(AirtableStore::new(
                    api_key.clone(),
                    base_id.clone(),
                    api_url.clone(),
                    dry_run,
                )?))
            }
            _ => Err(Error::config("Invalid config for Airtable store")),
        }
    }
}

/// Register the Airtable store with a registry
///
/// # Example
///
/// ```rust
/// use tunesync_core::ClientRegistry;
///
/// let registry = ClientRegistry::with_builtin_stores();
/// tunesync_store_airtable::register(&registry);
/// assert!(registry.has_store("airtable"));
/// ```
pub fn register(registry: &tunesync_core::ClientRegistry) {
    registry.register_store("airtable", Box::new(AirtableStoreFactory));
}
