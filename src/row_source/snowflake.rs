//! Staged catalog backed by the Snowflake SQL API (`/api/v2/statements`).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_derive::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

use super::staged::{ImportedKey, StagedCatalog};
use super::SchemaSet;
use crate::error::BackendError;
use crate::types::TableRef;

const STATEMENTS_PATH: &str = "/api/v2/statements";
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Connection details for the SQL API. The token is sent as a bearer token;
/// `token_type` is passed through as `X-Snowflake-Authorization-Token-Type`
/// (e.g. `OAUTH`, `KEYPAIR_JWT`, `PROGRAMMATIC_ACCESS_TOKEN`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnowflakeSettings {
    pub account: String,
    pub token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
    pub database: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Overrides `https://<account>.snowflakecomputing.com`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_secs: u64,
}

fn default_token_type() -> String {
    "OAUTH".into()
}

fn default_statement_timeout() -> u64 {
    60
}

/// A materialized result set. Values arrive as strings or nulls.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    /// Case-insensitive column lookup; `SHOW` output is lower case while
    /// `INFORMATION_SCHEMA` is upper case.
    pub fn column_index(&self, name: &str) -> Result<usize, BackendError> {
        self.columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
            .ok_or_else(|| BackendError::ResultShape(format!("missing column {name:?}")))
    }

    /// Non-null values of `name` per row, in row order.
    pub fn strings(&self, name: &str) -> Result<Vec<String>, BackendError> {
        let index = self.column_index(name)?;
        Ok(self
            .rows
            .iter()
            .filter_map(|row| row.get(index).cloned().flatten())
            .collect())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    statement_handle: Option<String>,
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    row_type: Vec<RowType>,
    #[serde(default)]
    partition_info: Vec<Value>,
}

#[derive(Deserialize)]
struct RowType {
    name: String,
}

/// An authenticated handle on the SQL API, passed explicitly to the catalog.
pub struct SnowflakeSession {
    http: Client,
    settings: SnowflakeSettings,
}

impl SnowflakeSession {
    pub fn new(settings: SnowflakeSettings) -> Self {
        Self::with_client(Client::new(), settings)
    }

    pub fn with_client(http: Client, settings: SnowflakeSettings) -> Self {
        Self { http, settings }
    }

    pub fn base_url(&self) -> String {
        match &self.settings.base_url {
            Some(url) => url.trim_end_matches('/').to_owned(),
            None => format!("https://{}.snowflakecomputing.com", self.settings.account),
        }
    }

    fn request_body(&self, statement: &str, bindings: &[&str]) -> Value {
        let mut body = Map::new();
        body.insert("statement".into(), json!(statement));
        body.insert("timeout".into(), json!(self.settings.statement_timeout_secs));
        body.insert("database".into(), json!(self.settings.database));
        body.insert("schema".into(), json!("INFORMATION_SCHEMA"));
        if let Some(warehouse) = &self.settings.warehouse {
            body.insert("warehouse".into(), json!(warehouse));
        }
        if let Some(role) = &self.settings.role {
            body.insert("role".into(), json!(role));
        }
        if !bindings.is_empty() {
            let bindings: Map<String, Value> = bindings
                .iter()
                .enumerate()
                .map(|(index, value)| {
                    ((index + 1).to_string(), json!({"type": "TEXT", "value": value}))
                })
                .collect();
            body.insert("bindings".into(), Value::Object(bindings));
        }
        Value::Object(body)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.settings.token)
            .header("X-Snowflake-Authorization-Token-Type", &self.settings.token_type)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Run one statement and collect every result partition. `?` placeholders
    /// are bound positionally as text.
    pub async fn execute(&self, statement: &str, bindings: &[&str]) -> Result<ResultSet, BackendError> {
        debug!(statement, "executing snowflake statement");

        let url = format!("{}{}", self.base_url(), STATEMENTS_PATH);
        let response = self
            .authorized(self.http.post(&url))
            .json(&self.request_body(statement, bindings))
            .send()
            .await?;

        let mut status = response.status();
        let mut body: StatementResponse = read_statement(response).await?;

        while status == StatusCode::ACCEPTED {
            let handle = body.statement_handle.clone().ok_or_else(|| {
                BackendError::ResultShape("asynchronous response without statement handle".into())
            })?;
            tokio::time::sleep(POLL_INTERVAL).await;

            let response = self
                .authorized(self.http.get(format!("{url}/{handle}")))
                .send()
                .await?;
            status = response.status();
            body = read_statement(response).await?;
        }

        if !status.is_success() {
            return Err(statement_error(status, &body));
        }

        let meta = body.result_set_meta_data.ok_or_else(|| {
            BackendError::ResultShape("statement response without result set metadata".into())
        })?;
        let mut result = ResultSet {
            columns: meta.row_type.into_iter().map(|row_type| row_type.name).collect(),
            rows: body.data,
        };

        if let Some(handle) = &body.statement_handle {
            for partition in 1..meta.partition_info.len() {
                let response = self
                    .authorized(self.http.get(format!("{url}/{handle}")))
                    .query(&[("partition", partition)])
                    .send()
                    .await?;
                let status = response.status();
                let page = read_statement(response).await?;
                if !status.is_success() {
                    return Err(statement_error(status, &page));
                }
                result.rows.extend(page.data);
            }
        }

        Ok(result)
    }
}

async fn read_statement(response: reqwest::Response) -> Result<StatementResponse, BackendError> {
    let status = response.status();
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|_| BackendError::Statement {
        code: status.as_u16().to_string(),
        message: text,
    })
}

fn statement_error(status: StatusCode, body: &StatementResponse) -> BackendError {
    BackendError::Statement {
        code: body
            .code
            .clone()
            .unwrap_or_else(|| status.as_u16().to_string()),
        message: body.message.clone().unwrap_or_default(),
    }
}

/// `"schema"."table"` with embedded quotes doubled.
pub fn quote_table(table: &TableRef) -> String {
    format!("{}.{}", quote_identifier(&table.schema), quote_identifier(&table.table))
}

fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn tables_statement(schema_count: usize) -> String {
    let placeholders = vec!["?"; schema_count].join(", ");
    format!(
        "SELECT TABLE_SCHEMA, TABLE_NAME FROM TABLES \
         WHERE TABLE_SCHEMA IN ({placeholders}) AND TABLE_TYPE = 'BASE TABLE' \
         ORDER BY TABLE_SCHEMA, TABLE_NAME"
    )
}

const COLUMNS_STATEMENT: &str = "SELECT COLUMN_NAME FROM COLUMNS \
    WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION";

fn parse_tables(result: &ResultSet) -> Result<Vec<TableRef>, BackendError> {
    let schema = result.column_index("TABLE_SCHEMA")?;
    let name = result.column_index("TABLE_NAME")?;

    result
        .rows
        .iter()
        .map(|row| match (cell(row, schema), cell(row, name)) {
            (Some(schema), Some(name)) => Ok(TableRef::new(schema, name)),
            _ => Err(BackendError::ResultShape("table row with null name".into())),
        })
        .collect()
}

fn parse_primary_keys(result: &ResultSet) -> Result<HashSet<String>, BackendError> {
    Ok(result.strings("column_name")?.into_iter().collect())
}

fn parse_imported_keys(result: &ResultSet) -> Result<Vec<ImportedKey>, BackendError> {
    let column = result.column_index("fk_column_name")?;
    let schema = result.column_index("pk_schema_name")?;
    let table = result.column_index("pk_table_name")?;

    result
        .rows
        .iter()
        .map(|row| match (cell(row, column), cell(row, schema), cell(row, table)) {
            (Some(column), Some(schema), Some(table)) => Ok(ImportedKey {
                column: column.to_owned(),
                referenced: TableRef::new(schema, table),
            }),
            _ => Err(BackendError::ResultShape("imported key row with null field".into())),
        })
        .collect()
}

fn cell(row: &[Option<String>], index: usize) -> Option<&str> {
    row.get(index).and_then(|value| value.as_deref())
}

pub struct SnowflakeCatalog {
    session: SnowflakeSession,
}

impl SnowflakeCatalog {
    pub fn new(session: SnowflakeSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl StagedCatalog for SnowflakeCatalog {
    async fn list_tables(&self, schemas: &SchemaSet) -> Result<Vec<TableRef>, BackendError> {
        if schemas.is_empty() {
            return Ok(Vec::new());
        }
        let bindings: Vec<&str> = schemas.iter().map(String::as_str).collect();
        let result = self
            .session
            .execute(&tables_statement(bindings.len()), &bindings)
            .await?;
        parse_tables(&result)
    }

    async fn primary_keys(&self, table: &TableRef) -> Result<HashSet<String>, BackendError> {
        let statement = format!("SHOW PRIMARY KEYS IN TABLE {}", quote_table(table));
        let result = self.session.execute(&statement, &[]).await?;
        parse_primary_keys(&result)
    }

    async fn imported_keys(&self, table: &TableRef) -> Result<Vec<ImportedKey>, BackendError> {
        let statement = format!("SHOW IMPORTED KEYS IN TABLE {}", quote_table(table));
        let result = self.session.execute(&statement, &[]).await?;
        parse_imported_keys(&result)
    }

    async fn columns(&self, table: &TableRef) -> Result<Vec<String>, BackendError> {
        let result = self
            .session
            .execute(COLUMNS_STATEMENT, &[table.schema.as_str(), table.table.as_str()])
            .await?;
        result.strings("COLUMN_NAME")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SnowflakeSettings {
        SnowflakeSettings {
            account: "acme-eu".into(),
            token: "secret".into(),
            token_type: default_token_type(),
            warehouse: Some("COMPUTE_WH".into()),
            database: "SALES".into(),
            role: None,
            base_url: None,
            statement_timeout_secs: 60,
        }
    }

    fn result(columns: &[&str], rows: Vec<Vec<Option<&str>>>) -> ResultSet {
        ResultSet {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(|v| v.map(str::to_owned)).collect())
                .collect(),
        }
    }

    #[test]
    fn base_url_defaults_to_account_host() {
        let session = SnowflakeSession::new(settings());
        assert_eq!(session.base_url(), "https://acme-eu.snowflakecomputing.com");

        let session = SnowflakeSession::new(SnowflakeSettings {
            base_url: Some("http://localhost:8080/".into()),
            ..settings()
        });
        assert_eq!(session.base_url(), "http://localhost:8080");
    }

    #[test]
    fn request_body_binds_text_parameters() {
        let session = SnowflakeSession::new(settings());
        let body = session.request_body(COLUMNS_STATEMENT, &["PUBLIC", "ORDERS"]);

        assert_eq!(body["database"], "SALES");
        assert_eq!(body["warehouse"], "COMPUTE_WH");
        assert!(body.get("role").is_none());
        assert_eq!(body["bindings"]["1"], json!({"type": "TEXT", "value": "PUBLIC"}));
        assert_eq!(body["bindings"]["2"], json!({"type": "TEXT", "value": "ORDERS"}));
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(
            quote_table(&TableRef::new("PUBLIC", "odd\"name")),
            "\"PUBLIC\".\"odd\"\"name\""
        );
    }

    #[test]
    fn tables_statement_has_one_placeholder_per_schema() {
        assert!(tables_statement(2).contains("IN (?, ?)"));
    }

    #[test]
    fn tables_statement_skips_views() {
        assert!(tables_statement(1).contains("TABLE_TYPE = 'BASE TABLE'"));
    }

    #[test]
    fn show_output_is_matched_case_insensitively() {
        let keys = result(
            &["created_on", "schema_name", "table_name", "column_name"],
            vec![vec![None, Some("PUBLIC"), Some("ORDERS"), Some("ID")]],
        );

        assert_eq!(parse_primary_keys(&keys).unwrap(), HashSet::from(["ID".to_owned()]));
    }

    #[test]
    fn imported_keys_point_at_primary_key_table() {
        let keys = result(
            &["pk_schema_name", "pk_table_name", "fk_column_name"],
            vec![vec![Some("PUBLIC"), Some("CUSTOMERS"), Some("CUSTOMER_ID")]],
        );

        assert_eq!(
            parse_imported_keys(&keys).unwrap(),
            vec![ImportedKey {
                column: "CUSTOMER_ID".into(),
                referenced: TableRef::new("PUBLIC", "CUSTOMERS"),
            }]
        );
    }

    #[test]
    fn missing_column_is_a_shape_error() {
        let tables = result(&["TABLE_NAME"], vec![]);

        assert!(matches!(parse_tables(&tables), Err(BackendError::ResultShape(_))));
    }

    #[test]
    fn statement_response_parses_metadata_and_data() {
        let body: StatementResponse = serde_json::from_value(json!({
            "code": "090001",
            "statementHandle": "01b2",
            "resultSetMetaData": {
                "numRows": 1,
                "partitionInfo": [{"rowCount": 1}],
                "rowType": [{"name": "TABLE_SCHEMA"}, {"name": "TABLE_NAME"}]
            },
            "data": [["PUBLIC", null]]
        }))
        .unwrap();

        let meta = body.result_set_meta_data.unwrap();
        assert_eq!(meta.row_type.len(), 2);
        assert_eq!(meta.partition_info.len(), 1);
        assert_eq!(body.data, vec![vec![Some("PUBLIC".to_owned()), None]]);
    }
}
