//! Command line commands.
//!
//! Every command produces a JSON value that `main` prints. Commands that talk
//! to the database open one connection, run, and disconnect again.

use crate::config::Config;
use crate::db::{ConnectionManager, SchemaIntrospector};
use crate::error::{OraError, OraResult};
use crate::models::Params;
use crate::offload::AsyncConnectionManager;
use crate::retry::RetryPolicy;
use crate::singer::map_singer_schema;
use crate::sql::create_table_ddl;
use clap::Subcommand;
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Connect, run the liveness probe and print the connection details
    Ping,

    /// Run one SQL statement and print its rows or affected row count
    Query {
        /// SQL text with named binds (:name)
        sql: String,

        /// Bind values as a JSON object, e.g. '{"id": 7}'
        #[arg(short, long, value_name = "JSON")]
        params: Option<String>,
    },

    /// List schemas that own tables
    Schemas,

    /// List the tables of a schema
    Tables {
        /// Schema (defaults to the current schema)
        #[arg(short, long)]
        schema: Option<String>,
    },

    /// Describe a table: columns, keys, constraints, indexes and statistics
    Describe {
        table: String,

        /// Schema (defaults to the current schema)
        #[arg(short, long)]
        schema: Option<String>,
    },

    /// Map a Singer JSON schema (or SCHEMA message) to Oracle columns
    MapSchema {
        /// File holding the schema
        file: PathBuf,

        /// Also render CREATE TABLE for this table name
        #[arg(short, long)]
        table: Option<String>,

        /// Primary key column(s) for the rendered DDL
        #[arg(long = "primary-key", value_name = "COLUMN")]
        primary_keys: Vec<String>,
    },
}

impl Command {
    /// Run the command. `db` must be connected except for `Ping`.
    ///
    /// `MapSchema` never touches `db`; [`run`] dispatches it without connecting.
    pub async fn execute(&self, db: &AsyncConnectionManager) -> OraResult<JsonValue> {
        match self {
            Self::Ping => {
                let info = db.connect().await?;
                to_json(&info)
            }
            Self::Query { sql, params } => {
                let params = parse_params(params.as_deref())?;
                let result = db.execute(sql.as_str(), params).await?;
                to_json(&result)
            }
            Self::Schemas => {
                let schemas = db
                    .run("get_schemas", |m| SchemaIntrospector::new(m).get_schemas())
                    .await?;
                Ok(json!({ "schemas": schemas }))
            }
            Self::Tables { schema } => {
                let schema = schema.clone();
                let tables = db
                    .run("get_table_names", move |m| {
                        SchemaIntrospector::new(m).get_table_names(schema.as_deref())
                    })
                    .await?;
                Ok(json!({ "tables": tables }))
            }
            Self::Describe { table, schema } => {
                let metadata = db.get_table_metadata(table.as_str(), schema.clone()).await?;
                to_json(&metadata)
            }
            Self::MapSchema {
                file,
                table,
                primary_keys,
            } => map_schema_file(file, table.as_deref(), primary_keys),
        }
    }
}

/// Run the configured command end to end.
pub async fn run(config: &Config) -> OraResult<JsonValue> {
    let command = &config.command;
    if let Command::MapSchema {
        file,
        table,
        primary_keys,
    } = command
    {
        return map_schema_file(file, table.as_deref(), primary_keys);
    }

    let connection = config.connection_config()?;
    let policy = if config.retry {
        RetryPolicy::from_config(&connection)
    } else {
        RetryPolicy::none()
    };
    let db = AsyncConnectionManager::new(Arc::new(ConnectionManager::new(connection)));

    let info = db
        .run("connect", move |m| policy.run("connect", || m.connect()))
        .await?;
    info!(url = %info.url, "Connected");

    let result = command.execute(&db).await;
    if let Err(e) = db.disconnect().await {
        warn!(error = %e, "Disconnect failed");
    }
    result
}

fn parse_params(raw: Option<&str>) -> OraResult<Params> {
    let Some(raw) = raw else {
        return Ok(Params::new());
    };
    let value: JsonValue = serde_json::from_str(raw)
        .map_err(|e| OraError::validation(format!("Invalid --params JSON: {e}")))?;
    value
        .as_object()
        .map(Params::from_json_map)
        .ok_or_else(|| OraError::validation("--params must be a JSON object"))
}

/// Map a Singer schema file. Accepts a bare JSON schema or a Singer `SCHEMA`
/// message, whose stream name becomes the default table name.
fn map_schema_file(
    path: &Path,
    table: Option<&str>,
    primary_keys: &[String],
) -> OraResult<JsonValue> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        OraError::validation(format!("Cannot read '{}': {e}", path.display()))
    })?;
    let document: JsonValue = serde_json::from_str(&text)
        .map_err(|e| OraError::validation(format!("Invalid JSON in '{}': {e}", path.display())))?;
    map_schema_document(&document, table, primary_keys)
}

fn map_schema_document(
    document: &JsonValue,
    table: Option<&str>,
    primary_keys: &[String],
) -> OraResult<JsonValue> {
    let is_message = document.get("type").and_then(JsonValue::as_str) == Some("SCHEMA");
    let (schema, stream) = match document.get("schema") {
        Some(schema) if is_message => (schema, document.get("stream").and_then(JsonValue::as_str)),
        _ => (document, None),
    };

    let mut primary_keys = primary_keys.to_vec();
    if primary_keys.is_empty() && is_message {
        primary_keys = document
            .get("key_properties")
            .and_then(JsonValue::as_array)
            .map(|keys| {
                keys.iter()
                    .filter_map(JsonValue::as_str)
                    .map(str::to_ascii_uppercase)
                    .collect()
            })
            .unwrap_or_default();
    }

    let columns = map_singer_schema(schema);
    let ddl = match table.or(stream) {
        Some(table) => Some(create_table_ddl(table, &columns, &primary_keys)?),
        None => None,
    };
    Ok(json!({ "columns": columns, "ddl": ddl }))
}

fn to_json<T: Serialize>(value: &T) -> OraResult<JsonValue> {
    serde_json::to_value(value)
        .map_err(|e| OraError::validation(format!("Cannot serialize result: {e}")))
}
