//! TOML settings file for the exporter.

use serde_derive::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ellie::EllieSettings;
use crate::error::ConfigError;
use crate::row_source::snowflake::SnowflakeSettings;
use crate::row_source::sqlite::SQLITE_SCHEMA;
use crate::row_source::SchemaSet;
use crate::types::CardinalityConvention;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Postgres,
    Snowflake,
    Sqlite,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresSettings {
    pub user: String,
    pub password: String,
    pub host: String,
    #[serde(default = "default_postgres_port")]
    pub port: u16,
    pub database: String,
    #[serde(default = "default_postgres_schemas")]
    pub schemas: Vec<String>,
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_schemas() -> Vec<String> {
    vec!["public".into()]
}

impl PostgresSettings {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnowflakeSource {
    #[serde(flatten)]
    pub session: SnowflakeSettings,
    #[serde(default = "default_snowflake_schemas")]
    pub schemas: Vec<String>,
}

fn default_snowflake_schemas() -> Vec<String> {
    vec!["PUBLIC".into()]
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteSettings {
    pub path: PathBuf,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSettings {
    #[serde(default)]
    pub cardinality: CardinalityConvention,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ellie: Option<EllieSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snowflake: Option<SnowflakeSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqlite: Option<SqliteSettings>,
    #[serde(default)]
    pub export: ExportSettings,
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn ellie(&self) -> Result<&EllieSettings, ConfigError> {
        self.ellie.as_ref().ok_or(ConfigError::MissingSection("ellie"))
    }

    pub fn postgres(&self) -> Result<&PostgresSettings, ConfigError> {
        self.postgres
            .as_ref()
            .ok_or(ConfigError::MissingSection("postgres"))
    }

    pub fn snowflake(&self) -> Result<&SnowflakeSource, ConfigError> {
        self.snowflake
            .as_ref()
            .ok_or(ConfigError::MissingSection("snowflake"))
    }

    pub fn sqlite(&self) -> Result<&SqliteSettings, ConfigError> {
        self.sqlite.as_ref().ok_or(ConfigError::MissingSection("sqlite"))
    }

    /// Schemas to export: `overrides` when given, otherwise the backend's
    /// configured or conventional default.
    pub fn schemas(&self, backend: Backend, overrides: &[String]) -> SchemaSet {
        if !overrides.is_empty() {
            return overrides.iter().cloned().collect();
        }

        let configured = match backend {
            Backend::Postgres => self
                .postgres
                .as_ref()
                .map(|postgres| postgres.schemas.clone())
                .unwrap_or_else(default_postgres_schemas),
            Backend::Snowflake => self
                .snowflake
                .as_ref()
                .map(|snowflake| snowflake.schemas.clone())
                .unwrap_or_else(default_snowflake_schemas),
            Backend::Sqlite => vec![SQLITE_SCHEMA.to_owned()],
        };

        configured.into_iter().collect()
    }

    /// A settings file with every section filled with placeholders.
    pub fn template() -> Self {
        Self {
            ellie: Some(EllieSettings::new("organization", "api-token")),
            postgres: Some(PostgresSettings {
                user: "postgres".into(),
                password: "".into(),
                host: "localhost".into(),
                port: default_postgres_port(),
                database: "postgres".into(),
                schemas: default_postgres_schemas(),
            }),
            snowflake: Some(SnowflakeSource {
                session: SnowflakeSettings {
                    account: "account-identifier".into(),
                    token: "oauth-token".into(),
                    token_type: "OAUTH".into(),
                    warehouse: Some("COMPUTE_WH".into()),
                    database: "DATABASE".into(),
                    role: None,
                    base_url: None,
                    statement_timeout_secs: 60,
                },
                schemas: default_snowflake_schemas(),
            }),
            sqlite: Some(SqliteSettings {
                path: PathBuf::from("database.sqlite"),
            }),
            export: ExportSettings::default(),
        }
    }
}

pub fn write_template(path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let content = toml::to_string_pretty(&Settings::template())?;

    fs::write(path, content).map_err(|source| ConfigError::Write {
        path: path.to_owned(),
        source,
    })
}
