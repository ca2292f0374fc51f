use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ellie_schema_export::{
    config::{write_template, Backend, Settings},
    export_model,
    row_source::{
        PostgresRowSource, RowSource, SnowflakeCatalog, SnowflakeSession, SqliteCatalog,
        StagedRowSource,
    },
    EllieClient, ModelDocument,
};
use std::{fs, path::PathBuf};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ellie-export", about = "Export database schemas as Ellie models")]
struct Cli {
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read a database catalog and build a model document.
    Export {
        #[arg(short, long, default_value = "ellie.toml")]
        config: PathBuf,
        #[arg(short, long, value_enum)]
        backend: BackendArg,
        /// Schema to export; repeatable. Defaults to the configured schemas.
        #[arg(short, long = "schema")]
        schemas: Vec<String>,
        /// Write the document here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Import the document into Ellie under this model name.
        #[arg(long)]
        import: Option<String>,
    },
    /// Download a stored model from Ellie.
    Fetch {
        #[arg(short, long, default_value = "ellie.toml")]
        config: PathBuf,
        model_id: u64,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write a settings template.
    Init {
        #[arg(default_value = "ellie.toml")]
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Postgres,
    Snowflake,
    Sqlite,
}

impl From<BackendArg> for Backend {
    fn from(backend: BackendArg) -> Self {
        match backend {
            BackendArg::Postgres => Backend::Postgres,
            BackendArg::Snowflake => Backend::Snowflake,
            BackendArg::Sqlite => Backend::Sqlite,
        }
    }
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn open_source(settings: &Settings, backend: Backend) -> Result<Box<dyn RowSource>> {
    let source: Box<dyn RowSource> = match backend {
        Backend::Postgres => {
            let postgres = settings.postgres()?;
            Box::new(PostgresRowSource::connect(postgres.connect_options()).await?)
        }
        Backend::Snowflake => {
            let snowflake = settings.snowflake()?;
            let session = SnowflakeSession::new(snowflake.session.clone());
            Box::new(StagedRowSource::new(SnowflakeCatalog::new(session)))
        }
        Backend::Sqlite => {
            let sqlite = settings.sqlite()?;
            Box::new(StagedRowSource::new(SqliteCatalog::open(&sqlite.path).await?))
        }
    };

    Ok(source)
}

fn write_json(value: &impl serde::Serialize, output: Option<PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;

    match output {
        Some(path) => {
            fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "document written");
        }
        None => println!("{}", json),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    match cli.command {
        Command::Export {
            config,
            backend,
            schemas,
            output,
            import,
        } => {
            let settings = Settings::load(&config)?;
            let backend = Backend::from(backend);
            let schemas = settings.schemas(backend, &schemas);

            let source = open_source(&settings, backend).await?;
            let document: ModelDocument =
                export_model(source.as_ref(), &schemas, settings.export.cardinality).await?;

            match import {
                Some(name) => {
                    let client = EllieClient::new(settings.ellie()?.clone());
                    let response = client.import_model(&name, document).await?;
                    println!("{}", response);
                }
                None => write_json(&document, output)?,
            }
        }
        Command::Fetch {
            config,
            model_id,
            output,
        } => {
            let settings = Settings::load(&config)?;
            let client = EllieClient::new(settings.ellie()?.clone());
            let document = client.export_model(model_id).await?;
            write_json(&document, output)?;
        }
        Command::Init { path } => {
            write_template(&path)?;
            info!(path = %path.display(), "settings template written");
        }
    }

    Ok(())
}
