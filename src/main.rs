use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use schema_agent::logging::{init_logging, LogFormat};
use schema_agent::schema::render_schema;
use schema_agent::{Config, SchemaAgent, SchemaSnapshot};

#[derive(Debug, Parser)]
#[command(name = "schema-agent", version, about = "Database schema extraction for LLM prompts")]
struct Cli {
    /// Configuration file (defaults to ~/.config/schema-agent/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the full schema text
    Schema {
        #[arg(long)]
        refresh: bool,
    },
    /// List tables relevant to a question
    Tables { query: String },
    /// Print the schema text for selected tables
    Partial {
        tables: Vec<String>,
        /// Select tables by matching this question instead
        #[arg(long, conflicts_with = "tables")]
        query: Option<String>,
    },
    /// Write the schema snapshot as JSON
    Save {
        #[arg(default_value = "schema_cache.json")]
        path: PathBuf,
    },
    /// Render a previously saved snapshot
    Show { path: PathBuf },
    /// Print sample rows from a table
    Sample {
        table: String,
        #[arg(long)]
        limit: Option<i64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load().context("failed to load config")?,
    };
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(cli.command, &config))
}

async fn run(command: Commands, config: &Config) -> Result<()> {
    // Connections are opened per extraction, not here
    let mut agent = SchemaAgent::from_config(config);

    match command {
        Commands::Schema { refresh } => {
            println!("{}", agent.get_schema_for_llm(refresh).await?);
        }
        Commands::Tables { query } => {
            for table in agent.get_relevant_tables(&query).await? {
                println!("{}", table);
            }
        }
        Commands::Partial { tables, query } => {
            let text = match query {
                Some(query) => agent.get_relevant_schema(&query).await?,
                None => agent.get_partial_schema(tables.as_slice()).await?,
            };
            println!("{}", text);
        }
        Commands::Save { path } => {
            agent.save_schema_to_file(&path).await?;
            println!("Schema saved to {}", path.display());
        }
        Commands::Sample { table, limit } => {
            let limit = limit.unwrap_or(config.sample_limit);
            let sample = agent.get_table_sample_data(&table, limit).await?;
            println!("{}", sample.columns.join("\t"));
            for row in sample.rows {
                println!("{}", row.join("\t"));
            }
        }
        Commands::Show { path } => {
            let snapshot = SchemaSnapshot::load_from_file(&path)?;
            println!("{}", render_schema(&snapshot));
        }
    }

    Ok(())
}
