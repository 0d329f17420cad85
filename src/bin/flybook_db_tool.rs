//! CLI for generating, installing and seeding the logbook database

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flybook_db::build::build_info;
use flybook_db::config::FlybookConfig;
use flybook_db::database::{create_database_connection, DatabaseConnection};
use flybook_db::schema::{flybook_schema_with, NamingConfig, Schema, SchemaGenerator, SchemaManager};
use flybook_db::seed::{populate, SampleDataGenerator};

/// Entry point for the flybook-db CLI
#[derive(Parser)]
#[command(name = "flybook-db")]
#[command(about = "Generate, install and seed the Flybook logbook database", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Schema-related commands
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
    /// Write the table and column name constants as a Rust module
    Constants {
        /// Schema description file (YAML or JSON); the logbook schema if omitted
        #[arg(short, long, value_name = "FILE")]
        schema: Option<PathBuf>,
        /// Output file ('-' for stdout)
        #[arg(short, long, value_name = "OUTPUT", default_value = "-")]
        output: PathBuf,
    },
    /// Install the logbook schema and fill it with sample data
    Seed {
        /// Path to the configuration file (TOML)
        #[arg(short, long, value_name = "CONFIG")]
        config: PathBuf,
        /// Seed for the sample data generator
        #[arg(long, value_name = "N", default_value_t = 1)]
        seed: u64,
    },
}

#[derive(Subcommand)]
enum SchemaAction {
    /// Print the DDL script: drops, creates and version triggers
    Generate {
        /// Schema description file (YAML or JSON); the logbook schema if omitted
        #[arg(short, long, value_name = "FILE")]
        schema: Option<PathBuf>,
        /// Output file for the generated SQL script ('-' for stdout)
        #[arg(short, long, value_name = "OUTPUT", default_value = "-")]
        output: PathBuf,
    },
    /// Drop and recreate every table in one transaction
    Apply {
        /// Schema description file (YAML or JSON); the logbook schema if omitted
        #[arg(short, long, value_name = "FILE")]
        schema: Option<PathBuf>,
        /// Path to the configuration file (TOML)
        #[arg(short, long, value_name = "CONFIG")]
        config: PathBuf,
        /// Skip the version triggers; requires `container.strategy = "explicit"`
        #[arg(long)]
        no_triggers: bool,
    },
}

#[tokio::main]
async fn main() {
    flybook_db::init_logging();
    let info = build_info();
    tracing::debug!(
        version = info.version,
        git_hash = info.git_hash,
        built = info.build_time_utc,
        rustc = info.rustc_version,
        "flybook-db starting"
    );

    if let Err(e) = run(Cli::parse()).await {
        tracing::error!(error = %format!("{:#}", e), "command failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Schema { action } => match action {
            SchemaAction::Generate { schema, output } => {
                let schema = load_schema(schema.as_deref(), NamingConfig::default())?;
                let script = SchemaGenerator::for_schema(&schema).generate_schema_script(&schema)?;
                write_output(&output, &script)?;
            }
            SchemaAction::Apply {
                schema,
                config,
                no_triggers,
            } => {
                let config = FlybookConfig::load(&config)?;
                let with_triggers = config.container.strategy.installs_triggers();
                if no_triggers && with_triggers {
                    anyhow::bail!(
                        "--no-triggers conflicts with container.strategy = \"trigger\"; \
                         set it to \"explicit\" to run without version triggers"
                    );
                }
                let schema = load_schema(schema.as_deref(), config.naming.clone())?;
                let connection = create_database_connection(&config.database).await?;
                connection
                    .install_schema(&schema, with_triggers)
                    .await
                    .context("schema installation failed")?;
                println!(
                    "Installed {} tables into '{}'.",
                    schema.tables().len(),
                    config.database.database
                );
            }
        },
        Commands::Constants { schema, output } => {
            let schema = load_schema(schema.as_deref(), NamingConfig::default())?;
            let module = SchemaGenerator::for_schema(&schema).render_constants_module(&schema)?;
            write_output(&output, &module)?;
        }
        Commands::Seed { config, seed } => {
            let config = FlybookConfig::load(&config)?;
            let schema = flybook_schema_with(config.naming.clone())?;
            let strategy = config.container.strategy;

            let connection: Arc<dyn DatabaseConnection> =
                Arc::from(create_database_connection(&config.database).await?);
            connection
                .install_schema(&schema, strategy.installs_triggers())
                .await
                .context("schema installation failed")?;

            let data = SampleDataGenerator::from_seed(seed, config.seed.clone()).generate();
            let summary = populate(connection.clone(), &schema, &data, strategy).await?;
            connection.close().await?;
            println!(
                "Seeded {} users, {} airports, {} aircraft and {} flights.",
                summary.users, summary.airports, summary.aircraft, summary.flights
            );
        }
    }
    Ok(())
}

fn load_schema(path: Option<&Path>, naming: NamingConfig) -> anyhow::Result<Schema> {
    match path {
        Some(path) => Schema::load(path)
            .with_context(|| format!("failed to load schema from '{}'", path.display())),
        None => Ok(flybook_schema_with(naming)?),
    }
}

fn write_output(output: &Path, content: &str) -> anyhow::Result<()> {
    if output.to_string_lossy() == "-" {
        io::stdout().write_all(content.as_bytes())?;
    } else {
        let mut out_file = File::create(output)
            .with_context(|| format!("failed to create '{}'", output.display()))?;
        out_file.write_all(content.as_bytes())?;
    }
    Ok(())
}
