//! migragen command line.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;

use migragen::diff::DiffKind;
use migragen::{Config, Connection, GenerateOptions, Generator, Plan, SchemaDiff, SchemaSnapshot};

#[derive(Parser)]
#[command(name = "migragen")]
#[command(
    about = "Generate knex migrations from the difference between a database and a declared schema"
)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./migragen.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database connection URL
    #[arg(long, env = "DATABASE_URL", global = true)]
    url: Option<String>,

    /// Migrations directory path
    #[arg(long, global = true)]
    migrations_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect, diff and write migration files
    Generate {
        /// Declared schema snapshot (JSON)
        #[arg(long)]
        target: PathBuf,

        /// Only generate for this table
        #[arg(short, long)]
        table: Option<String>,

        /// Drop tables without asking
        #[arg(long)]
        authorize_deletion: bool,
    },

    /// Print the difference between the database and the declared schema
    Diff {
        /// Declared schema snapshot (JSON)
        #[arg(long)]
        target: PathBuf,

        #[arg(short, long)]
        table: Option<String>,

        /// Print the diff as JSON
        #[arg(long)]
        json: bool,
    },

    /// Dump the live database structure as a JSON snapshot
    Inspect {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete migration files that were never applied
    Clean {
        #[arg(short, long)]
        table: Option<String>,
    },
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::discover()?,
    };
    if let Some(url) = &cli.url {
        config.database.url = Some(url.clone());
    }
    if let Some(dir) = &cli.migrations_dir {
        config.migrations.directory = dir.clone();
    }
    Ok(config)
}

async fn connect(config: &Config) -> Result<Connection> {
    let url = config
        .database
        .url
        .as_deref()
        .ok_or(migragen::Error::MissingUrl)?;
    let connection = Connection::connect(url, config.schema_name()).await?;
    let dialect = connection.dialect().to_string();
    eprintln!("{} {} database", "→ Connected to".dimmed(), dialect.yellow());
    Ok(connection)
}

fn load_target(path: &Path) -> Result<SchemaSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read target schema {}", path.display()))?;
    SchemaSnapshot::from_json(&content)
        .with_context(|| format!("failed to parse target schema {}", path.display()))
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn print_diff(diff: &SchemaDiff) {
    for table in diff {
        let marker = match table.kind {
            DiffKind::Added => "+".green(),
            DiffKind::Modified => "~".yellow(),
            DiffKind::Deleted => "-".red(),
        };
        println!("{} {}", marker, table.name.bold());

        if table.kind != DiffKind::Modified {
            continue;
        }
        for (column, fields) in &table.columns {
            println!("    {} {}", "~".yellow(), column);
            for field in fields {
                println!(
                    "        {} {} {}",
                    format!("{:?}", field.kind).to_lowercase().dimmed(),
                    field.attribute,
                    serde_json::to_string(&field.new_value).unwrap_or_default().cyan()
                );
            }
        }
        for column in &table.deleted_columns {
            println!("    {} {}", "-".red(), column);
        }
        if table.unique_updated {
            println!("    {}", "unique columns changed".dimmed());
        }
    }
}

async fn generate(
    config: &Config,
    target: &Path,
    table: Option<String>,
    authorize_deletion: bool,
) -> Result<()> {
    let target = load_target(target)?;
    let connection = connect(config).await?;
    let options = GenerateOptions::from_config(config).with_table(table);
    let generator = Generator::new(&connection, options);

    let plan: Plan = generator.plan(target).await?;

    let deleted = plan.deleted_tables();
    if !deleted.is_empty() && !authorize_deletion {
        println!("{}", "The following tables will be deleted:".red().bold());
        for name in &deleted {
            println!("  {} {}", "•".red(), name.yellow());
        }
        if !confirm("Do you want to continue?")? {
            println!("{}", "Generation cancelled.".yellow());
            return Ok(());
        }
    }

    let outcome = generator.write(&plan).await?;
    connection.close().await;
    for name in &outcome.removed {
        println!("{} {}", "✗ Removed unapplied".yellow(), name);
    }

    if plan.is_empty() {
        println!("{}", "No changes detected".green());
        return Ok(());
    }

    for path in &outcome.written {
        println!("{} {}", "✓".green(), path.display());
    }
    println!(
        "{} Created {} migration file(s)",
        "Done!".green().bold(),
        outcome.written.len().to_string().blue()
    );
    println!("{}", "Don't forget to run \"knex migrate:latest\"".yellow());
    Ok(())
}

async fn diff(config: &Config, target: &Path, table: Option<String>, json: bool) -> Result<()> {
    let target = load_target(target)?;
    let connection = connect(config).await?;
    let options = GenerateOptions::from_config(config).with_table(table);
    let plan = Generator::new(&connection, options).plan(target).await?;
    connection.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan.diff)?);
    } else if plan.is_empty() {
        println!("{}", "No changes detected".green());
    } else {
        print_diff(&plan.diff);
    }
    Ok(())
}

async fn inspect(config: &Config, output: Option<&Path>) -> Result<()> {
    let connection = connect(config).await?;
    let snapshot = Generator::new(&connection, GenerateOptions::from_config(config))
        .inspect()
        .await?;
    connection.close().await;

    let json = snapshot.to_json_pretty()?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("{} {}", "✓ Schema written to".green().bold(), path.display());
            println!("  Tables: {}", snapshot.tables.len());
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn clean(config: &Config, table: Option<String>) -> Result<()> {
    let connection = connect(config).await?;
    let options = GenerateOptions::from_config(config).with_table(table);
    let removed = Generator::new(&connection, options).reconcile().await?;
    connection.close().await;

    if removed.is_empty() {
        println!("{}", "Migration directory is in sync with the ledger.".green());
    }
    for name in &removed {
        println!("{} {}", "✗ Removed unapplied".yellow(), name);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Generate {
            target,
            table,
            authorize_deletion,
        } => generate(&config, &target, table, authorize_deletion).await,
        Commands::Diff {
            target,
            table,
            json,
        } => diff(&config, &target, table, json).await,
        Commands::Inspect { output } => inspect(&config, output.as_deref()).await,
        Commands::Clean { table } => clean(&config, table).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}
