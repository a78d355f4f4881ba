mod config;
mod db;
mod error;
mod hh;
mod ingest;
mod menu;
mod models;
mod schema;

use anyhow::{anyhow, Result};
use clap::Parser;
use colored::Colorize;
use config::{Config, DbConfig};
use db::ReportingStore;
use hh::VacancyFetcher;
use ingest::IngestionLoader;
use menu::MenuController;
use schema::{DatabaseStatus, SchemaManager};
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

/// Employers ingested when none are given on the command line.
const DEFAULT_EMPLOYERS: [&str; 10] = [
    "3529", "78638", "80", "673", "8988088", "4181", "2748", "3776", "1740", "15478",
];

#[derive(Parser)]
#[command(name = "hhdb")]
#[command(about = "Load hh.ru vacancies for a set of employers into PostgreSQL and report on them")]
struct Cli {
    /// Database name (prompted for if omitted)
    #[arg(short, long)]
    dbname: Option<String>,

    /// Employer id to ingest (repeatable)
    #[arg(short, long = "employer")]
    employers: Vec<String>,

    /// Do not fetch and insert vacancies before opening the menu
    #[arg(long)]
    skip_ingest: bool,

    /// Do not create the database and tables
    #[arg(long)]
    no_create: bool,
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}

fn prompt_dbname<I: BufRead>(input: &mut I) -> Result<String> {
    print!("Database name: ");
    io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    let name = line.trim().to_string();
    if name.is_empty() {
        return Err(anyhow!("Database name must not be empty"));
    }
    Ok(name)
}

/// Open the reporting connection, printing the outcome. A failure ends the
/// session without an error exit.
async fn open_store(config: &DbConfig, dbname: &str) -> Option<ReportingStore> {
    match ReportingStore::connect(config, dbname).await {
        Ok(store) => {
            println!("Connected to database {}.", dbname.green());
            Some(store)
        }
        Err(e) => {
            println!("{} {}", "Error connecting to database:".red(), e);
            None
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let stdin = io::stdin();
    let mut input = stdin.lock();

    let dbname = match cli.dbname {
        Some(name) => name,
        None => prompt_dbname(&mut input)?,
    };

    if !cli.no_create {
        let schema = SchemaManager::new(&config.db);
        match schema.ensure_database(&dbname).await {
            Ok(DatabaseStatus::Created) => {
                println!("Database {} created successfully!", dbname.green());
            }
            Ok(DatabaseStatus::AlreadyExists) => {
                println!("Database {} already exists.", dbname.yellow());
            }
            Err(e) => println!("{} {:#}", "Error creating database:".red(), e),
        }
        match schema.ensure_schema(&dbname).await {
            Ok(()) => println!("Tables are ready in database {}.", dbname.green()),
            Err(e) => println!("{} {:#}", "Error creating tables:".red(), e),
        }
    }

    if !cli.skip_ingest {
        let employers: Vec<String> = if cli.employers.is_empty() {
            DEFAULT_EMPLOYERS.iter().map(|id| id.to_string()).collect()
        } else {
            cli.employers
        };

        println!("Fetching vacancies for {} employers...", employers.len());
        let fetcher = VacancyFetcher::new(config.api.clone())?;
        let loader = IngestionLoader::new(&fetcher, &config.db);
        match loader.load(&dbname, &employers).await {
            Ok(stats) => {
                println!("Fetched {} vacancies.", stats.fetched);
                println!(
                    "Added {} companies and {} vacancies to database {}.",
                    stats.companies,
                    stats.vacancies,
                    dbname.green()
                );
                if stats.skipped > 0 {
                    println!("  Skipped: {}", stats.skipped);
                }
            }
            Err(e) => println!("{} {}", "Error adding data:".red(), e),
        }
    }

    let Some(mut store) = open_store(&config.db, &dbname).await else {
        return Ok(());
    };

    let mut stdout = io::stdout();
    MenuController::new(&mut store).run(&mut input, &mut stdout).await
}
