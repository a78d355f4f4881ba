use anyhow::{Context, Result};
use sqlx::postgres::PgConnectOptions;
use std::env;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.hh.ru/vacancies";

/// Page size requested from the search API.
pub const PER_PAGE: u32 = 100;
/// Pages 0..MAX_PAGES are requested at most.
pub const MAX_PAGES: u32 = 20;

#[derive(Debug, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub maintenance_db: String,
    pub statement_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub per_page: u32,
    pub max_pages: u32,
}

impl Config {
    /// Load configuration from the process environment (and `.env` if present).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let password = lookup("SQLPASS")
            .context("SQLPASS environment variable not set. Set it with: export SQLPASS=your-db-password")?;

        let port = match lookup("PGPORT") {
            Some(raw) => raw.parse().context("PGPORT must be a valid port number")?,
            None => 5432,
        };

        let statement_timeout = secs(&lookup, "PG_STATEMENT_TIMEOUT_SECS", 30)?;
        let request_timeout = secs(&lookup, "HH_TIMEOUT_SECS", 10)?;
        let api = ApiConfig::new(lookup("HH_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()));

        Ok(Self {
            db: DbConfig {
                user: lookup("PGUSER").unwrap_or_else(|| "postgres".to_string()),
                password,
                host: lookup("PGHOST").unwrap_or_else(|| "localhost".to_string()),
                port,
                maintenance_db: lookup("PG_MAINTENANCE_DB").unwrap_or_else(|| "postgres".to_string()),
                statement_timeout,
            },
            api: ApiConfig {
                token: lookup("HH_API_TOKEN").filter(|t| !t.is_empty()),
                user_agent: lookup("HH_USER_AGENT").unwrap_or(api.user_agent),
                request_timeout,
                ..api
            },
        })
    }
}

impl DbConfig {
    pub fn connect_options(&self, dbname: &str) -> PgConnectOptions {
        let timeout_ms = self.statement_timeout.as_millis().to_string();
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(dbname)
            .options([("statement_timeout", timeout_ms.as_str())])
    }

    pub fn maintenance_options(&self) -> PgConnectOptions {
        self.connect_options(&self.maintenance_db)
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            user_agent: format!("hhdb/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(10),
            per_page: PER_PAGE,
            max_pages: MAX_PAGES,
        }
    }
}

fn secs<F>(lookup: &F, key: &str, default: u64) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => {
            let value: u64 = raw
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", key))?;
            Ok(Duration::from_secs(value))
        }
        None => Ok(Duration::from_secs(default)),
    }
}
