use anyhow::{Context, Result};
use sqlx::{Connection, PgConnection};
use tracing::info;

use crate::config::DbConfig;

/// SQLSTATE for duplicate_database.
const DUPLICATE_DATABASE: &str = "42P04";

const CREATE_COMPANIES: &str = r#"
    CREATE TABLE IF NOT EXISTS companies (
        company_id SERIAL PRIMARY KEY,
        name VARCHAR(255) NOT NULL
    )
"#;

const CREATE_VACANCIES: &str = r#"
    CREATE TABLE IF NOT EXISTS vacancies (
        vacancy_id SERIAL PRIMARY KEY,
        company_id INTEGER NOT NULL,
        title VARCHAR(255) NOT NULL,
        salary_from VARCHAR(100),
        salary_to VARCHAR(100),
        link VARCHAR(255) NOT NULL,
        FOREIGN KEY (company_id) REFERENCES companies (company_id)
    )
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseStatus {
    Created,
    AlreadyExists,
}

pub struct SchemaManager<'a> {
    config: &'a DbConfig,
}

impl<'a> SchemaManager<'a> {
    pub fn new(config: &'a DbConfig) -> Self {
        Self { config }
    }

    /// Create database `name`. An existing database is not an error.
    pub async fn ensure_database(&self, name: &str) -> Result<DatabaseStatus> {
        let mut conn = PgConnection::connect_with(&self.config.maintenance_options())
            .await
            .with_context(|| format!("Failed to connect to {}", self.config.maintenance_db))?;

        let statement = format!("CREATE DATABASE {}", quote_ident(name));
        let result = sqlx::raw_sql(&statement).execute(&mut conn).await;
        conn.close().await.ok();

        match result {
            Ok(_) => {
                info!(database = name, "Created database");
                Ok(DatabaseStatus::Created)
            }
            Err(e) if is_duplicate_database(&e) => {
                info!(database = name, "Database already exists");
                Ok(DatabaseStatus::AlreadyExists)
            }
            Err(e) => Err(e).with_context(|| format!("Failed to create database {}", name)),
        }
    }

    /// Create the companies and vacancies tables if they are missing.
    pub async fn ensure_schema(&self, name: &str) -> Result<()> {
        let mut conn = PgConnection::connect_with(&self.config.connect_options(name))
            .await
            .with_context(|| format!("Failed to connect to database {}", name))?;

        let mut tx = conn.begin().await?;
        for statement in [CREATE_COMPANIES, CREATE_VACANCIES] {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .context("Failed to create tables")?;
        }
        tx.commit().await?;
        conn.close().await.ok();

        info!(database = name, "Schema ready");
        Ok(())
    }
}

fn is_duplicate_database(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == DUPLICATE_DATABASE)
}

/// Quote an identifier for statements that cannot take bind parameters.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
