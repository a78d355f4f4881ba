use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Connection, PgConnection, Row};
use tracing::{error, info};

use crate::config::DbConfig;
use crate::error::StoreError;
use crate::models::{CompanyVacancyCount, Salary, VacancyListing};

/// Text that Postgres can cast to an integer.
const NUMERIC_SALARY: &str = "'^-?[0-9]+$'";

/// The read-only reports offered by the menu.
#[async_trait]
pub trait Reports {
    async fn company_vacancy_counts(&mut self) -> Result<Vec<CompanyVacancyCount>, StoreError>;
    async fn all_vacancies(&mut self) -> Result<Vec<VacancyListing>, StoreError>;
    /// `None` when no vacancy has a numeric lower bound.
    async fn average_salary(&mut self) -> Result<Option<f64>, StoreError>;
    async fn vacancies_above_average_salary(&mut self) -> Result<Vec<VacancyListing>, StoreError>;
    async fn vacancies_matching_keyword(&mut self, keyword: &str) -> Result<Vec<VacancyListing>, StoreError>;
    async fn disconnect(&mut self) -> Result<(), StoreError>;
}

/// A single connection held open for the lifetime of the menu.
pub struct ReportingStore {
    conn: Option<PgConnection>,
}

impl ReportingStore {
    pub async fn connect(config: &DbConfig, dbname: &str) -> Result<Self, StoreError> {
        let conn = PgConnection::connect_with(&config.connect_options(dbname)).await?;
        info!(database = dbname, "Connected to database");
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut PgConnection, StoreError> {
        self.conn.as_mut().ok_or(StoreError::NotConnected)
    }

    async fn listings(&mut self, sql: &str, bind: Option<String>) -> Result<Vec<VacancyListing>, StoreError> {
        let conn = self.conn()?;
        let mut query = sqlx::query(sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&mut *conn).await.inspect_err(|e| {
            error!(error = %e, "Report query failed");
        })?;
        Ok(rows.iter().map(row_to_listing).collect())
    }
}

#[async_trait]
impl Reports for ReportingStore {
    async fn company_vacancy_counts(&mut self) -> Result<Vec<CompanyVacancyCount>, StoreError> {
        let conn = self.conn()?;
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT c.name, COUNT(v.vacancy_id)
             FROM companies c
             JOIN vacancies v ON c.company_id = v.company_id
             GROUP BY c.company_id, c.name",
        )
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(company, vacancies)| CompanyVacancyCount { company, vacancies })
            .collect())
    }

    async fn all_vacancies(&mut self) -> Result<Vec<VacancyListing>, StoreError> {
        self.listings(
            "SELECT c.name, v.title, v.salary_from, v.salary_to, v.link
             FROM companies c
             JOIN vacancies v ON c.company_id = v.company_id",
            None,
        )
        .await
    }

    async fn average_salary(&mut self) -> Result<Option<f64>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT ROUND(AVG(salary_from::bigint), 2)::float8
             FROM vacancies
             WHERE salary_from ~ {}",
            NUMERIC_SALARY
        );
        let average: Option<f64> = sqlx::query_scalar(&sql).fetch_one(&mut *conn).await?;
        Ok(average)
    }

    async fn vacancies_above_average_salary(&mut self) -> Result<Vec<VacancyListing>, StoreError> {
        let sql = format!(
            "SELECT c.name, v.title, v.salary_from, v.salary_to, v.link
             FROM companies c
             JOIN vacancies v ON c.company_id = v.company_id
             WHERE (CASE WHEN v.salary_from ~ {re} THEN v.salary_from::bigint ELSE 0 END) >
                   (SELECT ROUND(AVG(salary_from::bigint), 2) FROM vacancies WHERE salary_from ~ {re})",
            re = NUMERIC_SALARY
        );
        self.listings(&sql, None).await
    }

    async fn vacancies_matching_keyword(&mut self, keyword: &str) -> Result<Vec<VacancyListing>, StoreError> {
        self.listings(
            "SELECT c.name, v.title, v.salary_from, v.salary_to, v.link
             FROM companies c
             JOIN vacancies v ON c.company_id = v.company_id
             WHERE v.title ILIKE $1",
            Some(format!("%{}%", escape_like(keyword))),
        )
        .await
    }

    async fn disconnect(&mut self) -> Result<(), StoreError> {
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
            info!("Disconnected from database");
        }
        Ok(())
    }
}

fn row_to_listing(row: &PgRow) -> VacancyListing {
    let salary_from: Option<String> = row.get(2);
    let salary_to: Option<String> = row.get(3);
    VacancyListing {
        company: row.get(0),
        title: row.get(1),
        salary_from: Salary::from_column(salary_from.as_deref()),
        salary_to: Salary::from_column(salary_to.as_deref()),
        link: row.get(4),
    }
}

/// Escape LIKE wildcards so the keyword matches literally.
fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
