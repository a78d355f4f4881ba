use std::collections::{HashMap, HashSet};

use sqlx::{Connection, PgConnection};
use tracing::{debug, info, warn};

use crate::config::DbConfig;
use crate::error::IngestError;
use crate::hh::VacancyFetcher;
use crate::models::{Company, RawVacancy, Salary, Vacancy};

/// Rows ready for insertion; companies precede the vacancies that reference them.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct IngestBatch {
    pub companies: Vec<Company>,
    pub vacancies: Vec<Vacancy>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub fetched: usize,
    pub companies: usize,
    pub vacancies: usize,
    pub skipped: usize,
}

/// Split fetched records into unique companies and the vacancies that
/// reference them. Records without a usable vacancy or employer id are
/// dropped, and a repeated vacancy id keeps its first occurrence.
pub fn build_batch(raw: &[RawVacancy]) -> (IngestBatch, usize) {
    let mut batch = IngestBatch::default();
    let mut company_index: HashMap<i32, usize> = HashMap::new();
    let mut seen_vacancies: HashSet<i32> = HashSet::new();
    let mut skipped = 0;

    for record in raw {
        let Some(employer) = &record.employer else {
            warn!(vacancy = %record.id, "Skipping vacancy without employer");
            skipped += 1;
            continue;
        };
        let Some(company_id) = employer.id.as_deref().and_then(|id| id.parse::<i32>().ok()) else {
            warn!(vacancy = %record.id, employer = %employer.name, "Skipping vacancy with unusable employer id");
            skipped += 1;
            continue;
        };
        let Ok(vacancy_id) = record.id.parse::<i32>() else {
            warn!(vacancy = %record.id, "Skipping vacancy with unusable id");
            skipped += 1;
            continue;
        };

        // Last-seen name wins, first-seen position is kept.
        match company_index.get(&company_id) {
            Some(&idx) => batch.companies[idx].name = employer.name.clone(),
            None => {
                company_index.insert(company_id, batch.companies.len());
                batch.companies.push(Company {
                    id: company_id,
                    name: employer.name.clone(),
                });
            }
        }

        if !seen_vacancies.insert(vacancy_id) {
            debug!(vacancy = vacancy_id, "Dropping repeated vacancy");
            skipped += 1;
            continue;
        }

        let (salary_from, salary_to) = match &record.salary {
            Some(salary) => (Salary::from_bound(salary.from), Salary::from_bound(salary.to)),
            None => (Salary::Unspecified, Salary::Unspecified),
        };

        batch.vacancies.push(Vacancy {
            id: vacancy_id,
            company_id,
            title: record.name.clone(),
            salary_from,
            salary_to,
            link: record.alternate_url.clone(),
        });
    }

    (batch, skipped)
}

/// Insert both batches in one transaction. Nothing persists unless both succeed.
pub async fn insert_batch(conn: &mut PgConnection, batch: &IngestBatch) -> Result<(), IngestError> {
    let mut tx = conn.begin().await?;

    if !batch.companies.is_empty() {
        let ids: Vec<i32> = batch.companies.iter().map(|c| c.id).collect();
        let names: Vec<String> = batch.companies.iter().map(|c| c.name.clone()).collect();
        sqlx::query(
            r#"
            INSERT INTO companies (company_id, name)
            SELECT * FROM UNNEST($1::int4[], $2::text[])
            "#,
        )
        .bind(&ids)
        .bind(&names)
        .execute(&mut *tx)
        .await?;
    }

    if !batch.vacancies.is_empty() {
        let ids: Vec<i32> = batch.vacancies.iter().map(|v| v.id).collect();
        let company_ids: Vec<i32> = batch.vacancies.iter().map(|v| v.company_id).collect();
        let titles: Vec<String> = batch.vacancies.iter().map(|v| v.title.clone()).collect();
        let salary_from: Vec<String> = batch.vacancies.iter().map(|v| v.salary_from.to_column()).collect();
        let salary_to: Vec<String> = batch.vacancies.iter().map(|v| v.salary_to.to_column()).collect();
        let links: Vec<String> = batch.vacancies.iter().map(|v| v.link.clone()).collect();
        sqlx::query(
            r#"
            INSERT INTO vacancies (vacancy_id, company_id, title, salary_from, salary_to, link)
            SELECT * FROM UNNEST($1::int4[], $2::int4[], $3::text[], $4::text[], $5::text[], $6::text[])
            "#,
        )
        .bind(&ids)
        .bind(&company_ids)
        .bind(&titles)
        .bind(&salary_from)
        .bind(&salary_to)
        .bind(&links)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Fetches vacancies for a set of employers and stores them.
pub struct IngestionLoader<'a> {
    fetcher: &'a VacancyFetcher,
    config: &'a DbConfig,
}

impl<'a> IngestionLoader<'a> {
    pub fn new(fetcher: &'a VacancyFetcher, config: &'a DbConfig) -> Self {
        Self { fetcher, config }
    }

    pub async fn load(&self, dbname: &str, employer_ids: &[String]) -> Result<IngestStats, IngestError> {
        let raw = self.fetcher.fetch(employer_ids).await;
        let (batch, skipped) = build_batch(&raw);
        info!(
            fetched = raw.len(),
            companies = batch.companies.len(),
            vacancies = batch.vacancies.len(),
            skipped,
            "Prepared ingestion batch"
        );

        let mut conn = PgConnection::connect_with(&self.config.connect_options(dbname)).await?;
        let result = insert_batch(&mut conn, &batch).await;
        conn.close().await.ok();
        result?;

        Ok(IngestStats {
            fetched: raw.len(),
            companies: batch.companies.len(),
            vacancies: batch.vacancies.len(),
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, Config};
    use crate::db::{ReportingStore, Reports};
    use crate::models::{RawEmployer, RawSalary};
    use crate::schema::SchemaManager;

    fn raw(id: &str, employer: Option<(&str, &str)>, salary: Option<RawSalary>) -> RawVacancy {
        RawVacancy {
            id: id.to_string(),
            name: format!("Vacancy {}", id),
            alternate_url: format!("https://hh.ru/vacancy/{}", id),
            salary,
            employer: employer.map(|(id, name)| RawEmployer {
                id: Some(id.to_string()),
                name: name.to_string(),
            }),
        }
    }

    #[test]
    fn test_companies_are_deduplicated_last_name_wins() {
        let records = vec![
            raw("1", Some(("80", "Alfa")), None),
            raw("2", Some(("3529", "Sber")), None),
            raw("3", Some(("80", "Alfa-Bank")), None),
        ];
        let (batch, skipped) = build_batch(&records);

        assert_eq!(skipped, 0);
        assert_eq!(
            batch.companies,
            vec![
                Company { id: 80, name: "Alfa-Bank".to_string() },
                Company { id: 3529, name: "Sber".to_string() },
            ]
        );
        assert_eq!(batch.vacancies.len(), 3);
        assert_eq!(batch.vacancies[2].company_id, 80);
    }

    #[test]
    fn test_missing_salary_sets_both_bounds_unspecified() {
        let (batch, _) = build_batch(&[raw("1", Some(("80", "Alfa")), None)]);
        assert_eq!(batch.vacancies[0].salary_from, Salary::Unspecified);
        assert_eq!(batch.vacancies[0].salary_to, Salary::Unspecified);
    }

    #[test]
    fn test_salary_bounds_read_independently() {
        let records = vec![
            raw("1", Some(("80", "Alfa")), Some(RawSalary { from: Some(100000), to: None })),
            raw("2", Some(("80", "Alfa")), Some(RawSalary { from: None, to: Some(250000) })),
        ];
        let (batch, _) = build_batch(&records);

        assert_eq!(batch.vacancies[0].salary_from, Salary::Known(100000));
        assert_eq!(batch.vacancies[0].salary_to, Salary::Unspecified);
        assert_eq!(batch.vacancies[1].salary_from, Salary::Unspecified);
        assert_eq!(batch.vacancies[1].salary_to, Salary::Known(250000));
    }

    #[test]
    fn test_unusable_records_are_skipped() {
        let mut no_employer_id = raw("4", Some(("1", "x")), None);
        no_employer_id.employer.as_mut().unwrap().id = None;
        let records = vec![
            raw("1", None, None),
            raw("abc", Some(("80", "Alfa")), None),
            raw("3", Some(("emp", "Alfa")), None),
            no_employer_id,
            raw("5", Some(("80", "Alfa")), None),
        ];
        let (batch, skipped) = build_batch(&records);

        assert_eq!(skipped, 4);
        assert_eq!(batch.vacancies.len(), 1);
        assert_eq!(batch.vacancies[0].id, 5);
    }

    #[test]
    fn test_repeated_vacancy_keeps_first() {
        let mut second = raw("7", Some(("80", "Alfa")), None);
        second.name = "Changed".to_string();
        let records = vec![raw("7", Some(("80", "Alfa")), None), second];
        let (batch, skipped) = build_batch(&records);

        assert_eq!(skipped, 1);
        assert_eq!(batch.vacancies.len(), 1);
        assert_eq!(batch.vacancies[0].title, "Vacancy 7");
    }

    #[test]
    fn test_every_vacancy_references_a_batched_company() {
        let records = vec![
            raw("1", Some(("80", "Alfa")), None),
            raw("2", Some(("673", "Yandex")), None),
            raw("3", Some(("80", "Alfa")), None),
        ];
        let (batch, _) = build_batch(&records);
        let company_ids: HashSet<i32> = batch.companies.iter().map(|c| c.id).collect();
        assert!(batch.vacancies.iter().all(|v| company_ids.contains(&v.company_id)));
    }

    #[test]
    fn test_empty_input() {
        let (batch, skipped) = build_batch(&[]);
        assert_eq!(batch, IngestBatch::default());
        assert_eq!(skipped, 0);
    }

    // Requires a real database. Run with: SQLPASS=... cargo test -- --ignored
    #[tokio::test]
    #[ignore = "requires database"]
    async fn load_stores_fetched_vacancies_and_rejects_a_second_run() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "pages": 1,
            "items": [
                {"id": "1", "name": "Dev", "alternate_url": "https://hh.ru/vacancy/1",
                 "salary": {"from": 200, "to": null}, "employer": {"id": "80", "name": "Alfa"}},
                {"id": "2", "name": "QA", "alternate_url": "https://hh.ru/vacancy/2",
                 "salary": {"from": 100, "to": 150}, "employer": {"id": "80", "name": "Alfa"}},
                {"id": "3", "name": "Analyst", "alternate_url": "https://hh.ru/vacancy/3",
                 "salary": null, "employer": {"id": "3529", "name": "Sber"}}
            ]
        });
        let _page = server
            .mock("GET", "/vacancies")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let name = "hhdb_test_load";
        let config = Config::from_env().expect("SQLPASS required");
        let schema = SchemaManager::new(&config.db);
        schema.ensure_database(name).await.unwrap();
        schema.ensure_schema(name).await.unwrap();
        let mut conn = PgConnection::connect_with(&config.db.connect_options(name))
            .await
            .unwrap();
        sqlx::raw_sql("TRUNCATE vacancies, companies")
            .execute(&mut conn)
            .await
            .unwrap();
        conn.close().await.unwrap();

        let fetcher = VacancyFetcher::new(ApiConfig::new(format!("{}/vacancies", server.url()))).unwrap();
        let loader = IngestionLoader::new(&fetcher, &config.db);
        let employers = vec!["80".to_string(), "3529".to_string()];

        let stats = loader.load(name, &employers).await.unwrap();
        assert_eq!(
            stats,
            IngestStats { fetched: 3, companies: 2, vacancies: 3, skipped: 0 }
        );

        let second = loader.load(name, &employers).await;
        assert!(matches!(second, Err(IngestError::Conflict { .. })));

        let mut store = ReportingStore::connect(&config.db, name).await.unwrap();
        let counts = store.company_vacancy_counts().await.unwrap();
        let total: i64 = counts.iter().map(|c| c.vacancies).sum();
        assert_eq!(total, stats.vacancies as i64);
        assert_eq!(store.average_salary().await.unwrap(), Some(150.0));
        store.disconnect().await.unwrap();
    }
}
