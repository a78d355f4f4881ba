use anyhow::{Context, Result};
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::FetchError;
use crate::models::{RawVacancy, VacancyPage};

/// Pages through the vacancy search API for a set of employers.
pub struct VacancyFetcher {
    client: reqwest::Client,
    config: ApiConfig,
}

impl VacancyFetcher {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    /// Fetch every vacancy for `employer_ids`, in page order.
    ///
    /// A failing page ends pagination: the error is logged and whatever was
    /// collected up to that page is returned.
    pub async fn fetch(&self, employer_ids: &[String]) -> Vec<RawVacancy> {
        let mut vacancies = Vec::new();

        for page in 0..self.config.max_pages {
            let result = match self.fetch_page(employer_ids, page).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, collected = vacancies.len(), "Stopping pagination");
                    break;
                }
            };

            let count = result.items.len();
            debug!(page, count, "Fetched vacancy page");
            vacancies.extend(result.items);

            if count == 0 {
                break;
            }
            if let Some(pages) = result.pages {
                if page + 1 >= pages {
                    break;
                }
            }
        }

        vacancies
    }

    async fn fetch_page(&self, employer_ids: &[String], page: u32) -> Result<VacancyPage, FetchError> {
        let mut query: Vec<(&str, String)> = employer_ids
            .iter()
            .map(|id| ("employer_id", id.clone()))
            .collect();
        query.push(("per_page", self.config.per_page.to_string()));
        query.push(("page", page.to_string()));

        let mut request = self
            .client
            .get(&self.config.base_url)
            .header(USER_AGENT, &self.config.user_agent)
            .query(&query);
        if let Some(token) = &self.config.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|source| FetchError::Transport { page, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { page, status });
        }

        response
            .json::<VacancyPage>()
            .await
            .map_err(|source| FetchError::Decode { page, source })
    }
}
