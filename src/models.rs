use serde::Deserialize;
use std::fmt;

/// Text stored in a salary column when the bound is not known.
pub const SALARY_UNSPECIFIED: &str = "not specified";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Salary {
    Known(i64),
    Unspecified,
}

impl Salary {
    pub fn from_bound(bound: Option<i64>) -> Self {
        bound.map_or(Salary::Unspecified, Salary::Known)
    }

    /// Anything that is not a plain integer (the sentinel, a legacy "null"
    /// marker, SQL NULL) reads back as `Unspecified`.
    pub fn from_column(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map_or(Salary::Unspecified, Salary::Known)
    }

    pub fn to_column(&self) -> String {
        match self {
            Salary::Known(amount) => amount.to_string(),
            Salary::Unspecified => SALARY_UNSPECIFIED.to_string(),
        }
    }
}

impl fmt::Display for Salary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Salary::Known(amount) => write!(f, "{}", amount),
            Salary::Unspecified => f.write_str(SALARY_UNSPECIFIED),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vacancy {
    pub id: i32,
    pub company_id: i32,
    pub title: String,
    pub salary_from: Salary,
    pub salary_to: Salary,
    pub link: String,
}

// --- Records as returned by the vacancy search API ---

#[derive(Debug, Clone, Deserialize)]
pub struct VacancyPage {
    #[serde(default)]
    pub items: Vec<RawVacancy>,
    pub pages: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawVacancy {
    pub id: String,
    pub name: String,
    pub alternate_url: String,
    #[serde(default)]
    pub salary: Option<RawSalary>,
    #[serde(default)]
    pub employer: Option<RawEmployer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSalary {
    #[serde(default)]
    pub from: Option<i64>,
    #[serde(default)]
    pub to: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawEmployer {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

// --- Report rows ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyVacancyCount {
    pub company: String,
    pub vacancies: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VacancyListing {
    pub company: String,
    pub title: String,
    pub salary_from: Salary,
    pub salary_to: Salary,
    pub link: String,
}

impl VacancyListing {
    pub fn pay_range(&self) -> String {
        match (self.salary_from, self.salary_to) {
            (Salary::Known(min), Salary::Known(max)) => format!("{}-{}", min, max),
            (Salary::Known(min), Salary::Unspecified) => format!("{}+", min),
            (Salary::Unspecified, Salary::Known(max)) => format!("up to {}", max),
            (Salary::Unspecified, Salary::Unspecified) => SALARY_UNSPECIFIED.to_string(),
        }
    }
}
