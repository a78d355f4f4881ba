use anyhow::Result;
use colored::Colorize;
use std::io::{BufRead, Write};
use std::ops::ControlFlow;
use tracing::debug;

use crate::db::Reports;
use crate::error::StoreError;
use crate::models::VacancyListing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    CompanyCounts,
    AllVacancies,
    AverageSalary,
    AboveAverage,
    KeywordSearch,
    Exit,
}

impl MenuAction {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuAction::CompanyCounts),
            "2" => Some(MenuAction::AllVacancies),
            "3" => Some(MenuAction::AverageSalary),
            "4" => Some(MenuAction::AboveAverage),
            "5" => Some(MenuAction::KeywordSearch),
            "0" => Some(MenuAction::Exit),
            _ => None,
        }
    }
}

/// Prompt, run one report, print it, repeat until the user exits.
pub struct MenuController<'a, R: Reports> {
    store: &'a mut R,
}

impl<'a, R: Reports> MenuController<'a, R> {
    pub fn new(store: &'a mut R) -> Self {
        Self { store }
    }

    /// Runs until `0` or end of input, then disconnects the store.
    pub async fn run<I: BufRead, O: Write>(&mut self, input: &mut I, out: &mut O) -> Result<()> {
        loop {
            print_menu(out)?;
            write!(out, "Your choice: ")?;
            out.flush()?;

            let mut line = String::new();
            let action = if input.read_line(&mut line)? == 0 {
                Some(MenuAction::Exit)
            } else {
                MenuAction::parse(&line)
            };
            debug!(choice = line.trim(), ?action, "Menu selection");

            match action {
                Some(MenuAction::Exit) => {
                    writeln!(out, "{}", "Program finished.".green())?;
                    break;
                }
                Some(action) => match self.dispatch(action, input, out).await {
                    Ok(ControlFlow::Continue(())) => {}
                    Ok(ControlFlow::Break(())) => {
                        writeln!(out, "\n{}", "Program finished.".green())?;
                        break;
                    }
                    Err(e) => writeln!(out, "{} {}", "Query failed:".red(), e)?,
                },
                None => {
                    writeln!(
                        out,
                        "{}",
                        "Invalid input. Please choose an option from 0 to 5.".red()
                    )?;
                }
            }
        }

        self.store.disconnect().await?;
        writeln!(out, "\nDisconnected from database.")?;
        Ok(())
    }

    async fn dispatch<I: BufRead, O: Write>(
        &mut self,
        action: MenuAction,
        input: &mut I,
        out: &mut O,
    ) -> Result<ControlFlow<()>, MenuError> {
        match action {
            MenuAction::CompanyCounts => {
                let counts = self.store.company_vacancy_counts().await?;
                writeln!(out, "\nCompany - number of vacancies:")?;
                for row in counts {
                    writeln!(out, "{}: {} vacancies", row.company, row.vacancies.to_string().underline())?;
                }
            }

            MenuAction::AllVacancies => {
                let listings = self.store.all_vacancies().await?;
                writeln!(out, "\nAll vacancies:")?;
                print_listings(out, &listings)?;
            }

            MenuAction::AverageSalary => {
                let average = match self.store.average_salary().await? {
                    Some(avg) => format!("{:.2}", avg),
                    None => "no data".to_string(),
                };
                writeln!(out, "\nAverage salary: {}", average.underline())?;
            }

            MenuAction::AboveAverage => {
                let listings = self.store.vacancies_above_average_salary().await?;
                writeln!(out, "\nVacancies with above-average salary:")?;
                print_listings(out, &listings)?;
            }

            MenuAction::KeywordSearch => {
                write!(out, "Enter a word to search for: ")?;
                out.flush()?;
                let mut keyword = String::new();
                if input.read_line(&mut keyword)? == 0 {
                    return Ok(ControlFlow::Break(()));
                }
                let keyword = keyword.trim();

                let listings = self.store.vacancies_matching_keyword(keyword).await?;
                writeln!(out, "\nVacancies with '{}' in the title:", keyword.green())?;
                print_listings(out, &listings)?;
            }

            MenuAction::Exit => return Ok(ControlFlow::Break(())),
        }
        Ok(ControlFlow::Continue(()))
    }
}

#[derive(Debug, thiserror::Error)]
enum MenuError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn print_menu<O: Write>(out: &mut O) -> std::io::Result<()> {
    writeln!(out, "\nWhat would you like to do with the database?")?;
    writeln!(out, "\t1. Show companies and their vacancy counts")?;
    writeln!(out, "\t2. Show all vacancies")?;
    writeln!(out, "\t3. Show the average salary")?;
    writeln!(out, "\t4. Show vacancies with above-average salary")?;
    writeln!(out, "\t5. Show vacancies whose title contains a word")?;
    writeln!(out, "\t0. Exit")
}

fn print_listings<O: Write>(out: &mut O, listings: &[VacancyListing]) -> std::io::Result<()> {
    if listings.is_empty() {
        return writeln!(out, "No vacancies found.");
    }
    for listing in listings {
        writeln!(
            out,
            "{}: {} - {} - {}",
            listing.company,
            listing.title,
            listing.pay_range().underline(),
            listing.link
        )?;
    }
    Ok(())
}
