//! Run summary report generation

use std::time::Duration;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

/// Summary of a post-stratification run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub survey_respondents: usize,
    pub incomplete_respondents: usize,
    pub census_cells: usize,
    pub census_population: f64,
    pub questions_estimated: Vec<String>,
    pub questions_failed: Vec<(String, String)>,
    pub load_time: Duration,
    pub fit_time: Duration,
    pub estimate_time: Duration,
    pub export_time: Duration,
}

impl RunSummary {
    pub fn new(survey_respondents: usize, incomplete_respondents: usize) -> Self {
        Self {
            survey_respondents,
            incomplete_respondents,
            ..Default::default()
        }
    }

    pub fn set_census(&mut self, cells: usize, population: f64) {
        self.census_cells = cells;
        self.census_population = population;
    }

    pub fn add_estimated(&mut self, question: &str) {
        self.questions_estimated.push(question.to_string());
    }

    pub fn add_failed(&mut self, question: &str, reason: String) {
        self.questions_failed.push((question.to_string(), reason));
    }

    pub fn set_load_time(&mut self, elapsed: Duration) {
        self.load_time = elapsed;
    }

    pub fn set_fit_time(&mut self, elapsed: Duration) {
        self.fit_time = elapsed;
    }

    pub fn set_estimate_time(&mut self, elapsed: Duration) {
        self.estimate_time = elapsed;
    }

    pub fn set_export_time(&mut self, elapsed: Duration) {
        self.export_time = elapsed;
    }

    pub fn total_time(&self) -> Duration {
        self.load_time + self.fit_time + self.estimate_time + self.export_time
    }

    pub fn display(&self) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("POST-STRATIFICATION SUMMARY").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Metric").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);

        table.add_row(vec![
            Cell::new("👥 Survey Respondents"),
            Cell::new(self.survey_respondents),
        ]);
        table.add_row(vec![
            Cell::new("🕳️  Missing Demographics"),
            Cell::new(self.incomplete_respondents).fg(if self.incomplete_respondents == 0 {
                Color::White
            } else {
                Color::Yellow
            }),
        ]);
        table.add_row(vec![
            Cell::new("🗺️  Census Cells"),
            Cell::new(self.census_cells),
        ]);
        table.add_row(vec![
            Cell::new("🌎 Census Population"),
            Cell::new(format!("{:.0}", self.census_population)),
        ]);
        table.add_row(vec![
            Cell::new("✅ Questions Estimated"),
            Cell::new(self.questions_estimated.len())
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
        ]);
        table.add_row(vec![
            Cell::new("❌ Questions Failed"),
            Cell::new(self.questions_failed.len()).fg(if self.questions_failed.is_empty() {
                Color::White
            } else {
                Color::Red
            }),
        ]);
        table.add_row(vec![
            Cell::new("⏱️  Total Time"),
            Cell::new(format!("{:.2?}", self.total_time())),
        ]);

        for line in table.to_string().lines() {
            println!("    {}", line);
        }

        if !self.questions_failed.is_empty() {
            println!();
            println!(
                "    {} {}",
                style("📝").cyan(),
                style("FAILED QUESTIONS").white().bold()
            );
            println!("    {}", style("─".repeat(50)).dim());
            for (question, reason) in &self.questions_failed {
                println!("        {} {}", style("•").dim(), question);
                println!("          {}", style(reason).red());
            }
        }
    }
}
