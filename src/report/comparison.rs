//! Comparison tables: census-adjusted vs raw survey distributions

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, CellAlignment, Color, Table};
use console::style;

use crate::pipeline::{ClassCoefficients, MarginalComparison, QuestionComparison};

/// Shifts smaller than this are shown without colour
const NOTABLE_SHIFT: f64 = 0.02;

fn percent_cell(value: f64) -> Cell {
    Cell::new(format!("{:.1}%", value * 100.0)).set_alignment(CellAlignment::Right)
}

fn shift_cell(delta: f64) -> Cell {
    let cell = Cell::new(format!("{:+.1} pp", delta * 100.0)).set_alignment(CellAlignment::Right);
    if delta >= NOTABLE_SHIFT {
        cell.fg(Color::Green)
    } else if delta <= -NOTABLE_SHIFT {
        cell.fg(Color::Red)
    } else {
        cell
    }
}

fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

/// Table of one question's option shares under both estimates
pub fn comparison_table(comparison: &QuestionComparison) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Option").add_attribute(Attribute::Bold),
        Cell::new("Census-adjusted").add_attribute(Attribute::Bold),
        Cell::new("Survey").add_attribute(Attribute::Bold),
        Cell::new("Shift").add_attribute(Attribute::Bold),
    ]);

    for (option, adjusted, raw) in comparison.rows() {
        table.add_row(vec![
            Cell::new(option),
            percent_cell(adjusted),
            percent_cell(raw),
            shift_cell(adjusted - raw),
        ]);
    }
    table
}

pub fn display_comparison(comparison: &QuestionComparison) {
    println!();
    println!("    {}", style(&comparison.question).white().bold());
    println!(
        "    {}",
        style(format!(
            "{} survey respondents, {} used for the model",
            comparison.survey_respondents, comparison.exclusions.used_rows
        ))
        .dim()
    );
    print_indented(&comparison_table(comparison));
}

/// Table of census vs survey shares for one demographic field
pub fn marginal_table(marginal: &MarginalComparison) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new(marginal.field.column_name()).add_attribute(Attribute::Bold),
        Cell::new("Census").add_attribute(Attribute::Bold),
        Cell::new("Survey").add_attribute(Attribute::Bold),
        Cell::new("Gap").add_attribute(Attribute::Bold),
    ]);

    for share in &marginal.shares {
        table.add_row(vec![
            Cell::new(&share.category),
            percent_cell(share.census_share),
            percent_cell(share.survey_share),
            shift_cell(share.survey_share - share.census_share),
        ]);
    }
    table
}

pub fn display_marginals(marginals: &[MarginalComparison]) {
    for marginal in marginals {
        println!();
        println!(
            "    {} {}",
            style(marginal.field.column_name()).white().bold(),
            style(format!("(max gap {:.1} pp)", marginal.max_gap() * 100.0)).dim()
        );
        print_indented(&marginal_table(marginal));
    }
}

/// Coefficients of every answer class against every feature
pub fn coefficient_table(coefficients: &[ClassCoefficients]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);

    let mut header = vec![
        Cell::new("Class").add_attribute(Attribute::Bold),
        Cell::new("Intercept").add_attribute(Attribute::Bold),
    ];
    if let Some(first) = coefficients.first() {
        header.extend(
            first
                .weights
                .iter()
                .map(|(name, _)| Cell::new(name).add_attribute(Attribute::Bold)),
        );
    }
    table.set_header(header);

    for class in coefficients {
        let mut row = vec![
            Cell::new(&class.class),
            Cell::new(format!("{:.3}", class.intercept)).set_alignment(CellAlignment::Right),
        ];
        row.extend(
            class
                .weights
                .iter()
                .map(|(_, w)| Cell::new(format!("{:.3}", w)).set_alignment(CellAlignment::Right)),
        );
        table.add_row(row);
    }
    table
}
