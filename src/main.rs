//! poststrat: Survey Post-Stratification CLI Tool
//!
//! Fits one multinomial model per survey question on respondent
//! demographics, re-weights its predictions to census cell counts and shows
//! the census-adjusted answer distribution next to the raw survey one.

use std::time::Instant;

use anyhow::{bail, Result};
use clap::Parser;
use console::style;
use log::warn;

use poststrat::cli::Cli;
use poststrat::pipeline::{
    analyze_missing_demographics, compare_marginals, count_incomplete_rows, load_census,
    load_survey, DemographicField, PostStratificationEstimator, StudyConfig,
};
use poststrat::report::{
    build_export, coefficient_table, display_comparison, display_marginals, export_results,
    ExportParams, RunSummary,
};
use poststrat::utils::{
    create_spinner, finish_with_success, finish_with_warning, print_banner, print_completion,
    print_config, print_count, print_info, print_step_header, print_step_time, print_success,
    print_warning,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    let config = cli.estimator_config();
    let output_path = cli.output_path();

    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(
        &cli.survey,
        &cli.census,
        (!cli.no_export).then_some(output_path.as_path()),
        &config,
    );

    // Step 1: Load survey, census and study configuration
    print_step_header(1, "Load Data");

    let step_start = Instant::now();
    let study = match &cli.questions {
        Some(path) => StudyConfig::load(path)?,
        None => StudyConfig::default(),
    };

    let spinner = create_spinner("Loading survey...");
    let survey = load_survey(
        &cli.survey,
        &cli.extra_survey,
        &cli.extra_skip_columns,
        &study,
        cli.infer_schema_length,
    )?;
    finish_with_success(
        &spinner,
        &format!(
            "Survey loaded: {} respondents, {} question(s)",
            survey.len(),
            survey.questions.len()
        ),
    );

    let spinner = create_spinner("Loading census...");
    let census = load_census(
        &cli.census,
        &cli.count_column,
        cli.acs_codes,
        cli.infer_schema_length,
    )?;
    finish_with_success(
        &spinner,
        &format!(
            "Census loaded: {} cells, population {:.0}",
            census.len(),
            census.total_population()
        ),
    );

    let incomplete = count_incomplete_rows(&survey);
    let mut summary = RunSummary::new(survey.len(), incomplete);
    summary.set_census(census.len(), census.total_population());

    if incomplete == 0 {
        print_info("Every respondent has complete demographics");
    } else {
        print_count(
            "respondent(s) with missing demographics",
            incomplete,
            Some("(excluded from model fitting)"),
        );
        for (field, ratio) in analyze_missing_demographics(&survey) {
            if ratio > 0.0 {
                println!(
                    "        {} {}: {:.1}%",
                    style("•").dim(),
                    field,
                    ratio * 100.0
                );
            }
        }
    }
    let load_elapsed = step_start.elapsed();
    summary.set_load_time(load_elapsed);
    print_step_time(load_elapsed);

    // Step 2: Sample composition against the census
    print_step_header(2, "Demographic Marginals");

    let marginals: Vec<_> = DemographicField::ALL
        .iter()
        .filter_map(|&field| match compare_marginals(&survey, &census, field) {
            Ok(m) => Some(m),
            Err(e) => {
                warn!("Skipping marginal comparison for '{}': {}", field, e);
                None
            }
        })
        .collect();
    display_marginals(&marginals);

    // Step 3: Fit the encoder and one model per question
    print_step_header(3, "Fit Question Models");

    let step_start = Instant::now();
    let specs = study.resolve(&survey.questions)?;
    if specs.is_empty() {
        bail!("No question columns found in {}", cli.survey.display());
    }
    let spinner = create_spinner(&format!("Fitting {} question model(s)...", specs.len()));
    let estimator = PostStratificationEstimator::fit(&survey, &specs, config)?;
    if estimator.fit_failures().is_empty() {
        finish_with_success(
            &spinner,
            &format!("Fitted {} model(s)", estimator.models().len()),
        );
    } else {
        finish_with_warning(
            &spinner,
            &format!(
                "Fitted {} of {} model(s)",
                estimator.models().len(),
                specs.len()
            ),
        );
    }
    for model in estimator.models().values() {
        if !model.converged() {
            print_warning(&format!(
                "Model for '{}' stopped after {} iterations without converging",
                model.question(),
                model.iterations()
            ));
        }
    }
    let fit_elapsed = step_start.elapsed();
    summary.set_fit_time(fit_elapsed);
    print_step_time(fit_elapsed);

    // Step 4: Census-weighted estimates
    print_step_header(4, "Census-Adjusted Estimates");

    let step_start = Instant::now();
    let estimation = estimator.estimate(&survey, &census)?;
    for outcome in &estimation.outcomes {
        match &outcome.result {
            Ok(comparison) => {
                display_comparison(comparison);
                if cli.verbose > 0 {
                    if let Some(coefficients) = estimator.coefficients(&outcome.question) {
                        for line in coefficient_table(&coefficients).to_string().lines() {
                            println!("    {}", line);
                        }
                    }
                }
                summary.add_estimated(&outcome.question);
            }
            Err(e) => {
                print_warning(&format!("'{}': {}", outcome.question, e));
                summary.add_failed(&outcome.question, e.to_string());
            }
        }
    }
    let estimate_elapsed = step_start.elapsed();
    summary.set_estimate_time(estimate_elapsed);
    print_step_time(estimate_elapsed);

    // Step 5: Export
    if !cli.no_export {
        print_step_header(5, "Save Results");

        let step_start = Instant::now();
        let params = ExportParams {
            survey_file: &cli.survey.display().to_string(),
            census_file: &cli.census.display().to_string(),
            extra_survey_files: cli
                .extra_survey
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            survey_respondents: survey.len(),
        };
        let export = build_export(&estimator, &estimation, &marginals, &params);
        export_results(&export, &output_path)?;
        print_success(&format!("Saved to {}", output_path.display()));
        let export_elapsed = step_start.elapsed();
        summary.set_export_time(export_elapsed);
        print_step_time(export_elapsed);
    }

    summary.display();

    if summary.questions_estimated.is_empty() {
        bail!("No question could be estimated");
    }

    print_completion();

    Ok(())
}
