//! Report assembly tests: sections render independently and failures stay local.

use anyhow::Result;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::io::Write;
use tempfile::NamedTempFile;
use turnover_pipeline::{Dataset, ForestConfig, PipelineConfig, TurnoverPipeline, EMPLOYEE_FIELDS};
use turnover_report::{build_report, render_text, Section};

fn write_employees(
    rows: usize,
    include_performance: bool,
    all_stay: bool,
) -> Result<NamedTempFile> {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let mut file = NamedTempFile::new()?;

    let fields: Vec<&str> = EMPLOYEE_FIELDS
        .iter()
        .copied()
        .filter(|f| include_performance || *f != "performance_score")
        .collect();
    writeln!(file, "{},left_company", fields.join(","))?;

    for i in 0..rows {
        let left = !all_stay && i % 4 == 0;
        let shift = if left { 2.0 } else { 0.0 };
        let values: Vec<String> = fields
            .iter()
            .map(|field| {
                let base: f64 = rng.gen_range(2.0..8.0);
                let value = match *field {
                    "satisfaction_score" => base - shift,
                    "stress_level" | "burnout_risk" => base + shift,
                    _ => base,
                };
                format!("{value:.2}")
            })
            .collect();
        writeln!(file, "{},{}", values.join(","), u8::from(left))?;
    }

    file.flush()?;
    Ok(file)
}

fn quick_pipeline() -> Result<TurnoverPipeline> {
    let mut config = PipelineConfig::default();
    config.forest = ForestConfig {
        n_estimators: 20,
        ..ForestConfig::default()
    };
    Ok(TurnoverPipeline::new(config)?)
}

#[test]
fn test_full_report_sections_ready() -> Result<()> {
    let file = write_employees(400, true, false)?;
    let dataset = Dataset::from_csv(file.path())?;
    let report = build_report(&dataset, &mut quick_pipeline()?);

    assert!(report.failed_sections().is_empty());

    let overview = report.overview.ready().expect("overview");
    assert_eq!(overview.total_rows, 400);
    assert_eq!(overview.left_count, 100);

    let model = report.model.ready().expect("model");
    assert_eq!(model.split.test_rows, 80);
    assert_eq!(model.evaluation.confusion.total(), 80);

    let drivers = report.drivers.ready().expect("drivers");
    assert_eq!(drivers.len(), 8);
    assert!(drivers.windows(2).all(|w| w[0].score <= w[1].score));

    let text = render_text(&report)?;
    for heading in [
        "1. Overview",
        "2. Core statistics",
        "3. Who leaves the company?",
        "4. Feature relationships",
        "5. Predicting employee turnover",
        "6. Key drivers of turnover",
        "7. Ethics, governance, and limitations",
    ] {
        assert!(text.contains(heading), "missing heading {heading}");
    }
    assert!(!text.contains("[section unavailable]"));
    Ok(())
}

#[test]
fn test_missing_column_fails_only_its_section() -> Result<()> {
    let file = write_employees(200, false, false)?;
    let dataset = Dataset::from_csv(file.path())?;
    let report = build_report(&dataset, &mut quick_pipeline()?);

    assert_eq!(report.failed_sections(), vec!["relationships"]);
    match &report.relationships {
        Section::Failed { error } => assert!(error.contains("performance_score")),
        Section::Ready(_) => panic!("correlation should fail without performance_score"),
    }

    let text = render_text(&report)?;
    assert!(text.contains("[section unavailable]"));
    assert!(text.contains("6. Key drivers of turnover"));
    Ok(())
}

#[test]
fn test_single_class_dataset_fails_model_sections() -> Result<()> {
    let file = write_employees(100, true, true)?;
    let dataset = Dataset::from_csv(file.path())?;
    let report = build_report(&dataset, &mut quick_pipeline()?);

    assert_eq!(report.failed_sections(), vec!["model", "drivers"]);
    assert!(report.overview.ready().is_some());
    assert_eq!(report.overview.ready().map(|o| o.left_count), Some(0));
    match &report.model {
        Section::Failed { error } => assert!(error.contains("both classes"), "{error}"),
        Section::Ready(_) => panic!("model should not fit on one class"),
    }

    let text = render_text(&report)?;
    assert!(text.contains("[section unavailable]"));
    assert!(text.contains("7. Ethics, governance, and limitations"));
    Ok(())
}

#[test]
fn test_json_report_marks_section_status() -> Result<()> {
    let file = write_employees(200, false, false)?;
    let dataset = Dataset::from_csv(file.path())?;
    let report = build_report(&dataset, &mut quick_pipeline()?);

    let json = serde_json::to_value(&report)?;
    assert_eq!(json["overview"]["status"], "ready");
    assert_eq!(json["relationships"]["status"], "failed");
    assert!(json["relationships"]["content"]["error"].is_string());
    assert_eq!(json["drivers"]["content"].as_array().map(Vec::len), Some(8));
    Ok(())
}
