//! Plain-text rendering of a [`Report`]

use std::fmt::{self, Write};

use turnover_pipeline::metrics::{label_name, AverageMetrics, ClassMetrics};

use crate::report::{Report, Section};

const BAR_WIDTH: usize = 40;

/// Render the report as a linear, page-like text document
pub fn render_text(report: &Report) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_report(&mut out, report)?;
    Ok(out)
}

fn write_report(out: &mut String, report: &Report) -> fmt::Result {
    writeln!(out, "{}", report.title)?;
    writeln!(out, "{}", "=".repeat(report.title.len()))?;
    writeln!(out, "Generated {}", report.generated_at)?;
    let fingerprint = &report.dataset_fingerprint;
    writeln!(out, "Dataset {}", &fingerprint[..fingerprint.len().min(16)])?;

    heading(out, "1. Overview")?;
    section(out, &report.overview, |out, o| {
        writeln!(out, "  Total employees          {:>10}", o.total_rows)?;
        writeln!(out, "  Employees who left (%)   {:>9.1}%", o.left_share * 100.0)?;
        writeln!(out, "  Avg satisfaction         {:>10.2}", o.mean_satisfaction)?;
        writeln!(out, "  Avg stress               {:>10.2}", o.mean_stress)
    })?;

    heading(out, "2. Core statistics")?;
    section(out, &report.statistics, |out, s| {
        writeln!(
            out,
            "  {:<26} {:>8} {:>8} {:>8} {:>8} {:>8}",
            "column", "mean", "median", "std", "min", "max"
        )?;
        for summary in &s.summaries {
            writeln!(
                out,
                "  {:<26} {:>8.3} {:>8.3} {:>8} {:>8.3} {:>8.3}",
                summary.name,
                summary.mean,
                summary.median,
                fmt_metric(summary.std, 3),
                summary.min,
                summary.max
            )?;
        }

        writeln!(out)?;
        writeln!(out, "  Distribution of {}", s.histogram.column)?;
        let peak = s.histogram.counts.iter().copied().max().unwrap_or(0);
        for (idx, &count) in s.histogram.counts.iter().enumerate() {
            writeln!(
                out,
                "  [{:>7.2}, {:>7.2}) {:>6} {}",
                s.histogram.edges[idx],
                s.histogram.edges[idx + 1],
                count,
                bar(count as f64, peak as f64)
            )?;
        }
        Ok(())
    })?;

    heading(out, "3. Who leaves the company?")?;
    section(out, &report.turnover, |out, t| {
        for count in &t.counts {
            writeln!(
                out,
                "  {:<8} {:>6} ({:>5.1}%)",
                count.class,
                count.count,
                count.share * 100.0
            )?;
        }
        writeln!(out)?;
        writeln!(
            out,
            "  {:<26} {:<7} {:>8} {:>8} {:>8} {:>8} {:>8}",
            "feature", "group", "min", "q1", "median", "q3", "max"
        )?;
        for group in &t.groups {
            let by_label = [
                (label_name(false), &group.stayed),
                (label_name(true), &group.left),
            ];
            for (name, summary) in by_label {
                match summary {
                    Some(b) => writeln!(
                        out,
                        "  {:<26} {:<7} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>8.2}",
                        group.feature, name, b.min, b.q1, b.median, b.q3, b.max
                    )?,
                    None => writeln!(out, "  {:<26} {:<7} {:>8}", group.feature, name, "no rows")?,
                }
            }
        }
        Ok(())
    })?;

    heading(out, "4. Feature relationships")?;
    section(out, &report.relationships, |out, m| {
        write!(out, "  {:<26}", "")?;
        for idx in 0..m.features.len() {
            write!(out, " {:>7}", format!("[{}]", idx + 1))?;
        }
        writeln!(out)?;
        for (idx, (feature, row)) in m.features.iter().zip(&m.values).enumerate() {
            write!(out, "  {:<26}", format!("[{}] {}", idx + 1, feature))?;
            for value in row {
                write!(out, " {:>7}", fmt_metric(*value, 2))?;
            }
            writeln!(out)?;
        }
        Ok(())
    })?;

    heading(out, "5. Predicting employee turnover")?;
    section(out, &report.model, |out, m| {
        writeln!(
            out,
            "  Random forest: {} trees, max depth {}, class weight {}",
            m.metadata.n_estimators, m.metadata.max_depth, m.metadata.class_weight
        )?;
        writeln!(
            out,
            "  Train rows {} ({} left), test rows {} ({} left)",
            m.split.train_rows, m.split.train_positives, m.split.test_rows, m.split.test_positives
        )?;
        writeln!(out, "  Model hash {}", m.metadata.model_hash)?;

        let cm = &m.evaluation.confusion;
        writeln!(out)?;
        writeln!(out, "  Confusion matrix (rows actual, columns predicted)")?;
        writeln!(out, "  {:<10} {:>8} {:>8}", "", label_name(false), label_name(true))?;
        for actual in [false, true] {
            writeln!(
                out,
                "  {:<10} {:>8} {:>8}",
                label_name(actual),
                cm.counts[usize::from(actual)][0],
                cm.counts[usize::from(actual)][1]
            )?;
        }

        writeln!(out)?;
        writeln!(
            out,
            "  {:<14} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for class in &m.evaluation.classes {
            class_row(out, class)?;
        }
        writeln!(
            out,
            "  {:<14} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy",
            "",
            "",
            m.evaluation.accuracy,
            cm.total()
        )?;
        average_row(out, "macro avg", &m.evaluation.macro_avg, cm.total())?;
        average_row(out, "weighted avg", &m.evaluation.weighted_avg, cm.total())?;

        writeln!(out)?;
        let flagged = cm.predicted(true);
        match m.evaluation.class(true).recall {
            Some(recall) => writeln!(
                out,
                "  The model identifies {:.0}% of leavers; {} of {} employees flagged \
                 as at risk stayed.",
                recall * 100.0,
                cm.false_positives(),
                flagged
            )?,
            None => writeln!(
                out,
                "  The test partition contains no leavers; recall is undefined."
            )?,
        }
        let undefined = m.evaluation.undefined_metrics();
        if !undefined.is_empty() {
            writeln!(out, "  Undefined (zero denominator): {}", undefined.join(", "))?;
        }
        Ok(())
    })?;

    heading(out, "6. Key drivers of turnover")?;
    section(out, &report.drivers, |out, drivers| {
        let peak = drivers.iter().map(|d| d.score).fold(0.0, f64::max);
        for driver in drivers {
            writeln!(
                out,
                "  {:<26} {:>6.3} {}",
                driver.feature,
                driver.score,
                bar(driver.score, peak)
            )?;
        }
        Ok(())
    })?;

    heading(out, "7. Ethics, governance, and limitations")?;
    for note in &report.notes {
        writeln!(out, "  - {note}")?;
    }
    Ok(())
}

fn heading(out: &mut String, title: &str) -> fmt::Result {
    writeln!(out)?;
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "-".repeat(title.len()))
}

fn section<T>(
    out: &mut String,
    section: &Section<T>,
    body: impl FnOnce(&mut String, &T) -> fmt::Result,
) -> fmt::Result {
    match section {
        Section::Ready(value) => body(out, value),
        Section::Failed { error } => writeln!(out, "  [section unavailable] {error}"),
    }
}

fn class_row(out: &mut String, class: &ClassMetrics) -> fmt::Result {
    writeln!(
        out,
        "  {:<14} {:>9} {:>9} {:>9} {:>9}",
        class.class,
        fmt_metric(class.precision, 2),
        fmt_metric(class.recall, 2),
        fmt_metric(class.f1, 2),
        class.support
    )
}

fn average_row(out: &mut String, name: &str, avg: &AverageMetrics, support: usize) -> fmt::Result {
    writeln!(
        out,
        "  {:<14} {:>9} {:>9} {:>9} {:>9}",
        name,
        fmt_metric(avg.precision, 2),
        fmt_metric(avg.recall, 2),
        fmt_metric(avg.f1, 2),
        support
    )
}

/// Format a possibly undefined metric; undefined renders as `n/a`
pub fn fmt_metric(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{v:.decimals$}"),
        None => "n/a".to_string(),
    }
}

fn bar(value: f64, peak: f64) -> String {
    if peak <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let len = ((value / peak) * BAR_WIDTH as f64).round() as usize;
    "#".repeat(len.max(1))
}
