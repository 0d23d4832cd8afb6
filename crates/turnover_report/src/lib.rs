//! Turnover Report - page-like presentation of the turnover pipeline
//!
//! Builds every section of the employee turnover report from typed pipeline
//! outputs and renders it as text or JSON. Sections fail independently.

pub mod render;
pub mod report;

pub use render::{fmt_metric, render_text};
pub use report::{build_report, ModelSection, Report, Section, StatisticsSection, TurnoverSection};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
