//! Run reports, JSON output and charts.
//!
//! Every job produces a [`RunReport`]: the files it processed, what it wrote,
//! and a [`SkipReason`] for everything it had to leave out. The CLI prints the
//! report and writes it next to the job's outputs with [`ReportGenerator`].

mod generator;
pub mod plots;
mod run_report;

pub use generator::{ReportGenerator, format_table};
pub use run_report::{RunReport, SkipReason};
