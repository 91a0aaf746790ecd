mod provider;
pub mod providers;

pub use provider::{
    FilterOp, ReportFilter, ReportQuery, StaticReportSource, TrackerReport, TrackerReportSource,
};
