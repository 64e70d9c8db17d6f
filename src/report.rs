//! Structured run report for downstream tool consumption.
//!
//! Writes a JSON file alongside the output table containing the request
//! parameters, scope, and aggregation statistics.

use serde::Serialize;
use std::path::Path;

use crate::AggregationSummary;
use crate::calling::CallingParams;
use crate::engine::TableKind;
use crate::table::Orientation;

/// Complete report of an aggregation run.
/// Serialized to JSON alongside the output file.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Tool version
    pub version: String,
    /// Timestamp of run (ISO 8601)
    pub timestamp: String,

    pub input: InputInfo,
    pub output: OutputInfo,

    /// Request parameters as resolved for this run
    pub request: RequestInfo,

    /// Panel scope if the request was panel-scoped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panel: Option<PanelInfo>,

    /// Aggregation statistics
    pub statistics: Statistics,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputInfo {
    pub depths: String,
    pub markers: String,
    pub records_parsed: usize,
    pub parse_errors: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputInfo {
    pub path: String,
    pub table: String,
    pub missing_marker: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestInfo {
    pub row: String,
    pub hetratio: f64,
    pub mindepth: u32,
    pub hetmindepth: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PanelInfo {
    pub code: String,
    pub variants: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub records: usize,
    pub pairs: usize,
    pub calls: usize,
    pub no_calls: usize,
    pub het_calls: usize,
    pub hom_ref_calls: usize,
    pub hom_nonref_calls: usize,
}

impl From<&AggregationSummary> for Statistics {
    fn from(s: &AggregationSummary) -> Self {
        Statistics {
            records: s.records,
            pairs: s.pairs,
            calls: s.calls,
            no_calls: s.no_calls,
            het_calls: s.het_calls,
            hom_ref_calls: s.hom_ref_calls,
            hom_nonref_calls: s.hom_nonref_calls,
        }
    }
}

impl RequestInfo {
    pub fn new(params: &CallingParams, orientation: Orientation) -> Self {
        Self {
            row: orientation.row_label().to_string(),
            hetratio: params.hetratio,
            mindepth: params.mindepth,
            hetmindepth: params.hetmindepth,
        }
    }
}

pub fn table_kind_name(kind: TableKind) -> String {
    match kind {
        TableKind::Calls => "calls".to_string(),
        TableKind::Nalt => "nalt".to_string(),
    }
}

impl RunReport {
    /// Write the report as JSON to a file alongside the output.
    /// For table.tsv, writes table_report.json
    pub fn write(&self, output_path: &Path) -> std::io::Result<()> {
        let stem = output_path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy();
        let report_name = format!("{}_report.json", stem);
        let report_path = output_path.with_file_name(report_name);

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        std::fs::write(&report_path, json)?;
        tracing::info!("Wrote run report to {}", report_path.display());

        Ok(())
    }
}
