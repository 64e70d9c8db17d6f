use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::{
    calling::CallingParams,
    depth,
    engine::{self, AggregationRequest, TableKind},
    filter::{AlleleFilter, Selector},
    markers::{PanelCatalog, VariantIndex},
    output,
    report::{self, InputInfo, OutputInfo, PanelInfo, RequestInfo, RunReport, Statistics},
    store::InMemoryStore,
    table::Orientation,
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Genotype call tables from panel sequencing allele depths",
    long_about = None
)]
struct Cli {
    /// Allele depth TSV: sample, variant, alignment map, call, A, C, G, T, other
    #[arg(value_name = "DEPTHS")]
    depths: PathBuf,

    /// Marker table TSV: id, code, chrom, position, ref, alt, gene, aachange
    #[arg(long, value_name = "TSV")]
    markers: PathBuf,

    /// Panel catalog JSON (required for --panel)
    #[arg(long, value_name = "JSON")]
    panels: Option<PathBuf>,

    /// Output table path
    #[arg(long, value_name = "OUTPUT")]
    output: PathBuf,

    /// Which table to produce
    #[arg(long, value_enum, default_value_t = TableKind::Calls)]
    table: TableKind,

    /// Row dimension of the output table
    #[arg(long, value_enum, default_value_t = Orientation::Sample)]
    row: Orientation,

    /// Minor/major depth ratio threshold for heterozygous calls;
    /// -1 uses the count-based hetmindepth rule instead
    #[arg(long, default_value_t = -1.0, allow_hyphen_values = true)]
    hetratio: f64,

    /// Minimum total depth to attempt a call
    #[arg(long, default_value_t = 5)]
    mindepth: u32,

    /// Minimum minor-allele depth for a heterozygous call (count rule)
    #[arg(long, default_value_t = 2)]
    hetmindepth: u32,

    /// Restrict to these sample ids
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    sample_ids: Option<Vec<u32>>,

    /// Restrict to these variant ids
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    variant_ids: Option<Vec<u32>>,

    /// Restrict to the member variants of this panel (by code)
    #[arg(long, value_name = "CODE")]
    panel: Option<String>,

    /// Marker for missing cells
    #[arg(long, default_value = output::MISSING)]
    missing: String,

    /// Write a JSON run report beside the output
    #[arg(long)]
    report: bool,

    /// Logging verbosity (e.g. error, warn, info, debug)
    #[arg(long, default_value = "info")]
    log_level: String,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let variants = VariantIndex::load(&cli.markers)?;

    let catalog = match &cli.panels {
        Some(path) => Some(PanelCatalog::load(path)?),
        None => None,
    };

    let mut filter = AlleleFilter::from_selectors(
        match &cli.sample_ids {
            Some(ids) => Selector::default().ids(ids.iter().copied()),
            None => Selector::default(),
        },
        match &cli.variant_ids {
            Some(ids) => Selector::default().ids(ids.iter().copied()),
            None => Selector::default(),
        },
    )?;

    let mut panel_info = None;
    if let Some(code) = &cli.panel {
        let Some(catalog) = &catalog else {
            bail!("--panel requires --panels");
        };
        let Some(panel) = catalog.panel_by_code(code) else {
            bail!("panel '{code}' not found in catalog");
        };
        tracing::info!(
            panel = %panel.code,
            variants = panel.variants.len(),
            "scoping request to panel",
        );
        filter = filter.intersect_variants(&panel.variants);
        panel_info = Some(PanelInfo {
            code: panel.code.clone(),
            variants: panel.variants.len(),
        });
    }

    let (store, records_parsed, parse_errors) = load_depths(&cli.depths)?;

    let request = AggregationRequest {
        filter,
        params: CallingParams {
            hetratio: cli.hetratio,
            mindepth: cli.mindepth,
            hetmindepth: cli.hetmindepth,
        },
        orientation: cli.row,
    };

    let summary = match cli.table {
        TableKind::Calls => {
            let result = engine::allele_calls(&store, &variants, &request)?;
            output::write_call_table_file(&cli.output, &result.table, &cli.missing)?;
            result.summary
        }
        TableKind::Nalt => {
            let result = engine::alt_counts(&store, &variants, &request)?;
            output::write_alt_count_table_file(&cli.output, &result.table, &cli.missing)?;
            result.summary
        }
    };

    tracing::info!(
        output = %cli.output.display(),
        records = summary.records,
        pairs = summary.pairs,
        calls = summary.calls,
        no_calls = summary.no_calls,
        "wrote table",
    );

    if cli.report {
        let timestamp = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());
        let report = RunReport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp,
            input: InputInfo {
                depths: cli.depths.display().to_string(),
                markers: cli.markers.display().to_string(),
                records_parsed,
                parse_errors,
            },
            output: OutputInfo {
                path: cli.output.display().to_string(),
                table: report::table_kind_name(cli.table),
                missing_marker: cli.missing.clone(),
            },
            request: RequestInfo::new(&request.params, request.orientation),
            panel: panel_info,
            statistics: Statistics::from(&summary),
        };
        report
            .write(&cli.output)
            .context("failed to write run report")?;
    }

    Ok(())
}

/// Read the depth file, tolerating malformed lines: they are logged and
/// counted, not fatal.
fn load_depths(path: &PathBuf) -> Result<(InMemoryStore, usize, usize)> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open depth file {}", path.display()))?;
    let reader = depth::Reader::new(BufReader::new(file));

    let mut records = Vec::new();
    let mut parse_errors = 0usize;
    for result in reader {
        match result {
            Ok(record) => records.push(record),
            Err(e) => {
                parse_errors += 1;
                tracing::warn!("skipping malformed depth record: {e}");
            }
        }
    }
    tracing::info!(
        records = records.len(),
        parse_errors,
        "loaded allele depth records",
    );

    let parsed = records.len();
    Ok((InMemoryStore::new(records), parsed, parse_errors))
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to build log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;
    Ok(())
}
