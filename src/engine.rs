//! Aggregation engine: filter, pool, call, pivot.
//!
//! One request turns allele depth records into either an allele call table
//! or an alt-allele count table. The engine is stateless and mutates none of
//! its inputs; depths from multiple alignment runs of the same
//! (sample, variant) pair are pooled before the call decision.

use std::collections::BTreeMap;

use clap::ValueEnum;
use rayon::prelude::*;
use thiserror::Error;

use crate::calling::{self, CallResult, CallingParams, InvalidThresholdError, PooledDepths};
use crate::depth::SampleId;
use crate::filter::{AlleleFilter, InvalidFilterError};
use crate::markers::{VariantId, VariantIndex};
use crate::store::AlleleStore;
use crate::table::{AltCountTable, CallTable, Orientation, PivotTable};
use crate::AggregationSummary;

/// Which derived table a request produces.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum TableKind {
    /// Allele call table: called base or heterozygous pair per cell.
    Calls,
    /// Alt-allele count table: 0, 1, or 2 per cell.
    Nalt,
}

/// One aggregation request.
#[derive(Debug, Clone)]
pub struct AggregationRequest {
    pub filter: AlleleFilter,
    pub params: CallingParams,
    pub orientation: Orientation,
}

impl Default for AggregationRequest {
    fn default() -> Self {
        Self {
            filter: AlleleFilter::default(),
            params: CallingParams::default(),
            orientation: Orientation::Sample,
        }
    }
}

/// Errors raised while servicing an aggregation request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Filter(#[from] InvalidFilterError),
    #[error(transparent)]
    Threshold(#[from] InvalidThresholdError),
    #[error("variant {variant_id} has no reference/alt definition")]
    UnknownReference { variant_id: VariantId },
}

/// An allele call table together with the run statistics.
#[derive(Debug)]
pub struct CallAggregation {
    pub table: CallTable,
    pub summary: AggregationSummary,
}

/// An alt-count table together with the run statistics.
pub struct AltCountAggregation {
    pub table: AltCountTable,
    pub summary: AggregationSummary,
}

/// Build the allele call table for a request.
pub fn allele_calls<S: AlleleStore>(
    store: &S,
    variants: &VariantIndex,
    request: &AggregationRequest,
) -> Result<CallAggregation, RequestError> {
    let (calls, summary) = call_pairs(store, variants, request)?;
    let table = PivotTable::from_cells(request.orientation, calls);
    Ok(CallAggregation { table, summary })
}

/// Build the alt-allele count table for a request. Pairs whose call is
/// `NoCall` are left missing rather than materialized.
pub fn alt_counts<S: AlleleStore>(
    store: &S,
    variants: &VariantIndex,
    request: &AggregationRequest,
) -> Result<AltCountAggregation, RequestError> {
    let (calls, summary) = call_pairs(store, variants, request)?;
    let cells = calls.into_iter().filter_map(|((sample_id, variant_id), call)| {
        let (ref_base, _alt) = variants
            .ref_alt(variant_id)
            .expect("variant resolved during calling");
        call.alt_count(ref_base)
            .map(|count| ((sample_id, variant_id), count))
    });
    let table = PivotTable::from_cells(request.orientation, cells);
    Ok(AltCountAggregation { table, summary })
}

type PairCalls = Vec<((SampleId, VariantId), CallResult)>;

fn call_pairs<S: AlleleStore>(
    store: &S,
    variants: &VariantIndex,
    request: &AggregationRequest,
) -> Result<(PairCalls, AggregationSummary), RequestError> {
    request.params.validate()?;

    // Explicitly selected variants are checked before touching any record.
    if let Some(selected) = request.filter.selected_variants() {
        for &variant_id in selected {
            if variants.get(variant_id).is_none() {
                return Err(RequestError::UnknownReference { variant_id });
            }
        }
    }

    let records = store.get_alleles(&request.filter);

    let mut summary = AggregationSummary {
        records: records.len(),
        ..AggregationSummary::default()
    };

    // BTreeMap keeps pair order deterministic before the parallel stage.
    let mut pooled: BTreeMap<(SampleId, VariantId), PooledDepths> = BTreeMap::new();
    for record in &records {
        if variants.get(record.variant_id).is_none() {
            return Err(RequestError::UnknownReference {
                variant_id: record.variant_id,
            });
        }
        pooled
            .entry((record.sample_id, record.variant_id))
            .or_default()
            .add_record(record);
    }
    summary.pairs = pooled.len();

    let params = request.params;
    let calls: PairCalls = pooled
        .into_iter()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(pair, depths)| (pair, calling::call_genotype(depths, &params)))
        .collect();

    for &((_, variant_id), call) in &calls {
        let (ref_base, _alt) = variants
            .ref_alt(variant_id)
            .expect("variant resolved during pooling");
        match call {
            CallResult::NoCall => summary.no_calls += 1,
            CallResult::Heterozygous(..) => {
                summary.calls += 1;
                summary.het_calls += 1;
            }
            CallResult::Homozygous(base) => {
                summary.calls += 1;
                if base == ref_base {
                    summary.hom_ref_calls += 1;
                } else {
                    summary.hom_nonref_calls += 1;
                }
            }
        }
    }

    tracing::info!(
        records = summary.records,
        pairs = summary.pairs,
        calls = summary.calls,
        no_calls = summary.no_calls,
        "aggregation complete",
    );

    Ok((calls, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depth::AlleleDepthRecord;
    use crate::markers::Variant;
    use crate::store::InMemoryStore;

    fn variant(id: VariantId, ref_base: char, alt_base: char) -> Variant {
        Variant {
            id,
            code: format!("v{id}"),
            chrom: "chr1".to_string(),
            position: u64::from(id) * 100,
            ref_base,
            alt_base,
            gene: String::new(),
            aachange: String::new(),
        }
    }

    fn record(
        sample_id: u32,
        variant_id: u32,
        map_id: u32,
        depths: (u32, u32, u32, u32),
    ) -> AlleleDepthRecord {
        AlleleDepthRecord {
            sample_id,
            variant_id,
            alignmentmap_id: map_id,
            call: 'N',
            depth_a: depths.0,
            depth_c: depths.1,
            depth_g: depths.2,
            depth_t: depths.3,
            depth_other: 0,
        }
    }

    fn fixture() -> (InMemoryStore, VariantIndex) {
        let variants =
            VariantIndex::from_variants([variant(7, 'A', 'T'), variant(8, 'C', 'G')]).unwrap();
        let store = InMemoryStore::new(vec![
            record(1, 7, 1, (20, 0, 0, 0)),
            record(1, 8, 1, (0, 5, 9, 0)),
            record(2, 7, 1, (12, 0, 0, 8)),
            record(2, 8, 1, (0, 2, 0, 0)),
        ]);
        (store, variants)
    }

    #[test]
    fn calls_and_summary() {
        let (store, variants) = fixture();
        let request = AggregationRequest::default();

        let result = allele_calls(&store, &variants, &request).unwrap();
        assert_eq!(result.summary.records, 4);
        assert_eq!(result.summary.pairs, 4);
        assert_eq!(result.summary.calls, 3);
        assert_eq!(result.summary.no_calls, 1);
        assert_eq!(result.summary.het_calls, 2);
        assert_eq!(result.summary.hom_ref_calls, 1);

        assert_eq!(
            result.table.get_pair(1, 7),
            Some(&CallResult::Homozygous('A'))
        );
        assert_eq!(
            result.table.get_pair(1, 8),
            Some(&CallResult::Heterozygous('G', 'C'))
        );
        // Total depth 2 is below the default mindepth of 5.
        assert_eq!(result.table.get_pair(2, 8), Some(&CallResult::NoCall));
    }

    #[test]
    fn alt_counts_leave_nocall_missing() {
        let (store, variants) = fixture();
        let request = AggregationRequest::default();

        let result = alt_counts(&store, &variants, &request).unwrap();
        assert_eq!(result.table.get_pair(1, 7), Some(&0));
        assert_eq!(result.table.get_pair(2, 7), Some(&1));
        // Het G/C at a C-reference site carries one non-ref allele copy.
        assert_eq!(result.table.get_pair(1, 8), Some(&1));
        assert_eq!(result.table.get_pair(2, 8), None);
    }

    #[test]
    fn depths_pool_across_alignment_runs() {
        let variants = VariantIndex::from_variants([variant(7, 'A', 'T')]).unwrap();
        // Each run alone is below mindepth; pooled they make a het call.
        let store = InMemoryStore::new(vec![
            record(1, 7, 1, (3, 0, 0, 0)),
            record(1, 7, 2, (1, 0, 0, 3)),
        ]);
        let request = AggregationRequest {
            params: CallingParams {
                hetratio: 0.5,
                ..CallingParams::default()
            },
            ..AggregationRequest::default()
        };

        let result = allele_calls(&store, &variants, &request).unwrap();
        assert_eq!(result.summary.records, 2);
        assert_eq!(result.summary.pairs, 1);
        assert_eq!(
            result.table.get_pair(1, 7),
            Some(&CallResult::Heterozygous('A', 'T'))
        );
    }

    #[test]
    fn unknown_variant_in_filter_fails_eagerly() {
        let (store, variants) = fixture();
        let request = AggregationRequest {
            filter: AlleleFilter::variant_ids([99]),
            ..AggregationRequest::default()
        };

        let err = allele_calls(&store, &variants, &request).unwrap_err();
        assert!(matches!(
            err,
            RequestError::UnknownReference { variant_id: 99 }
        ));
    }

    #[test]
    fn unknown_variant_in_records_fails() {
        let variants = VariantIndex::from_variants([variant(7, 'A', 'T')]).unwrap();
        let store = InMemoryStore::new(vec![record(1, 42, 1, (9, 0, 0, 0))]);

        let err = allele_calls(&store, &variants, &AggregationRequest::default()).unwrap_err();
        assert!(matches!(
            err,
            RequestError::UnknownReference { variant_id: 42 }
        ));
    }

    #[test]
    fn invalid_threshold_fails_before_processing() {
        let (store, variants) = fixture();
        let request = AggregationRequest {
            params: CallingParams {
                hetratio: 2.0,
                ..CallingParams::default()
            },
            ..AggregationRequest::default()
        };

        let err = allele_calls(&store, &variants, &request).unwrap_err();
        assert!(matches!(err, RequestError::Threshold(_)));
    }

    #[test]
    fn sample_filter_scopes_the_table() {
        let (store, variants) = fixture();
        let request = AggregationRequest {
            filter: AlleleFilter::sample_ids([1]),
            ..AggregationRequest::default()
        };

        let result = allele_calls(&store, &variants, &request).unwrap();
        assert_eq!(result.table.row_ids(), &[1]);
        assert_eq!(result.summary.records, 2);
    }
}
