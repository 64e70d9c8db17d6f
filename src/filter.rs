//! Request-scoping filter over allele depth records.
//!
//! Each dimension (samples, variants) can be selected either by explicit IDs
//! or by domain objects; an unset dimension is a wildcard. Supplying both
//! forms for the same dimension is accepted only when they agree.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::depth::{AlleleDepthRecord, SampleId};
use crate::markers::{Variant, VariantId};

/// Conflicting or malformed filter parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidFilterError {
    #[error(
        "conflicting {dimension} selectors: explicit ids {explicit:?} do not match ids derived \
         from objects {derived:?}"
    )]
    ConflictingSelectors {
        dimension: &'static str,
        explicit: Vec<u32>,
        derived: Vec<u32>,
    },
}

/// One dimension of a request: unset (wildcard), explicit IDs, or IDs derived
/// from domain objects.
#[derive(Debug, Clone, Default)]
pub struct Selector<T: Ord> {
    explicit: Option<BTreeSet<T>>,
    derived: Option<BTreeSet<T>>,
}

impl<T> Selector<T>
where
    T: Ord + Copy + Into<u32> + fmt::Debug,
{
    pub fn ids(mut self, ids: impl IntoIterator<Item = T>) -> Self {
        self.explicit = Some(ids.into_iter().collect());
        self
    }

    pub fn derived(mut self, ids: impl IntoIterator<Item = T>) -> Self {
        self.derived = Some(ids.into_iter().collect());
        self
    }

    fn resolve(self, dimension: &'static str) -> Result<Option<BTreeSet<T>>, InvalidFilterError> {
        match (self.explicit, self.derived) {
            (Some(explicit), Some(derived)) => {
                if explicit == derived {
                    Ok(Some(explicit))
                } else {
                    Err(InvalidFilterError::ConflictingSelectors {
                        dimension,
                        explicit: explicit.iter().map(|&id| id.into()).collect(),
                        derived: derived.iter().map(|&id| id.into()).collect(),
                    })
                }
            }
            (Some(ids), None) | (None, Some(ids)) => Ok(Some(ids)),
            (None, None) => Ok(None),
        }
    }
}

/// Resolved record filter. `None` on a dimension means wildcard; an empty set
/// is treated as a wildcard as well, matching the request contract.
#[derive(Debug, Clone, Default)]
pub struct AlleleFilter {
    samples: Option<BTreeSet<SampleId>>,
    variants: Option<BTreeSet<VariantId>>,
}

impl AlleleFilter {
    /// Resolve the two request selectors into a filter, rejecting ambiguous
    /// (conflicting) selector pairs.
    pub fn from_selectors(
        samples: Selector<SampleId>,
        variants: Selector<VariantId>,
    ) -> Result<Self, InvalidFilterError> {
        Ok(Self {
            samples: samples.resolve("sample")?,
            variants: variants.resolve("variant")?,
        })
    }

    pub fn sample_ids(ids: impl IntoIterator<Item = SampleId>) -> Self {
        Self {
            samples: Some(ids.into_iter().collect()),
            variants: None,
        }
    }

    pub fn variant_ids(ids: impl IntoIterator<Item = VariantId>) -> Self {
        Self {
            samples: None,
            variants: Some(ids.into_iter().collect()),
        }
    }

    pub fn variant_objects<'a>(variants: impl IntoIterator<Item = &'a Variant>) -> Self {
        Self::variant_ids(variants.into_iter().map(|v| v.id))
    }

    /// Restrict the variant dimension to the intersection with `scope`
    /// (used for panel-scoped requests). A wildcard dimension narrows to the
    /// scope itself.
    pub fn intersect_variants(mut self, scope: &BTreeSet<VariantId>) -> Self {
        self.variants = match self.variants.take() {
            Some(ids) if !ids.is_empty() => Some(ids.intersection(scope).copied().collect()),
            _ => Some(scope.clone()),
        };
        self
    }

    /// Explicitly selected variant ids, if the dimension is not a wildcard.
    pub fn selected_variants(&self) -> Option<&BTreeSet<VariantId>> {
        self.variants.as_ref().filter(|ids| !ids.is_empty())
    }

    pub fn selected_samples(&self) -> Option<&BTreeSet<SampleId>> {
        self.samples.as_ref().filter(|ids| !ids.is_empty())
    }

    pub fn is_wildcard(&self) -> bool {
        self.selected_samples().is_none() && self.selected_variants().is_none()
    }

    pub fn matches(&self, record: &AlleleDepthRecord) -> bool {
        if let Some(samples) = self.selected_samples() {
            if !samples.contains(&record.sample_id) {
                return false;
            }
        }
        if let Some(variants) = self.selected_variants() {
            if !variants.contains(&record.variant_id) {
                return false;
            }
        }
        true
    }

    /// Lazily select matching records from an iterator.
    pub fn apply<'a, I>(&'a self, records: I) -> impl Iterator<Item = &'a AlleleDepthRecord>
    where
        I: IntoIterator<Item = &'a AlleleDepthRecord> + 'a,
    {
        records.into_iter().filter(move |r| self.matches(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sample_id: SampleId, variant_id: VariantId) -> AlleleDepthRecord {
        AlleleDepthRecord {
            sample_id,
            variant_id,
            alignmentmap_id: 1,
            call: 'N',
            depth_a: 10,
            depth_c: 0,
            depth_g: 0,
            depth_t: 0,
            depth_other: 0,
        }
    }

    #[test]
    fn wildcard_matches_everything() {
        let filter = AlleleFilter::default();
        assert!(filter.is_wildcard());
        assert!(filter.matches(&record(1, 1)));
        assert!(filter.matches(&record(99, 99)));
    }

    #[test]
    fn empty_id_set_is_wildcard() {
        let filter = AlleleFilter::sample_ids([]);
        assert!(filter.matches(&record(42, 1)));
    }

    #[test]
    fn filters_both_dimensions() {
        let filter = AlleleFilter::from_selectors(
            Selector::default().ids([1, 2]),
            Selector::default().ids([7]),
        )
        .unwrap();
        assert!(filter.matches(&record(1, 7)));
        assert!(filter.matches(&record(2, 7)));
        assert!(!filter.matches(&record(3, 7)));
        assert!(!filter.matches(&record(1, 8)));
    }

    #[test]
    fn agreeing_selector_pair_is_accepted() {
        let filter = AlleleFilter::from_selectors(
            Selector::default().ids([1, 2]).derived([2, 1]),
            Selector::default(),
        )
        .unwrap();
        assert!(filter.matches(&record(1, 5)));
        assert!(!filter.matches(&record(3, 5)));
    }

    #[test]
    fn variant_objects_derive_ids() {
        let variants = vec![
            Variant {
                id: 7,
                code: "crt-76".to_string(),
                chrom: "Pf3D7_07".to_string(),
                position: 403_625,
                ref_base: 'A',
                alt_base: 'T',
                gene: "crt".to_string(),
                aachange: "K76T".to_string(),
            },
        ];
        let filter = AlleleFilter::variant_objects(&variants);
        assert!(filter.matches(&record(1, 7)));
        assert!(!filter.matches(&record(1, 8)));
    }

    #[test]
    fn conflicting_selector_pair_is_rejected() {
        let err = AlleleFilter::from_selectors(
            Selector::default().ids([1]).derived([2]),
            Selector::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            InvalidFilterError::ConflictingSelectors {
                dimension: "sample",
                ..
            }
        ));
    }

    #[test]
    fn panel_scope_intersects_explicit_variants() {
        let scope = BTreeSet::from([7, 8, 9]);
        let filter = AlleleFilter::variant_ids([8, 10]).intersect_variants(&scope);
        assert_eq!(filter.selected_variants(), Some(&BTreeSet::from([8])));

        let widened = AlleleFilter::default().intersect_variants(&scope);
        assert_eq!(widened.selected_variants(), Some(&scope));
    }

    #[test]
    fn apply_is_lazy_over_borrowed_records() {
        let records = vec![record(1, 7), record(2, 7), record(1, 8)];
        let filter = AlleleFilter::sample_ids([1]);
        let selected: Vec<_> = filter.apply(&records).collect();
        assert_eq!(selected.len(), 2);
    }
}
