use std::collections::HashMap;

use clap::ValueEnum;

use crate::calling::CallResult;
use crate::depth::SampleId;
use crate::markers::VariantId;

/// Which dimension forms the rows of an output table.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum Orientation {
    /// Rows are samples, columns are variants.
    Sample,
    /// Rows are variants, columns are samples.
    Variant,
}

impl Orientation {
    pub fn row_label(&self) -> &'static str {
        match self {
            Orientation::Sample => "sample",
            Orientation::Variant => "variant",
        }
    }
}

/// A 2-D table over (sample, variant) pairs in a chosen orientation.
///
/// Cells exist only for pairs present in the input; absent pairs render as
/// the caller's missing-value marker. Row and column ids are kept sorted
/// ascending so output is stable across runs.
#[derive(Debug, Clone)]
pub struct PivotTable<V> {
    orientation: Orientation,
    row_ids: Vec<u32>,
    col_ids: Vec<u32>,
    cells: HashMap<(u32, u32), V>,
}

pub type CallTable = PivotTable<CallResult>;
pub type AltCountTable = PivotTable<u8>;

impl<V> PivotTable<V> {
    pub fn from_cells(
        orientation: Orientation,
        cells: impl IntoIterator<Item = ((SampleId, VariantId), V)>,
    ) -> Self {
        let mut table_cells = HashMap::new();
        let mut row_ids = Vec::new();
        let mut col_ids = Vec::new();

        for ((sample_id, variant_id), value) in cells {
            let (row, col) = match orientation {
                Orientation::Sample => (sample_id, variant_id),
                Orientation::Variant => (variant_id, sample_id),
            };
            table_cells.insert((row, col), value);
            row_ids.push(row);
            col_ids.push(col);
        }

        row_ids.sort_unstable();
        row_ids.dedup();
        col_ids.sort_unstable();
        col_ids.dedup();

        Self {
            orientation,
            row_ids,
            col_ids,
            cells: table_cells,
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn row_ids(&self) -> &[u32] {
        &self.row_ids
    }

    pub fn col_ids(&self) -> &[u32] {
        &self.col_ids
    }

    pub fn get(&self, row: u32, col: u32) -> Option<&V> {
        self.cells.get(&(row, col))
    }

    /// Cell lookup in (sample, variant) terms, independent of orientation.
    pub fn get_pair(&self, sample_id: SampleId, variant_id: VariantId) -> Option<&V> {
        match self.orientation {
            Orientation::Sample => self.get(sample_id, variant_id),
            Orientation::Variant => self.get(variant_id, sample_id),
        }
    }

    /// All present cells as (sample, variant, value) triples, normalized
    /// out of the table orientation. Ordering follows row-major table order.
    pub fn entries(&self) -> Vec<(SampleId, VariantId, &V)> {
        let mut entries = Vec::with_capacity(self.cells.len());
        for &row in &self.row_ids {
            for &col in &self.col_ids {
                if let Some(value) = self.cells.get(&(row, col)) {
                    let (sample_id, variant_id) = match self.orientation {
                        Orientation::Sample => (row, col),
                        Orientation::Variant => (col, row),
                    };
                    entries.push((sample_id, variant_id, value));
                }
            }
        }
        entries
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calling::CallResult;

    fn sample_cells() -> Vec<((SampleId, VariantId), CallResult)> {
        vec![
            ((2, 7), CallResult::Homozygous('A')),
            ((1, 8), CallResult::Heterozygous('A', 'T')),
            ((1, 7), CallResult::NoCall),
        ]
    }

    #[test]
    fn ids_are_sorted_and_deduplicated() {
        let table = PivotTable::from_cells(Orientation::Sample, sample_cells());
        assert_eq!(table.row_ids(), &[1, 2]);
        assert_eq!(table.col_ids(), &[7, 8]);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn variant_orientation_transposes() {
        let table = PivotTable::from_cells(Orientation::Variant, sample_cells());
        assert_eq!(table.row_ids(), &[7, 8]);
        assert_eq!(table.col_ids(), &[1, 2]);
        assert_eq!(
            table.get(8, 1),
            Some(&CallResult::Heterozygous('A', 'T'))
        );
    }

    #[test]
    fn get_pair_ignores_orientation() {
        for orientation in [Orientation::Sample, Orientation::Variant] {
            let table = PivotTable::from_cells(orientation, sample_cells());
            assert_eq!(table.get_pair(2, 7), Some(&CallResult::Homozygous('A')));
            assert_eq!(table.get_pair(2, 8), None);
        }
    }

    #[test]
    fn entries_are_orientation_independent() {
        let by_sample = PivotTable::from_cells(Orientation::Sample, sample_cells());
        let by_variant = PivotTable::from_cells(Orientation::Variant, sample_cells());

        let mut a: Vec<_> = by_sample
            .entries()
            .into_iter()
            .map(|(s, v, c)| (s, v, *c))
            .collect();
        let mut b: Vec<_> = by_variant
            .entries()
            .into_iter()
            .map(|(s, v, c)| (s, v, *c))
            .collect();
        a.sort_by_key(|&(s, v, _)| (s, v));
        b.sort_by_key(|&(s, v, _)| (s, v));
        assert_eq!(a, b);
    }

    #[test]
    fn missing_pair_is_none_not_panic() {
        let table = PivotTable::from_cells(Orientation::Sample, sample_cells());
        assert_eq!(table.get(2, 8), None);
        assert_eq!(table.get(999, 999), None);
    }
}
