use std::{fs::File, io::BufWriter, path::Path};

use anyhow::{Context, Result};

use crate::calling::CallResult;
use crate::table::{AltCountTable, CallTable, PivotTable};

/// Default marker for missing cells.
pub const MISSING: &str = ".";

/// Write a call table as TSV: one header row, then one row per row id.
/// `NoCall` cells and absent pairs both render as the missing marker.
pub fn write_call_table<W: std::io::Write>(
    writer: W,
    table: &CallTable,
    missing: &str,
) -> std::io::Result<()> {
    write_table(writer, table, missing, |call| match call {
        CallResult::NoCall => None,
        other => Some(other.to_string()),
    })
}

/// Write an alt-count table as TSV.
pub fn write_alt_count_table<W: std::io::Write>(
    writer: W,
    table: &AltCountTable,
    missing: &str,
) -> std::io::Result<()> {
    write_table(writer, table, missing, |count| Some(count.to_string()))
}

pub fn write_call_table_file<P: AsRef<Path>>(
    path: P,
    table: &CallTable,
    missing: &str,
) -> Result<()> {
    let path = path.as_ref();
    let writer = File::create(path)
        .map(BufWriter::new)
        .with_context(|| format!("failed to create output {}", path.display()))?;
    write_call_table(writer, table, missing).context("failed to write call table")
}

pub fn write_alt_count_table_file<P: AsRef<Path>>(
    path: P,
    table: &AltCountTable,
    missing: &str,
) -> Result<()> {
    let path = path.as_ref();
    let writer = File::create(path)
        .map(BufWriter::new)
        .with_context(|| format!("failed to create output {}", path.display()))?;
    write_alt_count_table(writer, table, missing).context("failed to write alt-count table")
}

fn write_table<W, V>(
    mut writer: W,
    table: &PivotTable<V>,
    missing: &str,
    mut render: impl FnMut(&V) -> Option<String>,
) -> std::io::Result<()>
where
    W: std::io::Write,
{
    write!(writer, "{}", table.orientation().row_label())?;
    for col in table.col_ids() {
        write!(writer, "\t{col}")?;
    }
    writeln!(writer)?;

    for &row in table.row_ids() {
        write!(writer, "{row}")?;
        for &col in table.col_ids() {
            let cell = table.get(row, col).and_then(&mut render);
            write!(writer, "\t{}", cell.as_deref().unwrap_or(missing))?;
        }
        writeln!(writer)?;
    }

    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Orientation;

    #[test]
    fn call_table_renders_missing_and_het() {
        let table = PivotTable::from_cells(
            Orientation::Sample,
            vec![
                ((1, 7), CallResult::Homozygous('A')),
                ((1, 8), CallResult::Heterozygous('A', 'T')),
                ((2, 7), CallResult::NoCall),
            ],
        );

        let mut out = Vec::new();
        write_call_table(&mut out, &table, MISSING).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "sample\t7\t8\n1\tA\tA/T\n2\t.\t.\n");
    }

    #[test]
    fn alt_count_table_renders_counts() {
        let table = PivotTable::from_cells(
            Orientation::Variant,
            vec![((1, 7), 0u8), ((2, 7), 2u8)],
        );

        let mut out = Vec::new();
        write_alt_count_table(&mut out, &table, "NA").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "variant\t1\t2\n7\t0\t2\n");
    }
}
