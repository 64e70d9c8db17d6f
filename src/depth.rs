use std::{
    fmt,
    io::{self, BufRead},
    num::ParseIntError,
};

use thiserror::Error;

use crate::markers::VariantId;

pub type SampleId = u32;
pub type AlignmentMapId = u32;

/// One allele depth observation: a single sample x variant x alignment run.
///
/// The (sample, variant, alignment map) triple is the natural key; upstream
/// storage guarantees at most one record per triple.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AlleleDepthRecord {
    pub sample_id: SampleId,
    pub variant_id: VariantId,
    pub alignmentmap_id: AlignmentMapId,
    /// Consensus call stored by the upstream pipeline. Advisory only; calls
    /// are always recomputed from the depth counts.
    pub call: char,
    pub depth_a: u32,
    pub depth_c: u32,
    pub depth_g: u32,
    pub depth_t: u32,
    /// Indel and ambiguous reads. Excluded from SNP calling.
    pub depth_other: u32,
}

impl AlleleDepthRecord {
    /// Total SNP depth: the four base counts, excluding `depth_other`.
    pub fn total_depth(&self) -> u32 {
        self.depth_a + self.depth_c + self.depth_g + self.depth_t
    }

    pub fn depth_of(&self, base: char) -> u32 {
        match base.to_ascii_uppercase() {
            'A' => self.depth_a,
            'C' => self.depth_c,
            'G' => self.depth_g,
            'T' => self.depth_t,
            _ => 0,
        }
    }

    pub fn is_covered(&self) -> bool {
        self.total_depth() > 0
    }
}

/// Iterator over allele depth records in a tab-delimited depth file.
pub struct Reader<R> {
    inner: R,
    line: u64,
    buf: String,
}

impl<R> Reader<R>
where
    R: BufRead,
{
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: 0,
            buf: String::new(),
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R> Iterator for Reader<R>
where
    R: BufRead,
{
    type Item = Result<AlleleDepthRecord, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.inner.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line += 1;
                    let trimmed = self.buf.trim_end_matches(&['\n', '\r'][..]);
                    if trimmed.is_empty() || trimmed.starts_with('#') {
                        continue;
                    }

                    return Some(parse_record(trimmed).map_err(|kind| ParseError {
                        line: self.line,
                        raw: trimmed.to_string(),
                        kind,
                    }));
                }
                Err(e) => {
                    return Some(Err(ParseError {
                        line: self.line,
                        raw: String::new(),
                        kind: ParseErrorKind::Io(e),
                    }));
                }
            }
        }
    }
}

/// Errors that can arise while parsing an allele depth record.
#[derive(Debug, Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub line: u64,
    pub raw: String,
    #[source]
    pub kind: ParseErrorKind,
}

#[derive(Debug, Error)]
pub enum ParseErrorKind {
    #[error("I/O error")]
    Io(#[from] io::Error),
    #[error("expected nine tab- or space-delimited fields, found {0}")]
    FieldCount(usize),
    #[error("invalid {0} id: {1}")]
    InvalidId(&'static str, ParseIntError),
    #[error("invalid call field '{0}', expected a single character")]
    InvalidCall(String),
    #[error("invalid {0} depth: {1}")]
    InvalidDepth(&'static str, ParseIntError),
}

fn parse_record(line: &str) -> Result<AlleleDepthRecord, ParseErrorKind> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 9 {
        return Err(ParseErrorKind::FieldCount(fields.len()));
    }

    let parse_id = |field: &str, name| {
        field
            .parse::<u32>()
            .map_err(|e| ParseErrorKind::InvalidId(name, e))
    };
    let parse_depth = |field: &str, name| {
        field
            .parse::<u32>()
            .map_err(|e| ParseErrorKind::InvalidDepth(name, e))
    };

    let sample_id = parse_id(fields[0], "sample")?;
    let variant_id = parse_id(fields[1], "variant")?;
    let alignmentmap_id = parse_id(fields[2], "alignment map")?;

    let mut call_chars = fields[3].chars();
    let call = match (call_chars.next(), call_chars.next()) {
        (Some(c), None) => c.to_ascii_uppercase(),
        _ => return Err(ParseErrorKind::InvalidCall(fields[3].to_string())),
    };

    Ok(AlleleDepthRecord {
        sample_id,
        variant_id,
        alignmentmap_id,
        call,
        depth_a: parse_depth(fields[4], "A")?,
        depth_c: parse_depth(fields[5], "C")?,
        depth_g: parse_depth(fields[6], "G")?,
        depth_t: parse_depth(fields[7], "T")?,
        depth_other: parse_depth(fields[8], "other")?,
    })
}

impl fmt::Display for AlleleDepthRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.sample_id,
            self.variant_id,
            self.alignmentmap_id,
            self.call,
            self.depth_a,
            self.depth_c,
            self.depth_g,
            self.depth_t,
            self.depth_other
        )
    }
}
