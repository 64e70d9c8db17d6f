//! Depth-based SNP call decision.
//!
//! A call is made from the pooled per-base read depths of one
//! (sample, variant) pair. `mindepth` gates whether any call is attempted;
//! heterozygosity is decided either by the minor/major depth ratio
//! (`hetratio >= 0`) or by a minimum minor-allele depth (`hetratio == -1`).

use std::fmt;

use thiserror::Error;

use crate::depth::AlleleDepthRecord;

/// Base priority order used to break depth ties deterministically.
pub const BASES: [char; 4] = ['A', 'C', 'G', 'T'];

/// Sentinel for "use the count-based `hetmindepth` rule instead of the ratio".
pub const HETRATIO_DISABLED: f64 = -1.0;

/// Thresholds governing the call decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallingParams {
    /// Minor/major depth ratio above which a pair is called heterozygous.
    /// `-1` disables the ratio rule in favor of `hetmindepth`.
    pub hetratio: f64,
    /// Minimum total depth (four base counts) to attempt any call.
    pub mindepth: u32,
    /// Minimum minor-allele depth for a heterozygous call when the ratio
    /// rule is disabled.
    pub hetmindepth: u32,
}

impl Default for CallingParams {
    fn default() -> Self {
        Self {
            hetratio: HETRATIO_DISABLED,
            mindepth: 5,
            hetmindepth: 2,
        }
    }
}

/// Malformed threshold parameters, rejected before any record is processed.
#[derive(Debug, Error, PartialEq)]
pub enum InvalidThresholdError {
    #[error("hetratio must be -1 or within [0, 1], got {0}")]
    HetRatio(f64),
}

impl CallingParams {
    pub fn validate(&self) -> Result<(), InvalidThresholdError> {
        // mindepth/hetmindepth are unsigned, so only the ratio can be out of
        // range here.
        let valid = self.hetratio == HETRATIO_DISABLED
            || (0.0..=1.0).contains(&self.hetratio);
        if valid {
            Ok(())
        } else {
            Err(InvalidThresholdError::HetRatio(self.hetratio))
        }
    }

    pub fn ratio_rule_enabled(&self) -> bool {
        self.hetratio >= 0.0
    }
}

/// Genotype call for one (sample, variant) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallResult {
    /// Insufficient or absent coverage.
    NoCall,
    Homozygous(char),
    /// Major allele first, minor allele second.
    Heterozygous(char, char),
}

impl CallResult {
    pub fn is_call(&self) -> bool {
        !matches!(self, CallResult::NoCall)
    }

    /// Bases this call asserts, major first.
    pub fn bases(&self) -> Vec<char> {
        match *self {
            CallResult::NoCall => Vec::new(),
            CallResult::Homozygous(base) => vec![base],
            CallResult::Heterozygous(major, minor) => vec![major, minor],
        }
    }

    /// Number of non-reference allele copies implied by this call, under a
    /// biallelic model: homozygous counts as two copies, heterozygous as one
    /// per distinct called base. `None` for `NoCall`.
    pub fn alt_count(&self, ref_base: char) -> Option<u8> {
        match *self {
            CallResult::NoCall => None,
            CallResult::Homozygous(base) => Some(if base == ref_base { 0 } else { 2 }),
            CallResult::Heterozygous(major, minor) => {
                Some(u8::from(major != ref_base) + u8::from(minor != ref_base))
            }
        }
    }
}

impl fmt::Display for CallResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CallResult::NoCall => write!(f, "."),
            CallResult::Homozygous(base) => write!(f, "{base}"),
            CallResult::Heterozygous(major, minor) => write!(f, "{major}/{minor}"),
        }
    }
}

/// Pooled per-base read depths for one (sample, variant) pair. Depths from
/// multiple alignment runs of the same pair are summed before calling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PooledDepths {
    pub a: u32,
    pub c: u32,
    pub g: u32,
    pub t: u32,
}

impl PooledDepths {
    pub fn add_record(&mut self, record: &AlleleDepthRecord) {
        self.a += record.depth_a;
        self.c += record.depth_c;
        self.g += record.depth_g;
        self.t += record.depth_t;
    }

    pub fn total(&self) -> u32 {
        self.a + self.c + self.g + self.t
    }

    pub fn depth_of(&self, base: char) -> u32 {
        match base {
            'A' => self.a,
            'C' => self.c,
            'G' => self.g,
            'T' => self.t,
            _ => 0,
        }
    }

    /// Bases with their depths, sorted by descending depth. Ties keep the
    /// A > C > G > T priority order, so the result is deterministic.
    fn ranked(&self) -> [(char, u32); 4] {
        let mut ranked = [('A', self.a), ('C', self.c), ('G', self.g), ('T', self.t)];
        // Stable sort preserves the priority order among equal depths.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }
}

impl From<&AlleleDepthRecord> for PooledDepths {
    fn from(record: &AlleleDepthRecord) -> Self {
        let mut depths = Self::default();
        depths.add_record(record);
        depths
    }
}

/// Decide the genotype call for one pooled depth profile.
pub fn call_genotype(depths: PooledDepths, params: &CallingParams) -> CallResult {
    let total = depths.total();
    if total < params.mindepth || total == 0 {
        return CallResult::NoCall;
    }

    let ranked = depths.ranked();
    let (major_base, major) = ranked[0];
    let (minor_base, minor) = ranked[1];

    if minor == 0 {
        return CallResult::Homozygous(major_base);
    }

    let heterozygous = if params.ratio_rule_enabled() {
        f64::from(minor) / f64::from(major) >= params.hetratio
    } else {
        minor >= params.hetmindepth
    };

    if heterozygous {
        CallResult::Heterozygous(major_base, minor_base)
    } else {
        CallResult::Homozygous(major_base)
    }
}
