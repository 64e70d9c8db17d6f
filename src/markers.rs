//! Marker domain model: variants, regions, and the panels that group them.
//!
//! Variant definitions are loaded from a tab-delimited marker table and
//! indexed by id for reference/alt lookup during calling. Panels are loaded
//! from a JSON catalog and used to scope requests to a named set of variants.

use std::collections::{BTreeSet, HashMap};
use std::io::BufRead;
use std::num::ParseIntError;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type VariantId = u32;
pub type RegionId = u32;
pub type PanelId = u32;

/// A variant is a single-base SNP position to be analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub code: String,
    pub chrom: String,
    pub position: u64,
    pub ref_base: char,
    pub alt_base: char,
    pub gene: String,
    pub aachange: String,
}

impl Variant {
    pub fn ref_alt(&self) -> (char, char) {
        (self.ref_base, self.alt_base)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Assay,
    Analysis,
}

/// A region is either an assay region or an analysis region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub code: String,
    pub kind: RegionKind,
    pub chrom: String,
    pub begin: u64,
    pub end: u64,
    pub species: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelType {
    Set,
    Analysis,
    Assay,
    Microhap,
}

/// A panel is a named, versioned grouping of variants and regions for a
/// sequencing assay, e.g. SPOTMAL/DRG (set SPOTMAL, analysis DRG).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Panel {
    pub id: PanelId,
    pub code: String,
    pub kind: PanelType,
    pub species: String,
    #[serde(default)]
    pub remark: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_panel: Option<PanelId>,
    #[serde(default)]
    pub variants: BTreeSet<VariantId>,
    #[serde(default)]
    pub regions: BTreeSet<RegionId>,
}

/// Errors raised while parsing one line of the marker table.
#[derive(Debug, Error)]
pub enum MarkerParseError {
    #[error("expected eight tab- or space-delimited fields, found {0}")]
    FieldCount(usize),
    #[error("invalid variant id: {0}")]
    InvalidId(ParseIntError),
    #[error("invalid position: {0}")]
    InvalidPosition(ParseIntError),
    #[error("invalid {0} base '{1}', expected one of A/C/G/T")]
    InvalidBase(&'static str, String),
    #[error("duplicate variant id {0}")]
    DuplicateId(VariantId),
    #[error("duplicate variant code '{0}'")]
    DuplicateCode(String),
}

/// Index of variant definitions for fast ref/alt lookup by id.
#[derive(Debug, Default, Clone)]
pub struct VariantIndex {
    variants: HashMap<VariantId, Variant>,
    by_code: HashMap<String, VariantId>,
}

impl VariantIndex {
    /// Load a variant index from a marker table file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open marker table {}", path.display()))?;
        let mut index = Self::default();
        let mut line_no = 0u64;
        for line in std::io::BufReader::new(file).lines() {
            let line = line?;
            line_no += 1;
            let trimmed = line.trim_end_matches(&['\n', '\r'][..]);
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let variant = parse_marker_line(trimmed)
                .with_context(|| format!("marker table line {line_no}"))?;
            index
                .insert(variant)
                .with_context(|| format!("marker table line {line_no}"))?;
        }
        tracing::info!("loaded {} variant definitions", index.len());
        Ok(index)
    }

    pub fn from_variants(variants: impl IntoIterator<Item = Variant>) -> Result<Self> {
        let mut index = Self::default();
        for variant in variants {
            index.insert(variant)?;
        }
        Ok(index)
    }

    fn insert(&mut self, variant: Variant) -> Result<(), MarkerParseError> {
        if self.variants.contains_key(&variant.id) {
            return Err(MarkerParseError::DuplicateId(variant.id));
        }
        if self.by_code.contains_key(&variant.code) {
            return Err(MarkerParseError::DuplicateCode(variant.code.clone()));
        }
        self.by_code.insert(variant.code.clone(), variant.id);
        self.variants.insert(variant.id, variant);
        Ok(())
    }

    pub fn get(&self, id: VariantId) -> Option<&Variant> {
        self.variants.get(&id)
    }

    pub fn by_code(&self, code: &str) -> Option<&Variant> {
        self.by_code.get(code).and_then(|id| self.variants.get(id))
    }

    /// Reference and alternate bases for a variant, if it is defined.
    pub fn ref_alt(&self, id: VariantId) -> Option<(char, char)> {
        self.variants.get(&id).map(Variant::ref_alt)
    }

    pub fn ids(&self) -> impl Iterator<Item = VariantId> + '_ {
        self.variants.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

fn parse_marker_line(line: &str) -> Result<Variant, MarkerParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 8 {
        return Err(MarkerParseError::FieldCount(fields.len()));
    }

    let id = fields[0]
        .parse::<u32>()
        .map_err(MarkerParseError::InvalidId)?;
    let position = fields[3]
        .parse::<u64>()
        .map_err(MarkerParseError::InvalidPosition)?;

    Ok(Variant {
        id,
        code: fields[1].to_string(),
        chrom: fields[2].to_string(),
        position,
        ref_base: parse_base(fields[4], "ref")?,
        alt_base: parse_base(fields[5], "alt")?,
        gene: fields[6].to_string(),
        aachange: fields[7].to_string(),
    })
}

fn parse_base(field: &str, name: &'static str) -> Result<char, MarkerParseError> {
    let mut chars = field.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if matches!(c.to_ascii_uppercase(), 'A' | 'C' | 'G' | 'T') => {
            Ok(c.to_ascii_uppercase())
        }
        _ => Err(MarkerParseError::InvalidBase(name, field.to_string())),
    }
}

/// Catalog of panels and regions, loaded from a JSON file.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PanelCatalog {
    #[serde(default)]
    pub panels: Vec<Panel>,
    #[serde(default)]
    pub regions: Vec<Region>,
}

impl PanelCatalog {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open panel catalog {}", path.display()))?;
        let catalog: PanelCatalog = serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("failed to parse panel catalog {}", path.display()))?;
        tracing::info!(
            panels = catalog.panels.len(),
            regions = catalog.regions.len(),
            "loaded panel catalog",
        );
        Ok(catalog)
    }

    /// All panels, ordered by code.
    pub fn get_panels(&self) -> Vec<&Panel> {
        let mut panels: Vec<&Panel> = self.panels.iter().collect();
        panels.sort_by(|a, b| a.code.cmp(&b.code));
        panels
    }

    pub fn get_panels_by_ids(&self, ids: &[PanelId]) -> Vec<&Panel> {
        let mut panels: Vec<&Panel> = self
            .panels
            .iter()
            .filter(|p| ids.contains(&p.id))
            .collect();
        panels.sort_by(|a, b| a.code.cmp(&b.code));
        panels
    }

    pub fn panel_by_code(&self, code: &str) -> Option<&Panel> {
        self.panels.iter().find(|p| p.code == code)
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }
}
