//! SWC skeleton import.
//!
//! SWC files are whitespace-separated rows of
//! `(id, kind, x, y, z, radius, parent_id)` with `#` comment lines. Ids
//! must start at 1 and be consecutive; a new chain starts wherever
//! `id != parent_id + 1`. Single-sample chains load as circle masks,
//! longer chains as branch masks.

use std::fs;
use std::path::Path;

use roitrace_core::{Branch, BranchMask, CircleMask, Mask, MaskKind, NameAllocator, Point, Sample};

use crate::error::{Error, Result};

/// One row of an SWC skeleton file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwcRow {
    /// Sample id, 1-based and consecutive.
    pub id: i64,
    /// Structure kind tag (soma, dendrite, ...), carried but unused.
    pub kind: i64,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
    /// Local radius.
    pub radius: f64,
    /// Parent sample id, -1 for roots.
    pub parent_id: i64,
}

/// A parsed and validated SWC skeleton.
#[derive(Debug, Clone)]
pub struct SwcFile {
    rows: Vec<SwcRow>,
}

impl SwcFile {
    /// Reads and parses an SWC file.
    ///
    /// # Errors
    /// Returns I/O errors and [`Error::InvalidFormat`] for malformed rows
    /// or an invalid id sequence.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Parses SWC text.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] for malformed rows or an invalid
    /// id sequence.
    pub fn parse(text: &str) -> Result<Self> {
        let mut rows = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 7 {
                return Err(Error::InvalidFormat(format!(
                    "line {}: expected 7 fields, got {}",
                    lineno + 1,
                    fields.len()
                )));
            }
            rows.push(SwcRow {
                id: parse_field(fields[0], lineno)?,
                kind: parse_field(fields[1], lineno)?,
                x: parse_field(fields[2], lineno)?,
                y: parse_field(fields[3], lineno)?,
                z: parse_field(fields[4], lineno)?,
                radius: parse_field(fields[5], lineno)?,
                parent_id: parse_field(fields[6], lineno)?,
            });
        }

        if rows.is_empty() {
            return Err(Error::InvalidFormat("SWC file holds no samples".to_string()));
        }
        if rows[0].id != 1 {
            return Err(Error::InvalidFormat(
                "SWC id ordering needs to start with 1".to_string(),
            ));
        }
        if rows.windows(2).any(|w| w[1].id != w[0].id + 1) {
            return Err(Error::InvalidFormat(
                "SWC ids need to be consecutive".to_string(),
            ));
        }

        Ok(Self { rows })
    }

    /// The validated rows.
    #[must_use]
    pub fn rows(&self) -> &[SwcRow] {
        &self.rows
    }

    /// Number of root chains (`parent_id == -1`).
    #[must_use]
    pub fn nroots(&self) -> usize {
        self.rows.iter().filter(|r| r.parent_id == -1).count()
    }

    /// The sample chains: consecutive row runs split wherever
    /// `id != parent_id + 1`.
    #[must_use]
    pub fn chains(&self) -> Vec<&[SwcRow]> {
        let mut out = Vec::new();
        let mut last = 0usize;
        for i in 0..self.rows.len() {
            if self.rows[i].id != self.rows[i].parent_id + 1 && i != last {
                out.push(&self.rows[last..i]);
                last = i;
            }
        }
        out.push(&self.rows[last..]);
        out
    }
}

/// Converts the skeleton's chains into masks: circle masks for
/// single-sample chains, branch masks otherwise.
///
/// # Errors
/// Propagates geometry errors (coincident samples, non-positive radii).
pub fn masks_from_swc(swc: &SwcFile, names: &mut NameAllocator) -> Result<Vec<Mask>> {
    let mut masks = Vec::new();
    for chain in swc.chains() {
        if chain.len() > 1 {
            let samples: Vec<Sample> = chain
                .iter()
                .map(|r| Sample::new(r.x, r.y, r.z, r.radius))
                .collect();
            let branch = Branch::new(samples)?;
            let mask = BranchMask::new(names.allocate(MaskKind::Branch), branch)?;
            masks.push(mask.into());
        } else if let Some(row) = chain.first() {
            let mask = CircleMask::new(
                names.allocate(MaskKind::Circle),
                Point::new(row.x, row.y),
                row.radius,
            )?;
            masks.push(mask.into());
        }
    }
    Ok(masks)
}

fn parse_field<T: std::str::FromStr>(field: &str, lineno: usize) -> Result<T> {
    field.parse().map_err(|_| {
        Error::InvalidFormat(format!(
            "line {}: cannot parse field {field:?}",
            lineno + 1
        ))
    })
}
