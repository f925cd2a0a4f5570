//! Rectangular zones
//!
//! A zone is an inclusive rectangular block of cells on a single sheet.
//! Validation rules target zones, and the sort engine operates on exactly
//! one zone at a time.

use serde::{Deserialize, Serialize};

/// Inclusive rectangular range of cells: rows `top..=bottom`, columns
/// `left..=right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Zone {
    pub top: usize,
    pub left: usize,
    pub bottom: usize,
    pub right: usize,
}

/// A range whose corners are inverted or otherwise unusable. Entry points
/// that take a zone reject these with no mutation performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MalformedRange;

impl std::fmt::Display for MalformedRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed range")
    }
}

impl std::error::Error for MalformedRange {}

impl Zone {
    /// Build a zone, rejecting inverted corners.
    pub fn new(top: usize, left: usize, bottom: usize, right: usize) -> Result<Zone, MalformedRange> {
        if bottom < top || right < left {
            return Err(MalformedRange);
        }
        Ok(Zone { top, left, bottom, right })
    }

    /// Single-cell zone.
    pub fn cell(row: usize, col: usize) -> Zone {
        Zone { top: row, left: col, bottom: row, right: col }
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.top && row <= self.bottom && col >= self.left && col <= self.right
    }

    pub fn intersects(&self, other: &Zone) -> bool {
        self.top <= other.bottom
            && other.top <= self.bottom
            && self.left <= other.right
            && other.left <= self.right
    }

    pub fn row_count(&self) -> usize {
        self.bottom - self.top + 1
    }

    pub fn col_count(&self) -> usize {
        self.right - self.left + 1
    }

    pub fn area(&self) -> usize {
        self.row_count() * self.col_count()
    }

    pub fn is_single_cell(&self) -> bool {
        self.area() == 1
    }

    /// Smallest zone covering both `self` and `other`.
    pub fn union_bounding(&self, other: &Zone) -> Zone {
        Zone {
            top: self.top.min(other.top),
            left: self.left.min(other.left),
            bottom: self.bottom.max(other.bottom),
            right: self.right.max(other.right),
        }
    }
}

/// Smallest zone covering every zone in the slice. `None` for an empty slice.
pub fn bounding_zone(zones: &[Zone]) -> Option<Zone> {
    let mut iter = zones.iter();
    let first = *iter.next()?;
    Some(iter.fold(first, |acc, z| acc.union_bounding(z)))
}

/// True when the union of `zones` forms one unbroken rectangular region.
///
/// Filter and sort actions require a continuous selection: they refuse to
/// operate on a selection with holes or disjoint islands. Checked by
/// coordinate compression: the union is continuous exactly when every
/// elementary sub-rectangle of the bounding box is covered by some zone.
pub fn are_zones_continuous(zones: &[Zone]) -> bool {
    let Some(bounds) = bounding_zone(zones) else {
        return false;
    };
    if zones.len() == 1 {
        return true;
    }

    // Elementary row/col band boundaries.
    let mut row_cuts: Vec<usize> = vec![bounds.top, bounds.bottom + 1];
    let mut col_cuts: Vec<usize> = vec![bounds.left, bounds.right + 1];
    for z in zones {
        row_cuts.push(z.top);
        row_cuts.push(z.bottom + 1);
        col_cuts.push(z.left);
        col_cuts.push(z.right + 1);
    }
    row_cuts.sort_unstable();
    row_cuts.dedup();
    col_cuts.sort_unstable();
    col_cuts.dedup();

    // Every elementary band intersection must be covered.
    for rw in row_cuts.windows(2) {
        for cw in col_cuts.windows(2) {
            let (row, col) = (rw[0], cw[0]);
            if !zones.iter().any(|z| z.contains(row, col)) {
                return false;
            }
        }
    }
    true
}
