//! Range sort engine
//!
//! Sorts one rectangular zone at a time, moving whole rows as atomic units:
//! contents, formats, and validation-rule membership travel together so a
//! row's presentation follows its data.
//!
//! Key invariants:
//! - Stable: equal keys keep their original relative row order
//! - Empty cells order after all non-empty cells in both directions
//! - Cells outside the zone never move

use std::cmp::Ordering;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::formula::eval::Value;
use crate::sheet::Sheet;
use crate::zone::{MalformedRange, Zone};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Comparison key for one cell. Variant order is the default type ordering:
/// numbers before text before booleans before errors. `Empty` is special -
/// the engine forces empties last regardless of direction or comparator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey {
    Number(OrderedFloat<f64>),
    Text(String),
    Boolean(bool),
    Error(String),
    Empty,
}

impl SortKey {
    pub fn from_value(value: &Value) -> SortKey {
        match value {
            Value::Number(n) => SortKey::Number(OrderedFloat(*n)),
            // Case-insensitive text ordering
            Value::Text(t) => SortKey::Text(t.to_lowercase()),
            Value::Boolean(b) => SortKey::Boolean(*b),
            Value::Error(e) => SortKey::Error(e.to_string()),
            Value::Empty => SortKey::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, SortKey::Empty)
    }
}

/// Sort `zone` by the anchor's column with the default type ordering.
///
/// A single-cell zone is first expanded to the contiguous table around it.
/// Returns the zone that was actually sorted.
pub fn sort_zone(
    sheet: &mut Sheet,
    zone: Zone,
    anchor: (usize, usize),
    direction: SortDirection,
) -> Result<Zone, MalformedRange> {
    sort_zone_by(sheet, zone, anchor, |a, b| match direction {
        SortDirection::Ascending => a.cmp(b),
        SortDirection::Descending => b.cmp(a),
    })
}

/// Sort `zone` by the anchor's column with a caller-supplied comparator.
///
/// The comparator only ever sees non-empty keys; empty cells always order
/// after all non-empty cells. The sort is stable.
pub fn sort_zone_by<F>(
    sheet: &mut Sheet,
    zone: Zone,
    anchor: (usize, usize),
    compare: F,
) -> Result<Zone, MalformedRange>
where
    F: Fn(&SortKey, &SortKey) -> Ordering,
{
    let zone = if zone.is_single_cell() {
        sheet.expand_to_table(zone.top, zone.left)
    } else {
        zone
    };
    let (anchor_row, anchor_col) = anchor;
    if !zone.contains(anchor_row, anchor_col) {
        return Err(MalformedRange);
    }

    // (key, original row), keys drawn from computed values
    let rows: Vec<usize> = (zone.top..=zone.bottom).collect();
    let keys: Vec<SortKey> = rows
        .iter()
        .map(|&row| SortKey::from_value(&sheet.value(row, anchor_col)))
        .collect();

    let mut non_empty: Vec<usize> = Vec::new();
    let mut empty: Vec<usize> = Vec::new();
    for (i, key) in keys.iter().enumerate() {
        if key.is_empty() {
            empty.push(rows[i]);
        } else {
            non_empty.push(rows[i]);
        }
    }

    // Stable sort; ties keep original row order
    non_empty.sort_by(|&a, &b| compare(&keys[a - zone.top], &keys[b - zone.top]));

    // order[i] = original row whose contents land at zone.top + i
    let order: Vec<usize> = non_empty.into_iter().chain(empty).collect();

    apply_row_order(sheet, zone, &order);
    remap_validation_rows(sheet, zone, &order);
    Ok(zone)
}

/// Move row contents and formats into their sorted positions.
fn apply_row_order(sheet: &mut Sheet, zone: Zone, order: &[usize]) {
    for col in zone.left..=zone.right {
        let column: Vec<_> = order.iter().map(|&row| sheet.take_cell(row, col)).collect();
        for (i, cell) in column.into_iter().enumerate() {
            sheet.put_cell(zone.top + i, col, cell);
        }
    }
}

/// Rewrite validation-rule zones so membership inside the sorted zone
/// follows the rows it covered. Coverage outside the sorted zone's columns
/// or rows is untouched.
fn remap_validation_rows(sheet: &mut Sheet, zone: Zone, order: &[usize]) {
    // dest[original row] = row it moved to
    let mut dest = std::collections::BTreeMap::new();
    for (i, &row) in order.iter().enumerate() {
        dest.insert(row, zone.top + i);
    }

    for rule in sheet.validations.rules_mut() {
        let mut new_zones: Vec<Zone> = Vec::new();
        for rule_zone in rule.zones.drain(..) {
            if !rule_zone.intersects(&zone) {
                new_zones.push(rule_zone);
                continue;
            }
            let moved = Zone {
                top: rule_zone.top.max(zone.top),
                left: rule_zone.left.max(zone.left),
                bottom: rule_zone.bottom.min(zone.bottom),
                right: rule_zone.right.min(zone.right),
            };
            // Parts of the rule zone outside the sorted region stay put
            new_zones.extend(subtract_zone(rule_zone, moved));
            // Covered rows follow their contents, one run per destination
            let mut dest_rows: Vec<usize> =
                (moved.top..=moved.bottom).map(|row| dest[&row]).collect();
            dest_rows.sort_unstable();
            for run in contiguous_runs(&dest_rows) {
                new_zones.push(Zone {
                    top: run.0,
                    left: moved.left,
                    bottom: run.1,
                    right: moved.right,
                });
            }
        }
        rule.zones = new_zones;
    }
}

/// `outer` minus `inner` (inner must be contained in outer), as up to four
/// rectangles.
fn subtract_zone(outer: Zone, inner: Zone) -> Vec<Zone> {
    let mut parts = Vec::new();
    if inner.top > outer.top {
        parts.push(Zone { top: outer.top, left: outer.left, bottom: inner.top - 1, right: outer.right });
    }
    if inner.bottom < outer.bottom {
        parts.push(Zone { top: inner.bottom + 1, left: outer.left, bottom: outer.bottom, right: outer.right });
    }
    if inner.left > outer.left {
        parts.push(Zone { top: inner.top, left: outer.left, bottom: inner.bottom, right: inner.left - 1 });
    }
    if inner.right < outer.right {
        parts.push(Zone { top: inner.top, left: inner.right + 1, bottom: inner.bottom, right: outer.right });
    }
    parts
}

/// Group sorted row indices into inclusive contiguous runs.
fn contiguous_runs(rows: &[usize]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut iter = rows.iter().copied();
    let Some(first) = iter.next() else {
        return runs;
    };
    let (mut start, mut end) = (first, first);
    for row in iter {
        if row == end + 1 {
            end = row;
        } else {
            runs.push((start, end));
            start = row;
            end = row;
        }
    }
    runs.push((start, end));
    runs
}
