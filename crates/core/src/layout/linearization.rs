//! Linearization block classification.
//!
//! A linearized file starts with the linearization dictionary, followed by
//! the first-page objects and their own `%%EOF`. Everything from the first
//! object through that point is attributed to the `Linearized` category
//! and later folded into one summary region.

use itertools::Itertools;
use tracing::debug;

use super::region::{Category, Provenance, Region, RegionKind};
use crate::error::{LayoutError, Result};

/// Relabel the linearization block. Returns the new regions and whether the
/// file is linearized.
pub fn tag(
    regions: Vec<Region>,
    eof_count: usize,
    missing_last_eof: bool,
) -> Result<(Vec<Region>, bool)> {
    let dicts: Vec<usize> = regions
        .iter()
        .positions(|r| matches!(r.kind, RegionKind::LinearizationDict { .. }))
        .collect();
    let dict = match dicts[..] {
        [] => return Ok((regions, false)),
        [dict] => dict,
        _ => return Err(LayoutError::MultipleLinearizationDictionaries(dicts.len())),
    };

    let first = regions
        .iter()
        .position(|r| r.kind.is_object())
        .unwrap_or(dict);
    let mut last = dict;
    if (eof_count > 1 || (eof_count == 1 && missing_last_eof))
        && let Some(eof) = regions[dict + 1..]
            .iter()
            .position(|r| r.kind == RegionKind::EndOfFile)
    {
        last = dict + 1 + eof;
    }
    debug!(first, last, "linearization block");

    let regions = regions
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
            if (first..=last).contains(&i) {
                r.reclassify(Category::Linearized, Provenance::Linearization)
            } else {
                r
            }
        })
        .collect();
    Ok((regions, true))
}

/// Fold the contiguous `Linearized` span into a single summary region.
///
/// Returns the collapsed tiling and the detail regions that were folded.
pub fn collapse(regions: Vec<Region>) -> (Vec<Region>, Vec<Region>) {
    let Some(start) = regions
        .iter()
        .position(|r| r.category == Category::Linearized)
    else {
        return (regions, Vec::new());
    };

    let mut out = Vec::with_capacity(regions.len());
    let mut detail = Vec::new();
    let mut iter = regions.into_iter().enumerate().peekable();
    while let Some((i, region)) = iter.next() {
        if i != start {
            out.push(region);
            continue;
        }
        let offset = region.offset;
        detail.push(region);
        while let Some((_, next)) = iter.next_if(|(_, r)| r.category == Category::Linearized) {
            detail.push(next);
        }
        let size = detail.iter().map(|r| r.size).sum();
        let mut summary = Region::new(RegionKind::LinearizedBlock, "Linearized", offset, size);
        summary.provenance = Provenance::Linearization;
        out.push(summary);
    }
    (out, detail)
}
