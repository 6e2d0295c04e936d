//! Incremental update attribution.

use super::region::{Category, Provenance, Region, RegionKind};

/// Attribute regions after each `%%EOF` to the incremental update that
/// appended them.
///
/// The update index counts the `%%EOF` markers passed so far. A linearized
/// file's first `%%EOF` closes the linearization block, so it does not
/// start an update. Regions already attributed elsewhere keep their
/// category.
pub fn tag(regions: Vec<Region>, linearized: bool) -> Vec<Region> {
    let base = u32::from(linearized);
    let mut passed = 0u32;
    regions
        .into_iter()
        .map(|region| {
            let update = passed.saturating_sub(base);
            if region.kind == RegionKind::EndOfFile {
                passed += 1;
            }
            if update > 0 && region.category == Category::PdfFile {
                region.reclassify(
                    Category::IncrementalUpdate(update),
                    Provenance::IncrementalUpdate,
                )
            } else {
                region
            }
        })
        .collect()
}
