//! Gap detection between sequenced regions.

use tracing::debug;

use super::region::{Category, Region};

/// Source of cavity numbers for one run. Starts at 1.
#[derive(Debug, Clone)]
pub struct CavityCounter {
    next: u32,
}

impl Default for CavityCounter {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl CavityCounter {
    pub fn new() -> Self {
        Self::default()
    }

    fn take(&mut self) -> u32 {
        let index = self.next;
        self.next += 1;
        index
    }

    /// Number of cavities handed out so far.
    pub fn issued(&self) -> u32 {
        self.next - 1
    }
}

/// Complete the tiling of `[0, file_size)`.
///
/// A gap wider than `tolerance` becomes a cavity carrying the category of
/// the region after it. Narrower gaps are end-of-line slack and widen the
/// region before them. Bytes before the first region always form a cavity.
pub fn fill(
    regions: Vec<Region>,
    file_size: u64,
    tolerance: u64,
    counter: &mut CavityCounter,
) -> Vec<Region> {
    let mut out: Vec<Region> = Vec::with_capacity(regions.len() + 4);
    let mut cursor = 0u64;

    for region in regions {
        let gap = region.offset.saturating_sub(cursor);
        if gap > 0 {
            match out.pop() {
                Some(prev) if gap <= tolerance => out.push(prev.grown_by(gap)),
                prev => {
                    out.extend(prev);
                    let index = counter.take();
                    debug!(index, offset = cursor, size = gap, "cavity");
                    out.push(Region::cavity(index, region.category, cursor, gap));
                }
            }
        }
        cursor = cursor.max(region.end());
        out.push(region);
    }

    let tail = file_size.saturating_sub(cursor);
    if tail > 0 {
        match out.pop() {
            Some(prev) if tail <= tolerance => out.push(prev.grown_by(tail)),
            prev => {
                out.extend(prev);
                let index = counter.take();
                debug!(index, offset = cursor, size = tail, "trailing cavity");
                out.push(Region::cavity(index, Category::PdfFile, cursor, tail));
            }
        }
    }
    out
}
