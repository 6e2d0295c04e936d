//! Layout reconstruction.
//!
//! Stages, in pipeline order:
//! - `sequencer`: sorted markers to regions via the `grammar` table
//! - `cavity`: fill gaps so the regions tile the whole file
//! - `streams`: compressed/uncompressed figures per stream
//! - `objstm`: members of object streams
//! - `linearization` and `incremental`: category attribution

pub mod cavity;
pub mod grammar;
pub mod incremental;
pub mod linearization;
pub mod objstm;
pub mod region;
pub mod sequencer;
pub mod streams;

use serde::Serialize;

pub use cavity::CavityCounter;
pub use objstm::ObjectStreamMember;
pub use region::{
    Category, Color, Provenance, Region, RegionKind, StreamFlavor, StreamMetrics, StreamSpan,
};
pub use sequencer::Sequence;

/// Fully resolved layout of one file.
#[derive(Debug, Clone, Serialize)]
pub struct Layout {
    pub file_size: u64,
    /// Final tiling; a linearization block appears as one summary region.
    pub regions: Vec<Region>,
    /// Regions folded into the linearization summary.
    pub linearized: Vec<Region>,
    pub members: Vec<ObjectStreamMember>,
    pub eof_count: usize,
    pub missing_last_eof: bool,
    pub cavity_count: u32,
}

impl Layout {
    pub fn is_linearized(&self) -> bool {
        !self.linearized.is_empty()
    }

    /// Regions as they tile the file, with the linearization block expanded
    /// back into its detail.
    pub fn tiling(&self) -> Vec<&Region> {
        let mut out: Vec<&Region> = Vec::with_capacity(self.regions.len() + self.linearized.len());
        for region in &self.regions {
            if region.kind == RegionKind::LinearizedBlock {
                out.extend(&self.linearized);
            } else {
                out.push(region);
            }
        }
        out
    }
}
