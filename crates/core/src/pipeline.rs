//! End-to-end analysis.
//!
//! Stages run strictly in sequence over one region collection:
//! prepare, sequence, cavity fill, stream measurement, object stream
//! expansion, linearization tagging, incremental tagging, collapse and
//! aggregation. Any error aborts the run before an edge is produced.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{LayoutError, Result};
use crate::flow::{self, FlowEdge};
use crate::layout::{
    CavityCounter, Layout, cavity, incremental, linearization, objstm, sequencer, streams,
};
use crate::marker::Marker;
use crate::params::LayoutParams;
use crate::scan::{ByteScanner, MarkerSource};
use crate::service::{DecompressionService, InlineService, QpdfService};

/// Result of one run.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub layout: Layout,
    pub edges: Vec<FlowEdge>,
}

impl Analysis {
    pub fn csv(&self) -> String {
        flow::to_csv(&self.edges)
    }
}

/// Which decompression backend to use for file analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Engine {
    #[default]
    Inline,
    Qpdf {
        program: PathBuf,
    },
}

/// Resolve a marker set into a layout and its flow edges.
pub fn analyze(
    markers: Vec<Marker>,
    file_size: u64,
    service: &dyn DecompressionService,
    params: &LayoutParams,
) -> Result<Analysis> {
    let markers = sequencer::prepare(markers, params)?;
    let seq = sequencer::sequence(&markers, file_size, params)?;

    let mut cavities = CavityCounter::new();
    let regions = cavity::fill(seq.regions, file_size, params.cavity_tolerance, &mut cavities);
    let regions = streams::measure(regions, service)?;
    let members = objstm::expand(&regions, service, params, markers.len())?;

    let (regions, linearized) =
        linearization::tag(regions, seq.eof_count, seq.missing_last_eof)?;
    let regions = incremental::tag(regions, linearized);
    let (regions, detail) = linearization::collapse(regions);
    debug!(
        regions = regions.len(),
        linearized = detail.len(),
        members = members.len(),
        "layout resolved"
    );

    let layout = Layout {
        file_size,
        regions,
        linearized: detail,
        members,
        eof_count: seq.eof_count,
        missing_last_eof: seq.missing_last_eof,
        cavity_count: cavities.issued(),
    };
    let edges = flow::aggregate(&layout);
    info!(
        file_size,
        edges = edges.len(),
        cavities = layout.cavity_count,
        linearized = layout.is_linearized(),
        "analysis complete"
    );
    Ok(Analysis { layout, edges })
}

/// Scan and analyze an in-memory file with the inline service.
pub fn analyze_bytes(data: &[u8], params: &LayoutParams) -> Result<Analysis> {
    let markers = ByteScanner::new(data, params).markers()?;
    let service = InlineService::new(data, params.service_timeout);
    analyze(markers, data.len() as u64, &service, params)
}

/// Memory-map `path`, scan it and analyze it with `engine`.
pub fn analyze_file(path: impl AsRef<Path>, engine: &Engine, params: &LayoutParams) -> Result<Analysis> {
    let path = path.as_ref();
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Err(LayoutError::HeaderNotFound);
    }
    // Safety: the file handle remains open for the duration of the map.
    let mmap = unsafe { Mmap::map(&file) }?;
    let data: &[u8] = &mmap;

    match engine {
        Engine::Inline => analyze_bytes(data, params),
        Engine::Qpdf { program } => {
            let markers = ByteScanner::new(data, params).markers()?;
            let service = QpdfService::new(path, params.service_timeout).program(program);
            analyze(markers, data.len() as u64, &service, params)
        }
    }
}
