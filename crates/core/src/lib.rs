//! pdfstrata - byte-layout reconstruction of PDF files for Sankey diagrams.

pub mod error;
pub mod flow;
pub mod layout;
pub mod marker;
pub mod params;
pub mod pipeline;
pub mod scan;
pub mod service;

pub use error::{LayoutError, Result};
pub use flow::{FlowEdge, aggregate, to_csv, write_csv};
pub use layout::{Category, Layout, ObjectStreamMember, Region, RegionKind};
pub use marker::{Marker, MarkerKind, ObjectId, ObjectType};
pub use params::LayoutParams;
pub use pipeline::{Analysis, Engine, analyze, analyze_bytes, analyze_file};
pub use scan::{ByteScanner, MarkerSource};
pub use service::{ContainerInfo, DecompressionService, InlineService, QpdfService};
