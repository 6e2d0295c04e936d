//! Object stream expansion.
//!
//! An object stream's decoded payload starts with `N` pairs of integers
//! (`object_number relative_offset`) filling the first `/First` bytes. The
//! objects follow back to back, so each member runs to the start of the
//! next one and the last runs to the end of the payload.

use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, warn};

use super::region::{Region, RegionKind, StreamFlavor};
use crate::error::{LayoutError, Result};
use crate::marker::{ObjectId, ObjectType, is_pdf_whitespace};
use crate::params::LayoutParams;
use crate::service::{ContainerInfo, DecompressionService};

/// One object stored inside an object stream. Offsets address the decoded
/// payload, not the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectStreamMember {
    pub container: ObjectId,
    pub number: u32,
    pub offset: u64,
    pub size: u64,
    pub value: ObjectType,
}

impl ObjectStreamMember {
    /// Members are always generation 0.
    pub fn name(&self) -> String {
        format!("{} 0 obj", self.number)
    }

    pub fn category(&self) -> String {
        format!("Object stream {}", self.container.number)
    }
}

/// Split a decoded object stream payload into its members.
///
/// `at` is the container's file offset, used for error reporting.
pub fn partition(
    container: ObjectId,
    at: u64,
    data: &[u8],
    info: ContainerInfo,
    params: &LayoutParams,
) -> Result<Vec<ObjectStreamMember>> {
    let first = info.first_offset;
    if first > data.len() {
        return Err(LayoutError::structure(
            at,
            format!(
                "object stream {container}: /First {first} is beyond the decoded length {}",
                data.len()
            ),
        ));
    }

    let pairs: Vec<(u64, u64)> = data[..first]
        .split(|&b| is_pdf_whitespace(b))
        .filter(|tok| !tok.is_empty())
        .map_while(|tok| std::str::from_utf8(tok).ok()?.parse::<u64>().ok())
        .tuples()
        .take(info.member_count)
        .collect();

    if pairs.len() < info.member_count {
        let msg = format!(
            "object stream {container}: /N is {} but only {} offset pairs were found",
            info.member_count,
            pairs.len()
        );
        if !params.force {
            return Err(LayoutError::structure(at, msg));
        }
        warn!("{msg}");
    }

    let mut starts: Vec<(u32, u64)> = Vec::with_capacity(pairs.len());
    for &(number, relative) in &pairs {
        let previous = starts.last().map_or(first as u64, |&(_, s)| s);
        let start = (first as u64)
            .checked_add(relative)
            .filter(|&s| s <= data.len() as u64 && s >= previous);
        let (Ok(number), Some(start)) = (u32::try_from(number), start) else {
            let msg = format!(
                "object stream {container}: bad offset table entry \"{number} {relative}\""
            );
            if !params.force {
                return Err(LayoutError::structure(at, msg));
            }
            warn!("{msg}; ignoring remaining members");
            break;
        };
        if number as usize >= params.marker_ceiling && !params.force {
            return Err(LayoutError::ComplexityExceeded {
                what: "object stream member number",
                count: number as usize,
                ceiling: params.marker_ceiling,
            });
        }
        starts.push((number, start));
    }

    let ends = starts
        .iter()
        .skip(1)
        .map(|&(_, s)| s)
        .chain(std::iter::once(data.len() as u64));
    let members = starts
        .iter()
        .zip(ends)
        .map(|(&(number, start), end)| {
            let probe_end = (start as usize + params.probe_window).min(end as usize);
            ObjectStreamMember {
                container,
                number,
                offset: start,
                size: end - start,
                value: ObjectType::probe(&data[start as usize..probe_end]),
            }
        })
        .collect();
    Ok(members)
}

/// Expand every object stream in `regions`.
///
/// `marker_count` is the size of the marker set; together with the members
/// found so far it must stay under the ceiling.
pub fn expand(
    regions: &[Region],
    service: &dyn DecompressionService,
    params: &LayoutParams,
    marker_count: usize,
) -> Result<Vec<ObjectStreamMember>> {
    let mut members = Vec::new();
    for region in regions {
        let RegionKind::Stream {
            id,
            flavor: StreamFlavor::ObjectStream,
            ..
        } = region.kind
        else {
            continue;
        };
        let info = service.container_metadata(id)?;
        let data = service.stream_data(id)?;
        let found = partition(id, region.offset, &data, info, params)?;
        debug!(
            container = %id,
            members = found.len(),
            decoded = data.len(),
            "expanded object stream"
        );
        members.extend(found);

        let total = marker_count + members.len();
        if !params.admits(total) {
            return Err(LayoutError::ComplexityExceeded {
                what: "markers and object stream members",
                count: total,
                ceiling: params.marker_ceiling,
            });
        }
    }
    Ok(members)
}
