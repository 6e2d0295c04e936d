//! Offset sequencing: markers in, file tiling out.
//!
//! `prepare` sorts the marker set and runs the whole-file consistency
//! checks. `sequence` then walks the sorted markers once. Top-level
//! keywords become single-marker regions; every object start collects the
//! markers up to its `endobj` and is matched against [`RULES`].
//!
//! [`RULES`]: super::grammar::RULES

use tracing::{debug, warn};

use super::grammar::{Shape, recognize};
use super::region::{Region, RegionKind, StreamFlavor, StreamSpan};
use crate::error::{LayoutError, Result};
use crate::marker::{Marker, MarkerKind, ObjectId, ObjectType};
use crate::params::LayoutParams;

/// `endobj` plus one end-of-line byte.
const ENDOBJ_FRAME: u64 = 7;

/// Output of the sequencer.
#[derive(Debug, Clone)]
pub struct Sequence {
    /// Regions in offset order; gaps between them are not yet filled.
    pub regions: Vec<Region>,
    pub eof_count: usize,
    /// The last marker of the file is not `%%EOF`.
    pub missing_last_eof: bool,
}

#[derive(Debug, Default)]
struct Tally {
    headers: usize,
    objects: usize,
    streams: usize,
    endstreams: usize,
    endobjs: usize,
    linearized: usize,
    eofs: usize,
    startxrefs: usize,
}

impl Tally {
    fn of(markers: &[Marker]) -> Self {
        let mut t = Self::default();
        for m in markers {
            match m.kind {
                MarkerKind::Header(_) => t.headers += 1,
                MarkerKind::ObjectStart(_) => t.objects += 1,
                MarkerKind::Stream => t.streams += 1,
                MarkerKind::EndStream => t.endstreams += 1,
                MarkerKind::EndObj => t.endobjs += 1,
                MarkerKind::Key(crate::marker::DictKey::Linearized) => t.linearized += 1,
                MarkerKind::EndOfFile => t.eofs += 1,
                MarkerKind::StartXref => t.startxrefs += 1,
                _ => {}
            }
        }
        t
    }
}

/// A count check that only warns in best-effort mode.
fn assert_count(ok: bool, force: bool, msg: impl FnOnce() -> String) -> Result<()> {
    if ok {
        return Ok(());
    }
    let msg = msg();
    if force {
        warn!("{msg}");
        Ok(())
    } else {
        Err(LayoutError::structure(0, msg))
    }
}

/// Sort markers by offset and validate the whole-file marker counts.
///
/// Only the first header survives; later ones are logged and dropped.
pub fn prepare(mut markers: Vec<Marker>, params: &LayoutParams) -> Result<Vec<Marker>> {
    markers.sort_by_key(|m| m.offset);

    let tally = Tally::of(&markers);
    if tally.headers == 0 {
        return Err(LayoutError::HeaderNotFound);
    }
    if tally.headers > 1 {
        warn!(headers = tally.headers, "multiple \"%PDF-x.y\" headers, keeping the first");
        let mut seen = false;
        markers.retain(|m| {
            !matches!(m.kind, MarkerKind::Header(_)) || !std::mem::replace(&mut seen, true)
        });
    }

    assert_count(tally.streams == tally.endstreams, params.force, || {
        format!(
            "number of \"stream\" ({}) and \"endstream\" ({}) markers differ",
            tally.streams, tally.endstreams
        )
    })?;
    assert_count(tally.streams <= tally.objects, params.force, || {
        format!(
            "more \"stream\" markers ({}) than objects ({})",
            tally.streams, tally.objects
        )
    })?;
    assert_count(tally.endobjs == tally.objects, params.force, || {
        format!(
            "number of \"endobj\" ({}) and \"X Y obj\" ({}) markers differ",
            tally.endobjs, tally.objects
        )
    })?;
    if tally.linearized > 1 {
        return Err(LayoutError::MultipleLinearizationDictionaries(
            tally.linearized,
        ));
    }
    if !params.admits(markers.len()) {
        return Err(LayoutError::ComplexityExceeded {
            what: "markers",
            count: markers.len(),
            ceiling: params.marker_ceiling,
        });
    }
    if tally.eofs != tally.startxrefs {
        if !params.force {
            return Err(LayoutError::UnbalancedEndOfFileMarkers {
                eofs: tally.eofs,
                startxrefs: tally.startxrefs,
            });
        }
        warn!(
            eofs = tally.eofs,
            startxrefs = tally.startxrefs,
            "unbalanced \"%%EOF\" and \"startxref\" markers"
        );
    }

    debug!(
        markers = markers.len(),
        objects = tally.objects,
        streams = tally.streams,
        eofs = tally.eofs,
        "markers prepared"
    );
    Ok(markers)
}

/// Offset of the first top-level marker at or after `from`, capped at the
/// file size.
fn boundary(markers: &[Marker], from: usize, file_size: u64) -> u64 {
    markers
        .get(from..)
        .unwrap_or_default()
        .iter()
        .find(|m| m.kind.is_top_level())
        .map_or(file_size, |m| m.offset)
        .min(file_size)
}

/// Markers belonging to one object: everything after the object start up
/// to and including its `endobj`. Markers inside stream data are skipped,
/// and a top-level marker ends the group early.
struct Group<'m> {
    inner: Vec<&'m Marker>,
    next: usize,
}

fn collect_group(markers: &[Marker], start: usize) -> Group<'_> {
    let mut inner = Vec::new();
    let mut in_stream = false;
    let mut j = start + 1;
    while let Some(m) = markers.get(j) {
        match m.kind {
            MarkerKind::EndStream if in_stream => {
                inner.push(m);
                in_stream = false;
            }
            _ if in_stream => {
                debug!(offset = m.offset, marker = %m.name(), "ignoring marker inside stream data");
            }
            MarkerKind::EndObj => {
                inner.push(m);
                j += 1;
                break;
            }
            MarkerKind::Stream => {
                inner.push(m);
                in_stream = true;
            }
            ref kind if kind.is_top_level() => break,
            _ => inner.push(m),
        }
        j += 1;
    }
    Group { inner, next: j }
}

fn find_offset(inner: &[&Marker], kind: MarkerKind) -> u64 {
    inner
        .iter()
        .find(|m| m.kind == kind)
        .map_or(0, |m| m.offset)
}

fn object_region(
    id: ObjectId,
    start: &Marker,
    group: &Group<'_>,
    bound: u64,
    params: &LayoutParams,
) -> Result<Region> {
    let kinds: Vec<&MarkerKind> = group.inner.iter().map(|m| &m.kind).collect();
    let endobj = group
        .inner
        .last()
        .filter(|m| m.kind == MarkerKind::EndObj)
        .map(|m| m.offset);
    let end = endobj.map_or(bound, |at| (at + ENDOBJ_FRAME).min(bound));
    let size = end.saturating_sub(start.offset);

    let Some(rule) = recognize(&kinds) else {
        let names: Vec<String> = group.inner.iter().map(|m| m.name()).collect();
        let msg = format!(
            "object {id} has unrecognized marker sequence [{}]",
            names.join(", ")
        );
        if !params.force {
            return Err(LayoutError::structure(start.offset, msg));
        }
        warn!(offset = start.offset, "{msg}; treating as unknown object");
        return Ok(Region::new(
            RegionKind::Object {
                id,
                value: ObjectType::Unknown,
            },
            format!("{id} obj"),
            start.offset,
            size,
        ));
    };

    let span = || StreamSpan {
        stream_at: find_offset(&group.inner, MarkerKind::Stream),
        endstream_at: find_offset(&group.inner, MarkerKind::EndStream),
    };
    let (kind, name) = match rule.shape {
        Shape::XRefStream => (
            RegionKind::Stream {
                id,
                flavor: StreamFlavor::XRef,
                span: span(),
            },
            format!("XRef stream {}", id.number),
        ),
        Shape::ObjectStream => (
            RegionKind::Stream {
                id,
                flavor: StreamFlavor::ObjectStream,
                span: span(),
            },
            format!("Object stream {}", id.number),
        ),
        Shape::Stream => (
            RegionKind::Stream {
                id,
                flavor: StreamFlavor::Plain,
                span: span(),
            },
            format!("{id} obj"),
        ),
        Shape::LinearizationDict => (RegionKind::LinearizationDict { id }, format!("{id} obj")),
        Shape::Plain => {
            let value = match kinds[0] {
                MarkerKind::Value(ty) => *ty,
                _ => ObjectType::Unknown,
            };
            (RegionKind::Object { id, value }, format!("{id} obj"))
        }
    };
    Ok(Region::new(kind, name, start.offset, size))
}

fn keyword_region(marker: &Marker, bound: u64) -> Option<Region> {
    let kind = match marker.kind {
        MarkerKind::Header(_) => RegionKind::Header,
        MarkerKind::Xref => RegionKind::Xref,
        MarkerKind::Trailer => RegionKind::Trailer,
        MarkerKind::StartXref => RegionKind::StartXref,
        MarkerKind::EndOfFile => RegionKind::EndOfFile,
        _ => return None,
    };
    let end = marker
        .size
        .map_or(bound, |size| (marker.offset + size).min(bound));
    Some(Region::new(
        kind,
        marker.name(),
        marker.offset,
        end.saturating_sub(marker.offset),
    ))
}

/// Resolve sorted, prepared markers into regions.
pub fn sequence(markers: &[Marker], file_size: u64, params: &LayoutParams) -> Result<Sequence> {
    let mut regions = Vec::new();
    let mut i = 0;
    while let Some(marker) = markers.get(i) {
        match marker.kind {
            MarkerKind::ObjectStart(id) => {
                let group = collect_group(markers, i);
                let bound = boundary(markers, group.next, file_size);
                regions.push(object_region(id, marker, &group, bound, params)?);
                i = group.next;
            }
            ref kind if kind.is_top_level() => {
                let bound = boundary(markers, i + 1, file_size);
                regions.extend(keyword_region(marker, bound));
                i += 1;
            }
            _ => {
                let msg = format!("unexpected \"{}\" marker outside an object", marker.name());
                if !params.force {
                    return Err(LayoutError::structure(marker.offset, msg));
                }
                warn!(offset = marker.offset, "{msg}; skipped");
                i += 1;
            }
        }
    }

    let eof_count = markers
        .iter()
        .filter(|m| m.kind == MarkerKind::EndOfFile)
        .count();
    let missing_last_eof = markers
        .last()
        .is_none_or(|m| m.kind != MarkerKind::EndOfFile);
    if missing_last_eof {
        debug!("file does not end with \"%%EOF\"");
    }
    debug!(regions = regions.len(), eof_count, "sequenced");

    Ok(Sequence {
        regions,
        eof_count,
        missing_last_eof,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::DictKey;

    fn object(markers: &mut Vec<Marker>, n: u32, at: u64, ty: ObjectType, endobj: u64) {
        markers.push(Marker::object(n, 0, at));
        markers.push(Marker::value(ty, at + 8));
        markers.push(Marker::new(MarkerKind::EndObj, endobj));
    }

    #[test]
    fn plain_objects_and_keywords_tile() {
        let mut markers = vec![Marker::header("%PDF-1.4", 0)];
        object(&mut markers, 1, 9, ObjectType::Dict, 40);
        object(&mut markers, 2, 47, ObjectType::Number, 60);
        markers.push(Marker::new(MarkerKind::StartXref, 67));
        markers.push(Marker::new(MarkerKind::EndOfFile, 80));
        let markers = prepare(markers, &LayoutParams::default()).unwrap();
        let seq = sequence(&markers, 86, &LayoutParams::default()).unwrap();

        let spans: Vec<(u64, u64)> = seq.regions.iter().map(|r| (r.offset, r.size)).collect();
        assert_eq!(spans, vec![(0, 9), (9, 38), (47, 20), (67, 13), (80, 6)]);
        assert_eq!(seq.regions[1].name, "1 0 obj");
        assert_eq!(seq.eof_count, 1);
        assert!(!seq.missing_last_eof);
    }

    #[test]
    fn xref_stream_is_named_by_number() {
        let mut markers = vec![Marker::header("%PDF-1.5", 0)];
        markers.push(Marker::object(7, 0, 9));
        markers.push(Marker::value(ObjectType::Dict, 17));
        markers.push(Marker::key(DictKey::XRef, 25));
        markers.push(Marker::new(MarkerKind::Stream, 40));
        markers.push(Marker::new(MarkerKind::EndStream, 100));
        markers.push(Marker::new(MarkerKind::EndObj, 110));
        let seq = sequence(&markers, 117, &LayoutParams::default()).unwrap();
        let region = &seq.regions[1];
        assert_eq!(region.name, "XRef stream 7");
        assert_eq!(region.size, 108);
        match region.kind {
            RegionKind::Stream { span, flavor, .. } => {
                assert_eq!(flavor, StreamFlavor::XRef);
                assert_eq!(span.compressed(), 70);
            }
            ref other => panic!("unexpected kind {other:?}"),
        }
        assert!(seq.missing_last_eof);
    }

    #[test]
    fn markers_inside_stream_data_are_ignored() {
        let markers = vec![
            Marker::header("%PDF-1.4", 0),
            Marker::object(3, 0, 9),
            Marker::value(ObjectType::Dict, 17),
            Marker::new(MarkerKind::Stream, 30),
            Marker::new(MarkerKind::EndObj, 45),
            Marker::new(MarkerKind::EndStream, 60),
            Marker::new(MarkerKind::EndObj, 70),
        ];
        let seq = sequence(&markers, 77, &LayoutParams::default()).unwrap();
        assert_eq!(seq.regions[1].end(), 77);
    }

    #[test]
    fn unmatched_object_is_fatal_unless_forced() {
        let markers = vec![
            Marker::header("%PDF-1.4", 0),
            Marker::object(3, 0, 9),
            Marker::value(ObjectType::Array, 17),
            Marker::new(MarkerKind::Stream, 30),
            Marker::new(MarkerKind::EndStream, 60),
            Marker::new(MarkerKind::EndObj, 70),
        ];
        let err = sequence(&markers, 77, &LayoutParams::default()).unwrap_err();
        assert!(matches!(err, LayoutError::StructuralInconsistency { offset: 9, .. }));

        let seq = sequence(&markers, 77, &LayoutParams::default().force(true)).unwrap();
        assert_eq!(
            seq.regions[1].kind,
            RegionKind::Object {
                id: ObjectId::new(3, 0),
                value: ObjectType::Unknown
            }
        );
    }

    #[test]
    fn second_header_is_dropped() {
        let mut markers = vec![Marker::header("%PDF-1.4", 0), Marker::header("%PDF-1.7", 50)];
        object(&mut markers, 1, 9, ObjectType::Null, 30);
        let markers = prepare(markers, &LayoutParams::default()).unwrap();
        let headers = markers
            .iter()
            .filter(|m| matches!(m.kind, MarkerKind::Header(_)))
            .count();
        assert_eq!(headers, 1);
        assert_eq!(markers[0].offset, 0);
    }

    #[test]
    fn count_checks() {
        let mut markers = vec![Marker::header("%PDF-1.4", 0)];
        object(&mut markers, 1, 9, ObjectType::Dict, 40);
        markers.push(Marker::new(MarkerKind::EndObj, 50));
        let err = prepare(markers.clone(), &LayoutParams::default()).unwrap_err();
        assert!(matches!(err, LayoutError::StructuralInconsistency { .. }));
        assert!(prepare(markers, &LayoutParams::default().force(true)).is_ok());

        let lin = vec![
            Marker::header("%PDF-1.4", 0),
            Marker::key(DictKey::Linearized, 20),
            Marker::key(DictKey::Linearized, 90),
        ];
        let err = prepare(lin, &LayoutParams::default().force(true)).unwrap_err();
        assert!(matches!(err, LayoutError::MultipleLinearizationDictionaries(2)));
    }

    #[test]
    fn unbalanced_eof_rejected_without_force() {
        let mut markers = vec![Marker::header("%PDF-1.4", 0)];
        object(&mut markers, 1, 9, ObjectType::Dict, 40);
        markers.push(Marker::new(MarkerKind::EndOfFile, 60));
        let err = prepare(markers.clone(), &LayoutParams::default()).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::UnbalancedEndOfFileMarkers { eofs: 1, startxrefs: 0 }
        ));
        assert!(prepare(markers, &LayoutParams::default().force(true)).is_ok());
    }

    #[test]
    fn ceiling_counts_markers() {
        let mut markers = vec![Marker::header("%PDF-1.4", 0)];
        object(&mut markers, 1, 9, ObjectType::Dict, 40);
        let params = LayoutParams::default().marker_ceiling(3);
        let err = prepare(markers.clone(), &params).unwrap_err();
        assert!(matches!(
            err,
            LayoutError::ComplexityExceeded { count: 4, ceiling: 3, .. }
        ));
        assert!(prepare(markers, &params.force(true)).is_ok());
    }
}
