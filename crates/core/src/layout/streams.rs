//! Stream compression measurement.

use tracing::debug;

use super::region::{Region, RegionKind, StreamMetrics};
use crate::error::Result;
use crate::service::DecompressionService;

/// `stream` + `endstream` + one end-of-line byte after each.
const KEYWORD_FRAME: u64 = 17;

/// Attach [`StreamMetrics`] to every stream region.
///
/// The uncompressed figure includes the same keyword framing as the
/// compressed span. A reported size below the compressed span (unfiltered
/// streams whose end-of-line bytes differ) is clamped up to it.
pub fn measure(regions: Vec<Region>, service: &dyn DecompressionService) -> Result<Vec<Region>> {
    regions
        .into_iter()
        .map(|region| {
            let RegionKind::Stream { id, span, .. } = region.kind else {
                return Ok(region);
            };
            let compressed = span.compressed();
            let reported = service.decompressed_length(id)? + KEYWORD_FRAME;
            let uncompressed = if reported < compressed {
                debug!(
                    object = %id,
                    reported,
                    compressed,
                    "decompressed size below compressed span, clamped"
                );
                compressed
            } else {
                reported
            };
            Ok(region.with_metrics(StreamMetrics {
                compressed,
                uncompressed,
            }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LayoutError;
    use crate::layout::region::{StreamFlavor, StreamSpan};
    use crate::marker::ObjectId;
    use crate::service::ContainerInfo;

    struct Fixed(u64);

    impl DecompressionService for Fixed {
        fn stream_data(&self, _id: ObjectId) -> Result<Vec<u8>> {
            Ok(vec![0; self.0 as usize])
        }

        fn container_metadata(&self, id: ObjectId) -> Result<ContainerInfo> {
            Err(LayoutError::tool(id, "not a container"))
        }
    }

    fn stream_region(stream_at: u64, endstream_at: u64) -> Region {
        Region::new(
            RegionKind::Stream {
                id: ObjectId::new(4, 0),
                flavor: StreamFlavor::Plain,
                span: StreamSpan {
                    stream_at,
                    endstream_at,
                },
            },
            "4 0 obj",
            0,
            endstream_at + 20,
        )
    }

    #[test]
    fn expansion_is_reported_with_framing() {
        let out = measure(vec![stream_region(30, 130)], &Fixed(400)).unwrap();
        assert_eq!(
            out[0].stream,
            Some(StreamMetrics {
                compressed: 110,
                uncompressed: 417
            })
        );
    }

    #[test]
    fn short_report_is_clamped() {
        let out = measure(vec![stream_region(30, 130)], &Fixed(10)).unwrap();
        let m = out[0].stream.unwrap();
        assert_eq!(m.uncompressed, m.compressed);
    }
}
