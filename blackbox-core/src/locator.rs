//! Segment locator
//!
//! A blackbox file may hold several logs back to back, one per arming of the
//! flight controller. Every log begins with the same product header line, so
//! segments are found by scanning the buffer once for that marker.

use std::ops::Range;

use log::debug;
use serde::Serialize;

use crate::stream::ByteStream;

/// Product header line that opens every blackbox log
pub const FLIGHT_LOG_START_MARKER: &[u8] =
    b"H Product:Blackbox flight data recorder by Nicholas Sherlock\n";

/// Byte offsets delimiting the segments of a log buffer.
///
/// Holds N+1 offsets: the first N are segment starts and the last is the
/// buffer length. Segment `i` occupies `[offsets[i], offsets[i + 1])`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentBounds {
    offsets: Vec<usize>,
}

impl SegmentBounds {
    /// All bounds including the trailing end-of-buffer sentinel
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Number of segments
    pub fn segment_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Start offset of segment `index`
    pub fn start(&self, index: usize) -> Option<usize> {
        if index < self.segment_count() {
            Some(self.offsets[index])
        } else {
            None
        }
    }

    /// Byte range of segment `index`
    pub fn range(&self, index: usize) -> Option<Range<usize>> {
        if index < self.segment_count() {
            Some(self.offsets[index]..self.offsets[index + 1])
        } else {
            None
        }
    }

    /// Iterate over the byte range of every segment, in order
    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.offsets.windows(2).map(|pair| pair[0]..pair[1])
    }
}

/// Locate blackbox logs in `data` using the standard start marker
pub fn locate_segments(data: &[u8]) -> SegmentBounds {
    locate_segments_with_marker(data, FLIGHT_LOG_START_MARKER)
}

/// Locate segments in `data` that each begin with `marker`.
///
/// Never fails: a buffer without any marker is treated as a single segment
/// spanning the whole buffer. Bytes before the first marker belong to no
/// segment.
pub fn locate_segments_with_marker(data: &[u8], marker: &[u8]) -> SegmentBounds {
    let mut stream = ByteStream::new(data);
    let mut offsets = Vec::new();

    loop {
        match stream.next_offset_of(marker) {
            Some(start) => {
                offsets.push(start);
                // Markers never overlap, resume after this one
                stream.set_pos(start + marker.len());
            }
            None => {
                if offsets.is_empty() {
                    offsets.push(0);
                }
                offsets.push(stream.end());
                break;
            }
        }
    }

    debug!(
        "Located {} log segment(s) in {} bytes",
        offsets.len() - 1,
        data.len()
    );

    SegmentBounds { offsets }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn log_with_segments(bodies: &[&[u8]]) -> (Vec<u8>, Vec<usize>) {
        let mut data = Vec::new();
        let mut starts = Vec::new();
        for body in bodies {
            starts.push(data.len());
            data.extend_from_slice(FLIGHT_LOG_START_MARKER);
            data.extend_from_slice(body);
        }
        (data, starts)
    }

    #[test]
    fn test_no_marker_is_single_segment() {
        let data = b"just some bytes without a header";
        let bounds = locate_segments(data);

        assert_eq!(bounds.segment_count(), 1);
        assert_eq!(bounds.offsets(), &[0, data.len()]);
        assert_eq!(bounds.range(0), Some(0..data.len()));
    }

    #[test]
    fn test_empty_buffer() {
        let bounds = locate_segments(b"");
        assert_eq!(bounds.segment_count(), 1);
        assert_eq!(bounds.offsets(), &[0, 0]);
    }

    #[test]
    fn test_two_segments() {
        let (data, starts) = log_with_segments(&[b"segment A frames", b"segment B"]);
        let bounds = locate_segments(&data);

        assert_eq!(bounds.segment_count(), 2);
        assert_eq!(bounds.start(0), Some(0));
        assert_eq!(bounds.start(1), Some(starts[1]));
        assert_eq!(bounds.start(2), None);
        assert_eq!(*bounds.offsets().last().unwrap(), data.len());
    }

    #[test]
    fn test_bounds_strictly_increasing() {
        let (data, _) = log_with_segments(&[b"a", b"", b"ccc", b"dddd"]);
        let bounds = locate_segments(&data);

        assert_eq!(bounds.segment_count(), 4);
        assert!(bounds.offsets().windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*bounds.offsets().last().unwrap(), data.len());
    }

    #[test]
    fn test_leading_garbage_is_skipped() {
        let mut data = b"garbage".to_vec();
        data.extend_from_slice(FLIGHT_LOG_START_MARKER);
        data.extend_from_slice(b"body");

        let bounds = locate_segments(&data);
        assert_eq!(bounds.segment_count(), 1);
        assert_eq!(bounds.start(0), Some(7));
    }

    #[test]
    fn test_adjacent_markers_do_not_overlap() {
        let bounds = locate_segments_with_marker(b"AAAA", b"AA");
        assert_eq!(bounds.offsets(), &[0, 2, 4]);
    }

    #[test]
    fn test_ranges_cover_segments() {
        let (data, starts) = log_with_segments(&[b"one", b"two"]);
        let bounds = locate_segments(&data);
        let ranges: Vec<_> = bounds.ranges().collect();

        assert_eq!(ranges, vec![0..starts[1], starts[1]..data.len()]);
    }

    fn contains_marker(data: &[u8]) -> bool {
        data.windows(FLIGHT_LOG_START_MARKER.len())
            .any(|window| window == FLIGHT_LOG_START_MARKER)
    }

    proptest! {
        #[test]
        fn prop_marker_free_buffer_is_one_segment(
            data in prop::collection::vec(any::<u8>(), 0..512),
        ) {
            prop_assume!(!contains_marker(&data));
            let bounds = locate_segments(&data);

            prop_assert_eq!(bounds.segment_count(), 1);
            prop_assert_eq!(bounds.offsets(), &[0, data.len()][..]);
        }

        // Bodies stay below b'H' so the only markers are the ones inserted
        #[test]
        fn prop_one_segment_per_marker(
            bodies in prop::collection::vec(prop::collection::vec(0u8..b'H', 0..64), 1..12),
        ) {
            let bodies: Vec<&[u8]> = bodies.iter().map(Vec::as_slice).collect();
            let (data, starts) = log_with_segments(&bodies);
            let bounds = locate_segments(&data);

            prop_assert_eq!(bounds.segment_count(), bodies.len());
            prop_assert_eq!(&bounds.offsets()[..bodies.len()], &starts[..]);
            prop_assert!(bounds.offsets().windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(bounds.offsets().last().copied(), Some(data.len()));
        }
    }
}
