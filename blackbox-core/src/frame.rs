//! Frame decoder abstraction.
//!
//! Decoding the blackbox wire format (field predictors, variable-length
//! encodings, checksums) is the job of an external decoder. The index only
//! needs a header with field names and sensor scales, and a single forward pass
//! over the frames of a segment. This module defines that boundary.
//!
//! # Example
//!
//! ```rust,ignore
//! use blackbox_core::frame::{DecodedFrame, FrameDecoder, FrameKind};
//!
//! fn count_intra<D: FrameDecoder>(decoder: &mut D, log: &[u8]) -> usize {
//!     let header = decoder.parse_header(log, 0..log.len()).unwrap();
//!     let mut count = 0;
//!     decoder
//!         .parse_frames(log, 0..log.len(), &mut |frame: &DecodedFrame<'_>| {
//!             if frame.valid && frame.kind == FrameKind::Intra {
//!                 count += 1;
//!             }
//!         })
//!         .unwrap();
//!     count
//! }
//! ```

use std::collections::HashMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Position of the time value among the main frame fields
/// (field 0 is the loop iteration counter).
pub const FIELD_INDEX_TIME: usize = 1;

/// Kind of a blackbox frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameKind {
    /// Intra frame ("I"): every field stored in full
    Intra,
    /// Inter frame ("P"): fields predicted from previous frames
    Inter,
    /// Event frame ("E"): discrete occurrence such as a mode change
    Event,
}

impl FrameKind {
    /// Map the single-letter frame marker used on the wire
    pub fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            b'I' => Some(FrameKind::Intra),
            b'P' => Some(FrameKind::Inter),
            b'E' => Some(FrameKind::Event),
            _ => None,
        }
    }

    /// Single-letter wire marker
    pub fn marker(self) -> u8 {
        match self {
            FrameKind::Intra => b'I',
            FrameKind::Inter => b'P',
            FrameKind::Event => b'E',
        }
    }

    /// Whether this frame carries main telemetry fields (I or P)
    pub fn is_main(self) -> bool {
        matches!(self, FrameKind::Intra | FrameKind::Inter)
    }
}

/// Sensor scaling read from a segment header
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SysConfig {
    /// Accelerometer reading that corresponds to 1 g
    pub acc_1g: f64,
    /// Gyro scale: radians per microsecond per raw unit
    pub gyro_scale: f64,
}

impl Default for SysConfig {
    fn default() -> Self {
        SysConfig {
            acc_1g: 4096.0,
            gyro_scale: 1.0,
        }
    }
}

/// Parsed header of one log segment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentHeader {
    /// Main frame field name (e.g. `gyroADC[0]`) to field position
    pub field_indices: HashMap<String, usize>,
    /// Sensor scaling constants
    pub sys_config: SysConfig,
}

impl SegmentHeader {
    /// Position of a named main frame field
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.field_indices.get(name).copied()
    }
}

/// One frame as delivered by the decoder.
///
/// Borrowed for the duration of a single handler call only.
#[derive(Debug, Clone, Copy)]
pub struct DecodedFrame<'a> {
    /// False when the decoder found the frame corrupt
    pub valid: bool,
    /// Decoded field values (meaningful for I and P frames)
    pub fields: &'a [i64],
    /// Frame kind
    pub kind: FrameKind,
    /// Byte offset of the frame within the whole buffer
    pub offset: usize,
    /// Encoded frame size in bytes
    pub size: usize,
}

impl DecodedFrame<'_> {
    /// Frame time in microseconds, if the frame carries a time field
    pub fn time(&self) -> Option<i64> {
        self.fields.get(FIELD_INDEX_TIME).copied()
    }

    /// Value of the field at `index`, if present
    pub fn field(&self, index: usize) -> Option<i64> {
        self.fields.get(index).copied()
    }
}

/// External decoder for the blackbox frame format.
///
/// The decoder is stateful: `parse_header` configures field definitions that
/// the following `parse_frames` call on the same range relies on.
pub trait FrameDecoder {
    /// Parse the header of the segment occupying `range` of `log`.
    fn parse_header(&mut self, log: &[u8], range: Range<usize>)
        -> Result<SegmentHeader, DecodeError>;

    /// Decode every frame of the segment occupying `range`, in order.
    ///
    /// `on_frame` is invoked once per frame. The pass is single and forward
    /// only; frames are not retained after the handler returns.
    fn parse_frames(
        &mut self,
        log: &[u8],
        range: Range<usize>,
        on_frame: &mut dyn FnMut(&DecodedFrame<'_>),
    ) -> Result<(), DecodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_kind_markers() {
        for kind in [FrameKind::Intra, FrameKind::Inter, FrameKind::Event] {
            assert_eq!(FrameKind::from_marker(kind.marker()), Some(kind));
        }
        assert_eq!(FrameKind::from_marker(b'S'), None);
        assert!(FrameKind::Inter.is_main());
        assert!(!FrameKind::Event.is_main());
    }

    #[test]
    fn test_frame_time_field() {
        let fields = [7, 123_456, 3];
        let frame = DecodedFrame {
            valid: true,
            fields: &fields,
            kind: FrameKind::Intra,
            offset: 0,
            size: 10,
        };
        assert_eq!(frame.time(), Some(123_456));
        assert_eq!(frame.field(5), None);
    }
}
