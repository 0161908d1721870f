//! Scripted frame decoder used by the unit tests

use std::collections::HashMap;
use std::ops::Range;

use crate::error::DecodeError;
use crate::frame::{DecodedFrame, FrameDecoder, FrameKind, SegmentHeader, SysConfig};

pub(crate) const ACC_1G: i64 = 4096;

/// A frame the scripted decoder will emit
#[derive(Debug, Clone)]
pub(crate) struct ScriptedFrame {
    pub valid: bool,
    pub kind: FrameKind,
    pub offset: usize,
    pub fields: Vec<i64>,
}

impl ScriptedFrame {
    fn main(kind: FrameKind, offset: usize, time: i64, motors: &[i64]) -> Self {
        // loopIteration, time, gyro x3, acc x3, motors
        let mut fields = vec![0, time, 0, 0, 0, 0, 0, ACC_1G];
        fields.extend_from_slice(motors);
        ScriptedFrame {
            valid: true,
            kind,
            offset,
            fields,
        }
    }

    pub fn intra(offset: usize, time: i64) -> Self {
        Self::main(FrameKind::Intra, offset, time, &[])
    }

    pub fn intra_with_motors(offset: usize, time: i64, motors: &[i64]) -> Self {
        Self::main(FrameKind::Intra, offset, time, motors)
    }

    pub fn inter(offset: usize, time: i64) -> Self {
        Self::main(FrameKind::Inter, offset, time, &[])
    }

    pub fn event(offset: usize) -> Self {
        ScriptedFrame {
            valid: true,
            kind: FrameKind::Event,
            offset,
            fields: Vec::new(),
        }
    }

    pub fn invalid(mut self) -> Self {
        self.valid = false;
        self
    }

    pub fn with_gyro(mut self, gyro: [i64; 3]) -> Self {
        self.fields[2..5].copy_from_slice(&gyro);
        self
    }
}

/// Header with time, gyro, accelerometer and `motors` motor channels
pub(crate) fn header_with_motors(motors: usize) -> SegmentHeader {
    let mut field_indices = HashMap::new();
    field_indices.insert("loopIteration".to_string(), 0);
    field_indices.insert("time".to_string(), 1);
    for axis in 0..3 {
        field_indices.insert(format!("gyroADC[{}]", axis), 2 + axis);
        field_indices.insert(format!("accSmooth[{}]", axis), 5 + axis);
    }
    for channel in 0..motors {
        field_indices.insert(format!("motor[{}]", channel), 8 + channel);
    }
    SegmentHeader {
        field_indices,
        sys_config: SysConfig {
            acc_1g: ACC_1G as f64,
            gyro_scale: 1e-6,
        },
    }
}

/// Decoder that replays pre-scripted frames, keyed by segment start offset
#[derive(Debug, Default)]
pub(crate) struct ScriptedDecoder {
    segments: HashMap<usize, (SegmentHeader, Vec<ScriptedFrame>)>,
    failing_frames: HashMap<usize, usize>,
    current: Option<usize>,
    pub header_calls: usize,
}

impl ScriptedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_segment(
        mut self,
        start: usize,
        header: SegmentHeader,
        frames: Vec<ScriptedFrame>,
    ) -> Self {
        self.segments.insert(start, (header, frames));
        self
    }

    /// Make the frame pass of the segment at `start` fail at `offset`
    pub fn failing_frames_at(mut self, start: usize, offset: usize) -> Self {
        self.failing_frames.insert(start, offset);
        self
    }
}

impl FrameDecoder for ScriptedDecoder {
    fn parse_header(
        &mut self,
        _log: &[u8],
        range: Range<usize>,
    ) -> Result<SegmentHeader, DecodeError> {
        self.header_calls += 1;
        match self.segments.get(&range.start) {
            Some((header, _)) => {
                self.current = Some(range.start);
                Ok(header.clone())
            }
            None => Err(DecodeError::Header(format!(
                "no header at offset {}",
                range.start
            ))),
        }
    }

    fn parse_frames(
        &mut self,
        _log: &[u8],
        range: Range<usize>,
        on_frame: &mut dyn FnMut(&DecodedFrame<'_>),
    ) -> Result<(), DecodeError> {
        if self.current != Some(range.start) {
            return Err(DecodeError::Header("header not parsed".to_string()));
        }
        let Some((_, frames)) = self.segments.get(&range.start) else {
            return Ok(());
        };

        for (i, frame) in frames.iter().enumerate() {
            if self.failing_frames.get(&range.start) == Some(&frame.offset) {
                return Err(DecodeError::Frame {
                    offset: frame.offset,
                    reason: "scripted failure".to_string(),
                });
            }
            let size = frames
                .get(i + 1)
                .map(|next| next.offset - frame.offset)
                .unwrap_or(1);
            on_frame(&DecodedFrame {
                valid: frame.valid,
                fields: &frame.fields,
                kind: frame.kind,
                offset: frame.offset,
                size,
            });
        }
        Ok(())
    }
}
