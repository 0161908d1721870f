//! Intraframe directories
//!
//! Inter frames can only be decoded by replaying everything since the previous
//! intra frame, so seeking inside a log means starting at an intra frame. A
//! directory records where every 4th intra frame of a segment lives, together
//! with the attitude estimate just before it, so a viewer can jump to any time
//! and resume attitude tracking without replaying the segment from the start.
//!
//! Directories are built in one forward pass per segment:
//!
//! ```text
//!  frames:  I  P  P  E  I  P  I  P  I  P  I  ...
//!  intra#:  0           1     2     3     4
//!  chunks:  [0 ......................... ][1 ...
//!  events:           ^ has_event[0]
//! ```

use std::ops::Range;

use log::{debug, trace, warn};

use crate::config::IndexConfig;
use crate::error::{DecodeError, IndexError};
use crate::frame::{DecodedFrame, FrameDecoder, FrameKind, SegmentHeader, SysConfig};
use crate::imu::{AttitudeEstimator, AttitudeSnapshot, ImuSample};
use crate::locator::SegmentBounds;

/// Seek directory of one log segment.
///
/// `times`, `offsets`, `initial_imu` and `has_event` hold one entry per chunk.
/// `avg_throttle` does too, unless the segment logged no motor outputs, in
/// which case it is empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IntraframeDirectory {
    /// Time of the first frame of each chunk (microseconds)
    pub times: Vec<i64>,
    /// Byte offset of the first frame of each chunk
    pub offsets: Vec<usize>,
    /// Mean motor output of the first frame of each chunk
    pub avg_throttle: Vec<i32>,
    /// Attitude state before the first frame of each chunk was applied
    pub initial_imu: Vec<AttitudeSnapshot>,
    /// Whether an event frame was seen while the chunk was current
    pub has_event: Vec<bool>,
    /// Time of the first valid I/P frame of the segment
    pub min_time: Option<i64>,
    /// Largest I/P frame time of the segment
    pub max_time: Option<i64>,
}

impl IntraframeDirectory {
    /// Number of chunks
    pub fn chunk_count(&self) -> usize {
        self.times.len()
    }

    /// Whether the segment had no chunk-starting intra frame
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Whether throttle summaries were recorded
    pub fn has_throttle(&self) -> bool {
        !self.avg_throttle.is_empty()
    }

    /// Chunk to start decoding from to reach `time`: the last chunk starting at
    /// or before `time`, or the first chunk when `time` precedes them all.
    pub fn chunk_for_time(&self, time: i64) -> Option<usize> {
        if self.times.is_empty() {
            return None;
        }
        Some(self.times.partition_point(|&t| t <= time).saturating_sub(1))
    }

    /// Byte range of chunk `index`; the last chunk runs to `segment_end`
    pub fn chunk_range(&self, index: usize, segment_end: usize) -> Option<Range<usize>> {
        let start = *self.offsets.get(index)?;
        let end = self.offsets.get(index + 1).copied().unwrap_or(segment_end);
        Some(start..end)
    }
}

/// Main frame field positions used while indexing one segment
#[derive(Debug, Clone, PartialEq)]
struct FieldMap {
    gyro: [usize; 3],
    acc: [usize; 3],
    mag: Option<[usize; 3]>,
    motors: Vec<usize>,
}

impl FieldMap {
    fn resolve(header: &SegmentHeader, config: &IndexConfig) -> Result<Self, DecodeError> {
        let gyro = axis_fields(header, &["gyroADC", "gyroData"])
            .ok_or_else(|| DecodeError::MissingField("gyroADC[0..2]".to_string()))?;
        let acc = axis_fields(header, &["accSmooth"])
            .ok_or_else(|| DecodeError::MissingField("accSmooth[0..2]".to_string()))?;
        // A partial magnetometer triple is as good as none
        let mag = axis_fields(header, &["magADC"]);

        let motors = (0..config.max_motor_channels)
            .filter_map(|channel| header.field_index(&format!("motor[{}]", channel)))
            .collect();

        Ok(FieldMap {
            gyro,
            acc,
            mag,
            motors,
        })
    }

    fn triple(&self, frame: &DecodedFrame<'_>, indices: &[usize; 3]) -> [f64; 3] {
        indices.map(|index| frame.field(index).unwrap_or(0) as f64)
    }

    fn sample(&self, frame: &DecodedFrame<'_>, time: i64, sys_config: &SysConfig) -> ImuSample {
        ImuSample {
            gyro: self.triple(frame, &self.gyro),
            acc: self.triple(frame, &self.acc),
            mag: self.mag.as_ref().map(|mag| self.triple(frame, mag)),
            time,
            acc_1g: sys_config.acc_1g,
            gyro_scale: sys_config.gyro_scale,
        }
    }

    /// Rounded mean of the motor outputs, `None` without motor fields
    fn average_throttle(&self, frame: &DecodedFrame<'_>) -> Option<i32> {
        if self.motors.is_empty() {
            return None;
        }
        let total: i64 = self
            .motors
            .iter()
            .map(|&index| frame.field(index).unwrap_or(0))
            .sum();
        let mean = total as f64 / self.motors.len() as f64;
        Some((mean + 0.5).floor() as i32)
    }
}

/// Positions of `<prefix>[0]`..`<prefix>[2]` for the first prefix that has all three
fn axis_fields(header: &SegmentHeader, prefixes: &[&str]) -> Option<[usize; 3]> {
    prefixes.iter().find_map(|prefix| {
        Some([
            header.field_index(&format!("{}[0]", prefix))?,
            header.field_index(&format!("{}[1]", prefix))?,
            header.field_index(&format!("{}[2]", prefix))?,
        ])
    })
}

/// Streaming state for one segment
struct DirectoryBuilder<E> {
    fields: FieldMap,
    sys_config: SysConfig,
    chunk_interval: usize,
    estimator: E,
    intra_count: usize,
    directory: IntraframeDirectory,
}

impl<E: AttitudeEstimator> DirectoryBuilder<E> {
    fn on_frame(&mut self, frame: &DecodedFrame<'_>) {
        if !frame.valid {
            return;
        }

        match frame.kind {
            FrameKind::Intra | FrameKind::Inter => self.on_main_frame(frame),
            FrameKind::Event => {
                // Events before the first chunk have nothing to attach to
                if let Some(last) = self.directory.has_event.last_mut() {
                    *last = true;
                }
            }
        }
    }

    fn on_main_frame(&mut self, frame: &DecodedFrame<'_>) {
        let Some(time) = frame.time() else {
            trace!("Skipping main frame without time field at {}", frame.offset);
            return;
        };

        let dir = &mut self.directory;
        if dir.min_time.is_none() {
            dir.min_time = Some(time);
        }
        if dir.max_time.map_or(true, |max| time > max) {
            dir.max_time = Some(time);
        }

        if frame.kind == FrameKind::Intra {
            if self.intra_count % self.chunk_interval == 0 {
                trace!(
                    "Chunk {} starts at offset {} time {}",
                    dir.times.len(),
                    frame.offset,
                    time
                );
                dir.times.push(time);
                dir.offsets.push(frame.offset);
                if let Some(throttle) = self.fields.average_throttle(frame) {
                    dir.avg_throttle.push(throttle);
                }
                // State before this frame, so replay from here applies it exactly once
                dir.initial_imu.push(self.estimator.snapshot());
                dir.has_event.push(false);
            }
            self.intra_count += 1;
        }

        let sample = self.fields.sample(frame, time, &self.sys_config);
        self.estimator.update(&sample);
    }
}

/// Build the directory of the segment occupying `range` of `log`.
///
/// `estimator` must be fresh; it is consumed by this segment.
pub fn build_directory<D, E>(
    log: &[u8],
    range: Range<usize>,
    decoder: &mut D,
    estimator: E,
    config: &IndexConfig,
) -> Result<IntraframeDirectory, DecodeError>
where
    D: FrameDecoder + ?Sized,
    E: AttitudeEstimator,
{
    let header = decoder.parse_header(log, range.clone())?;
    let fields = FieldMap::resolve(&header, config)?;

    let mut builder = DirectoryBuilder {
        fields,
        sys_config: header.sys_config,
        chunk_interval: config.chunk_interval.max(1),
        estimator,
        intra_count: 0,
        directory: IntraframeDirectory::default(),
    };

    decoder.parse_frames(log, range.clone(), &mut |frame: &DecodedFrame<'_>| {
        builder.on_frame(frame)
    })?;

    let directory = builder.directory;
    if directory.is_empty() {
        warn!(
            "Segment at {}..{} has no intra frames, directory is empty",
            range.start, range.end
        );
    } else {
        debug!(
            "Segment at {}..{}: {} chunks from {} intra frames, time {:?}..{:?}",
            range.start,
            range.end,
            directory.chunk_count(),
            builder.intra_count,
            directory.min_time,
            directory.max_time
        );
    }

    Ok(directory)
}

/// Build one directory per segment, in segment order.
///
/// Each segment gets its own estimator from `new_estimator`. The first decoder
/// failure aborts the whole build.
pub fn build_directories<D, E, F>(
    log: &[u8],
    bounds: &SegmentBounds,
    decoder: &mut D,
    new_estimator: F,
    config: &IndexConfig,
) -> Result<Vec<IntraframeDirectory>, IndexError>
where
    D: FrameDecoder + ?Sized,
    E: AttitudeEstimator,
    F: Fn() -> E,
{
    config.validate()?;

    bounds
        .ranges()
        .enumerate()
        .map(|(segment, range)| {
            build_directory(log, range, &mut *decoder, new_estimator(), config)
                .map_err(|source| IndexError::Decode { segment, source })
        })
        .collect()
}
