//! Flight log index
//!
//! Ties the locator, the directory builder and the saved index format together
//! behind lazily built, memoised state. Segment bounds are computed on the
//! first segment query and directories on the first directory query; each is
//! built at most once per index, even under concurrent first access.

use std::marker::PhantomData;
use std::ops::Range;
use std::sync::{Mutex, PoisonError};

use log::{info, warn};
use once_cell::sync::OnceCell;

use crate::codec;
use crate::config::IndexConfig;
use crate::directory::{build_directories, IntraframeDirectory};
use crate::error::IndexError;
use crate::frame::FrameDecoder;
use crate::imu::{AttitudeEstimator, ComplementaryImu};
use crate::locator::{locate_segments_with_marker, SegmentBounds, FLIGHT_LOG_START_MARKER};

/// Navigable index over a buffer of concatenated blackbox logs
pub struct FlightLogIndex<'a, D, E = ComplementaryImu> {
    log: &'a [u8],
    marker: &'a [u8],
    config: IndexConfig,
    decoder: Mutex<D>,
    bounds: OnceCell<SegmentBounds>,
    directories: OnceCell<Vec<IntraframeDirectory>>,
    _estimator: PhantomData<fn() -> E>,
}

impl<'a, D: FrameDecoder> FlightLogIndex<'a, D, ComplementaryImu> {
    /// Index `log` with the default settings and attitude estimator
    pub fn new(log: &'a [u8], decoder: D) -> Self {
        FlightLogIndex {
            log,
            marker: FLIGHT_LOG_START_MARKER,
            config: IndexConfig::default(),
            decoder: Mutex::new(decoder),
            bounds: OnceCell::new(),
            directories: OnceCell::new(),
            _estimator: PhantomData,
        }
    }
}

impl<'a, D, E> FlightLogIndex<'a, D, E>
where
    D: FrameDecoder,
    E: AttitudeEstimator + Default,
{
    /// Index `log` with custom settings; `E::default()` creates the
    /// estimator for each segment.
    pub fn with_config(log: &'a [u8], decoder: D, config: IndexConfig) -> Result<Self, IndexError> {
        config.validate()?;
        Ok(FlightLogIndex {
            log,
            marker: FLIGHT_LOG_START_MARKER,
            config,
            decoder: Mutex::new(decoder),
            bounds: OnceCell::new(),
            directories: OnceCell::new(),
            _estimator: PhantomData,
        })
    }

    /// Use a different segment start marker
    pub fn with_marker(mut self, marker: &'a [u8]) -> Self {
        self.marker = marker;
        self.bounds = OnceCell::new();
        self.directories = OnceCell::new();
        self
    }

    /// The raw log buffer
    pub fn log(&self) -> &'a [u8] {
        self.log
    }

    /// Segment bounds, located on first use
    pub fn segment_bounds(&self) -> &SegmentBounds {
        self.bounds
            .get_or_init(|| locate_segments_with_marker(self.log, self.marker))
    }

    /// Number of logs in the buffer
    pub fn segment_count(&self) -> usize {
        self.segment_bounds().segment_count()
    }

    /// Byte offset where log `index` begins
    pub fn segment_start_offset(&self, index: usize) -> Option<usize> {
        self.segment_bounds().start(index)
    }

    /// Byte range of log `index`
    pub fn segment_range(&self, index: usize) -> Option<Range<usize>> {
        self.segment_bounds().range(index)
    }

    /// Whether directories have been built or restored
    pub fn has_directories(&self) -> bool {
        self.directories.get().is_some()
    }

    /// Directories of every segment, built on first use.
    ///
    /// A decoder failure is returned and nothing is cached, so a later call
    /// tries again.
    pub fn directories(&self) -> Result<&[IntraframeDirectory], IndexError> {
        self.directories
            .get_or_try_init(|| -> Result<_, IndexError> {
                let bounds = self.segment_bounds();
                let mut decoder = self.decoder.lock().unwrap_or_else(PoisonError::into_inner);
                let directories =
                    build_directories(self.log, bounds, &mut *decoder, E::default, &self.config)?;
                info!(
                    "Built intraframe directories for {} segment(s)",
                    directories.len()
                );
                Ok(directories)
            })
            .map(Vec::as_slice)
    }

    /// Directory of segment `index`
    pub fn directory(&self, index: usize) -> Result<Option<&IntraframeDirectory>, IndexError> {
        Ok(self.directories()?.get(index))
    }

    /// Save the directories (building them if needed) as JSON text
    pub fn save_to_json(&self) -> Result<String, IndexError> {
        codec::serialize_directories(self.directories()?)
    }

    /// Restore directories from text produced by [`FlightLogIndex::save_to_json`].
    ///
    /// The saved index must describe exactly the segments of this log, and
    /// directories must not have been built or restored already.
    pub fn load_from_json(&self, json: &str) -> Result<(), IndexError> {
        if self.has_directories() {
            return Err(IndexError::AlreadyBuilt);
        }

        let directories = codec::deserialize_directories(json)?;
        let expected = self.segment_count();
        if directories.len() != expected {
            warn!(
                "Rejecting saved index with {} directories for a log with {} segments",
                directories.len(),
                expected
            );
            return Err(IndexError::SegmentCountMismatch {
                expected,
                actual: directories.len(),
            });
        }

        self.directories
            .set(directories)
            .map_err(|_| IndexError::AlreadyBuilt)
    }

    /// Give back the decoder
    pub fn into_decoder(self) -> D {
        self.decoder
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
