//! # Blackbox Core
//!
//! Segment locator and seek index for blackbox flight logs.
//!
//! A blackbox file holds one or more logs back to back. This crate finds the
//! logs in a raw buffer and, in a single forward pass per log, builds an
//! *intraframe directory*: the offset, time, throttle summary and attitude
//! estimate at every 4th intra frame. With a directory a viewer can jump to
//! any point of a log and resume decoding and attitude tracking from there.
//!
//! The crate does no I/O. The raw log arrives as a byte slice, and decoding
//! the frame format itself is delegated to a [`FrameDecoder`] implementation.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  FlightLogIndex (lazy, memoised)                         │
//! │  ├── locator/    segment bounds from start markers       │
//! │  ├── directory/  chunked seek directory per segment      │
//! │  │     ├── FrameDecoder      (external, frame stream)    │
//! │  │     └── AttitudeEstimator (ComplementaryImu)          │
//! │  └── codec/      delta-encoded JSON save/restore         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Modules
//!
//! - [`locator`] - Segment bounds from the product header marker
//! - [`frame`] - Frame decoder boundary ([`FrameDecoder`])
//! - [`imu`] - Attitude estimation ([`ComplementaryImu`])
//! - [`directory`] - Intraframe directory builder
//! - [`codec`] - Saved index format
//! - [`index`] - [`FlightLogIndex`], the query surface
//!
//! ## Example
//!
//! ```rust,ignore
//! use blackbox_core::FlightLogIndex;
//!
//! let index = FlightLogIndex::new(&log_bytes, MyDecoder::default());
//! for i in 0..index.segment_count() {
//!     let dir = index.directory(i)?.unwrap();
//!     println!("log {}: {} chunks", i, dir.chunk_count());
//! }
//! let saved = index.save_to_json()?;
//! ```

pub mod codec;
pub mod config;
pub mod directory;
pub mod error;
pub mod frame;
pub mod imu;
pub mod index;
pub mod locator;
pub mod stream;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use codec::{deserialize_directories, serialize_directories, SerializedDirectory};
pub use config::{IndexConfig, MAX_MOTOR_CHANNELS};
pub use directory::{build_directories, build_directory, IntraframeDirectory};
pub use error::{DecodeError, IndexError};
pub use frame::{DecodedFrame, FrameDecoder, FrameKind, SegmentHeader, SysConfig};
pub use imu::{Attitude, AttitudeEstimator, AttitudeSnapshot, ComplementaryImu, ImuSample};
pub use index::FlightLogIndex;
pub use locator::{locate_segments, SegmentBounds, FLIGHT_LOG_START_MARKER};
pub use stream::ByteStream;
