//! # blackbox-index
//!
//! Command-line front end for `blackbox-core`.
//!
//! - `segments <LOG>` lists the logs found in a blackbox file
//! - `inspect <INDEX>` summarises a saved intraframe index, optionally checked
//!   against the blackbox file it was built from
//!
//! Building directories needs a frame decoder, which this tool does not ship;
//! indexes are produced by the viewer and inspected here.

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use blackbox_core::{
    deserialize_directories, locate_segments, DecodeError, DecodedFrame, FlightLogIndex,
    FrameDecoder, IntraframeDirectory, SegmentHeader,
};
use clap::{Parser, Subcommand};
use log::{debug, info};
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::Serialize;

#[derive(Parser, Clone, Debug)]
#[command(version, about = "Inspect blackbox flight logs and their saved seek indexes")]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// List the logs contained in a blackbox file
    Segments {
        /// Blackbox file (.bbl, .bfl, .txt)
        log: PathBuf,

        /// Print JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Summarise a saved intraframe index
    Inspect {
        /// Saved index (JSON)
        index: PathBuf,

        /// Blackbox file the index belongs to; enables segment checks and chunk byte ranges
        #[arg(short, long)]
        log: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct SegmentSummary {
    index: usize,
    start: usize,
    length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct DirectorySummary {
    chunks: usize,
    min_time: Option<i64>,
    max_time: Option<i64>,
    event_chunks: usize,
    throttle_range: Option<(i32, i32)>,
    byte_range: Option<Range<usize>>,
}

/// Stand-in decoder: this tool only restores saved directories
struct NoFrameDecoder;

impl FrameDecoder for NoFrameDecoder {
    fn parse_header(
        &mut self,
        _log: &[u8],
        _range: Range<usize>,
    ) -> Result<SegmentHeader, DecodeError> {
        Err(DecodeError::Header(
            "frame decoding is not available in blackbox-index".to_string(),
        ))
    }

    fn parse_frames(
        &mut self,
        _log: &[u8],
        _range: Range<usize>,
        _on_frame: &mut dyn FnMut(&DecodedFrame<'_>),
    ) -> Result<(), DecodeError> {
        Err(DecodeError::Header(
            "frame decoding is not available in blackbox-index".to_string(),
        ))
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Cannot read {}", path.display()))
}

fn segment_summaries(log: &[u8]) -> Vec<SegmentSummary> {
    locate_segments(log)
        .ranges()
        .enumerate()
        .map(|(index, range)| SegmentSummary {
            index,
            start: range.start,
            length: range.len(),
        })
        .collect()
}

fn summarise(dir: &IntraframeDirectory, segment: Option<Range<usize>>) -> DirectorySummary {
    let throttle_range = dir
        .avg_throttle
        .iter()
        .min()
        .zip(dir.avg_throttle.iter().max())
        .map(|(&min, &max)| (min, max));

    DirectorySummary {
        chunks: dir.chunk_count(),
        min_time: dir.min_time,
        max_time: dir.max_time,
        event_chunks: dir.has_event.iter().filter(|&&event| event).count(),
        throttle_range,
        byte_range: segment.map(|range| {
            let start = dir.offsets.first().copied().unwrap_or(range.start);
            start..range.end
        }),
    }
}

fn inspect_summaries(index_json: &str, log: Option<&[u8]>) -> Result<Vec<DirectorySummary>> {
    match log {
        Some(log) => {
            let index = FlightLogIndex::new(log, NoFrameDecoder);
            index
                .load_from_json(index_json)
                .into_diagnostic()
                .wrap_err("Saved index does not match the log")?;
            let directories = index.directories().into_diagnostic()?;
            Ok(directories
                .iter()
                .enumerate()
                .map(|(i, dir)| summarise(dir, index.segment_range(i)))
                .collect())
        }
        None => {
            let directories = deserialize_directories(index_json).into_diagnostic()?;
            Ok(directories.iter().map(|dir| summarise(dir, None)).collect())
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Segments { log, json } => {
            let data = read_file(&log)?;
            let segments = segment_summaries(&data);
            info!("{}: {} log(s)", log.display(), segments.len());

            if json {
                println!("{}", serde_json::to_string_pretty(&segments).into_diagnostic()?);
            } else {
                println!("{:>5} {:>12} {:>12}", "log", "start", "length");
                for segment in &segments {
                    println!(
                        "{:>5} {:>12} {:>12}",
                        segment.index, segment.start, segment.length
                    );
                }
            }
        }
        Command::Inspect { index, log } => {
            let json = fs::read_to_string(&index)
                .into_diagnostic()
                .wrap_err_with(|| format!("Cannot read {}", index.display()))?;
            let data = log.as_deref().map(read_file).transpose()?;
            debug!("Inspecting {} ({} bytes)", index.display(), json.len());

            let summaries = inspect_summaries(&json, data.as_deref())?;
            for (i, summary) in summaries.iter().enumerate() {
                println!(
                    "log {}: {} chunks, time {:?}..{:?}, {} chunk(s) with events",
                    i, summary.chunks, summary.min_time, summary.max_time, summary.event_chunks
                );
                if let Some((min, max)) = summary.throttle_range {
                    println!("    throttle {}..{}", min, max);
                }
                if let Some(range) = &summary.byte_range {
                    println!("    bytes {}..{}", range.start, range.end);
                }
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    run(cli)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blackbox_core::{serialize_directories, AttitudeSnapshot, FLIGHT_LOG_START_MARKER};
    use std::io::Write;

    fn two_logs() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(FLIGHT_LOG_START_MARKER);
        data.extend_from_slice(&[1u8; 40]);
        data.extend_from_slice(FLIGHT_LOG_START_MARKER);
        data.extend_from_slice(&[2u8; 20]);
        data
    }

    fn directory(offsets: Vec<usize>) -> IntraframeDirectory {
        let n = offsets.len();
        IntraframeDirectory {
            times: (0..n as i64).map(|i| 1000 + i * 400).collect(),
            offsets,
            avg_throttle: vec![1100; n],
            initial_imu: vec![AttitudeSnapshot::default(); n],
            has_event: (0..n).map(|i| i == 0).collect(),
            min_time: Some(1000),
            max_time: Some(5000),
        }
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::parse_from(["blackbox-index", "-v", "segments", "flight.bbl", "--json"]);
        assert!(matches!(cli.command, Command::Segments { json: true, .. }));

        let cli = Cli::parse_from(["blackbox-index", "inspect", "index.json", "-l", "f.bbl"]);
        assert!(matches!(cli.command, Command::Inspect { log: Some(_), .. }));
    }

    #[test]
    fn test_segment_summaries_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&two_logs()).unwrap();

        let data = read_file(file.path()).unwrap();
        let segments = segment_summaries(&data);
        let marker = FLIGHT_LOG_START_MARKER.len();

        assert_eq!(
            segments,
            vec![
                SegmentSummary {
                    index: 0,
                    start: 0,
                    length: marker + 40
                },
                SegmentSummary {
                    index: 1,
                    start: marker + 40,
                    length: marker + 20
                },
            ]
        );
    }

    #[test]
    fn test_inspect_without_log() {
        let json = serialize_directories(&[directory(vec![70, 90])]).unwrap();
        let summaries = inspect_summaries(&json, None).unwrap();

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].chunks, 2);
        assert_eq!(summaries[0].event_chunks, 1);
        assert_eq!(summaries[0].throttle_range, Some((1100, 1100)));
        assert_eq!(summaries[0].byte_range, None);
    }

    #[test]
    fn test_inspect_against_log() {
        let data = two_logs();
        let marker = FLIGHT_LOG_START_MARKER.len();
        let json =
            serialize_directories(&[directory(vec![marker + 2]), directory(vec![])]).unwrap();

        let summaries = inspect_summaries(&json, Some(&data)).unwrap();
        assert_eq!(summaries[0].byte_range, Some(marker + 2..marker + 40));
        assert_eq!(summaries[1].chunks, 0);
        assert_eq!(summaries[1].byte_range, Some(marker + 40..data.len()));
    }

    #[test]
    fn test_inspect_rejects_mismatched_log() {
        let json = serialize_directories(&[directory(vec![5])]).unwrap();
        assert!(inspect_summaries(&json, Some(&two_logs())).is_err());
    }
}
