//! Saved index format
//!
//! Chunk start times and offsets grow almost linearly, so they are stored as
//! second-order differences: the first value is absolute, the second is a
//! plain delta and every later value is the change in delta. A steady log
//! encodes to a run of small numbers close to zero.
//!
//! ```text
//! times:    100  104  108  113
//! encoded:  100    4    0    1
//! ```
//!
//! Throttle averages are stored relative to 1000, the idle end of the usual
//! motor output range. The saved text is a JSON array with one entry per
//! segment.

use serde::{Deserialize, Serialize};

use crate::directory::IntraframeDirectory;
use crate::error::IndexError;
use crate::imu::AttitudeSnapshot;

/// Bias subtracted from throttle averages
pub const THROTTLE_BIAS: i32 = 1000;

/// On-disk form of an [`IntraframeDirectory`]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedDirectory {
    pub times: Vec<i64>,
    pub offsets: Vec<i64>,
    #[serde(default)]
    pub avg_throttle: Vec<i32>,
    #[serde(default, rename = "initialIMU")]
    pub initial_imu: Vec<AttitudeSnapshot>,
    #[serde(default)]
    pub has_event: Vec<bool>,
    pub min_time: Option<i64>,
    pub max_time: Option<i64>,
}

fn overflow(name: &str) -> IndexError {
    IndexError::Encoding(format!("{} overflows", name))
}

/// Narrow an exactly computed delta step back to `i64`
fn narrow(name: &str, value: i128) -> Result<i64, IndexError> {
    i64::try_from(value).map_err(|_| overflow(name))
}

fn delta_encode(name: &str, values: &[i64]) -> Result<Vec<i64>, IndexError> {
    let mut encoded = Vec::with_capacity(values.len());

    for (k, &value) in values.iter().enumerate() {
        let value = i128::from(value);
        let item = match k {
            0 => value,
            // The second value only has one predecessor
            1 => value - i128::from(values[0]),
            _ => value - 2 * i128::from(values[k - 1]) + i128::from(values[k - 2]),
        };
        encoded.push(narrow(name, item)?);
    }

    Ok(encoded)
}

fn delta_decode(name: &str, encoded: &[i64]) -> Result<Vec<i64>, IndexError> {
    let mut values: Vec<i64> = Vec::with_capacity(encoded.len());

    for (k, &item) in encoded.iter().enumerate() {
        let item = i128::from(item);
        let value = match k {
            0 => item,
            1 => item + i128::from(values[0]),
            _ => item + 2 * i128::from(values[k - 1]) - i128::from(values[k - 2]),
        };
        values.push(narrow(name, value)?);
    }

    Ok(values)
}

/// Encode a directory for saving. Lossless; see [`decode`].
///
/// Fails only when a second-order difference does not fit in an `i64`, which
/// takes times or offsets far outside anything a recorder produces.
pub fn encode(directory: &IntraframeDirectory) -> Result<SerializedDirectory, IndexError> {
    let offsets = directory
        .offsets
        .iter()
        .map(|&offset| i64::try_from(offset).map_err(|_| overflow("offsets")))
        .collect::<Result<Vec<_>, _>>()?;
    let avg_throttle = directory
        .avg_throttle
        .iter()
        .map(|&throttle| {
            throttle
                .checked_sub(THROTTLE_BIAS)
                .ok_or_else(|| overflow("avgThrottle"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SerializedDirectory {
        times: delta_encode("times", &directory.times)?,
        offsets: delta_encode("offsets", &offsets)?,
        avg_throttle,
        initial_imu: directory.initial_imu.clone(),
        has_event: directory.has_event.clone(),
        min_time: directory.min_time,
        max_time: directory.max_time,
    })
}

/// Restore a directory saved with [`encode`].
///
/// Rejects input whose per-chunk sequences disagree in length, whose values
/// overflow while being reconstructed, or whose reconstructed times and
/// offsets are not strictly increasing.
pub fn decode(serialized: SerializedDirectory) -> Result<IntraframeDirectory, IndexError> {
    let chunks = serialized.times.len();

    let check_len = |name: &str, len: usize| {
        if len == chunks {
            Ok(())
        } else {
            Err(IndexError::Encoding(format!(
                "{} has {} entries, expected {}",
                name, len, chunks
            )))
        }
    };
    check_len("offsets", serialized.offsets.len())?;
    check_len("initialIMU", serialized.initial_imu.len())?;
    check_len("hasEvent", serialized.has_event.len())?;
    if !serialized.avg_throttle.is_empty() {
        check_len("avgThrottle", serialized.avg_throttle.len())?;
    }

    let times = delta_decode("times", &serialized.times)?;
    if times.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(IndexError::Encoding(
            "chunk times are not strictly increasing".to_string(),
        ));
    }

    let offsets = delta_decode("offsets", &serialized.offsets)?
        .into_iter()
        .map(|offset| {
            usize::try_from(offset)
                .map_err(|_| IndexError::Encoding(format!("negative chunk offset {}", offset)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if offsets.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(IndexError::Encoding(
            "chunk offsets are not strictly increasing".to_string(),
        ));
    }

    let avg_throttle = serialized
        .avg_throttle
        .into_iter()
        .map(|throttle| {
            throttle
                .checked_add(THROTTLE_BIAS)
                .ok_or_else(|| overflow("avgThrottle"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(IntraframeDirectory {
        times,
        offsets,
        avg_throttle,
        initial_imu: serialized.initial_imu,
        has_event: serialized.has_event,
        min_time: serialized.min_time,
        max_time: serialized.max_time,
    })
}

/// Encode every directory into the saved JSON text
pub fn serialize_directories(directories: &[IntraframeDirectory]) -> Result<String, IndexError> {
    let encoded = directories
        .iter()
        .map(encode)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(serde_json::to_string(&encoded)?)
}

/// Parse saved JSON text back into directories
pub fn deserialize_directories(json: &str) -> Result<Vec<IntraframeDirectory>, IndexError> {
    let encoded: Vec<SerializedDirectory> = serde_json::from_str(json)?;
    encoded.into_iter().map(decode).collect()
}
