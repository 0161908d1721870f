//! Attitude estimation
//!
//! Complementary filter that integrates gyro rates into a gravity estimate and
//! pulls it back towards the accelerometer reading whenever the measured
//! acceleration is close to 1 g. Heading comes from the magnetometer when one
//! is logged, otherwise from a synthetic north vector rotated by the gyro.
//!
//! The directory builder only needs [`AttitudeEstimator`]; [`ComplementaryImu`]
//! is the default implementation.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Weight of the gyro-propagated gravity estimate against one accelerometer sample
const GYRO_CMPF_FACTOR: f64 = 600.0;
/// Weight of the gyro-propagated magnetic estimate against one magnetometer sample
const GYRO_CMPFM_FACTOR: f64 = 250.0;

const INV_GYRO_CMPF_FACTOR: f64 = 1.0 / (GYRO_CMPF_FACTOR + 1.0);
const INV_GYRO_CMPFM_FACTOR: f64 = 1.0 / (GYRO_CMPFM_FACTOR + 1.0);

/// Accelerometer correction only applies while |acc|² / 1g² * 100 is inside this
/// window (0.85 g .. 1.15 g).
const ACC_MAG_MIN: f64 = 72.0;
const ACC_MAG_MAX: f64 = 133.0;

const MAGNETIC_DECLINATION: f64 = 0.0;

/// One set of raw sensor readings fed to the estimator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuSample {
    /// Gyro rates (roll, pitch, yaw) in raw units
    pub gyro: [f64; 3],
    /// Smoothed accelerometer reading (x, y, z) in raw units
    pub acc: [f64; 3],
    /// Magnetometer reading, when the log has one
    pub mag: Option<[f64; 3]>,
    /// Sample time in microseconds
    pub time: i64,
    /// Accelerometer reading that corresponds to 1 g
    pub acc_1g: f64,
    /// Radians per microsecond per raw gyro unit
    pub gyro_scale: f64,
}

/// Estimated orientation, all angles in radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Attitude {
    pub roll: f64,
    pub pitch: f64,
    /// Heading in `[0, 2π)`
    pub heading: f64,
}

/// Frozen copy of an estimator's internal state.
///
/// A snapshot is an independent value; later updates of the estimator it was
/// taken from do not affect it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttitudeSnapshot {
    /// Gravity direction estimate
    pub estimate_gyro: [f64; 3],
    /// Synthetic north estimate (used when no magnetometer is logged)
    pub estimate_north: [f64; 3],
    /// Magnetic field estimate
    pub estimate_mag: [f64; 3],
    /// Time of the last applied sample
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub previous_time: Option<i64>,
}

impl Default for AttitudeSnapshot {
    fn default() -> Self {
        ComplementaryImu::new().snapshot()
    }
}

/// Attitude estimator driven by the directory builder
pub trait AttitudeEstimator {
    /// Apply one sample and return the new attitude estimate
    fn update(&mut self, sample: &ImuSample) -> Attitude;

    /// Copy the current internal state
    fn snapshot(&self) -> AttitudeSnapshot;
}

/// Complementary-filter attitude estimator
#[derive(Debug, Clone)]
pub struct ComplementaryImu {
    estimate_gyro: Vector3<f64>,
    estimate_north: Vector3<f64>,
    estimate_mag: Vector3<f64>,
    previous_time: Option<i64>,
}

impl Default for ComplementaryImu {
    fn default() -> Self {
        Self::new()
    }
}

impl ComplementaryImu {
    /// Create an estimator with no orientation history
    pub fn new() -> Self {
        ComplementaryImu {
            estimate_gyro: Vector3::zeros(),
            estimate_north: Vector3::new(1.0, 0.0, 0.0),
            estimate_mag: Vector3::zeros(),
            previous_time: None,
        }
    }

    /// Resume from a snapshot, e.g. the initial state of a directory chunk
    pub fn from_snapshot(snapshot: &AttitudeSnapshot) -> Self {
        ComplementaryImu {
            estimate_gyro: Vector3::from(snapshot.estimate_gyro),
            estimate_north: Vector3::from(snapshot.estimate_north),
            estimate_mag: Vector3::from(snapshot.estimate_mag),
            previous_time: snapshot.previous_time,
        }
    }

    /// Forget all history
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl AttitudeEstimator for ComplementaryImu {
    fn update(&mut self, sample: &ImuSample) -> Attitude {
        // The very first sample has no predecessor to measure a step from
        let delta_time = match self.previous_time {
            Some(previous) => (sample.time - previous) as f64,
            None => 1.0,
        };
        self.previous_time = Some(sample.time);

        let gyro = Vector3::from(sample.gyro);
        let acc = Vector3::from(sample.acc);
        let delta_angle = gyro * (delta_time * sample.gyro_scale);

        let acc_mag = acc.norm_squared() * 100.0 / (sample.acc_1g * sample.acc_1g);

        self.estimate_gyro = rotate(&self.estimate_gyro, &delta_angle);

        // Outside the window the craft is accelerating; trust the gyro alone
        if ACC_MAG_MIN < acc_mag && acc_mag < ACC_MAG_MAX {
            self.estimate_gyro = (self.estimate_gyro * GYRO_CMPF_FACTOR + acc) * INV_GYRO_CMPF_FACTOR;
        }

        let g = &self.estimate_gyro;
        let roll = g.y.atan2(g.z);
        let pitch = (-g.x).atan2((g.y * g.y + g.z * g.z).sqrt());

        let heading = match sample.mag {
            Some(mag) => {
                self.estimate_mag = rotate(&self.estimate_mag, &delta_angle);
                self.estimate_mag = (self.estimate_mag * GYRO_CMPFM_FACTOR + Vector3::from(mag))
                    * INV_GYRO_CMPFM_FACTOR;
                calculate_heading(&self.estimate_mag, roll, pitch)
            }
            None => {
                let rotated = rotate(&self.estimate_north, &delta_angle);
                let norm = rotated.norm();
                self.estimate_north = if norm > 0.0 { rotated / norm } else { rotated };
                calculate_heading(&self.estimate_north, roll, pitch)
            }
        };

        Attitude {
            roll,
            pitch,
            heading,
        }
    }

    fn snapshot(&self) -> AttitudeSnapshot {
        AttitudeSnapshot {
            estimate_gyro: [self.estimate_gyro.x, self.estimate_gyro.y, self.estimate_gyro.z],
            estimate_north: [
                self.estimate_north.x,
                self.estimate_north.y,
                self.estimate_north.z,
            ],
            estimate_mag: [self.estimate_mag.x, self.estimate_mag.y, self.estimate_mag.z],
            previous_time: self.previous_time,
        }
    }
}

/// Rotate `v` by the small angles `delta` (roll, pitch, yaw)
fn rotate(v: &Vector3<f64>, delta: &Vector3<f64>) -> Vector3<f64> {
    let (sinx, cosx) = delta.x.sin_cos();
    let (siny, cosy) = delta.y.sin_cos();
    let (sinz, cosz) = delta.z.sin_cos();

    let coszcosx = cosz * cosx;
    let sinzcosx = sinz * cosx;
    let coszsinx = sinx * cosz;
    let sinzsinx = sinx * sinz;

    let mat = Matrix3::new(
        cosz * cosy,
        -cosy * sinz,
        siny,
        sinzcosx + coszsinx * siny,
        coszcosx - sinzsinx * siny,
        -sinx * cosy,
        sinzsinx - coszcosx * siny,
        coszsinx + sinzcosx * siny,
        cosy * cosx,
    );

    mat.transpose() * v
}

/// Tilt-compensated heading of `vec` in `[0, 2π)`
fn calculate_heading(vec: &Vector3<f64>, roll: f64, pitch: f64) -> f64 {
    let (sin_roll, cos_roll) = roll.sin_cos();
    let (sin_pitch, cos_pitch) = pitch.sin_cos();

    let heading_x =
        vec.x * cos_pitch + vec.y * sin_roll * sin_pitch + vec.z * sin_pitch * cos_roll;
    let heading_y = vec.y * cos_roll - vec.z * sin_roll;

    let heading = heading_y.atan2(heading_x) + MAGNETIC_DECLINATION;
    if heading < 0.0 {
        heading + 2.0 * PI
    } else {
        heading
    }
}
