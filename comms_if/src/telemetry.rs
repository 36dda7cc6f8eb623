//! # Telemetry Communications Module
//!
//! The simulator delivers one [`TelemetryRecord`] per control cycle. All numeric values arrive as
//! text which, depending on the locale of the machine running the simulator, may use either a
//! decimal point or a decimal comma. [`Telemetry`] is the validated form of a record. Converting
//! into it normalises every numeric field and decodes the camera frame, so that the control core
//! never sees a field it cannot use.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{convert::TryFrom, fmt::Display};

use base64::DecodeError;
use image::{ImageError, RgbImage};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Separator used between the elements of list-valued fields, such as `position`.
const LIST_SEPARATOR: char = ';';

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A raw telemetry record, exactly as sent by the simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Current speed in world units per second
    pub speed: RawField,

    /// Current position as `"x;y"`
    pub position: RawField,

    /// Yaw angle in degrees
    pub yaw: RawField,

    /// Pitch angle in degrees
    pub pitch: RawField,

    /// Roll angle in degrees
    pub roll: RawField,

    /// Echo of the throttle currently applied
    pub throttle: RawField,

    /// Echo of the steering angle currently applied, in degrees
    pub steering_angle: RawField,

    /// Non-zero when the rover is close enough to a sample to pick it up
    pub near_sample: RawField,

    /// Non-zero while a pickup is in progress
    pub picking_up: RawField,

    /// Number of samples still remaining in the world
    pub sample_count: RawField,

    /// X positions of all samples as `"x0;x1;..."`, only required on the first record
    #[serde(default)]
    pub samples_x: Option<RawField>,

    /// Y positions of all samples as `"y0;y1;..."`, only required on the first record
    #[serde(default)]
    pub samples_y: Option<RawField>,

    /// The front camera image, base64 encoded PNG or JPEG
    pub image: String,
}

/// A validated telemetry packet.
#[derive(Debug, Clone)]
pub struct Telemetry {
    /// Current speed in world units per second
    pub speed: f64,

    /// Position of the rover in the world frame
    pub position: (f64, f64),

    /// Yaw angle in degrees
    pub yaw: f64,

    /// Pitch angle in degrees
    pub pitch: f64,

    /// Roll angle in degrees
    pub roll: f64,

    /// Echo of the throttle currently applied
    pub throttle: f64,

    /// Echo of the steering angle currently applied, in degrees
    pub steer: f64,

    /// True when the rover is close enough to a sample to pick it up
    pub near_sample: bool,

    /// True while a pickup is in progress
    pub picking_up: bool,

    /// Number of samples still remaining in the world
    pub sample_count: u32,

    /// Known positions of all samples, if included in the record
    pub samples_pos: Option<Vec<(f64, f64)>>,

    /// The decoded front camera image
    pub image: RgbImage,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A single telemetry value.
///
/// The simulator sends text, but recorded logs may hold plain JSON numbers or booleans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawField {
    Text(String),
    Number(f64),
    Flag(bool),
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Telemetry field `{field}` could not be parsed (got {value:?})")]
    MalformedField { field: &'static str, value: String },

    #[error("Sample position lists have different lengths ({x} x values, {y} y values)")]
    SampleListMismatch { x: usize, y: usize },

    #[error("Failed to decode camera image from base64: {0}")]
    ImageDecodeError(DecodeError),

    #[error("Failed to load the camera image: {0}")]
    ImageLoadError(ImageError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TryFrom<TelemetryRecord> for Telemetry {
    type Error = TelemetryError;

    fn try_from(record: TelemetryRecord) -> Result<Self, Self::Error> {
        // Parse the position pair
        let position = match parse_list("position", &record.position)?.as_slice() {
            &[x, y] => (x, y),
            _ => return Err(malformed("position", &record.position)),
        };

        // Sample positions are only sent on the first cycle
        let samples_pos = match (&record.samples_x, &record.samples_y) {
            (Some(xs), Some(ys)) => {
                let xs = parse_list("samples_x", xs)?;
                let ys = parse_list("samples_y", ys)?;

                if xs.len() != ys.len() {
                    return Err(TelemetryError::SampleListMismatch {
                        x: xs.len(),
                        y: ys.len(),
                    });
                }

                Some(xs.into_iter().zip(ys).collect())
            }
            _ => None,
        };

        Ok(Self {
            speed: parse_decimal("speed", &record.speed)?,
            position,
            yaw: parse_decimal("yaw", &record.yaw)?,
            pitch: parse_decimal("pitch", &record.pitch)?,
            roll: parse_decimal("roll", &record.roll)?,
            throttle: parse_decimal("throttle", &record.throttle)?,
            steer: parse_decimal("steering_angle", &record.steering_angle)?,
            near_sample: parse_flag("near_sample", &record.near_sample)?,
            picking_up: parse_flag("picking_up", &record.picking_up)?,
            sample_count: parse_count("sample_count", &record.sample_count)?,
            samples_pos,
            image: decode_image(&record.image)?,
        })
    }
}

impl Display for RawField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawField::Text(s) => write!(f, "{}", s),
            RawField::Number(n) => write!(f, "{}", n),
            RawField::Flag(b) => write!(f, "{}", b),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse a decimal number written with either a decimal point or a decimal comma.
///
/// Returns `None` if the text is not a finite number under either convention.
pub fn parse_decimal_str(text: &str) -> Option<f64> {
    let text = text.trim();

    let value: f64 = if text.contains(',') {
        text.replace(',', ".").parse().ok()?
    } else {
        text.parse().ok()?
    };

    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn malformed(field: &'static str, value: &RawField) -> TelemetryError {
    TelemetryError::MalformedField {
        field,
        value: value.to_string(),
    }
}

fn parse_decimal(field: &'static str, raw: &RawField) -> Result<f64, TelemetryError> {
    match raw {
        RawField::Text(s) => parse_decimal_str(s),
        RawField::Number(n) if n.is_finite() => Some(*n),
        _ => None,
    }
    .ok_or_else(|| malformed(field, raw))
}

fn parse_list(field: &'static str, raw: &RawField) -> Result<Vec<f64>, TelemetryError> {
    match raw {
        RawField::Text(s) => s
            .split(LIST_SEPARATOR)
            .map(|v| parse_decimal_str(v).ok_or_else(|| malformed(field, raw)))
            .collect(),
        _ => Err(malformed(field, raw)),
    }
}

fn parse_flag(field: &'static str, raw: &RawField) -> Result<bool, TelemetryError> {
    match raw {
        RawField::Flag(b) => Ok(*b),
        RawField::Number(n) if *n == 0.0 => Ok(false),
        RawField::Number(n) if *n == 1.0 => Ok(true),
        RawField::Text(s) => match s.trim() {
            "0" | "false" | "False" => Ok(false),
            "1" | "true" | "True" => Ok(true),
            _ => Err(malformed(field, raw)),
        },
        _ => Err(malformed(field, raw)),
    }
}

fn parse_count(field: &'static str, raw: &RawField) -> Result<u32, TelemetryError> {
    match raw {
        RawField::Text(s) => s.trim().parse().ok(),
        RawField::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64 => {
            Some(*n as u32)
        }
        _ => None,
    }
    .ok_or_else(|| malformed(field, raw))
}

fn decode_image(b64_data: &str) -> Result<RgbImage, TelemetryError> {
    let bytes = base64::decode(b64_data.trim()).map_err(TelemetryError::ImageDecodeError)?;

    let image = image::load_from_memory(&bytes).map_err(TelemetryError::ImageLoadError)?;

    Ok(image.to_rgb8())
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
