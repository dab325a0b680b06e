//! GPS coordinate conversion
//!
//! EXIF stores latitude and longitude as unsigned degrees/minutes/seconds
//! rational triples with the sign carried separately by a hemisphere letter.
//! `dms_to_degrees` only does the angle math; `extract_location` applies the
//! hemisphere sign.

use crate::tags::{
    FieldKey, FieldValue, Rational, SemanticRecord, TagValue, GPS_ALTITUDE, GPS_ALTITUDE_REF,
    GPS_LATITUDE, GPS_LATITUDE_REF, GPS_LONGITUDE, GPS_LONGITUDE_REF,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GpsError {
    #[error("Expected 3 components (degrees, minutes, seconds), found {found}")]
    WrongArity { found: usize },

    #[error("Coordinate is a {kind} value, expected numeric components")]
    NotNumeric { kind: &'static str },

    #[error("Invalid {component} component: {value}")]
    InvalidComponent { component: &'static str, value: String },

    #[error("Invalid {axis} reference: {value:?}")]
    InvalidReference { axis: Axis, value: String },

    #[error("{axis} {value} is out of range")]
    OutOfRange { axis: Axis, value: f64 },
}

pub type Result<T> = std::result::Result<T, GpsError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    fn limit(self) -> f64 {
        match self {
            Axis::Latitude => 90.0,
            Axis::Longitude => 180.0,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Latitude => f.write_str("latitude"),
            Axis::Longitude => f.write_str("longitude"),
        }
    }
}

/// Normalized location in signed decimal degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsCoordinates {
    pub latitude: f64,
    pub longitude: f64,
    /// Metres, negative below sea level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

// ============================================================================
// Degrees / minutes / seconds
// ============================================================================

/// Sexagesimal angle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dms {
    pub degrees: f64,
    pub minutes: f64,
    pub seconds: f64,
}

impl Dms {
    pub fn from_components(components: &[f64]) -> Result<Self> {
        let [degrees, minutes, seconds] = components else {
            return Err(GpsError::WrongArity { found: components.len() });
        };

        for (component, value) in [("degrees", degrees), ("minutes", minutes), ("seconds", seconds)] {
            if !value.is_finite() || *value < 0.0 {
                return Err(GpsError::InvalidComponent {
                    component,
                    value: value.to_string(),
                });
            }
        }

        Ok(Self {
            degrees: *degrees,
            minutes: *minutes,
            seconds: *seconds,
        })
    }

    pub fn to_degrees(self) -> f64 {
        self.degrees + self.minutes / 60.0 + self.seconds / 3600.0
    }
}

impl TryFrom<&[Rational]> for Dms {
    type Error = GpsError;

    fn try_from(parts: &[Rational]) -> Result<Self> {
        if parts.len() != 3 {
            return Err(GpsError::WrongArity { found: parts.len() });
        }

        let names = ["degrees", "minutes", "seconds"];
        let mut components = [0.0; 3];
        for (i, part) in parts.iter().enumerate() {
            components[i] = part.to_f64().ok_or_else(|| GpsError::InvalidComponent {
                component: names[i],
                value: part.to_string(),
            })?;
        }

        Self::from_components(&components)
    }
}

/// Convert a DMS tag value to unsigned decimal degrees.
///
/// Accepts rational, integer and float sequences of exactly three elements.
pub fn dms_to_degrees<K: Ord>(value: &TagValue<K>) -> Result<f64> {
    let dms = match value {
        TagValue::Rational(parts) => Dms::try_from(parts.as_slice())?,
        TagValue::Integers(parts) => {
            let components: Vec<f64> = parts.iter().map(|&v| v as f64).collect();
            Dms::from_components(&components)?
        }
        TagValue::Float(parts) => Dms::from_components(parts)?,
        TagValue::Integer(_) => return Err(GpsError::WrongArity { found: 1 }),
        other => return Err(GpsError::NotNumeric { kind: other.kind() }),
    };
    Ok(dms.to_degrees())
}

// ============================================================================
// Hemisphere
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
}

impl Hemisphere {
    /// Parse a reference letter valid for `axis` (`N`/`S` or `E`/`W`)
    pub fn parse(axis: Axis, value: &str) -> Result<Self> {
        let letter = value.trim().to_ascii_uppercase();
        match (axis, letter.as_str()) {
            (Axis::Latitude, "N") => Ok(Hemisphere::North),
            (Axis::Latitude, "S") => Ok(Hemisphere::South),
            (Axis::Longitude, "E") => Ok(Hemisphere::East),
            (Axis::Longitude, "W") => Ok(Hemisphere::West),
            _ => Err(GpsError::InvalidReference {
                axis,
                value: value.to_string(),
            }),
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            Hemisphere::North | Hemisphere::East => 1.0,
            Hemisphere::South | Hemisphere::West => -1.0,
        }
    }
}

// ============================================================================
// Location extraction
// ============================================================================

/// Build a location from the record's `GPSInfo` sub-record.
///
/// Returns `Ok(None)` unless latitude, longitude and both references are all
/// present. Present but unusable values are errors.
pub fn extract_location(record: &SemanticRecord) -> Result<Option<GpsCoordinates>> {
    let Some(gps) = record.gps() else {
        debug!("No GPS info found in EXIF data");
        return Ok(None);
    };

    let field = |name: &'static str| gps.get(&FieldKey::Named(name));
    let (Some(lat), Some(lat_ref), Some(lon), Some(lon_ref)) = (
        field(GPS_LATITUDE),
        field(GPS_LATITUDE_REF),
        field(GPS_LONGITUDE),
        field(GPS_LONGITUDE_REF),
    ) else {
        debug!("Missing required GPS tags");
        return Ok(None);
    };

    let latitude = signed_coordinate(Axis::Latitude, lat, lat_ref)?;
    let longitude = signed_coordinate(Axis::Longitude, lon, lon_ref)?;

    let coords = GpsCoordinates {
        latitude,
        longitude,
        altitude: altitude(gps),
    };
    debug!(latitude, longitude, "Extracted coordinates");
    Ok(Some(coords))
}

fn signed_coordinate(axis: Axis, value: &FieldValue, reference: &FieldValue) -> Result<f64> {
    let reference = match reference {
        TagValue::Text(s) => Hemisphere::parse(axis, s)?,
        other => {
            return Err(GpsError::InvalidReference {
                axis,
                value: format!("<{}>", other.kind()),
            })
        }
    };

    let degrees = dms_to_degrees(value)? * reference.sign();
    if degrees.abs() > axis.limit() {
        return Err(GpsError::OutOfRange { axis, value: degrees });
    }
    Ok(degrees)
}

/// Altitude is optional; anything unusable is dropped.
fn altitude(gps: &BTreeMap<FieldKey, FieldValue>) -> Option<f64> {
    let metres = match gps.get(&FieldKey::Named(GPS_ALTITUDE))? {
        TagValue::Rational(v) if v.len() == 1 => v[0].to_f64()?,
        TagValue::Float(v) if v.len() == 1 => v[0],
        _ => return None,
    };

    let below_sea_level = matches!(
        gps.get(&FieldKey::Named(GPS_ALTITUDE_REF)),
        Some(TagValue::Integer(1))
    );
    Some(if below_sea_level { -metres } else { metres })
}
