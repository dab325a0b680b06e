//! EXIF tag dictionary
//!
//! A tag block read from an image is a map of numeric tag ids to values. The
//! GPS positional tags live in their own sub-block stored under the
//! `GPSInfo` id (34853) with a separate id space, so resolution to names is
//! done in two tables.
//!
//! ```rust,ignore
//! let record = raw_block.resolve();
//! let lat = record.gps().and_then(|gps| gps.get(&FieldKey::Named(GPS_LATITUDE)));
//! ```

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Id of the GPS sub-block in the top-level (IFD0/Exif) table.
pub const GPS_INFO_TAG: u16 = 34853;

pub const DATE_TIME_ORIGINAL: &str = "DateTimeOriginal";
pub const DATE_TIME_DIGITIZED: &str = "DateTimeDigitized";
pub const DATE_TIME: &str = "DateTime";
pub const GPS_INFO: &str = "GPSInfo";
pub const MAKE: &str = "Make";
pub const MODEL: &str = "Model";

pub const GPS_LATITUDE_REF: &str = "GPSLatitudeRef";
pub const GPS_LATITUDE: &str = "GPSLatitude";
pub const GPS_LONGITUDE_REF: &str = "GPSLongitudeRef";
pub const GPS_LONGITUDE: &str = "GPSLongitude";
pub const GPS_ALTITUDE_REF: &str = "GPSAltitudeRef";
pub const GPS_ALTITUDE: &str = "GPSAltitude";

// ============================================================================
// Values
// ============================================================================

/// Unsigned or signed EXIF rational
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rational {
    pub num: i64,
    pub denom: i64,
}

impl Rational {
    pub fn new(num: i64, denom: i64) -> Self {
        Self { num, denom }
    }

    /// `None` for a zero denominator
    pub fn to_f64(self) -> Option<f64> {
        if self.denom == 0 {
            None
        } else {
            Some(self.num as f64 / self.denom as f64)
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.denom)
    }
}

/// A single tag value, keyed by `K` when it nests another block
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TagValue<K: Ord> {
    Text(String),
    Integer(i64),
    Integers(Vec<i64>),
    Rational(Vec<Rational>),
    Float(Vec<f64>),
    Undefined(Vec<u8>),
    Block(BTreeMap<K, TagValue<K>>),
}

impl<K: Ord> TagValue<K> {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TagValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&BTreeMap<K, TagValue<K>>> {
        match self {
            TagValue::Block(b) => Some(b),
            _ => None,
        }
    }

    /// Short variant name for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            TagValue::Text(_) => "text",
            TagValue::Integer(_) => "integer",
            TagValue::Integers(_) => "integer list",
            TagValue::Rational(_) => "rational",
            TagValue::Float(_) => "float",
            TagValue::Undefined(_) => "undefined",
            TagValue::Block(_) => "block",
        }
    }

    /// Rebuild the value with different block keys. Nested blocks are
    /// re-keyed with `rekey` at every level.
    fn map_keys<J: Ord>(self, rekey: &impl Fn(K) -> J) -> TagValue<J> {
        match self {
            TagValue::Text(s) => TagValue::Text(s),
            TagValue::Integer(i) => TagValue::Integer(i),
            TagValue::Integers(v) => TagValue::Integers(v),
            TagValue::Rational(v) => TagValue::Rational(v),
            TagValue::Float(v) => TagValue::Float(v),
            TagValue::Undefined(v) => TagValue::Undefined(v),
            TagValue::Block(b) => TagValue::Block(
                b.into_iter()
                    .map(|(k, v)| (rekey(k), v.map_keys(rekey)))
                    .collect(),
            ),
        }
    }
}

// ============================================================================
// Raw block
// ============================================================================

pub type RawValue = TagValue<u16>;

/// Tag block as read from the container, keyed by numeric id
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawTagBlock {
    entries: BTreeMap<u16, RawValue>,
}

impl RawTagBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u16, value: RawValue) {
        self.entries.insert(id, value);
    }

    pub fn get(&self, id: u16) -> Option<&RawValue> {
        self.entries.get(&id)
    }

    /// Insert into the GPS sub-block, creating it on first use
    pub fn insert_gps(&mut self, id: u16, value: RawValue) {
        let slot = self
            .entries
            .entry(GPS_INFO_TAG)
            .or_insert_with(|| TagValue::Block(BTreeMap::new()));
        if let TagValue::Block(gps) = slot {
            gps.insert(id, value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace numeric ids with tag names.
    ///
    /// The `GPSInfo` block is resolved against the GPS table; any other
    /// nested block keeps its numeric ids. Ids missing from the tables are
    /// kept as `FieldKey::Unknown`.
    pub fn resolve(&self) -> SemanticRecord {
        let fields = self
            .entries
            .iter()
            .map(|(&id, value)| {
                let key = exif_tag_name(id)
                    .map(FieldKey::Named)
                    .unwrap_or(FieldKey::Unknown(id));
                let resolved = match value {
                    TagValue::Block(_) if id == GPS_INFO_TAG => {
                        value.clone().map_keys(&|sub: u16| {
                            gps_tag_name(sub)
                                .map(FieldKey::Named)
                                .unwrap_or(FieldKey::Unknown(sub))
                        })
                    }
                    _ => value.clone().map_keys(&FieldKey::Unknown),
                };
                (key, resolved)
            })
            .collect();

        SemanticRecord { fields }
    }
}

impl FromIterator<(u16, RawValue)> for RawTagBlock {
    fn from_iter<I: IntoIterator<Item = (u16, RawValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// Semantic record
// ============================================================================

/// Resolved tag key: a known name, or the raw id when the tables have none
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKey {
    Named(&'static str),
    Unknown(u16),
}

impl FieldKey {
    pub fn name(&self) -> Option<&'static str> {
        match self {
            FieldKey::Named(name) => Some(*name),
            FieldKey::Unknown(_) => None,
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Named(name) => f.write_str(name),
            FieldKey::Unknown(id) => write!(f, "{}", id),
        }
    }
}

impl Serialize for FieldKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldKey::Named(name) => serializer.serialize_str(name),
            FieldKey::Unknown(id) => serializer.serialize_u16(*id),
        }
    }
}

pub type FieldValue = TagValue<FieldKey>;

/// Tag block with names in place of ids
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SemanticRecord {
    fields: BTreeMap<FieldKey, FieldValue>,
}

impl SemanticRecord {
    pub fn get(&self, name: &'static str) -> Option<&FieldValue> {
        self.fields.get(&FieldKey::Named(name))
    }

    pub fn get_unknown(&self, id: u16) -> Option<&FieldValue> {
        self.fields.get(&FieldKey::Unknown(id))
    }

    /// Text value of a named field
    pub fn text(&self, name: &'static str) -> Option<&str> {
        self.get(name).and_then(TagValue::as_text)
    }

    /// The resolved GPS sub-record, if the block carried one
    pub fn gps(&self) -> Option<&BTreeMap<FieldKey, FieldValue>> {
        self.get(GPS_INFO).and_then(TagValue::as_block)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &FieldValue)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ============================================================================
// Tag tables
// ============================================================================

/// Names for IFD0 and Exif IFD tags
pub fn exif_tag_name(id: u16) -> Option<&'static str> {
    let name = match id {
        256 => "ImageWidth",
        257 => "ImageLength",
        258 => "BitsPerSample",
        259 => "Compression",
        262 => "PhotometricInterpretation",
        270 => "ImageDescription",
        271 => MAKE,
        272 => MODEL,
        274 => "Orientation",
        277 => "SamplesPerPixel",
        282 => "XResolution",
        283 => "YResolution",
        296 => "ResolutionUnit",
        305 => "Software",
        306 => DATE_TIME,
        315 => "Artist",
        318 => "WhitePoint",
        319 => "PrimaryChromaticities",
        513 => "JpegIFOffset",
        514 => "JpegIFByteCount",
        529 => "YCbCrCoefficients",
        531 => "YCbCrPositioning",
        33432 => "Copyright",
        33434 => "ExposureTime",
        33437 => "FNumber",
        34665 => "ExifOffset",
        34850 => "ExposureProgram",
        GPS_INFO_TAG => GPS_INFO,
        34855 => "ISOSpeedRatings",
        36864 => "ExifVersion",
        36867 => DATE_TIME_ORIGINAL,
        36868 => DATE_TIME_DIGITIZED,
        36880 => "OffsetTime",
        36881 => "OffsetTimeOriginal",
        36882 => "OffsetTimeDigitized",
        37121 => "ComponentsConfiguration",
        37122 => "CompressedBitsPerPixel",
        37377 => "ShutterSpeedValue",
        37378 => "ApertureValue",
        37379 => "BrightnessValue",
        37380 => "ExposureBiasValue",
        37381 => "MaxApertureValue",
        37382 => "SubjectDistance",
        37383 => "MeteringMode",
        37384 => "LightSource",
        37385 => "Flash",
        37386 => "FocalLength",
        37396 => "SubjectLocation",
        37500 => "MakerNote",
        37510 => "UserComment",
        37520 => "SubsecTime",
        37521 => "SubsecTimeOriginal",
        37522 => "SubsecTimeDigitized",
        40960 => "FlashPixVersion",
        40961 => "ColorSpace",
        40962 => "ExifImageWidth",
        40963 => "ExifImageHeight",
        40964 => "RelatedSoundFile",
        40965 => "ExifInteroperabilityOffset",
        41486 => "FocalPlaneXResolution",
        41487 => "FocalPlaneYResolution",
        41488 => "FocalPlaneResolutionUnit",
        41495 => "SensingMethod",
        41728 => "FileSource",
        41729 => "SceneType",
        41985 => "CustomRendered",
        41986 => "ExposureMode",
        41987 => "WhiteBalance",
        41988 => "DigitalZoomRatio",
        41989 => "FocalLengthIn35mmFilm",
        41990 => "SceneCaptureType",
        41991 => "GainControl",
        41992 => "Contrast",
        41993 => "Saturation",
        41994 => "Sharpness",
        41996 => "SubjectDistanceRange",
        42016 => "ImageUniqueID",
        42032 => "CameraOwnerName",
        42033 => "BodySerialNumber",
        42034 => "LensSpecification",
        42035 => "LensMake",
        42036 => "LensModel",
        42037 => "LensSerialNumber",
        _ => return None,
    };
    Some(name)
}

/// Names for tags inside the GPS sub-block
pub fn gps_tag_name(id: u16) -> Option<&'static str> {
    let name = match id {
        0 => "GPSVersionID",
        1 => GPS_LATITUDE_REF,
        2 => GPS_LATITUDE,
        3 => GPS_LONGITUDE_REF,
        4 => GPS_LONGITUDE,
        5 => GPS_ALTITUDE_REF,
        6 => GPS_ALTITUDE,
        7 => "GPSTimeStamp",
        8 => "GPSSatellites",
        9 => "GPSStatus",
        10 => "GPSMeasureMode",
        11 => "GPSDOP",
        12 => "GPSSpeedRef",
        13 => "GPSSpeed",
        14 => "GPSTrackRef",
        15 => "GPSTrack",
        16 => "GPSImgDirectionRef",
        17 => "GPSImgDirection",
        18 => "GPSMapDatum",
        19 => "GPSDestLatitudeRef",
        20 => "GPSDestLatitude",
        21 => "GPSDestLongitudeRef",
        22 => "GPSDestLongitude",
        23 => "GPSDestBearingRef",
        24 => "GPSDestBearing",
        25 => "GPSDestDistanceRef",
        26 => "GPSDestDistance",
        27 => "GPSProcessingMethod",
        28 => "GPSAreaInformation",
        29 => "GPSDateStamp",
        30 => "GPSDifferential",
        31 => "GPSHPositioningError",
        _ => return None,
    };
    Some(name)
}
