//! Map route: located photos in capture order

use crate::metadata::PhotoMetadata;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One marker on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub filename: String,
    pub latitude: f64,
    pub longitude: f64,
    /// `YYYY-MM-DD HH:MM:SS`
    pub captured_at: Option<String>,
}

/// Points for every photo with a found location.
///
/// Ordered by capture time ascending; photos without a time come last. Ties
/// are broken by filename.
pub fn build_route(photos: &[(String, PhotoMetadata)]) -> Vec<RoutePoint> {
    let mut located: Vec<(Option<NaiveDateTime>, RoutePoint)> = photos
        .iter()
        .filter_map(|(filename, meta)| {
            let coords = meta.coordinates()?;
            let time = meta.capture_time();
            Some((
                time.map(|t| t.datetime),
                RoutePoint {
                    filename: filename.clone(),
                    latitude: coords.latitude,
                    longitude: coords.longitude,
                    captured_at: time.map(|t| t.display()),
                },
            ))
        })
        .collect();

    located.sort_by(|(ta, a), (tb, b)| {
        let by_time = match (ta, tb) {
            (Some(ta), Some(tb)) => ta.cmp(tb),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_time.then_with(|| a.filename.cmp(&b.filename))
    });

    located.into_iter().map(|(_, point)| point).collect()
}
