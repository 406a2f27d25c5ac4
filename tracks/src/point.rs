use std::collections::BTreeMap;

use anyhow::Result;
use chrono::NaiveDateTime;
use geom::{Duration, Pt2D, Time};
use serde::{Deserialize, Serialize};

use crate::ObjectID;

/// One ping: where some object was at some time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub object_id: ObjectID,
    pub time: Time,
    pub pos: Coordinates,
    /// Anything else the source attached to the ping (speed, heading, status...). Never
    /// interpreted here, just carried along.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl Point {
    pub fn new(object_id: ObjectID, time: Time, pos: Coordinates) -> Self {
        Self {
            object_id,
            time,
            pos,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property<K: Into<String>>(mut self, key: K, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

/// Either planar (x, y) or spatial (x, y, z). For geographic data, x is longitude and y is
/// latitude.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Coordinates {
    pub fn new_2d(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    pub fn new_3d(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }

    pub fn dimensions(&self) -> usize {
        if self.z.is_some() {
            3
        } else {
            2
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.map(f64::is_finite).unwrap_or(true)
    }

    /// Drops z. Callers must check `is_finite` first; geom panics on NaN.
    pub fn to_pt(&self) -> Pt2D {
        Pt2D::new(self.x, self.y)
    }
}

/// Express a wall-clock instant as a `Time` relative to some origin, so that data spanning many
/// days (a ship docked for a week) still lands on one time axis.
pub fn time_since(origin: NaiveDateTime, at: NaiveDateTime) -> Result<Time> {
    if at < origin {
        bail!("{} is before the time origin {}", at, origin);
    }
    let millis = (at - origin).num_milliseconds();
    Ok(Time::START_OF_DAY + Duration::seconds(millis as f64 / 1000.0))
}
