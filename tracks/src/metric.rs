use anyhow::Result;
use geom::{Distance, Duration};

use crate::Point;

/// The geometry that assembly and idle detection are built on. Neither algorithm interprets
/// coordinates directly; everything goes through here, and any error is passed back to the caller
/// unchanged.
pub trait Metric {
    /// Non-negative and symmetric. The triangle inequality isn't needed.
    fn distance(&self, a: &Point, b: &Point) -> Result<Distance>;

    fn elapsed(&self, from: &Point, to: &Point) -> Result<Duration> {
        Ok(to.time - from.time)
    }
}

/// Any closure works as a distance function.
impl<F> Metric for F
where
    F: Fn(&Point, &Point) -> Result<Distance>,
{
    fn distance(&self, a: &Point, b: &Point) -> Result<Distance> {
        self(a, b)
    }
}

/// Straight-line distance, with coordinates in meters. Points must agree on dimensions.
#[derive(Clone, Copy, Debug, Default)]
pub struct Euclidean;

impl Metric for Euclidean {
    fn distance(&self, a: &Point, b: &Point) -> Result<Distance> {
        check_finite(a)?;
        check_finite(b)?;
        match (a.pos.z, b.pos.z) {
            (None, None) => Ok(a.pos.to_pt().dist_to(b.pos.to_pt())),
            (Some(z1), Some(z2)) => {
                let dx = a.pos.x - b.pos.x;
                let dy = a.pos.y - b.pos.y;
                let dz = z1 - z2;
                Ok(Distance::meters((dx * dx + dy * dy + dz * dz).sqrt()))
            }
            _ => bail!(
                "Can't measure between a {}D and {}D point of {}",
                a.pos.dimensions(),
                b.pos.dimensions(),
                a.object_id
            ),
        }
    }
}

/// Great-circle distance, with x as longitude and y as latitude. Altitude is ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct Haversine;

impl Metric for Haversine {
    fn distance(&self, a: &Point, b: &Point) -> Result<Distance> {
        check_finite(a)?;
        check_finite(b)?;
        for pt in [a, b] {
            if pt.pos.y.abs() > 90.0 || pt.pos.x.abs() > 180.0 {
                bail!(
                    "{} has an invalid longitude/latitude ({}, {})",
                    pt.object_id,
                    pt.pos.x,
                    pt.pos.y
                );
            }
        }
        let (lat1, lat2) = (a.pos.y.to_radians(), b.pos.y.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (b.pos.x - a.pos.x).to_radians();
        let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        Ok(Distance::meters(
            2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin(),
        ))
    }
}

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

fn check_finite(pt: &Point) -> Result<()> {
    if !pt.pos.is_finite() {
        bail!(
            "{} has non-finite coordinates at {}: {:?}",
            pt.object_id,
            pt.time,
            pt.pos
        );
    }
    Ok(())
}
