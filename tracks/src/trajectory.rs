use std::ops::Index;

use anyhow::Result;
use geom::{Distance, Duration, Time};
use serde::{Deserialize, Serialize};

use crate::{Metric, ObjectID, Point};

/// An ordered, non-empty sequence of points from one object. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedTrajectory")]
pub struct Trajectory {
    object_id: ObjectID,
    // Time doesn't decrease. Only `new` (and so deserialization) checks this; internally built
    // trajectories inherit it from their input.
    points: Vec<Point>,
}

impl Trajectory {
    /// Validates everything. Use this once on untrusted input; assembly and idle splitting skip
    /// these checks.
    pub fn new(points: Vec<Point>) -> Result<Self> {
        if points.is_empty() {
            bail!("Trajectory doesn't have any points");
        }
        let object_id = points[0].object_id.clone();
        for pt in &points {
            if pt.object_id != object_id {
                bail!(
                    "Trajectory mixes points from {} and {}",
                    object_id,
                    pt.object_id
                );
            }
        }
        for pair in points.windows(2) {
            if pair[0].time > pair[1].time {
                bail!(
                    "Trajectory input for {} out-of-order: {} then {}",
                    object_id,
                    pair[0].time,
                    pair[1].time
                );
            }
        }
        Ok(Self { object_id, points })
    }

    /// The caller guarantees a non-empty run from one object.
    pub(crate) fn unchecked_new(points: Vec<Point>) -> Self {
        let object_id = points[0].object_id.clone();
        Self { object_id, points }
    }

    pub fn object_id(&self) -> &ObjectID {
        &self.object_id
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; trajectories can't be empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Point> {
        self.points.get(idx)
    }

    pub fn first(&self) -> &Point {
        &self.points[0]
    }

    pub fn last(&self) -> &Point {
        &self.points[self.points.len() - 1]
    }

    pub fn start_time(&self) -> Time {
        self.first().time
    }

    pub fn end_time(&self) -> Time {
        self.last().time
    }

    pub fn duration(&self) -> Duration {
        self.end_time() - self.start_time()
    }

    /// The points from `start` through `end`, inclusive, as a new trajectory.
    pub fn slice(&self, start: usize, end: usize) -> Result<Self> {
        if start > end || end >= self.points.len() {
            bail!(
                "Can't slice [{}, {}] from a trajectory with {} points",
                start,
                end,
                self.points.len()
            );
        }
        Ok(Self {
            object_id: self.object_id.clone(),
            points: self.points[start..=end].to_vec(),
        })
    }

    /// Total distance traveled, point to point.
    pub fn length<M: Metric>(&self, metric: &M) -> Result<Distance> {
        let mut total = Distance::ZERO;
        for pair in self.points.windows(2) {
            total += metric.distance(&pair[0], &pair[1])?;
        }
        Ok(total)
    }
}

// Same shape on the wire, but everything read back goes through `Trajectory::new`
#[derive(Deserialize)]
struct UncheckedTrajectory {
    object_id: ObjectID,
    points: Vec<Point>,
}

impl TryFrom<UncheckedTrajectory> for Trajectory {
    type Error = anyhow::Error;

    fn try_from(raw: UncheckedTrajectory) -> Result<Self> {
        let trajectory = Trajectory::new(raw.points)?;
        if trajectory.object_id != raw.object_id {
            bail!(
                "Trajectory for {} holds points from {}",
                raw.object_id,
                trajectory.object_id
            );
        }
        Ok(trajectory)
    }
}

impl Index<usize> for Trajectory {
    type Output = Point;

    fn index(&self, idx: usize) -> &Point {
        &self.points[idx]
    }
}
