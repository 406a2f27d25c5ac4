//! Turns a time-ordered stream of pings from many moving objects into clean per-object
//! trajectories. `assemble` groups raw points into trajectories by object and continuity, and
//! `split_when_idle` cuts long stationary stretches out of one trajectory.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod assemble;
mod idle;
mod metric;
mod point;
mod trajectory;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use self::assemble::{assemble, AssembleOptions, Assembler, AssemblyStats};
pub use self::idle::{split_all_when_idle, split_when_idle, IdleOptions};
pub use self::metric::{Euclidean, Haversine, Metric};
pub use self::point::{time_since, Coordinates, Point};
pub use self::trajectory::Trajectory;

/// Identifies one real-world moving entity, like a ship's MMSI or a bus's fleet number.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectID(pub String);

impl ObjectID {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ObjectID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
