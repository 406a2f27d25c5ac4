// Cut stationary stretches out of trajectories, like a ship docked for days, keeping the moving
// parts as separate trajectories.

mod intervals;
mod regions;

use abstutil::{prettyprint_usize, Timer};
use anyhow::Result;
use geom::{Distance, Duration};
use serde::{Deserialize, Serialize};

use self::regions::SegmenterState;
use crate::{Metric, Trajectory};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdleOptions {
    /// Staying in one place at least this long counts as idle.
    pub idle_time_threshold: Duration,
    /// How far from an anchor point still counts as the same place.
    pub collocation_radius: Distance,
    /// Moving pieces shorter than this are dropped.
    #[serde(default = "default_minimum_length")]
    pub minimum_length: usize,
}

fn default_minimum_length() -> usize {
    2
}

impl IdleOptions {
    pub fn new(idle_time_threshold: Duration, collocation_radius: Distance) -> Self {
        Self {
            idle_time_threshold,
            collocation_radius,
            minimum_length: default_minimum_length(),
        }
    }
}

/// Split a trajectory wherever the object stays within `collocation_radius` of some point for at
/// least `idle_time_threshold`. The idle stretches vanish; the moving pieces between them are
/// returned in their original order. Entirely idle trajectories produce nothing.
///
/// Timestamps must not decrease. This isn't checked.
pub fn split_when_idle<M: Metric>(
    trajectory: &Trajectory,
    metric: &M,
    opts: &IdleOptions,
) -> Result<Vec<Trajectory>> {
    // Too short to possibly contain an idle stretch
    if metric.elapsed(trajectory.first(), trajectory.last())? < opts.idle_time_threshold {
        if trajectory.len() >= opts.minimum_length {
            return Ok(vec![trajectory.clone()]);
        }
        return Ok(Vec::new());
    }

    let mut state = SegmenterState::new(trajectory, metric, opts);
    for interval in intervals::partition(trajectory, metric, opts)? {
        state.consume(interval)?;
    }
    state.finish()
}

/// Run `split_when_idle` over many trajectories, reporting progress.
pub fn split_all_when_idle<M: Metric>(
    trajectories: &[Trajectory],
    metric: &M,
    opts: &IdleOptions,
    timer: &mut Timer,
) -> Result<Vec<Trajectory>> {
    let mut results = Vec::new();
    let mut unchanged = 0;
    timer.start_iter("split trajectories when idle", trajectories.len());
    for trajectory in trajectories {
        timer.next();
        let pieces = split_when_idle(trajectory, metric, opts)?;
        if pieces.len() == 1 && pieces[0].len() == trajectory.len() {
            unchanged += 1;
        }
        results.extend(pieces);
    }
    info!(
        "Split {} trajectories into {} moving pieces. {} had no idle stretches.",
        prettyprint_usize(trajectories.len()),
        prettyprint_usize(results.len()),
        prettyprint_usize(unchanged)
    );
    Ok(results)
}
