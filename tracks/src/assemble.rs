// Group a single pass over raw points into trajectories, one object at a time.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use abstutil::prettyprint_usize;
use anyhow::Result;
use geom::{Distance, Duration};
use serde::{Deserialize, Serialize};

use crate::{Metric, ObjectID, Point, Trajectory};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssembleOptions {
    /// Consecutive points further apart in time than this start a new trajectory.
    pub separation_time: Option<Duration>,
    /// Consecutive points further apart in space than this start a new trajectory.
    pub separation_distance: Option<Distance>,
    /// Shorter runs are silently dropped.
    pub minimum_length: usize,
    /// After every this-many emitted trajectories, close runs that haven't seen a point within
    /// `separation_time` of the latest input. This bounds memory when there are many sparse
    /// objects. `None` or 0 disables the sweep; runs then only close on a gap or at the end.
    pub sweep_every: Option<usize>,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            separation_time: None,
            separation_distance: None,
            minimum_length: 2,
            sweep_every: Some(1000),
        }
    }
}

/// Counters for diagnostics. They only change as the `Assembler` is pulled from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyStats {
    pub points_processed: usize,
    pub valid_trajectory_count: usize,
    /// Runs dropped for being shorter than `minimum_length`
    pub invalid_trajectory_count: usize,
    pub sweeps: usize,
}

impl fmt::Display for AssemblyStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} points became {} trajectories ({} short runs dropped, {} sweeps)",
            prettyprint_usize(self.points_processed),
            prettyprint_usize(self.valid_trajectory_count),
            prettyprint_usize(self.invalid_trajectory_count),
            prettyprint_usize(self.sweeps)
        )
    }
}

/// Lazily assemble trajectories from points, in one forward pass. The input should be ordered by
/// time; nothing is sorted here.
///
/// Trajectories come out as soon as each run closes, so they're only loosely ordered by time. The
/// runs still open at the end of the input are flushed last, ordered by object. If `metric` fails,
/// that error is yielded once and the iterator ends.
pub fn assemble<I, M>(points: I, metric: M, opts: AssembleOptions) -> Assembler<I::IntoIter, M>
where
    I: IntoIterator<Item = Point>,
    M: Metric,
{
    Assembler {
        input: points.into_iter(),
        metric,
        opts,
        runs: BTreeMap::new(),
        ready: VecDeque::new(),
        stats: AssemblyStats::default(),
        sweep_due: false,
        done: false,
    }
}

pub struct Assembler<I, M> {
    input: I,
    metric: M,
    opts: AssembleOptions,
    // Open runs. Each is non-empty and only has points from its key.
    runs: BTreeMap<ObjectID, Vec<Point>>,
    // Closed runs waiting to be pulled
    ready: VecDeque<Trajectory>,
    stats: AssemblyStats,
    sweep_due: bool,
    done: bool,
}

impl<I: Iterator<Item = Point>, M: Metric> Assembler<I, M> {
    pub fn stats(&self) -> &AssemblyStats {
        &self.stats
    }

    /// How many objects currently have an open run
    pub fn open_runs(&self) -> usize {
        self.runs.len()
    }

    fn ingest(&mut self, pt: Point) -> Result<()> {
        self.stats.points_processed += 1;

        if let Entry::Occupied(mut entry) = self.runs.entry(pt.object_id.clone()) {
            // Runs are never empty
            let run = entry.get_mut();
            if !is_discontinuous(&self.metric, &self.opts, &run[run.len() - 1], &pt)? {
                run.push(pt);
                return Ok(());
            }
            let run = entry.remove();
            self.close_run(run);
        }

        // A pending sweep waits until some run closes or a new object shows up
        if self.sweep_due {
            self.sweep_due = false;
            self.sweep(&pt)?;
        }
        self.runs.insert(pt.object_id.clone(), vec![pt]);
        Ok(())
    }

    fn close_run(&mut self, run: Vec<Point>) {
        if run.len() < self.opts.minimum_length {
            self.stats.invalid_trajectory_count += 1;
            return;
        }
        self.stats.valid_trajectory_count += 1;
        self.ready.push_back(Trajectory::unchecked_new(run));
        if let Some(every) = self.opts.sweep_every {
            if every > 0 && self.stats.valid_trajectory_count % every == 0 {
                self.sweep_due = true;
            }
        }
    }

    /// Close every run whose latest point is older than `separation_time`, relative to `latest`.
    /// Runs that linger between sweeps are fine; they close later or at the end.
    fn sweep(&mut self, latest: &Point) -> Result<()> {
        let threshold = match self.opts.separation_time {
            Some(x) => x,
            None => {
                return Ok(());
            }
        };
        self.stats.sweeps += 1;

        let mut stale = Vec::new();
        for (id, run) in &self.runs {
            if self.metric.elapsed(&run[run.len() - 1], latest)? > threshold {
                stale.push(id.clone());
            }
        }

        let num_stale = stale.len();
        for id in stale {
            if let Some(run) = self.runs.remove(&id) {
                self.close_run(run);
            }
        }
        debug!(
            "Sweep at {} closed {} stale runs, {} still open",
            latest.time,
            prettyprint_usize(num_stale),
            prettyprint_usize(self.runs.len())
        );
        Ok(())
    }

    fn flush(&mut self) {
        for (_, run) in std::mem::take(&mut self.runs) {
            self.close_run(run);
        }
        info!("Assembly done: {}", self.stats);
    }
}

fn is_discontinuous<M: Metric>(
    metric: &M,
    opts: &AssembleOptions,
    last: &Point,
    pt: &Point,
) -> Result<bool> {
    if let Some(threshold) = opts.separation_time {
        if metric.elapsed(last, pt)? > threshold {
            return Ok(true);
        }
    }
    if let Some(threshold) = opts.separation_distance {
        if metric.distance(last, pt)? > threshold {
            return Ok(true);
        }
    }
    Ok(false)
}

impl<I: Iterator<Item = Point>, M: Metric> Iterator for Assembler<I, M> {
    type Item = Result<Trajectory>;

    fn next(&mut self) -> Option<Result<Trajectory>> {
        loop {
            if let Some(trajectory) = self.ready.pop_front() {
                return Some(Ok(trajectory));
            }
            if self.done {
                return None;
            }
            match self.input.next() {
                Some(pt) => {
                    if let Err(err) = self.ingest(pt) {
                        self.done = true;
                        self.runs.clear();
                        self.ready.clear();
                        return Some(Err(err));
                    }
                }
                None => {
                    self.done = true;
                    self.flush();
                }
            }
        }
    }
}
