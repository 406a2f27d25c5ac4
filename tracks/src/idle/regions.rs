use anyhow::Result;

use super::intervals::Interval;
use crate::{IdleOptions, Metric, Trajectory};

/// Indices of points, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub start: usize,
    pub end: usize,
}

impl Region {
    fn len(&self) -> usize {
        self.end + 1 - self.start
    }
}

/// Like `Region`, but every point stays near `center`. The center may come before `start`, when
/// the region is what's left of a partly absorbed interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdleRegion {
    pub start: usize,
    pub end: usize,
    pub center: usize,
}

/// Merges intervals from left to right. There's at most one region of each kind open; when open
/// at the same time, the mobile region immediately precedes the idle region. Everything before
/// them has already been emitted or discarded.
pub struct SegmenterState<'a, M> {
    trajectory: &'a Trajectory,
    metric: &'a M,
    opts: &'a IdleOptions,

    idle: Option<IdleRegion>,
    mobile: Option<Region>,
    output: Vec<Trajectory>,
}

impl<'a, M: Metric> SegmenterState<'a, M> {
    pub fn new(trajectory: &'a Trajectory, metric: &'a M, opts: &'a IdleOptions) -> Self {
        Self {
            trajectory,
            metric,
            opts,
            idle: None,
            mobile: None,
            output: Vec::new(),
        }
    }

    /// Intervals must arrive in order and cover the trajectory.
    pub fn consume(&mut self, interval: Interval) -> Result<()> {
        if self.idle.is_none() {
            return self.place(interval);
        }

        // Even a moving interval might start out close to where we've been idling
        let next = self.absorb_into_idle(&interval)?;
        if next > interval.end {
            return Ok(());
        }
        self.commit_idle()?;
        // Only the interval's own anchor is known to be near all of the leftover points
        self.place(Interval {
            start: next,
            end: interval.end,
            center: interval.center,
        })
    }

    /// Decide what happens to anything still open, and return all of the moving pieces.
    pub fn finish(mut self) -> Result<Vec<Trajectory>> {
        self.commit_idle()?;
        if let Some(mobile) = self.mobile.take() {
            self.emit(mobile)?;
        }
        Ok(self.output)
    }

    // Only when there's no idle region open
    fn place(&mut self, interval: Interval) -> Result<()> {
        match interval.center {
            Some(center) => self.start_idle(interval.start, interval.end, center),
            None => {
                self.extend_mobile(interval.start, interval.end);
                Ok(())
            }
        }
    }

    fn extend_mobile(&mut self, start: usize, end: usize) {
        match self.mobile {
            Some(ref mut mobile) => {
                mobile.end = end;
            }
            None => {
                self.mobile = Some(Region { start, end });
            }
        }
    }

    /// Open a new idle region, stealing points from the end of the mobile region while they're
    /// still near the anchor. That's how an idle stretch can begin partway through an interval.
    fn start_idle(&mut self, start: usize, end: usize, center: usize) -> Result<()> {
        let mut idle = IdleRegion { start, end, center };
        while let Some(mobile) = self.mobile {
            if !self.near(mobile.end, center)? {
                break;
            }
            idle.start = mobile.end;
            self.mobile = if mobile.start == mobile.end {
                None
            } else {
                Some(Region {
                    start: mobile.start,
                    end: mobile.end - 1,
                })
            };
        }
        self.idle = Some(idle);
        Ok(())
    }

    /// Grow the idle region forward into the interval while points stay near the anchor. Returns
    /// the first index that wasn't absorbed.
    fn absorb_into_idle(&mut self, interval: &Interval) -> Result<usize> {
        let mut idx = interval.start;
        if let Some(mut idle) = self.idle {
            while idx <= interval.end && self.near(idx, idle.center)? {
                idle.end = idx;
                idx += 1;
            }
            self.idle = Some(idle);
        }
        Ok(idx)
    }

    /// Close the idle region. If it lasted long enough, it's really idle: the mobile region before
    /// it is done, and the idle points are dropped. Otherwise the object was just moving slowly,
    /// so the points become part of the mobile region.
    fn commit_idle(&mut self) -> Result<()> {
        let idle = match self.idle.take() {
            Some(idle) => idle,
            None => {
                return Ok(());
            }
        };
        let points = self.trajectory.points();
        let span = self.metric.elapsed(&points[idle.start], &points[idle.end])?;
        if span >= self.opts.idle_time_threshold {
            if let Some(mobile) = self.mobile.take() {
                self.emit(mobile)?;
            }
        } else {
            self.extend_mobile(idle.start, idle.end);
        }
        Ok(())
    }

    fn emit(&mut self, region: Region) -> Result<()> {
        if region.len() >= self.opts.minimum_length {
            self.output.push(self.trajectory.slice(region.start, region.end)?);
        }
        Ok(())
    }

    fn near(&self, idx: usize, center: usize) -> Result<bool> {
        let points = self.trajectory.points();
        let dist = self.metric.distance(&points[center], &points[idx])?;
        Ok(dist <= self.opts.collocation_radius)
    }
}

#[cfg(test)]
mod tests {
    use geom::{Distance, Duration, Time};

    use super::*;
    use crate::{Coordinates, Euclidean, ObjectID, Point};

    // One point per minute, at the given x positions
    fn trajectory(positions: &[f64]) -> Trajectory {
        Trajectory::new(
            positions
                .iter()
                .enumerate()
                .map(|(i, x)| {
                    Point::new(
                        ObjectID::new("a"),
                        Time::START_OF_DAY + Duration::minutes(i),
                        Coordinates::new_2d(*x, 0.0),
                    )
                })
                .collect(),
        )
        .unwrap()
    }

    fn opts() -> IdleOptions {
        IdleOptions {
            idle_time_threshold: Duration::minutes(4),
            collocation_radius: Distance::meters(10.0),
            minimum_length: 2,
        }
    }

    fn moving(start: usize, end: usize) -> Interval {
        Interval {
            start,
            end,
            center: None,
        }
    }

    fn idle(start: usize, end: usize) -> Interval {
        Interval {
            start,
            end,
            center: Some(start),
        }
    }

    #[test]
    fn starting_idle_steals_from_mobile() {
        let t = trajectory(&[0.0, 100.0, 200.0, 500.0, 505.0, 500.0, 502.0]);
        let opts = opts();
        let mut state = SegmenterState::new(&t, &Euclidean, &opts);
        state.consume(moving(0, 4)).unwrap();
        state.consume(idle(5, 6)).unwrap();
        assert_eq!(state.mobile, Some(Region { start: 0, end: 2 }));
        assert_eq!(
            state.idle,
            Some(IdleRegion {
                start: 3,
                end: 6,
                center: 5
            })
        );
    }

    #[test]
    fn moving_intervals_can_extend_idle() {
        let t = trajectory(&[0.0, 1.0, 2.0, 3.0, 4.0, 300.0, 600.0]);
        let opts = opts();
        let mut state = SegmenterState::new(&t, &Euclidean, &opts);
        state.consume(idle(0, 1)).unwrap();
        state.consume(moving(2, 6)).unwrap();
        // 2 through 4 were absorbed before committing. 4 minutes idle, so dropped.
        assert_eq!(state.idle, None);
        assert_eq!(state.mobile, Some(Region { start: 5, end: 6 }));
        let out = state.finish().unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].first(), &t[5]);
    }

    #[test]
    fn short_idle_becomes_mobile() {
        let t = trajectory(&[0.0, 100.0, 200.0, 200.0, 400.0, 500.0]);
        let opts = opts();
        let mut state = SegmenterState::new(&t, &Euclidean, &opts);
        state.consume(moving(0, 1)).unwrap();
        state.consume(idle(2, 3)).unwrap();
        state.consume(moving(4, 5)).unwrap();
        assert_eq!(state.idle, None);
        assert_eq!(state.mobile, Some(Region { start: 0, end: 5 }));
        let out = state.finish().unwrap();
        assert_eq!(out, vec![t.clone()]);
    }

    #[test]
    fn remainder_of_idle_interval_starts_fresh() {
        // Idle at 0 for 2 minutes, hop 50m, idle there for 5 minutes
        let t = trajectory(&[0.0, 0.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0]);
        let opts = opts();
        let mut state = SegmenterState::new(&t, &Euclidean, &opts);
        state.consume(idle(0, 1)).unwrap();
        state.consume(idle(2, 7)).unwrap();
        // The first stay was too short, so it's mobile
        assert_eq!(state.mobile, Some(Region { start: 0, end: 1 }));
        assert_eq!(
            state.idle,
            Some(IdleRegion {
                start: 2,
                end: 7,
                center: 2
            })
        );
        // The second stay is long enough, so the first one is all that's left
        let out = state.finish().unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].points(), &t.points()[0..2]);
    }

    #[test]
    fn remainder_of_idle_interval_keeps_its_anchor() {
        // 0 through 7 all lie within 10m of point 2, but not of point 3
        let t = trajectory(&[0.0, 0.0, 5.0, 15.0, -5.0, 15.0, -5.0, 15.0]);
        let opts = opts();
        let mut state = SegmenterState::new(&t, &Euclidean, &opts);
        state.consume(idle(0, 1)).unwrap();
        state.consume(idle(2, 7)).unwrap();

        // Only point 2 was near point 0. The short stay became mobile, then got pulled back in.
        assert_eq!(state.mobile, None);
        let region = state.idle.unwrap();
        assert_eq!(
            region,
            IdleRegion {
                start: 0,
                end: 7,
                center: 2
            }
        );
        for idx in region.start..=region.end {
            assert!(state.near(idx, region.center).unwrap(), "point {} strayed", idx);
        }
        assert!(state.finish().unwrap().is_empty());
    }

    #[test]
    fn idle_at_the_end_is_dropped() {
        let t = trajectory(&[0.0, 100.0, 200.0, 300.0, 300.0, 300.0, 300.0, 300.0, 300.0]);
        let opts = opts();
        let mut state = SegmenterState::new(&t, &Euclidean, &opts);
        state.consume(moving(0, 2)).unwrap();
        state.consume(idle(3, 5)).unwrap();
        state.consume(idle(6, 8)).unwrap();
        let out = state.finish().unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), 3);
        assert_eq!(out[0].last(), &t[2]);
    }
}
