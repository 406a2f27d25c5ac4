use anyhow::Result;
use geom::Duration;

use crate::{IdleOptions, Metric, Point, Trajectory};

/// A contiguous range of point indices, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interval {
    pub start: usize,
    pub end: usize,
    /// Present only when every point in the interval stays within the collocation radius of this
    /// anchor, which is always the interval's first point.
    pub center: Option<usize>,
}

/// Chop the whole trajectory into consecutive intervals, each lasting at most half the idle
/// threshold. The one exception is a pair of adjacent points, which can't be split further.
///
/// Since no interval is long enough to be idle by itself, idle stretches only appear by merging
/// intervals later. Widths are guessed from the average sampling rate of what's left, then shrunk
/// until they fit.
pub fn partition<M: Metric>(
    trajectory: &Trajectory,
    metric: &M,
    opts: &IdleOptions,
) -> Result<Vec<Interval>> {
    let points = trajectory.points();
    let last = points.len() - 1;
    let max_span = 0.5 * opts.idle_time_threshold;

    let mut intervals = Vec::new();
    let mut start = 0;
    while start <= last {
        if start == last {
            intervals.push(Interval {
                start,
                end: start,
                center: Some(start),
            });
            break;
        }

        let remaining_time = metric.elapsed(&points[start], &points[last])?;
        let mut width = if remaining_time > Duration::ZERO {
            let remaining_points = (points.len() - start) as f64;
            ((remaining_points * (max_span / remaining_time)).floor() as usize).max(1)
        } else {
            last - start
        };

        let end = loop {
            let end = (start + width).min(last);
            if end == start + 1 {
                break end;
            }
            let span = metric.elapsed(&points[start], &points[end])?;
            if span <= max_span {
                break end;
            }
            // Shrink proportionally. Always strictly narrower, so this terminates.
            width = (((end - start) as f64 * (max_span / span)).floor() as usize).max(1);
        };

        intervals.push(label(points, metric, opts, start, end)?);
        start = end + 1;
    }
    Ok(intervals)
}

fn label<M: Metric>(
    points: &[Point],
    metric: &M,
    opts: &IdleOptions,
    start: usize,
    end: usize,
) -> Result<Interval> {
    for idx in start + 1..=end {
        if metric.distance(&points[start], &points[idx])? > opts.collocation_radius {
            return Ok(Interval {
                start,
                end,
                center: None,
            });
        }
    }
    Ok(Interval {
        start,
        end,
        center: Some(start),
    })
}

#[cfg(test)]
mod tests {
    use geom::{Distance, Time};

    use super::*;
    use crate::{Coordinates, Euclidean, ObjectID};

    // Points spaced by the given minutes, all at x = positions[i]
    fn trajectory(minutes: &[usize], positions: &[f64]) -> Trajectory {
        Trajectory::new(
            minutes
                .iter()
                .zip(positions)
                .map(|(m, x)| {
                    Point::new(
                        ObjectID::new("a"),
                        Time::START_OF_DAY + Duration::minutes(*m),
                        Coordinates::new_2d(*x, 0.0),
                    )
                })
                .collect(),
        )
        .unwrap()
    }

    fn opts() -> IdleOptions {
        IdleOptions::new(Duration::minutes(60), Distance::meters(100.0))
    }

    fn check_partition(t: &Trajectory, intervals: &[Interval]) {
        assert_eq!(intervals[0].start, 0);
        assert_eq!(intervals.last().unwrap().end, t.len() - 1);
        for pair in intervals.windows(2) {
            assert_eq!(pair[0].end + 1, pair[1].start);
        }
        for i in intervals {
            assert!(i.start <= i.end);
            let span = t[i.end].time - t[i.start].time;
            assert!(span <= Duration::minutes(30) || i.end == i.start + 1);
        }
    }

    #[test]
    fn evenly_sampled() {
        let minutes: Vec<usize> = (0..200).collect();
        let positions: Vec<f64> = (0..200).map(|i| i as f64 * 1000.0).collect();
        let t = trajectory(&minutes, &positions);
        let intervals = partition(&t, &Euclidean, &opts()).unwrap();
        check_partition(&t, &intervals);
        assert!(intervals.iter().all(|i| i.center.is_none()));
    }

    #[test]
    fn irregular_sampling() {
        // Bursts of frequent pings separated by long silences
        let mut minutes = Vec::new();
        for burst in 0..5 {
            for i in 0..20 {
                minutes.push(burst * 180 + i);
            }
        }
        let positions = vec![0.0; minutes.len()];
        let t = trajectory(&minutes, &positions);
        let intervals = partition(&t, &Euclidean, &opts()).unwrap();
        check_partition(&t, &intervals);
        // Everything's in one spot
        assert!(intervals.iter().all(|i| i.center.is_some()));
        // Crossing a 3 hour silence needs a two-point interval
        assert!(intervals.iter().any(|i| i.end == i.start + 1
            && t[i.end].time - t[i.start].time > Duration::minutes(30)));
    }

    #[test]
    fn labels_anchor_on_the_first_point() {
        // Points drift by 60m each minute. Within 100m of the first point only briefly.
        let minutes: Vec<usize> = (0..10).collect();
        let positions: Vec<f64> = (0..10).map(|i| i as f64 * 60.0).collect();
        let t = trajectory(&minutes, &positions);
        let points = t.points();
        assert_eq!(
            label(points, &Euclidean, &opts(), 0, 1).unwrap().center,
            Some(0)
        );
        assert_eq!(label(points, &Euclidean, &opts(), 0, 2).unwrap().center, None);
        assert_eq!(
            label(points, &Euclidean, &opts(), 4, 5).unwrap().center,
            Some(4)
        );
    }

    #[test]
    fn two_points() {
        let t = trajectory(&[0, 300], &[0.0, 5.0]);
        let intervals = partition(&t, &Euclidean, &opts()).unwrap();
        assert_eq!(
            intervals,
            vec![Interval {
                start: 0,
                end: 1,
                center: Some(0)
            }]
        );
    }
}
