//! Partition the ordered trajectory into runs of one label.

use std::collections::BTreeMap;

use crate::config::LabelSampling;
use crate::trajectory::TrajectoryRecord;

/// A maximal run of consecutive records sharing a label, after decimation
#[derive(Debug, Clone)]
pub struct ClusterSegment<'a> {
    pub label: &'a str,
    /// `(index into the trajectory, record)` in trajectory order
    pub records: Vec<(usize, &'a TrajectoryRecord)>,
    /// Per-axis median of the kept positions
    pub view_vector: [f64; 3],
    /// Largest distance from the origin among the kept positions
    pub view_distance: f64,
}

impl<'a> ClusterSegment<'a> {
    fn new(label: &'a str, records: Vec<(usize, &'a TrajectoryRecord)>) -> Self {
        let view_vector = [0usize, 1, 2].map(|axis| {
            let mut values: Vec<f64> = records.iter().map(|(_, r)| r.position[axis]).collect();
            median(&mut values)
        });
        let view_distance = records
            .iter()
            .map(|(_, r)| norm(r.position))
            .fold(0.0, f64::max);

        Self {
            label,
            records,
            view_vector,
            view_distance,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Split `records` into consecutive equal-label runs and decimate each run.
///
/// Runs whose label has no entry in `sampling` are skipped. A label that
/// comes back later in the trajectory starts a new segment.
pub fn segment_runs<'a>(
    records: &'a [TrajectoryRecord],
    sampling: &BTreeMap<String, LabelSampling>,
) -> Vec<ClusterSegment<'a>> {
    let mut segments = Vec::new();
    let mut start = 0;

    for run in records.chunk_by(|a, b| a.label == b.label) {
        let run_start = start;
        start += run.len();

        let label = run[0].label.as_str();
        let Some(rule) = sampling.get(label) else {
            tracing::trace!("Skipping run of {} '{}' records at {}", run.len(), label, run_start);
            continue;
        };

        let kept: Vec<_> = run
            .iter()
            .enumerate()
            .take(rule.max_samples)
            .step_by(rule.stride.max(1))
            .map(|(offset, record)| (run_start + offset, record))
            .collect();

        if !kept.is_empty() {
            segments.push(ClusterSegment::new(label, kept));
        }
    }

    segments
}

fn norm(p: [f64; 3]) -> f64 {
    (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt()
}

/// Median with the mean of the two middle values for even counts
fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn records(labels: &[&str]) -> Vec<TrajectoryRecord> {
        labels
            .iter()
            .enumerate()
            .map(|(i, label)| TrajectoryRecord::new(*label, [i as f64, 0.0, 0.0], i as u64 * 10, i as i64))
            .collect()
    }

    fn sampling(entries: &[(&str, usize, usize)]) -> BTreeMap<String, LabelSampling> {
        entries
            .iter()
            .map(|(label, max, stride)| (label.to_string(), LabelSampling::new(*max, *stride)))
            .collect()
    }

    #[test]
    fn test_consecutive_runs_are_not_merged() {
        let trajectory = records(&["a", "a", "b", "a"]);
        let segments = segment_runs(&trajectory, &sampling(&[("a", 10, 1), ("b", 10, 1)]));

        let labels: Vec<_> = segments.iter().map(|s| s.label).collect();
        assert_eq!(labels, vec!["a", "b", "a"]);
        let indices: Vec<Vec<usize>> = segments
            .iter()
            .map(|s| s.records.iter().map(|(i, _)| *i).collect())
            .collect();
        assert_eq!(indices, vec![vec![0, 1], vec![2], vec![3]]);
    }

    #[test]
    fn test_unmapped_labels_are_skipped() {
        let trajectory = records(&["idle", "run_left"]);
        let segments = segment_runs(&trajectory, &sampling(&[("run_left", 5, 1)]));
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].records[0].0, 1);
    }

    #[test]
    fn test_slice_then_stride() {
        let trajectory = records(&["a"; 10]);
        let segments = segment_runs(&trajectory, &sampling(&[("a", 7, 3)]));
        let indices: Vec<usize> = segments[0].records.iter().map(|(i, _)| *i).collect();
        // first 7 raw records, every third
        assert_eq!(indices, vec![0, 3, 6]);

        let segments = segment_runs(&trajectory, &sampling(&[("a", 100, 4)]));
        assert_eq!(segments[0].len(), 3);
    }

    #[test]
    fn test_length_matches_capped_run_lengths() {
        let labels: Vec<&str> = ["a"; 9]
            .into_iter()
            .chain(["b"; 4])
            .chain(["c"; 3])
            .chain(["a"; 2])
            .collect();
        let trajectory = records(&labels);
        let rules = sampling(&[("a", 5, 2), ("b", 10, 1)]);
        let segments = segment_runs(&trajectory, &rules);

        let total: usize = segments.iter().map(ClusterSegment::len).sum();
        // a: ceil(min(5,9)/2)=3, b: 4, c skipped, a: ceil(2/2)=1
        assert_eq!(total, 3 + 4 + 1);
    }

    #[test]
    fn test_view_vector_is_median_and_distance_is_max_norm() {
        let trajectory = vec![
            TrajectoryRecord::new("a", [1.0, 10.0, 0.0], 0, 0),
            TrajectoryRecord::new("a", [2.0, -4.0, 0.0], 1, 1),
            TrajectoryRecord::new("a", [100.0, 0.0, 3.0], 2, 2),
            TrajectoryRecord::new("a", [3.0, 2.0, 1.0], 3, 3),
        ];
        let segments = segment_runs(&trajectory, &sampling(&[("a", 10, 1)]));
        let segment = &segments[0];

        assert_relative_eq!(segment.view_vector[0], 2.5);
        assert_relative_eq!(segment.view_vector[1], 1.0);
        assert_relative_eq!(segment.view_vector[2], 0.5);
        assert_relative_eq!(segment.view_distance, (100.0f64 * 100.0 + 9.0).sqrt());
    }

    #[test]
    fn test_empty_trajectory() {
        let segments = segment_runs(&[], &sampling(&[("a", 1, 1)]));
        assert!(segments.is_empty());
    }
}
