use crate::engine::error::PipelineError;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Relative slack under which two frames count as equidistant from the ensemble mean.
const TIE_TOLERANCE: f64 = 1e-12;

/// Dihedral trajectory projected onto its leading principal axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReducedTrajectory {
    /// Share of the total variance captured by each kept axis.
    pub explained_variance: Vec<f64>,
    /// One row per frame, one column per kept axis.
    pub frames: Vec<Vec<f64>>,
}

impl ReducedTrajectory {
    pub fn components(&self) -> usize {
        self.explained_variance.len()
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), PipelineError> {
        let to_error = |e: csv::Error| PipelineError::Serialization {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        let mut writer = csv::Writer::from_path(path).map_err(to_error)?;

        let mut header = vec!["frame".to_string()];
        header.extend((1..=self.components()).map(|k| format!("pc{k}")));
        writer.write_record(&header).map_err(to_error)?;

        for (index, frame) in self.frames.iter().enumerate() {
            let mut record = vec![index.to_string()];
            record.extend(frame.iter().map(|x| x.to_string()));
            writer.write_record(&record).map_err(to_error)?;
        }
        writer
            .flush()
            .map_err(|e| PipelineError::io(path, e))
    }
}

/// Principal-component reduction of a dihedral trajectory.
///
/// Each angle is embedded as `(sin, cos)` so that the periodicity of dihedrals does not split
/// one conformation across the `-pi`/`pi` seam. Features are centred and projected onto the
/// top `components` right-singular vectors. The sign of every axis is fixed so that its
/// largest-magnitude loading is positive, making the projection reproducible.
pub fn reduce(
    dihedrals: &[Vec<f64>],
    components: usize,
) -> Result<ReducedTrajectory, PipelineError> {
    let n_frames = dihedrals.len();
    let n_angles = dihedrals.first().map_or(0, Vec::len);
    if n_frames == 0 || n_angles == 0 {
        return Err(PipelineError::malformed_output(
            "trajectory analysis",
            "dihedral trajectory is empty",
        ));
    }
    if let Some(bad) = dihedrals.iter().position(|frame| frame.len() != n_angles) {
        return Err(PipelineError::malformed_output(
            "trajectory analysis",
            format!(
                "frame {bad} has {} dihedrals, expected {n_angles}",
                dihedrals[bad].len()
            ),
        ));
    }

    let n_features = 2 * n_angles;
    let mut features = DMatrix::from_fn(n_frames, n_features, |row, col| {
        let angle = dihedrals[row][col / 2];
        if col % 2 == 0 { angle.sin() } else { angle.cos() }
    });
    for mut column in features.column_iter_mut() {
        let mean = column.mean();
        column.add_scalar_mut(-mean);
    }

    let svd = features.clone().svd(false, true);
    let Some(v_t) = svd.v_t else {
        return Err(PipelineError::malformed_output(
            "trajectory analysis",
            "singular value decomposition did not converge",
        ));
    };

    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));
    let kept = components.min(order.len());

    let total: f64 = svd.singular_values.iter().map(|s| s * s).sum();
    let mut explained_variance = Vec::with_capacity(kept);
    let mut axes = DMatrix::zeros(n_features, kept);
    for (k, &source) in order.iter().take(kept).enumerate() {
        let mut axis = v_t.row(source).transpose();
        let dominant = axis.iter().copied().fold(0.0_f64, |best, x| {
            if x.abs() > best.abs() { x } else { best }
        });
        if dominant < 0.0 {
            axis.neg_mut();
        }
        axes.set_column(k, &axis);

        let s = svd.singular_values[source];
        explained_variance.push(if total > 0.0 { s * s / total } else { 0.0 });
    }

    let projected = features * axes;
    let frames = projected
        .row_iter()
        .map(|row| row.iter().copied().collect())
        .collect();

    Ok(ReducedTrajectory {
        explained_variance,
        frames,
    })
}

/// Index of the frame closest to the ensemble mean in reduced space.
///
/// Frames whose distances agree to within a relative `1e-12` are treated as equidistant, and
/// the lowest frame index wins. Returns `None` for an empty trajectory.
pub fn representative_frame(frames: &[Vec<f64>]) -> Option<usize> {
    let first = frames.first()?;
    let dims = first.len();
    let mut mean = vec![0.0; dims];
    for frame in frames {
        for (m, x) in mean.iter_mut().zip(frame) {
            *m += x;
        }
    }
    for m in &mut mean {
        *m /= frames.len() as f64;
    }

    let distance_to_mean = |frame: &[f64]| -> f64 {
        frame
            .iter()
            .zip(&mean)
            .map(|(x, m)| (x - m).powi(2))
            .sum()
    };

    let mut best_index = 0;
    let mut best_distance = distance_to_mean(first);
    for (index, frame) in frames.iter().enumerate().skip(1) {
        let distance = distance_to_mean(frame);
        let slack = TIE_TOLERANCE * best_distance.max(1.0);
        if distance < best_distance - slack {
            best_index = index;
            best_distance = distance;
        }
    }
    Some(best_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use tempfile::tempdir;

    #[test]
    fn single_varying_angle_is_captured_by_the_first_axis() {
        let dihedrals = vec![
            vec![0.0, 1.0],
            vec![PI, 1.0],
            vec![0.0, 1.0],
            vec![PI, 1.0],
        ];
        let reduced = reduce(&dihedrals, 2).unwrap();

        assert_eq!(reduced.components(), 2);
        assert!((reduced.explained_variance[0] - 1.0).abs() < 1e-9);
        assert!(reduced.explained_variance[1].abs() < 1e-9);
        assert!((reduced.frames[0][0].abs() - 1.0).abs() < 1e-9);
        assert!((reduced.frames[0][0] + reduced.frames[1][0]).abs() < 1e-9);
        assert!((reduced.frames[0][0] - reduced.frames[2][0]).abs() < 1e-9);
    }

    #[test]
    fn requested_components_are_capped_by_the_data() {
        let dihedrals = vec![vec![0.1], vec![0.2], vec![0.4]];
        let reduced = reduce(&dihedrals, 10).unwrap();
        assert_eq!(reduced.components(), 2);
        assert!(reduced.frames.iter().all(|f| f.len() == 2));
    }

    #[test]
    fn projection_is_invariant_to_the_angle_seam() {
        let near_seam = vec![vec![PI - 0.01], vec![-PI + 0.01], vec![0.0]];
        let reduced = reduce(&near_seam, 1).unwrap();
        let gap_across_seam = (reduced.frames[0][0] - reduced.frames[1][0]).abs();
        let gap_to_far_frame = (reduced.frames[0][0] - reduced.frames[2][0]).abs();
        assert!(gap_across_seam < gap_to_far_frame);
    }

    #[test]
    fn ragged_or_empty_trajectories_are_rejected() {
        assert!(reduce(&[], 2).is_err());
        let ragged = vec![vec![0.0, 1.0], vec![0.0]];
        assert!(matches!(
            reduce(&ragged, 2),
            Err(PipelineError::EngineFailure { .. })
        ));
    }

    #[test]
    fn representative_frame_is_nearest_to_mean() {
        let frames = vec![vec![2.0], vec![0.4], vec![-0.5], vec![-1.9]];
        assert_eq!(representative_frame(&frames), Some(1));
    }

    #[test]
    fn equidistant_frames_resolve_to_lowest_index() {
        let frames = vec![vec![1.0, 0.0], vec![-1.0, 0.0], vec![0.0, 1.0], vec![0.0, -1.0]];
        assert_eq!(representative_frame(&frames), Some(0));

        let frames = vec![vec![2.0], vec![0.5], vec![-0.5], vec![-2.0]];
        assert_eq!(representative_frame(&frames), Some(1));
    }

    #[test]
    fn later_frame_wins_when_it_is_strictly_closer() {
        let frames = vec![vec![3.0, 3.0], vec![2.0, 2.0], vec![0.1, -0.1], vec![-5.0, -5.0]];
        assert_eq!(representative_frame(&frames), Some(2));
    }

    #[test]
    fn single_frame_is_its_own_representative() {
        assert_eq!(representative_frame(&[vec![0.3, -1.2]]), Some(0));
    }

    #[test]
    fn empty_trajectory_has_no_representative() {
        assert_eq!(representative_frame(&[]), None);
    }

    #[test]
    fn reduced_trajectory_is_written_as_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aptamer_reduced.csv");
        let reduced = ReducedTrajectory {
            explained_variance: vec![0.75, 0.25],
            frames: vec![vec![1.5, -0.5], vec![-1.5, 0.5]],
        };
        reduced.write_csv(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["frame,pc1,pc2", "0,1.5,-0.5", "1,-1.5,0.5"]);
    }
}
