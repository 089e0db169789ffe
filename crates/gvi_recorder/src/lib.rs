//! The result recorder: a bounded, append-only ring
//! of per-iteration snapshots, exported as CSV trajectories the way
//! specifies (`mean.csv`, `cov.csv`, `precision.csv`,
//! `cost.csv`, `factor_costs.csv`).
//!
//! The teacher's own `export.rs` serializes a single Bevy resource
//! snapshot to JSON through a `Plugin`; this crate generalizes that idea
//! to a multi-iteration numeric trajectory, switching the wire format to
//! CSV (`csv` is already in the workspace's dependency stack) since the
//! spec's consumers are numeric analysis tools, not a UI.

#![allow(clippy::module_name_repetitions)]

use gvi_error::GviError;
use gvi_linalg::{Float, Matrix, Vector};
use trajectory::Trajectory;

/// One committed iteration's full state, as required by
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// The joint mean `μ` at this iteration.
    pub mean: Vector<Float>,
    /// The joint covariance `Σ = Λ⁻¹` at this iteration.
    pub covariance: Matrix<Float>,
    /// The joint precision `Λ` at this iteration.
    pub precision: Matrix<Float>,
    /// The total free energy `F(μ,Λ)`.
    pub total_cost: Float,
    /// Each factor's `cost(μₖ)` (or cubature-estimated `E[cost]`), in
    /// factor-registration order.
    pub per_factor_cost: Vec<Float>,
}

/// A bounded, append-only ring of [`Snapshot`]s.
///
/// Once `capacity` snapshots have been recorded, further [`Recorder::push`]
/// calls are discarded — not overwritten — and logged at `warn`, per
/// ("Writes are append-only up to the iteration cap; once
/// full, further writes are discarded (not overwritten) and logged").
#[derive(Debug)]
pub struct Recorder {
    capacity: usize,
    snapshots: Vec<Snapshot>,
    discarded: usize,
}

impl Recorder {
    /// Builds an empty recorder with room for `capacity` snapshots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity, snapshots: Vec::with_capacity(capacity), discarded: 0 }
    }

    /// Appends `snapshot`, discarding it (and logging a warning) if the
    /// recorder is already at capacity.
    pub fn push(&mut self, snapshot: Snapshot) {
        if self.snapshots.len() >= self.capacity {
            self.discarded += 1;
            tracing::warn!(
                capacity = self.capacity,
                discarded = self.discarded,
                "recorder at capacity, discarding snapshot"
            );
            return;
        }
        self.snapshots.push(snapshot);
    }

    /// The number of snapshots currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether no snapshot has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// The number of snapshots dropped after the recorder filled up.
    #[must_use]
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// The recorded snapshots, in commit order.
    #[must_use]
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Writes every output file into `dir`: `mean.csv`,
    /// `cov.csv`, `precision.csv`, `cost.csv`, `factor_costs.csv`. Each
    /// row is one iteration; matrices are flattened row-major, one row
    /// per iteration ("per-iteration covariance, one
    /// row-major block per line"). Values are written with fixed
    /// 4-decimal precision and no header, per the wire format in
    ///
    ///
    /// # Errors
    ///
    /// Returns [`GviError::Io`] if `dir` cannot be created or any file
    /// cannot be written.
    pub fn export_csv(&self, dir: &std::path::Path) -> Result<(), GviError> {
        std::fs::create_dir_all(dir)?;
        self.write_vector_rows(&dir.join("mean.csv"), |s| s.mean.iter().copied().collect())?;
        self.write_vector_rows(&dir.join("cov.csv"), |s| flatten_row_major(&s.covariance))?;
        self.write_vector_rows(&dir.join("precision.csv"), |s| flatten_row_major(&s.precision))?;
        self.write_vector_rows(&dir.join("cost.csv"), |s| vec![s.total_cost])?;
        self.write_vector_rows(&dir.join("factor_costs.csv"), |s| s.per_factor_cost.clone())?;
        Ok(())
    }

    fn write_vector_rows(
        &self,
        path: &std::path::Path,
        extract: impl Fn(&Snapshot) -> Vec<Float>,
    ) -> Result<(), GviError> {
        let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_to_gvi_error)?;
        for snapshot in &self.snapshots {
            let row: Vec<String> = extract(snapshot).iter().map(|v| format!("{v:.4}")).collect();
            writer.write_record(&row).map_err(csv_to_gvi_error)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn flatten_row_major(m: &Matrix<Float>) -> Vec<Float> {
    m.iter().copied().collect()
}

fn csv_to_gvi_error(err: csv::Error) -> GviError {
    match err.into_kind() {
        csv::ErrorKind::Io(io_err) => GviError::Io(io_err),
        other => GviError::Io(std::io::Error::new(std::io::ErrorKind::Other, format!("{other:?}"))),
    }
}

/// One committed PGCS outer-loop iteration's closed-loop system and
/// nominal trajectory, the four trajectory-shaped artifacts
/// adds to the output directory for PGCS runs (`Kt.csv`, `dt.csv`,
/// `zk.csv`, `Sk.csv`).
#[derive(Debug, Clone)]
pub struct PgcsSnapshot {
    /// The feedback gain trajectory `K`, shape `(nu, nx, nt)`.
    pub feedback_gain: Trajectory,
    /// The feedforward trajectory `d`, shape `(nu, 1, nt)`.
    pub feedforward: Trajectory,
    /// The nominal mean trajectory `z`, shape `(nx, 1, nt)`.
    pub mean_trajectory: Trajectory,
    /// The nominal covariance trajectory `Σ`, shape `(nx, nx, nt)`.
    pub covariance_trajectory: Trajectory,
}

/// A bounded, append-only ring of [`PgcsSnapshot`]s, mirroring
/// [`Recorder`]'s capacity-and-discard contract but for PGCS's
/// trajectory-tensor state rather than GVI-GH's single joint snapshot.
#[derive(Debug)]
pub struct PgcsRecorder {
    capacity: usize,
    snapshots: Vec<PgcsSnapshot>,
    discarded: usize,
}

impl PgcsRecorder {
    /// Builds an empty recorder with room for `capacity` snapshots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity, snapshots: Vec::with_capacity(capacity), discarded: 0 }
    }

    /// Appends `snapshot`, discarding it (and logging a warning) if the
    /// recorder is already at capacity.
    pub fn push(&mut self, snapshot: PgcsSnapshot) {
        if self.snapshots.len() >= self.capacity {
            self.discarded += 1;
            tracing::warn!(
                capacity = self.capacity,
                discarded = self.discarded,
                "pgcs recorder at capacity, discarding snapshot"
            );
            return;
        }
        self.snapshots.push(snapshot);
    }

    /// The number of snapshots currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether no snapshot has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// The number of snapshots dropped after the recorder filled up.
    #[must_use]
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// The recorded snapshots, in commit order.
    #[must_use]
    pub fn snapshots(&self) -> &[PgcsSnapshot] {
        &self.snapshots
    }

    /// Writes `Kt.csv`, `dt.csv`, `zk.csv`, `Sk.csv` into `dir`: one row
    /// per outer iteration, each row flattening the *entire* trajectory
    /// (every support state's block, row-major, concatenated in time
    /// order) — the trajectory-tensor generalization of [`Recorder::export_csv`]'s
    /// "one row-major block per line" convention, since a PGCS snapshot
    /// is a whole trajectory rather than a single block.
    ///
    /// # Errors
    ///
    /// Returns [`GviError::Io`] if `dir` cannot be created or any file
    /// cannot be written.
    pub fn export_csv(&self, dir: &std::path::Path) -> Result<(), GviError> {
        std::fs::create_dir_all(dir)?;
        self.write_trajectory_rows(&dir.join("Kt.csv"), |s| &s.feedback_gain)?;
        self.write_trajectory_rows(&dir.join("dt.csv"), |s| &s.feedforward)?;
        self.write_trajectory_rows(&dir.join("zk.csv"), |s| &s.mean_trajectory)?;
        self.write_trajectory_rows(&dir.join("Sk.csv"), |s| &s.covariance_trajectory)?;
        Ok(())
    }

    fn write_trajectory_rows(
        &self,
        path: &std::path::Path,
        extract: impl Fn(&PgcsSnapshot) -> &Trajectory,
    ) -> Result<(), GviError> {
        let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_to_gvi_error)?;
        for snapshot in &self.snapshots {
            let row: Vec<String> =
            flatten_trajectory_row_major(extract(snapshot)).iter().map(|v| format!("{v:.4}")).collect();
            writer.write_record(&row).map_err(csv_to_gvi_error)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn flatten_trajectory_row_major(trajectory: &Trajectory) -> Vec<Float> {
    (0..trajectory.len()).flat_map(|i| trajectory.extract(i).iter().copied().collect::<Vec<_>>()).collect()
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use pretty_assertions::assert_eq;

    use super::*;

    fn dummy_snapshot(value: Float) -> Snapshot {
        Snapshot {
            mean: Vector::from_vec(vec![value, value]),
            covariance: Matrix::<Float>::eye(2),
            precision: Matrix::<Float>::eye(2),
            total_cost: value,
            per_factor_cost: vec![value, value * 2.0],
        }
    }

    #[test]
    fn push_respects_capacity_and_counts_discards() {
        let mut recorder = Recorder::new(2);
        recorder.push(dummy_snapshot(1.0));
        recorder.push(dummy_snapshot(2.0));
        recorder.push(dummy_snapshot(3.0));
        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.discarded(), 1);
        assert_eq!(recorder.snapshots()[1].total_cost, 2.0);
    }

    #[test]
    fn empty_recorder_reports_empty() {
        let recorder = Recorder::new(4);
        assert!(recorder.is_empty());
    }

    #[test]
    fn export_csv_writes_one_row_per_snapshot() {
        let mut recorder = Recorder::new(4);
        recorder.push(dummy_snapshot(1.0));
        recorder.push(dummy_snapshot(2.0));
        let dir = std::env::temp_dir().join(format!("gvi_recorder_test_{}", std::process::id()));
        recorder.export_csv(&dir).expect("export should succeed");

        let content = std::fs::read_to_string(dir.join("cost.csv")).expect("cost.csv exists");
        assert_eq!(content.lines().count(), 2);
        assert_eq!(content.lines().next().unwrap(), "1.0000");

        let factor_content =
        std::fs::read_to_string(dir.join("factor_costs.csv")).expect("factor_costs.csv exists");
        assert_eq!(factor_content.lines().next().unwrap(), "1.0000,2.0000");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn flatten_row_major_matches_iteration_order() {
        let m = array![[1.0, 2.0], [3.0, 4.0]];
        assert_eq!(flatten_row_major(&m), vec![1.0, 2.0, 3.0, 4.0]);
    }
}
