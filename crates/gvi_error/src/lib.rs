//! The error taxonomy from the crate's external interface contract.
//!
//! Every failure that can leave the GVI-GH or PGCS engines is one of the
//! six kinds below, each carrying a stable string identifier so that a
//! CLI or calling process can match on it rather than on message text.

/// A failure raised by any component of the workspace.
#[derive(Debug, thiserror::Error)]
pub enum GviError {
    /// A caller supplied a non-positive-definite matrix where one is
    /// required (e.g. a covariance passed into Gauss-Hermite cubature).
    #[error("invalid_covariance: {0}")]
    InvalidCovariance(String),

    /// An iterate's precision (or an intermediate used to build one)
    /// lost positive-definiteness during a step; the step is rejected
    /// and backtracking resumes.
    #[error("not_positive_definite: {0}")]
    NotPositiveDefinite(String),

    /// Linear covariance steering cannot match the requested boundary
    /// marginals under the current dynamics.
    #[error("boundary_infeasible: {0}")]
    BoundaryInfeasible(String),

    /// Cubature was refused because `p.pow(d)` exceeds the configured
    /// cap; callers must split the problem into factored marginals.
    #[error("curse_of_dimensionality: {0}")]
    CurseOfDimensionality(String),

    /// `max_backtrack` was exceeded with no cost decrease; the optimizer
    /// commits the last proposed iterate and returns a warning-status
    /// result rather than failing outright.
    #[error("convergence_stalled: {0}")]
    ConvergenceStalled(String),

    /// An SDF grid, kinematic description, or result directory could not
    /// be read or written.
    #[error("io_error: {0}")]
    Io(#[from] std::io::Error),
}

impl GviError {
    /// The stable string identifier used in printed diagnostics and exit
    /// status reporting, matching the taxonomy's naming exactly.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidCovariance(_) => "invalid_covariance",
            Self::NotPositiveDefinite(_) => "not_positive_definite",
            Self::BoundaryInfeasible(_) => "boundary_infeasible",
            Self::CurseOfDimensionality(_) => "curse_of_dimensionality",
            Self::ConvergenceStalled(_) => "convergence_stalled",
            Self::Io(_) => "io_error",
        }
    }

    /// Kinds other than [`NotPositiveDefinite`](Self::NotPositiveDefinite)
    /// and backtrack exhaustion are not handled internally and must
    /// propagate to the caller with the last committed iterate attached.
    #[must_use]
    pub const fn is_recoverable_internally(&self) -> bool {
        matches!(self, Self::NotPositiveDefinite(_) | Self::ConvergenceStalled(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_matches_taxonomy_identifiers() {
        assert_eq!(GviError::InvalidCovariance(String::new()).code(), "invalid_covariance");
        assert_eq!(GviError::NotPositiveDefinite(String::new()).code(), "not_positive_definite");
        assert_eq!(GviError::BoundaryInfeasible(String::new()).code(), "boundary_infeasible");
        assert_eq!(
            GviError::CurseOfDimensionality(String::new()).code(),
            "curse_of_dimensionality"
        );
        assert_eq!(GviError::ConvergenceStalled(String::new()).code(), "convergence_stalled");
    }

    #[test]
    fn io_error_converts_via_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: GviError = io.into();
        assert_eq!(err.code(), "io_error");
    }

    #[test]
    fn convergence_stalled_is_internally_recoverable() {
        assert!(GviError::ConvergenceStalled(String::new()).is_recoverable_internally());
        assert!(!GviError::BoundaryInfeasible(String::new()).is_recoverable_internally());
    }
}
