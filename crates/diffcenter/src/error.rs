//! Error types shared by the centering pipeline.

/// Errors that can occur during masking, center fitting or profiling.
///
/// Every failure propagates to the immediate caller; nothing is retried or
/// silently recovered inside the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum CenteringError {
    /// Quantile bounds are outside `[0, 1]` or not ordered `low < high`.
    InvalidQuantiles {
        /// Requested low quantile.
        low: f64,
        /// Requested high quantile.
        high: f64,
    },
    /// The image contains no finite pixels, so quantiles are undefined.
    NoFinitePixels,
    /// Two arrays that must share a shape do not.
    ShapeMismatch {
        /// Shape of the reference array (rows, cols).
        expected: (usize, usize),
        /// Shape of the offending array (rows, cols).
        got: (usize, usize),
    },
    /// The mask has no usable pixels after erosion, or the masked intensity
    /// sums to zero so the centroid seed is undefined.
    DegenerateMask {
        /// Usable pixel count after erosion.
        usable: usize,
    },
    /// The least-squares solver did not converge within its iteration budget.
    FitDivergence {
        /// Iterations spent before giving up.
        iterations: usize,
    },
}

impl std::fmt::Display for CenteringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuantiles { low, high } => {
                write!(f, "invalid quantile bounds: low={low}, high={high}")
            }
            Self::NoFinitePixels => write!(f, "image has no finite pixels"),
            Self::ShapeMismatch { expected, got } => {
                write!(
                    f,
                    "shape mismatch: expected {}x{}, got {}x{}",
                    expected.0, expected.1, got.0, got.1
                )
            }
            Self::DegenerateMask { usable } => {
                write!(
                    f,
                    "degenerate mask: {usable} usable pixels after erosion, centroid undefined"
                )
            }
            Self::FitDivergence { iterations } => {
                write!(f, "center fit did not converge after {iterations} iterations")
            }
        }
    }
}

impl std::error::Error for CenteringError {}
