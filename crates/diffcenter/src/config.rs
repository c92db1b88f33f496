//! Pipeline configuration.

/// Tuning knobs for the centering pipeline.
///
/// The defaults reproduce the behavior of the interactive application this
/// library was extracted from; `quantile_low`/`quantile_high` are the only
/// fields most callers need to touch.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CenteringConfig {
    /// Low quantile for the validity mask; pixels at or below this level are
    /// treated as beam-block and blanked before polar warping.
    pub quantile_low: f64,
    /// High quantile for the validity mask; cuts saturated pixels.
    pub quantile_high: f64,
    /// Shorter-side pixel count above which the image is subsampled for the
    /// fit: `step = max(1, min(h, w) / downsample_threshold)`.
    pub downsample_threshold: usize,
    /// Erosion iterations applied to the subsampled mask before fitting,
    /// discarding the transition band around excluded regions.
    pub erosion_iterations: usize,
    /// Number of angular bins in the polar warp, spanning `[0, 2π)`.
    pub theta_bins: usize,
    /// Iteration budget for the Levenberg-Marquardt center fit.
    pub max_fit_iterations: usize,
}

impl Default for CenteringConfig {
    fn default() -> Self {
        Self {
            quantile_low: 0.05,
            quantile_high: 0.95,
            downsample_threshold: 512,
            erosion_iterations: 5,
            theta_bins: 360,
            max_fit_iterations: 100,
        }
    }
}

impl CenteringConfig {
    /// Subsampling stride for an image with the given shape.
    pub fn downsample_step(&self, shape: (usize, usize)) -> usize {
        let short_side = shape.0.min(shape.1);
        (short_side / self.downsample_threshold.max(1)).max(1)
    }
}
