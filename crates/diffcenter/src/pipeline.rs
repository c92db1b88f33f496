//! End-to-end pipeline: mask → center fit → blank → polar → profiles.

use ndarray::Array2;

use crate::center::{estimate_center, CenterFit};
use crate::config::CenteringConfig;
use crate::error::CenteringError;
use crate::mask::evaluate_mask;
use crate::model::{FitParams, PowerLaw, RadialModel};
use crate::polar::{blank_region, warp_polar};
use crate::profile::{aggregate_profiles, RadialProfiles};

/// Everything one pipeline run produces.
#[derive(Debug, Clone)]
pub struct CenteringResult {
    /// Usable-pixel mask from the quantile thresholds.
    pub mask: Array2<bool>,
    /// Beam-block complement: pixels at or below the low threshold.
    pub below_low: Array2<bool>,
    /// Estimated center `(y, x)` in full-resolution pixels.
    pub center: [f64; 2],
    /// Fitted model parameters.
    pub params: FitParams,
    /// Subsampling stride the fit ran at.
    pub step: usize,
    /// Subsampled diagnostic image with excluded pixels NaN-blanked.
    pub masked_downsampled: Array2<f64>,
    /// Full-resolution synthesized background.
    pub background: Array2<f64>,
    /// Polar warp of the raw image, out-of-support bins zero.
    pub polar: Array2<f64>,
    /// Polar warp of the beam-block-blanked image, out-of-support bins NaN.
    pub polar_masked: Array2<f64>,
    /// Polar warp of the blanked background, out-of-support bins NaN.
    pub polar_background: Array2<f64>,
    /// Radial profiles of the masked image, background and their clipped
    /// difference.
    pub profiles: RadialProfiles,
}

/// Run the whole pipeline with the default power-law model.
pub fn process(
    img: &Array2<f64>,
    config: &CenteringConfig,
) -> Result<CenteringResult, CenteringError> {
    process_with_model(img, &PowerLaw, config)
}

/// Run the whole pipeline with a caller-supplied radial model.
///
/// Pure call-and-return: every invocation recomputes the mask and fit from
/// its inputs, and nothing is cached across calls.
pub fn process_with_model<M: RadialModel>(
    img: &Array2<f64>,
    model: &M,
    config: &CenteringConfig,
) -> Result<CenteringResult, CenteringError> {
    let masks = evaluate_mask(img, config.quantile_low, config.quantile_high)?;
    let fit: CenterFit = estimate_center(img, Some(&masks.mask), model, config)?;

    let blanked = blank_region(img, &masks.below_low)?;
    let blanked_background = blank_region(&fit.background, &masks.below_low)?;

    let polar = warp_polar(img, fit.center, 0.0, config.theta_bins);
    let polar_masked = warp_polar(&blanked, fit.center, f64::NAN, config.theta_bins);
    let polar_background = warp_polar(&blanked_background, fit.center, f64::NAN, config.theta_bins);

    let profiles = aggregate_profiles(&polar_masked, &polar_background)?;
    tracing::info!(
        "pipeline done: center ({:.1}, {:.1}), {} radius bins",
        fit.center[0],
        fit.center[1],
        profiles.raw.len()
    );

    Ok(CenteringResult {
        mask: masks.mask,
        below_low: masks.below_low,
        center: fit.center,
        params: fit.params,
        step: fit.step,
        masked_downsampled: fit.masked_downsampled,
        background: fit.background,
        polar,
        polar_masked,
        polar_background,
        profiles,
    })
}
