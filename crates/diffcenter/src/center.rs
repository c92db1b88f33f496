//! Center estimation: subsample, erode, seed, fit, rescale.

use ndarray::{s, Array2};

use crate::background::synthesize_background;
use crate::config::CenteringConfig;
use crate::error::CenteringError;
use crate::mask::binary_erode;
use crate::model::{FitParams, RadialModel};

mod solver;

use solver::{Bounds, Sample};

/// Result of one center fit.
#[derive(Debug, Clone)]
pub struct CenterFit {
    /// Estimated center `(y, x)` in full-resolution pixel coordinates.
    pub center: [f64; 2],
    /// Fitted parameters; `xc`/`yc` rescaled to full resolution, `amplitude`
    /// and `exponent` at fit scale (the background synthesis compensates).
    pub params: FitParams,
    /// Subsampling stride the fit ran at.
    pub step: usize,
    /// Subsampled image with eroded-mask-excluded pixels set to NaN.
    /// Diagnostic output only.
    pub masked_downsampled: Array2<f64>,
    /// Full-resolution background synthesized from the fitted parameters.
    pub background: Array2<f64>,
}

/// Fit `model` to the masked image and recover the pattern center.
///
/// The image is subsampled by `step = max(1, min(h, w) / downsample_threshold)`
/// to bound fit cost, and the mask is eroded to discard the transition band
/// around excluded regions (e.g. a beam-block edge). A missing `mask` means
/// every pixel is usable.
///
/// The full-resolution background is synthesized from the fitted parameters
/// as part of the same call, since it is a necessary side product of the fit.
pub fn estimate_center<M: RadialModel>(
    img: &Array2<f64>,
    mask: Option<&Array2<bool>>,
    model: &M,
    config: &CenteringConfig,
) -> Result<CenterFit, CenteringError> {
    let (h, w) = img.dim();
    if let Some(m) = mask {
        if m.dim() != img.dim() {
            return Err(CenteringError::ShapeMismatch {
                expected: img.dim(),
                got: m.dim(),
            });
        }
    }

    let step = config.downsample_step((h, w));
    let stride = step as isize;
    let img_ds = img.slice(s![..;stride, ..;stride]).to_owned();
    let mask_ds = match mask {
        Some(m) => m.slice(s![..;stride, ..;stride]).to_owned(),
        None => Array2::from_elem(img_ds.dim(), true),
    };

    let mask_eroded = binary_erode(&mask_ds, config.erosion_iterations);
    let n_usable = mask_eroded.iter().filter(|&&b| b).count();
    tracing::debug!(
        "center fit: step={step}, {}x{} subsampled, {n_usable} usable pixels",
        img_ds.nrows(),
        img_ds.ncols()
    );
    if n_usable == 0 {
        return Err(CenteringError::DegenerateMask { usable: 0 });
    }

    let mut masked_downsampled = img_ds.clone();
    for (idx, v) in masked_downsampled.indexed_iter_mut() {
        if !mask_eroded[idx] {
            *v = f64::NAN;
        }
    }

    // Centroid seed over the eroded mask; amplitude seed is the masked peak.
    let mut m00 = 0.0;
    let mut m10 = 0.0;
    let mut m01 = 0.0;
    let mut peak = f64::NEG_INFINITY;
    let mut samples = Vec::with_capacity(n_usable);
    for ((i, j), &v) in img_ds.indexed_iter() {
        if !mask_eroded[[i, j]] {
            continue;
        }
        let x = j as f64;
        let y = i as f64;
        if v.is_finite() {
            m00 += v;
            m10 += x * v;
            m01 += y * v;
            peak = peak.max(v);
        }
        samples.push(Sample { x, y, value: v });
    }
    if m00 <= 0.0 || !peak.is_finite() {
        return Err(CenteringError::DegenerateMask { usable: n_usable });
    }
    let xc0 = m10 / m00;
    let yc0 = m01 / m00;

    let (h_ds, w_ds) = img_ds.dim();
    let init = [peak, -1.0, xc0, yc0];
    let bounds = Bounds {
        lower: [0.0, f64::NEG_INFINITY, 0.0, 0.0],
        upper: [f64::INFINITY, 0.0, w_ds as f64, h_ds as f64],
    };

    let popt = solver::solve_radial_fit(model, &samples, init, &bounds, config.max_fit_iterations)?;

    // Report the center in full-resolution pixel space; amplitude and
    // exponent stay at fit scale.
    let params = FitParams {
        amplitude: popt[0],
        exponent: popt[1],
        xc: popt[2] * step as f64,
        yc: popt[3] * step as f64,
    };
    tracing::info!(
        "center fit: ({:.2}, {:.2}), exponent {:.3}",
        params.yc,
        params.xc,
        params.exponent
    );

    let background = synthesize_background((h, w), model, &params, step);

    Ok(CenterFit {
        center: [params.yc, params.xc],
        params,
        step,
        masked_downsampled,
        background,
    })
}
