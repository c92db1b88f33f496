//! Quantile-based validity masking and binary morphology.

use ndarray::Array2;

use crate::error::CenteringError;

/// Output of [`evaluate_mask`].
#[derive(Debug, Clone)]
pub struct MaskPair {
    /// Usable pixels: strictly between the low and high quantile thresholds,
    /// after one binary closing pass.
    pub mask: Array2<bool>,
    /// Pixels at or below the low threshold. Marks the beam-block region to
    /// blank before polar warping.
    pub below_low: Array2<bool>,
}

/// Build the validity mask for a raw image from quantile thresholds.
///
/// Quantiles are computed over finite pixels only; NaN entries never count
/// as usable. The mask is closed (dilate then erode, 3x3 cross) to remove
/// isolated single-pixel holes.
pub fn evaluate_mask(
    img: &Array2<f64>,
    quantile_low: f64,
    quantile_high: f64,
) -> Result<MaskPair, CenteringError> {
    if !(0.0..=1.0).contains(&quantile_low)
        || !(0.0..=1.0).contains(&quantile_high)
        || quantile_low >= quantile_high
    {
        return Err(CenteringError::InvalidQuantiles {
            low: quantile_low,
            high: quantile_high,
        });
    }

    let lo = nan_quantile(img, quantile_low).ok_or(CenteringError::NoFinitePixels)?;
    let hi = nan_quantile(img, quantile_high).ok_or(CenteringError::NoFinitePixels)?;
    tracing::debug!("mask thresholds: low={lo:.4}, high={hi:.4}");

    let above_low = img.mapv(|v| v > lo);
    let mut mask = Array2::from_shape_fn(img.dim(), |idx| above_low[idx] && img[idx] < hi);
    mask = binary_close(&mask);

    let below_low = above_low.mapv(|v| !v);
    Ok(MaskPair { mask, below_low })
}

/// Quantile of the finite pixels with linear interpolation between order
/// statistics. `None` when no pixel is finite.
pub(crate) fn nan_quantile(img: &Array2<f64>, q: f64) -> Option<f64> {
    let mut vals: Vec<f64> = img.iter().copied().filter(|v| v.is_finite()).collect();
    if vals.is_empty() {
        return None;
    }
    vals.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap());

    let pos = q.clamp(0.0, 1.0) * (vals.len() - 1) as f64;
    let lo_idx = pos.floor() as usize;
    let hi_idx = pos.ceil() as usize;
    let frac = pos - lo_idx as f64;
    Some(vals[lo_idx] + (vals[hi_idx] - vals[lo_idx]) * frac)
}

/// One dilation pass with a 3x3 cross; out-of-image neighbors count as unset.
fn dilate_once(mask: &Array2<bool>) -> Array2<bool> {
    let (h, w) = mask.dim();
    Array2::from_shape_fn((h, w), |(i, j)| {
        mask[[i, j]]
            || (i > 0 && mask[[i - 1, j]])
            || (i + 1 < h && mask[[i + 1, j]])
            || (j > 0 && mask[[i, j - 1]])
            || (j + 1 < w && mask[[i, j + 1]])
    })
}

/// One erosion pass with a 3x3 cross; out-of-image neighbors count as unset,
/// so set regions also shrink away from the image border.
fn erode_once(mask: &Array2<bool>) -> Array2<bool> {
    let (h, w) = mask.dim();
    Array2::from_shape_fn((h, w), |(i, j)| {
        mask[[i, j]]
            && (i > 0 && mask[[i - 1, j]])
            && (i + 1 < h && mask[[i + 1, j]])
            && (j > 0 && mask[[i, j - 1]])
            && (j + 1 < w && mask[[i, j + 1]])
    })
}

/// Iterated binary erosion.
pub(crate) fn binary_erode(mask: &Array2<bool>, iterations: usize) -> Array2<bool> {
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = erode_once(&out);
    }
    out
}

/// Binary closing: dilate then erode, one pass each.
fn binary_close(mask: &Array2<bool>) -> Array2<bool> {
    erode_once(&dilate_once(mask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ramp_image(h: usize, w: usize) -> Array2<f64> {
        Array2::from_shape_fn((h, w), |(i, j)| (i * w + j) as f64)
    }

    #[test]
    fn mask_shape_matches_image() {
        let img = ramp_image(12, 17);
        let pair = evaluate_mask(&img, 0.10, 0.95).unwrap();
        assert_eq!(pair.mask.dim(), img.dim());
        assert_eq!(pair.below_low.dim(), img.dim());
    }

    #[test]
    fn mask_is_idempotent_for_identical_inputs() {
        let img = ramp_image(20, 20);
        let a = evaluate_mask(&img, 0.10, 0.95).unwrap();
        let b = evaluate_mask(&img, 0.10, 0.95).unwrap();
        assert_eq!(a.mask, b.mask);
        assert_eq!(a.below_low, b.below_low);
    }

    #[test]
    fn below_low_complements_the_low_threshold() {
        let img = ramp_image(10, 10);
        let pair = evaluate_mask(&img, 0.25, 0.95).unwrap();
        // ~25% of the ramp sits at or below the low threshold.
        let n_below = pair.below_low.iter().filter(|&&b| b).count();
        assert!((20..=30).contains(&n_below), "n_below = {n_below}");
        // No usable pixel may be flagged as beam-block.
        for (idx, &m) in pair.mask.indexed_iter() {
            assert!(!(m && pair.below_low[idx]));
        }
    }

    #[test]
    fn nan_pixels_are_excluded_from_quantiles_and_mask() {
        let mut img = ramp_image(10, 10);
        img[[0, 0]] = f64::NAN;
        img[[5, 5]] = f64::NAN;
        let finite = evaluate_mask(&img, 0.10, 0.95).unwrap();
        assert!(!finite.mask[[0, 0]]);

        let all_nan = Array2::from_elem((4, 4), f64::NAN);
        assert!(matches!(
            evaluate_mask(&all_nan, 0.10, 0.95),
            Err(CenteringError::NoFinitePixels)
        ));
    }

    #[test]
    fn invalid_quantile_bounds_are_rejected() {
        let img = ramp_image(4, 4);
        assert!(matches!(
            evaluate_mask(&img, 0.95, 0.10),
            Err(CenteringError::InvalidQuantiles { .. })
        ));
        assert!(matches!(
            evaluate_mask(&img, -0.1, 0.95),
            Err(CenteringError::InvalidQuantiles { .. })
        ));
    }

    #[test]
    fn nan_quantile_interpolates_linearly() {
        let img = array![[0.0, 1.0], [2.0, 3.0]];
        assert_eq!(nan_quantile(&img, 0.0), Some(0.0));
        assert_eq!(nan_quantile(&img, 1.0), Some(3.0));
        assert_eq!(nan_quantile(&img, 0.5), Some(1.5));
    }

    #[test]
    fn erosion_shrinks_from_borders_and_holes() {
        let mut mask = Array2::from_elem((7, 7), true);
        mask[[3, 3]] = false;
        let eroded = binary_erode(&mask, 1);
        // Border ring gone, hole grown into a cross.
        assert!(!eroded[[0, 3]]);
        assert!(!eroded[[3, 2]]);
        assert!(!eroded[[2, 3]]);
        assert!(eroded[[2, 2]]);

        // Enough iterations empty the mask entirely.
        let empty = binary_erode(&mask, 4);
        assert!(empty.iter().all(|&b| !b));
    }

    #[test]
    fn closing_fills_single_pixel_holes() {
        let mut mask = Array2::from_elem((9, 9), true);
        mask[[4, 4]] = false;
        let closed = binary_close(&mask);
        assert!(closed[[4, 4]]);
    }
}
