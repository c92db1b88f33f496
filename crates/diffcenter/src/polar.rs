//! Cartesian-to-polar resampling about an estimated center.

use ndarray::Array2;

use crate::error::CenteringError;

/// Resample `img` into polar coordinates about `center` (`(y, x)` in pixels).
///
/// Axis 0 indexes angle (`theta_bins` bins spanning `[0, 2π)`), axis 1
/// indexes radius in roughly one-pixel bins out to the farthest image corner
/// reachable from the center. Bins whose source point falls outside the
/// image extent receive `fill`: zero keeps the unmasked warp visually
/// complete, NaN lets the profile aggregation exclude them exactly.
pub fn warp_polar(
    img: &Array2<f64>,
    center: [f64; 2],
    fill: f64,
    theta_bins: usize,
) -> Array2<f64> {
    let (h, w) = img.dim();
    let (yc, xc) = (center[0], center[1]);

    let r_max = max_corner_distance((h, w), yc, xc);
    let n_radius = r_max.ceil().max(1.0) as usize;
    let r_step = r_max / n_radius as f64;

    let mut polar = Array2::from_elem((theta_bins, n_radius), fill);
    for ti in 0..theta_bins {
        let theta = 2.0 * std::f64::consts::PI * ti as f64 / theta_bins as f64;
        let (sin_t, cos_t) = theta.sin_cos();
        for ri in 0..n_radius {
            let r = ri as f64 * r_step;
            let x = xc + r * cos_t;
            let y = yc + r * sin_t;
            if let Some(v) = bilinear_sample(img, x, y) {
                polar[[ti, ri]] = v;
            }
        }
    }
    polar
}

/// Copy `img` with the pixels flagged in `region` set to NaN.
///
/// Used to blank the beam-block region before polar warping; the caller's
/// array is never touched.
pub fn blank_region(
    img: &Array2<f64>,
    region: &Array2<bool>,
) -> Result<Array2<f64>, CenteringError> {
    if region.dim() != img.dim() {
        return Err(CenteringError::ShapeMismatch {
            expected: img.dim(),
            got: region.dim(),
        });
    }
    let mut out = img.clone();
    for (idx, v) in out.indexed_iter_mut() {
        if region[idx] {
            *v = f64::NAN;
        }
    }
    Ok(out)
}

fn max_corner_distance(shape: (usize, usize), yc: f64, xc: f64) -> f64 {
    let (h, w) = shape;
    let corners = [
        (0.0, 0.0),
        (0.0, (w - 1) as f64),
        ((h - 1) as f64, 0.0),
        ((h - 1) as f64, (w - 1) as f64),
    ];
    corners
        .iter()
        .map(|&(y, x)| ((y - yc).powi(2) + (x - xc).powi(2)).sqrt())
        .fold(0.0, f64::max)
}

/// Bilinear sample at sub-pixel `(x, y)`; `None` outside
/// `[0, w-1] x [0, h-1]`. NaN neighbors propagate into the result.
fn bilinear_sample(img: &Array2<f64>, x: f64, y: f64) -> Option<f64> {
    let (h, w) = img.dim();
    if w < 2 || h < 2 {
        return None;
    }
    if x < 0.0 || y < 0.0 || x > (w - 1) as f64 || y > (h - 1) as f64 {
        return None;
    }

    let x0 = (x.floor() as usize).min(w - 2);
    let y0 = (y.floor() as usize).min(h - 2);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = img[[y0, x0]];
    let p10 = img[[y0, x0 + 1]];
    let p01 = img[[y0 + 1, x0]];
    let p11 = img[[y0 + 1, x0 + 1]];

    Some(
        (1.0 - fx) * (1.0 - fy) * p00
            + fx * (1.0 - fy) * p10
            + (1.0 - fx) * fy * p01
            + fx * fy * p11,
    )
}
