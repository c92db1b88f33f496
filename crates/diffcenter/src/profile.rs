//! Angle-integrated radial profiles.

use ndarray::{Array1, Array2, Axis};

use crate::error::CenteringError;

/// The three profiles consumed together by plotting and export.
#[derive(Debug, Clone)]
pub struct RadialProfiles {
    /// Angular sum of the masked polar image.
    pub raw: Array1<f64>,
    /// Angular sum of the masked background polar image.
    pub background: Array1<f64>,
    /// `max(raw - background, 0)` elementwise.
    pub flattened: Array1<f64>,
}

/// Sum a polar image over the angular axis, ignoring NaN entries.
///
/// An all-NaN radius bin sums to zero.
pub fn radial_profile(polar: &Array2<f64>) -> Array1<f64> {
    polar.fold_axis(
        Axis(0),
        0.0,
        |&acc, &v| if v.is_nan() { acc } else { acc + v },
    )
}

/// Aggregate the masked and background polar images into the profile triple.
///
/// Both inputs must share the same angular/radial binning.
pub fn aggregate_profiles(
    polar_masked: &Array2<f64>,
    polar_background: &Array2<f64>,
) -> Result<RadialProfiles, CenteringError> {
    if polar_masked.dim() != polar_background.dim() {
        return Err(CenteringError::ShapeMismatch {
            expected: polar_masked.dim(),
            got: polar_background.dim(),
        });
    }

    let raw = radial_profile(polar_masked);
    let background = radial_profile(polar_background);
    let flattened = Array1::from_shape_fn(raw.len(), |i| (raw[i] - background[i]).max(0.0));

    Ok(RadialProfiles {
        raw,
        background,
        flattened,
    })
}
