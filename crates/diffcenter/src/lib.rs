//! diffcenter — center fitting and azimuthal profiling for
//! radially-symmetric diffraction images.
//!
//! The pipeline stages are:
//!
//! 1. **Mask** – quantile-threshold validity mask with binary closing, plus
//!    the beam-block complement used for blanking.
//! 2. **Center** – subsampled, mask-eroded nonlinear least-squares fit of a
//!    radial power-law model (analytic Jacobian, box bounds).
//! 3. **Background** – full-resolution model evaluation with sampling-density
//!    compensation.
//! 4. **Polar** – Cartesian-to-polar resampling of the raw, blanked and
//!    background images about the fitted center.
//! 5. **Profile** – NaN-aware angular integration into radial profiles and
//!    the background-flattened difference.
//!
//! # Public API
//! [`process`] runs the whole pipeline; the stage functions
//! ([`evaluate_mask`], [`estimate_center`], [`synthesize_background`],
//! [`warp_polar`], [`aggregate_profiles`]) are exported for callers that
//! need to re-warp around an edited center or re-mask with new quantiles
//! without repeating the rest.
//!
//! Every entry point is a pure, blocking function of its inputs: no global
//! state, no caching between calls, and all failures propagate as
//! [`CenteringError`].

mod background;
mod center;
mod config;
mod error;
mod mask;
mod model;
mod pipeline;
mod polar;
mod profile;

pub use background::synthesize_background;
pub use center::{estimate_center, CenterFit};
pub use config::CenteringConfig;
pub use error::CenteringError;
pub use mask::{evaluate_mask, MaskPair};
pub use model::{FitParams, PowerLaw, RadialModel};
pub use pipeline::{process, process_with_model, CenteringResult};
pub use polar::{blank_region, warp_polar};
pub use profile::{aggregate_profiles, radial_profile, RadialProfiles};
