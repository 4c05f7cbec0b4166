use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_CUTOFF, DEFAULT_PRECISION_THRESHOLD};
use crate::geometry::Rect;

/// Alignment parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// Search window, in source coordinates. `None` uses the whole image.
    pub rect: Option<Rect>,
    /// Radial frequency cutoff as a fraction of Nyquist; 0 disables it.
    pub cutoff: f64,
    /// Largest accepted peak width, in pixels.
    pub precision_threshold: f64,
    /// Smallest accepted peak value, measured on DC-normalized spectra.
    /// 0 accepts any peak.
    pub min_peak_value: f64,
    /// Re-correlate the shifted window to confirm each offset.
    pub check_result: bool,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            rect: None,
            cutoff: DEFAULT_CUTOFF,
            precision_threshold: DEFAULT_PRECISION_THRESHOLD,
            min_peak_value: 0.0,
            check_result: false,
        }
    }
}
